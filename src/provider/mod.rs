use crate::FileDiff;
use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by a [`DiffProvider`].
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("git error: {0}")]
    Git(#[from] crate::git::GitError),
    #[error("diff provider failed: {0}")]
    Other(String),
}

/// What to diff: `base_ref` is the side the comments are currently anchored to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffParams {
    pub repo_id: String,
    pub base_ref: String,
    pub head_ref: String,
    /// Restrict the diff to these files. Empty means every file.
    pub paths: Vec<String>,
}

/// Hunk headers per changed file. Files absent here were not changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffOutput {
    pub files: Vec<FileDiff>,
}

/// Source of hunk headers between two revisions of a repository.
#[async_trait]
pub trait DiffProvider: Send + Sync {
    async fn diff_hunk_headers(&self, params: DiffParams) -> Result<DiffOutput, ProviderError>;
}
