use crate::parser::parse_diff;
use crate::provider::{DiffOutput, DiffParams, DiffProvider, ProviderError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("not in a git repository")]
    NotARepo,
    #[error("git command failed: {0}")]
    CommandFailed(String),
    #[error("invalid git ref: {0}")]
    InvalidRef(String),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GitError>;

/// Find the root of the git repository containing `dir`.
pub fn find_repo_root(dir: &Path) -> Result<PathBuf> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .arg("rev-parse")
        .arg("--show-toplevel")
        .output()?;

    if !output.status.success() {
        return Err(GitError::NotARepo);
    }

    let path = String::from_utf8(output.stdout)?.trim().to_string();

    Ok(PathBuf::from(path))
}

/// Resolve `rev` to a full commit SHA.
pub fn rev_parse(repo: &Path, rev: &str) -> Result<String> {
    validate_git_ref(rev)?;

    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .arg("rev-parse")
        .arg("--verify")
        .arg(format!("{rev}^{{commit}}"))
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GitError::CommandFailed(format!(
            "git rev-parse {} failed: {}",
            rev,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8(output.stdout)?.trim().to_string())
}

/// Validate a git ref to prevent option or shell injection.
pub fn validate_git_ref(ref_str: &str) -> Result<()> {
    if ref_str.is_empty() {
        return Err(GitError::InvalidRef("Empty git ref".to_string()));
    }

    if ref_str.starts_with('-') {
        return Err(GitError::InvalidRef(format!(
            "Git ref may not start with '-': {}",
            ref_str
        )));
    }

    // Check for shell metacharacters
    for ch in ref_str.chars() {
        if !ch.is_alphanumeric()
            && !matches!(
                ch,
                '-' | '_' | '/' | '.' | '~' | '^' | '@' | ':' | '{' | '}'
            )
        {
            return Err(GitError::InvalidRef(format!(
                "Invalid character in git ref: '{}'",
                ch
            )));
        }
    }

    Ok(())
}

/// [`DiffProvider`] backed by the `git` command line.
///
/// Diffs are taken with zero context lines so every hunk covers exactly the
/// lines that changed. `repo_id` is the repository path; an empty id falls
/// back to `root`.
#[derive(Debug, Clone)]
pub struct GitDiffProvider {
    root: PathBuf,
}

impl GitDiffProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Raw `git diff` output between two refs, limited to `paths` when not empty.
    pub async fn raw_diff(
        &self,
        repo: &Path,
        base: &str,
        head: &str,
        paths: &[String],
    ) -> Result<String> {
        validate_git_ref(base)?;
        validate_git_ref(head)?;

        // Paths are matched literally and printed unescaped where git allows it.
        let output = tokio::process::Command::new("git")
            .args(["-c", "core.quotePath=false", "--literal-pathspecs"])
            .arg("-C")
            .arg(repo)
            .args([
                "diff",
                "--no-color",
                "--no-ext-diff",
                "--find-renames",
                "--unified=0",
                "--src-prefix=a/",
                "--dst-prefix=b/",
            ])
            .arg(base)
            .arg(head)
            .arg("--")
            .args(paths)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitError::CommandFailed(format!(
                "git diff failed: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8(output.stdout)?)
    }
}

#[async_trait]
impl DiffProvider for GitDiffProvider {
    async fn diff_hunk_headers(
        &self,
        params: DiffParams,
    ) -> std::result::Result<DiffOutput, ProviderError> {
        let repo = if params.repo_id.is_empty() {
            self.root.clone()
        } else {
            PathBuf::from(&params.repo_id)
        };

        let raw = self
            .raw_diff(&repo, &params.base_ref, &params.head_ref, &params.paths)
            .await?;
        let files = parse_diff(&raw);
        debug!(
            "git diff {}..{}: {} changed file(s)",
            params.base_ref,
            params.head_ref,
            files.len()
        );

        Ok(DiffOutput { files })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_git_ref_valid() {
        assert!(validate_git_ref("main").is_ok());
        assert!(validate_git_ref("feature/foo").is_ok());
        assert!(validate_git_ref("HEAD~1").is_ok());
        assert!(validate_git_ref("v1.2.3").is_ok());
        assert!(validate_git_ref("origin/main").is_ok());
        assert!(validate_git_ref("HEAD^").is_ok());
        assert!(validate_git_ref("@{-1}").is_ok());
        assert!(validate_git_ref("3f2a9c1d").is_ok());
    }

    #[test]
    fn test_validate_git_ref_invalid() {
        assert!(validate_git_ref(";rm -rf").is_err());
        assert!(validate_git_ref("$(cmd)").is_err());
        assert!(validate_git_ref("|pipe").is_err());
        assert!(validate_git_ref("&bg").is_err());
        assert!(validate_git_ref("foo bar").is_err());
        assert!(validate_git_ref("foo\nbar").is_err());
        assert!(validate_git_ref("--output=/tmp/x").is_err());
    }

    #[test]
    fn test_validate_git_ref_empty() {
        assert!(validate_git_ref("").is_err());
    }

    #[tokio::test]
    async fn raw_diff_rejects_bad_refs_before_running_git() {
        let provider = GitDiffProvider::new(".");
        let err = provider
            .raw_diff(Path::new("."), "main;ls", "HEAD", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, GitError::InvalidRef(_)));
    }
}
