use crate::cli::Cli;
use crate::git::{self, GitError};
use std::path::{Path, PathBuf};

const STATE_DIR: &str = ".git/review-anchor";
const DB_FILE: &str = "comments.db";

/// Locations resolved from the command line and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub repo_root: PathBuf,
    pub db_path: PathBuf,
}

impl Settings {
    /// Resolve the repository root and database path for `cli`.
    ///
    /// The repository is `--repo` or the current directory, normalised to its
    /// top level. The database is `--db` / `REVIEW_ANCHOR_DB`, or a file under
    /// the repository's `.git` directory.
    pub fn resolve(cli: &Cli) -> Result<Self, GitError> {
        let start = match &cli.repo {
            Some(repo) => repo.clone(),
            None => std::env::current_dir()?,
        };
        let repo_root = git::find_repo_root(&start)?;
        Ok(Self::with_root(repo_root, cli.db.as_deref()))
    }

    pub fn with_root(repo_root: PathBuf, db: Option<&Path>) -> Self {
        let db_path = match db {
            Some(p) => p.to_path_buf(),
            None => default_db_path(&repo_root),
        };
        Self { repo_root, db_path }
    }

    /// Key under which this repository's comments are stored.
    pub fn repo_id(&self) -> String {
        self.repo_root.to_string_lossy().into_owned()
    }
}

pub fn default_db_path(repo_root: &Path) -> PathBuf {
    repo_root.join(STATE_DIR).join(DB_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_db_lives_under_git_dir() {
        let s = Settings::with_root(PathBuf::from("/work/repo"), None);
        assert_eq!(s.db_path, PathBuf::from("/work/repo/.git/review-anchor/comments.db"));
        assert_eq!(s.repo_id(), "/work/repo");
    }

    #[test]
    fn explicit_db_wins() {
        let s = Settings::with_root(PathBuf::from("/work/repo"), Some(Path::new("/tmp/c.db")));
        assert_eq!(s.db_path, PathBuf::from("/tmp/c.db"));
    }
}
