use crate::{CodeComment, LineRange, RangeError};
use rusqlite::{Connection, Row, Transaction, TransactionBehavior, params};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during state operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("invalid comment range: {0}")]
    InvalidRange(#[from] RangeError),
    #[error("comment {0} not found")]
    NotFound(i64),
    #[error("wrote {written} of {expected} comments; nothing was saved")]
    Conflict { written: usize, expected: usize },
}

pub type Result<T> = std::result::Result<T, StateError>;

/// A comment as placed by a reviewer, before it has an id.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub path: String,
    pub range: LineRange,
    pub merge_base_sha: String,
    pub source_sha: String,
    pub body: String,
}

/// SQLite-backed comment store.
///
/// Comments are grouped per repository. The store only persists what the
/// migrator computes; it never moves a comment by itself.
pub struct CommentDb {
    conn: Connection,
}

const SELECT_COLUMNS: &str = "id, path, line_old, span_old, line_new, span_new,
     merge_base_sha, source_sha, outdated, body";

/// How long a second writer waits for the database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

impl CommentDb {
    /// Open or create the comment database at the given path.
    ///
    /// Creates the necessary tables if they don't exist.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                repo TEXT NOT NULL,
                path TEXT NOT NULL,
                line_old INTEGER NOT NULL,
                span_old INTEGER NOT NULL CHECK (span_old >= 1),
                line_new INTEGER NOT NULL,
                span_new INTEGER NOT NULL CHECK (span_new >= 1),
                merge_base_sha TEXT NOT NULL,
                source_sha TEXT NOT NULL,
                outdated INTEGER NOT NULL DEFAULT 0,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS comments_repo ON comments (repo)",
            [],
        )?;
        Ok(Self { conn })
    }

    /// Store a new comment. Both coordinate frames start at the selected range.
    pub fn add_comment(&mut self, repo: &str, comment: NewComment) -> Result<CodeComment> {
        let range = LineRange::new(comment.range.start, comment.range.span)?;
        self.conn.execute(
            "INSERT INTO comments
                (repo, path, line_old, span_old, line_new, span_new,
                 merge_base_sha, source_sha, body)
             VALUES (?1, ?2, ?3, ?4, ?3, ?4, ?5, ?6, ?7)",
            params![
                repo,
                comment.path,
                range.start,
                range.span,
                comment.merge_base_sha,
                comment.source_sha,
                comment.body
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!("Added comment {} on {}:{}", id, comment.path, range.start);

        Ok(CodeComment {
            id,
            path: comment.path,
            line_old: range.start,
            span_old: range.span,
            line_new: range.start,
            span_new: range.span,
            merge_base_sha: comment.merge_base_sha,
            source_sha: comment.source_sha,
            outdated: false,
            body: comment.body,
        })
    }

    /// All comments of a repository, oldest first.
    pub fn load_comments(&self, repo: &str) -> Result<Vec<CodeComment>> {
        query_comments(&self.conn, repo)
    }

    /// Load a repository's comments under the database write lock.
    ///
    /// The lock is held until [`LockedComments::commit`] or drop, so a second
    /// migration of the same database waits and then reads the committed
    /// rows instead of a stale copy.
    pub fn lock_comments(&mut self, repo: &str) -> Result<LockedComments<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let comments = query_comments(&tx, repo)?;
        debug!("Locked {} comments of {}", comments.len(), repo);
        Ok(LockedComments {
            tx,
            repo: repo.to_string(),
            comments,
        })
    }

    /// Get a single comment.
    pub fn get_comment(&self, repo: &str, id: i64) -> Result<CodeComment> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM comments WHERE repo = ?1 AND id = ?2"
        ))?;
        match stmt.query_row(params![repo, id], row_to_comment) {
            Ok(comment) => Ok(comment),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(StateError::NotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist positions, SHAs and outdated flags of migrated comments.
    ///
    /// Runs in a single transaction. Returns the number of rows written; if a
    /// comment no longer exists nothing is written and `Conflict` is returned.
    pub fn save_comments(&mut self, repo: &str, comments: &[CodeComment]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let written = update_comments(&tx, repo, comments)?;
        tx.commit()?;
        Ok(written)
    }

    /// Delete a comment. Returns `false` if it did not exist.
    pub fn delete_comment(&mut self, repo: &str, id: i64) -> Result<bool> {
        let count = self.conn.execute(
            "DELETE FROM comments WHERE repo = ?1 AND id = ?2",
            params![repo, id],
        )?;
        Ok(count > 0)
    }
}

/// Comments loaded by [`CommentDb::lock_comments`], writable until committed.
pub struct LockedComments<'a> {
    tx: Transaction<'a>,
    repo: String,
    comments: Vec<CodeComment>,
}

impl LockedComments<'_> {
    pub fn comments(&self) -> &[CodeComment] {
        &self.comments
    }

    pub fn comments_mut(&mut self) -> &mut [CodeComment] {
        &mut self.comments
    }

    /// Write every comment back and release the lock.
    ///
    /// On error the transaction is rolled back and no row changes.
    pub fn commit(self) -> Result<usize> {
        let written = update_comments(&self.tx, &self.repo, &self.comments)?;
        self.tx.commit()?;
        Ok(written)
    }
}

fn query_comments(conn: &Connection, repo: &str) -> Result<Vec<CodeComment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM comments WHERE repo = ?1 ORDER BY id"
    ))?;

    let comments = stmt
        .query_map(params![repo], row_to_comment)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(comments)
}

/// Update every comment inside `tx`, failing unless each one matched a row.
fn update_comments(tx: &Transaction<'_>, repo: &str, comments: &[CodeComment]) -> Result<usize> {
    let mut stmt = tx.prepare(
        "UPDATE comments
         SET line_old = ?3, span_old = ?4, line_new = ?5, span_new = ?6,
             merge_base_sha = ?7, source_sha = ?8, outdated = ?9
         WHERE repo = ?1 AND id = ?2",
    )?;
    let mut written = 0;
    for c in comments {
        written += stmt.execute(params![
            repo,
            c.id,
            c.line_old,
            c.span_old,
            c.line_new,
            c.span_new,
            c.merge_base_sha,
            c.source_sha,
            c.outdated
        ])?;
    }
    if written != comments.len() {
        return Err(StateError::Conflict {
            written,
            expected: comments.len(),
        });
    }
    Ok(written)
}

fn row_to_comment(row: &Row<'_>) -> rusqlite::Result<CodeComment> {
    Ok(CodeComment {
        id: row.get(0)?,
        path: row.get(1)?,
        line_old: row.get(2)?,
        span_old: row.get(3)?,
        line_new: row.get(4)?,
        span_new: row.get(5)?,
        merge_base_sha: row.get(6)?,
        source_sha: row.get(7)?,
        outdated: row.get(8)?,
        body: row.get(9)?,
    })
}
