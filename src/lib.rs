pub mod anchor;
pub mod cli;
pub mod config;
pub mod git;
pub mod index;
pub mod migrate;
pub mod parser;
pub mod provider;
pub mod state;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("line range must span at least one line (start {start})")]
    EmptySpan { start: i64 },
    #[error("line numbers are 1-based, got {0}")]
    NotPositive(i64),
}

/// A contiguous, inclusive range of 1-based lines: `[start, start + span - 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: i64,
    pub span: i64,
}

impl LineRange {
    /// Build a range, rejecting empty spans and non-positive start lines.
    pub fn new(start: i64, span: i64) -> Result<Self, RangeError> {
        if start < 1 {
            return Err(RangeError::NotPositive(start));
        }
        if span < 1 {
            return Err(RangeError::EmptySpan { start });
        }
        Ok(Self { start, span })
    }

    /// Last line covered by the range.
    pub fn end(&self) -> i64 {
        self.start + self.span - 1
    }
}

/// One `@@ -old_start,old_span +new_start,new_span @@` header of a unified diff.
///
/// `old_span == 0` is a pure insertion after old line `old_start`;
/// `new_span == 0` is a pure deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_start: i64,
    pub old_span: i64,
    pub new_start: i64,
    pub new_span: i64,
}

impl HunkHeader {
    pub const fn new(old_start: i64, old_span: i64, new_start: i64, new_span: i64) -> Self {
        Self {
            old_start,
            old_span,
            new_start,
            new_span,
        }
    }
}

/// Hunk headers for a single file, ordered by `old_start` and non-overlapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub old_path: String,
    pub new_path: String,
    pub hunks: Vec<HunkHeader>,
}

/// An inline review comment anchored in two coordinate frames.
///
/// `(line_old, span_old)` is relative to the merge-base blob of `path`,
/// `(line_new, span_new)` to the source-branch blob. Once `outdated` is set
/// the six position/SHA fields are frozen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeComment {
    pub id: i64,
    pub path: String,
    pub line_old: i64,
    pub span_old: i64,
    pub line_new: i64,
    pub span_new: i64,
    pub merge_base_sha: String,
    pub source_sha: String,
    pub outdated: bool,
    pub body: String,
}

/// Which coordinate frame a migration moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDirection {
    /// The source branch advanced: `line_new`/`span_new` and `source_sha`.
    New,
    /// The merge base advanced: `line_old`/`span_old` and `merge_base_sha`.
    Old,
}

impl MigrationDirection {
    /// The comment's range in this direction's frame.
    pub fn range(self, comment: &CodeComment) -> LineRange {
        match self {
            MigrationDirection::New => LineRange {
                start: comment.line_new,
                span: comment.span_new,
            },
            MigrationDirection::Old => LineRange {
                start: comment.line_old,
                span: comment.span_old,
            },
        }
    }

    /// The SHA the comment's position in this frame is currently relative to.
    pub fn sha(self, comment: &CodeComment) -> &str {
        match self {
            MigrationDirection::New => &comment.source_sha,
            MigrationDirection::Old => &comment.merge_base_sha,
        }
    }

    /// Move this frame's start line by `delta` and advance its SHA.
    ///
    /// The span and the other frame are left as they are.
    pub fn apply(self, comment: &mut CodeComment, delta: i64, new_sha: &str) {
        match self {
            MigrationDirection::New => {
                comment.line_new += delta;
                comment.source_sha = new_sha.to_owned();
            }
            MigrationDirection::Old => {
                comment.line_old += delta;
                comment.merge_base_sha = new_sha.to_owned();
            }
        }
    }
}

impl std::fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationDirection::New => f.write_str("new"),
            MigrationDirection::Old => f.write_str("old"),
        }
    }
}
