//! Moves review comments across a push or a rebase.
//!
//! A migration runs in two phases. All hunk headers are fetched from the
//! [`DiffProvider`] first; only once every fetch has succeeded are comments
//! touched. A failed or cancelled fetch therefore leaves every comment as it
//! was.

use crate::anchor::reposition;
use crate::index::FileHunkIndex;
use crate::provider::{DiffParams, DiffProvider, ProviderError};
use crate::{CodeComment, HunkHeader, MigrationDirection};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("migration cancelled before the diff was fetched")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, MigrateError>;

/// What happened to a single comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Re-anchored by `delta` lines (possibly zero) and moved to the new SHA.
    Moved(i64),
    /// A hunk touched the comment's lines; it is now frozen.
    Outdated,
    /// Already outdated before this migration.
    Skipped,
}

/// Counts of a finished migration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub moved: usize,
    pub outdated: usize,
    pub skipped: usize,
}

impl MigrationReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Moved(_) => self.moved += 1,
            Outcome::Outdated => self.outdated += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }
}

/// Re-anchor one comment in `direction`'s frame against `hunks`.
///
/// An outdated comment is never modified.
pub fn migrate_comment(
    direction: MigrationDirection,
    comment: &mut CodeComment,
    hunks: &[HunkHeader],
    new_sha: &str,
) -> Outcome {
    if comment.outdated {
        return Outcome::Skipped;
    }

    let (outdated, delta) = reposition(direction.range(comment), hunks);
    if outdated {
        comment.outdated = true;
        return Outcome::Outdated;
    }

    direction.apply(comment, delta, new_sha);
    Outcome::Moved(delta)
}

pub struct Migrator<P> {
    provider: P,
}

impl<P: DiffProvider> Migrator<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The source branch moved to `new_source_sha`.
    pub async fn migrate_new(
        &self,
        cancel: &CancellationToken,
        repo_id: &str,
        new_source_sha: &str,
        comments: &mut [CodeComment],
    ) -> Result<MigrationReport> {
        self.migrate(MigrationDirection::New, cancel, repo_id, new_source_sha, comments)
            .await
    }

    /// The merge base moved to `new_merge_base_sha`.
    pub async fn migrate_old(
        &self,
        cancel: &CancellationToken,
        repo_id: &str,
        new_merge_base_sha: &str,
        comments: &mut [CodeComment],
    ) -> Result<MigrationReport> {
        self.migrate(MigrationDirection::Old, cancel, repo_id, new_merge_base_sha, comments)
            .await
    }

    pub async fn migrate(
        &self,
        direction: MigrationDirection,
        cancel: &CancellationToken,
        repo_id: &str,
        new_sha: &str,
        comments: &mut [CodeComment],
    ) -> Result<MigrationReport> {
        // Paths still tracked, grouped by the SHA their position refers to.
        let mut wanted: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for comment in comments.iter().filter(|c| !c.outdated) {
            wanted
                .entry(direction.sha(comment).to_owned())
                .or_default()
                .insert(comment.path.clone());
        }

        let mut indexes: HashMap<String, FileHunkIndex> = HashMap::with_capacity(wanted.len());
        for (old_sha, paths) in wanted {
            let params = DiffParams {
                repo_id: repo_id.to_owned(),
                base_ref: old_sha.clone(),
                head_ref: new_sha.to_owned(),
                paths: paths.into_iter().collect(),
            };
            debug!(
                "Fetching {} hunks {}..{} for {} file(s)",
                direction,
                params.base_ref,
                params.head_ref,
                params.paths.len()
            );

            let output = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(MigrateError::Cancelled),
                result = self.provider.diff_hunk_headers(params) => result?,
            };
            indexes.insert(old_sha, FileHunkIndex::from_files(output.files));
        }

        let mut report = MigrationReport::default();
        for comment in comments.iter_mut() {
            let hunks = indexes
                .get(direction.sha(comment))
                .map(|index| index.lookup(&comment.path))
                .unwrap_or(&[]);
            let outcome = migrate_comment(direction, comment, hunks, new_sha);
            if outcome == Outcome::Outdated {
                debug!("Comment {} on {} is now outdated", comment.id, comment.path);
            }
            report.record(outcome);
        }

        info!(
            "Migrated {} comments to {}: {} moved, {} outdated, {} skipped",
            direction, new_sha, report.moved, report.outdated, report.skipped
        );
        Ok(report)
    }
}
