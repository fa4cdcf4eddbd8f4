use async_trait::async_trait;
use review_anchor::migrate::Migrator;
use review_anchor::provider::{DiffOutput, DiffParams, DiffProvider, ProviderError};
use review_anchor::state::{CommentDb, NewComment};
use review_anchor::{FileDiff, HunkHeader, LineRange};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Every requested file had three lines inserted at the top.
struct PrependProvider;

#[async_trait]
impl DiffProvider for PrependProvider {
    async fn diff_hunk_headers(&self, params: DiffParams) -> Result<DiffOutput, ProviderError> {
        let files = params
            .paths
            .into_iter()
            .map(|path| FileDiff {
                old_path: path.clone(),
                new_path: path,
                hunks: vec![HunkHeader::new(0, 0, 1, 3)],
            })
            .collect();
        Ok(DiffOutput { files })
    }
}

fn placed(path: &str, start: i64, span: i64) -> NewComment {
    NewComment {
        path: path.to_string(),
        range: LineRange { start, span },
        merge_base_sha: "base1".to_string(),
        source_sha: "src1".to_string(),
        body: "nit".to_string(),
    }
}

#[tokio::test]
async fn migrated_comments_persist() {
    let dir = tempfile::tempdir().unwrap();
    let mut db = CommentDb::open(&dir.path().join("comments.db")).unwrap();

    db.add_comment("repo", placed("a.rs", 1, 2)).unwrap();
    db.add_comment("repo", placed("b.rs", 8, 1)).unwrap();

    let mut comments = db.load_comments("repo").unwrap();
    let migrator = Migrator::new(PrependProvider);
    migrator
        .migrate_old(&CancellationToken::new(), "repo", "base2", &mut comments)
        .await
        .unwrap();
    assert_eq!(db.save_comments("repo", &comments).unwrap(), 2);

    // reopen to make sure it was written to disk
    drop(db);
    let db = CommentDb::open(&dir.path().join("comments.db")).unwrap();
    let reloaded = db.load_comments("repo").unwrap();
    assert_eq!(reloaded, comments);

    assert_eq!(reloaded[0].line_old, 4);
    assert_eq!(reloaded[1].line_old, 11);
    assert!(reloaded.iter().all(|c| c.merge_base_sha == "base2"));
    // the source frame was not part of this migration
    assert_eq!(reloaded[0].line_new, 1);
    assert!(reloaded.iter().all(|c| c.source_sha == "src1"));
}

#[test]
fn concurrent_migration_keeps_outdated_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("comments.db");
    let mut db = CommentDb::open(&path).unwrap();
    let mut other_db = CommentDb::open(&path).unwrap();
    let c = db.add_comment("repo", placed("a.rs", 10, 1)).unwrap();

    let mut first = db.lock_comments("repo").unwrap();

    let (started, wait_started) = mpsc::channel();
    let other = thread::spawn(move || {
        started.send(()).unwrap();
        // blocks until the first migration commits
        let mut second = other_db.lock_comments("repo").unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let report = runtime
            .block_on(Migrator::new(PrependProvider).migrate_new(
                &CancellationToken::new(),
                "repo",
                "src2",
                second.comments_mut(),
            ))
            .unwrap();
        second.commit().unwrap();
        report
    });

    wait_started.recv().unwrap();
    thread::sleep(Duration::from_millis(100));
    first.comments_mut()[0].outdated = true;
    first.commit().unwrap();

    let report = other.join().unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.moved, 0);

    let stored = db.get_comment("repo", c.id).unwrap();
    assert!(stored.outdated);
    assert_eq!((stored.line_new, stored.source_sha.as_str()), (10, "src1"));
}
