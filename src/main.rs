use anyhow::{Context, Result, bail};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use review_anchor::cli::{self, AddArgs, Commands, MigrateArgs};
use review_anchor::config::Settings;
use review_anchor::git::{self, GitDiffProvider};
use review_anchor::migrate::Migrator;
use review_anchor::state::{CommentDb, NewComment};
use review_anchor::{LineRange, MigrationDirection};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::parse_args();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::resolve(&args).context("Failed to locate the git repository")?;

    match args.command {
        Commands::Add(add) => handle_add(&settings, add)?,
        Commands::List => handle_list(&settings)?,
        Commands::Migrate(migrate) => handle_migrate(&settings, migrate).await?,
        Commands::Delete { id } => handle_delete(&settings, id)?,
    }

    Ok(())
}

/// Open the comment database, creating its directory on first use.
fn open_db(settings: &Settings) -> Result<CommentDb> {
    if let Some(dir) = settings.db_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    CommentDb::open(&settings.db_path)
        .with_context(|| format!("Failed to open {}", settings.db_path.display()))
}

/// Handle add command - place a comment on both frames.
fn handle_add(settings: &Settings, args: AddArgs) -> Result<()> {
    let range = LineRange::new(args.line, args.span)?;
    let merge_base_sha = git::rev_parse(&settings.repo_root, &args.merge_base)?;
    let source_sha = git::rev_parse(&settings.repo_root, &args.source)?;

    let mut db = open_db(settings)?;
    let comment = db.add_comment(
        &settings.repo_id(),
        NewComment {
            path: args.path,
            range,
            merge_base_sha,
            source_sha,
            body: args.body,
        },
    )?;

    println!(
        "✓ Added comment {} on {}:{}-{}",
        comment.id,
        comment.path,
        range.start,
        range.end()
    );
    Ok(())
}

/// Handle list command - print every comment with both frames.
fn handle_list(settings: &Settings) -> Result<()> {
    let db = open_db(settings)?;
    let comments = db.load_comments(&settings.repo_id())?;

    if comments.is_empty() {
        println!("No comments");
        return Ok(());
    }

    for c in comments {
        let marker = if c.outdated { "⚠ outdated" } else { "✓" };
        println!(
            "#{:<4} {} {}  old {}+{} @{}  new {}+{} @{}",
            c.id,
            marker,
            c.path,
            c.line_old,
            c.span_old,
            short_sha(&c.merge_base_sha),
            c.line_new,
            c.span_new,
            short_sha(&c.source_sha)
        );
        println!("      {}", c.body);
    }
    Ok(())
}

/// Handle migrate command - fetch hunks, re-anchor, persist.
async fn handle_migrate(settings: &Settings, args: MigrateArgs) -> Result<()> {
    let direction = MigrationDirection::from(args.direction);
    let new_sha = git::rev_parse(&settings.repo_root, &args.rev)?;
    let repo_id = settings.repo_id();

    // Held across the diff so concurrent migrations of this database serialise.
    let mut db = open_db(settings)?;
    let mut locked = db.lock_comments(&repo_id)?;
    if locked.comments().is_empty() {
        println!("No comments to migrate");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling migration");
            ctrl_c.cancel();
        }
    });

    let migrator = Migrator::new(GitDiffProvider::new(&settings.repo_root));
    let comments = locked.comments_mut();
    let report = match direction {
        MigrationDirection::New => {
            migrator
                .migrate_new(&cancel, &repo_id, &new_sha, comments)
                .await
        }
        MigrationDirection::Old => {
            migrator
                .migrate_old(&cancel, &repo_id, &new_sha, comments)
                .await
        }
    }
    .context("Migration failed, no comment was changed")?;

    let written = locked
        .commit()
        .context("Failed to save migrated comments, no comment was changed")?;
    info!("Saved {} comments", written);

    println!("Migrated {} frame to {}", direction, short_sha(&new_sha));
    println!("  Moved:    {}", report.moved);
    println!("  Outdated: {}", report.outdated);
    println!("  Skipped:  {}", report.skipped);
    Ok(())
}

/// Handle delete command.
fn handle_delete(settings: &Settings, id: i64) -> Result<()> {
    let mut db = open_db(settings)?;
    if db.delete_comment(&settings.repo_id(), id)? {
        println!("✓ Deleted comment {}", id);
        Ok(())
    } else {
        bail!("No comment with id {}", id)
    }
}

fn short_sha(sha: &str) -> &str {
    sha.get(..8).unwrap_or(sha)
}
