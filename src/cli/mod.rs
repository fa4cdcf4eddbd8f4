use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::MigrationDirection;

#[derive(Parser, Debug)]
#[command(
    name = "review-anchor",
    version,
    about = "Keep inline review comments anchored across pushes and rebases"
)]
pub struct Cli {
    /// Repository to operate on (defaults to the current directory).
    #[arg(long, global = true)]
    pub repo: Option<PathBuf>,

    /// Comment database (defaults to <repo>/.git/review-anchor/comments.db).
    #[arg(long, env = "REVIEW_ANCHOR_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "review_anchor=trace".
    #[arg(
        long,
        env = "REVIEW_ANCHOR_LOG",
        default_value = "info",
        global = true
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a comment on a line range.
    Add(AddArgs),
    /// List comments with both coordinate frames.
    List,
    /// Re-anchor comments after the source branch or merge base moved.
    Migrate(MigrateArgs),
    /// Delete a comment.
    Delete {
        /// Comment id as shown by `list`.
        id: i64,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Repository-relative file path.
    pub path: String,

    /// First commented line (1-based).
    #[arg(short, long)]
    pub line: i64,

    /// Number of lines covered.
    #[arg(short, long, default_value = "1")]
    pub span: i64,

    /// Comment text.
    #[arg(short, long)]
    pub body: String,

    /// Merge base the comment is placed against.
    #[arg(long, default_value = "HEAD")]
    pub merge_base: String,

    /// Source commit the comment is placed against.
    #[arg(long, default_value = "HEAD")]
    pub source: String,
}

#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Which frame moved: `new` after a push, `old` after a rebase.
    #[arg(value_enum)]
    pub direction: Direction,

    /// The new source commit or merge base.
    pub rev: String,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    New,
    Old,
}

impl From<Direction> for MigrationDirection {
    fn from(d: Direction) -> Self {
        match d {
            Direction::New => MigrationDirection::New,
            Direction::Old => MigrationDirection::Old,
        }
    }
}

/// Parse CLI arguments.
pub fn parse_args() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_migrate() {
        let cli = Cli::try_parse_from(["review-anchor", "migrate", "old", "main"]).unwrap();
        match cli.command {
            Commands::Migrate(args) => {
                assert_eq!(args.direction, Direction::Old);
                assert_eq!(args.rev, "main");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parse_add_defaults() {
        let cli = Cli::try_parse_from(["review-anchor", "add", "src/lib.rs", "-l", "7", "-b", "hm"])
            .unwrap();
        match cli.command {
            Commands::Add(args) => {
                assert_eq!(args.span, 1);
                assert_eq!(args.merge_base, "HEAD");
                assert_eq!(args.source, "HEAD");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
