use chrono::{DateTime, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pollkeeper", version, about = "Stores and looks up community polls")]
pub struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "pollkeeper.toml")]
    pub config: String,

    /// Log filter, e.g. `debug` or `pollkeeper=trace` (defaults to RUST_LOG)
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply pending schema migrations
    Migrate,
    /// Check that the database answers
    Check,
    /// Store a new poll with its answers
    Create(CreateArgs),
    /// Show one poll by id, title, or both
    Details(DetailsArgs),
    /// List polls whose question contains a title
    List(ListArgs),
    /// Remove a poll and its answers
    Remove(RemoveArgs),
}

#[derive(ClapArgs, Debug)]
pub struct CreateArgs {
    /// Guild that owns the poll
    #[arg(long)]
    pub guild: String,

    #[arg(long)]
    pub author: String,

    #[arg(long)]
    pub question: String,

    /// Answer as `text` or `emoji:text`; repeat for each answer
    #[arg(long = "answer", required = true)]
    pub answers: Vec<String>,

    /// Poll length in hours (non-positive means 24)
    #[arg(long, conflicts_with = "expires_at")]
    pub hours: Option<i64>,

    /// Expiry timestamp (RFC 3339); length is rounded up to whole hours
    #[arg(long)]
    pub expires_at: Option<DateTime<Utc>>,

    /// Allow picking several answers
    #[arg(long)]
    pub multi: bool,

    /// Do nothing when the guild already has a poll with this question
    #[arg(long)]
    pub skip_existing: bool,
}

#[derive(ClapArgs, Debug)]
pub struct DetailsArgs {
    #[arg(long)]
    pub guild: String,

    #[arg(long)]
    pub id: Option<i64>,

    #[arg(long)]
    pub title: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct ListArgs {
    #[arg(long)]
    pub guild: String,

    #[arg(long)]
    pub title: String,

    /// Zero-based page of ten polls
    #[arg(long, default_value_t = 0)]
    pub page: u32,
}

#[derive(ClapArgs, Debug)]
pub struct RemoveArgs {
    /// Guild the poll must belong to
    #[arg(long)]
    pub guild: String,

    #[arg(long)]
    pub id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_with_repeated_answers() {
        let args = Args::try_parse_from([
            "pollkeeper",
            "create",
            "--guild",
            "guild-1",
            "--author",
            "user-9",
            "--question",
            "Pizza or Tacos?",
            "--answer",
            "🍕:Pizza",
            "--answer",
            "Tacos",
            "--multi",
        ])
        .unwrap();
        match args.command {
            Command::Create(create) => {
                assert_eq!(create.answers, vec!["🍕:Pizza", "Tacos"]);
                assert!(create.multi);
                assert!(create.hours.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(args.config, "pollkeeper.toml");
    }

    #[test]
    fn create_requires_an_answer() {
        let err = Args::try_parse_from([
            "pollkeeper", "create", "--guild", "g", "--author", "a", "--question", "q",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn hours_and_expiry_conflict() {
        let err = Args::try_parse_from([
            "pollkeeper",
            "create",
            "--guild",
            "g",
            "--author",
            "a",
            "--question",
            "q",
            "--answer",
            "x",
            "--hours",
            "2",
            "--expires-at",
            "2030-01-01T00:00:00Z",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn list_page_defaults_to_zero() {
        let args =
            Args::try_parse_from(["pollkeeper", "list", "--guild", "g", "--title", "Pizza"]).unwrap();
        match args.command {
            Command::List(list) => assert_eq!(list.page, 0),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
