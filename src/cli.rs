use crate::interface::{parse_priority, Format};
use crate::model::Status;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Add one or more tasks. Several titles are stored together or not at all.
    Add {
        /// The task title(s).
        #[structopt(required = true)]
        titles: Vec<String>,

        /// Task priority, 1 is highest and 4 lowest. 0 leaves it unset.
        #[structopt(short, long, parse(try_from_str = parse_priority))]
        priority: Option<i64>,

        /// Do not add to the inbox.
        #[structopt(short = "n", long)]
        no_inbox: bool,
    },
    /// List all tasks.
    List {
        /// Only show tasks with this priority.
        #[structopt(short, long, parse(try_from_str = parse_priority))]
        priority: Option<i64>,

        /// Only show tasks with this status (pending, completed).
        #[structopt(short, long)]
        status: Option<Status>,

        /// Output format (table, json, markdown).
        #[structopt(short, long, default_value = "table")]
        format: Format,
    },
    /// List the tasks in your inbox.
    Inbox {
        /// Output format (table, json, markdown).
        #[structopt(short, long, default_value = "table")]
        format: Format,
    },
    /// Mark one or more tasks as complete.
    Complete {
        #[structopt(required = true)]
        ids: Vec<i64>,
    },
    /// Move a task in or out of the inbox.
    Move {
        id: i64,

        /// Move to the inbox (the default).
        #[structopt(long, conflicts_with = "no-inbox")]
        inbox: bool,

        /// Take out of the inbox.
        #[structopt(long)]
        no_inbox: bool,
    },
    /// Delete a task for good.
    Rm { id: i64 },
    /// Inspect or change the stored configuration.
    Config {
        #[structopt(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Debug, StructOpt)]
pub enum ConfigCommand {
    /// Print the config file location and the database in use.
    Show,
    /// Store a different database location.
    SetDbPath {
        #[structopt(parse(from_os_str))]
        path: PathBuf,
    },
    /// Forget every stored setting.
    Reset,
}

#[derive(Debug, StructOpt)]
#[structopt(
    name = "taskbox",
    about = "A local-first task tracker with an inbox for untriaged work."
)]
pub struct CommandLineArgs {
    #[structopt(subcommand)]
    pub action: Command,

    /// Use a different database file.
    #[structopt(parse(from_os_str), short, long)]
    pub db_file: Option<PathBuf>,

    /// Log more (-v info, -vv debug). RUST_LOG takes precedence.
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CommandLineArgs, structopt::clap::Error> {
        CommandLineArgs::from_iter_safe(std::iter::once("taskbox").chain(args.iter().copied()))
    }

    #[test]
    fn add_defaults_to_inbox_without_priority() {
        match parse(&["add", "Write spec"]).unwrap().action {
            Command::Add {
                titles,
                priority,
                no_inbox,
            } => {
                assert_eq!(titles, vec!["Write spec"]);
                assert_eq!(priority, None);
                assert!(!no_inbox);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn out_of_range_priority_is_rejected() {
        assert!(parse(&["add", "x", "-p", "9"]).is_err());
        assert!(parse(&["add", "x", "-p", "high"]).is_err());
    }

    #[test]
    fn non_numeric_ids_are_rejected() {
        assert!(parse(&["complete", "one"]).is_err());
        assert!(parse(&["move", "x"]).is_err());
    }

    #[test]
    fn move_flags_conflict() {
        assert!(parse(&["move", "1", "--inbox", "--no-inbox"]).is_err());
        match parse(&["move", "1", "--no-inbox"]).unwrap().action {
            Command::Move { id, inbox, no_inbox } => {
                assert_eq!(id, 1);
                assert!(!inbox);
                assert!(no_inbox);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn list_parses_filters_and_format() {
        let args = parse(&["-vv", "list", "-s", "completed", "-f", "json"]).unwrap();
        assert_eq!(args.verbose, 2);
        match args.action {
            Command::List {
                priority,
                status,
                format,
            } => {
                assert_eq!(priority, None);
                assert_eq!(status, Some(Status::Completed));
                assert_eq!(format, Format::Json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(parse(&["inbox", "-f", "yaml"]).is_err());
    }

    #[test]
    fn unknown_status_is_rejected_with_its_message() {
        let err = parse(&["list", "-s", "later"]).unwrap_err();
        assert!(err
            .message
            .contains("Unknown status 'later', expected pending or completed"));
    }
}
