use anyhow::Context;
use std::path::Path;
use structopt::StructOpt;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use taskbox::cli::{Command, CommandLineArgs, ConfigCommand};
use taskbox::config::{resolve_db_path, Config, Locations};
use taskbox::interface::{self, ListFilter};
use taskbox::SqliteStorage;

/// Log to stderr. RUST_LOG wins over the -v flags.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

/// Open the database, creating the file and schema on first use.
fn open_storage(path: &Path) -> anyhow::Result<SqliteStorage> {
    let mut storage = SqliteStorage::open(path)?;
    storage
        .initialize()
        .with_context(|| format!("Failed to initialize database at {}", path.display()))?;
    debug!(path = %path.display(), "storage ready");
    Ok(storage)
}

fn run_config(action: ConfigCommand, locations: &Locations, db_path: &Path) -> anyhow::Result<()> {
    let config_file = locations.config_file();
    match action {
        ConfigCommand::Show => {
            println!("config file: {}", config_file.display());
            println!("database:    {}", db_path.display());
        }
        ConfigCommand::SetDbPath { path } => {
            let mut config = Config::load(&config_file)?;
            config.db_path = Some(path.clone());
            config.save(&config_file)?;
            println!("Database path set to {}", path.display());
        }
        ConfigCommand::Reset => {
            Config::reset(&config_file)?;
            println!(
                "Configuration reset. Database path is {}",
                locations.default_db_path().display()
            );
        }
    }
    Ok(())
}

/// Run `f` against a freshly opened database and close it afterwards.
fn with_storage<T>(
    path: &Path,
    f: impl FnOnce(&mut SqliteStorage) -> anyhow::Result<T>,
) -> anyhow::Result<()> {
    let mut storage = open_storage(path)?;
    f(&mut storage)?;
    storage.close()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Get the command-line arguments.
    let CommandLineArgs {
        action,
        db_file,
        verbose,
    } = CommandLineArgs::from_args();

    init_logging(verbose);

    let locations = Locations::resolve()?;
    let config = Config::load(&locations.config_file())?;
    let db_path = resolve_db_path(db_file, &config, &locations);

    // Perform the action.
    match action {
        Command::Add {
            titles,
            priority,
            no_inbox,
        } => with_storage(&db_path, |storage| {
            interface::add(storage, titles, priority, !no_inbox)
        }),
        Command::List {
            priority,
            status,
            format,
        } => with_storage(&db_path, |storage| {
            let filter = ListFilter {
                priority,
                status,
                inbox: None,
            };
            interface::print_tasks(&interface::list(storage, &filter)?, format)
        }),
        Command::Inbox { format } => with_storage(&db_path, |storage| {
            let filter = ListFilter {
                inbox: Some(true),
                ..ListFilter::default()
            };
            interface::print_tasks(&interface::list(storage, &filter)?, format)
        }),
        Command::Complete { ids } => {
            with_storage(&db_path, |storage| interface::complete(storage, &ids))
        }
        Command::Move { id, no_inbox, .. } => {
            with_storage(&db_path, |storage| interface::move_task(storage, id, !no_inbox))
        }
        Command::Rm { id } => with_storage(&db_path, |storage| interface::remove(storage, id)),
        Command::Config { action } => run_config(action, &locations, &db_path),
    }
}
