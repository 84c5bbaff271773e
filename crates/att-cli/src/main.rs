use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use att_cli::commands::{active, identity, reap, report, room, scan, session, status};
use att_cli::{Cli, Commands, Config, IdentityAction, RoomAction, SessionAction};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(att_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = att_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let mut stdout = std::io::stdout();

    match &cli.command {
        Some(Commands::Scan {
            identity,
            session,
            at,
            json,
        }) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            scan::run(
                &mut db,
                &mut stdout,
                identity,
                session,
                at.as_deref(),
                *json,
                &config.engine,
            )?;
        }
        Some(Commands::Identity { action }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            match action {
                IdentityAction::Add { id, name } => identity::add(&db, &mut stdout, id, name)?,
                IdentityAction::List => identity::list(&db, &mut stdout)?,
            }
        }
        Some(Commands::Room { action }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            match action {
                RoomAction::Add { id, name } => room::add(&db, &mut stdout, id, name)?,
                RoomAction::List => room::list(&db, &mut stdout)?,
            }
        }
        Some(Commands::Session { action }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            match action {
                SessionAction::Add {
                    id,
                    room,
                    name,
                    starts,
                    ends,
                    grace_in,
                    grace_out,
                } => session::add(
                    &db,
                    &mut stdout,
                    &session::AddArgs {
                        id: id.as_deref(),
                        room,
                        name: name.as_deref(),
                        starts,
                        ends,
                        grace_in: *grace_in,
                        grace_out: *grace_out,
                    },
                )?,
                SessionAction::List => session::list(&db, &mut stdout)?,
            }
        }
        Some(Commands::Active { json }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            active::run(&db, &mut stdout, *json)?;
        }
        Some(Commands::Reap) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            reap::run(
                &mut db,
                &mut stdout,
                Local::now().naive_local(),
                &config.engine,
            )?;
        }
        Some(Commands::Report { session, json }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            report::run(
                &db,
                &mut stdout,
                session,
                *json,
                Local::now().naive_local(),
                &config.engine.duration_config(),
            )?;
        }
        Some(Commands::Status) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            status::run(
                &db,
                &mut stdout,
                &config.database_path,
                Local::now().naive_local(),
                &config.engine,
            )?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
