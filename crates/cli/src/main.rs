// FILE: crates/cli/src/main.rs

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use harbor_config::ConfigManager;
use std::path::PathBuf;

mod commands;

use commands::Session;

fn build_cli() -> Command {
    Command::new("harbor")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Harbor Contributors")
        .about("Offline-first record cache that syncs with a remote service")
        .arg(
            Arg::new("config-dir")
                .long("config-dir")
                .value_name("DIR")
                .help("Directory holding config.toml (and the cache, unless --database is given)")
                .global(true),
        )
        .arg(
            Arg::new("database")
                .short('d')
                .long("database")
                .value_name("PATH")
                .help("Path to the cache database file")
                .global(true),
        )
        .arg(
            Arg::new("offline")
                .long("offline")
                .help("Do not contact the remote; changes stay queued")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(Command::new("init").about("Create the config file and the cache database"))
        .subcommand(
            Command::new("put")
                .about("Create or update a record")
                .arg(Arg::new("payload").required(true).value_name("JSON").help("Record payload as JSON"))
                .arg(Arg::new("id").short('i').long("id").value_name("ID").help("Record ID (generated when omitted)")),
        )
        .subcommand(
            Command::new("get")
                .about("Show a cached record")
                .arg(Arg::new("id").required(true).value_name("ID").help("Record ID")),
        )
        .subcommand(Command::new("list").about("List cached records"))
        .subcommand(
            Command::new("delete")
                .about("Delete a record")
                .arg(Arg::new("id").required(true).value_name("ID").help("Record ID")),
        )
        .subcommand(Command::new("pending").about("List operations waiting to reach the remote"))
        .subcommand(Command::new("stats").about("Show record and queue counts"))
        .subcommand(Command::new("sync").about("Push queued operations now"))
        .subcommand(
            Command::new("watch")
                .about("Keep running, probing the remote and syncing whenever it is reachable"),
        )
        .subcommand(
            Command::new("refresh")
                .about("Fetch the remote copy of a record into the cache")
                .arg(Arg::new("id").required(true).value_name("ID").help("Record ID")),
        )
        .subcommand(
            Command::new("clear")
                .about("Discard every cached record and queued operation")
                .arg(Arg::new("force").short('f').long("force").help("Confirm the clear").action(ArgAction::SetTrue)),
        )
        .subcommand(
            Command::new("config")
                .about("Show or change configuration")
                .subcommand(Command::new("show").about("Print every setting"))
                .subcommand(
                    Command::new("get")
                        .about("Print one setting")
                        .arg(Arg::new("key").required(true).value_name("KEY").help("Dotted key, e.g. remote.base_url")),
                )
                .subcommand(
                    Command::new("set")
                        .about("Change one setting in the config file")
                        .arg(Arg::new("key").required(true).value_name("KEY").help("Dotted key, e.g. retry.max_attempts"))
                        .arg(Arg::new("value").required(true).value_name("VALUE").help("New value")),
                )
                .subcommand(Command::new("path").about("Print the config file location"))
                .subcommand(Command::new("reset").about("Restore default settings")),
        )
}

fn open_session(matches: &clap::ArgMatches) -> Result<Session> {
    let manager = match matches.get_one::<String>("config-dir") {
        Some(dir) => ConfigManager::with_directory(PathBuf::from(dir)),
        None => ConfigManager::new(),
    }
    .context("Failed to locate config directory")?;

    let mut config = manager.load_with_env_overrides();
    if let Some(path) = matches.get_one::<String>("database") {
        config.app.database_path = PathBuf::from(path);
    }

    Ok(Session::new(manager, config, matches.get_flag("offline")))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let session = open_session(&matches)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(session.config.app.log_level.to_string()),
    )
    .init();

    let result = match matches.subcommand() {
        Some(("init", _)) => commands::init(&session).await,
        Some(("put", sub_matches)) => commands::put(&session, sub_matches).await,
        Some(("get", sub_matches)) => commands::get(&session, sub_matches).await,
        Some(("list", _)) => commands::list(&session).await,
        Some(("delete", sub_matches)) => commands::delete(&session, sub_matches).await,
        Some(("pending", _)) => commands::pending(&session).await,
        Some(("stats", _)) => commands::stats(&session).await,
        Some(("sync", _)) => commands::sync(&session).await,
        Some(("watch", _)) => commands::watch(&session).await,
        Some(("refresh", sub_matches)) => commands::refresh(&session, sub_matches).await,
        Some(("clear", sub_matches)) => commands::clear(&session, sub_matches).await,
        Some(("config", sub_matches)) => commands::config(&session, sub_matches),
        _ => build_cli().print_help().map_err(Into::into),
    };

    if let Err(err) = &result {
        if let Some(hint) = commands::storage_hint(err) {
            eprintln!("{} {}", console::style("✗").red().bold(), hint);
        }
    }
    result
}
