use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use schoolboard_server::config::Config;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Overrides RUST_PORT.
    #[arg(long)]
    port: Option<u16>,

    /// Overrides DATABASE_PATH.
    #[arg(long)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply the schema and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load().context("loading configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database) = args.database {
        config.database_path = database;
    }

    match args.command {
        Some(Command::Migrate) => schoolboard_server::migrate(&config).context("migrating")?,
        None => schoolboard_server::start_server(config)
            .await
            .context("serving")?,
    }

    Ok(())
}
