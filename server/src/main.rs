use anyhow::Result;
use clap::Parser;
use notelite::{
    api,
    config::{Cli, Command, Config},
    db, seed,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli)?;

    let default_level = if config.logging_enabled { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => api::run_http_server(config).await,
        Command::Seed => {
            std::fs::create_dir_all(&config.data_dir)?;
            let conn = db::init_db(config.db_path())?;
            seed::seed(&conn)
        }
    }
}
