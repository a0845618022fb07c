//! Command-line plumbing shared by the tutorial binaries.

use clap::Args;
use tinyorm::{EngineConfig, SqliteConnection};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Options every tutorial accepts.
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Database URL (sqlite:///file.db, sqlite:////abs/path.db or sqlite:// for memory)
    #[arg(long)]
    pub database: Option<String>,

    /// Log every SQL statement
    #[arg(long)]
    pub echo: bool,
}

impl EngineArgs {
    /// Open the configured database, falling back to `default_url`.
    pub fn connect(&self, default_url: &str) -> anyhow::Result<SqliteConnection> {
        let url = self.database.as_deref().unwrap_or(default_url);
        let config = EngineConfig::from_url(url)?.echo(self.echo);
        Ok(tinyorm::create_engine_with(config)?)
    }
}

/// Install the tracing subscriber. `RUST_LOG` wins over `--echo`.
pub fn init_tracing(echo: bool) {
    let default = if echo { "tinyorm=info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
