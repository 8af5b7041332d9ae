use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;

/// Command line options for the server.
#[derive(Parser, Debug, Default)]
#[command(author, version, about)]
pub struct Cli {
    /// Override bind address (host:port).
    #[arg(long)]
    pub bind: Option<String>,
    /// Override server port.
    #[arg(long)]
    pub port: Option<u16>,
    /// Enable or disable logging (true/false).
    #[arg(long)]
    pub logging: Option<bool>,
    /// Path to configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Directory holding the database and uploaded files.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Insert the demo users and documents.
    Seed,
}

#[derive(Clone)]
pub struct Bootstrap {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

impl std::fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrap")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .finish()
    }
}

/// Runtime configuration for the server resolved from file, env and CLI.
#[derive(Clone, Debug)]
pub struct Config {
    /// Address to bind the HTTP server to.
    pub bind: String,
    /// Base directory for the database and uploaded files.
    pub data_dir: PathBuf,
    /// Maximum image size in megabytes.
    pub max_upload_mb: u64,
    /// Whether verbose logging is enabled.
    pub logging_enabled: bool,
    /// Lifetime of issued session tokens.
    pub token_ttl_hours: i64,
    /// Seconds between orphan file sweeps, 0 disables the sweep.
    pub sweep_interval_secs: u64,
    /// Account created on start if it does not exist yet.
    pub bootstrap: Option<Bootstrap>,
}

#[derive(Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    bootstrap: Option<FileBootstrap>,
    #[serde(default)]
    server: FileServer,
    #[serde(default)]
    logging: FileLogging,
    #[serde(default)]
    uploads: FileUploads,
}

#[derive(Deserialize)]
struct FileBootstrap {
    email: String,
    password: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct FileServer {
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_token_ttl")]
    token_ttl_hours: i64,
}

#[derive(Deserialize)]
struct FileLogging {
    #[serde(default = "default_logging")]
    enabled: bool,
}

#[derive(Deserialize)]
struct FileUploads {
    #[serde(default = "default_max_upload")]
    max_mb: u64,
    #[serde(default = "default_sweep_interval")]
    sweep_interval_secs: u64,
}

fn default_port() -> u16 {
    8787
}

fn default_logging() -> bool {
    true
}

fn default_token_ttl() -> i64 {
    24
}

fn default_max_upload() -> u64 {
    5
}

fn default_sweep_interval() -> u64 {
    300
}

impl Default for FileServer {
    fn default() -> Self {
        Self {
            port: default_port(),
            token_ttl_hours: default_token_ttl(),
        }
    }
}

impl Default for FileLogging {
    fn default() -> Self {
        Self {
            enabled: default_logging(),
        }
    }
}

impl Default for FileUploads {
    fn default() -> Self {
        Self {
            max_mb: default_max_upload(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl Config {
    /// Resolve configuration from CLI, environment variables, config file and defaults.
    pub fn load(cli: &Cli) -> Result<Self> {
        // built-in defaults
        let mut port = default_port();
        let mut logging = default_logging();
        let mut token_ttl_hours = default_token_ttl();
        let mut max_upload_mb = default_max_upload();
        let mut sweep_interval_secs = default_sweep_interval();
        let mut bootstrap: Option<Bootstrap> = None;

        // config file path precedence: CLI -> ENV -> default
        let config_path = cli
            .config
            .clone()
            .or_else(|| std::env::var("NOTELITE_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("config/notelite.toml"));

        if let Ok(bytes) = fs::read(&config_path) {
            let contents = String::from_utf8_lossy(&bytes);
            let file_cfg: FileConfig = toml::from_str(&contents).context("invalid config file")?;
            if let Some(b) = file_cfg.bootstrap {
                bootstrap = Some(Bootstrap {
                    email: b.email,
                    password: b.password,
                    name: b.name,
                });
            }
            port = file_cfg.server.port;
            token_ttl_hours = file_cfg.server.token_ttl_hours;
            logging = file_cfg.logging.enabled;
            max_upload_mb = file_cfg.uploads.max_mb;
            sweep_interval_secs = file_cfg.uploads.sweep_interval_secs;
        }

        // environment overrides
        if let Ok(p) = std::env::var("NOTELITE_PORT") {
            if let Ok(p) = p.parse::<u16>() {
                port = p;
            }
        }
        if let Ok(l) = std::env::var("NOTELITE_LOGGING") {
            if let Ok(l) = l.parse::<bool>() {
                logging = l;
            }
        }
        if let Some(mb) = std::env::var("MAX_UPLOAD_MB")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            max_upload_mb = mb;
        }

        // CLI overrides
        if let Some(p) = cli.port {
            port = p;
        }
        if let Some(l) = cli.logging {
            logging = l;
        }

        if !(1024..=65535).contains(&port) {
            anyhow::bail!("invalid_port");
        }
        if token_ttl_hours <= 0 {
            anyhow::bail!("invalid_token_ttl");
        }

        // bind address precedence for host override
        let bind = if let Some(b) = &cli.bind {
            b.clone()
        } else if let Ok(b) = std::env::var("BIND") {
            b
        } else {
            format!("127.0.0.1:{}", port)
        };

        let data_dir = cli
            .data_dir
            .clone()
            .or_else(|| std::env::var("DATA_DIR").ok().map(PathBuf::from))
            .unwrap_or_else(default_data_dir);

        Ok(Self {
            bind,
            data_dir,
            max_upload_mb,
            logging_enabled: logging,
            token_ttl_hours,
            sweep_interval_secs,
            bootstrap,
        })
    }

    /// Config for a server rooted at `data_dir` with every other value at its default.
    pub fn with_data_dir(bind: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            bind: bind.into(),
            data_dir: data_dir.into(),
            max_upload_mb: default_max_upload(),
            logging_enabled: default_logging(),
            token_ttl_hours: default_token_ttl(),
            sweep_interval_secs: 0,
            bootstrap: None,
        }
    }

    /// Helper to return the upload limit in bytes.
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("notelite.db")
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }
}

/// Determine the default data directory.
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("NOTELITE_DATA_DIR") {
        PathBuf::from(dir)
    } else if let Ok(home) = std::env::var("HOME") {
        let mut p = PathBuf::from(home);
        p.push(".local/share/notelite");
        p
    } else {
        PathBuf::from("./notelite_data")
    }
}
