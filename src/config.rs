use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::analysis::DEFAULT_HISTORY_LIMIT;

const DEFAULT_BIND: &str = "127.0.0.1:8000";
const DEFAULT_DATABASE: &str = "chemviz.sqlite3";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_WORKERS: usize = 4;

/// Command-line flags for `chemviz-server`. Each one overrides the
/// matching field from the config file.
#[derive(Debug, Default, Parser)]
#[command(name = "chemviz-server", version, about = "Equipment CSV analysis service")]
pub struct ServerArgs {
    /// JSON config file
    #[arg(long, env = "CHEMVIZ_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:8000
    #[arg(long, env = "CHEMVIZ_BIND")]
    pub bind: Option<String>,

    /// SQLite database file
    #[arg(long = "db", env = "CHEMVIZ_DB")]
    pub database_path: Option<PathBuf>,

    #[arg(long, env = "CHEMVIZ_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "CHEMVIZ_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Number of uploads retained in history
    #[arg(long)]
    pub history_limit: Option<usize>,

    /// Request handler threads
    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub database_path: PathBuf,
    pub username: Option<String>,
    pub password: Option<String>,
    pub history_limit: usize,
    pub max_upload_bytes: usize,
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.into(),
            database_path: PathBuf::from(DEFAULT_DATABASE),
            username: None,
            password: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            workers: DEFAULT_WORKERS,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Defaults, then the config file, then flags and environment.
    pub fn resolve(args: &ServerArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(bind) = &args.bind {
            config.bind = bind.clone();
        }
        if let Some(path) = &args.database_path {
            config.database_path = path.clone();
        }
        if let Some(username) = &args.username {
            config.username = Some(username.clone());
        }
        if let Some(password) = &args.password {
            config.password = Some(password.clone());
        }
        if let Some(limit) = args.history_limit {
            config.history_limit = limit;
        }
        if let Some(workers) = args.workers {
            config.workers = workers;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.username.as_deref().unwrap_or_default().is_empty()
            || self.password.as_deref().unwrap_or_default().is_empty()
        {
            bail!("server credentials are not configured (set --username and --password)");
        }
        if self.history_limit == 0 {
            bail!("history_limit must be at least 1");
        }
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        if self.max_upload_bytes == 0 {
            bail!("max_upload_bytes must be at least 1");
        }
        Ok(())
    }
}
