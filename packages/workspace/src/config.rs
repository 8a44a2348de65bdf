//! Host configuration from the command line.

use clap::Parser;
use pagesync_preview::{ConfigError, SyncConfig};
use std::path::PathBuf;

/// Pagesync host - serves pages and live previews of their edits
#[derive(Parser, Debug, Clone)]
#[command(name = "pagesync-server")]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// HTTP port to listen on
    #[arg(short, long, default_value_t = 3030)]
    pub port: u16,

    /// Public base URL render surfaces load pages from
    #[arg(long, default_value = "http://127.0.0.1:3030/")]
    pub base_url: String,

    /// JSON file with sync timings (debounce, fallback, thresholds)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Register a demo page under the handle "demo"
    #[arg(long)]
    pub seed_demo: bool,
}

impl ServerConfig {
    pub fn sync_config(&self) -> Result<SyncConfig, ConfigError> {
        match &self.config {
            Some(path) => SyncConfig::from_json_file(path),
            None => Ok(SyncConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::parse_from(["pagesync-server"]);

        assert_eq!(config.port, 3030);
        assert!(!config.seed_demo);
        assert_eq!(config.sync_config().unwrap(), SyncConfig::default());
    }

    #[test]
    fn test_flags() {
        let config = ServerConfig::parse_from([
            "pagesync-server",
            "--port",
            "8080",
            "--base-url",
            "https://pages.example/",
            "--seed-demo",
        ]);

        assert_eq!(config.port, 8080);
        assert_eq!(config.base_url, "https://pages.example/");
        assert!(config.seed_demo);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let config = ServerConfig::parse_from(["pagesync-server", "--config", "/nonexistent/sync.json"]);

        assert!(config.sync_config().is_err());
    }
}
