use std::fs;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use clap::Parser;
use tracing::warn;

#[derive(Clone, Debug, Parser)]
#[command(name = "maintrack")]
pub struct Config {
    #[arg(long, env = "MAINTRACK_PORT", default_value_t = 8000)]
    pub port: u16,

    #[arg(long, env = "MAINTRACK_DB_URL", default_value = "sqlite://./maintrack.db")]
    pub db_url: String,

    #[arg(long, env = "MAINTRACK_TOKEN")]
    pub token: Option<String>,

    #[arg(long, env = "MAINTRACK_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "MAINTRACK_STORAGE_DIR", default_value = "./media")]
    pub storage_dir: PathBuf,

    #[arg(long, env = "MAINTRACK_MAX_FILE_SIZE", default_value_t = 10 * 1024 * 1024)]
    pub max_file_size: u64,

    #[arg(long, env = "MAINTRACK_MAX_REQUEST_BODY_BYTES", default_value_t = 12 * 1024 * 1024)]
    pub max_request_body_bytes: usize,

    /// Public origin embedded in asset QR codes.
    #[arg(long, env = "MAINTRACK_BASE_URL", default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Timezone for report timestamps and naive schedule input.
    #[arg(long, env = "MAINTRACK_TIMEZONE", default_value = "Europe/Rome", value_parser = parse_timezone)]
    pub timezone: Tz,
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = <Self as Parser>::parse();
        config.base_url = normalize_base_url(&config.base_url);
        config.validate();
        config
    }

    pub fn auth_enabled(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(|value| !value.trim().is_empty())
    }

    pub fn ensure_storage_dir(&self) -> std::io::Result<()> {
        ensure_directory(&self.storage_dir)
    }

    pub fn log_startup_warnings(&self) {
        if !self.auth_enabled() {
            warn!("MAINTRACK_TOKEN is unset, auth is disabled and all requests are allowed");
        }

        if self.base_url.starts_with("http://localhost") {
            warn!(base_url = %self.base_url, "QR codes will point at a localhost URL");
        }
    }

    fn validate(&self) {
        assert!(
            self.max_file_size > 0,
            "MAINTRACK_MAX_FILE_SIZE must be greater than 0"
        );
        assert!(
            self.max_request_body_bytes > 0,
            "MAINTRACK_MAX_REQUEST_BODY_BYTES must be greater than 0"
        );
        assert!(
            self.base_url.starts_with("http://") || self.base_url.starts_with("https://"),
            "MAINTRACK_BASE_URL must start with http:// or https://"
        );
    }
}

pub fn normalize_base_url(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}

fn parse_timezone(value: &str) -> Result<Tz, String> {
    value
        .trim()
        .parse::<Tz>()
        .map_err(|error| format!("unknown timezone '{value}': {error}"))
}

fn ensure_directory(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)
}
