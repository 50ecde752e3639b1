//! Runtime configuration
//!
//! All settings come from environment variables so the server can be
//! launched by an MCP client without extra arguments.

use std::path::PathBuf;
use std::time::Duration;

/// Default log directive when neither `NUTRILOG_LOG` nor `RUST_LOG` is set
pub const DEFAULT_LOG_DIRECTIVE: &str = "nutrilog=info";

const DEFAULT_DETECTION_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    /// Endpoint of the food image recognition service, if photo lookup is enabled
    pub detection_url: Option<String>,
    pub detection_timeout: Duration,
    pub log_directive: String,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = lookup("NUTRILOG_DATABASE_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path);

        let detection_url = lookup("NUTRILOG_DETECTION_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let detection_timeout = lookup("NUTRILOG_DETECTION_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_DETECTION_TIMEOUT_SECS));

        let log_directive = lookup("NUTRILOG_LOG")
            .filter(|v| !v.trim().is_empty())
            .or_else(|| lookup("RUST_LOG").filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_LOG_DIRECTIVE.to_string());

        Self {
            database_path,
            detection_url,
            detection_timeout,
            log_directive,
        }
    }
}

/// `<project>/data/nutrilog.db`, resolved from the executable location
fn default_database_path() -> PathBuf {
    let mut path = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."));

    // Go up from target/release or target/debug to project root
    if path.ends_with("release") || path.ends_with("debug") {
        if let Some(grandparent) = path.parent().and_then(|p| p.parent()) {
            path = grandparent.to_path_buf();
        }
    }

    path.push("data");
    path.push("nutrilog.db");
    path
}
