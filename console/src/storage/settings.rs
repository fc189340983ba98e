//! Settings file management

use serde::{Deserialize, Serialize};

use crate::errors::ConsoleError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

pub const ENV_BASE_URL: &str = "UPDATER_CONSOLE_BASE_URL";
pub const ENV_SESSION: &str = "UPDATER_CONSOLE_SESSION";

/// Console settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Update service connection
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub upload: UploadSettings,

    /// Self-update recovery poll
    #[serde(default)]
    pub recovery: RecoverySettings,

    /// Deployment log stream
    #[serde(default)]
    pub stream: StreamSettings,

    /// Deployment history panel
    #[serde(default)]
    pub history: HistorySettings,
}

impl Settings {
    /// Read `file`, using defaults when it does not exist, then apply
    /// environment overrides.
    pub async fn load(file: &File) -> Result<Self, ConsoleError> {
        let mut settings: Settings = file.read_json_or_default().await?;
        settings.apply_env(|name| std::env::var(name).ok());
        Ok(settings)
    }

    /// Override connection fields from the environment
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.server.base_url = url.trim().to_string();
        }
        if let Some(token) = var(ENV_SESSION).filter(|v| !v.trim().is_empty()) {
            self.server.session_token = Some(token.trim().to_string());
        }
    }
}

/// Update service connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Base URL of the update service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the session cookie
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,

    /// Session token sent as the cookie value
    #[serde(default)]
    pub session_token: Option<String>,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_session_cookie() -> String {
    "updater_session".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            session_cookie: default_session_cookie(),
            session_token: None,
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Package upload settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSettings {
    /// Size of the body chunks progress is reported for
    #[serde(default = "default_chunk_size")]
    pub chunk_size_kib: usize,
}

fn default_chunk_size() -> usize {
    64
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            chunk_size_kib: default_chunk_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverySettings {
    #[serde(default = "default_recovery_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_recovery_attempts")]
    pub max_attempts: u32,
}

fn default_recovery_interval() -> u64 {
    2
}

fn default_recovery_attempts() -> u32 {
    60
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            interval_secs: default_recovery_interval(),
            max_attempts: default_recovery_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Reconnect delay until the server advertises one
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_retry_delay() -> u64 {
    3000
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            retry_delay_ms: default_retry_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySettings {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    20
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}
