//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::http::client::ClientOptions;
use crate::storage::settings::Settings;
use crate::workflow::recovery::RecoveryOptions;

/// Main console options
#[derive(Debug, Clone)]
pub struct ConsoleOptions {
    /// Update service connection
    pub client: ClientOptions,

    /// Self-update recovery poll
    pub recovery: RecoveryOptions,

    /// Log stream reconnect delay until the server advertises one
    pub stream_retry_delay: Duration,

    /// Deployments shown per history page
    pub history_page_size: u32,

    /// Shell line history; none keeps history in memory only
    pub shell_history: Option<PathBuf>,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            client: ClientOptions::default(),
            recovery: RecoveryOptions::default(),
            stream_retry_delay: Duration::from_millis(3000),
            history_page_size: 20,
            shell_history: None,
        }
    }
}

impl ConsoleOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            client: ClientOptions {
                base_url: settings.server.base_url.clone(),
                session_cookie: settings.server.session_cookie.clone(),
                session_token: settings
                    .server
                    .session_token
                    .clone()
                    .map(SecretString::from),
                connect_timeout: Duration::from_secs(settings.server.connect_timeout_secs),
                upload_chunk_size: settings.upload.chunk_size_kib.max(1) * 1024,
            },
            recovery: RecoveryOptions {
                interval: Duration::from_secs(settings.recovery.interval_secs),
                max_attempts: settings.recovery.max_attempts,
            },
            stream_retry_delay: Duration::from_millis(settings.stream.retry_delay_ms),
            history_page_size: settings.history.page_size,
            shell_history: None,
        }
    }
}
