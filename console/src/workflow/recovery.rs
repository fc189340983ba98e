//! Service recovery poll

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use http::StatusCode;
use tracing::{debug, info, warn};

use crate::http::api::ConsoleApi;

/// Recovery poll options
#[derive(Debug, Clone)]
pub struct RecoveryOptions {
    /// Delay before each check
    pub interval: Duration,

    /// Checks sent before giving up
    pub max_attempts: u32,
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 60,
        }
    }
}

/// How a recovery poll ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The service answered on this attempt
    Recovered { attempt: u32 },

    /// Every attempt went unanswered
    Exhausted { attempts: u32 },

    /// Shutdown was requested after this many attempts
    Cancelled { attempts: u32 },
}

/// True when a check reply proves the service process is up.
///
/// A 401 counts: the replaced process no longer knows the old session, but
/// it is answering.
pub fn is_alive(status: StatusCode) -> bool {
    status.is_success() || status == StatusCode::UNAUTHORIZED
}

/// Poll the configuration endpoint at a fixed interval until the service
/// answers, the attempt ceiling is reached, or shutdown is signalled.
///
/// `on_attempt` runs right before each check with the 1-based attempt number.
pub async fn await_recovery<S, F>(
    options: &RecoveryOptions,
    api: &dyn ConsoleApi,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
    mut on_attempt: impl FnMut(u32),
) -> RecoveryOutcome
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!(
        "Waiting for the service to come back ({} x {:?})",
        options.max_attempts, options.interval
    );

    for attempt in 1..=options.max_attempts {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Recovery poll cancelled");
                return RecoveryOutcome::Cancelled { attempts: attempt - 1 };
            }
            _ = sleep_fn(options.interval) => {}
        }

        on_attempt(attempt);
        let check = tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Recovery poll cancelled");
                return RecoveryOutcome::Cancelled { attempts: attempt };
            }
            check = api.fetch_config() => check,
        };

        match check {
            Ok(reply) if is_alive(reply.status) => {
                info!("Service answered {} on attempt {}", reply.status, attempt);
                return RecoveryOutcome::Recovered { attempt };
            }
            Ok(reply) => debug!("Recovery check {} answered {}", attempt, reply.status),
            Err(e) => debug!("Recovery check {} failed: {}", attempt, e),
        }
    }

    warn!(
        "Service did not answer after {} attempts",
        options.max_attempts
    );
    RecoveryOutcome::Exhausted {
        attempts: options.max_attempts,
    }
}
