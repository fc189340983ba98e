//! Service self-update

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{error, info, warn};

use updater_api::SelfUpdateResponse;

use crate::cache::config::{validate_version, ConfigStore};
use crate::deployments::history::DeploymentsPanel;
use crate::errors::ConsoleError;
use crate::http::api::{ConsoleApi, FormFields, PackageUpload, UploadEndpoint};
use crate::http::client::ApiReply;
use crate::logstream::client::LogStreamClient;
use crate::models::forms::SelfUpdateForm;
use crate::sync::resync::resync_console;
use crate::utils::non_blank;
use crate::view::{ConsoleView, Panel};
use crate::workflow::fsm::{TransferEvent, TransferFsm, TransferState};
use crate::workflow::progress::drain_progress;
use crate::workflow::recovery::{await_recovery, RecoveryOptions, RecoveryOutcome};
use crate::workflow::upload::{read_package, require_package, MSG_UPLOADING};

pub const MSG_BUSY: &str = "a self-update is already in progress";

/// How a self-update ended once the package was accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SelfUpdateOutcome {
    /// The new service answered and the console resynced with it
    Recovered { deployment_id: String, attempts: u32 },

    /// The service never answered within the poll ceiling
    Unconfirmed { deployment_id: String, attempts: u32 },

    /// Shutdown interrupted the poll
    Cancelled { deployment_id: String, attempts: u32 },
}

/// Uploads a replacement service binary and waits for the replaced process
/// to come back.
///
/// The server that accepts the package is the process being swapped out, so
/// a 2xx only means the update was queued. Success is confirmed by polling
/// the configuration endpoint until the service answers again.
pub struct SelfUpdateWorkflow {
    api: Arc<dyn ConsoleApi>,
    store: Arc<ConfigStore>,
    logs: Arc<LogStreamClient>,
    history: Arc<DeploymentsPanel>,
    view: Arc<dyn ConsoleView>,
    recovery: RecoveryOptions,
    shutdown: broadcast::Sender<()>,
    fsm: Mutex<TransferFsm>,
}

impl SelfUpdateWorkflow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: Arc<dyn ConsoleApi>,
        store: Arc<ConfigStore>,
        logs: Arc<LogStreamClient>,
        history: Arc<DeploymentsPanel>,
        view: Arc<dyn ConsoleView>,
        recovery: RecoveryOptions,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            api,
            store,
            logs,
            history,
            view,
            recovery,
            shutdown,
            fsm: Mutex::new(TransferFsm::new()),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.fsm.try_lock().is_err()
    }

    /// State left by the last submission, or `None` while one is running
    pub fn state(&self) -> Option<TransferState> {
        self.fsm.try_lock().ok().map(|fsm| *fsm.state())
    }

    /// Validate and upload `form`, then wait for the service to restart.
    pub async fn submit(
        &self,
        form: &mut SelfUpdateForm,
    ) -> Result<SelfUpdateOutcome, ConsoleError> {
        let mut fsm = self.fsm.try_lock().map_err(|_| {
            self.view.set_message(Panel::SelfUpdate, MSG_BUSY);
            ConsoleError::Busy(MSG_BUSY.to_string())
        })?;
        if matches!(fsm.state(), TransferState::Completed | TransferState::Failed) {
            let _ = fsm.process(TransferEvent::Reset);
        }
        fsm.process(TransferEvent::Submit)
            .map_err(ConsoleError::Internal)?;

        let package = match self.validate(form).await {
            Ok(package) => package,
            Err(e) => {
                let _ = fsm.process(TransferEvent::Rejected);
                self.view.set_message(Panel::SelfUpdate, &e.user_message());
                return Err(e);
            }
        };
        fsm.process(TransferEvent::Validated)
            .map_err(ConsoleError::Internal)?;

        info!(
            "Uploading self-update package {} ({} bytes)",
            package.file_name,
            package.len()
        );
        self.view.set_progress(Panel::SelfUpdate, 0);
        self.view.set_message(Panel::SelfUpdate, MSG_UPLOADING);

        let (tx, rx) = mpsc::unbounded_channel();
        let (reply, ()) = tokio::join!(
            self.api.upload_package(
                UploadEndpoint::SelfUpdate,
                package,
                self_update_fields(form),
                tx
            ),
            drain_progress(rx, &mut fsm, self.view.as_ref(), Panel::SelfUpdate),
        );

        let deployment_id = match accepted_self_update(reply) {
            Ok(id) => id,
            Err(e) => {
                let message = e.user_message();
                error!("Self-update failed: {}", message);
                let _ = fsm.process(TransferEvent::Failed(message.clone()));
                let _ = fsm.process(TransferEvent::Reset);
                self.view.set_message(Panel::SelfUpdate, &message);
                return Err(e);
            }
        };

        fsm.process(TransferEvent::Accepted)
            .map_err(ConsoleError::Internal)?;
        self.view.set_progress(Panel::SelfUpdate, 100);
        self.view.set_message(
            Panel::SelfUpdate,
            &format!(
                "self-update accepted, deployment id: {}, waiting for the service to restart",
                deployment_id
            ),
        );
        self.logs.attach(&deployment_id);
        form.reset();

        let max_attempts = self.recovery.max_attempts;
        let view = self.view.clone();
        let outcome = await_recovery(
            &self.recovery,
            self.api.as_ref(),
            tokio::time::sleep,
            self.shutdown_signal(),
            |attempt| {
                let _ = fsm.process(TransferEvent::PollAttempt);
                view.set_message(
                    Panel::SelfUpdate,
                    &format!(
                        "waiting for the service to restart (attempt {}/{})",
                        attempt, max_attempts
                    ),
                );
            },
        )
        .await;

        match outcome {
            RecoveryOutcome::Recovered { attempt } => {
                let _ = fsm.process(TransferEvent::Recovered);
                info!("Service is back after {} checks", attempt);
                resync_console(
                    self.view.as_ref(),
                    &self.logs,
                    &self.store,
                    &self.history,
                )
                .await;
                self.view
                    .set_message(Panel::SelfUpdate, "self-update complete, service restarted");
                Ok(SelfUpdateOutcome::Recovered {
                    deployment_id,
                    attempts: attempt,
                })
            }
            RecoveryOutcome::Exhausted { attempts } => {
                let _ = fsm.process(TransferEvent::RecoveryExhausted);
                warn!(
                    "Self-update {} not confirmed after {} checks",
                    deployment_id, attempts
                );
                Ok(SelfUpdateOutcome::Unconfirmed {
                    deployment_id,
                    attempts,
                })
            }
            RecoveryOutcome::Cancelled { attempts } => {
                let _ = fsm.process(TransferEvent::RecoveryExhausted);
                Ok(SelfUpdateOutcome::Cancelled {
                    deployment_id,
                    attempts,
                })
            }
        }
    }

    async fn validate(&self, form: &SelfUpdateForm) -> Result<PackageUpload, ConsoleError> {
        let path = require_package(form.package.as_ref())?;
        validate_version(&form.target_version)
            .map_err(|msg| ConsoleError::ValidationError(msg.to_string()))?;
        read_package(path).await
    }

    fn shutdown_signal(&self) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        let mut rx = self.shutdown.subscribe();
        Box::pin(async move {
            let _ = rx.recv().await;
        })
    }
}

fn self_update_fields(form: &SelfUpdateForm) -> FormFields {
    let mut fields = FormFields::new();
    if let Some(version) = non_blank(&form.target_version) {
        fields.push(("target_version", version.to_string()));
    }
    if let Some(note) = non_blank(&form.note) {
        fields.push(("note", note.to_string()));
    }
    fields
}

/// Deployment id of an accepted self-update, or the error shown for it
fn accepted_self_update(reply: Result<ApiReply, ConsoleError>) -> Result<String, ConsoleError> {
    let reply = reply.map_err(|e| {
        warn!("Self-update transport failure: {}", e);
        ConsoleError::NetworkError("network error, self-update failed".to_string())
    })?;

    if !reply.is_success() {
        let message = reply
            .error_message()
            .unwrap_or_else(|| format!("self-update failed ({})", reply.status.as_u16()));
        return Err(ConsoleError::ServerError {
            status: reply.status.as_u16(),
            message,
        });
    }

    let response: SelfUpdateResponse = reply.json().unwrap_or_else(|e| {
        warn!("Unreadable self-update response: {}", e);
        SelfUpdateResponse::default()
    });
    Ok(response.id.trim().to_string())
}
