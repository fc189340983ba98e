//! Deployment package upload

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use updater_api::{ReplaceMode, UploadResponse};

use crate::cache::config::{validate_version, ConfigStore};
use crate::deployments::history::DeploymentsPanel;
use crate::errors::ConsoleError;
use crate::http::api::{ConsoleApi, FormFields, PackageUpload, UploadEndpoint};
use crate::http::client::ApiReply;
use crate::logstream::client::LogStreamClient;
use crate::models::forms::UploadForm;
use crate::utils::non_blank;
use crate::view::{ConsoleView, Panel};
use crate::workflow::fsm::{TransferEvent, TransferFsm, TransferState};
use crate::workflow::progress::drain_progress;

pub const MSG_NO_PACKAGE: &str = "please choose a package file";
pub const MSG_NO_PROJECT: &str = "please choose a project";
pub const MSG_UPLOADING: &str = "uploading...";
pub const MSG_BUSY: &str = "an upload is already in progress";

/// What the server reported for an accepted upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    pub deployment_id: String,
    pub project_id: String,
    pub project_name: String,
    pub version: String,
}

/// Validates and submits deployment packages, one at a time.
///
/// A successful upload attaches the log stream to the new deployment,
/// refreshes the history panel and silently reloads the configuration of the
/// project it went to.
pub struct UploadWorkflow {
    api: Arc<dyn ConsoleApi>,
    store: Arc<ConfigStore>,
    logs: Arc<LogStreamClient>,
    history: Arc<DeploymentsPanel>,
    view: Arc<dyn ConsoleView>,
    fsm: Mutex<TransferFsm>,
}

impl UploadWorkflow {
    pub fn new(
        api: Arc<dyn ConsoleApi>,
        store: Arc<ConfigStore>,
        logs: Arc<LogStreamClient>,
        history: Arc<DeploymentsPanel>,
        view: Arc<dyn ConsoleView>,
    ) -> Self {
        Self {
            api,
            store,
            logs,
            history,
            view,
            fsm: Mutex::new(TransferFsm::new()),
        }
    }

    /// True while a submission holds the workflow
    pub fn is_busy(&self) -> bool {
        self.fsm.try_lock().is_err()
    }

    /// State left by the last submission, or `None` while one is running
    pub fn state(&self) -> Option<TransferState> {
        self.fsm.try_lock().ok().map(|fsm| *fsm.state())
    }

    /// Validate `form` and upload its package.
    ///
    /// The form is reset only when the server accepted the package.
    pub async fn submit(&self, form: &mut UploadForm) -> Result<UploadReceipt, ConsoleError> {
        let mut fsm = self.fsm.try_lock().map_err(|_| {
            self.view.set_message(Panel::Upload, MSG_BUSY);
            ConsoleError::Busy(MSG_BUSY.to_string())
        })?;
        if matches!(fsm.state(), TransferState::Completed | TransferState::Failed) {
            let _ = fsm.process(TransferEvent::Reset);
        }
        fsm.process(TransferEvent::Submit)
            .map_err(ConsoleError::Internal)?;

        let (package, project_id) = match self.validate(form).await {
            Ok(checked) => checked,
            Err(e) => {
                let _ = fsm.process(TransferEvent::Rejected);
                self.view.set_message(Panel::Upload, &e.user_message());
                return Err(e);
            }
        };
        fsm.process(TransferEvent::Validated)
            .map_err(ConsoleError::Internal)?;

        let fields = upload_fields(form, &project_id);
        info!(
            "Uploading {} ({} bytes) to project {}",
            package.file_name,
            package.len(),
            project_id
        );
        self.view.set_progress(Panel::Upload, 0);
        self.view.set_message(Panel::Upload, MSG_UPLOADING);

        let (tx, rx) = mpsc::unbounded_channel();
        let (reply, ()) = tokio::join!(
            self.api
                .upload_package(UploadEndpoint::Upload, package, fields, tx),
            drain_progress(rx, &mut fsm, self.view.as_ref(), Panel::Upload),
        );

        let receipt = match accepted_upload(reply, &project_id) {
            Ok(receipt) => receipt,
            Err(e) => {
                let message = e.user_message();
                error!("Upload failed: {}", message);
                let _ = fsm.process(TransferEvent::Failed(message.clone()));
                let _ = fsm.process(TransferEvent::Reset);
                self.view.set_message(Panel::Upload, &message);
                return Err(e);
            }
        };

        let message = format!(
            "upload complete, deployment id: {}, project: {}, target version: {}",
            receipt.deployment_id, receipt.project_name, receipt.version
        );
        info!("{}", message);
        self.view.set_message(Panel::Upload, &message);

        self.logs.attach(&receipt.deployment_id);
        self.history.refresh_first_page().await;
        if let Err(e) = self.store.load(Some(&receipt.project_id), true).await {
            warn!("Configuration refresh after upload failed: {}", e);
        }
        form.reset();

        fsm.process(TransferEvent::Succeeded)
            .map_err(ConsoleError::Internal)?;
        self.view.set_progress(Panel::Upload, 100);
        Ok(receipt)
    }

    async fn validate(&self, form: &UploadForm) -> Result<(PackageUpload, String), ConsoleError> {
        let path = require_package(form.package.as_ref())?;
        let project_id = form
            .project_id
            .as_deref()
            .and_then(non_blank)
            .map(str::to_string)
            .or_else(|| self.store.active_project_id())
            .ok_or_else(|| ConsoleError::ValidationError(MSG_NO_PROJECT.to_string()))?;
        validate_version(&form.target_version)
            .map_err(|msg| ConsoleError::ValidationError(msg.to_string()))?;

        let package = read_package(path).await?;
        Ok((package, project_id))
    }
}

/// The attached package path, if any
pub(crate) fn require_package(package: Option<&PathBuf>) -> Result<&Path, ConsoleError> {
    package
        .map(PathBuf::as_path)
        .filter(|path| !path.as_os_str().is_empty())
        .ok_or_else(|| ConsoleError::ValidationError(MSG_NO_PACKAGE.to_string()))
}

/// Read a package file; an unreadable file counts as a rejected form
pub(crate) async fn read_package(path: &Path) -> Result<PackageUpload, ConsoleError> {
    PackageUpload::from_path(path).await.map_err(|e| match e {
        ConsoleError::ValidationError(msg) => ConsoleError::ValidationError(msg),
        other => ConsoleError::ValidationError(format!(
            "cannot read package {}: {}",
            path.display(),
            other
        )),
    })
}

fn upload_fields(form: &UploadForm, project_id: &str) -> FormFields {
    let mut fields: FormFields = vec![("project_id", project_id.to_string())];
    if let Some(version) = non_blank(&form.target_version) {
        fields.push(("target_version", version.to_string()));
    }
    if let Some(mode) = form.replace_mode.as_deref().and_then(non_blank) {
        fields.push(("replace_mode", ReplaceMode::normalize(mode).to_string()));
    }
    if let Some(note) = non_blank(&form.note) {
        fields.push(("note", note.to_string()));
    }
    fields
}

/// Map a transfer reply to a receipt, or to the error shown for it
fn accepted_upload(
    reply: Result<ApiReply, ConsoleError>,
    project_id: &str,
) -> Result<UploadReceipt, ConsoleError> {
    let reply = reply.map_err(|e| {
        warn!("Upload transport failure: {}", e);
        ConsoleError::NetworkError("network error, upload failed".to_string())
    })?;

    if !reply.is_success() {
        let message = reply
            .error_message()
            .unwrap_or_else(|| format!("upload failed ({})", reply.status.as_u16()));
        return Err(ConsoleError::ServerError {
            status: reply.status.as_u16(),
            message,
        });
    }

    let response: UploadResponse = reply.json().unwrap_or_else(|e| {
        warn!("Unreadable upload response: {}", e);
        UploadResponse::default()
    });
    let project_id = non_blank(&response.project_id)
        .unwrap_or(project_id)
        .to_string();
    let project_name = non_blank(&response.project_name)
        .unwrap_or(project_id.as_str())
        .to_string();
    Ok(UploadReceipt {
        deployment_id: response.id.trim().to_string(),
        version: non_blank(&response.version).unwrap_or("-").to_string(),
        project_id,
        project_name,
    })
}
