//! File-level changes of a deployment or a dry run

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use updater_api::{ChangeAction, DeploymentDetail, PreviewResponse, PreviewSummary, ReplaceMode};

use crate::cache::config::ConfigStore;
use crate::errors::ConsoleError;
use crate::http::api::{ConsoleApi, FormFields, PackageUpload, UploadEndpoint};
use crate::models::forms::PreviewForm;
use crate::utils::non_blank;
use crate::versioning::format_bytes;
use crate::view::{ChangeRow, ChangesView, ConsoleView, Listing, Panel};
use crate::workflow::fsm::{TransferEvent, TransferFsm};
use crate::workflow::progress::drain_progress;
use crate::workflow::upload::{read_package, require_package, MSG_NO_PROJECT};

pub const NO_IGNORE_RULES: &str = "no replace-ignore rules configured";
pub const NO_FILE_CHANGES: &str = "no file changes";
pub const MSG_LOADING: &str = "loading...";

/// Build the changes modal for one deployment record.
///
/// `fallback_rules` stands in when the record carries no replace-ignore
/// snapshot of its own.
pub fn derive_changes_view(
    detail: &DeploymentDetail,
    fallback_rules: &[String],
    summary: Option<&PreviewSummary>,
) -> ChangesView {
    let or_dash = |value: Option<&String>| {
        value
            .and_then(|v| non_blank(v))
            .unwrap_or("-")
            .to_string()
    };
    let project = detail
        .project_name
        .as_ref()
        .filter(|name| !name.trim().is_empty())
        .or(detail.project_id.as_ref());
    let kind = detail.kind.map(|k| k.as_str()).unwrap_or("-");
    let header = format!(
        "project: {} | type: {} | version: {} | status: {} | mode: {}",
        or_dash(project),
        kind,
        or_dash(detail.version.as_ref()),
        or_dash(detail.status.as_ref()),
        or_dash(detail.replace_mode.as_ref()),
    );

    let rules = match detail.replace_ignore.as_deref() {
        Some(rules) if !rules.is_empty() => rules,
        _ => fallback_rules,
    };
    let rules = rules
        .iter()
        .filter_map(|rule| non_blank(rule))
        .map(str::to_string)
        .collect();

    let files = detail
        .changed
        .iter()
        .map(|entry| ChangeRow {
            action: entry.action,
            path: non_blank(&entry.path).unwrap_or("-").to_string(),
            size: match entry.action {
                ChangeAction::Deleted => None,
                _ => Some(format_bytes(entry.size.unwrap_or(0) as f64)),
            },
        })
        .collect();

    ChangesView {
        header,
        ignore_rules: Listing::from_items(rules, NO_IGNORE_RULES),
        files: Listing::from_items(files, NO_FILE_CHANGES),
        summary: summary.map(|s| {
            format!(
                "total {} | added {} | updated {} | deleted {} | ignored {}",
                s.total, s.added, s.updated, s.deleted, s.ignored_paths
            )
        }),
    }
}

/// Opens the changes modal for finished deployments and for dry runs
pub struct ChangesViewer {
    api: Arc<dyn ConsoleApi>,
    store: Arc<ConfigStore>,
    view: Arc<dyn ConsoleView>,
}

impl ChangesViewer {
    pub fn new(
        api: Arc<dyn ConsoleApi>,
        store: Arc<ConfigStore>,
        view: Arc<dyn ConsoleView>,
    ) -> Self {
        Self { api, store, view }
    }

    /// Fetch one deployment record and render its changes.
    ///
    /// Failures only change the modal subtitle. A blank id does nothing.
    pub async fn show(&self, deployment_id: &str) -> Result<Option<ChangesView>, ConsoleError> {
        let Some(deployment_id) = non_blank(deployment_id) else {
            return Ok(None);
        };

        self.view.open_changes(&format!("changes - {}", deployment_id));
        self.view.set_changes_subtitle(MSG_LOADING);

        let reply = match self.api.fetch_deployment(deployment_id).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Failed to fetch deployment {}: {}", deployment_id, e);
                self.view.set_changes_subtitle("failed to load");
                return Err(e);
            }
        };
        if !reply.is_success() {
            let message = format!("failed to load ({})", reply.status.as_u16());
            self.view.set_changes_subtitle(&message);
            return Err(ConsoleError::ServerError {
                status: reply.status.as_u16(),
                message,
            });
        }
        let detail: DeploymentDetail = match reply.json() {
            Ok(detail) => detail,
            Err(e) => {
                warn!("Unreadable deployment {}: {}", deployment_id, e);
                self.view.set_changes_subtitle("failed to load");
                return Err(e);
            }
        };

        let changes = derive_changes_view(&detail, &self.fallback_rules(&detail), None);
        debug!(
            "Deployment {} lists {} changed files",
            deployment_id,
            detail.changed.len()
        );
        self.view.render_changes(&changes);
        Ok(Some(changes))
    }

    /// Dry-run a package against a project and render what would change
    pub async fn preview(&self, form: &PreviewForm) -> Result<ChangesView, ConsoleError> {
        let (package, project_id) = match self.validate(form).await {
            Ok(checked) => checked,
            Err(e) => {
                self.view.set_message(Panel::Preview, &e.user_message());
                return Err(e);
            }
        };

        let mut fields: FormFields = vec![("project_id", project_id.clone())];
        if let Some(mode) = form.replace_mode.as_deref().and_then(non_blank) {
            fields.push(("replace_mode", ReplaceMode::normalize(mode).to_string()));
        }

        info!("Previewing {} against project {}", package.file_name, project_id);
        self.view.set_progress(Panel::Preview, 0);
        self.view.set_message(Panel::Preview, "analyzing package...");

        let mut fsm = TransferFsm::new();
        let _ = fsm.process(TransferEvent::Submit);
        let _ = fsm.process(TransferEvent::Validated);
        let (tx, rx) = mpsc::unbounded_channel();
        let (reply, ()) = tokio::join!(
            self.api
                .upload_package(UploadEndpoint::Preview, package, fields, tx),
            drain_progress(rx, &mut fsm, self.view.as_ref(), Panel::Preview),
        );

        let reply = reply.map_err(|e| {
            warn!("Preview transport failure: {}", e);
            self.view
                .set_message(Panel::Preview, "network error, preview failed");
            ConsoleError::NetworkError("network error, preview failed".to_string())
        })?;
        if !reply.is_success() {
            let message = reply
                .error_message()
                .unwrap_or_else(|| format!("preview failed ({})", reply.status.as_u16()));
            self.view.set_message(Panel::Preview, &message);
            return Err(ConsoleError::ServerError {
                status: reply.status.as_u16(),
                message,
            });
        }
        let preview: PreviewResponse = reply.json().map_err(|e| {
            self.view.set_message(Panel::Preview, "preview failed");
            e
        })?;

        self.view.set_progress(Panel::Preview, 100);
        self.view.set_message(Panel::Preview, "preview ready");

        let summary = preview.summary.clone();
        let mut detail = DeploymentDetail::from(preview);
        if detail.project_id.as_deref().and_then(non_blank).is_none() {
            detail.project_id = Some(project_id.clone());
        }
        let changes = derive_changes_view(&detail, &self.fallback_rules(&detail), Some(&summary));

        self.view.open_changes(&format!("preview - {}", project_id));
        self.view.render_changes(&changes);
        Ok(changes)
    }

    async fn validate(&self, form: &PreviewForm) -> Result<(PackageUpload, String), ConsoleError> {
        let path = require_package(form.package.as_ref())?;
        let project_id = form
            .project_id
            .as_deref()
            .and_then(non_blank)
            .map(str::to_string)
            .or_else(|| self.store.active_project_id())
            .ok_or_else(|| ConsoleError::ValidationError(MSG_NO_PROJECT.to_string()))?;
        let package = read_package(path).await?;
        Ok((package, project_id))
    }

    /// Rules of the record's own project when cached, else the active one's
    fn fallback_rules(&self, detail: &DeploymentDetail) -> Vec<String> {
        detail
            .project_id
            .as_deref()
            .and_then(|id| self.store.project(id))
            .or_else(|| self.store.active_project())
            .map(|project| project.replace_ignore)
            .unwrap_or_default()
    }
}
