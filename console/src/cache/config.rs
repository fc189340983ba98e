//! Configuration cache

use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, info, warn};

use updater_api::{parse_config_payload, ConfigPayload, Project, SystemConfig, WriteResponse};

use crate::errors::ConsoleError;
use crate::http::api::ConsoleApi;
use crate::http::client::ApiReply;
use crate::models::forms::{NewProjectForm, ProjectConfigForm, SystemConfigForm};
use crate::sync::projects::{derive_views, resolve_active_project, select_fallback};
use crate::versioning::is_valid_version;
use crate::view::{ConsoleView, ConsoleViews, Panel};

pub const MSG_LOADED: &str = "configuration loaded";
pub const MSG_LOAD_FAILED: &str = "failed to read configuration";
pub const MSG_SAVING: &str = "saving...";

/// Server configuration as last read, after normalization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSnapshot {
    pub system: SystemConfig,
    pub projects: Vec<Project>,
    pub default_project_id: String,
}

impl ConfigSnapshot {
    /// Enforce project invariants on a freshly read payload.
    ///
    /// Projects without an id and repeated ids are dropped (the first one
    /// wins), and a `current_version` that is not `MAJOR.MINOR.PATCH` becomes
    /// absent.
    pub fn from_payload(payload: ConfigPayload) -> Self {
        let mut seen = HashSet::new();
        let mut projects = Vec::with_capacity(payload.projects.len());

        for mut project in payload.projects {
            project.id = project.id.trim().to_string();
            if project.id.is_empty() {
                warn!("Dropping project without an id: {:?}", project.name);
                continue;
            }
            if !seen.insert(project.id.clone()) {
                warn!("Dropping duplicate project id {}", project.id);
                continue;
            }

            project.current_version = match project.current_version.take() {
                Some(version) if version.trim().is_empty() => None,
                Some(version) if is_valid_version(&version) => Some(version.trim().to_string()),
                Some(version) => {
                    warn!(
                        "Ignoring invalid current_version {:?} of project {}",
                        version, project.id
                    );
                    None
                }
                None => None,
            };
            projects.push(project);
        }

        Self {
            system: payload.system,
            projects,
            default_project_id: payload.default_project_id.trim().to_string(),
        }
    }
}

/// Result of a confirmed write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Status line as shown to the operator
    pub message: String,

    /// Fields the server says only take effect after a restart
    pub restart_fields: Vec<String>,

    pub active_project_id: Option<String>,
}

#[derive(Debug, Default)]
struct StoreState {
    snapshot: Option<ConfigSnapshot>,
    active_project_id: Option<String>,
}

/// Single owner of the cached configuration and the active project.
///
/// Cache replacement and the re-render it causes happen under one write
/// guard, so no surface can observe a half-applied snapshot. Loads are not
/// serialized: when two overlap, whichever response resolves last is what
/// stays applied.
pub struct ConfigStore {
    api: Arc<dyn ConsoleApi>,
    view: Arc<dyn ConsoleView>,
    state: RwLock<StoreState>,
}

impl ConfigStore {
    pub fn new(api: Arc<dyn ConsoleApi>, view: Arc<dyn ConsoleView>) -> Self {
        Self {
            api,
            view,
            state: RwLock::new(StoreState::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Read the configuration and replace the cache with it.
    ///
    /// `preferred` heads the active-project fallback chain. A `silent` load
    /// performs the same transition without touching the status message.
    pub async fn load(&self, preferred: Option<&str>, silent: bool) -> Result<(), ConsoleError> {
        match self.fetch_snapshot().await {
            Ok(snapshot) => {
                self.apply(snapshot, preferred);
                if !silent {
                    self.view.set_message(Panel::Config, MSG_LOADED);
                }
                Ok(())
            }
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                if !silent {
                    self.view.set_message(Panel::Config, MSG_LOAD_FAILED);
                }
                Err(e)
            }
        }
    }

    async fn fetch_snapshot(&self) -> Result<ConfigSnapshot, ConsoleError> {
        let reply = self.api.fetch_config().await?;
        if !reply.is_success() {
            return Err(ConsoleError::ServerError {
                status: reply.status.as_u16(),
                message: reply
                    .error_message()
                    .unwrap_or_else(|| MSG_LOAD_FAILED.to_string()),
            });
        }
        let payload = parse_config_payload(&reply.body)
            .map_err(|e| ConsoleError::ParseError(format!("invalid configuration: {}", e)))?;
        Ok(ConfigSnapshot::from_payload(payload))
    }

    fn apply(&self, snapshot: ConfigSnapshot, preferred: Option<&str>) {
        let mut state = self.write();
        let active = resolve_active_project(
            &snapshot.projects,
            preferred,
            state.active_project_id.as_deref(),
            &snapshot.default_project_id,
        );
        let views = derive_views(&snapshot, active.as_deref());
        debug!(
            "Applying configuration: {} projects, active {:?}",
            snapshot.projects.len(),
            active
        );
        state.snapshot = Some(snapshot);
        state.active_project_id = active;
        self.view.render_console(&views);
    }

    /// Point the console at another project without contacting the server.
    ///
    /// Unknown ids fall back to the first project. Returns the id that ended
    /// up active.
    pub fn select_project(&self, project_id: &str) -> Option<String> {
        let mut state = self.write();
        let snapshot = state.snapshot.clone().unwrap_or_default();
        let active = select_fallback(&snapshot.projects, project_id);
        let views = derive_views(&snapshot, active.as_deref());
        state.active_project_id = active.clone();
        self.view.render_console(&views);
        active
    }

    pub fn active_project_id(&self) -> Option<String> {
        self.read().active_project_id.clone()
    }

    pub fn active_project(&self) -> Option<Project> {
        let state = self.read();
        let id = state.active_project_id.as_deref()?;
        state
            .snapshot
            .as_ref()
            .and_then(|s| s.projects.iter().find(|p| p.id == id))
            .cloned()
    }

    pub fn project(&self, project_id: &str) -> Option<Project> {
        self.read()
            .snapshot
            .as_ref()
            .and_then(|s| s.projects.iter().find(|p| p.id == project_id))
            .cloned()
    }

    pub fn snapshot(&self) -> Option<ConfigSnapshot> {
        self.read().snapshot.clone()
    }

    /// Views for the current state, as last rendered
    pub fn views(&self) -> ConsoleViews {
        let state = self.read();
        let snapshot = state.snapshot.clone().unwrap_or_default();
        derive_views(&snapshot, state.active_project_id.as_deref())
    }

    /// Forget the cache and the active selection
    pub fn reset(&self) {
        *self.write() = StoreState::default();
    }

    // ================================ WRITES ==================================== //

    /// Save system settings; the new auth key is cleared from the form once accepted
    pub async fn save_system_config(
        &self,
        form: &mut SystemConfigForm,
    ) -> Result<WriteOutcome, ConsoleError> {
        self.view.set_message(Panel::Config, MSG_SAVING);
        let preferred = self.active_project_id();
        let reply = self.api.save_config(form.to_fields()).await;
        let outcome = self.confirm_write(reply, preferred).await?;
        form.new_auth_key = None;
        Ok(outcome)
    }

    /// Save one project's settings
    pub async fn save_project_config(
        &self,
        form: &ProjectConfigForm,
    ) -> Result<WriteOutcome, ConsoleError> {
        let project_id = match form.project_id.trim() {
            "" => self.active_project_id(),
            id => Some(id.to_string()),
        };
        let Some(project_id) = project_id else {
            return Err(self.reject("please choose a project"));
        };
        validate_version(&form.current_version).map_err(|msg| self.reject(msg))?;
        if form.max_upload_mb <= 0 {
            return Err(self.reject("max_upload_mb must be a positive integer"));
        }

        self.view.set_message(Panel::Config, MSG_SAVING);
        let reply = self.api.save_config(form.to_fields(&project_id)).await;
        self.confirm_write(reply, Some(project_id)).await
    }

    pub async fn create_project(&self, form: &NewProjectForm) -> Result<WriteOutcome, ConsoleError> {
        validate_version(&form.current_version).map_err(|msg| self.reject(msg))?;
        if matches!(form.max_upload_mb, Some(mb) if mb <= 0) {
            return Err(self.reject("max_upload_mb must be a positive integer"));
        }

        self.view.set_message(Panel::Config, MSG_SAVING);
        let reply = self.api.create_project(form.to_fields()).await;
        let preferred = Some(form.id.trim().to_string()).filter(|id| !id.is_empty());
        self.confirm_write(reply, preferred).await
    }

    pub async fn delete_project(&self, project_id: &str) -> Result<WriteOutcome, ConsoleError> {
        let project_id = project_id.trim();
        if project_id.is_empty() {
            return Err(self.reject("please choose a project"));
        }

        self.view.set_message(Panel::Config, MSG_SAVING);
        let reply = self.api.delete_project(project_id).await;
        // The deleted id cannot be reselected; keep whatever else was active
        let preferred = self
            .active_project_id()
            .filter(|active| active != project_id);
        self.confirm_write(reply, preferred).await
    }

    fn reject(&self, message: &str) -> ConsoleError {
        self.view.set_message(Panel::Config, message);
        ConsoleError::ValidationError(message.to_string())
    }

    /// Turn a write reply into a status message, reloading the cache on 2xx
    async fn confirm_write(
        &self,
        reply: Result<ApiReply, ConsoleError>,
        preferred: Option<String>,
    ) -> Result<WriteOutcome, ConsoleError> {
        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                error!("Configuration write failed: {}", e);
                self.view.set_message(Panel::Config, "network error, save failed");
                return Err(e);
            }
        };

        if !reply.is_success() {
            let message = reply
                .error_message()
                .unwrap_or_else(|| format!("save failed ({})", reply.status.as_u16()));
            warn!("Configuration write rejected: {}", message);
            self.view.set_message(Panel::Config, &message);
            return Err(ConsoleError::ServerError {
                status: reply.status.as_u16(),
                message,
            });
        }

        let response: WriteResponse = serde_json::from_str(&reply.body).unwrap_or_default();
        let mut message = response
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "saved".to_string());
        if response.restart_needed || !response.restart_fields.is_empty() {
            message = format!(
                "{} (restart required for: {})",
                message,
                response.restart_fields.join(", ")
            );
        }
        info!("{}", message);
        self.view.set_message(Panel::Config, &message);

        let active_project_id = response
            .active_project_id
            .filter(|id| !id.trim().is_empty());
        let preferred = active_project_id.clone().or(preferred);
        // Failure is already logged; the write itself went through
        let _ = self.load(preferred.as_deref(), true).await;

        Ok(WriteOutcome {
            message,
            restart_fields: response.restart_fields,
            active_project_id,
        })
    }
}

/// Blank is allowed; anything else must be `MAJOR.MINOR.PATCH`
pub fn validate_version(version: &str) -> Result<(), &'static str> {
    let version = version.trim();
    if version.is_empty() || is_valid_version(version) {
        Ok(())
    } else {
        Err(VERSION_FORMAT_MESSAGE)
    }
}

pub const VERSION_FORMAT_MESSAGE: &str = "invalid version format, examples: 0.0.2 / 0.1.1 / 1.0.1";
