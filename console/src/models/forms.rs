//! Operator-facing forms
//!
//! Each form mirrors one editor in the console. Forms hold what the operator
//! typed; turning them into request fields is the only thing they do.

use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use updater_api::ReplaceMode;

use crate::http::api::FormFields;
use crate::view::{ProjectFormView, SystemFormView};

fn lines(rules: &[String]) -> String {
    rules
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn flag(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

/// System settings editor
#[derive(Debug, Clone, Default)]
pub struct SystemConfigForm {
    pub listen_addr: String,
    pub session_cookie: String,
    pub upload_dir: String,
    pub work_dir: String,
    pub backup_dir: String,
    pub deployments_file: String,
    pub log_file: String,
    pub default_project_id: String,

    /// Write-only; never read back from the server
    pub new_auth_key: Option<SecretString>,
}

impl SystemConfigForm {
    /// Prefilled from the rendered system form
    pub fn from_view(view: &SystemFormView) -> Self {
        Self {
            listen_addr: view.listen_addr.clone(),
            session_cookie: view.session_cookie.clone(),
            upload_dir: view.upload_dir.clone(),
            work_dir: view.work_dir.clone(),
            backup_dir: view.backup_dir.clone(),
            deployments_file: view.deployments_file.clone(),
            log_file: view.log_file.clone(),
            default_project_id: view.default_project_id.clone(),
            new_auth_key: None,
        }
    }

    pub fn to_fields(&self) -> FormFields {
        let mut fields = vec![
            ("scope", "system".to_string()),
            ("listen_addr", self.listen_addr.trim().to_string()),
            ("session_cookie", self.session_cookie.trim().to_string()),
            ("upload_dir", self.upload_dir.trim().to_string()),
            ("work_dir", self.work_dir.trim().to_string()),
            ("backup_dir", self.backup_dir.trim().to_string()),
            ("deployments_file", self.deployments_file.trim().to_string()),
            ("log_file", self.log_file.trim().to_string()),
            ("default_project_id", self.default_project_id.trim().to_string()),
        ];
        if let Some(key) = &self.new_auth_key {
            let key = key.expose_secret().trim();
            if !key.is_empty() {
                fields.push(("new_auth_key", key.to_string()));
            }
        }
        fields
    }
}

/// Config editor for an existing project
#[derive(Debug, Clone, Default)]
pub struct ProjectConfigForm {
    /// Blank means the active project
    pub project_id: String,
    pub name: String,
    pub service_name: String,
    pub target_dir: String,
    pub current_version: String,
    pub max_upload_mb: i64,
    pub default_replace_mode: ReplaceMode,
    pub backup_ignore: Vec<String>,
    pub replace_ignore: Vec<String>,
    pub set_default: bool,
}

impl ProjectConfigForm {
    pub fn from_view(view: &ProjectFormView) -> Self {
        Self {
            project_id: view.id.clone(),
            name: view.name.clone(),
            service_name: view.service_name.clone(),
            target_dir: view.target_dir.clone(),
            current_version: view.current_version.clone(),
            max_upload_mb: view.max_upload_mb,
            default_replace_mode: view.default_replace_mode,
            backup_ignore: view.backup_ignore.clone(),
            replace_ignore: view.replace_ignore.clone(),
            set_default: view.is_default,
        }
    }

    pub fn to_fields(&self, project_id: &str) -> FormFields {
        vec![
            ("scope", "project".to_string()),
            ("project_id", project_id.to_string()),
            ("name", self.name.trim().to_string()),
            ("service_name", self.service_name.trim().to_string()),
            ("target_dir", self.target_dir.trim().to_string()),
            ("current_version", self.current_version.trim().to_string()),
            ("max_upload_mb", self.max_upload_mb.to_string()),
            ("default_replace_mode", self.default_replace_mode.to_string()),
            ("backup_ignore_text", lines(&self.backup_ignore)),
            ("replace_ignore_text", lines(&self.replace_ignore)),
            ("set_default_project", flag(self.set_default)),
        ]
    }
}

/// Project creation dialog; blank fields are filled in by the server
#[derive(Debug, Clone, Default)]
pub struct NewProjectForm {
    pub id: String,
    pub name: String,
    pub service_name: String,
    pub target_dir: String,
    pub current_version: String,
    pub max_upload_mb: Option<i64>,
    pub default_replace_mode: Option<ReplaceMode>,
    pub backup_ignore: Vec<String>,
    pub replace_ignore: Vec<String>,
    pub set_default: bool,
}

impl NewProjectForm {
    pub fn to_fields(&self) -> FormFields {
        vec![
            ("id", self.id.trim().to_string()),
            ("name", self.name.trim().to_string()),
            ("service_name", self.service_name.trim().to_string()),
            ("target_dir", self.target_dir.trim().to_string()),
            ("current_version", self.current_version.trim().to_string()),
            (
                "max_upload_mb",
                self.max_upload_mb.map(|v| v.to_string()).unwrap_or_default(),
            ),
            (
                "default_replace_mode",
                self.default_replace_mode
                    .map(|m| m.to_string())
                    .unwrap_or_default(),
            ),
            ("backup_ignore_text", lines(&self.backup_ignore)),
            ("replace_ignore_text", lines(&self.replace_ignore)),
            ("set_default_project", flag(self.set_default)),
        ]
    }
}

/// Deployment upload form
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub package: Option<PathBuf>,
    /// Blank means the active project
    pub project_id: Option<String>,
    /// Blank lets the server bump the patch version
    pub target_version: String,
    /// Raw operator input; anything but `partial` is sent as `full`
    pub replace_mode: Option<String>,
    pub note: String,
}

impl UploadForm {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Self-update form
#[derive(Debug, Clone, Default)]
pub struct SelfUpdateForm {
    pub package: Option<PathBuf>,
    pub target_version: String,
    pub note: String,
}

impl SelfUpdateForm {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Dry-run form; same inputs as an upload without version or note
#[derive(Debug, Clone, Default)]
pub struct PreviewForm {
    pub package: Option<PathBuf>,
    pub project_id: Option<String>,
    pub replace_mode: Option<String>,
}
