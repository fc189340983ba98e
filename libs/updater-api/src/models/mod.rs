//! API models

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Go-style servers emit `null` for empty slices; treat it like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// How a package replaces the files in a project's target directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReplaceMode {
    /// Files missing from the package are deleted
    #[default]
    Full,

    /// Only files present in the package are written
    Partial,
}

impl ReplaceMode {
    /// Anything other than `partial` is treated as `full`
    pub fn normalize(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("partial") {
            ReplaceMode::Partial
        } else {
            ReplaceMode::Full
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReplaceMode::Full => "full",
            ReplaceMode::Partial => "partial",
        }
    }
}

impl std::fmt::Display for ReplaceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ReplaceMode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ReplaceMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        Ok(ReplaceMode::normalize(&raw))
    }
}

/// System-wide settings of the update service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default, deserialize_with = "null_as_default")]
    pub listen_addr: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub session_cookie: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub upload_dir: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub work_dir: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub backup_dir: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub deployments_file: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub log_file: String,
}

/// A project managed by the update service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub service_name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub target_dir: String,

    /// `MAJOR.MINOR.PATCH`
    #[serde(default)]
    pub current_version: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub max_upload_mb: i64,

    #[serde(default)]
    pub default_replace_mode: ReplaceMode,

    #[serde(default, deserialize_with = "null_as_default")]
    pub backup_ignore: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub replace_ignore: Vec<String>,
}

impl Project {
    /// Display name, falling back to the id
    pub fn label(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Body of `GET /api/config`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigPayload {
    #[serde(flatten)]
    pub system: SystemConfig,

    #[serde(default, deserialize_with = "null_as_default")]
    pub projects: Vec<Project>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub default_project_id: String,
}

/// Parse a configuration body, unwrapping an optional `{"config": {...}}` envelope
pub fn parse_config_payload(body: &str) -> Result<ConfigPayload, serde_json::Error> {
    let value: Value = serde_json::from_str(body)?;
    let value = match value {
        Value::Object(mut map) => match map.remove("config") {
            Some(inner @ Value::Object(_)) => inner,
            Some(other) => {
                map.insert("config".to_string(), other);
                Value::Object(map)
            }
            None => Value::Object(map),
        },
        other => other,
    };
    serde_json::from_value(value)
}

/// Error body returned with a non-2xx status
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// Response to config and project writes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteResponse {
    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub restart_needed: bool,

    #[serde(default, deserialize_with = "null_as_default")]
    pub restart_fields: Vec<String>,

    #[serde(default)]
    pub active_project_id: Option<String>,
}

/// Response to `POST /api/upload`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub project_id: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub project_name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub version: String,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub error: Option<String>,
}

/// Response to `POST /api/self-update`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelfUpdateResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub error: Option<String>,
}

/// Kind of a deployment record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentKind {
    #[serde(rename = "upload", alias = "deploy")]
    Upload,

    #[serde(rename = "self-update", alias = "self_update")]
    SelfUpdate,

    #[serde(rename = "rollback")]
    Rollback,

    #[serde(rename = "preview")]
    Preview,

    #[serde(other)]
    Unknown,
}

impl DeploymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentKind::Upload => "upload",
            DeploymentKind::SelfUpdate => "self-update",
            DeploymentKind::Rollback => "rollback",
            DeploymentKind::Preview => "preview",
            DeploymentKind::Unknown => "unknown",
        }
    }
}

/// What happened to a file during a deployment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Added,
    Updated,
    Deleted,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Added => "added",
            ChangeAction::Updated => "updated",
            ChangeAction::Deleted => "deleted",
            ChangeAction::Unknown => "-",
        }
    }
}

/// One changed file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub path: String,

    #[serde(default)]
    pub action: ChangeAction,

    /// Meaningless for deletions
    #[serde(default)]
    pub size: Option<i64>,
}

/// Body of `GET /api/deployments/{id}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentDetail {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,

    #[serde(rename = "type", default)]
    pub kind: Option<DeploymentKind>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub project_id: Option<String>,

    #[serde(default)]
    pub project_name: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    /// Kept raw: self-updates report a mode outside `full`/`partial`
    #[serde(default)]
    pub replace_mode: Option<String>,

    /// Absent on records older than per-deployment rule snapshots
    #[serde(default)]
    pub replace_ignore: Option<Vec<String>>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub changed: Vec<ChangeEntry>,

    #[serde(default)]
    pub note: Option<String>,

    #[serde(default)]
    pub error: Option<String>,
}

/// Counters attached to a preview
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewSummary {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub added: u64,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub deleted: u64,
    #[serde(default)]
    pub ignored_paths: u64,
}

/// Response to `POST /api/preview`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub project_id: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub project_name: String,

    #[serde(default)]
    pub replace_mode: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub changed: Vec<ChangeEntry>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub replace_ignore: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub ignored_paths: Vec<String>,

    #[serde(default)]
    pub summary: PreviewSummary,

    #[serde(default)]
    pub error: Option<String>,
}

impl From<PreviewResponse> for DeploymentDetail {
    fn from(preview: PreviewResponse) -> Self {
        DeploymentDetail {
            id: String::new(),
            kind: Some(DeploymentKind::Preview),
            version: None,
            project_id: Some(preview.project_id),
            project_name: Some(preview.project_name),
            status: Some("preview".to_string()),
            replace_mode: preview.replace_mode,
            replace_ignore: Some(preview.replace_ignore),
            changed: preview.changed,
            note: None,
            error: preview.error,
        }
    }
}

/// Severity of a deployment log event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    #[default]
    Info,
    Warn,
    Error,
    #[serde(other)]
    Other,
}

impl EventLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventLevel::Info => "info",
            EventLevel::Warn => "warn",
            EventLevel::Error => "error",
            EventLevel::Other => "other",
        }
    }
}

/// One event pushed on `/api/deployments/{id}/events`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    #[serde(default)]
    pub time: String,

    #[serde(default)]
    pub level: EventLevel,

    pub text: String,
}
