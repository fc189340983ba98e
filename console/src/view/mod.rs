//! Presentation surface.
//!
//! Components never format output directly. They derive one of the view
//! models below from state and hand it to a [`ConsoleView`], which only
//! applies it.

pub mod memory;
pub mod terminal;

use serde::Serialize;
use updater_api::{ChangeAction, ReplaceMode};

/// Area of the console that owns a status message or progress bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    Config,
    Upload,
    SelfUpdate,
    Preview,
    Deployments,
}

impl Panel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Panel::Config => "config",
            Panel::Upload => "upload",
            Panel::SelfUpdate => "self-update",
            Panel::Preview => "preview",
            Panel::Deployments => "deployments",
        }
    }
}

/// Severity of a rendered log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineLevel {
    Info,
    Warn,
    Error,
    /// Payloads that could not be parsed
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    pub level: LineLevel,
    pub text: String,
}

impl LogLine {
    pub fn new(level: LineLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// System configuration form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SystemFormView {
    pub listen_addr: String,
    pub session_cookie: String,
    pub upload_dir: String,
    pub work_dir: String,
    pub backup_dir: String,
    pub deployments_file: String,
    pub log_file: String,
    /// Effective default, never dangling
    pub default_project_id: String,
}

/// Config-editor form for the active project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectFormView {
    pub id: String,
    pub name: String,
    pub service_name: String,
    pub target_dir: String,
    pub current_version: String,
    pub max_upload_mb: i64,
    pub default_replace_mode: ReplaceMode,
    pub backup_ignore: Vec<String>,
    pub replace_ignore: Vec<String>,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SidebarEntry {
    pub id: String,
    pub label: String,
    pub current_version: String,
    pub is_active: bool,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SidebarView {
    pub entries: Vec<SidebarEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectorOption {
    pub id: String,
    pub label: String,
}

/// A `<select>`-like project picker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectSelectorView {
    pub options: Vec<SelectorOption>,
    pub selected: Option<String>,
}

/// Summary of the project uploads currently target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeSummaryView {
    pub service_name: String,
    pub target_dir: String,
    pub current_version: String,
    pub max_upload_mb: String,
    pub next_version: String,
}

/// Everything derived from one configuration snapshot, applied in one call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsoleViews {
    pub system_form: SystemFormView,
    pub project_form: Option<ProjectFormView>,
    pub sidebar: SidebarView,
    pub upload_selector: ProjectSelectorView,
    pub default_selector: ProjectSelectorView,
    pub runtime: RuntimeSummaryView,
}

/// A list that renders an explicit placeholder instead of nothing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Listing<T> {
    Items(Vec<T>),
    Placeholder(String),
}

impl<T> Listing<T> {
    pub fn from_items(items: Vec<T>, placeholder: &str) -> Self {
        if items.is_empty() {
            Listing::Placeholder(placeholder.to_string())
        } else {
            Listing::Items(items)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeRow {
    pub action: ChangeAction,
    pub path: String,
    /// Always `None` for deletions
    pub size: Option<String>,
}

/// Contents of the changes modal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangesView {
    pub header: String,
    pub ignore_rules: Listing<String>,
    pub files: Listing<ChangeRow>,
    pub summary: Option<String>,
}

/// Render target for every console surface
pub trait ConsoleView: Send + Sync {
    /// Apply forms, sidebar, selectors and summary together
    fn render_console(&self, views: &ConsoleViews);

    /// Drop everything rendered so far
    fn clear_console(&self);

    fn set_message(&self, panel: Panel, text: &str);

    fn set_progress(&self, panel: Panel, percent: u8);

    /// Clear the log panel and label it with the followed deployment
    fn reset_log(&self, deployment_id: Option<&str>);

    fn append_log(&self, line: &LogLine);

    fn open_changes(&self, title: &str);

    fn set_changes_subtitle(&self, subtitle: &str);

    fn render_changes(&self, changes: &ChangesView);

    /// Server-rendered deployment list, opaque to the console
    fn render_deployments(&self, fragment: &str);
}
