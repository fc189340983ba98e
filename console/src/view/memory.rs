//! Headless view that keeps the last rendered state in memory

use std::collections::HashMap;
use std::sync::Mutex;

use crate::view::{ChangesView, ConsoleView, ConsoleViews, LogLine, Panel};

/// One call made on the view, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewOp {
    RenderConsole,
    ClearConsole,
    Message(Panel, String),
    Progress(Panel, u8),
    ResetLog(Option<String>),
    AppendLog(String),
    OpenChanges(String),
    ChangesSubtitle(String),
    RenderChanges,
    RenderDeployments,
}

#[derive(Debug, Default)]
struct MemoryState {
    ops: Vec<ViewOp>,
    console: Option<ConsoleViews>,
    console_renders: usize,
    messages: HashMap<Panel, String>,
    progress: HashMap<Panel, Vec<u8>>,
    log_target: Option<String>,
    log_lines: Vec<LogLine>,
    changes_title: Option<String>,
    changes_subtitle: Option<String>,
    changes: Option<ChangesView>,
    deployments: Option<String>,
}

/// In-memory [`ConsoleView`].
///
/// Used for scripted runs where nothing should reach the terminal, and as
/// the observation point in tests.
#[derive(Debug, Default)]
pub struct MemoryView {
    state: Mutex<MemoryState>,
}

impl MemoryView {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    pub fn ops(&self) -> Vec<ViewOp> {
        self.with_state(|s| s.ops.clone())
    }

    pub fn console(&self) -> Option<ConsoleViews> {
        self.with_state(|s| s.console.clone())
    }

    pub fn console_renders(&self) -> usize {
        self.with_state(|s| s.console_renders)
    }

    pub fn message(&self, panel: Panel) -> Option<String> {
        self.with_state(|s| s.messages.get(&panel).cloned())
    }

    /// Every percentage reported for the panel, oldest first
    pub fn progress(&self, panel: Panel) -> Vec<u8> {
        self.with_state(|s| s.progress.get(&panel).cloned().unwrap_or_default())
    }

    pub fn log_target(&self) -> Option<String> {
        self.with_state(|s| s.log_target.clone())
    }

    pub fn log_lines(&self) -> Vec<LogLine> {
        self.with_state(|s| s.log_lines.clone())
    }

    pub fn changes_title(&self) -> Option<String> {
        self.with_state(|s| s.changes_title.clone())
    }

    pub fn changes_subtitle(&self) -> Option<String> {
        self.with_state(|s| s.changes_subtitle.clone())
    }

    pub fn changes(&self) -> Option<ChangesView> {
        self.with_state(|s| s.changes.clone())
    }

    pub fn deployments(&self) -> Option<String> {
        self.with_state(|s| s.deployments.clone())
    }
}

impl ConsoleView for MemoryView {
    fn render_console(&self, views: &ConsoleViews) {
        self.with_state(|s| {
            s.ops.push(ViewOp::RenderConsole);
            s.console = Some(views.clone());
            s.console_renders += 1;
        });
    }

    fn clear_console(&self) {
        self.with_state(|s| {
            *s = MemoryState {
                ops: std::mem::take(&mut s.ops),
                ..Default::default()
            };
            s.ops.push(ViewOp::ClearConsole);
        });
    }

    fn set_message(&self, panel: Panel, text: &str) {
        self.with_state(|s| {
            s.ops.push(ViewOp::Message(panel, text.to_string()));
            s.messages.insert(panel, text.to_string());
        });
    }

    fn set_progress(&self, panel: Panel, percent: u8) {
        self.with_state(|s| {
            s.ops.push(ViewOp::Progress(panel, percent));
            s.progress.entry(panel).or_default().push(percent);
        });
    }

    fn reset_log(&self, deployment_id: Option<&str>) {
        self.with_state(|s| {
            s.ops.push(ViewOp::ResetLog(deployment_id.map(str::to_string)));
            s.log_target = deployment_id.map(str::to_string);
            s.log_lines.clear();
        });
    }

    fn append_log(&self, line: &LogLine) {
        self.with_state(|s| {
            s.ops.push(ViewOp::AppendLog(line.text.clone()));
            s.log_lines.push(line.clone());
        });
    }

    fn open_changes(&self, title: &str) {
        self.with_state(|s| {
            s.ops.push(ViewOp::OpenChanges(title.to_string()));
            s.changes_title = Some(title.to_string());
            s.changes_subtitle = None;
            s.changes = None;
        });
    }

    fn set_changes_subtitle(&self, subtitle: &str) {
        self.with_state(|s| {
            s.ops.push(ViewOp::ChangesSubtitle(subtitle.to_string()));
            s.changes_subtitle = Some(subtitle.to_string());
        });
    }

    fn render_changes(&self, changes: &ChangesView) {
        self.with_state(|s| {
            s.ops.push(ViewOp::RenderChanges);
            s.changes_subtitle = Some(changes.header.clone());
            s.changes = Some(changes.clone());
        });
    }

    fn render_deployments(&self, fragment: &str) {
        self.with_state(|s| {
            s.ops.push(ViewOp::RenderDeployments);
            s.deployments = Some(fragment.to_string());
        });
    }
}
