//! Colored terminal renderer

use std::io::Write;
use std::sync::Mutex;

use colored::Colorize;
use updater_api::ChangeAction;

use crate::view::{
    ChangesView, ConsoleView, ConsoleViews, LineLevel, Listing, LogLine, Panel,
};

/// Writes every surface to stdout as it changes
#[derive(Debug, Default)]
pub struct TerminalView {
    /// Panel whose progress line is currently open (no trailing newline yet)
    open_progress: Mutex<Option<Panel>>,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }

    fn print_line(&self, line: String) {
        self.close_progress();
        println!("{}", line);
    }

    fn close_progress(&self) {
        let mut open = self.open_progress.lock().unwrap_or_else(|e| e.into_inner());
        if open.take().is_some() {
            println!();
        }
    }
}

fn panel_tag(panel: Panel) -> String {
    format!("[{}]", panel.as_str()).bold().to_string()
}

fn progress_bar(percent: u8) -> String {
    let filled = usize::from(percent.min(100)) / 5;
    format!("{}{}", "#".repeat(filled), ".".repeat(20 - filled))
}

impl ConsoleView for TerminalView {
    fn render_console(&self, views: &ConsoleViews) {
        self.close_progress();

        let mut out = String::new();
        out.push_str(&format!("{}\n", "Projects".bold().underline()));
        if views.sidebar.entries.is_empty() {
            out.push_str(&format!("  {}\n", "no projects configured".dimmed()));
        }
        for entry in &views.sidebar.entries {
            let marker = if entry.is_active { "*" } else { " " };
            let default = if entry.is_default { " (default)" } else { "" };
            let label = if entry.is_active {
                entry.label.green().bold().to_string()
            } else {
                entry.label.clone()
            };
            out.push_str(&format!(
                " {} {} v{}{}\n",
                marker,
                label,
                entry.current_version,
                default.dimmed()
            ));
        }

        let runtime = &views.runtime;
        if !runtime.service_name.is_empty() || !runtime.target_dir.is_empty() {
            out.push_str(&format!(
                "{} {}  {} {}  {} {}  {} {}  {} {}\n",
                "service".dimmed(),
                runtime.service_name,
                "dir".dimmed(),
                runtime.target_dir,
                "current".dimmed(),
                runtime.current_version,
                "max".dimmed(),
                runtime.max_upload_mb,
                "next".dimmed(),
                runtime.next_version.cyan(),
            ));
        }
        print!("{}", out);
    }

    fn clear_console(&self) {
        self.close_progress();
        // ESC[2J clears the screen, ESC[H homes the cursor
        print!("\x1b[2J\x1b[H");
        let _ = std::io::stdout().flush();
    }

    fn set_message(&self, panel: Panel, text: &str) {
        self.print_line(format!("{} {}", panel_tag(panel), text));
    }

    fn set_progress(&self, panel: Panel, percent: u8) {
        let mut open = self.open_progress.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(*open, Some(p) if p != panel) {
            println!();
        }
        print!("\r{} [{}] {:>3}%", panel_tag(panel), progress_bar(percent), percent);
        let _ = std::io::stdout().flush();
        if percent >= 100 {
            println!();
            *open = None;
        } else {
            *open = Some(panel);
        }
    }

    fn reset_log(&self, deployment_id: Option<&str>) {
        match deployment_id {
            Some(id) => self.print_line(format!("{} {}", "── log".dimmed(), id.bold())),
            None => self.print_line("── log".dimmed().to_string()),
        }
    }

    fn append_log(&self, line: &LogLine) {
        let text = match line.level {
            LineLevel::Info => line.text.normal(),
            LineLevel::Warn => line.text.yellow(),
            LineLevel::Error => line.text.red(),
            LineLevel::Plain => line.text.dimmed(),
        };
        self.print_line(text.to_string());
    }

    fn open_changes(&self, title: &str) {
        self.print_line(title.bold().underline().to_string());
    }

    fn set_changes_subtitle(&self, subtitle: &str) {
        self.print_line(subtitle.dimmed().to_string());
    }

    fn render_changes(&self, changes: &ChangesView) {
        self.close_progress();

        let mut out = format!("{}\n", changes.header);
        out.push_str(&format!("{}\n", "replace-ignore".bold()));
        match &changes.ignore_rules {
            Listing::Items(rules) => {
                for rule in rules {
                    out.push_str(&format!("  {}\n", rule));
                }
            }
            Listing::Placeholder(text) => out.push_str(&format!("  {}\n", text.dimmed())),
        }

        out.push_str(&format!("{}\n", "files".bold()));
        match &changes.files {
            Listing::Items(rows) => {
                for row in rows {
                    let action = match row.action {
                        ChangeAction::Added => row.action.as_str().green(),
                        ChangeAction::Updated => row.action.as_str().yellow(),
                        ChangeAction::Deleted => row.action.as_str().red(),
                        ChangeAction::Unknown => row.action.as_str().normal(),
                    };
                    let size = row.size.as_deref().unwrap_or("-");
                    out.push_str(&format!("  {:<8} {:>10}  {}\n", action, size, row.path));
                }
            }
            Listing::Placeholder(text) => out.push_str(&format!("  {}\n", text.dimmed())),
        }

        if let Some(summary) = &changes.summary {
            out.push_str(&format!("{}\n", summary));
        }
        print!("{}", out);
    }

    fn render_deployments(&self, fragment: &str) {
        self.print_line(fragment.trim_end().to_string());
    }
}

/// Full dump of the forms, used by the `status` command
pub fn print_details(views: &ConsoleViews) {
    let system = &views.system_form;
    println!("{}", "System".bold().underline());
    for (key, value) in [
        ("listen_addr", &system.listen_addr),
        ("session_cookie", &system.session_cookie),
        ("upload_dir", &system.upload_dir),
        ("work_dir", &system.work_dir),
        ("backup_dir", &system.backup_dir),
        ("deployments_file", &system.deployments_file),
        ("log_file", &system.log_file),
        ("default_project_id", &system.default_project_id),
    ] {
        println!("  {:<20} {}", key.dimmed(), value);
    }

    let Some(project) = &views.project_form else {
        println!("{}", "no active project".dimmed());
        return;
    };
    println!("{}", "Active project".bold().underline());
    println!("  {:<20} {}", "id".dimmed(), project.id);
    println!("  {:<20} {}", "name".dimmed(), project.name);
    println!("  {:<20} {}", "service_name".dimmed(), project.service_name);
    println!("  {:<20} {}", "target_dir".dimmed(), project.target_dir);
    println!("  {:<20} {}", "current_version".dimmed(), project.current_version);
    println!("  {:<20} {}", "max_upload_mb".dimmed(), project.max_upload_mb);
    println!(
        "  {:<20} {}",
        "replace_mode".dimmed(),
        project.default_replace_mode
    );
    println!(
        "  {:<20} {}",
        "backup_ignore".dimmed(),
        project.backup_ignore.join(", ")
    );
    println!(
        "  {:<20} {}",
        "replace_ignore".dimmed(),
        project.replace_ignore.join(", ")
    );
    println!("  {:<20} {}", "default".dimmed(), project.is_default);
}
