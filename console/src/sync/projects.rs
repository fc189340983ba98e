//! Active-project reconciliation
//!
//! Pure derivations from a configuration snapshot to everything the console
//! shows about it. [`ConfigStore`](crate::cache::config::ConfigStore) runs
//! them after every change so the upload selector, the config editor and the
//! sidebar always agree on the active project.

use updater_api::Project;

use crate::cache::config::ConfigSnapshot;
use crate::versioning::{next_patch_version, INITIAL_VERSION};
use crate::view::{
    ConsoleViews, ProjectFormView, ProjectSelectorView, RuntimeSummaryView, SelectorOption,
    SidebarEntry, SidebarView, SystemFormView,
};

const BLANK: &str = "-";

fn find<'a>(projects: &'a [Project], id: &str) -> Option<&'a Project> {
    let id = id.trim();
    if id.is_empty() {
        return None;
    }
    projects.iter().find(|p| p.id == id)
}

/// Project used when nothing is selected: the configured default when it
/// exists, otherwise the first project
pub fn effective_default<'a>(projects: &'a [Project], default_id: &str) -> Option<&'a Project> {
    find(projects, default_id).or_else(|| projects.first())
}

/// Walk the fallback chain: explicit selection, previously active project,
/// server default, first project
pub fn resolve_active_project(
    projects: &[Project],
    explicit: Option<&str>,
    previous: Option<&str>,
    default_id: &str,
) -> Option<String> {
    [explicit, previous, Some(default_id)]
        .into_iter()
        .flatten()
        .find_map(|id| find(projects, id))
        .or_else(|| projects.first())
        .map(|p| p.id.clone())
}

/// An explicit selection: the id itself when it is known, else the first project
pub fn select_fallback(projects: &[Project], id: &str) -> Option<String> {
    find(projects, id)
        .or_else(|| projects.first())
        .map(|p| p.id.clone())
}

/// `name (service)`, as shown in selectors
pub fn project_option_label(project: &Project) -> String {
    let service = if project.service_name.trim().is_empty() {
        BLANK
    } else {
        project.service_name.as_str()
    };
    format!("{} ({})", project.label(), service)
}

fn or_blank(value: &str) -> String {
    if value.trim().is_empty() {
        BLANK.to_string()
    } else {
        value.to_string()
    }
}

fn runtime_summary(project: Option<&Project>) -> RuntimeSummaryView {
    let Some(project) = project else {
        return RuntimeSummaryView {
            service_name: BLANK.to_string(),
            target_dir: BLANK.to_string(),
            current_version: BLANK.to_string(),
            max_upload_mb: BLANK.to_string(),
            next_version: INITIAL_VERSION.to_string(),
        };
    };

    // A project that has never been deployed gets the initial version
    let current = project.current_version.as_deref().unwrap_or("");
    RuntimeSummaryView {
        service_name: or_blank(&project.service_name),
        target_dir: or_blank(&project.target_dir),
        current_version: or_blank(current),
        max_upload_mb: if project.max_upload_mb > 0 {
            project.max_upload_mb.to_string()
        } else {
            BLANK.to_string()
        },
        next_version: next_patch_version(current),
    }
}

fn project_form(project: &Project, is_default: bool) -> ProjectFormView {
    ProjectFormView {
        id: project.id.clone(),
        name: project.name.clone(),
        service_name: project.service_name.clone(),
        target_dir: project.target_dir.clone(),
        current_version: project.current_version.clone().unwrap_or_default(),
        max_upload_mb: project.max_upload_mb,
        default_replace_mode: project.default_replace_mode,
        backup_ignore: project.backup_ignore.clone(),
        replace_ignore: project.replace_ignore.clone(),
        is_default,
    }
}

/// Every surface derived from one snapshot and one active selection
pub fn derive_views(snapshot: &ConfigSnapshot, active_id: Option<&str>) -> ConsoleViews {
    let projects = &snapshot.projects;
    let default_id = effective_default(projects, &snapshot.default_project_id)
        .map(|p| p.id.clone());
    let active = active_id.and_then(|id| find(projects, id));
    let is_default = |p: &Project| default_id.as_deref() == Some(p.id.as_str());

    let system = &snapshot.system;
    let system_form = SystemFormView {
        listen_addr: system.listen_addr.clone(),
        session_cookie: system.session_cookie.clone(),
        upload_dir: system.upload_dir.clone(),
        work_dir: system.work_dir.clone(),
        backup_dir: system.backup_dir.clone(),
        deployments_file: system.deployments_file.clone(),
        log_file: system.log_file.clone(),
        default_project_id: default_id.clone().unwrap_or_default(),
    };

    let sidebar = SidebarView {
        entries: projects
            .iter()
            .map(|p| SidebarEntry {
                id: p.id.clone(),
                label: p.label().to_string(),
                current_version: or_blank(p.current_version.as_deref().unwrap_or("")),
                is_active: active.map(|a| a.id == p.id).unwrap_or(false),
                is_default: is_default(p),
            })
            .collect(),
    };

    let options: Vec<SelectorOption> = projects
        .iter()
        .map(|p| SelectorOption {
            id: p.id.clone(),
            label: project_option_label(p),
        })
        .collect();

    ConsoleViews {
        system_form,
        project_form: active.map(|p| project_form(p, is_default(p))),
        sidebar,
        upload_selector: ProjectSelectorView {
            options: options.clone(),
            selected: active.map(|p| p.id.clone()),
        },
        default_selector: ProjectSelectorView {
            options,
            selected: default_id,
        },
        runtime: runtime_summary(active),
    }
}
