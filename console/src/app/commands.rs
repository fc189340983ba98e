//! Command line and shell commands

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use secrecy::SecretString;

use updater_api::ReplaceMode;

use crate::models::forms::{
    NewProjectForm, PreviewForm, ProjectConfigForm, SelfUpdateForm, SystemConfigForm, UploadForm,
};

/// Operator console for the update service
#[derive(Debug, Parser)]
#[command(name = "updater-console", version, about, long_about = None)]
pub struct Cli {
    /// Settings file (defaults to ~/.updater-console/settings.json)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Base URL of the update service
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Session token sent as the session cookie
    #[arg(long, global = true)]
    pub session: Option<String>,

    /// trace, debug, info, warn or error
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log to stderr instead of the log file
    #[arg(long, global = true)]
    pub log_stderr: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// One line typed at the shell prompt
#[derive(Debug, Parser)]
#[command(no_binary_name = true, disable_version_flag = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: ShellCommand,
}

#[derive(Debug, Subcommand)]
pub enum ShellCommand {
    #[command(flatten)]
    Console(Command),

    /// Leave the shell
    #[command(alias = "exit")]
    Quit,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show configuration, active project and runtime summary
    Status,

    /// Read the configuration again
    Load {
        /// Project to make active
        #[arg(long)]
        project: Option<String>,
    },

    /// Make a project active without contacting the server
    Select { id: String },

    /// Drop all client state and read everything again
    Reload,

    /// Save system settings; unset flags keep their current values
    SaveSystem(SaveSystemArgs),

    /// Save a project's settings; unset flags keep their current values
    SaveProject(SaveProjectArgs),

    /// Create a project
    CreateProject(CreateProjectArgs),

    /// Delete a project
    DeleteProject { id: String },

    /// Upload a deployment package
    Upload(UploadArgs),

    /// Show what a package would change without deploying it
    Preview(PreviewArgs),

    /// Replace the running service binary
    SelfUpdate(SelfUpdateArgs),

    /// Follow the log of a deployment
    Logs { id: String },

    /// Show the file changes of a deployment
    Changes { id: String },

    /// Show the deployment history
    History {
        #[arg(long, default_value_t = 0)]
        offset: u32,

        #[arg(long)]
        limit: Option<u32>,
    },

    /// Roll back a deployment
    Rollback { id: String },

    /// Replace the note of a deployment
    Note {
        id: String,

        #[arg(trailing_var_arg = true, num_args = 0..)]
        text: Vec<String>,
    },

    /// Print version and build information
    Version,

    /// Interactive shell (the default)
    Shell,
}

#[derive(Debug, Clone, Default, Args)]
pub struct SaveSystemArgs {
    #[arg(long)]
    pub listen_addr: Option<String>,
    #[arg(long)]
    pub session_cookie: Option<String>,
    #[arg(long)]
    pub upload_dir: Option<String>,
    #[arg(long)]
    pub work_dir: Option<String>,
    #[arg(long)]
    pub backup_dir: Option<String>,
    #[arg(long)]
    pub deployments_file: Option<String>,
    #[arg(long)]
    pub log_file: Option<String>,
    #[arg(long)]
    pub default_project: Option<String>,
    /// Replace the service auth key
    #[arg(long)]
    pub new_auth_key: Option<String>,
}

impl SaveSystemArgs {
    /// Overlay the given flags on a prefilled form
    pub fn apply(self, form: &mut SystemConfigForm) {
        overlay(&mut form.listen_addr, self.listen_addr);
        overlay(&mut form.session_cookie, self.session_cookie);
        overlay(&mut form.upload_dir, self.upload_dir);
        overlay(&mut form.work_dir, self.work_dir);
        overlay(&mut form.backup_dir, self.backup_dir);
        overlay(&mut form.deployments_file, self.deployments_file);
        overlay(&mut form.log_file, self.log_file);
        overlay(&mut form.default_project_id, self.default_project);
        form.new_auth_key = self.new_auth_key.map(SecretString::from);
    }
}

/// Flags shared by project edits and project creation
#[derive(Debug, Clone, Default, Args)]
pub struct ProjectFields {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub service_name: Option<String>,
    #[arg(long)]
    pub target_dir: Option<String>,
    #[arg(long)]
    pub current_version: Option<String>,
    #[arg(long)]
    pub max_upload_mb: Option<i64>,
    /// full or partial
    #[arg(long)]
    pub mode: Option<String>,
    /// Backup-ignore rule; repeat for more
    #[arg(long = "backup-ignore")]
    pub backup_ignore: Option<Vec<String>>,
    /// Replace-ignore rule; repeat for more
    #[arg(long = "replace-ignore")]
    pub replace_ignore: Option<Vec<String>>,
    /// Make this the default project
    #[arg(long)]
    pub set_default: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct SaveProjectArgs {
    /// Project to edit (defaults to the active one)
    #[arg(long)]
    pub project: Option<String>,

    #[command(flatten)]
    pub fields: ProjectFields,
}

impl SaveProjectArgs {
    pub fn apply(self, form: &mut ProjectConfigForm) {
        let fields = self.fields;
        if let Some(project) = self.project {
            form.project_id = project;
        }
        overlay(&mut form.name, fields.name);
        overlay(&mut form.service_name, fields.service_name);
        overlay(&mut form.target_dir, fields.target_dir);
        overlay(&mut form.current_version, fields.current_version);
        if let Some(max) = fields.max_upload_mb {
            form.max_upload_mb = max;
        }
        if let Some(mode) = fields.mode {
            form.default_replace_mode = ReplaceMode::normalize(&mode);
        }
        overlay(&mut form.backup_ignore, fields.backup_ignore);
        overlay(&mut form.replace_ignore, fields.replace_ignore);
        form.set_default |= fields.set_default;
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct CreateProjectArgs {
    /// Project id (assigned by the server when omitted)
    #[arg(long)]
    pub id: Option<String>,

    #[command(flatten)]
    pub fields: ProjectFields,
}

impl CreateProjectArgs {
    pub fn into_form(self) -> NewProjectForm {
        let fields = self.fields;
        NewProjectForm {
            id: self.id.unwrap_or_default(),
            name: fields.name.unwrap_or_default(),
            service_name: fields.service_name.unwrap_or_default(),
            target_dir: fields.target_dir.unwrap_or_default(),
            current_version: fields.current_version.unwrap_or_default(),
            max_upload_mb: fields.max_upload_mb,
            default_replace_mode: fields.mode.as_deref().map(ReplaceMode::normalize),
            backup_ignore: fields.backup_ignore.unwrap_or_default(),
            replace_ignore: fields.replace_ignore.unwrap_or_default(),
            set_default: fields.set_default,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct UploadArgs {
    pub package: PathBuf,

    /// Target project (defaults to the active one)
    #[arg(long)]
    pub project: Option<String>,

    /// Target version (the server bumps the patch version when omitted)
    #[arg(long)]
    pub version: Option<String>,

    /// full or partial
    #[arg(long)]
    pub mode: Option<String>,

    #[arg(long)]
    pub note: Option<String>,

    /// Keep following the deployment log until Ctrl+C
    #[arg(long)]
    pub follow: bool,
}

impl UploadArgs {
    pub fn to_form(&self) -> UploadForm {
        UploadForm {
            package: Some(self.package.clone()),
            project_id: self.project.clone(),
            target_version: self.version.clone().unwrap_or_default(),
            replace_mode: self.mode.clone(),
            note: self.note.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct PreviewArgs {
    pub package: PathBuf,

    #[arg(long)]
    pub project: Option<String>,

    /// full or partial
    #[arg(long)]
    pub mode: Option<String>,
}

impl PreviewArgs {
    pub fn to_form(&self) -> PreviewForm {
        PreviewForm {
            package: Some(self.package.clone()),
            project_id: self.project.clone(),
            replace_mode: self.mode.clone(),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct SelfUpdateArgs {
    pub package: PathBuf,

    #[arg(long)]
    pub version: Option<String>,

    #[arg(long)]
    pub note: Option<String>,
}

impl SelfUpdateArgs {
    pub fn to_form(&self) -> SelfUpdateForm {
        SelfUpdateForm {
            package: Some(self.package.clone()),
            target_version: self.version.clone().unwrap_or_default(),
            note: self.note.clone().unwrap_or_default(),
        }
    }
}

fn overlay<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// Split a shell line into words.
///
/// Whitespace separates words; single and double quotes group them and a
/// backslash escapes the next character outside single quotes.
pub fn split_line(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some('\''), '\'') => quote = None,
            (Some('"'), '"') => quote = None,
            (Some('"') | None, '\\') => {
                let escaped = chars.next().ok_or("dangling escape at end of line")?;
                word.push(escaped);
                in_word = true;
            }
            (Some(_), c) => word.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            (None, c) => {
                word.push(c);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        return Err("unterminated quote".to_string());
    }
    if in_word {
        words.push(word);
    }
    Ok(words)
}
