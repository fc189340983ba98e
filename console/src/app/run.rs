//! Main application run loop

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::app::commands::{split_line, Command, ShellCommand, ShellLine};
use crate::app::options::ConsoleOptions;
use crate::app::prompt::{Input, Prompt, Readline};
use crate::app::state::AppState;
use crate::errors::ConsoleError;
use crate::models::forms::{ProjectConfigForm, SystemConfigForm};
use crate::utils::version_info;
use crate::view::terminal::{print_details, TerminalView};
use crate::view::{ConsoleView, Panel};
use crate::workflow::self_update::SelfUpdateOutcome;

const PROMPT: &str = "updater> ";

/// Where a command runs
enum Mode<'a> {
    /// Single command from the command line; long work is awaited
    OneShot,

    /// Typed at the prompt; uploads run in the background
    Shell(&'a mut JoinSet<()>),
}

/// Run the console: one command, or the interactive shell when `command` is
/// `None`.
pub async fn run(
    command: Option<Command>,
    options: ConsoleOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ConsoleError> {
    if let Some(Command::Version) = command {
        return print_version();
    }

    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let signal_tx = shutdown_tx.clone();
    let signal_task = tokio::spawn(async move {
        shutdown_signal.await;
        let _ = signal_tx.send(());
    });

    let view: Arc<dyn ConsoleView> = Arc::new(TerminalView::new());
    let state = Arc::new(AppState::connect(&options, view, shutdown_tx.clone())?);

    let result = match command {
        None | Some(Command::Shell) => {
            if let Err(e) = state.init().await {
                warn!("Initial load failed: {}", e);
            }
            run_shell(state.clone(), options.shell_history.clone(), &shutdown_tx).await
        }
        Some(command) => {
            if needs_config(&command) {
                state.store.load(None, true).await?;
            }
            execute(&state, command, Mode::OneShot, &shutdown_tx).await
        }
    };

    let _ = shutdown_tx.send(());
    signal_task.abort();
    state.shutdown();
    result
}

/// Commands that read the cached configuration
fn needs_config(command: &Command) -> bool {
    !matches!(
        command,
        Command::Load { .. }
            | Command::Reload
            | Command::Logs { .. }
            | Command::History { .. }
            | Command::Rollback { .. }
            | Command::Note { .. }
            | Command::Version
            | Command::Shell
    )
}

async fn run_shell(
    state: Arc<AppState>,
    history_file: Option<PathBuf>,
    shutdown_tx: &broadcast::Sender<()>,
) -> Result<(), ConsoleError> {
    info!("Entering shell");
    let mut shutdown_rx = shutdown_tx.subscribe();
    let mut prompt = Prompt::spawn(move || Readline::open(history_file), PROMPT).await?;
    let mut tasks = JoinSet::new();

    loop {
        let input = tokio::select! {
            _ = shutdown_rx.recv() => {
                println!();
                info!("Shutdown signal received, leaving shell");
                break;
            }
            input = prompt.next() => input,
        };
        let Input::Line(line) = input else {
            break;
        };

        // Reap finished background work
        while tasks.try_join_next().is_some() {}

        let words = match split_line(&line) {
            Ok(words) if words.is_empty() => continue,
            Ok(words) => words,
            Err(e) => {
                println!("{}", e.red());
                continue;
            }
        };
        let command = match ShellLine::try_parse_from(words) {
            Ok(parsed) => parsed.command,
            Err(e) => {
                let _ = e.print();
                continue;
            }
        };

        match command {
            ShellCommand::Quit => break,
            ShellCommand::Console(Command::Shell) => {
                println!("{}", "already in the shell".dimmed());
            }
            ShellCommand::Console(command) => {
                if let Err(e) = execute(&state, command, Mode::Shell(&mut tasks), shutdown_tx).await
                {
                    report(&e);
                }
            }
        }
    }

    tasks.abort_all();
    prompt.close().await;
    Ok(())
}

async fn execute(
    state: &Arc<AppState>,
    command: Command,
    mode: Mode<'_>,
    shutdown_tx: &broadcast::Sender<()>,
) -> Result<(), ConsoleError> {
    debug!("Executing {:?}", command);
    match command {
        Command::Status => {
            print_details(&state.store.views());
        }
        Command::Load { project } => {
            state.store.load(project.as_deref(), false).await?;
        }
        Command::Reload => {
            state.reload().await;
        }
        Command::Select { id } => {
            if state.store.select_project(&id).as_deref() != Some(id.trim()) {
                state
                    .view
                    .set_message(Panel::Config, &format!("unknown project {}", id));
            }
        }
        Command::SaveSystem(args) => {
            let mut form = SystemConfigForm::from_view(&state.store.views().system_form);
            args.apply(&mut form);
            state.store.save_system_config(&mut form).await?;
        }
        Command::SaveProject(args) => {
            if let Some(project) = args.project.as_deref() {
                if state.store.active_project_id().as_deref() != Some(project) {
                    state.store.select_project(project);
                }
            }
            let mut form = state
                .store
                .views()
                .project_form
                .as_ref()
                .map(ProjectConfigForm::from_view)
                .unwrap_or_default();
            args.apply(&mut form);
            state.store.save_project_config(&form).await?;
        }
        Command::CreateProject(args) => {
            state.store.create_project(&args.into_form()).await?;
        }
        Command::DeleteProject { id } => {
            state.store.delete_project(&id).await?;
        }
        Command::Upload(args) => {
            let mut form = args.to_form();
            match mode {
                Mode::Shell(tasks) => {
                    let state = state.clone();
                    tasks.spawn(async move {
                        if let Err(e) = state.upload.submit(&mut form).await {
                            debug!("Background upload ended with {}", e);
                        }
                    });
                }
                Mode::OneShot => {
                    state.upload.submit(&mut form).await?;
                    if args.follow {
                        follow_logs(state, shutdown_tx).await;
                    }
                }
            }
        }
        Command::Preview(args) => {
            state.changes.preview(&args.to_form()).await?;
        }
        Command::SelfUpdate(args) => {
            let mut form = args.to_form();
            match mode {
                Mode::Shell(tasks) => {
                    let state = state.clone();
                    tasks.spawn(async move {
                        match state.self_update.submit(&mut form).await {
                            Ok(outcome) => report_self_update(state.view.as_ref(), &outcome),
                            Err(e) => debug!("Background self-update ended with {}", e),
                        }
                    });
                }
                Mode::OneShot => {
                    let outcome = state.self_update.submit(&mut form).await?;
                    report_self_update(state.view.as_ref(), &outcome);
                }
            }
        }
        Command::Logs { id } => {
            state.logs.attach(&id);
            if let Mode::OneShot = mode {
                follow_logs(state, shutdown_tx).await;
            }
        }
        Command::Changes { id } => {
            state.changes.show(&id).await?;
        }
        Command::History { offset, limit } => {
            let limit = limit.unwrap_or_else(|| state.history.page_size());
            state.history.refresh(offset, limit).await?;
        }
        Command::Rollback { id } => {
            state.history.rollback(&id).await?;
        }
        Command::Note { id, text } => {
            state.history.update_note(&id, &text.join(" ")).await?;
        }
        Command::Version => {
            print_version()?;
        }
        Command::Shell => {}
    }
    Ok(())
}

/// Keep rendering the followed log until it ends or shutdown is requested
async fn follow_logs(state: &AppState, shutdown_tx: &broadcast::Sender<()>) {
    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::select! {
        _ = state.logs.wait() => {
            info!("Log stream closed");
        }
        _ = shutdown_rx.recv() => {
            info!("Stopped following logs");
        }
    }
}

fn report_self_update(view: &dyn ConsoleView, outcome: &SelfUpdateOutcome) {
    match outcome {
        SelfUpdateOutcome::Recovered { .. } => {}
        SelfUpdateOutcome::Unconfirmed { attempts, .. } => view.set_message(
            Panel::SelfUpdate,
            &format!("service did not answer after {} attempts", attempts),
        ),
        SelfUpdateOutcome::Cancelled { .. } => {
            view.set_message(Panel::SelfUpdate, "stopped waiting for the service")
        }
    }
}

/// Surface errors the components did not already show
fn report(error: &ConsoleError) {
    match error {
        ConsoleError::ValidationError(_)
        | ConsoleError::ServerError { .. }
        | ConsoleError::NetworkError(_)
        | ConsoleError::ParseError(_)
        | ConsoleError::Busy(_) => debug!("Command failed: {}", error),
        other => {
            error!("Command failed: {}", other);
            println!("{}", other.to_string().red());
        }
    }
}

fn print_version() -> Result<(), ConsoleError> {
    println!("{}", serde_json::to_string_pretty(&version_info())?);
    Ok(())
}
