//! Updater Console - Entry Point
//!
//! Operator console for the remote update service: deployment uploads, live
//! deployment logs, configuration editing and service self-updates.

use clap::Parser;
use tracing::{error, info};

use updater_console::app::commands::Cli;
use updater_console::app::options::ConsoleOptions;
use updater_console::app::run::run;
use updater_console::filesys::file::File;
use updater_console::logs::{init_logging, LogLevel, LogOptions};
use updater_console::storage::layout::StorageLayout;
use updater_console::storage::settings::Settings;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Retrieve the settings file
    let layout = StorageLayout::default();
    let settings_file = cli
        .settings
        .clone()
        .map(File::new)
        .unwrap_or_else(|| layout.settings_file());
    let mut settings = match Settings::load(&settings_file).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!(
                "Unable to read settings file {}: {}",
                settings_file.path().display(),
                e
            );
            std::process::exit(2);
        }
    };
    if let Some(base_url) = cli.base_url.clone() {
        settings.server.base_url = base_url;
    }
    if let Some(session) = cli.session.clone() {
        settings.server.session_token = Some(session);
    }

    // Initialize logging
    let log_level = match cli.log_level.as_deref().map(str::parse::<LogLevel>) {
        Some(Ok(level)) => level,
        Some(Err(e)) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
        None => settings.log_level,
    };
    let log_options = LogOptions {
        log_level,
        stderr: cli.log_stderr,
        log_dir: layout.logs_dir(),
        ..Default::default()
    };
    let log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let mut options = ConsoleOptions::from_settings(&settings);
    options.shell_history = Some(layout.history_file());
    info!("Running updater console against {}", options.client.base_url);
    let code = match run(cli.command, options, await_shutdown_signal()).await {
        Ok(()) => 0,
        Err(e) => {
            error!("Console exited with an error: {e}");
            eprintln!("{}", e.user_message());
            1
        }
    };

    // Flush the log file; stdin may still be parked in a blocking read
    drop(log_guard);
    std::process::exit(code);
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!("Unable to listen for SIGTERM: {e}");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        info!("Ctrl+C received, shutting down...");
    }
}
