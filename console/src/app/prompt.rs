//! Line editing for the interactive shell
//!
//! The editor blocks on the terminal, so it lives on its own thread. The shell
//! asks for one line at a time, which keeps the prompt from being drawn while
//! a command is still printing.

use std::path::PathBuf;
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::errors::ConsoleError;

/// What the shell gets back for each request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Line(String),

    /// Ctrl+C or Ctrl+D at the prompt, or the editor went away
    End,
}

/// A blocking line source
pub trait LineEditor {
    fn read_line(&mut self, prompt: &str) -> Result<String, ReadlineError>;

    fn add_history(&mut self, _line: &str) {}

    /// Called once when the reader stops
    fn close(&mut self) {}
}

/// `rustyline` editor with an optional history file
pub struct Readline {
    editor: DefaultEditor,
    history_file: Option<PathBuf>,
}

impl Readline {
    pub fn open(history_file: Option<PathBuf>) -> Result<Self, ConsoleError> {
        let mut editor = DefaultEditor::new()
            .map_err(|e| ConsoleError::Internal(format!("cannot start line editor: {}", e)))?;
        if let Some(path) = &history_file {
            if let Err(e) = editor.load_history(path) {
                debug!("No shell history loaded from {}: {}", path.display(), e);
            }
        }
        Ok(Self {
            editor,
            history_file,
        })
    }
}

impl LineEditor for Readline {
    fn read_line(&mut self, prompt: &str) -> Result<String, ReadlineError> {
        self.editor.readline(prompt)
    }

    fn add_history(&mut self, line: &str) {
        if let Err(e) = self.editor.add_history_entry(line) {
            debug!("Cannot record history entry: {}", e);
        }
    }

    fn close(&mut self) {
        if let Some(path) = &self.history_file {
            if let Err(e) = self.editor.save_history(path) {
                warn!("Cannot save shell history to {}: {}", path.display(), e);
            }
        }
    }
}

/// How long `close` waits for the editor to write its history
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Handle to the line reader thread
pub struct Prompt {
    lines: mpsc::UnboundedReceiver<Input>,
    requests: std_mpsc::Sender<()>,
    closed: oneshot::Receiver<()>,
}

impl Prompt {
    /// Start the reader thread. The editor is built on that thread.
    pub async fn spawn<E, F>(make_editor: F, prompt: &str) -> Result<Self, ConsoleError>
    where
        E: LineEditor,
        F: FnOnce() -> Result<E, ConsoleError> + Send + 'static,
    {
        let (started_tx, started_rx) = oneshot::channel();
        let (lines_tx, lines_rx) = mpsc::unbounded_channel();
        let (requests_tx, requests_rx) = std_mpsc::channel::<()>();
        let (closed_tx, closed_rx) = oneshot::channel();
        let prompt = prompt.to_string();

        thread::Builder::new()
            .name("shell-input".to_string())
            .spawn(move || {
                let mut editor = match make_editor() {
                    Ok(editor) => {
                        let _ = started_tx.send(Ok(()));
                        editor
                    }
                    Err(e) => {
                        let _ = started_tx.send(Err(e));
                        return;
                    }
                };
                read_lines(&mut editor, &prompt, &requests_rx, &lines_tx);
                editor.close();
                let _ = closed_tx.send(());
            })?;

        started_rx
            .await
            .map_err(|_| ConsoleError::Internal("line editor thread exited".to_string()))??;
        Ok(Self {
            lines: lines_rx,
            requests: requests_tx,
            closed: closed_rx,
        })
    }

    /// Show the prompt and wait for the next line
    pub async fn next(&mut self) -> Input {
        if self.requests.send(()).is_err() {
            return Input::End;
        }
        self.lines.recv().await.unwrap_or(Input::End)
    }

    /// Stop the reader and give it a moment to save history.
    ///
    /// A reader still parked at the prompt is left behind.
    pub async fn close(self) {
        let Self {
            requests, closed, ..
        } = self;
        drop(requests);
        if tokio::time::timeout(CLOSE_TIMEOUT, closed).await.is_err() {
            debug!("Line editor still waiting for input");
        }
    }
}

fn read_lines<E: LineEditor>(
    editor: &mut E,
    prompt: &str,
    requests: &std_mpsc::Receiver<()>,
    lines: &mpsc::UnboundedSender<Input>,
) {
    while requests.recv().is_ok() {
        let input = match editor.read_line(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    editor.add_history(&line);
                }
                Input::Line(line)
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Input::End,
            Err(e) => {
                warn!("Line editor failed: {}", e);
                Input::End
            }
        };
        let done = input == Input::End;
        if lines.send(input).is_err() || done {
            return;
        }
    }
}
