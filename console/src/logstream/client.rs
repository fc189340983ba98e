//! Log stream client

use std::sync::{Arc, Mutex, MutexGuard};

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use updater_api::{EventLevel, LogEvent};

use crate::logstream::streamer::{StreamItem, Streamer};
use crate::utils::clock_time;
use crate::view::{ConsoleView, LineLevel, LogLine};

#[derive(Default)]
struct StreamSlot {
    /// Bumped on every attach and detach; a pump only renders while it matches
    generation: u64,
    deployment_id: Option<String>,
    task: Option<JoinHandle<()>>,
    /// Closed when the pump of the current generation stops
    alive: Option<watch::Receiver<()>>,
}

/// Keeps at most one deployment's log feed rendered in the log panel
pub struct LogStreamClient {
    streamer: Arc<dyn Streamer>,
    view: Arc<dyn ConsoleView>,
    slot: Arc<Mutex<StreamSlot>>,
}

fn lock(slot: &Mutex<StreamSlot>) -> MutexGuard<'_, StreamSlot> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

impl LogStreamClient {
    pub fn new(streamer: Arc<dyn Streamer>, view: Arc<dyn ConsoleView>) -> Self {
        Self {
            streamer,
            view,
            slot: Arc::new(Mutex::new(StreamSlot::default())),
        }
    }

    /// Follow `deployment_id`, closing whatever stream was open before.
    ///
    /// The panel is cleared before the new stream can render anything. A
    /// blank id is ignored.
    pub fn attach(&self, deployment_id: &str) {
        let deployment_id = deployment_id.trim();
        if deployment_id.is_empty() {
            return;
        }

        let mut slot = lock(&self.slot);
        slot.generation += 1;
        let generation = slot.generation;
        if let Some(task) = slot.task.take() {
            task.abort();
        }
        slot.deployment_id = Some(deployment_id.to_string());

        self.view.reset_log(Some(deployment_id));
        self.view.append_log(&LogLine::new(
            LineLevel::Info,
            format!("[{}] connecting to log stream...", clock_time()),
        ));

        info!("Attaching log stream for deployment {}", deployment_id);
        let stream = self.streamer.open(deployment_id);
        let (alive_tx, alive_rx) = watch::channel(());
        slot.alive = Some(alive_rx);
        slot.task = Some(tokio::spawn(pump(
            stream,
            self.view.clone(),
            self.slot.clone(),
            generation,
            alive_tx,
        )));
    }

    /// Close the open stream, if any, leaving the rendered lines in place
    pub fn detach(&self) {
        let mut slot = lock(&self.slot);
        slot.generation += 1;
        if let Some(task) = slot.task.take() {
            task.abort();
        }
        slot.alive = None;
        if let Some(id) = slot.deployment_id.take() {
            debug!("Detached log stream for deployment {}", id);
        }
    }

    /// Deployment currently followed
    pub fn current(&self) -> Option<String> {
        lock(&self.slot).deployment_id.clone()
    }

    /// Resolves once the current stream ends on its own.
    ///
    /// Returns immediately when nothing is attached, and when the stream is
    /// replaced or detached in the meantime.
    pub async fn wait(&self) {
        let alive = lock(&self.slot).alive.clone();
        if let Some(mut alive) = alive {
            // Nothing is ever sent; this resolves when the sender is dropped
            let _ = alive.changed().await;
        }
    }
}

impl Drop for LogStreamClient {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.slot).task.take() {
            task.abort();
        }
    }
}

async fn pump(
    mut stream: BoxStream<'static, StreamItem>,
    view: Arc<dyn ConsoleView>,
    slot: Arc<Mutex<StreamSlot>>,
    generation: u64,
    _alive: watch::Sender<()>,
) {
    while let Some(item) = stream.next().await {
        let line = render_item(item);
        let current = lock(&slot);
        if current.generation != generation {
            return;
        }
        view.append_log(&line);
    }
    debug!("Log stream ended");
}

/// Turn one stream notification into a log line
pub fn render_item(item: StreamItem) -> LogLine {
    match item {
        StreamItem::Message(payload) => render_payload(&payload),
        StreamItem::Error(reason) => {
            debug!("Log stream interrupted: {}", reason);
            LogLine::new(
                LineLevel::Warn,
                format!(
                    "[{}] log connection interrupted, waiting to reconnect...",
                    clock_time()
                ),
            )
        }
    }
}

/// `[time] [level] text` for a structured event, the raw payload otherwise
pub fn render_payload(payload: &str) -> LogLine {
    match serde_json::from_str::<LogEvent>(payload) {
        Ok(event) => {
            let level = match event.level {
                EventLevel::Warn => LineLevel::Warn,
                EventLevel::Error => LineLevel::Error,
                EventLevel::Info | EventLevel::Other => LineLevel::Info,
            };
            LogLine::new(
                level,
                format!("[{}] [{}] {}", event.time, event.level.as_str(), event.text),
            )
        }
        Err(_) => LogLine::new(LineLevel::Plain, payload),
    }
}
