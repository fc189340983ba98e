//! Application state management

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::app::options::ConsoleOptions;
use crate::cache::config::ConfigStore;
use crate::deployments::changes::ChangesViewer;
use crate::deployments::history::DeploymentsPanel;
use crate::errors::ConsoleError;
use crate::http::api::ConsoleApi;
use crate::http::client::HttpClient;
use crate::http::events::SseStreamer;
use crate::logstream::client::LogStreamClient;
use crate::logstream::streamer::Streamer;
use crate::sync::resync::resync_console;
use crate::view::ConsoleView;
use crate::workflow::self_update::SelfUpdateWorkflow;
use crate::workflow::upload::UploadWorkflow;

/// Every console component, wired to one API and one view
pub struct AppState {
    pub view: Arc<dyn ConsoleView>,
    pub store: Arc<ConfigStore>,
    pub logs: Arc<LogStreamClient>,
    pub history: Arc<DeploymentsPanel>,
    pub changes: Arc<ChangesViewer>,
    pub upload: Arc<UploadWorkflow>,
    pub self_update: Arc<SelfUpdateWorkflow>,
}

impl AppState {
    /// Wire the components around an existing API and log transport
    pub fn new(
        api: Arc<dyn ConsoleApi>,
        streamer: Arc<dyn Streamer>,
        view: Arc<dyn ConsoleView>,
        options: &ConsoleOptions,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        let store = Arc::new(ConfigStore::new(api.clone(), view.clone()));
        let logs = Arc::new(LogStreamClient::new(streamer, view.clone()));
        let history = Arc::new(DeploymentsPanel::new(
            api.clone(),
            view.clone(),
            options.history_page_size,
        ));
        let changes = Arc::new(ChangesViewer::new(api.clone(), store.clone(), view.clone()));
        let upload = Arc::new(UploadWorkflow::new(
            api.clone(),
            store.clone(),
            logs.clone(),
            history.clone(),
            view.clone(),
        ));
        let self_update = Arc::new(SelfUpdateWorkflow::new(
            api,
            store.clone(),
            logs.clone(),
            history.clone(),
            view.clone(),
            options.recovery.clone(),
            shutdown_tx,
        ));

        Self {
            view,
            store,
            logs,
            history,
            changes,
            upload,
            self_update,
        }
    }

    /// Wire the components to the update service over HTTP
    pub fn connect(
        options: &ConsoleOptions,
        view: Arc<dyn ConsoleView>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Result<Self, ConsoleError> {
        info!("Connecting to {}", options.client.base_url);
        let client = Arc::new(HttpClient::new(&options.client)?);
        let streamer = Arc::new(SseStreamer::new(client.clone(), options.stream_retry_delay));
        Ok(Self::new(client, streamer, view, options, shutdown_tx))
    }

    /// Initial visible load of configuration and history
    pub async fn init(&self) -> Result<(), ConsoleError> {
        let loaded = self.store.load(None, false).await;
        self.history.refresh_first_page().await;
        loaded
    }

    /// Throw away client state and read everything again
    pub async fn reload(&self) {
        resync_console(
            self.view.as_ref(),
            &self.logs,
            &self.store,
            &self.history,
        )
        .await;
    }

    /// Close the log stream
    pub fn shutdown(&self) {
        info!("Shutting down console state...");
        self.logs.detach();
    }
}
