//! Full console resync

use tracing::{info, warn};

use crate::cache::config::ConfigStore;
use crate::deployments::history::DeploymentsPanel;
use crate::logstream::client::LogStreamClient;
use crate::view::ConsoleView;

/// Drop every piece of client state and read it again from the server.
///
/// Closes the log stream, clears the view, forgets the cache together with
/// the active selection, then performs a visible load and refreshes the
/// deployment history.
pub async fn resync_console(
    view: &dyn ConsoleView,
    logs: &LogStreamClient,
    store: &ConfigStore,
    history: &DeploymentsPanel,
) {
    info!("Resyncing console with the server");
    logs.detach();
    view.clear_console();
    store.reset();

    if let Err(e) = store.load(None, false).await {
        warn!("Configuration load during resync failed: {}", e);
    }
    history.refresh_first_page().await;
}
