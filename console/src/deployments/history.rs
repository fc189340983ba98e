//! Deployment history panel

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::ConsoleError;
use crate::http::client::ApiReply;
use crate::http::api::ConsoleApi;
use crate::view::{ConsoleView, Panel};

/// Server-rendered list of past deployments.
///
/// The fragment is opaque; the console only fetches and displays it.
pub struct DeploymentsPanel {
    api: Arc<dyn ConsoleApi>,
    view: Arc<dyn ConsoleView>,
    page_size: u32,
}

impl DeploymentsPanel {
    pub fn new(api: Arc<dyn ConsoleApi>, view: Arc<dyn ConsoleView>, page_size: u32) -> Self {
        Self {
            api,
            view,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetch and render one page. Failures leave the panel as it was and
    /// show nothing.
    pub async fn refresh(&self, offset: u32, limit: u32) -> Result<(), ConsoleError> {
        let reply = self.api.deployments_fragment(offset, limit).await?;
        if !reply.is_success() {
            debug!("Deployment list answered {}", reply.status);
            return Err(ConsoleError::ServerError {
                status: reply.status.as_u16(),
                message: format!("failed to load deployments ({})", reply.status.as_u16()),
            });
        }
        self.view.render_deployments(&reply.body);
        Ok(())
    }

    /// Refresh the newest page, ignoring failures
    pub async fn refresh_first_page(&self) {
        if let Err(e) = self.refresh(0, self.page_size).await {
            debug!("Deployment list refresh failed: {}", e);
        }
    }

    /// Queue a rollback to the state before `deployment_id`
    pub async fn rollback(&self, deployment_id: &str) -> Result<(), ConsoleError> {
        info!("Requesting rollback of {}", deployment_id);
        let reply = self.api.rollback(deployment_id).await;
        self.apply_fragment(reply, "rollback failed")
    }

    /// Replace the note of a deployment
    pub async fn update_note(&self, deployment_id: &str, note: &str) -> Result<(), ConsoleError> {
        let reply = self.api.update_note(deployment_id, note.trim()).await;
        self.apply_fragment(reply, "note update failed")
    }

    fn apply_fragment(
        &self,
        reply: Result<ApiReply, ConsoleError>,
        failure: &str,
    ) -> Result<(), ConsoleError> {
        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                self.view
                    .set_message(Panel::Deployments, &format!("network error, {}", failure));
                return Err(e);
            }
        };

        if !reply.is_success() {
            // These endpoints answer errors as plain text
            let text = reply.body.trim();
            let message = if text.is_empty() {
                format!("{} ({})", failure, reply.status.as_u16())
            } else {
                text.to_string()
            };
            warn!("{}: {}", failure, message);
            self.view.set_message(Panel::Deployments, &message);
            return Err(ConsoleError::ServerError {
                status: reply.status.as_u16(),
                message,
            });
        }

        self.view.render_deployments(&reply.body);
        Ok(())
    }
}
