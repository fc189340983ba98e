//! Deployment API client

use reqwest::Method;

use crate::errors::ConsoleError;
use crate::http::client::{ApiReply, HttpClient};

impl HttpClient {
    /// Get one deployment record
    pub async fn get_deployment(&self, deployment_id: &str) -> Result<ApiReply, ConsoleError> {
        self.get(&["api", "deployments", deployment_id]).await
    }

    /// Get a page of the server-rendered deployment list
    pub async fn get_deployments_fragment(
        &self,
        offset: u32,
        limit: u32,
    ) -> Result<ApiReply, ConsoleError> {
        let mut url = self.endpoint(&["partials", "deployments"])?;
        url.query_pairs_mut()
            .append_pair("offset", &offset.to_string())
            .append_pair("limit", &limit.to_string());
        self.send(self.request(Method::GET, url)).await
    }

    /// Roll back to the state before a deployment
    pub async fn post_rollback(&self, deployment_id: &str) -> Result<ApiReply, ConsoleError> {
        let url = self.endpoint(&["api", "deployments", deployment_id, "rollback"])?;
        self.send(self.request(Method::POST, url)).await
    }

    /// Replace a deployment's note
    pub async fn post_note(&self, deployment_id: &str, note: &str) -> Result<ApiReply, ConsoleError> {
        let url = self.endpoint(&["api", "deployments", deployment_id, "note"])?;
        let request = self.request(Method::POST, url).form(&[("note", note)]);
        self.send(request).await
    }

    /// URL of a deployment's event stream
    pub fn events_url(&self, deployment_id: &str) -> Result<url::Url, ConsoleError> {
        self.endpoint(&["api", "deployments", deployment_id, "events"])
    }
}
