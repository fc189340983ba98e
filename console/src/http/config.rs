//! Configuration and project API client

use reqwest::multipart::Form;
use reqwest::Method;

use crate::errors::ConsoleError;
use crate::http::api::FormFields;
use crate::http::client::{ApiReply, HttpClient};

pub(crate) fn text_form(fields: FormFields) -> Form {
    fields
        .into_iter()
        .fold(Form::new(), |form, (name, value)| form.text(name, value))
}

impl HttpClient {
    /// Read the system configuration and project list
    pub async fn get_config(&self) -> Result<ApiReply, ConsoleError> {
        self.get(&["api", "config"]).await
    }

    /// Submit a system or project configuration write
    pub async fn post_config(&self, fields: FormFields) -> Result<ApiReply, ConsoleError> {
        let url = self.endpoint(&["api", "config"])?;
        let request = self.request(Method::POST, url).multipart(text_form(fields));
        self.send(request).await
    }

    /// Create a project
    pub async fn post_project(&self, fields: FormFields) -> Result<ApiReply, ConsoleError> {
        let url = self.endpoint(&["api", "projects"])?;
        let request = self.request(Method::POST, url).multipart(text_form(fields));
        self.send(request).await
    }

    /// Delete a project
    pub async fn remove_project(&self, project_id: &str) -> Result<ApiReply, ConsoleError> {
        let url = self.endpoint(&["api", "projects", project_id])?;
        self.send(self.request(Method::DELETE, url)).await
    }
}
