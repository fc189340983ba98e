//! Request surface of the update service

use std::io::Cursor;
use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;

use crate::errors::ConsoleError;
use crate::filesys::file::File;
use crate::http::client::{ApiReply, HttpClient};

/// Multipart text fields, in submission order
pub type FormFields = Vec<(&'static str, String)>;

/// Bytes handed to the transport so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub loaded: u64,
    pub total: u64,
}

pub type ProgressSender = mpsc::UnboundedSender<TransferProgress>;

/// Endpoints that take a `package` file part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadEndpoint {
    Upload,
    SelfUpdate,
    Preview,
}

impl UploadEndpoint {
    pub fn segments(&self) -> [&'static str; 2] {
        match self {
            UploadEndpoint::Upload => ["api", "upload"],
            UploadEndpoint::SelfUpdate => ["api", "self-update"],
            UploadEndpoint::Preview => ["api", "preview"],
        }
    }
}

/// Where the package bytes come from
#[derive(Debug)]
enum PackageSource {
    Bytes(Vec<u8>),
    File(tokio::fs::File),
}

/// A package ready to be streamed as a multipart part.
///
/// Files are read chunk by chunk during the transfer, never held whole.
#[derive(Debug)]
pub struct PackageUpload {
    pub file_name: String,
    len: u64,
    source: PackageSource,
}

impl PackageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            len: bytes.len() as u64,
            source: PackageSource::Bytes(bytes),
        }
    }

    /// Open a package on disk; the length is taken when it is opened
    pub async fn from_path(path: &Path) -> Result<Self, ConsoleError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                ConsoleError::ValidationError(format!("not a file: {}", path.display()))
            })?;
        let (file, len) = File::new(path).open_sized().await?;
        Ok(Self {
            file_name,
            len,
            source: PackageSource::File(file),
        })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The package contents as a byte reader
    pub fn into_reader(self) -> Box<dyn AsyncRead + Send + Sync + Unpin> {
        match self.source {
            PackageSource::Bytes(bytes) => Box::new(Cursor::new(bytes)),
            PackageSource::File(file) => Box::new(file),
        }
    }
}

/// Everything the console asks of the server.
///
/// Every call resolves to the status and raw body when any response arrived,
/// and to [`ConsoleError::NetworkError`] when none did. Interpreting the
/// status is left to the caller.
#[async_trait]
pub trait ConsoleApi: Send + Sync {
    /// `GET /api/config`
    async fn fetch_config(&self) -> Result<ApiReply, ConsoleError>;

    /// `POST /api/config`
    async fn save_config(&self, fields: FormFields) -> Result<ApiReply, ConsoleError>;

    /// `POST /api/projects`
    async fn create_project(&self, fields: FormFields) -> Result<ApiReply, ConsoleError>;

    /// `DELETE /api/projects/{id}`
    async fn delete_project(&self, project_id: &str) -> Result<ApiReply, ConsoleError>;

    /// Multipart package upload, reporting transfer progress on `progress`
    async fn upload_package(
        &self,
        endpoint: UploadEndpoint,
        package: PackageUpload,
        fields: FormFields,
        progress: ProgressSender,
    ) -> Result<ApiReply, ConsoleError>;

    /// `GET /api/deployments/{id}`
    async fn fetch_deployment(&self, deployment_id: &str) -> Result<ApiReply, ConsoleError>;

    /// `GET /partials/deployments`
    async fn deployments_fragment(&self, offset: u32, limit: u32)
        -> Result<ApiReply, ConsoleError>;

    /// `POST /api/deployments/{id}/rollback`
    async fn rollback(&self, deployment_id: &str) -> Result<ApiReply, ConsoleError>;

    /// `POST /api/deployments/{id}/note`
    async fn update_note(&self, deployment_id: &str, note: &str)
        -> Result<ApiReply, ConsoleError>;
}

#[async_trait]
impl ConsoleApi for HttpClient {
    async fn fetch_config(&self) -> Result<ApiReply, ConsoleError> {
        self.get_config().await
    }

    async fn save_config(&self, fields: FormFields) -> Result<ApiReply, ConsoleError> {
        self.post_config(fields).await
    }

    async fn create_project(&self, fields: FormFields) -> Result<ApiReply, ConsoleError> {
        self.post_project(fields).await
    }

    async fn delete_project(&self, project_id: &str) -> Result<ApiReply, ConsoleError> {
        self.remove_project(project_id).await
    }

    async fn upload_package(
        &self,
        endpoint: UploadEndpoint,
        package: PackageUpload,
        fields: FormFields,
        progress: ProgressSender,
    ) -> Result<ApiReply, ConsoleError> {
        self.post_package(endpoint, package, fields, progress).await
    }

    async fn fetch_deployment(&self, deployment_id: &str) -> Result<ApiReply, ConsoleError> {
        self.get_deployment(deployment_id).await
    }

    async fn deployments_fragment(
        &self,
        offset: u32,
        limit: u32,
    ) -> Result<ApiReply, ConsoleError> {
        self.get_deployments_fragment(offset, limit).await
    }

    async fn rollback(&self, deployment_id: &str) -> Result<ApiReply, ConsoleError> {
        self.post_rollback(deployment_id).await
    }

    async fn update_note(&self, deployment_id: &str, note: &str) -> Result<ApiReply, ConsoleError> {
        self.post_note(deployment_id, note).await
    }
}
