//! Package upload client

use futures::StreamExt;
use reqwest::multipart::Part;
use reqwest::{Body, Method};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::errors::ConsoleError;
use crate::http::api::{FormFields, PackageUpload, ProgressSender, TransferProgress, UploadEndpoint};
use crate::http::client::{ApiReply, HttpClient};
use crate::http::config::text_form;

impl HttpClient {
    /// Upload a package as the `package` part of a multipart form.
    ///
    /// Progress is reported as each chunk is handed to the connection, so
    /// `loaded == total` can arrive before the server has answered.
    pub async fn post_package(
        &self,
        endpoint: UploadEndpoint,
        package: PackageUpload,
        fields: FormFields,
        progress: ProgressSender,
    ) -> Result<ApiReply, ConsoleError> {
        let total = package.len();
        info!(
            "Uploading {} ({} bytes) to /{}",
            package.file_name,
            total,
            endpoint.segments().join("/")
        );

        let _ = progress.send(TransferProgress { loaded: 0, total });
        let file_name = package.file_name.clone();
        let mut loaded = 0u64;
        let body = ReaderStream::with_capacity(package.into_reader(), self.upload_chunk_size())
            .map(move |chunk| {
                if let Ok(chunk) = &chunk {
                    loaded += chunk.len() as u64;
                    let _ = progress.send(TransferProgress { loaded, total });
                }
                chunk
            });

        let part = Part::stream_with_length(Body::wrap_stream(body), total)
            .file_name(file_name)
            .mime_str("application/octet-stream")?;
        let form = text_form(fields).part("package", part);

        let url = self.endpoint(&endpoint.segments())?;
        let reply = self.send(self.request(Method::POST, url).multipart(form)).await?;
        debug!("Upload answered {}", reply.status);
        Ok(reply)
    }
}
