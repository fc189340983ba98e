//! Push-based event source seam

use futures::stream::BoxStream;

/// One notification from an event connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    /// Payload of a delivered event
    Message(String),

    /// The transport failed; it may or may not recover on its own
    Error(String),
}

/// Opens an event stream for a deployment.
///
/// The returned stream owns the connection. Dropping it closes the
/// connection, and any reconnecting is done inside the stream.
pub trait Streamer: Send + Sync {
    fn open(&self, deployment_id: &str) -> BoxStream<'static, StreamItem>;
}
