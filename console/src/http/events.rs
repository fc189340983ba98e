//! Deployment event stream over SSE

use std::sync::Arc;
use std::time::Duration;

use eventsource_client as es;
use eventsource_client::Client as _;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tracing::{debug, warn};

use crate::errors::ConsoleError;
use crate::http::client::HttpClient;
use crate::logstream::streamer::{StreamItem, Streamer};

/// [`Streamer`] backed by `GET /api/deployments/{id}/events`.
///
/// Reconnecting is left to the event source client: after a dropped
/// connection it waits for the retry delay (the server's `retry:` value
/// once seen) and resumes with `Last-Event-ID`. Each drop is reported as a
/// [`StreamItem::Error`]. A non-2xx answer ends the stream for good.
pub struct SseStreamer {
    client: Arc<HttpClient>,
    retry_delay: Duration,
}

impl SseStreamer {
    pub fn new(client: Arc<HttpClient>, retry_delay: Duration) -> Self {
        Self {
            client,
            retry_delay,
        }
    }

    fn event_client(&self, deployment_id: &str) -> Result<impl es::Client, ConsoleError> {
        let url = self.client.events_url(deployment_id)?;
        let mut builder = es::ClientBuilder::for_url(url.as_str()).map_err(builder_error)?;
        if let Some(cookie) = self.client.session_cookie() {
            builder = builder.header("Cookie", &cookie).map_err(builder_error)?;
        }

        let reconnect = es::ReconnectOptions::reconnect(true)
            .retry_initial(true)
            .delay(self.retry_delay)
            .backoff_factor(1)
            .delay_max(self.retry_delay)
            .build();
        Ok(builder.reconnect(reconnect).build())
    }
}

fn builder_error(e: es::Error) -> ConsoleError {
    ConsoleError::ConfigError(format!("invalid event stream request: {}", e))
}

/// Only unnamed events and `message` events carry log lines
fn is_message(event: &es::Event) -> bool {
    event.event_type.is_empty() || event.event_type == "message"
}

impl Streamer for SseStreamer {
    fn open(&self, deployment_id: &str) -> BoxStream<'static, StreamItem> {
        let client = match self.event_client(deployment_id) {
            Ok(client) => client,
            Err(e) => {
                warn!("Cannot open event stream for {}: {}", deployment_id, e);
                return stream::once(async move { StreamItem::Error(e.to_string()) }).boxed();
            }
        };
        let mut events = client.stream();
        let deployment_id = deployment_id.to_string();

        let stream = async_stream::stream! {
            while let Some(event) = events.next().await {
                match event {
                    Ok(es::SSE::Event(event)) => {
                        if is_message(&event) {
                            yield StreamItem::Message(event.data);
                        }
                    }
                    Ok(_) => {}
                    Err(es::Error::UnexpectedResponse(response, _)) => {
                        warn!(
                            "Event stream for {} rejected: {}",
                            deployment_id,
                            response.status()
                        );
                        yield StreamItem::Error(format!(
                            "event stream rejected ({})",
                            response.status()
                        ));
                        return;
                    }
                    Err(e) => {
                        debug!("Event stream for {} interrupted: {}", deployment_id, e);
                        yield StreamItem::Error(e.to_string());
                    }
                }
            }
        };

        stream.boxed()
    }
}
