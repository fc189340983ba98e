//! HttpClient and SseStreamer tests against a local axum server

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, Path, Query};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use futures::StreamExt;
use secrecy::SecretString;
use tokio::sync::mpsc;

use updater_console::http::api::{ConsoleApi, PackageUpload, UploadEndpoint};
use updater_console::http::client::{ClientOptions, HttpClient};
use updater_console::http::events::SseStreamer;
use updater_console::logstream::streamer::{StreamItem, Streamer};

/// What the server saw, keyed by what it is
type Seen = Arc<Mutex<HashMap<String, String>>>;

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client(base_url: &str, token: Option<&str>) -> Arc<HttpClient> {
    Arc::new(
        HttpClient::new(&ClientOptions {
            base_url: base_url.to_string(),
            session_token: token.map(|t| SecretString::from(t.to_string())),
            upload_chunk_size: 1024,
            ..Default::default()
        })
        .unwrap(),
    )
}

fn router(seen: Seen) -> Router {
    let config_seen = seen.clone();
    let upload_seen = seen.clone();
    let note_seen = seen.clone();
    let fragment_seen = seen;

    Router::new()
        .route(
            "/api/config",
            get(move |headers: HeaderMap| async move {
                let cookie = headers
                    .get(header::COOKIE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                config_seen.lock().unwrap().insert("cookie".to_string(), cookie);
                r#"{"projects":[],"default_project_id":""}"#
            }),
        )
        .route(
            "/api/upload",
            post(move |mut multipart: Multipart| async move {
                while let Some(field) = multipart.next_field().await.unwrap() {
                    let name = field.name().unwrap_or("").to_string();
                    if name == "package" {
                        let file_name = field.file_name().unwrap_or("").to_string();
                        let bytes = field.bytes().await.unwrap();
                        let mut seen = upload_seen.lock().unwrap();
                        seen.insert("file_name".to_string(), file_name);
                        seen.insert("package_len".to_string(), bytes.len().to_string());
                    } else {
                        let value = field.text().await.unwrap();
                        upload_seen.lock().unwrap().insert(name, value);
                    }
                }
                r#"{"id":"dep-1","project_id":"web","version":"1.0.1"}"#
            }),
        )
        .route(
            "/api/deployments/{id}",
            get(|Path(id): Path<String>| async move { id }),
        )
        .route(
            "/api/deployments/{id}/note",
            post(move |Path(id): Path<String>, Form(form): Form<HashMap<String, String>>| async move {
                let note = form.get("note").cloned().unwrap_or_default();
                note_seen.lock().unwrap().insert(id, note);
                StatusCode::OK
            }),
        )
        .route(
            "/api/deployments/{id}/rollback",
            post(|| async { (StatusCode::CONFLICT, "no backup available") }),
        )
        .route(
            "/partials/deployments",
            get(move |Query(query): Query<HashMap<String, String>>| async move {
                let page = format!(
                    "{}:{}",
                    query.get("offset").cloned().unwrap_or_default(),
                    query.get("limit").cloned().unwrap_or_default()
                );
                fragment_seen.lock().unwrap().insert("page".to_string(), page);
                "<ul></ul>"
            }),
        )
        .route("/api/deployments/{id}/events", get(events))
}

async fn events(Path(id): Path<String>, headers: HeaderMap) -> Response {
    if id == "missing" {
        return StatusCode::NOT_FOUND.into_response();
    }
    if id == "whoami" {
        let cookie = headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let events = futures::stream::iter(vec![Ok::<_, Infallible>(Event::default().data(cookie))]);
        return Sse::new(events).into_response();
    }
    let events = futures::stream::iter(vec![
        Ok::<_, Infallible>(Event::default().id("1").data(r#"{"time":"09:00:00","level":"info","text":"unpacking"}"#)),
        Ok(Event::default().event("heartbeat").data("ignored")),
        Ok(Event::default().id("2").data("done")),
    ]);
    Sse::new(events).into_response()
}

#[tokio::test]
async fn test_session_cookie_is_sent() {
    let seen = Seen::default();
    let base = serve(router(seen.clone())).await;

    let reply = client(&base, Some("tok")).fetch_config().await.unwrap();
    assert!(reply.is_success());
    assert_eq!(
        seen.lock().unwrap().get("cookie").map(String::as_str),
        Some("updater_session=tok")
    );

    client(&base, None).fetch_config().await.unwrap();
    assert_eq!(seen.lock().unwrap().get("cookie").map(String::as_str), Some(""));
}

#[tokio::test]
async fn test_multipart_upload_with_progress() {
    let seen = Seen::default();
    let base = serve(router(seen.clone())).await;
    let client = client(&base, None);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let reply = client
        .upload_package(
            UploadEndpoint::Upload,
            PackageUpload::new("site.zip", vec![1u8; 5000]),
            vec![
                ("project_id", "web".to_string()),
                ("note", "nightly".to_string()),
            ],
            tx,
        )
        .await
        .unwrap();
    assert!(reply.is_success());
    assert!(reply.body.contains("dep-1"));

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.get("project_id").map(String::as_str), Some("web"));
    assert_eq!(seen.get("note").map(String::as_str), Some("nightly"));
    assert_eq!(seen.get("file_name").map(String::as_str), Some("site.zip"));
    assert_eq!(seen.get("package_len").map(String::as_str), Some("5000"));

    let mut steps = Vec::new();
    while let Ok(step) = rx.try_recv() {
        steps.push(step);
    }
    assert_eq!(steps.first().map(|s| s.loaded), Some(0));
    assert_eq!(steps.last().map(|s| (s.loaded, s.total)), Some((5000, 5000)));
    assert!(steps.windows(2).all(|w| w[0].loaded <= w[1].loaded));
}

#[tokio::test]
async fn test_package_file_is_streamed_from_disk() {
    let seen = Seen::default();
    let base = serve(router(seen.clone())).await;
    let client = client(&base, None);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("release.tar.gz");
    std::fs::write(&path, vec![7u8; 3000]).unwrap();
    let package = PackageUpload::from_path(&path).await.unwrap();
    assert_eq!(package.len(), 3000);
    assert_eq!(package.file_name, "release.tar.gz");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let reply = client
        .upload_package(UploadEndpoint::Upload, package, Vec::new(), tx)
        .await
        .unwrap();
    assert!(reply.is_success());

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.get("file_name").map(String::as_str), Some("release.tar.gz"));
    assert_eq!(seen.get("package_len").map(String::as_str), Some("3000"));

    let mut steps = Vec::new();
    while let Ok(step) = rx.try_recv() {
        steps.push(step);
    }
    // Read in several chunks rather than all at once
    assert!(steps.len() > 2);
    assert_eq!(steps.last().map(|s| (s.loaded, s.total)), Some((3000, 3000)));
}

#[tokio::test]
async fn test_ids_are_percent_encoded() {
    let seen = Seen::default();
    let base = serve(router(seen.clone())).await;
    let client = client(&base, None);

    let reply = client.fetch_deployment("a b/c").await.unwrap();
    assert_eq!(reply.body, "a b/c");

    client.update_note("x y", "shipped").await.unwrap();
    assert_eq!(
        seen.lock().unwrap().get("x y").map(String::as_str),
        Some("shipped")
    );

    client.deployments_fragment(40, 20).await.unwrap();
    assert_eq!(seen.lock().unwrap().get("page").map(String::as_str), Some("40:20"));
}

#[tokio::test]
async fn test_non_2xx_is_a_reply() {
    let base = serve(router(Seen::default())).await;
    let reply = client(&base, None).rollback("dep-1").await.unwrap();
    assert_eq!(reply.status.as_u16(), 409);
    assert_eq!(reply.body, "no backup available");
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let result = client(&base, None).fetch_config().await;
    assert!(matches!(
        result,
        Err(updater_console::errors::ConsoleError::NetworkError(_))
    ));
}

#[tokio::test]
async fn test_event_stream_delivers_messages() {
    let base = serve(router(Seen::default())).await;
    let streamer = SseStreamer::new(client(&base, None), Duration::from_millis(50));

    // Each response ends after two messages, so the last two come from a
    // reconnected stream
    let messages: Vec<String> = tokio::time::timeout(
        Duration::from_secs(5),
        streamer
            .open("dep-1")
            .filter_map(|item| async move {
                match item {
                    StreamItem::Message(message) => Some(message),
                    StreamItem::Error(_) => None,
                }
            })
            .take(4)
            .collect(),
    )
    .await
    .unwrap();

    let unpacking = r#"{"time":"09:00:00","level":"info","text":"unpacking"}"#;
    assert_eq!(messages, vec![unpacking, "done", unpacking, "done"]);
}

#[tokio::test]
async fn test_event_stream_sends_session_cookie() {
    let base = serve(router(Seen::default())).await;
    let streamer = SseStreamer::new(client(&base, Some("tok")), Duration::from_millis(50));

    let first = tokio::time::timeout(Duration::from_secs(2), streamer.open("whoami").next())
        .await
        .unwrap();
    assert_eq!(first, Some(StreamItem::Message("updater_session=tok".to_string())));
}

#[tokio::test]
async fn test_rejected_event_stream_ends() {
    let base = serve(router(Seen::default())).await;
    let streamer = SseStreamer::new(client(&base, None), Duration::from_millis(50));

    let items: Vec<StreamItem> =
        tokio::time::timeout(Duration::from_secs(2), streamer.open("missing").collect())
            .await
            .unwrap();
    assert_eq!(
        items,
        vec![StreamItem::Error("event stream rejected (404)".to_string())]
    );
}
