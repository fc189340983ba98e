//! Fakes shared by the unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use http::StatusCode;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};

use updater_console::app::options::ConsoleOptions;
use updater_console::app::state::AppState;
use updater_console::errors::ConsoleError;
use updater_console::http::api::{
    ConsoleApi, FormFields, PackageUpload, ProgressSender, TransferProgress, UploadEndpoint,
};
use updater_console::http::client::ApiReply;
use updater_console::logstream::streamer::{StreamItem, Streamer};
use updater_console::view::memory::MemoryView;
use updater_console::workflow::recovery::RecoveryOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    FetchConfig,
    SaveConfig,
    CreateProject,
    DeleteProject,
    Upload,
    SelfUpdate,
    Preview,
    FetchDeployment,
    Fragment,
    Rollback,
    Note,
}

/// One recorded API call
#[derive(Debug, Clone)]
pub struct Call {
    pub op: Op,
    pub target: Option<String>,
    pub fields: FormFields,
}

impl Call {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Scripted answer to one call
pub enum Reply {
    Status(StatusCode, String),
    Network,
    /// Answers once the paired sender fires or is dropped
    Gated(oneshot::Receiver<()>, StatusCode, String),
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Reply::Status(StatusCode::OK, body.into())
    }

    pub fn status(code: u16, body: impl Into<String>) -> Self {
        Reply::Status(
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body.into(),
        )
    }

    pub fn gated(body: impl Into<String>) -> (oneshot::Sender<()>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Reply::Gated(rx, StatusCode::OK, body.into()))
    }
}

/// [`ConsoleApi`] answering from per-operation scripts.
///
/// Queued replies are used first, then the standing reply for the
/// operation, then a 404.
#[derive(Default)]
pub struct FakeApi {
    queued: Mutex<HashMap<Op, VecDeque<Reply>>>,
    standing: Mutex<HashMap<Op, (StatusCode, String)>>,
    calls: Mutex<Vec<Call>>,
    progress: Mutex<Vec<(u64, u64)>>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, op: Op, reply: Reply) {
        self.queued
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .push_back(reply);
    }

    pub fn always(&self, op: Op, code: u16, body: impl Into<String>) {
        self.standing.lock().unwrap().insert(
            op,
            (StatusCode::from_u16(code).unwrap(), body.into()),
        );
    }

    /// Progress reported by every upload-like call before it answers
    pub fn set_progress(&self, steps: Vec<(u64, u64)>) {
        *self.progress.lock().unwrap() = steps;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, op: Op) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.op == op).collect()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls_to(op).len()
    }

    async fn answer(
        &self,
        op: Op,
        target: Option<&str>,
        fields: FormFields,
    ) -> Result<ApiReply, ConsoleError> {
        self.calls.lock().unwrap().push(Call {
            op,
            target: target.map(str::to_string),
            fields,
        });

        let queued = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&op)
            .and_then(|q| q.pop_front());
        let reply = match queued {
            Some(reply) => reply,
            None => match self.standing.lock().unwrap().get(&op) {
                Some((status, body)) => Reply::Status(*status, body.clone()),
                None => Reply::Status(StatusCode::NOT_FOUND, String::new()),
            },
        };

        match reply {
            Reply::Status(status, body) => Ok(ApiReply::new(status, body)),
            Reply::Network => Err(ConsoleError::NetworkError("connection refused".to_string())),
            Reply::Gated(gate, status, body) => {
                let _ = gate.await;
                Ok(ApiReply::new(status, body))
            }
        }
    }
}

#[async_trait]
impl ConsoleApi for FakeApi {
    async fn fetch_config(&self) -> Result<ApiReply, ConsoleError> {
        self.answer(Op::FetchConfig, None, Vec::new()).await
    }

    async fn save_config(&self, fields: FormFields) -> Result<ApiReply, ConsoleError> {
        self.answer(Op::SaveConfig, None, fields).await
    }

    async fn create_project(&self, fields: FormFields) -> Result<ApiReply, ConsoleError> {
        self.answer(Op::CreateProject, None, fields).await
    }

    async fn delete_project(&self, project_id: &str) -> Result<ApiReply, ConsoleError> {
        self.answer(Op::DeleteProject, Some(project_id), Vec::new())
            .await
    }

    async fn upload_package(
        &self,
        endpoint: UploadEndpoint,
        package: PackageUpload,
        fields: FormFields,
        progress: ProgressSender,
    ) -> Result<ApiReply, ConsoleError> {
        let op = match endpoint {
            UploadEndpoint::Upload => Op::Upload,
            UploadEndpoint::SelfUpdate => Op::SelfUpdate,
            UploadEndpoint::Preview => Op::Preview,
        };
        let steps = self.progress.lock().unwrap().clone();
        for (loaded, total) in steps {
            let _ = progress.send(TransferProgress { loaded, total });
        }
        drop(progress);
        self.answer(op, Some(&package.file_name), fields).await
    }

    async fn fetch_deployment(&self, deployment_id: &str) -> Result<ApiReply, ConsoleError> {
        self.answer(Op::FetchDeployment, Some(deployment_id), Vec::new())
            .await
    }

    async fn deployments_fragment(
        &self,
        offset: u32,
        limit: u32,
    ) -> Result<ApiReply, ConsoleError> {
        let target = format!("{}:{}", offset, limit);
        self.answer(Op::Fragment, Some(&target), Vec::new()).await
    }

    async fn rollback(&self, deployment_id: &str) -> Result<ApiReply, ConsoleError> {
        self.answer(Op::Rollback, Some(deployment_id), Vec::new())
            .await
    }

    async fn update_note(
        &self,
        deployment_id: &str,
        note: &str,
    ) -> Result<ApiReply, ConsoleError> {
        self.answer(
            Op::Note,
            Some(deployment_id),
            vec![("note", note.to_string())],
        )
        .await
    }
}

/// [`Streamer`] whose streams are fed by the test
#[derive(Default)]
pub struct FakeStreamer {
    senders: Mutex<HashMap<String, mpsc::UnboundedSender<StreamItem>>>,
    opened: Mutex<Vec<String>>,
}

impl FakeStreamer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deployment ids in the order streams were opened
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    /// Push an item into the stream of `id`; false once it is gone
    pub fn send(&self, id: &str, item: StreamItem) -> bool {
        self.senders
            .lock()
            .unwrap()
            .get(id)
            .map(|tx| tx.send(item).is_ok())
            .unwrap_or(false)
    }

    pub fn message(&self, id: &str, payload: &str) -> bool {
        self.send(id, StreamItem::Message(payload.to_string()))
    }

    /// End the stream of `id`
    pub fn close(&self, id: &str) {
        self.senders.lock().unwrap().remove(id);
    }
}

impl Streamer for FakeStreamer {
    fn open(&self, deployment_id: &str) -> BoxStream<'static, StreamItem> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders
            .lock()
            .unwrap()
            .insert(deployment_id.to_string(), tx);
        self.opened.lock().unwrap().push(deployment_id.to_string());
        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed()
    }
}

/// Poll `condition` until it holds, failing the test after about two seconds
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

/// `/api/config` body with the given `(id, name, current_version)` projects
pub fn config_body(projects: &[(&str, &str, Option<&str>)], default_project_id: &str) -> String {
    let projects: Vec<_> = projects
        .iter()
        .map(|(id, name, version)| {
            json!({
                "id": id,
                "name": name,
                "service_name": format!("{}-svc", id),
                "target_dir": format!("/srv/{}", id),
                "current_version": version,
                "max_upload_mb": 200,
                "default_replace_mode": "full",
                "backup_ignore": ["logs/"],
                "replace_ignore": [format!("{}.env", id)],
            })
        })
        .collect();
    json!({
        "listen_addr": ":8080",
        "session_cookie": "updater_session",
        "upload_dir": "/var/updater/uploads",
        "work_dir": "/var/updater/work",
        "backup_dir": "/var/updater/backup",
        "deployments_file": "/var/updater/deployments.json",
        "log_file": "/var/log/updater.log",
        "projects": projects,
        "default_project_id": default_project_id,
    })
    .to_string()
}

/// A package file on disk
pub fn package_file(name: &str, len: usize) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, vec![7u8; len]).unwrap();
    (dir, path)
}

/// Console options with a recovery poll fast enough for tests
pub fn fast_options(max_attempts: u32) -> ConsoleOptions {
    ConsoleOptions {
        recovery: RecoveryOptions {
            interval: Duration::from_millis(1),
            max_attempts,
        },
        ..Default::default()
    }
}

/// Fully wired console over fakes
pub struct Harness {
    pub api: Arc<FakeApi>,
    pub streamer: Arc<FakeStreamer>,
    pub view: Arc<MemoryView>,
    pub state: AppState,
    pub shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

impl Harness {
    pub fn new(options: ConsoleOptions) -> Self {
        let api = FakeApi::new();
        let streamer = FakeStreamer::new();
        let view = Arc::new(MemoryView::new());
        let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
        let state = AppState::new(
            api.clone(),
            streamer.clone(),
            view.clone(),
            &options,
            shutdown_tx.clone(),
        );
        Self {
            api,
            streamer,
            view,
            state,
            shutdown_tx,
        }
    }

    /// Harness whose config endpoint serves `web` (default) and `api`
    pub async fn loaded() -> Self {
        let harness = Self::new(fast_options(5));
        harness.api.always(
            Op::FetchConfig,
            200,
            config_body(&[("web", "Website", Some("1.2.3")), ("api", "API", None)], "web"),
        );
        harness.state.store.load(None, false).await.unwrap();
        harness
    }
}
