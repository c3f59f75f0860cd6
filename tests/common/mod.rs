#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use axum::extract::{Path as UrlPath, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use fuzzchain::errors::FuzzchainError;
use fuzzchain::pipeline::state::{EnumerationSettings, ServiceSettings, WordlistSettings};
use fuzzchain::pipeline::PipelineConfig;
use fuzzchain::process::{Invocation, ProcessOutput, ProcessRunner};
use fuzzchain::tools::{ArchiveSource, ProvisionTimeouts, ToolSet};

type Script = Box<dyn Fn(&Invocation) -> ProcessOutput + Send + Sync>;

/// Process runner driven by a closure; records every invocation.
pub struct FakeRunner {
    script: Script,
    calls: Mutex<Vec<Invocation>>,
}

impl FakeRunner {
    pub fn new(script: impl Fn(&Invocation) -> ProcessOutput + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, invocation: &Invocation, _cancel: &CancellationToken) -> Result<ProcessOutput, FuzzchainError> {
        self.calls.lock().unwrap().push(invocation.clone());
        Ok((self.script)(invocation))
    }

    fn add_search_path(&self, _dir: &Path) {}
}

pub fn exit(code: i32) -> ProcessOutput {
    ProcessOutput {
        exit_code: Some(code),
        ..Default::default()
    }
}

/// Archive source that must never be reached.
pub struct OfflineSource;

#[async_trait]
impl ArchiveSource for OfflineSource {
    async fn fetch(&self, tool: &str, _url: &str) -> Result<Vec<u8>, FuzzchainError> {
        panic!("unexpected download of {}", tool);
    }
}

/// Observable state of the mock scanning service.
#[derive(Default)]
pub struct MockService {
    pub task_requests: Mutex<usize>,
    pub scan_requests: Mutex<Vec<(String, Value)>>,
    /// `task/new` answers without a `taskid`.
    pub omit_taskid: bool,
    /// URLs for which the scan reports success.
    pub vulnerable: HashSet<String>,
}

impl MockService {
    pub fn http_calls(&self) -> usize {
        *self.task_requests.lock().unwrap() + self.scan_requests.lock().unwrap().len()
    }
}

async fn new_task(State(state): State<Arc<MockService>>) -> Json<Value> {
    let mut count = state.task_requests.lock().unwrap();
    *count += 1;
    if state.omit_taskid {
        Json(json!({"success": true}))
    } else {
        Json(json!({"taskid": format!("task{}", *count), "success": true}))
    }
}

async fn start_scan(
    State(state): State<Arc<MockService>>,
    UrlPath(task_id): UrlPath<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let url = body["url"].as_str().unwrap_or_default().to_string();
    state.scan_requests.lock().unwrap().push((task_id, body));
    if state.vulnerable.contains(&url) {
        Json(json!({"success": true, "command": "SELECT *"}))
    } else {
        Json(json!({"success": false}))
    }
}

/// Serve a sqlmapapi look-alike on an ephemeral port. Returns its base URL.
pub async fn spawn_mock_service(state: Arc<MockService>) -> String {
    let app = Router::new()
        .route("/task/new", get(new_task))
        .route("/scan/:taskid/start", post(start_scan))
        .with_state(state);
    spawn_router(app).await
}

pub async fn spawn_router(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn test_config(output: &Path, service_url: &str) -> PipelineConfig {
    PipelineConfig {
        run_id: "it-run".into(),
        output_dir: output.to_path_buf(),
        tools: ToolSet::defaults(&output.join("tools")),
        provision: ProvisionTimeouts::default(),
        wordlist: WordlistSettings {
            depth: 2,
            min_word_length: 3,
            timeout: Duration::from_secs(10),
        },
        enumeration: EnumerationSettings {
            threads: 50,
            extensions: vec!["php".into(), "html".into(), "txt".into()],
            timeout: Duration::from_secs(10),
        },
        service: ServiceSettings {
            url: service_url.to_string(),
            data: None,
            concurrency: 1,
            request_timeout: Duration::from_secs(5),
            autostart: false,
            server_command: vec!["python3".into(), "sqlmapapi.py".into(), "-s".into()],
            startup_timeout: Duration::from_secs(5),
        },
    }
}
