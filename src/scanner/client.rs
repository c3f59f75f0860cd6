use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use crate::errors::FuzzchainError;
use tracing::debug;

/// Body of `POST /scan/{taskid}/start`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanRequest {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// What the service said about a started scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanStartResponse {
    pub success: bool,
    pub command: Option<String>,
    pub message: Option<String>,
}

impl ScanStartResponse {
    pub fn from_json(value: &Value) -> Self {
        Self {
            success: value.get("success").and_then(Value::as_bool).unwrap_or(false),
            command: value.get("command").and_then(Value::as_str).map(str::to_string),
            message: value.get("message").and_then(Value::as_str).map(str::to_string),
        }
    }
}

#[async_trait]
pub trait ScanService: Send + Sync {
    /// Open a task and return its identifier.
    async fn create_task(&self) -> Result<String, FuzzchainError>;

    async fn start_scan(
        &self,
        task_id: &str,
        request: &ScanRequest,
    ) -> Result<ScanStartResponse, FuzzchainError>;

    /// Service name for logging
    fn service_name(&self) -> &str;
}

/// Client for sqlmap's REST API (`sqlmapapi.py -s`).
pub struct SqlmapApiClient {
    client: Client,
    base_url: String,
}

impl SqlmapApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FuzzchainError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FuzzchainError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn read_json(resp: reqwest::Response) -> Result<Value, FuzzchainError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(FuzzchainError::ServiceResponse(format!("HTTP {}", status.as_u16())));
        }
        resp.json::<Value>().await
            .map_err(|e| FuzzchainError::ServiceResponse(format!("Invalid JSON: {}", e)))
    }
}

#[async_trait]
impl ScanService for SqlmapApiClient {
    async fn create_task(&self) -> Result<String, FuzzchainError> {
        let resp = self.client
            .get(format!("{}/task/new", self.base_url))
            .send()
            .await
            .map_err(|e| FuzzchainError::ServiceUnreachable(format!("{}: {}", self.base_url, e)))?;

        let data = Self::read_json(resp).await?;
        debug!(response = %data, "task/new");

        data.get("taskid")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| FuzzchainError::ServiceResponse("task/new response has no taskid".into()))
    }

    async fn start_scan(
        &self,
        task_id: &str,
        request: &ScanRequest,
    ) -> Result<ScanStartResponse, FuzzchainError> {
        let resp = self.client
            .post(format!("{}/scan/{}/start", self.base_url, task_id))
            .json(request)
            .send()
            .await
            .map_err(|e| FuzzchainError::ServiceUnreachable(format!("{}: {}", self.base_url, e)))?;

        let data = Self::read_json(resp).await?;
        debug!(task_id, response = %data, "scan/start");
        Ok(ScanStartResponse::from_json(&data))
    }

    fn service_name(&self) -> &str {
        "sqlmapapi"
    }
}
