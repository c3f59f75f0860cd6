use std::time::Duration;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};
use crate::errors::FuzzchainError;
use crate::pipeline::state::Target;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProbeOutcome {
    NotFound,
    Json(Value),
    NotJson,
    Unexpected(u16),
    Unreachable(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub word: String,
    pub url: String,
    pub outcome: ProbeOutcome,
}

impl std::fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.outcome {
            ProbeOutcome::NotFound => write!(f, "Word '{}' not found.", self.word),
            ProbeOutcome::Json(value) => write!(f, "{}", value),
            ProbeOutcome::NotJson => f.write_str("Response is not valid JSON."),
            ProbeOutcome::Unexpected(code) => write!(f, "Unexpected status code: {}", code),
            ProbeOutcome::Unreachable(e) => write!(f, "Request for '{}' failed: {}", self.word, e),
        }
    }
}

/// Requests `<target>/<word>` for each word, one at a time.
pub struct WordProber {
    client: Client,
    target: Target,
    span: Span,
}

impl WordProber {
    pub fn new(target: Target, timeout: Duration) -> Result<Self, FuzzchainError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FuzzchainError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            target,
            span: Span::none(),
        })
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub async fn probe_word(&self, word: &str) -> ProbeResult {
        let url = self.target.url_for(word);
        let outcome = match self.client.get(&url).send().await {
            Err(e) => {
                warn!(url = %url, error = %e, "Probe request failed");
                ProbeOutcome::Unreachable(e.to_string())
            }
            Ok(resp) => match resp.status() {
                StatusCode::NOT_FOUND => ProbeOutcome::NotFound,
                StatusCode::OK => match resp.json::<Value>().await {
                    Ok(value) => ProbeOutcome::Json(value),
                    Err(e) => {
                        debug!(url = %url, error = %e, "Body is not JSON");
                        ProbeOutcome::NotJson
                    }
                },
                other => ProbeOutcome::Unexpected(other.as_u16()),
            },
        };
        ProbeResult {
            word: word.to_string(),
            url,
            outcome,
        }
    }

    /// Probe every non-blank line of `words` in order. `on_result` sees each
    /// result as soon as it is known.
    pub async fn probe_all<R, F>(
        &self,
        words: R,
        cancel: &CancellationToken,
        mut on_result: F,
    ) -> Result<Vec<ProbeResult>, FuzzchainError>
    where
        R: AsyncBufRead + Unpin,
        F: FnMut(&ProbeResult),
    {
        async {
            info!(target = %self.target, "Probing words");
            let mut lines = words.lines();
            let mut results = Vec::new();
            while let Some(line) = lines.next_line().await? {
                if cancel.is_cancelled() {
                    return Err(FuzzchainError::Cancelled("probe cancelled".into()));
                }
                let word = line.trim();
                if word.is_empty() {
                    continue;
                }
                let result = self.probe_word(word).await;
                on_result(&result);
                results.push(result);
            }
            let hits = results
                .iter()
                .filter(|r| matches!(r.outcome, ProbeOutcome::Json(_) | ProbeOutcome::NotJson))
                .count();
            info!(words = results.len(), hits, "Probe finished");
            Ok(results)
        }
        .instrument(self.span.clone())
        .await
    }
}
