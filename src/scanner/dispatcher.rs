use std::collections::BTreeSet;
use std::sync::Arc;
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};
use crate::errors::FuzzchainError;
use crate::pipeline::events::PipelineEvent;
use crate::pipeline::state::{DiscoveredPath, ScanOutcome, ScanStatus};
use super::client::{ScanRequest, ScanService};
use tracing::{info, warn};

/// Opens one scan task per discovered URL.
///
/// URLs never share fate: a failure on one is recorded as `unknown` for that
/// URL and the batch carries on.
pub struct InjectionScanDispatcher {
    service: Arc<dyn ScanService>,
    data: Option<String>,
    concurrency: usize,
    event_tx: Option<mpsc::UnboundedSender<PipelineEvent>>,
    span: Span,
}

impl InjectionScanDispatcher {
    pub fn new(service: Arc<dyn ScanService>) -> Self {
        Self {
            service,
            data: None,
            concurrency: 1,
            event_tx: None,
            span: Span::none(),
        }
    }

    /// Request body sent as `data` with every scan.
    pub fn with_data(mut self, data: Option<String>) -> Self {
        self.data = data;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_event_channel(mut self, tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Outcomes come back in the iteration order of `urls`.
    pub async fn scan(
        &self,
        urls: &BTreeSet<DiscoveredPath>,
        cancel: &CancellationToken,
    ) -> Vec<ScanOutcome> {
        info!(
            parent: &self.span,
            urls = urls.len(),
            service = self.service.service_name(),
            concurrency = self.concurrency,
            "Dispatching injection scans"
        );
        stream::iter(urls.iter())
            .map(|url| self.scan_one(url, cancel).instrument(self.span.clone()))
            .buffered(self.concurrency)
            .collect()
            .await
    }

    async fn scan_one(&self, url: &DiscoveredPath, cancel: &CancellationToken) -> ScanOutcome {
        if cancel.is_cancelled() {
            return self.finish(unknown(url, None, &FuzzchainError::Cancelled("scan dispatch cancelled".into())));
        }

        let task_id = match self.service.create_task().await {
            Ok(id) => id,
            Err(e) => {
                warn!(url = %url, error = %e, "Could not open scan task");
                return self.finish(unknown(url, None, &e));
            }
        };

        let request = ScanRequest {
            url: url.to_string(),
            data: self.data.clone(),
        };
        let outcome = match self.service.start_scan(&task_id, &request).await {
            Ok(resp) if resp.success => {
                let command = resp.command.clone().unwrap_or_default();
                info!(url = %url, task_id = %task_id, command = %command, "Exploit confirmed: {}", command);
                ScanOutcome {
                    url: url.to_string(),
                    task_id: Some(task_id),
                    status: ScanStatus::Succeeded,
                    command: resp.command,
                    error: None,
                }
            }
            Ok(resp) => {
                info!(url = %url, task_id = %task_id, message = ?resp.message, "Scan unsuccessful");
                ScanOutcome {
                    url: url.to_string(),
                    task_id: Some(task_id),
                    status: ScanStatus::Failed,
                    command: resp.command,
                    error: None,
                }
            }
            Err(e) => {
                warn!(url = %url, task_id = %task_id, error = %e, "Could not start scan");
                unknown(url, Some(task_id), &e)
            }
        };
        self.finish(outcome)
    }

    fn finish(&self, outcome: ScanOutcome) -> ScanOutcome {
        if let Some(ref tx) = self.event_tx {
            let _ = tx.send(PipelineEvent::ScanFinished {
                url: outcome.url.clone(),
                status: outcome.status,
            });
        }
        outcome
    }
}

fn unknown(url: &DiscoveredPath, task_id: Option<String>, error: &FuzzchainError) -> ScanOutcome {
    ScanOutcome {
        url: url.to_string(),
        task_id,
        status: ScanStatus::Unknown,
        command: None,
        error: Some(error.to_string()),
    }
}
