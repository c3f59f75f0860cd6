//! Injection scanning: the scan-service client, per-URL dispatch and the
//! optional local service launcher.

pub mod client;
pub mod dispatcher;
pub mod launcher;

pub use client::{ScanRequest, ScanService, ScanStartResponse, SqlmapApiClient};
pub use dispatcher::InjectionScanDispatcher;
pub use launcher::{launch_service, ServiceGuard};
