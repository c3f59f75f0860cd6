use std::path::Path;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use crate::errors::FuzzchainError;
use crate::pipeline::stage::Stage;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Keeps a launched scan service alive. The child is killed on drop.
pub struct ServiceGuard {
    child: Child,
    host: String,
    port: u16,
}

impl ServiceGuard {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub async fn shutdown(mut self) {
        if let Err(e) = self.child.kill().await {
            warn!(error = %e, "Failed to stop scan service");
        } else {
            info!(address = %self.address(), "Scan service stopped");
        }
    }
}

/// Host and port the service should bind, taken from its base URL.
pub fn service_endpoint(url: &str) -> Result<(String, u16), FuzzchainError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| FuzzchainError::Config(format!("Invalid service URL '{}': {}", url, e)))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| FuzzchainError::Config(format!("Service URL '{}' has no host", url)))?
        .to_string();
    let port = parsed
        .port_or_known_default()
        .ok_or_else(|| FuzzchainError::Config(format!("Service URL '{}' has no port", url)))?;
    Ok((host, port))
}

/// Start `command -H host -p port` in `cwd` and wait until the port accepts
/// connections. The port must be free beforehand.
pub async fn launch_service(
    command: &[String],
    cwd: &Path,
    url: &str,
    startup_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<ServiceGuard, FuzzchainError> {
    let (host, port) = service_endpoint(url)?;
    let (program, args) = command
        .split_first()
        .ok_or_else(|| FuzzchainError::Config("service.server_command is empty".into()))?;

    if port_open(&host, port).await {
        return Err(FuzzchainError::StageExecution {
            stage: Stage::InjectionScan,
            exit_code: None,
            stderr: format!("{}:{} is already in use", host, port),
        });
    }

    info!(program = %program, host = %host, port, "Starting scan service");
    let child = Command::new(program)
        .args(args)
        .arg("-H")
        .arg(&host)
        .arg("-p")
        .arg(port.to_string())
        .current_dir(cwd)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| FuzzchainError::Spawn {
            program: program.clone(),
            source,
        })?;

    let mut guard = ServiceGuard { child, host, port };
    wait_until_ready(&mut guard, startup_timeout, cancel).await?;
    info!(address = %guard.address(), "Scan service accepting connections");
    Ok(guard)
}

async fn wait_until_ready(
    guard: &mut ServiceGuard,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(), FuzzchainError> {
    let deadline = Instant::now() + timeout;
    loop {
        check_alive(guard)?;
        if port_open(&guard.host, guard.port).await {
            // A child that failed to bind exits shortly after.
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(FuzzchainError::Cancelled("scan service startup cancelled".into()));
                }
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
            }
            return check_alive(guard);
        }
        if Instant::now() >= deadline {
            return Err(FuzzchainError::Timeout {
                stage: Stage::InjectionScan,
                secs: timeout.as_secs(),
            });
        }
        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(FuzzchainError::Cancelled("scan service startup cancelled".into()));
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }
    }
}

fn check_alive(guard: &mut ServiceGuard) -> Result<(), FuzzchainError> {
    match guard.child.try_wait()? {
        Some(status) => Err(FuzzchainError::StageExecution {
            stage: Stage::InjectionScan,
            exit_code: status.code(),
            stderr: "scan service exited during startup".into(),
        }),
        None => Ok(()),
    }
}

async fn port_open(host: &str, port: u16) -> bool {
    match tokio::time::timeout(POLL_INTERVAL, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!(host, port, error = %e, "Service port not ready");
            false
        }
        Err(_) => false,
    }
}
