mod common;

use std::sync::Arc;
use std::time::Duration;
use common::{exit, spawn_mock_service, test_config, FakeRunner, MockService, OfflineSource};
use fuzzchain::errors::FuzzchainError;
use fuzzchain::pipeline::state::ScanStatus;
use fuzzchain::pipeline::{PipelineOrchestrator, RunMode, RunStatus, Stage, Target};
use fuzzchain::scanner::SqlmapApiClient;

/// Probes pass; the wordlist tool writes admin/login/test; the enumerator
/// reports `report` verbatim.
fn runner_with_report(report: &'static str) -> FakeRunner {
    FakeRunner::new(move |inv| {
        match inv.stage {
            Stage::Wordlist => std::fs::write(inv.flag_value("-w").unwrap(), "admin\nlogin\ntest\n").unwrap(),
            Stage::Enumeration => std::fs::write(inv.flag_value("-o").unwrap(), report).unwrap(),
            _ => {}
        }
        exit(0)
    })
}

fn orchestrator(
    tmp: &std::path::Path,
    runner: Arc<FakeRunner>,
    service_url: &str,
) -> PipelineOrchestrator {
    let client = SqlmapApiClient::new(service_url, Duration::from_secs(5)).unwrap();
    PipelineOrchestrator::new(test_config(tmp, service_url), runner, Arc::new(OfflineSource), Arc::new(client))
}

fn target() -> Option<Target> {
    Some(Target::parse("10.10.73.89").unwrap())
}

#[tokio::test]
async fn test_single_discovered_path_gets_one_task_and_one_scan() {
    let tmp = tempfile::tempdir().unwrap();
    let service = Arc::new(MockService::default());
    let url = spawn_mock_service(service.clone()).await;
    let report = "# Dirsearch started as: dirsearch.py -u http://10.10.73.89\n\nhttp://10.10.73.89/admin\n";
    let runner = Arc::new(runner_with_report(report));

    let run = orchestrator(tmp.path(), runner, &url)
        .run(RunMode::Crawl, target())
        .await
        .unwrap();

    assert_eq!(run.discovered.len(), 1);
    assert_eq!(run.discovered.iter().next().unwrap().as_str(), "http://10.10.73.89/admin");
    assert_eq!(*service.task_requests.lock().unwrap(), 1);
    let scans = service.scan_requests.lock().unwrap();
    assert_eq!(scans.len(), 1);
    assert_eq!(scans[0].0, "task1");
    assert_eq!(scans[0].1["url"], "http://10.10.73.89/admin");
    assert_eq!(run.outcomes[0].status, ScanStatus::Failed);
}

#[tokio::test]
async fn test_confirmed_injection_is_succeeded_with_command() {
    let tmp = tempfile::tempdir().unwrap();
    let service = Arc::new(MockService {
        vulnerable: ["http://10.10.73.89/login.php".to_string()].into(),
        ..Default::default()
    });
    let url = spawn_mock_service(service.clone()).await;
    let runner = Arc::new(runner_with_report("http://10.10.73.89/admin\nhttp://10.10.73.89/login.php\n"));

    let run = orchestrator(tmp.path(), runner, &url)
        .run(RunMode::Crawl, target())
        .await
        .unwrap();

    let login = run.outcomes.iter().find(|o| o.url.ends_with("login.php")).unwrap();
    assert_eq!(login.status, ScanStatus::Succeeded);
    assert_eq!(login.command.as_deref(), Some("SELECT *"));
    assert_eq!(run.summary().scans_succeeded, 1);
    assert_eq!(run.summary().scans_failed, 1);
}

#[tokio::test]
async fn test_wordlist_failure_makes_no_http_calls() {
    let tmp = tempfile::tempdir().unwrap();
    let service = Arc::new(MockService::default());
    let url = spawn_mock_service(service.clone()).await;
    let runner = Arc::new(FakeRunner::new(|inv| match inv.stage {
        Stage::Wordlist => exit(1),
        _ => exit(0),
    }));

    let err = orchestrator(tmp.path(), runner.clone(), &url)
        .run(RunMode::Crawl, target())
        .await
        .unwrap_err();

    assert!(matches!(err, FuzzchainError::StageExecution { stage: Stage::Wordlist, .. }));
    assert_eq!(err.exit_code(), 4);
    assert!(runner.calls().iter().all(|c| c.stage != Stage::Enumeration));
    assert_eq!(service.http_calls(), 0);
}

#[tokio::test]
async fn test_enumeration_failure_skips_parse_and_dispatch() {
    let tmp = tempfile::tempdir().unwrap();
    let service = Arc::new(MockService::default());
    let url = spawn_mock_service(service.clone()).await;
    let wordlist = tmp.path().join("words.txt");
    std::fs::write(&wordlist, "admin\n").unwrap();
    let runner = Arc::new(FakeRunner::new(|inv| match inv.stage {
        Stage::Enumeration => {
            std::fs::write(inv.flag_value("-o").unwrap(), "http://10.10.73.89/admin\n").unwrap();
            exit(2)
        }
        _ => exit(0),
    }));
    let orchestrator = orchestrator(tmp.path(), runner, &url);

    let err = orchestrator
        .run(RunMode::Scan { wordlist }, target())
        .await
        .unwrap_err();

    assert!(matches!(err, FuzzchainError::StageExecution { stage: Stage::Enumeration, .. }));
    let state = orchestrator.run_state();
    let state = state.read().await;
    assert_eq!(state.status, RunStatus::Failed);
    assert!(state.discovered.is_empty());
    assert!(!state.completed_stages().contains(&Stage::Parsing));
    assert_eq!(service.http_calls(), 0);
}

#[tokio::test]
async fn test_missing_taskid_recorded_unknown_and_rest_proceed() {
    let tmp = tempfile::tempdir().unwrap();
    let service = Arc::new(MockService {
        omit_taskid: true,
        ..Default::default()
    });
    let url = spawn_mock_service(service.clone()).await;
    let runner = Arc::new(runner_with_report("http://10.10.73.89/a\nhttp://10.10.73.89/b\n"));

    let run = orchestrator(tmp.path(), runner, &url)
        .run(RunMode::Crawl, target())
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.outcomes.len(), 2);
    assert!(run.outcomes.iter().all(|o| o.status == ScanStatus::Unknown));
    assert_eq!(*service.task_requests.lock().unwrap(), 2);
    assert!(service.scan_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_service_does_not_fail_run() {
    let tmp = tempfile::tempdir().unwrap();
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let runner = Arc::new(runner_with_report("http://10.10.73.89/a\n"));

    let run = orchestrator(tmp.path(), runner, &format!("http://127.0.0.1:{}", port))
        .run(RunMode::Crawl, target())
        .await
        .unwrap();

    assert_eq!(run.outcomes[0].status, ScanStatus::Unknown);
    assert!(run.outcomes[0].error.as_deref().unwrap().contains("unreachable"));
}

#[tokio::test]
async fn test_run_artifacts_written() {
    let tmp = tempfile::tempdir().unwrap();
    let service = Arc::new(MockService::default());
    let url = spawn_mock_service(service).await;
    let runner = Arc::new(runner_with_report("http://10.10.73.89/admin\n"));

    let run = orchestrator(tmp.path(), runner, &url)
        .run(RunMode::Crawl, target())
        .await
        .unwrap();

    let run_dir = tmp.path().join("it-run");
    let wordlist = run.wordlist.unwrap();
    assert!(wordlist.path.starts_with(&run_dir));
    assert_eq!(wordlist.line_count, 3);
    assert!(run.report.unwrap().path.starts_with(&run_dir));

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(run_dir.join("run_summary.json")).unwrap()).unwrap();
    assert_eq!(summary["status"], "completed");
    assert_eq!(
        std::fs::read_to_string(run_dir.join("discovered_paths.txt")).unwrap(),
        "http://10.10.73.89/admin\n"
    );
}
