// tests/cli_run.rs

use std::fs;

use jobloop::cli::CliArgs;
use jobloop::snapshot::{FileSnapshotStore, SnapshotStore};
use jobloop::types::{JobId, JobStatus};
use jobloop_test_utils::{init_tracing, with_timeout};
use tempfile::TempDir;

fn write_plan(dir: &TempDir, steps: u32, step_ms: u64) -> String {
    let snapshot = dir.path().join("jobs.json");
    let out = dir.path().join("out");
    let plan = format!(
        r#"
[scheduler]
pool_size = 2
snapshot_path = {snapshot:?}

[job.write]
work = "files"
args = {{ dir = {out:?}, count = 2, cleanup = true }}

[job.wait]
work = "sleep"
args = {{ steps = {steps}, step_ms = {step_ms} }}
after = ["write"]
"#,
        snapshot = snapshot.display().to_string(),
        out = out.display().to_string(),
    );
    let path = dir.path().join("Jobloop.toml");
    fs::write(&path, plan).unwrap();
    path.display().to_string()
}

fn args(config: String) -> CliArgs {
    CliArgs {
        config,
        resume: false,
        dry_run: false,
        stop_after: None,
        log_level: None,
    }
}

#[tokio::test]
async fn plan_runs_to_completion() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let config = write_plan(&dir, 2, 1);

    with_timeout(jobloop::run(args(config))).await.unwrap();

    assert!(!dir.path().join("jobs.json").exists());
    assert!(!dir.path().join("out").join("file_0.txt").exists());
}

#[tokio::test]
async fn dry_run_touches_nothing() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let config = write_plan(&dir, 2, 1);

    let mut dry = args(config);
    dry.dry_run = true;
    with_timeout(jobloop::run(dry)).await.unwrap();

    assert!(!dir.path().join("out").exists());
    assert!(!dir.path().join("jobs.json").exists());
}

#[tokio::test]
async fn stop_after_persists_and_resume_finishes() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let config = write_plan(&dir, 40, 20);

    let mut first = args(config.clone());
    first.stop_after = Some(0.2);
    with_timeout(jobloop::run(first)).await.unwrap();

    let store = FileSnapshotStore::new(dir.path().join("jobs.json"));
    let records = store.load().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, JobId::from_name("wait"));
    assert_eq!(records[0].status, JobStatus::Paused);
    assert_eq!(
        records[0].dependency_statuses.get(&JobId::from_name("write")),
        Some(&JobStatus::Finished)
    );

    let mut resume = args(config);
    resume.resume = true;
    with_timeout(jobloop::run(resume)).await.unwrap();
}

#[tokio::test]
async fn invalid_stop_after_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = write_plan(&dir, 1, 0);

    let mut bad = args(config);
    bad.stop_after = Some(-1.0);
    let err = jobloop::run(bad).await.unwrap_err();
    assert!(err.to_string().contains("--stop-after"));
}
