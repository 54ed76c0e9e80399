use std::path::Path;
use std::sync::{Arc, Mutex};

use imprint_build::{BuildAction, BuildError, BuildOptions, Builder, SentinelStore};
use imprint_core::{ArtifactReference, Project, Staleness};
use imprint_docker::{CommandExecutor, DockerClient, ExecError};
use mockall::mock;
use tempfile::TempDir;

mock! {
    Executor {}

    impl CommandExecutor for Executor {
        async fn exec(&self, program: &str, args: &[String]) -> Result<String, ExecError>;
        async fn exec_streaming(
            &self,
            program: &str,
            args: &[String],
            cwd: &Path,
        ) -> Result<(), ExecError>;
    }
}

const CONFIG: &str = r#"
[[target]]
name = "image"
repository = "org/app"
inputs = ["requirements.txt", "package.json", "Dockerfile"]

[target.build]
kind = "docker"
"#;

fn project(config: &str) -> (TempDir, Project) {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("imprint.toml"), config).unwrap();
    std::fs::write(tmp.path().join("requirements.txt"), "flask==2\n").unwrap();
    std::fs::write(tmp.path().join("package.json"), "{}\n").unwrap();
    std::fs::write(tmp.path().join("Dockerfile"), "FROM python:3.11\n").unwrap();
    let project = Project::load(tmp.path(), None).unwrap();
    (tmp, project)
}

/// Executor that records every invocation as `program args...` and succeeds.
fn recording_executor(calls: Arc<Mutex<Vec<String>>>) -> MockExecutor {
    let mut mock = MockExecutor::new();
    let streaming = calls.clone();
    mock.expect_exec_streaming().returning(move |program, args, _| {
        streaming
            .lock()
            .unwrap()
            .push(format!("{program} {}", args.join(" ")));
        Ok(())
    });
    mock.expect_exec().returning(move |program, args| {
        calls
            .lock()
            .unwrap()
            .push(format!("{program} {}", args.join(" ")));
        Ok(String::new())
    });
    mock
}

fn builder(project: &Project, executor: MockExecutor) -> Builder<MockExecutor> {
    Builder::new(
        DockerClient::with_executor(executor),
        SentinelStore::new(project.config.settings.staleness),
        project.hasher(),
    )
}

fn builds(calls: &Mutex<Vec<String>>) -> usize {
    calls
        .lock()
        .unwrap()
        .iter()
        .filter(|c| c.starts_with("docker build"))
        .count()
}

// ── Example scenario ──

#[tokio::test]
async fn first_build_runs_procedure_second_is_fresh() {
    let (tmp, project) = project(CONFIG);
    let calls = Arc::new(Mutex::new(Vec::new()));
    let builder = builder(&project, recording_executor(calls.clone()));
    let target = project.target("image").unwrap();

    let first = builder.build(target, BuildOptions::default()).await.unwrap();
    assert_eq!(first.action, BuildAction::Built);
    assert_eq!(first.reference.repository(), "org/app");
    assert_eq!(builds(&calls), 1);

    let second = builder.build(target, BuildOptions::default()).await.unwrap();
    assert_eq!(second.action, BuildAction::Fresh);
    assert_eq!(second.reference, first.reference);
    assert_eq!(builds(&calls), 1);

    // Edit an input: new fingerprint, new build.
    std::fs::write(tmp.path().join("requirements.txt"), "flask==3\n").unwrap();
    let third = builder.build(target, BuildOptions::default()).await.unwrap();
    assert_eq!(third.action, BuildAction::Built);
    assert_ne!(third.reference, first.reference);
    assert_eq!(builds(&calls), 2);
}

#[tokio::test]
async fn build_tags_reference_then_latest_alias() {
    let (_tmp, project) = project(CONFIG);
    let calls = Arc::new(Mutex::new(Vec::new()));
    let builder = builder(&project, recording_executor(calls.clone()));
    let target = project.target("image").unwrap();

    let outcome = builder.build(target, BuildOptions::default()).await.unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].starts_with(&format!("docker build -t {} -f ", outcome.reference)));
    assert_eq!(
        calls[1],
        format!("docker tag {} org/app:latest", outcome.reference)
    );
}

#[tokio::test]
async fn floating_alias_can_be_disabled() {
    let (_tmp, project) = project(
        r#"
[[target]]
name = "frontend"
repository = "org/frontend"
inputs = ["package.json"]
floating_alias = false

[target.build]
kind = "command"
program = "make"
args = ["frontend", "OUT={reference}"]
"#,
    );
    let calls = Arc::new(Mutex::new(Vec::new()));
    let builder = builder(&project, recording_executor(calls.clone()));
    let target = project.target("frontend").unwrap();

    let outcome = builder.build(target, BuildOptions::default()).await.unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(*calls, [format!("make frontend OUT={}", outcome.reference)]);
}

// ── Skip override ──

#[tokio::test]
async fn skip_build_never_invokes_procedure() {
    let (_tmp, project) = project(CONFIG);
    let mut mock = MockExecutor::new();
    mock.expect_exec_streaming().never();
    mock.expect_exec().never();
    let builder = builder(&project, mock);
    let target = project.target("image").unwrap();

    let expected = builder.reference(target).unwrap();
    let outcome = builder
        .build(target, BuildOptions { skip_build: true })
        .await
        .unwrap();

    assert_eq!(outcome.action, BuildAction::Skipped);
    assert_eq!(outcome.reference, expected);
    assert!(!target.sentinel.exists());
}

// ── Failures ──

#[tokio::test]
async fn failed_procedure_reports_exit_status_and_leaves_no_sentinel() {
    let (_tmp, project) = project(CONFIG);
    let mut mock = MockExecutor::new();
    mock.expect_exec_streaming().times(1).returning(|_, _, _| {
        Err(ExecError::CommandFailed {
            program: "docker".to_owned(),
            args: vec![],
            status: Some(7),
            stderr: "no space left".to_owned(),
        })
    });
    mock.expect_exec().never();
    let builder = builder(&project, mock);
    let target = project.target("image").unwrap();

    let err = builder
        .build(target, BuildOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(&err, BuildError::BuildFailed { target, .. } if target == "image"));
    assert_eq!(err.exit_status(), Some(7));
    assert!(!target.sentinel.exists());
}

#[tokio::test]
async fn missing_input_fails_before_any_procedure() {
    let (tmp, project) = project(CONFIG);
    std::fs::remove_file(tmp.path().join("package.json")).unwrap();
    let mut mock = MockExecutor::new();
    mock.expect_exec_streaming().never();
    let builder = builder(&project, mock);

    let err = builder
        .build(project.target("image").unwrap(), BuildOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BuildError::Fingerprint {
            source: imprint_core::Error::InputNotFound { .. },
            ..
        }
    ));
}

// ── Sentinel store ──

#[tokio::test]
async fn sentinel_records_fingerprint_and_reference() {
    let (_tmp, project) = project(CONFIG);
    let builder = builder(&project, recording_executor(Arc::default()));
    let target = project.target("image").unwrap();

    let outcome = builder.build(target, BuildOptions::default()).await.unwrap();
    let sentinel = builder.sentinels().read(target).unwrap().unwrap();

    assert_eq!(sentinel.target, "image");
    assert_eq!(sentinel.fingerprint, outcome.reference.fingerprint().as_str());
    assert_eq!(sentinel.reference, outcome.reference.to_string());
    assert!(sentinel.built_at > 0);
    assert_eq!(
        target.sentinel,
        project.sentinel_dir().join("image.json")
    );
}

#[tokio::test]
async fn invalidate_forces_rebuild() {
    let (_tmp, project) = project(CONFIG);
    let calls = Arc::new(Mutex::new(Vec::new()));
    let builder = builder(&project, recording_executor(calls.clone()));
    let target = project.target("image").unwrap();

    builder.build(target, BuildOptions::default()).await.unwrap();
    builder.sentinels().invalidate(target).unwrap();
    // Invalidating twice is fine.
    builder.sentinels().invalidate(target).unwrap();
    builder.build(target, BuildOptions::default()).await.unwrap();

    assert_eq!(builds(&calls), 2);
}

#[tokio::test]
async fn corrupt_sentinel_is_stale() {
    let (_tmp, project) = project(CONFIG);
    let calls = Arc::new(Mutex::new(Vec::new()));
    let builder = builder(&project, recording_executor(calls.clone()));
    let target = project.target("image").unwrap();

    std::fs::create_dir_all(project.sentinel_dir()).unwrap();
    std::fs::write(&target.sentinel, b"{ not json").unwrap();

    let reference = builder.reference(target).unwrap();
    assert!(!builder.is_fresh(target, &reference));
    assert!(builder.sentinels().read(target).is_err());

    let outcome = builder.build(target, BuildOptions::default()).await.unwrap();
    assert_eq!(outcome.action, BuildAction::Built);
    assert!(builder.is_fresh(target, &reference));
}

#[tokio::test]
async fn sentinel_write_leaves_no_temp_files() {
    let (_tmp, project) = project(CONFIG);
    let builder = builder(&project, recording_executor(Arc::default()));
    let target = project.target("image").unwrap();

    for _ in 0..3 {
        builder.sentinels().invalidate(target).unwrap();
        builder.build(target, BuildOptions::default()).await.unwrap();
    }

    let entries: Vec<_> = std::fs::read_dir(project.sentinel_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, ["image.json"]);
}

#[test]
fn concurrent_marks_leave_one_parseable_marker() {
    let (_tmp, project) = project(CONFIG);
    let store = SentinelStore::new(Staleness::Fingerprint);
    let target = project.target("image").unwrap();
    let current = target.reference(&project.hasher()).unwrap();
    let other = ArtifactReference::new(
        target.repository.as_str(),
        project.hasher().hash_bytes([b"other".as_slice()]),
    );

    std::thread::scope(|scope| {
        for i in 0..8 {
            let reference = if i % 2 == 0 { &current } else { &other };
            scope.spawn(move || {
                for _ in 0..20 {
                    store.mark_built(target, reference).unwrap();
                }
            });
        }
    });

    let sentinel = store.read(target).unwrap().unwrap();
    assert!(
        [current.to_string(), other.to_string()].contains(&sentinel.reference),
        "unexpected marker {sentinel:?}"
    );
    assert_eq!(sentinel.target, "image");

    let entries: Vec<_> = std::fs::read_dir(project.sentinel_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, ["image.json"]);
}

#[test]
fn mtime_mode_compares_marker_against_inputs() {
    let (tmp, project) = project(CONFIG);
    let store = SentinelStore::new(Staleness::Mtime);
    let target = project.target("image").unwrap();
    let reference = target.reference(&project.hasher()).unwrap();

    assert!(!store.is_fresh(target, &reference));

    store.mark_built(target, &reference).unwrap();
    assert!(store.is_fresh(target, &reference));

    // Touch an input after the marker: stale even though content is unchanged.
    let input = tmp.path().join("Dockerfile");
    let later = std::fs::metadata(&target.sentinel)
        .unwrap()
        .modified()
        .unwrap()
        + std::time::Duration::from_secs(60);
    std::fs::File::options()
        .write(true)
        .open(&input)
        .unwrap()
        .set_modified(later)
        .unwrap();
    assert!(!store.is_fresh(target, &reference));
}

#[test]
fn fingerprint_mode_ignores_mtime() {
    let (tmp, project) = project(CONFIG);
    let store = SentinelStore::new(Staleness::Fingerprint);
    let target = project.target("image").unwrap();
    let reference = target.reference(&project.hasher()).unwrap();
    store.mark_built(target, &reference).unwrap();

    let later = std::time::SystemTime::now() + std::time::Duration::from_secs(3600);
    std::fs::File::options()
        .write(true)
        .open(tmp.path().join("Dockerfile"))
        .unwrap()
        .set_modified(later)
        .unwrap();

    assert!(store.is_fresh(target, &reference));
}
