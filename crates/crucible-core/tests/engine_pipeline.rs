//! End-to-end pipeline tests driven through a scripted command runner, so no
//! container runtime is needed on the host.

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crucible_core::{
    CommandRunner, CrucibleConfig, ExecutionResult, Job, JobDispatcher, JobStatus, JobStore,
    MemoryJobStore, ResultNotifier, SandboxPool, WorkerExecutor,
};
use tempfile::TempDir;

const HELLO_SOURCE: &str =
    r#"public class Hi{public static void main(String[] a){System.out.println("hi");}}"#;

fn ok(output: &str) -> ExecutionResult {
    ExecutionResult {
        success: true,
        output: output.to_string(),
        exit_code: 0,
    }
}

fn fail(output: &str, exit_code: i32) -> ExecutionResult {
    ExecutionResult {
        success: false,
        output: output.to_string(),
        exit_code,
    }
}

/// Command runner that answers from a scripted response function and records
/// every command line it was asked to run.
struct ScriptedRunner {
    log: Mutex<Vec<String>>,
    respond: Box<dyn Fn(&str) -> ExecutionResult + Send + Sync>,
}

impl ScriptedRunner {
    fn new(respond: impl Fn(&str) -> ExecutionResult + Send + Sync + 'static) -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    fn docker_happy() -> Self {
        Self::new(|command| {
            if command.starts_with("docker rm") {
                fail("Error: No such container", 1)
            } else if command.starts_with("docker run") {
                ok("c0ffee")
            } else if command.contains("javac") {
                ok("")
            } else {
                ok("hi\n")
            }
        })
    }

    fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn count_matching(&self, needle: &str) -> usize {
        self.commands().iter().filter(|c| c.contains(needle)).count()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &str, _timeout: Duration) -> ExecutionResult {
        self.log.lock().unwrap().push(command.to_string());
        (self.respond)(command)
    }
}

#[derive(Default)]
struct RecordingNotifier {
    deliveries: Mutex<Vec<(String, bool, String)>>,
}

#[async_trait]
impl ResultNotifier for RecordingNotifier {
    async fn notify(&self, job_id: &str, success: bool, output: &str) {
        self.deliveries
            .lock()
            .unwrap()
            .push((job_id.to_string(), success, output.to_string()));
    }
}

fn test_config(root: &Path) -> CrucibleConfig {
    let mut config = CrucibleConfig::default();
    config.execution.workspace_root = root.to_path_buf();
    config
}

struct Harness {
    runner: Arc<ScriptedRunner>,
    pool: Arc<SandboxPool>,
    store: Arc<MemoryJobStore>,
    notifier: Arc<RecordingNotifier>,
    executor: WorkerExecutor,
    _root: TempDir,
}

fn harness_with(config_mut: impl FnOnce(&mut CrucibleConfig), runner: ScriptedRunner) -> Harness {
    let root = TempDir::new().unwrap();
    let mut config = test_config(root.path());
    config_mut(&mut config);

    let runner = Arc::new(runner);
    let pool = Arc::new(SandboxPool::new(
        &config,
        runner.clone() as Arc<dyn CommandRunner>,
    ));
    let store = Arc::new(MemoryJobStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let executor = WorkerExecutor::new(
        &config,
        pool.clone(),
        runner.clone() as Arc<dyn CommandRunner>,
        store.clone() as Arc<dyn JobStore>,
        notifier.clone() as Arc<dyn ResultNotifier>,
    );

    Harness {
        runner,
        pool,
        store,
        notifier,
        executor,
        _root: root,
    }
}

fn harness(runner: ScriptedRunner) -> Harness {
    harness_with(|_| {}, runner)
}

#[tokio::test]
async fn successful_job_completes_with_output() {
    let h = harness(ScriptedRunner::docker_happy());
    let job = Job::with_id("job-a", HELLO_SOURCE);
    h.store.insert(&job).await;

    h.executor.execute(&job, 0).await;

    let record = h.store.get("job-a").await.unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.success, Some(true));
    assert!(record.output.unwrap().contains("hi"));

    assert_eq!(h.runner.count_matching("javac -encoding UTF-8 Hi.java"), 1);
    assert_eq!(h.runner.count_matching("java -Dfile.encoding=UTF-8 Hi"), 1);
    assert_eq!(h.pool.usage(0), 1);

    let deliveries = h.notifier.deliveries.lock().unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].0, "job-a");
    assert!(deliveries[0].1);
}

#[tokio::test]
async fn forbidden_keyword_fails_before_any_container_call() {
    let h = harness(ScriptedRunner::docker_happy());
    let job = Job::with_id("job-b", "class X { void f() { Runtime.getRuntime(); } }");
    h.store.insert(&job).await;

    h.executor.execute(&job, 0).await;

    let record = h.store.get("job-b").await.unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    let output = record.output.unwrap();
    assert!(output.contains("Security Error"));
    assert!(output.contains("Runtime.getRuntime"));

    assert_eq!(h.runner.count_matching("docker exec"), 0);
    // Rejected before any file was written.
    assert!(!h._root.path().join("job-b").exists());
    // The attempt still counts against the slot.
    assert_eq!(h.pool.usage(0), 1);
}

#[tokio::test]
async fn ambiguous_entry_point_fails_without_compiling() {
    let h = harness(ScriptedRunner::docker_happy());
    let job = Job::with_id(
        "job-c",
        "class A { public static void main(String[] a) {} }\n\
         class B { public static void main(String[] a) {} }",
    );
    h.store.insert(&job).await;

    h.executor.execute(&job, 0).await;

    let record = h.store.get("job-c").await.unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    let output = record.output.unwrap();
    assert!(output.contains("Compile Error"));
    assert!(output.contains("exactly one main method is allowed"));
    assert_eq!(h.runner.count_matching("docker exec"), 0);
}

#[tokio::test]
async fn compiler_diagnostics_are_terminal_and_not_retried() {
    let h = harness(ScriptedRunner::new(|command| {
        if command.contains("javac") {
            fail("Hi.java:1: error: ';' expected", 1)
        } else if command.starts_with("docker") {
            ok("")
        } else {
            ok("")
        }
    }));
    let job = Job::with_id("job-d", HELLO_SOURCE);
    h.store.insert(&job).await;

    h.executor.execute(&job, 0).await;

    let record = h.store.get("job-d").await.unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert!(record.output.unwrap().contains("';' expected"));
    assert_eq!(h.runner.count_matching("javac"), 1);
    assert_eq!(h.runner.count_matching("java -Dfile"), 0);
}

#[tokio::test]
async fn runtime_timeout_is_terminal() {
    let h = harness(ScriptedRunner::new(|command| {
        if command.contains("java -Dfile") {
            fail("TIMEOUT: execution exceeded the 5000 ms limit", -1)
        } else {
            ok("")
        }
    }));
    let job = Job::with_id("job-e", HELLO_SOURCE);
    h.store.insert(&job).await;

    h.executor.execute(&job, 0).await;

    let record = h.store.get("job-e").await.unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert!(record.output.unwrap().contains("TIMEOUT"));
    // A hang is a property of the submission, not the infrastructure.
    assert_eq!(h.runner.count_matching("java -Dfile"), 1);
    assert_eq!(h.pool.usage(0), 1);
}

#[tokio::test]
async fn infrastructure_failure_resets_slot_and_retries_once() {
    let attempts = Mutex::new(0u32);
    let h = harness(ScriptedRunner::new(move |command| {
        if command.contains("javac") {
            let mut n = attempts.lock().unwrap();
            *n += 1;
            if *n == 1 {
                return fail(
                    "Error response from daemon: Container crucible-slot-0 is not running",
                    1,
                );
            }
            ok("")
        } else if command.starts_with("docker rm") {
            fail("Error: No such container", 1)
        } else if command.starts_with("docker run") {
            ok("c0ffee")
        } else {
            ok("hi\n")
        }
    }));
    let job = Job::with_id("job-f", HELLO_SOURCE);
    h.store.insert(&job).await;

    h.executor.execute(&job, 0).await;

    let record = h.store.get("job-f").await.unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.success, Some(true));

    assert_eq!(h.runner.count_matching("javac"), 2);
    assert_eq!(h.runner.count_matching("docker run"), 1);
    assert_eq!(h.pool.usage(0), 2);
    assert_eq!(h.pool.epoch(0), 1);
}

#[tokio::test]
async fn retry_exhaustion_finalizes_with_generic_system_error() {
    let h = harness(ScriptedRunner::new(|command| {
        if command.contains("javac") {
            fail("Error response from daemon: Container crucible-slot-0 is not running", 1)
        } else if command.starts_with("docker rm") {
            ok("")
        } else if command.starts_with("docker run") {
            ok("c0ffee")
        } else {
            ok("")
        }
    }));
    let job = Job::with_id("job-g", HELLO_SOURCE);
    h.store.insert(&job).await;

    h.executor.execute(&job, 0).await;

    let record = h.store.get("job-g").await.unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(
        record.output.as_deref(),
        Some("System Error: execution failed after retry")
    );

    // Two attempts, one reset in between, nothing after the second failure.
    assert_eq!(h.runner.count_matching("javac"), 2);
    assert_eq!(h.runner.count_matching("docker run"), 1);
    assert_eq!(h.pool.usage(0), 2);

    let workspace = h._root.path().join("job-g");
    assert!(!workspace.exists());
}

#[tokio::test]
async fn capacity_triggers_reset_before_compile() {
    let h = harness_with(
        |config| config.pool.max_container_usage = 1,
        ScriptedRunner::docker_happy(),
    );

    let first = Job::with_id("job-h1", HELLO_SOURCE);
    h.store.insert(&first).await;
    h.executor.execute(&first, 0).await;
    assert_eq!(h.pool.usage(0), 1);
    assert_eq!(h.pool.epoch(0), 0);

    let second = Job::with_id("job-h2", HELLO_SOURCE);
    h.store.insert(&second).await;
    h.executor.execute(&second, 0).await;

    // The reset happened before the second job's compile, and its attempt was
    // the only one counted since.
    assert_eq!(h.pool.epoch(0), 1);
    assert_eq!(h.pool.usage(0), 1);

    let commands = h.runner.commands();
    let reset_pos = commands
        .iter()
        .position(|c| c.starts_with("docker run"))
        .unwrap();
    let second_compile_pos = commands
        .iter()
        .position(|c| c.contains("job-h2") && c.contains("javac"))
        .unwrap();
    assert!(reset_pos < second_compile_pos);
}

#[tokio::test]
async fn pool_initialize_fails_when_a_slot_cannot_start() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path());
    let runner = Arc::new(ScriptedRunner::new(|command| {
        if command.starts_with("docker run") {
            fail("docker: Error response from daemon: pull access denied", 125)
        } else {
            ok("")
        }
    }));
    let pool = SandboxPool::new(&config, runner as Arc<dyn CommandRunner>);

    assert!(pool.initialize().await.is_err());
}

#[tokio::test]
async fn dispatcher_finalizes_every_submitted_job() {
    let h = harness(ScriptedRunner::docker_happy());
    let executor = Arc::new(h.executor);

    let dispatcher = JobDispatcher::start(executor, 2, 8);
    let mut ids = Vec::new();
    for i in 0..4 {
        let job = Job::with_id(format!("job-i{}", i), HELLO_SOURCE);
        h.store.insert(&job).await;
        ids.push(job.id.clone());
        dispatcher.submit(job).await.unwrap();
    }
    dispatcher.shutdown().await;

    for id in ids {
        let record = h.store.get(&id).await.unwrap();
        assert_eq!(record.status, JobStatus::Completed);
    }
    // Round-robin across two slots.
    assert_eq!(h.pool.usage(0), 2);
    assert_eq!(h.pool.usage(1), 2);
}
