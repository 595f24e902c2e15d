//! The per-slot execution pipeline
//!
//! `execute` drives one job end-to-end against its assigned slot: capacity
//! check, validation, entry-class resolution, workspace preparation, compile,
//! run, finalization. Every path finalizes the job (no record is left
//! Pending) and the job's workspace is removed on every exit, including
//! retry exhaustion. Only infrastructure failures trigger the
//! reset-and-retry-once path; every user-attributable outcome is terminal.

use std::sync::Arc;
use std::time::Duration;

use crate::config::CrucibleConfig;
use crate::errors::EngineError;
use crate::job::{Job, JobStore};
use crate::notify::ResultNotifier;
use crate::pool::SandboxPool;
use crate::resolver::resolve_entry_class;
use crate::runner::{CommandRunner, ExecutionResult};
use crate::validator::CodeValidator;
use crate::workspace::WorkspaceManager;

const MAX_RETRIES: usize = 1;
const RETRY_EXHAUSTED_MESSAGE: &str = "System Error: execution failed after retry";

pub struct WorkerExecutor {
    pool: Arc<SandboxPool>,
    runner: Arc<dyn CommandRunner>,
    workspace: WorkspaceManager,
    store: Arc<dyn JobStore>,
    notifier: Arc<dyn ResultNotifier>,
    validator: CodeValidator,
    compile_timeout: Duration,
    run_timeout: Duration,
}

impl WorkerExecutor {
    pub fn new(
        config: &CrucibleConfig,
        pool: Arc<SandboxPool>,
        runner: Arc<dyn CommandRunner>,
        store: Arc<dyn JobStore>,
        notifier: Arc<dyn ResultNotifier>,
    ) -> Self {
        Self {
            pool,
            runner,
            workspace: WorkspaceManager::new(config.execution.workspace_root.clone()),
            store,
            notifier,
            validator: CodeValidator::new(),
            compile_timeout: config.compile_timeout(),
            run_timeout: config.run_timeout(),
        }
    }

    /// Runs a job to completion on the given slot. The caller guarantees the
    /// slot is not concurrently in use by another job.
    pub async fn execute(&self, job: &Job, slot_index: usize) {
        self.store.mark_running(&job.id).await;
        self.run_with_retries(job, slot_index).await;
        self.workspace.remove(&job.id).await;
    }

    async fn run_with_retries(&self, job: &Job, slot_index: usize) {
        // Each iteration ends with exactly one usage tick, counted after any
        // recovery reset so a recycled container starts its count from the
        // attempt that triggered the recycle.
        for attempt in 0..=MAX_RETRIES {
            match self.attempt(job, slot_index).await {
                Ok(()) => {
                    self.pool.record_use(slot_index);
                    return;
                }
                Err(e) if !e.is_retryable() => {
                    self.pool.record_use(slot_index);
                    self.finalize(job, false, &e.to_string()).await;
                    return;
                }
                Err(e) => {
                    log::error!(
                        "job {} attempt {} failed on slot {}: {}",
                        job.id,
                        attempt,
                        slot_index,
                        e
                    );
                    if attempt == MAX_RETRIES {
                        self.pool.record_use(slot_index);
                        self.finalize(job, false, RETRY_EXHAUSTED_MESSAGE).await;
                        return;
                    }
                    if let Err(reset_err) = self.pool.reset(slot_index).await {
                        log::error!("slot {} reset failed: {}", slot_index, reset_err);
                    }
                    self.pool.record_use(slot_index);
                }
            }
        }
    }

    /// One pass through the pipeline. `Ok(())` means the job was finalized
    /// (successfully or with a terminal compile/run outcome); an error carries
    /// the classification that decides whether a retry applies.
    async fn attempt(&self, job: &Job, slot_index: usize) -> Result<(), EngineError> {
        if self.pool.at_capacity(slot_index) {
            log::info!("slot {} usage limit reached, recycling container", slot_index);
            self.pool.reset(slot_index).await?;
        }

        self.validator.validate(&job.code)?;
        let class_name = resolve_entry_class(&job.code)?;

        log::info!(
            "executing job {} on slot {} (class {})",
            job.id,
            slot_index,
            class_name
        );
        self.workspace
            .write_source(&job.id, &format!("{}.java", class_name), &job.code)
            .await?;

        let commands = self.pool.commands();

        let compile = self
            .runner
            .run(
                &commands.compile(slot_index, &job.id, &class_name),
                self.compile_timeout,
            )
            .await;
        if is_infrastructure_failure(&compile) {
            return Err(EngineError::Infrastructure(compile.output));
        }
        if !compile.success {
            // Compiler diagnostics are a property of the source; returned
            // verbatim, never retried.
            self.finalize(job, false, &compile.output).await;
            return Ok(());
        }

        let run = self
            .runner
            .run(
                &commands.run(slot_index, &job.id, &class_name),
                self.run_timeout,
            )
            .await;
        if is_infrastructure_failure(&run) {
            return Err(EngineError::Infrastructure(run.output));
        }

        self.finalize(job, run.success, &run.output).await;
        Ok(())
    }

    async fn finalize(&self, job: &Job, success: bool, output: &str) {
        self.store.complete(&job.id, success, output).await;
        self.notifier.notify(&job.id, success, output).await;
    }
}

/// Distinguishes failures of the execution environment from failures of the
/// submission. Exec launch errors surface as runner system errors; a dead or
/// missing container surfaces through the docker CLI's daemon diagnostics and
/// its reserved exit code 125.
fn is_infrastructure_failure(result: &ExecutionResult) -> bool {
    !result.success
        && (result.output.starts_with("System Error:")
            || result.exit_code == 125
            || result.output.contains("Error response from daemon")
            || result.output.contains("No such container"))
}
