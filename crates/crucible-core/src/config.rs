//! Configuration types for the compile service
//!
//! Follows a layered approach: every field has a sensible default so a minimal
//! (or absent) YAML file yields a working local setup, while production
//! deployments override the pool size, resource ceilings and callback target.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CrucibleConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP front-end binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Optional URL that receives `{jobId, success, output}` after
    /// finalization. Absent means callbacks are disabled.
    #[serde(default)]
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of sandbox slots, each served by its own worker task.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Executions a container may serve before it is recycled.
    #[serde(default = "default_max_container_usage")]
    pub max_container_usage: u32,
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default = "default_container_prefix")]
    pub container_prefix: String,
    #[serde(default = "default_memory_limit")]
    pub memory_limit: String,
    #[serde(default = "default_cpus")]
    pub cpus: String,
    #[serde(default = "default_pids_limit")]
    pub pids_limit: u32,
    /// Depth of each slot's job queue before submission backpressures.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Host directory bind-mounted into every container; one subdirectory per
    /// active job.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
    #[serde(default = "default_compile_timeout_ms")]
    pub compile_timeout_ms: u64,
    #[serde(default = "default_run_timeout_ms")]
    pub run_timeout_ms: u64,
    #[serde(default = "default_container_create_timeout_ms")]
    pub container_create_timeout_ms: u64,
    #[serde(default = "default_container_remove_timeout_ms")]
    pub container_remove_timeout_ms: u64,
    /// Cap on captured command output, in characters.
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
    /// Cap on submitted source size, in characters.
    #[serde(default = "default_max_code_chars")]
    pub max_code_chars: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            callback_url: None,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            max_container_usage: default_max_container_usage(),
            image: default_image(),
            container_prefix: default_container_prefix(),
            memory_limit: default_memory_limit(),
            cpus: default_cpus(),
            pids_limit: default_pids_limit(),
            queue_depth: default_queue_depth(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            compile_timeout_ms: default_compile_timeout_ms(),
            run_timeout_ms: default_run_timeout_ms(),
            container_create_timeout_ms: default_container_create_timeout_ms(),
            container_remove_timeout_ms: default_container_remove_timeout_ms(),
            max_output_chars: default_max_output_chars(),
            max_code_chars: default_max_code_chars(),
        }
    }
}

impl CrucibleConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: CrucibleConfig = serde_yaml::from_str(&contents).map_err(|e| {
            EngineError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file when a path is given, otherwise use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, EngineError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.pool.worker_count == 0 {
            return Err(EngineError::Config(
                "pool.worker_count must be at least 1".to_string(),
            ));
        }
        if self.pool.max_container_usage == 0 {
            return Err(EngineError::Config(
                "pool.max_container_usage must be at least 1".to_string(),
            ));
        }
        if self.execution.compile_timeout_ms == 0 || self.execution.run_timeout_ms == 0 {
            return Err(EngineError::Config(
                "execution timeouts must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_millis(self.execution.compile_timeout_ms)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.execution.run_timeout_ms)
    }

    pub fn container_create_timeout(&self) -> Duration {
        Duration::from_millis(self.execution.container_create_timeout_ms)
    }

    pub fn container_remove_timeout(&self) -> Duration {
        Duration::from_millis(self.execution.container_remove_timeout_ms)
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_worker_count() -> usize {
    2
}

fn default_max_container_usage() -> u32 {
    100
}

fn default_image() -> String {
    "eclipse-temurin:17-jdk".to_string()
}

fn default_container_prefix() -> String {
    "crucible-slot-".to_string()
}

fn default_memory_limit() -> String {
    "512m".to_string()
}

fn default_cpus() -> String {
    "0.8".to_string()
}

fn default_pids_limit() -> u32 {
    100
}

fn default_queue_depth() -> usize {
    64
}

fn default_workspace_root() -> PathBuf {
    if cfg!(target_family = "windows") {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("crucible_jobs")
    } else {
        PathBuf::from("/tmp/crucible")
    }
}

fn default_compile_timeout_ms() -> u64 {
    10_000
}

fn default_run_timeout_ms() -> u64 {
    5_000
}

fn default_container_create_timeout_ms() -> u64 {
    10_000
}

fn default_container_remove_timeout_ms() -> u64 {
    5_000
}

fn default_max_output_chars() -> usize {
    10_000
}

fn default_max_code_chars() -> usize {
    10_000
}
