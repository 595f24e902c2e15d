//! Container command construction
//!
//! All container control goes through the shell, so the exact `docker` CLI
//! syntax is concentrated here and the orchestration code only ever sees
//! opaque command lines. Containers are started detached with networking
//! disabled, every capability dropped, process-count/memory/CPU ceilings, and
//! the host workspace root bind-mounted at a fixed internal path; the main
//! process idles so repeated `exec` calls amortize the start cost.

use std::path::Path;

/// Internal mount point for the host workspace root.
pub const CONTAINER_WORKDIR: &str = "/app";

#[derive(Debug, Clone)]
pub struct ContainerCommandTable {
    image: String,
    prefix: String,
    memory_limit: String,
    cpus: String,
    pids_limit: u32,
    mount_root: String,
}

impl ContainerCommandTable {
    pub fn new(
        image: impl Into<String>,
        prefix: impl Into<String>,
        memory_limit: impl Into<String>,
        cpus: impl Into<String>,
        pids_limit: u32,
        mount_root: &Path,
    ) -> Self {
        Self {
            image: image.into(),
            prefix: prefix.into(),
            memory_limit: memory_limit.into(),
            cpus: cpus.into(),
            pids_limit,
            mount_root: mount_root.to_string_lossy().into_owned(),
        }
    }

    /// Invariant: a slot index always maps to exactly this name.
    pub fn container_name(&self, index: usize) -> String {
        format!("{}{}", self.prefix, index)
    }

    pub fn create(&self, index: usize) -> String {
        format!(
            "docker run -d --name {name} \
             --network none \
             --pids-limit {pids} \
             --cap-drop ALL \
             --memory {memory} \
             --cpus {cpus} \
             -v {mount}:{workdir} \
             {image} tail -f /dev/null",
            name = self.container_name(index),
            pids = self.pids_limit,
            memory = self.memory_limit,
            cpus = self.cpus,
            mount = self.mount_root,
            workdir = CONTAINER_WORKDIR,
            image = self.image,
        )
    }

    pub fn remove(&self, index: usize) -> String {
        format!("docker rm -f {}", self.container_name(index))
    }

    pub fn compile(&self, index: usize, job_id: &str, class_name: &str) -> String {
        format!(
            "docker exec -w {workdir}/{job} {name} javac -encoding UTF-8 {class}.java",
            workdir = CONTAINER_WORKDIR,
            job = job_id,
            name = self.container_name(index),
            class = class_name,
        )
    }

    pub fn run(&self, index: usize, job_id: &str, class_name: &str) -> String {
        format!(
            "docker exec -w {workdir}/{job} {name} java -Dfile.encoding=UTF-8 {class}",
            workdir = CONTAINER_WORKDIR,
            job = job_id,
            name = self.container_name(index),
            class = class_name,
        )
    }
}
