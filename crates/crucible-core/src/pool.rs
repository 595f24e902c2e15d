//! Sandbox pool management
//!
//! Owns the fixed set of persistent sandbox slots. Each slot is backed by one
//! named container whose name is a pure function of the slot index, so reset
//! only needs the index plus the current image configuration. Long-lived
//! containers accumulate state drift, hence the per-slot usage counter and
//! capacity-triggered recycling driven by the worker.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CrucibleConfig;
use crate::docker::ContainerCommandTable;
use crate::errors::EngineError;
use crate::runner::CommandRunner;

struct Slot {
    name: String,
    usage: AtomicU32,
    epoch: AtomicU64,
}

pub struct SandboxPool {
    slots: Vec<Slot>,
    commands: ContainerCommandTable,
    runner: Arc<dyn CommandRunner>,
    create_timeout: Duration,
    remove_timeout: Duration,
    max_usage: u32,
}

impl SandboxPool {
    pub fn new(config: &CrucibleConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let commands = ContainerCommandTable::new(
            config.pool.image.clone(),
            config.pool.container_prefix.clone(),
            config.pool.memory_limit.clone(),
            config.pool.cpus.clone(),
            config.pool.pids_limit,
            &config.execution.workspace_root,
        );
        let slots = (0..config.pool.worker_count)
            .map(|index| Slot {
                name: commands.container_name(index),
                usage: AtomicU32::new(0),
                epoch: AtomicU64::new(0),
            })
            .collect();
        Self {
            slots,
            commands,
            runner,
            create_timeout: config.container_create_timeout(),
            remove_timeout: config.container_remove_timeout(),
            max_usage: config.pool.max_container_usage,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.slots.len()
    }

    pub fn commands(&self) -> &ContainerCommandTable {
        &self.commands
    }

    pub fn usage(&self, index: usize) -> u32 {
        self.slots
            .get(index)
            .map(|slot| slot.usage.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn epoch(&self, index: usize) -> u64 {
        self.slots
            .get(index)
            .map(|slot| slot.epoch.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Counts one finished attempt against the slot.
    pub fn record_use(&self, index: usize) {
        if let Some(slot) = self.slots.get(index) {
            slot.usage.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn at_capacity(&self, index: usize) -> bool {
        self.usage(index) >= self.max_usage
    }

    /// Destroys any stale containers with the pool's naming prefix and starts
    /// one fresh container per slot. A slot that fails to start is fatal: the
    /// pool cannot serve with a missing slot.
    pub async fn initialize(&self) -> Result<(), EngineError> {
        log::info!(
            "initializing sandbox pool: {} slots, max usage {}",
            self.slots.len(),
            self.max_usage
        );
        for index in 0..self.slots.len() {
            self.create_slot(index).await?;
        }
        Ok(())
    }

    /// Force-removes the slot's backing container and recreates it; the usage
    /// counter returns to zero and the reset epoch advances.
    pub async fn reset(&self, index: usize) -> Result<(), EngineError> {
        self.create_slot(index).await?;
        if let Some(slot) = self.slots.get(index) {
            slot.epoch.fetch_add(1, Ordering::SeqCst);
            log::info!("slot {} reset (container {})", index, slot.name);
        }
        Ok(())
    }

    /// Best-effort removal of every backing container at shutdown.
    pub async fn teardown(&self) {
        for (index, slot) in self.slots.iter().enumerate() {
            let result = self
                .runner
                .run(&self.commands.remove(index), self.remove_timeout)
                .await;
            if !result.success {
                log::warn!("failed to remove container {}: {}", slot.name, result.output);
            }
        }
        log::info!("sandbox pool torn down");
    }

    async fn create_slot(&self, index: usize) -> Result<(), EngineError> {
        let slot = self
            .slots
            .get(index)
            .ok_or_else(|| EngineError::Infrastructure(format!("invalid slot index {}", index)))?;

        // Removal of a missing container is expected to fail; ignored.
        self.runner
            .run(&self.commands.remove(index), self.remove_timeout)
            .await;

        let result = self
            .runner
            .run(&self.commands.create(index), self.create_timeout)
            .await;
        if !result.success {
            return Err(EngineError::ContainerInit(result.output));
        }

        slot.usage.store(0, Ordering::SeqCst);
        log::info!("container {} created", slot.name);
        Ok(())
    }
}
