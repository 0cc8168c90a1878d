//! Pipeline module plugin runtime.
//!
//! Modules are registered once, at startup, by an explicit list built in
//! the binary crate (`edge_engine::builtin_modules`) rather than by a
//! linker-section registry or a procedural macro.
//! `ModuleRuntime` sorts them by priority (stable, so same-priority modules
//! keep registration order), runs `init` on each in that order, and ticks
//! each module once per frame in the same order. A module that fails to
//! init is disabled and skipped for the rest of the run; it never aborts
//! the other modules or the pipeline.

use crate::bus::BusClient;
use crate::config::Config;
use crate::dlpu::DlpuCoordinator;
use crate::error::{EngineError, EngineResult};
use crate::ml::InferenceEngine;
use crate::metadata::MetadataFrame;
use crate::video::CapturedFrame;

/// Result of one module's `tick` call.
pub enum ModuleOutcome {
    /// The module ran and contributed to the metadata frame.
    Success,
    /// The module chose not to run this tick (e.g. rate limiting).
    Skip,
    /// The module's preconditions were not met (e.g. model not loaded).
    NotReady,
    /// The module failed. Logged and isolated; the pipeline continues.
    Error(EngineError),
}

/// Everything a module's `tick` needs, borrowed for the duration of one
/// call. Modules must not retain references beyond the call.
pub struct ModuleContext<'a> {
    pub frame: &'a CapturedFrame,
    pub metadata: &'a mut MetadataFrame,
    pub inference: &'a mut dyn InferenceEngine,
    pub bus: &'a dyn BusClient,
    pub config: &'a Config,
    pub dlpu: &'a mut DlpuCoordinator,
}

/// Contract a pipeline module must satisfy.
pub trait PipelineModule: Send {
    fn name(&self) -> &str;
    /// Lower values run first. Ties keep registration order.
    fn priority(&self) -> i32;
    /// Called once at startup with this module's own config section.
    fn init(&mut self, _config: &Config) -> EngineResult<()> {
        Ok(())
    }
    /// Called once per tick, in priority order.
    fn tick(&mut self, ctx: &mut ModuleContext) -> ModuleOutcome;
    /// Called once at shutdown, in reverse priority order.
    fn shutdown(&mut self) -> EngineResult<()> {
        Ok(())
    }
}

struct ModuleEntry {
    module: Box<dyn PipelineModule>,
    enabled: bool,
}

/// Owns the registered modules and drives their lifecycle.
pub struct ModuleRuntime {
    entries: Vec<ModuleEntry>,
}

impl ModuleRuntime {
    /// Build a runtime from an explicit registration list, stable-sorted by
    /// priority.
    pub fn new(modules: Vec<Box<dyn PipelineModule>>) -> Self {
        let mut entries: Vec<ModuleEntry> = modules
            .into_iter()
            .map(|module| ModuleEntry {
                module,
                enabled: true,
            })
            .collect();
        entries.sort_by_key(|entry| entry.module.priority());
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of modules in tick order, for diagnostics and tests.
    pub fn module_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.module.name()).collect()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.entries
            .iter()
            .find(|e| e.module.name() == name)
            .map(|e| e.enabled)
            .unwrap_or(false)
    }

    /// Initialize every module with its own config section. A module that
    /// fails is disabled (skipped for the rest of the run) but does not
    /// prevent the others from initializing.
    pub fn init_all(&mut self, config: &Config) {
        for entry in &mut self.entries {
            let section = config.section(entry.module.name());
            match entry.module.init(&section) {
                Ok(()) => {
                    tracing::info!(module = entry.module.name(), "module initialized");
                }
                Err(err) => {
                    tracing::error!(module = entry.module.name(), error = %err, "module init failed, disabling");
                    entry.enabled = false;
                }
            }
        }
    }

    /// Tick every enabled module once, in priority order, threading the
    /// same context through each call in sequence.
    pub fn tick_all(&mut self, ctx: &mut ModuleContext) -> Vec<(String, ModuleOutcome)> {
        let mut outcomes = Vec::with_capacity(self.entries.len());
        for entry in &mut self.entries {
            if !entry.enabled {
                outcomes.push((entry.module.name().to_string(), ModuleOutcome::Skip));
                continue;
            }
            let outcome = entry.module.tick(ctx);
            if let ModuleOutcome::Error(ref err) = outcome {
                tracing::warn!(module = entry.module.name(), error = %err, "module tick failed");
            }
            outcomes.push((entry.module.name().to_string(), outcome));
        }
        outcomes
    }

    /// Shut down every module that is still enabled, in reverse priority
    /// order. A module's shutdown failure is logged but does not stop the
    /// remaining modules from shutting down.
    pub fn shutdown_all(&mut self) {
        for entry in self.entries.iter_mut().rev() {
            if !entry.enabled {
                continue;
            }
            if let Err(err) = entry.module.shutdown() {
                tracing::error!(module = entry.module.name(), error = %err, "module shutdown failed");
            }
        }
    }
}
