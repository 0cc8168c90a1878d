//! Core orchestrator: the per-tick capture -> modules -> publish loop.
//!
//! One iteration captures a frame, threads it through every enabled module
//! in priority order, then publishes the resulting metadata frame. A
//! dropped capture short-circuits the tick without consuming a sequence
//! number or touching the module chain. Shutdown runs module teardown in
//! reverse priority order, then the video source's own shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::bus::{BusClient, TOPIC_METADATA};
use crate::config::Config;
use crate::dlpu::{Clock, DlpuCoordinator};
use crate::error::EngineResult;
use crate::ml::InferenceEngine;
use crate::metadata::MetadataFrame;
use crate::module::{ModuleContext, ModuleRuntime};
use crate::video::{CaptureOutcome, VideoSource};

/// Outcome of one orchestrator tick.
pub enum TickOutcome {
    Published(MetadataFrame),
    Dropped,
}

/// Owns every long-lived resource the pipeline needs and drives its
/// lifecycle: init, repeated ticks, shutdown.
pub struct CoreOrchestrator {
    config: Config,
    camera_id: String,
    video: Box<dyn VideoSource>,
    inference: Box<dyn InferenceEngine>,
    dlpu: DlpuCoordinator,
    modules: ModuleRuntime,
    bus: Box<dyn BusClient>,
    clock: Box<dyn Clock>,
    tick_interval_ms: u64,
    sequence_number: u64,
    frames_published: u64,
    frames_dropped: u64,
}

impl CoreOrchestrator {
    pub fn new(
        config: Config,
        video: Box<dyn VideoSource>,
        inference: Box<dyn InferenceEngine>,
        dlpu: DlpuCoordinator,
        modules: ModuleRuntime,
        bus: Box<dyn BusClient>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let target_fps = config.get_int("target_fps", 10).max(1) as u64;
        let tick_interval_ms = 1000 / target_fps;
        let camera_id = config.get_string("camera_id", "axis-camera-001");
        Self {
            config,
            camera_id,
            video,
            inference,
            dlpu,
            modules,
            bus,
            clock,
            tick_interval_ms,
            sequence_number: 0,
            frames_published: 0,
            frames_dropped: 0,
        }
    }

    /// Initialize the video source and every registered module.
    pub fn init(&mut self) -> EngineResult<()> {
        self.video.init()?;
        self.modules.init_all(&self.config);
        Ok(())
    }

    /// Run one capture/modules/publish cycle. The DLPU slot is held for the
    /// entire tick, whether or not the capture succeeds, so every module
    /// sharing the accelerator observes the same cooperative schedule.
    pub fn tick_once(&mut self) -> EngineResult<TickOutcome> {
        self.dlpu.wait_for_slot();
        let result = self.tick_inner();
        self.dlpu.release_slot();
        result
    }

    fn tick_inner(&mut self) -> EngineResult<TickOutcome> {
        match self.video.capture_frame()? {
            CaptureOutcome::Dropped => {
                self.frames_dropped += 1;
                Ok(TickOutcome::Dropped)
            }
            CaptureOutcome::Captured(frame) => {
                let mut metadata = MetadataFrame::new(
                    self.camera_id.clone(),
                    self.sequence_number,
                    frame.timestamp_us,
                    frame.width,
                    frame.height,
                );
                {
                    let mut ctx = ModuleContext {
                        frame: &frame,
                        metadata: &mut metadata,
                        inference: self.inference.as_mut(),
                        bus: self.bus.as_ref(),
                        config: &self.config,
                        dlpu: &mut self.dlpu,
                    };
                    self.modules.tick_all(&mut ctx);
                }

                self.sequence_number += 1;
                self.frames_published += 1;

                let payload = serde_json::to_vec(&metadata)?;
                self.bus.publish(TOPIC_METADATA, &payload)?;

                drop(frame);
                Ok(TickOutcome::Published(metadata))
            }
        }
    }

    /// Run until `shutdown` is set, pacing ticks to the configured
    /// `target_fps`, then tear the pipeline down.
    pub fn run(&mut self, shutdown: Arc<AtomicBool>) -> EngineResult<()> {
        while !shutdown.load(Ordering::Relaxed) {
            if let Err(err) = self.tick_once() {
                tracing::error!(error = %err, "tick failed");
            }
            self.clock.sleep(self.tick_interval_ms);
        }
        self.shutdown()
    }

    pub fn shutdown(&mut self) -> EngineResult<()> {
        self.modules.shutdown_all();
        self.video.shutdown()
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn frames_published(&self) -> u64 {
        self.frames_published
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }
}
