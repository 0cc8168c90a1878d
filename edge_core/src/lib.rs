//! Core runtime for the edge inference pipeline engine.
//!
//! Configuration, DLPU time-sharing, video capture, inference, the module
//! plugin runtime, the bus client seam, and the tick-loop orchestrator that
//! ties them together. `edge_modules` builds the detection and frame
//! publisher modules on top of these contracts; `edge_engine` wires a
//! concrete pipeline and runs it.

pub mod bus;
pub mod config;
pub mod dlpu;
pub mod error;
pub mod metadata;
pub mod ml;
pub mod module;
pub mod orchestrator;
pub mod video;

pub use bus::BusClient;
pub use config::Config;
pub use dlpu::{Clock, DlpuCoordinator, ManualClock, SystemClock};
pub use error::{EngineError, EngineResult};
pub use metadata::MetadataFrame;
pub use ml::{Detection, InferenceEngine};
pub use module::{ModuleContext, ModuleOutcome, ModuleRuntime, PipelineModule};
pub use orchestrator::CoreOrchestrator;
pub use video::{CapturedFrame, VideoSource};
