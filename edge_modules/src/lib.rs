//! Built-in pipeline modules.
//!
//! `detection` runs object detection (when a model is available), scene
//! hashing, and motion scoring. `frame_publisher` answers on-demand frame
//! requests with a base64-encoded JPEG. Both implement
//! `edge_core::module::PipelineModule` and are wired up by
//! `edge_engine::builtin_modules`.

pub mod detection;
pub mod frame_publisher;

pub use detection::DetectionModule;
pub use frame_publisher::FramePublisherModule;
