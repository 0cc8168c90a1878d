//! Metadata frame: the per-tick record published to the `metadata` topic.
//!
//! Each pipeline module contributes its findings under its own key in
//! `custom_data`, keeping modules from overwriting each other's output.
//! `object_count` is maintained as a derived mirror of `detections.len()`
//! rather than trusted as independent caller input, since the original
//! C implementation tracked it as a separately-incremented counter
//! alongside a manually `realloc`'d detection array; `push_detection`
//! preserves that capacity-doubling growth shape in safe Rust.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ml::Detection;

/// One published metadata record, serialized with the wire field names:
/// `{camera_id, timestamp_us, sequence, motion_score, object_count,
/// scene_hash, detections, modules}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataFrame {
    pub camera_id: String,
    #[serde(rename = "sequence")]
    pub sequence_number: u64,
    pub timestamp_us: u64,
    pub frame_width: u32,
    pub frame_height: u32,
    pub scene_hash: u32,
    pub motion_score: f64,
    pub detections: Vec<Detection>,
    pub object_count: usize,
    #[serde(default, rename = "modules")]
    pub custom_data: Map<String, Value>,
}

impl MetadataFrame {
    pub fn new(
        camera_id: impl Into<String>,
        sequence_number: u64,
        timestamp_us: u64,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        Self {
            camera_id: camera_id.into(),
            sequence_number,
            timestamp_us,
            frame_width,
            frame_height,
            scene_hash: 0,
            motion_score: 0.0,
            detections: Vec::new(),
            object_count: 0,
            custom_data: Map::new(),
        }
    }

    /// Replace the full detection set for this frame in one call.
    pub fn set_detections(&mut self, detections: Vec<Detection>) {
        self.object_count = detections.len();
        self.detections = detections;
    }

    /// Append one detection, doubling the backing capacity when full
    /// rather than growing by an unspecified amount on every push.
    pub fn push_detection(&mut self, detection: Detection) {
        if self.detections.len() == self.detections.capacity() {
            let additional = self.detections.capacity().max(4);
            self.detections.reserve(additional);
        }
        self.detections.push(detection);
        self.object_count = self.detections.len();
    }

    /// Record one module's contribution under its own key. Later calls for
    /// the same module name overwrite that module's prior entry only.
    pub fn set_custom_data(&mut self, module: &str, value: Value) {
        self.custom_data.insert(module.to_string(), value);
    }
}
