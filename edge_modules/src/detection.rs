//! Detection module: object detection, scene hash, and motion score.
//!
//! Runs first in the pipeline (lowest priority value) so later modules see
//! its output in `custom_data["detection"]`. A missing or unloadable model
//! is not fatal: the module keeps computing `scene_hash` and `motion_score`
//! every tick and simply reports `ml_enabled: false` instead of failing.

use edge_core::error::EngineError;
use edge_core::module::{ModuleContext, ModuleOutcome, PipelineModule};
use edge_core::config::Config;

/// djb2's traditional seed, used as the scene hash's initial accumulator.
const DJB2_SEED: u64 = 5381;
/// Hash every thousandth byte, rather than the full frame, since the hash
/// only needs to be stable across ticks, not exact.
const SCENE_HASH_STRIDE: usize = 1000;
/// Sample every hundredth byte when scoring motion between frames.
const MOTION_SAMPLE_STRIDE: usize = 100;
/// A sampled byte counts as motion when its delta from the stored frame
/// exceeds this magnitude.
const MOTION_DELTA_THRESHOLD: i32 = 30;

pub struct DetectionModule {
    model_path: String,
    confidence_threshold: f32,
    previous_sample: Option<Vec<u8>>,
}

impl DetectionModule {
    pub fn new() -> Self {
        Self {
            model_path: String::new(),
            confidence_threshold: 0.25,
            previous_sample: None,
        }
    }

    /// Fraction of sampled bytes whose delta from the stored frame exceeds
    /// [`MOTION_DELTA_THRESHOLD`]. Zero on the first frame (nothing stored
    /// yet to compare against) and zero whenever no bytes are sampled.
    fn motion_score(&mut self, bytes: &[u8]) -> f64 {
        let sample: Vec<u8> = bytes
            .iter()
            .step_by(MOTION_SAMPLE_STRIDE)
            .copied()
            .collect();

        let score = match &self.previous_sample {
            None => 0.0,
            Some(previous) => {
                let samples = previous.len().min(sample.len());
                if samples == 0 {
                    0.0
                } else {
                    let hits = previous[..samples]
                        .iter()
                        .zip(sample[..samples].iter())
                        .filter(|(a, b)| ((**a as i32) - (**b as i32)).abs() > MOTION_DELTA_THRESHOLD)
                        .count();
                    hits as f64 / samples as f64
                }
            }
        };

        self.previous_sample = Some(sample);
        score
    }
}

impl Default for DetectionModule {
    fn default() -> Self {
        Self::new()
    }
}

fn scene_hash(bytes: &[u8]) -> u64 {
    let mut hash = DJB2_SEED;
    for &byte in bytes.iter().step_by(SCENE_HASH_STRIDE) {
        hash = hash.wrapping_mul(33).wrapping_add(byte as u64);
    }
    hash
}

impl PipelineModule for DetectionModule {
    fn name(&self) -> &str {
        "detection"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn init(&mut self, config: &Config) -> Result<(), EngineError> {
        self.model_path = config.get_string("model_path", "");
        self.confidence_threshold = config.get_float("confidence_threshold", 0.25) as f32;
        Ok(())
    }

    fn tick(&mut self, ctx: &mut ModuleContext) -> ModuleOutcome {
        if !ctx.inference.is_loaded() {
            if let Err(err) = ctx.inference.load(&self.model_path, self.confidence_threshold) {
                tracing::debug!(error = %err, "detection model unavailable, running CPU-only");
            }
        }

        let bytes = ctx.frame.bytes();
        ctx.metadata.scene_hash = scene_hash(bytes) as u32;
        ctx.metadata.motion_score = self.motion_score(bytes);
        let ml_enabled = ctx.inference.is_loaded();

        let mut inference_time_ms = 0.0;
        if ml_enabled {
            match ctx.inference.run(bytes) {
                Ok(result) => {
                    inference_time_ms = result.inference_time_ms;
                    ctx.metadata.set_detections(result.detections);
                }
                Err(err) => {
                    ctx.metadata.set_custom_data(
                        self.name(),
                        serde_json::json!({
                            "inference_time_ms": 0.0,
                            "num_detections": 0,
                            "confidence_threshold": self.confidence_threshold,
                            "ml_enabled": false,
                        }),
                    );
                    return ModuleOutcome::Error(err);
                }
            }
        }

        ctx.metadata.set_custom_data(
            self.name(),
            serde_json::json!({
                "inference_time_ms": inference_time_ms,
                "num_detections": ctx.metadata.object_count,
                "confidence_threshold": self.confidence_threshold,
                "ml_enabled": ml_enabled,
            }),
        );

        ModuleOutcome::Success
    }
}
