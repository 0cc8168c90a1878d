//! Inference engine: model loading and detection-tensor parsing.
//!
//! The real accelerator runtime lives outside this crate; this module
//! defines the [`InferenceEngine`] contract plus [`SimulatedInferenceEngine`],
//! a deterministic backend the detection module and the test suite drive
//! instead. The tensor parsing in [`parse_output_tensor`] is independent of
//! which backend supplies the raw tensor.

use std::collections::VecDeque;
use std::path::Path;
use std::time::Instant;

use crate::error::{EngineError, EngineResult};

/// Closed detection vocabulary size.
pub const NUM_CLASSES: usize = 80;
/// Candidate rows per inference call.
pub const NUM_ROWS: usize = 25_200;
/// Columns per row: (x, y, w, h, objectness, 80 class scores).
pub const ROW_LEN: usize = 5 + NUM_CLASSES;
/// Model input dimension, used to normalize box coordinates to `[0,1]`.
pub const INPUT_DIM: f32 = 640.0;
/// Maximum detections kept per frame; extra candidates are discarded in
/// tensor row order, without re-ranking.
pub const MAX_DETECTIONS: usize = 100;

/// One detected object, normalized to `[0,1]` against frame dimensions.
/// Immutable after construction.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Result of one `run()` call.
#[derive(Debug, Clone, Default)]
pub struct LarodResult {
    pub detections: Vec<Detection>,
    pub inference_time_ms: f64,
}

/// Contract an accelerator-backed inference engine must satisfy. Owned
/// exclusively by the orchestrator; modules borrow it and must not destroy,
/// reconnect, or reconfigure it.
pub trait InferenceEngine: Send {
    /// Load the model for one inference call, failing with a typed error on
    /// any runtime failure. Non-fatal to the orchestrator: on failure, the
    /// detection module continues in CPU-only mode.
    fn load(&mut self, model_path: &str, confidence_threshold: f32) -> EngineResult<()>;
    fn is_loaded(&self) -> bool;
    /// Run one inference over a raw input buffer.
    fn run(&mut self, buffer: &[u8]) -> EngineResult<LarodResult>;
}

/// Parse a flattened `NUM_ROWS x ROW_LEN` output tensor into detections:
/// objectness gate, argmax class score with lowest-id-wins tie-break,
/// combined-confidence gate, box coordinates normalized by the input
/// dimension, capped at [`MAX_DETECTIONS`] with no re-ranking of discarded
/// candidates.
pub fn parse_output_tensor(tensor: &[f32], confidence_threshold: f32) -> Vec<Detection> {
    let mut detections = Vec::with_capacity(32);

    for row in 0..NUM_ROWS {
        if detections.len() >= MAX_DETECTIONS {
            break;
        }
        let base = row * ROW_LEN;
        if base + ROW_LEN > tensor.len() {
            break;
        }

        let objectness = tensor[base + 4];
        if objectness < confidence_threshold {
            continue;
        }

        let mut best_class = 0usize;
        let mut best_score = tensor[base + 5];
        for class in 1..NUM_CLASSES {
            let score = tensor[base + 5 + class];
            if score > best_score {
                best_score = score;
                best_class = class;
            }
        }

        let confidence = objectness * best_score;
        if confidence < confidence_threshold {
            continue;
        }

        detections.push(Detection {
            class_id: best_class as u32,
            confidence,
            x: tensor[base] / INPUT_DIM,
            y: tensor[base + 1] / INPUT_DIM,
            width: tensor[base + 2] / INPUT_DIM,
            height: tensor[base + 3] / INPUT_DIM,
        });
    }

    detections
}

/// A scripted or generated source of raw output tensors for
/// [`SimulatedInferenceEngine`].
pub enum InferenceFeed {
    /// Replay these exact tensors in order.
    Scripted(VecDeque<Vec<f32>>),
    /// Always produce a tensor with no candidate above threshold.
    Empty,
}

/// Deterministic inference backend standing in for the accelerator runtime.
pub struct SimulatedInferenceEngine {
    loaded: bool,
    confidence_threshold: f32,
    feed: InferenceFeed,
}

impl SimulatedInferenceEngine {
    pub fn new() -> Self {
        Self {
            loaded: false,
            confidence_threshold: 0.25,
            feed: InferenceFeed::Empty,
        }
    }

    pub fn with_feed(feed: InferenceFeed) -> Self {
        Self {
            feed,
            ..Self::new()
        }
    }
}

impl Default for SimulatedInferenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceEngine for SimulatedInferenceEngine {
    fn load(&mut self, model_path: &str, confidence_threshold: f32) -> EngineResult<()> {
        if model_path.is_empty() {
            return Err(EngineError::inference("model path is empty"));
        }
        if !Path::new(model_path).exists() {
            return Err(EngineError::inference(format!(
                "model file not found: {}",
                model_path
            )));
        }
        self.confidence_threshold = confidence_threshold;
        self.loaded = true;
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn run(&mut self, _buffer: &[u8]) -> EngineResult<LarodResult> {
        if !self.loaded {
            return Err(EngineError::inference("engine not loaded"));
        }
        let start = Instant::now();
        let tensor = match &mut self.feed {
            InferenceFeed::Scripted(tensors) => tensors
                .pop_front()
                .ok_or_else(|| EngineError::inference("no scripted tensor remaining"))?,
            InferenceFeed::Empty => vec![0.0f32; NUM_ROWS * ROW_LEN],
        };
        let detections = parse_output_tensor(&tensor, self.confidence_threshold);
        Ok(LarodResult {
            detections,
            inference_time_ms: start.elapsed().as_secs_f64() * 1000.0,
        })
    }
}
