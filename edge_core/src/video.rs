//! Video source: zero-copy capture and pooled buffer release.
//!
//! Format is fixed at configuration time (640x640 planar luma+chroma).
//! `capture_frame` either hands back a scoped buffer
//! guard or signals that the driver was momentarily unready — an expected,
//! counted condition, not a logged error. The guard's `Drop` returns the
//! buffer to the source's pool on every exit path, so a module error or an
//! early return can never leak a frame.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::EngineResult;

/// Pixel layout of captured frames. The engine only ever configures one
/// format; this exists so `FrameData` can carry a format tag the way the
/// spec's `FrameData` struct does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Planar luma + chroma (e.g. I420-style), the engine's fixed capture
    /// format.
    YuvPlanar420,
}

/// Outcome of one `capture_frame` call.
pub enum CaptureOutcome {
    /// A frame was captured; release it exactly once via
    /// [`VideoSource::release_frame`] (or let it drop).
    Captured(CapturedFrame),
    /// The underlying driver was momentarily unready. Expected and counted;
    /// does not consume a sequence number.
    Dropped,
}

/// A scoped handle to a captured frame buffer. Borrowed by modules for the
/// duration of one tick; returns its backing buffer to the source's pool
/// when dropped, so release happens on every exit path (success, module
/// error, publish error, or shutdown) without the caller having to
/// remember to call anything.
pub struct CapturedFrame {
    data: Option<Vec<u8>>,
    pool: Arc<Mutex<VecDeque<Vec<u8>>>>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub frame_id: u64,
    pub timestamp_us: u64,
}

impl CapturedFrame {
    /// Raw pixel bytes for this frame.
    pub fn bytes(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }
}

impl Drop for CapturedFrame {
    fn drop(&mut self) {
        if let Some(buf) = self.data.take() {
            if let Ok(mut pool) = self.pool.lock() {
                pool.push_back(buf);
            }
        }
    }
}

/// Contract a video capture backend must satisfy.
pub trait VideoSource: Send {
    fn init(&mut self) -> EngineResult<()>;
    fn shutdown(&mut self) -> EngineResult<()>;
    /// Acquire one frame buffer, or signal that none was available.
    fn capture_frame(&mut self) -> EngineResult<CaptureOutcome>;
    /// Return a previously captured buffer to the pool. Equivalent to
    /// dropping the handle; provided for callers that want the release to
    /// read explicitly at the call site.
    fn release_frame(&mut self, frame: CapturedFrame) {
        drop(frame);
    }
    fn frames_captured(&self) -> u64;
    fn frames_dropped(&self) -> u64;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

/// Source of synthetic frame bytes for [`SimulationVideoSource`]. Tests use
/// [`FrameFeed::Scripted`] to assert exact per-frame byte patterns (e.g. a
/// run of identical gray frames, or a black frame followed by a white one);
/// production/demo runs use [`FrameFeed::Random`].
pub enum FrameFeed {
    /// Replay these exact buffers in order, then signal dropped thereafter.
    Scripted(VecDeque<Vec<u8>>),
    /// Generate pseudo-random bytes of the configured frame size forever.
    Random,
}

/// Always-available capture backend generating synthetic frames. This is
/// the only backend this repo can exercise without camera hardware or a
/// vendor driver SDK; the real driver is represented only by the
/// [`VideoSource`] contract above.
pub struct SimulationVideoSource {
    width: u32,
    height: u32,
    pool: Arc<Mutex<VecDeque<Vec<u8>>>>,
    feed: FrameFeed,
    next_frame_id: u64,
    frames_captured: u64,
    frames_dropped: u64,
}

impl SimulationVideoSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pool: Arc::new(Mutex::new(VecDeque::new())),
            feed: FrameFeed::Random,
            next_frame_id: 0,
            frames_captured: 0,
            frames_dropped: 0,
        }
    }

    /// Build a source that replays an exact, caller-supplied sequence of
    /// frame buffers before signaling dropped frames.
    pub fn scripted(width: u32, height: u32, frames: Vec<Vec<u8>>) -> Self {
        Self {
            feed: FrameFeed::Scripted(frames.into()),
            ..Self::new(width, height)
        }
    }

    fn frame_size(&self) -> usize {
        // Planar luma + half-resolution chroma pair, I420-style: w*h*3/2.
        (self.width as usize * self.height as usize * 3) / 2
    }

    fn next_buffer(&mut self) -> Option<Vec<u8>> {
        // Reuse a pooled allocation when one is available, mirroring a real
        // driver's ring buffer.
        let mut buf = self.pool.lock().ok().and_then(|mut p| p.pop_front());
        let size = self.frame_size();

        match &mut self.feed {
            FrameFeed::Scripted(frames) => {
                let bytes = frames.pop_front()?;
                Some(bytes)
            }
            FrameFeed::Random => {
                let mut buf = buf.take().unwrap_or_default();
                buf.resize(size, 0);
                for byte in buf.iter_mut() {
                    *byte = rand::random();
                }
                Some(buf)
            }
        }
    }
}

impl VideoSource for SimulationVideoSource {
    fn init(&mut self) -> EngineResult<()> {
        Ok(())
    }

    fn shutdown(&mut self) -> EngineResult<()> {
        Ok(())
    }

    fn capture_frame(&mut self) -> EngineResult<CaptureOutcome> {
        let timestamp_us = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64;

        match self.next_buffer() {
            Some(data) => {
                let frame_id = self.next_frame_id;
                self.next_frame_id += 1;
                self.frames_captured += 1;
                Ok(CaptureOutcome::Captured(CapturedFrame {
                    data: Some(data),
                    pool: self.pool.clone(),
                    width: self.width,
                    height: self.height,
                    format: PixelFormat::YuvPlanar420,
                    frame_id,
                    timestamp_us,
                }))
            }
            None => {
                self.frames_dropped += 1;
                Ok(CaptureOutcome::Dropped)
            }
        }
    }

    fn frames_captured(&self) -> u64 {
        self.frames_captured
    }

    fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}
