//! Frame publisher module: on-demand JPEG+base64 frame delivery.
//!
//! Unlike the detection module, this one does nothing unless a
//! `frame_request` is pending on the bus. When a request arrives and the
//! configured rate limit has elapsed since the last publish, it encodes the
//! current tick's frame (its luma plane, since the fixed capture format is
//! planar YUV 4:2:0) as JPEG, base64-encodes it, and publishes the result
//! to the `frame` topic.

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::GrayImage;

use edge_core::bus::TOPIC_FRAME;
use edge_core::config::Config;
use edge_core::error::EngineError;
use edge_core::module::{ModuleContext, ModuleOutcome, PipelineModule};

pub struct FramePublisherModule {
    enabled: bool,
    camera_id: String,
    rate_limit_seconds: f64,
    jpeg_quality: u8,
    last_published_at_us: Option<u64>,
    frames_sent: u64,
    requests_received: u64,
    requests_throttled: u64,
}

impl FramePublisherModule {
    pub fn new() -> Self {
        Self {
            enabled: true,
            camera_id: String::new(),
            rate_limit_seconds: 60.0,
            jpeg_quality: 85,
            last_published_at_us: None,
            frames_sent: 0,
            requests_received: 0,
            requests_throttled: 0,
        }
    }

    pub fn rate_limit_seconds(&self) -> f64 {
        self.rate_limit_seconds
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }
}

impl Default for FramePublisherModule {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineModule for FramePublisherModule {
    fn name(&self) -> &str {
        "frame_publisher"
    }

    fn priority(&self) -> i32 {
        40
    }

    fn init(&mut self, config: &Config) -> Result<(), EngineError> {
        self.enabled = config.get_bool("enabled", true);
        self.camera_id = config.get_string("camera_id", "axis-camera-001");
        self.rate_limit_seconds = config.get_float("rate_limit_seconds", 60.0).max(1.0);
        self.jpeg_quality = (config.get_int("jpeg_quality", 85).clamp(1, 100)) as u8;
        Ok(())
    }

    fn tick(&mut self, ctx: &mut ModuleContext) -> ModuleOutcome {
        if !self.enabled {
            return ModuleOutcome::Skip;
        }

        let Some(request) = ctx.bus.try_recv_frame_request() else {
            return ModuleOutcome::Skip;
        };
        self.requests_received += 1;

        let parsed: serde_json::Value =
            serde_json::from_slice(&request).unwrap_or(serde_json::Value::Null);
        let request_id = parsed
            .get("request_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| String::from_utf8_lossy(&request).to_string());
        let reason = parsed
            .get("reason")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let now_us = ctx.frame.timestamp_us;
        if let Some(last) = self.last_published_at_us {
            let elapsed_seconds = now_us.saturating_sub(last) as f64 / 1_000_000.0;
            if elapsed_seconds < self.rate_limit_seconds {
                self.requests_throttled += 1;
                ctx.metadata.set_custom_data(
                    self.name(),
                    serde_json::json!({
                        "frames_sent": self.frames_sent,
                        "requests_received": self.requests_received,
                        "requests_throttled": self.requests_throttled,
                    }),
                );
                return ModuleOutcome::Skip;
            }
        }

        let width = ctx.frame.width;
        let height = ctx.frame.height;
        let luma_len = (width * height) as usize;
        let bytes = ctx.frame.bytes();
        if bytes.len() < luma_len {
            return ModuleOutcome::Error(EngineError::jpeg(
                "frame buffer is smaller than its luma plane",
            ));
        }

        let image = match GrayImage::from_raw(width, height, bytes[..luma_len].to_vec()) {
            Some(image) => image,
            None => return ModuleOutcome::Error(EngineError::jpeg("invalid frame dimensions")),
        };

        let mut jpeg_bytes = Vec::new();
        if let Err(err) =
            JpegEncoder::new_with_quality(&mut jpeg_bytes, self.jpeg_quality).encode_image(&image)
        {
            return ModuleOutcome::Error(EngineError::jpeg(err.to_string()));
        }

        let image_base64 = base64::engine::general_purpose::STANDARD.encode(&jpeg_bytes);

        let payload = serde_json::json!({
            "camera_id": self.camera_id,
            "request_id": request_id,
            "reason": reason,
            "frame_id": ctx.frame.frame_id,
            "timestamp_us": now_us,
            "width": width,
            "height": height,
            "format": "jpeg",
            "quality": self.jpeg_quality,
            "jpeg_size": jpeg_bytes.len(),
            "image_base64": image_base64,
        });

        if let Err(err) = ctx
            .bus
            .publish(TOPIC_FRAME, payload.to_string().as_bytes())
        {
            return ModuleOutcome::Error(err);
        }

        self.last_published_at_us = Some(now_us);
        self.frames_sent += 1;
        ctx.metadata.set_custom_data(
            self.name(),
            serde_json::json!({
                "frames_sent": self.frames_sent,
                "requests_received": self.requests_received,
                "requests_throttled": self.requests_throttled,
                "jpeg_size_bytes": jpeg_bytes.len(),
                "base64_size_bytes": payload["image_base64"].as_str().unwrap().len(),
            }),
        );
        ModuleOutcome::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core::bus::ChannelBusClient;
    use edge_core::dlpu::{DlpuCoordinator, ManualClock};
    use edge_core::metadata::MetadataFrame;
    use edge_core::ml::SimulatedInferenceEngine;
    use edge_core::video::{CaptureOutcome, CapturedFrame, SimulationVideoSource, VideoSource};

    fn frame_with_timestamp(width: u32, height: u32, data: Vec<u8>) -> CapturedFrame {
        let mut source = SimulationVideoSource::scripted(width, height, vec![data]);
        match source.capture_frame().unwrap() {
            CaptureOutcome::Captured(frame) => frame,
            CaptureOutcome::Dropped => panic!("expected a frame"),
        }
    }

    fn tick(
        module: &mut FramePublisherModule,
        frame: &CapturedFrame,
        bus: &ChannelBusClient,
        config: &Config,
        dlpu: &mut DlpuCoordinator,
    ) -> ModuleOutcome {
        let mut metadata = MetadataFrame::new("cam-0", 0, frame.timestamp_us, frame.width, frame.height);
        let mut inference = SimulatedInferenceEngine::new();
        let mut ctx = ModuleContext {
            frame,
            metadata: &mut metadata,
            inference: &mut inference,
            bus,
            config,
            dlpu,
        };
        module.tick(&mut ctx)
    }

    #[test]
    fn skips_when_no_request_is_pending() {
        let mut module = FramePublisherModule::new();
        let frame = frame_with_timestamp(4, 4, vec![128u8; 24]);
        let bus = ChannelBusClient::new();
        let config = Config::empty();
        let mut dlpu = DlpuCoordinator::with_clock(0, Box::new(ManualClock::new(0)));
        let outcome = tick(&mut module, &frame, &bus, &config, &mut dlpu);
        assert!(matches!(outcome, ModuleOutcome::Skip));
    }

    #[test]
    fn publishes_a_jpeg_when_a_request_is_pending() {
        let mut module = FramePublisherModule::new();
        let frame = frame_with_timestamp(4, 4, vec![128u8; 24]);
        let bus = ChannelBusClient::new();
        bus.frame_request_sender().send(b"req-1".to_vec()).unwrap();
        let config = Config::empty();
        let mut dlpu = DlpuCoordinator::with_clock(0, Box::new(ManualClock::new(0)));

        let outcome = tick(&mut module, &frame, &bus, &config, &mut dlpu);
        assert!(matches!(outcome, ModuleOutcome::Success));

        let published = bus.drain_published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, TOPIC_FRAME);
        let payload: serde_json::Value = serde_json::from_slice(&published[0].1).unwrap();
        assert_eq!(payload["request_id"], "req-1");
        assert_eq!(payload["format"], "jpeg");
        assert_eq!(payload["quality"], 85);
        assert!(payload["jpeg_size"].as_u64().unwrap() > 0);
        assert!(payload["image_base64"].as_str().unwrap().len() > 0);
        assert_eq!(module.frames_sent, 1);
        assert_eq!(module.requests_received, 1);
    }

    #[test]
    fn disabled_module_skips_even_with_a_pending_request() {
        let mut module = FramePublisherModule::new();
        module.enabled = false;
        let frame = frame_with_timestamp(4, 4, vec![128u8; 24]);
        let bus = ChannelBusClient::new();
        bus.frame_request_sender().send(b"req-1".to_vec()).unwrap();
        let config = Config::empty();
        let mut dlpu = DlpuCoordinator::with_clock(0, Box::new(ManualClock::new(0)));
        let outcome = tick(&mut module, &frame, &bus, &config, &mut dlpu);
        assert!(matches!(outcome, ModuleOutcome::Skip));
        assert!(bus.drain_published().is_empty());
    }

    #[test]
    fn a_second_request_inside_the_rate_limit_window_is_skipped() {
        let mut module = FramePublisherModule::new();
        module.rate_limit_seconds = 1.0;

        let bus = ChannelBusClient::new();
        let config = Config::empty();
        let mut dlpu = DlpuCoordinator::with_clock(0, Box::new(ManualClock::new(0)));

        let first = frame_with_timestamp(4, 4, vec![1u8; 24]);
        bus.frame_request_sender().send(b"req-1".to_vec()).unwrap();
        let outcome = tick(&mut module, &first, &bus, &config, &mut dlpu);
        assert!(matches!(outcome, ModuleOutcome::Success));
        bus.drain_published();

        let mut second = frame_with_timestamp(4, 4, vec![2u8; 24]);
        second.timestamp_us = first.timestamp_us + 500_000; // 0.5s later
        bus.frame_request_sender().send(b"req-2".to_vec()).unwrap();
        let outcome = tick(&mut module, &second, &bus, &config, &mut dlpu);
        assert!(matches!(outcome, ModuleOutcome::Skip));
        assert!(bus.drain_published().is_empty());
        assert_eq!(module.requests_throttled, 1);
    }

    #[test]
    fn a_request_after_the_rate_limit_window_publishes_again() {
        let mut module = FramePublisherModule::new();
        module.rate_limit_seconds = 1.0;

        let bus = ChannelBusClient::new();
        let config = Config::empty();
        let mut dlpu = DlpuCoordinator::with_clock(0, Box::new(ManualClock::new(0)));

        let first = frame_with_timestamp(4, 4, vec![1u8; 24]);
        bus.frame_request_sender().send(b"req-1".to_vec()).unwrap();
        tick(&mut module, &first, &bus, &config, &mut dlpu);
        bus.drain_published();

        let mut second = frame_with_timestamp(4, 4, vec![2u8; 24]);
        second.timestamp_us = first.timestamp_us + 2_000_000; // 2s later
        bus.frame_request_sender().send(b"req-2".to_vec()).unwrap();
        let outcome = tick(&mut module, &second, &bus, &config, &mut dlpu);
        assert!(matches!(outcome, ModuleOutcome::Success));
        assert_eq!(bus.drain_published().len(), 1);
    }

    #[test]
    fn jpeg_quality_and_rate_limit_are_clamped_from_config() {
        let mut module = FramePublisherModule::new();
        let config = Config::from_value(serde_json::json!({
            "jpeg_quality": 500,
            "rate_limit_seconds": -3.0,
        }));
        module.init(&config).unwrap();
        assert_eq!(module.jpeg_quality(), 100);
        assert_eq!(module.rate_limit_seconds(), 1.0);
    }

    #[test]
    fn rate_limit_seconds_defaults_to_sixty() {
        let mut module = FramePublisherModule::new();
        module.init(&Config::empty()).unwrap();
        assert_eq!(module.rate_limit_seconds(), 60.0);
    }
}
