//! Message bus client seam.
//!
//! The real bus SDK lives outside this crate: this module only defines the
//! [`BusClient`] contract the orchestrator and modules publish through.
//! [`LoggingBusClient`] is the production stand-in (every publish becomes a
//! structured log line); [`ChannelBusClient`] is a crossbeam-backed test
//! double that lets tests assert on what was published and inject
//! `frame_request` messages.

use crossbeam::channel::{Receiver, Sender};

use crate::error::{EngineError, EngineResult};

pub const TOPIC_METADATA: &str = "metadata";
pub const TOPIC_FRAME_REQUEST: &str = "frame_request";
pub const TOPIC_FRAME: &str = "frame";
pub const TOPIC_STATUS: &str = "status";

/// Contract the orchestrator and modules publish/subscribe through. Modules
/// only ever publish; `frame_request` is the one inbound topic, polled once
/// per tick by the frame publisher module.
pub trait BusClient {
    fn publish(&self, topic: &str, payload: &[u8]) -> EngineResult<()>;
    /// Non-blocking poll for a pending frame request, if any.
    fn try_recv_frame_request(&self) -> Option<Vec<u8>>;
}

/// Publishes by logging at debug level. Never produces inbound frame
/// requests, since there is no real bus wired in behind it.
#[derive(Debug, Default)]
pub struct LoggingBusClient;

impl BusClient for LoggingBusClient {
    fn publish(&self, topic: &str, payload: &[u8]) -> EngineResult<()> {
        tracing::debug!(topic, bytes = payload.len(), "bus publish");
        Ok(())
    }

    fn try_recv_frame_request(&self) -> Option<Vec<u8>> {
        None
    }
}

/// In-process bus backed by crossbeam channels, for tests and the demo
/// binary's end-to-end harness.
pub struct ChannelBusClient {
    publish_tx: Sender<(String, Vec<u8>)>,
    publish_rx: Receiver<(String, Vec<u8>)>,
    frame_request_tx: Sender<Vec<u8>>,
    frame_request_rx: Receiver<Vec<u8>>,
}

impl ChannelBusClient {
    pub fn new() -> Self {
        let (publish_tx, publish_rx) = crossbeam::channel::unbounded();
        let (frame_request_tx, frame_request_rx) = crossbeam::channel::unbounded();
        Self {
            publish_tx,
            publish_rx,
            frame_request_tx,
            frame_request_rx,
        }
    }

    /// A cloneable handle other threads (or tests) use to enqueue a
    /// `frame_request`.
    pub fn frame_request_sender(&self) -> Sender<Vec<u8>> {
        self.frame_request_tx.clone()
    }

    /// Drain every message published so far, for assertions.
    pub fn drain_published(&self) -> Vec<(String, Vec<u8>)> {
        self.publish_rx.try_iter().collect()
    }

    /// A cloned receiver handle that keeps working after this client is
    /// moved elsewhere (e.g. into an orchestrator), so a test can still
    /// drain what was published.
    pub fn published_receiver(&self) -> Receiver<(String, Vec<u8>)> {
        self.publish_rx.clone()
    }
}

impl Default for ChannelBusClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BusClient for ChannelBusClient {
    fn publish(&self, topic: &str, payload: &[u8]) -> EngineResult<()> {
        self.publish_tx
            .send((topic.to_string(), payload.to_vec()))
            .map_err(|e| EngineError::bus(e.to_string()))
    }

    fn try_recv_frame_request(&self) -> Option<Vec<u8>> {
        self.frame_request_rx.try_recv().ok()
    }
}
