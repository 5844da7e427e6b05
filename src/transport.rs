//! Frame sinks. Transmission is best-effort: a failed frame is reported to
//! the caller and never retried.

use crate::telemetry::Frame;
use std::io::Write;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::trace;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("payload of {len} bytes exceeds the 8-byte frame limit")]
    PayloadTooLong { len: usize },

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport closed")]
    Closed,
}

pub trait TransportSink {
    fn send(&mut self, id: u32, payload: &[u8]) -> Result<(), TransportError>;

    /// Called once per tick after the last frame.
    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn name(&self) -> &'static str;
}

fn frame_for(id: u32, payload: &[u8]) -> Result<Frame, TransportError> {
    Frame::new(id, payload).ok_or(TransportError::PayloadTooLong { len: payload.len() })
}

/// Fans frames out to every subscribed TCP client.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<Frame>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Frame> {
        self.tx.subscribe()
    }

    pub fn sender(&self) -> broadcast::Sender<Frame> {
        self.tx.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl TransportSink for BroadcastSink {
    fn send(&mut self, id: u32, payload: &[u8]) -> Result<(), TransportError> {
        let frame = frame_for(id, payload)?;
        // Nobody listening is not a failure for a broadcast bus.
        if self.tx.receiver_count() == 0 {
            return Ok(());
        }
        self.tx.send(frame).map(|_| ()).map_err(|_| TransportError::Closed)
    }

    fn name(&self) -> &'static str {
        "tcp-broadcast"
    }
}

/// Writes frames as `candump` text lines.
pub struct CandumpSink<W: Write> {
    writer: W,
    interface: String,
}

impl<W: Write> CandumpSink<W> {
    pub fn new(writer: W, interface: impl Into<String>) -> Self {
        Self {
            writer,
            interface: interface.into(),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TransportSink for CandumpSink<W> {
    fn send(&mut self, id: u32, payload: &[u8]) -> Result<(), TransportError> {
        let frame = frame_for(id, payload)?;
        writeln!(self.writer, "{}", frame.to_candump(&self.interface))?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "candump"
    }
}

/// Emits each frame as a trace event.
#[derive(Debug, Default)]
pub struct LogSink;

impl TransportSink for LogSink {
    fn send(&mut self, id: u32, payload: &[u8]) -> Result<(), TransportError> {
        let frame = frame_for(id, payload)?;
        trace!(target: "vehbus::frames", "{}", frame);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Keeps every frame in memory; identifiers listed in `failing_ids` are
/// rejected instead.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub frames: alloc::vec::Vec<Frame>,
    pub failing_ids: alloc::vec::Vec<u32>,
    pub flushes: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(ids: &[u32]) -> Self {
        Self {
            failing_ids: ids.to_vec(),
            ..Self::default()
        }
    }

    pub fn last_tick(&self) -> &[Frame] {
        let start = self.frames.len().saturating_sub(crate::telemetry::SIGNAL_COUNT);
        &self.frames[start..]
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl TransportSink for RecordingSink {
    fn send(&mut self, id: u32, payload: &[u8]) -> Result<(), TransportError> {
        if self.failing_ids.contains(&id) {
            return Err(TransportError::Closed);
        }
        let frame = frame_for(id, payload)?;
        self.frames.push(frame);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.flushes += 1;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
