//! The ordered byte sink driven by the pipeline.

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::{Error, Progress, Result, SessionEvent};

/// Consumer side of one generation session.
///
/// The pipeline calls `write` once per chunk, in production order, and
/// awaits it before pulling the next chunk — the await is the backpressure
/// point. `progress` follows every accepted chunk. Exactly one of `close`
/// (all bytes delivered) or `abort` (cancelled or failed) ends the session;
/// after `abort`, disposal of already-delivered bytes is the sink's
/// responsibility.
#[allow(async_fn_in_trait)]
pub trait ChunkSink: Send {
    /// Accepts the next chunk. An error terminates the session.
    async fn write(&mut self, chunk: Bytes) -> Result<()>;

    /// Observes a progress snapshot at a chunk boundary.
    async fn progress(&mut self, progress: Progress) -> Result<()>;

    /// All chunks were delivered and accepted; finalize.
    async fn close(&mut self) -> Result<()>;

    /// The session ended without completing.
    async fn abort(&mut self);
}

/// In-memory sink for tests and benches.
#[derive(Debug, Default)]
pub struct MemorySink {
    data: Vec<u8>,
    progress: Vec<Progress>,
    closed: bool,
    aborted: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, in order.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Every progress report, in order.
    pub fn progress_reports(&self) -> &[Progress] {
        &self.progress
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}

impl ChunkSink for MemorySink {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        self.data.extend_from_slice(&chunk);
        Ok(())
    }

    async fn progress(&mut self, progress: Progress) -> Result<()> {
        self.progress.push(progress);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    async fn abort(&mut self) {
        self.aborted = true;
        self.data.clear();
    }
}

/// Forwards chunks and progress onto a session's bounded event channel.
///
/// The bounded send is the pipeline's backpressure: when the consumer stops
/// draining, production stalls here. Sends race the session token so a
/// cancelled session never deadlocks against a full channel.
pub(crate) struct EventSink {
    events: tokio::sync::mpsc::Sender<SessionEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    pub(crate) fn new(
        events: tokio::sync::mpsc::Sender<SessionEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self { events, cancel }
    }

    async fn send(&self, event: SessionEvent) -> Result<()> {
        tokio::select! {
            biased;
            sent = self.events.send(event) => sent.map_err(|_| Error::Channel {
                context: "event receiver dropped mid-session".to_string(),
            }),
            () = self.cancel.cancelled() => Err(Error::Aborted),
        }
    }
}

impl ChunkSink for EventSink {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        self.send(SessionEvent::Chunk(chunk)).await
    }

    async fn progress(&mut self, progress: Progress) -> Result<()> {
        self.send(SessionEvent::Progress(progress)).await
    }

    async fn close(&mut self) -> Result<()> {
        // `Complete` is the host's to emit, after the outcome is known.
        Ok(())
    }

    async fn abort(&mut self) {}
}
