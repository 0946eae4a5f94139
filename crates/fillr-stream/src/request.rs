//! Request, progress and message types for the session protocol.

use bytes::Bytes;
use fillr::FormatKind;
use tokio::sync::{mpsc, oneshot};

use crate::Error;

/// A validated, immutable generation request.
///
/// Created once per user action and never mutated after the pipeline starts
/// consuming it. The cancellation handle travels separately (the host owns
/// one [`CancellationToken`] per session).
///
/// [`CancellationToken`]: tokio_util::sync::CancellationToken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationRequest {
    kind: FormatKind,
    total_bytes: u64,
}

impl GenerationRequest {
    /// Validates and builds a request.
    ///
    /// # Errors
    ///
    /// Returns [`fillr::Error::SizeZero`] (wrapped) for zero-byte requests;
    /// size-resolution errors belong to [`fillr::SizeResolver`] and block
    /// even earlier.
    pub fn new(kind: FormatKind, total_bytes: u64) -> Result<Self, Error> {
        if total_bytes == 0 {
            return Err(Error::Size(fillr::Error::SizeZero));
        }
        Ok(Self { kind, total_bytes })
    }

    pub const fn kind(&self) -> FormatKind {
        self.kind
    }

    pub const fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// True when the target is under the format's structural minimum and
    /// the encoder will take its degraded path. Advisory only; generation
    /// still proceeds.
    pub fn below_minimum(&self) -> bool {
        self.total_bytes < self.kind.min_size()
    }
}

/// Progress snapshot taken at a chunk boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub bytes_produced: u64,
    pub total_bytes: u64,
}

impl Progress {
    /// Completion fraction in `[0, 1]`, monotonically non-decreasing within
    /// a session.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            1.0
        } else {
            self.bytes_produced as f64 / self.total_bytes as f64
        }
    }
}

/// Messages emitted by one generation session, in production order.
///
/// Within a session: every `Chunk` precedes `Complete`; `Progress` never
/// follows `Complete` or `Error`; `Complete` is emitted exactly once and
/// only after the full byte count was delivered; `Error` is emitted at most
/// once and terminates the session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// One produced chunk, in order.
    Chunk(Bytes),
    /// Progress at a chunk boundary.
    Progress(Progress),
    /// All bytes delivered and accepted.
    Complete { total_bytes: u64 },
    /// The session ended without completing. [`Error::Aborted`] marks a
    /// cooperative cancel; anything else is a failure.
    Error(Error),
}

/// Commands accepted by the host loop.
///
/// Sent over a bounded channel and consumed by [`GeneratorHost`]'s event
/// loop until shutdown.
///
/// [`GeneratorHost`]: crate::GeneratorHost
#[derive(Debug)]
pub enum HostCommand {
    /// Start a session, cancelling any in-flight one first
    /// (last-request-wins; no queuing).
    Generate {
        request: GenerationRequest,
        events: mpsc::Sender<SessionEvent>,
    },

    /// Cancel the current session. Idempotent when none is running.
    Cancel,

    /// Stop the host loop after retiring the active session.
    ///
    /// - `ack`: one-shot channel acknowledging that the host has completed
    ///   its shutdown routine.
    Shutdown { ack: oneshot::Sender<()> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_byte_requests() {
        assert!(matches!(
            GenerationRequest::new(FormatKind::Png, 0),
            Err(Error::Size(fillr::Error::SizeZero))
        ));
        let req = GenerationRequest::new(FormatKind::Png, 67).unwrap();
        assert_eq!(req.total_bytes(), 67);
        assert!(!req.below_minimum());
        let small = GenerationRequest::new(FormatKind::Png, 20).unwrap();
        assert!(small.below_minimum());
    }

    #[test]
    fn fraction_is_bounded() {
        let p = Progress {
            bytes_produced: 0,
            total_bytes: 0,
        };
        assert_eq!(p.fraction(), 1.0);
        let p = Progress {
            bytes_produced: 50,
            total_bytes: 200,
        };
        assert_eq!(p.fraction(), 0.25);
    }
}
