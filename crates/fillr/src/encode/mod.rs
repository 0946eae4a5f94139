//! Per-format chunk encoders.
//!
//! One encoder per [`FormatKind`], all honoring the same contract:
//!
//! - the emitted chunk lengths sum to exactly the requested target, for any
//!   target including zero;
//! - at or above the format's structural minimum, the concatenated bytes
//!   form a structurally valid instance of the format;
//! - below it, the encoder degrades to a truncated prefix of the format's
//!   signature/header bytes rather than failing;
//! - filler content is throwaway (random or index-derived) and is not
//!   reproducible across sessions; structural framing is deterministic.
//!
//! Sequences are lazy and forward-only: a multi-gigabyte target never
//! materializes more than one chunk at a time.

pub(crate) mod csv;
pub(crate) mod json;
pub(crate) mod mp3;
pub(crate) mod mp4;
pub(crate) mod pdf;
pub(crate) mod png;
pub(crate) mod text;

use bytes::Bytes;

use crate::{FormatKind, Result};

/// Upper bound on a single emitted chunk.
///
/// This also bounds cooperative cancellation latency downstream: a pipeline
/// that checks for cancellation between chunks waits at most one chunk's
/// production time.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// A lazy, finite, forward-only sequence of byte chunks.
///
/// Not restartable; producing the same artifact again requires a fresh call
/// to [`FormatEncoder::produce`].
pub type ChunkIter = Box<dyn Iterator<Item = Result<Bytes>> + Send>;

/// Shared contract for the per-format chunk producers.
pub trait FormatEncoder: Send + Sync {
    /// The format this encoder emits.
    fn kind(&self) -> FormatKind;

    /// Produces chunks whose lengths sum exactly to `target`.
    fn produce(&self, target: u64) -> ChunkIter;
}

/// Degraded-path helper: emits `target` bytes of `prefix`, truncating when
/// the prefix is longer and zero-padding when `pad` is set and the prefix
/// runs out.
pub(crate) fn degraded_prefix(mut prefix: Vec<u8>, target: u64, pad: bool) -> ChunkIter {
    let target = target as usize;
    if prefix.len() > target {
        prefix.truncate(target);
    } else if pad {
        prefix.resize(target, 0);
    }
    debug_assert!(pad || prefix.len() <= target);
    single(Bytes::from(prefix))
}

/// A one-chunk sequence (empty chunks are elided).
pub(crate) fn single(chunk: Bytes) -> ChunkIter {
    if chunk.is_empty() {
        Box::new(core::iter::empty())
    } else {
        Box::new(core::iter::once(Ok(chunk)))
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    /// Drains an encoder and returns the concatenated output, asserting the
    /// exact-size contract along the way.
    pub(crate) fn collect(kind: FormatKind, target: u64) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in kind.encoder().produce(target) {
            let chunk = chunk.expect("encoder fault");
            assert!(!chunk.is_empty(), "encoders never emit empty chunks");
            assert!(chunk.len() <= CHUNK_SIZE, "chunk exceeds the 1 MiB cap");
            out.extend_from_slice(&chunk);
        }
        assert_eq!(out.len() as u64, target, "byte sum mismatch for {kind}");
        out
    }

    /// Exercises the exact-size contract across adversarial targets around
    /// the structural minimum and the chunk cap.
    pub(crate) fn assert_exact_sizes(kind: FormatKind) {
        let min = kind.min_size();
        let mut targets = vec![0, 1, 2, 3];
        targets.extend(min.saturating_sub(1)..=min + 13);
        targets.extend([
            CHUNK_SIZE as u64 - 1,
            CHUNK_SIZE as u64,
            CHUNK_SIZE as u64 + 1,
            3 * CHUNK_SIZE as u64 + 17,
        ]);
        for target in targets {
            collect(kind, target);
        }
    }
}
