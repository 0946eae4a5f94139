//! Plain text: printable ASCII filler, no framing.

use bytes::Bytes;
use rand::RngCore;

use super::{ChunkIter, FormatEncoder, CHUNK_SIZE};
use crate::{FormatKind, Result};

pub struct PlainTextEncoder;

impl FormatEncoder for PlainTextEncoder {
    fn kind(&self) -> FormatKind {
        FormatKind::PlainText
    }

    fn produce(&self, target: u64) -> ChunkIter {
        Box::new(TextChunks { remaining: target })
    }
}

struct TextChunks {
    remaining: u64,
}

impl Iterator for TextChunks {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let len = self.remaining.min(CHUNK_SIZE as u64) as usize;
        self.remaining -= len as u64;

        let mut buf = vec![0u8; len];
        rand::rng().fill_bytes(&mut buf);
        for b in &mut buf {
            // Map into the printable ASCII range (32..=126).
            *b = 32 + (*b % 95);
        }
        Some(Ok(Bytes::from(buf)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{assert_exact_sizes, collect};
    use crate::FormatKind;

    #[test]
    fn sums_exactly() {
        assert_exact_sizes(FormatKind::PlainText);
    }

    #[test]
    fn emits_only_printable_ascii() {
        let out = collect(FormatKind::PlainText, 4096);
        assert!(out.iter().all(|&b| (32..=126).contains(&b)));
    }
}
