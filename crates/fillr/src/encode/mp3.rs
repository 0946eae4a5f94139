//! MP3: ID3v2.3 tag followed by zero-filled MPEG-1 Layer 3 frames.
//!
//! The tag size lives in a synchsafe integer (7 bits per byte) so the tag
//! header can never alias a frame sync marker. Filler frames use the header
//! `FF FB 90 00` (MPEG-1 Layer 3, 128 kbps, 44.1 kHz) with an all-zero
//! payload; zeroes decode as silence. Targets too small for the tag fall
//! back to raw repetitions of the sync pattern.

use bytes::Bytes;

use super::{degraded_prefix, ChunkIter, FormatEncoder, CHUNK_SIZE};
use crate::{FormatKind, Result};

const SYNC: [u8; 4] = [0xFF, 0xFB, 0x90, 0x00];

/// Standard frame length at 128 kbps / 44.1 kHz.
const FRAME_LEN: usize = 417;

/// Below this the output is raw sync-pattern repetition (no tag).
const RAW_THRESHOLD: u64 = 32;

const TITLE: &str = "Fillr Generated Silent Audio";

/// ID3v2 header + TIT2 frame header + encoding byte + title text.
pub(crate) const TAG_LEN: usize = 10 + 10 + 1 + TITLE.len();

/// Tag plus one sync header.
pub(crate) const MIN_SIZE: u64 = TAG_LEN as u64 + 4;

/// Big-endian, 7 bits per byte.
fn synchsafe(size: u32) -> [u8; 4] {
    [
        ((size >> 21) & 0x7F) as u8,
        ((size >> 14) & 0x7F) as u8,
        ((size >> 7) & 0x7F) as u8,
        (size & 0x7F) as u8,
    ]
}

/// The complete ID3v2.3 tag: header and a single TIT2 text frame.
fn id3_tag() -> Vec<u8> {
    let text_len = 1 + TITLE.len(); // encoding byte + ISO-8859-1 text
    let frame_len = 10 + text_len;

    let mut tag = Vec::with_capacity(TAG_LEN);
    tag.extend_from_slice(b"ID3");
    tag.extend_from_slice(&[0x03, 0x00]); // version 2.3.0
    tag.push(0x00); // flags
    tag.extend_from_slice(&synchsafe(frame_len as u32));

    tag.extend_from_slice(b"TIT2");
    tag.extend_from_slice(&(text_len as u32).to_be_bytes());
    tag.extend_from_slice(&[0x00, 0x00]); // frame flags
    tag.push(0x00); // ISO-8859-1
    tag.extend_from_slice(TITLE.as_bytes());

    debug_assert_eq!(tag.len(), TAG_LEN);
    tag
}

pub struct Mp3Encoder;

impl FormatEncoder for Mp3Encoder {
    fn kind(&self) -> FormatKind {
        FormatKind::Mp3
    }

    fn produce(&self, target: u64) -> ChunkIter {
        if target < RAW_THRESHOLD {
            let mut buf = vec![0u8; target as usize];
            for (i, b) in buf.iter_mut().enumerate() {
                *b = SYNC[i % SYNC.len()];
            }
            return super::single(Bytes::from(buf));
        }
        if target <= TAG_LEN as u64 {
            return degraded_prefix(id3_tag(), target, false);
        }
        Box::new(Mp3Chunks {
            tag_pending: true,
            frames_left: target - TAG_LEN as u64,
        })
    }
}

struct Mp3Chunks {
    tag_pending: bool,
    /// Bytes still owed to the frame region.
    frames_left: u64,
}

impl Iterator for Mp3Chunks {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.tag_pending {
            self.tag_pending = false;
            return Some(Ok(Bytes::from(id3_tag())));
        }
        if self.frames_left == 0 {
            return None;
        }

        let mut buf = Vec::with_capacity(CHUNK_SIZE.min(self.frames_left as usize));
        while self.frames_left > 0 && buf.len() + FRAME_LEN <= CHUNK_SIZE {
            let frame_len = self.frames_left.min(FRAME_LEN as u64) as usize;
            let start = buf.len();
            buf.resize(start + frame_len, 0);
            if frame_len >= SYNC.len() {
                buf[start..start + SYNC.len()].copy_from_slice(&SYNC);
            }
            // A remainder under 4 bytes stays zero-filled.
            self.frames_left -= frame_len as u64;
        }
        Some(Ok(Bytes::from(buf)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{assert_exact_sizes, collect};
    use super::*;
    use crate::FormatKind;

    #[test]
    fn sums_exactly() {
        assert_exact_sizes(FormatKind::Mp3);
    }

    #[test]
    fn synchsafe_uses_seven_bits_per_byte() {
        assert_eq!(synchsafe(0), [0, 0, 0, 0]);
        assert_eq!(synchsafe(39), [0, 0, 0, 39]);
        assert_eq!(synchsafe(128), [0, 0, 1, 0]);
        assert_eq!(synchsafe(0x0FFF_FFFF), [0x7F, 0x7F, 0x7F, 0x7F]);
    }

    #[test]
    fn tiny_targets_repeat_the_sync_pattern() {
        let out = collect(FormatKind::Mp3, 10);
        assert_eq!(out, [0xFF, 0xFB, 0x90, 0x00, 0xFF, 0xFB, 0x90, 0x00, 0xFF, 0xFB]);
    }

    #[test]
    fn tag_sized_targets_truncate_the_tag() {
        let out = collect(FormatKind::Mp3, 40);
        assert_eq!(out, id3_tag()[..40]);
        assert_eq!(&out[..3], b"ID3");
    }

    #[test]
    fn full_layout_has_tag_then_frames() {
        let target = TAG_LEN as u64 + 3 * FRAME_LEN as u64 + 100;
        let out = collect(FormatKind::Mp3, target);

        assert_eq!(&out[..3], b"ID3");
        assert_eq!(out[3], 0x03);
        assert_eq!(&out[6..10], &synchsafe(39));
        assert_eq!(&out[10..14], b"TIT2");

        // Frame syncs at every standard frame boundary.
        for i in 0..3 {
            let at = TAG_LEN + i * FRAME_LEN;
            assert_eq!(&out[at..at + 4], &SYNC, "frame sync at {at}");
        }
        // The shortened final frame still leads with the sync pattern.
        let last = TAG_LEN + 3 * FRAME_LEN;
        assert_eq!(&out[last..last + 4], &SYNC);
        assert!(out[last + 4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn frames_stay_aligned_across_chunk_boundaries() {
        let out = collect(FormatKind::Mp3, 3 * CHUNK_SIZE as u64);
        let frames = (out.len() - TAG_LEN) / FRAME_LEN;
        for i in 0..frames {
            let at = TAG_LEN + i * FRAME_LEN;
            assert_eq!(&out[at..at + 4], &SYNC, "frame sync at {at}");
        }
    }
}
