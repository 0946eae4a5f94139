//! PNG: signature, 1×1 IHDR, minimal IDAT, cycled `tEXt` filler, IEND.
//!
//! Every chunk is framed as `length(4 BE) + type(4) + data + CRC32(type‖data)
//! (4 BE)` with the IEEE CRC the PNG spec requires. The IDAT payload is the
//! canonical minimal zlib stream for a single transparent RGBA pixel, which
//! puts the smallest fully valid output at 67 bytes.
//!
//! Leftover space between the fixed chunks and IEND is consumed by `tEXt`
//! chunks whose payload repeats a short comment. A leftover of 1-11 bytes is
//! too small for the 12-byte `tEXt` framing and is absorbed as zero padding
//! inside the IDAT payload instead; the chunk CRC covers the padding and
//! IEND stays last, at the cost of a few unused compressed bytes that
//! typical decoders ignore.

use bytes::Bytes;

use super::{degraded_prefix, ChunkIter, FormatEncoder, CHUNK_SIZE};
use crate::{FormatKind, Result};

const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// 1×1 image, bit depth 8, color type 6 (RGBA).
const IHDR_DATA: [u8; 13] = [0, 0, 0, 1, 0, 0, 0, 1, 8, 6, 0, 0, 0];

/// Minimal zlib stream for the single zeroed RGBA scanline.
const IDAT_DATA: [u8; 10] = [0x78, 0x9C, 0x62, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01];

const FRAME_OVERHEAD: u64 = 12; // length + type + CRC
const IEND_LEN: u64 = FRAME_OVERHEAD;

/// signature + IHDR + IDAT + IEND: the classic 67-byte minimal PNG.
pub(crate) const MIN_SIZE: u64 = 8
    + (FRAME_OVERHEAD + IHDR_DATA.len() as u64)
    + (FRAME_OVERHEAD + IDAT_DATA.len() as u64)
    + IEND_LEN;

const FILLER: &[u8] = b"Comment\0Generated by Fillr ";

/// Cap on one `tEXt` payload, comfortably under the u32 length field.
const MAX_TEXT_PAYLOAD: u64 = 1 << 30;

fn crc32(parts: &[&[u8]]) -> u32 {
    let mut crc = flate2::Crc::new();
    for part in parts {
        crc.update(part);
    }
    crc.sum()
}

/// Frames one whole chunk: length, type, data, CRC.
fn frame(kind: &[u8; 4], data: &[u8]) -> Bytes {
    let mut out = Vec::with_capacity(12 + data.len());
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    out.extend_from_slice(&crc32(&[kind, data]).to_be_bytes());
    Bytes::from(out)
}

pub struct PngEncoder;

impl FormatEncoder for PngEncoder {
    fn kind(&self) -> FormatKind {
        FormatKind::Png
    }

    fn produce(&self, target: u64) -> ChunkIter {
        if target < MIN_SIZE {
            return degraded_prefix(SIGNATURE.to_vec(), target, true);
        }

        let leftover = target - MIN_SIZE;
        let (idat_pad, text_budget) = if leftover < FRAME_OVERHEAD {
            (leftover as usize, 0)
        } else {
            (0, leftover)
        };

        let mut idat = IDAT_DATA.to_vec();
        idat.resize(IDAT_DATA.len() + idat_pad, 0);

        let mut head = Vec::with_capacity(3);
        head.push(Bytes::copy_from_slice(&SIGNATURE));
        head.push(frame(b"IHDR", &IHDR_DATA));
        head.push(frame(b"IDAT", &idat));

        Box::new(PngChunks {
            head: head.into_iter(),
            text_budget,
            state: TextState::Idle,
            iend_pending: true,
        })
    }
}

enum TextState {
    Idle,
    /// Streaming one `tEXt` payload; the CRC accumulates as we go.
    Body {
        payload_left: u64,
        fill_pos: usize,
        crc: flate2::Crc,
    },
}

struct PngChunks {
    head: std::vec::IntoIter<Bytes>,
    /// Bytes still owed to `tEXt` chunks, framing included.
    text_budget: u64,
    state: TextState,
    iend_pending: bool,
}

impl PngChunks {
    /// Picks the next `tEXt` payload length so the remaining budget never
    /// lands between 1 and 11 bytes, which could not be framed.
    fn next_payload(&self) -> u64 {
        let mut payload = (self.text_budget - FRAME_OVERHEAD).min(MAX_TEXT_PAYLOAD);
        let rest = self.text_budget - FRAME_OVERHEAD - payload;
        if rest > 0 && rest < FRAME_OVERHEAD {
            payload -= FRAME_OVERHEAD - rest;
        }
        payload
    }
}

impl Iterator for PngChunks {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(chunk) = self.head.next() {
            return Some(Ok(chunk));
        }

        match &mut self.state {
            TextState::Idle if self.text_budget > 0 => {
                let payload = self.next_payload();
                self.text_budget -= FRAME_OVERHEAD + payload;

                let mut header = Vec::with_capacity(8);
                header.extend_from_slice(&(payload as u32).to_be_bytes());
                header.extend_from_slice(b"tEXt");

                let mut crc = flate2::Crc::new();
                crc.update(b"tEXt");
                self.state = TextState::Body {
                    payload_left: payload,
                    fill_pos: 0,
                    crc,
                };
                Some(Ok(Bytes::from(header)))
            }
            TextState::Body {
                payload_left,
                fill_pos,
                crc,
            } => {
                if *payload_left > 0 {
                    let len = (*payload_left).min(CHUNK_SIZE as u64) as usize;
                    let mut buf = vec![0u8; len];
                    for b in &mut buf {
                        *b = FILLER[*fill_pos % FILLER.len()];
                        *fill_pos += 1;
                    }
                    crc.update(&buf);
                    *payload_left -= len as u64;
                    return Some(Ok(Bytes::from(buf)));
                }
                let checksum = crc.sum().to_be_bytes();
                self.state = TextState::Idle;
                Some(Ok(Bytes::copy_from_slice(&checksum)))
            }
            TextState::Idle => {
                if self.iend_pending {
                    self.iend_pending = false;
                    return Some(Ok(frame(b"IEND", &[])));
                }
                None
            }
        }
    }
}
