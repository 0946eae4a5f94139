//! MP4: a minimal ISO BMFF container with one H.264 IDR frame.
//!
//! The header is an abstract box tree (`ftyp` + `moov` with a full video
//! track) resolved in two pure passes: pass one lays the tree out with a
//! placeholder chunk offset to learn the header's total length, pass two
//! rebuilds it with the real offset patched into `stco`. No emitted bytes
//! are ever mutated. `mdat` holds the frame followed by zero padding and is
//! sized so the whole file hits the target exactly; beyond the u32 box-size
//! limit it switches to the 64-bit largesize form.

use std::sync::LazyLock;

use bytes::Bytes;

use super::{degraded_prefix, ChunkIter, FormatEncoder, CHUNK_SIZE};
use crate::{Error, FormatKind, Result};

/// Start code + IDR NAL unit for a single black 1×1 frame.
const H264_FRAME: [u8; 12] = [
    0x00, 0x00, 0x00, 0x01, 0x65, 0x88, 0x80, 0x10, 0x00, 0x07, 0xFF, 0xC4,
];

enum Payload {
    Data(Vec<u8>),
    Children(Vec<Mp4Box>),
}

/// One length-prefixed, four-character-coded box; children concatenate as
/// the payload.
struct Mp4Box {
    fourcc: &'static [u8; 4],
    payload: Payload,
}

impl Mp4Box {
    fn data(fourcc: &'static [u8; 4], data: Vec<u8>) -> Self {
        Self {
            fourcc,
            payload: Payload::Data(data),
        }
    }

    fn container(fourcc: &'static [u8; 4], children: Vec<Mp4Box>) -> Self {
        Self {
            fourcc,
            payload: Payload::Children(children),
        }
    }

    fn len(&self) -> u64 {
        8 + match &self.payload {
            Payload::Data(data) => data.len() as u64,
            Payload::Children(children) => children.iter().map(Mp4Box::len).sum(),
        }
    }

    /// Serializes the box. Header boxes are constant-sized and stay far
    /// below the u32 size field; `mdat` is framed separately.
    fn write_into(&self, out: &mut Vec<u8>) {
        let len = self.len();
        debug_assert!(len <= u64::from(u32::MAX));
        out.extend_from_slice(&(len as u32).to_be_bytes());
        out.extend_from_slice(self.fourcc);
        match &self.payload {
            Payload::Data(data) => out.extend_from_slice(data),
            Payload::Children(children) => {
                for child in children {
                    child.write_into(out);
                }
            }
        }
    }
}

/// 3×3 fixed-point identity matrix used by `mvhd` and `tkhd`.
const MATRIX: [u8; 36] = [
    0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0x40, 0, 0, 0,
];

fn ftyp() -> Mp4Box {
    let mut data = Vec::new();
    data.extend_from_slice(b"isom"); // major brand
    data.extend_from_slice(&1u32.to_be_bytes()); // minor version
    data.extend_from_slice(b"isom");
    data.extend_from_slice(b"avc1");
    Mp4Box::data(b"ftyp", data)
}

fn mvhd() -> Mp4Box {
    let mut data = Vec::new();
    data.extend_from_slice(&[0; 4]); // version & flags
    data.extend_from_slice(&[0; 8]); // creation & modification time
    data.extend_from_slice(&1000u32.to_be_bytes()); // timescale
    data.extend_from_slice(&1000u32.to_be_bytes()); // duration: 1 second
    data.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // rate 1.0
    data.extend_from_slice(&[0x01, 0x00]); // volume 1.0
    data.extend_from_slice(&[0; 10]); // reserved
    data.extend_from_slice(&MATRIX);
    data.extend_from_slice(&[0; 24]); // pre_defined
    data.extend_from_slice(&2u32.to_be_bytes()); // next track ID
    Mp4Box::data(b"mvhd", data)
}

fn tkhd() -> Mp4Box {
    let mut data = Vec::new();
    data.extend_from_slice(&[0, 0, 0, 7]); // flags: enabled, in movie, in preview
    data.extend_from_slice(&[0; 8]);
    data.extend_from_slice(&1u32.to_be_bytes()); // track ID
    data.extend_from_slice(&[0; 4]); // reserved
    data.extend_from_slice(&1000u32.to_be_bytes()); // duration
    data.extend_from_slice(&[0; 8]); // reserved
    data.extend_from_slice(&[0; 4]); // layer & alternate group
    data.extend_from_slice(&[0; 4]); // volume & reserved
    data.extend_from_slice(&MATRIX);
    data.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // width 1.0
    data.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // height 1.0
    Mp4Box::data(b"tkhd", data)
}

fn mdhd() -> Mp4Box {
    let mut data = Vec::new();
    data.extend_from_slice(&[0; 4]);
    data.extend_from_slice(&[0; 8]);
    data.extend_from_slice(&1000u32.to_be_bytes());
    data.extend_from_slice(&1000u32.to_be_bytes());
    data.extend_from_slice(&[0x55, 0xC4, 0, 0]); // language 'und'
    Mp4Box::data(b"mdhd", data)
}

fn hdlr() -> Mp4Box {
    let mut data = Vec::new();
    data.extend_from_slice(&[0; 4]);
    data.extend_from_slice(&[0; 4]); // pre_defined
    data.extend_from_slice(b"vide");
    data.extend_from_slice(&[0; 12]); // reserved
    data.extend_from_slice(b"VideoHandler\0");
    Mp4Box::data(b"hdlr", data)
}

fn vmhd() -> Mp4Box {
    Mp4Box::data(b"vmhd", vec![0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0])
}

fn dinf() -> Mp4Box {
    let url = Mp4Box::data(b"url ", vec![0, 0, 0, 1]); // self-contained
    let mut dref_data = Vec::new();
    dref_data.extend_from_slice(&[0; 4]);
    dref_data.extend_from_slice(&1u32.to_be_bytes()); // entry count
    url.write_into(&mut dref_data);
    Mp4Box::container(b"dinf", vec![Mp4Box::data(b"dref", dref_data)])
}

fn avcc() -> Mp4Box {
    let mut data = Vec::new();
    data.push(1); // configuration version
    data.extend_from_slice(&[0x42, 0x00, 0x0A]); // Baseline profile, level 1.0
    data.push(0xFF); // 4-byte NAL lengths
    data.push(0xE1); // one SPS
    data.extend_from_slice(&13u16.to_be_bytes());
    data.extend_from_slice(&[
        0x67, 0x42, 0x00, 0x0A, 0x89, 0x95, 0x42, 0x82, 0x83, 0xC4, 0x40, 0x6A, 0x02,
    ]);
    data.push(0x01); // one PPS
    data.extend_from_slice(&4u16.to_be_bytes());
    data.extend_from_slice(&[0x68, 0xCE, 0x3C, 0x80]);
    Mp4Box::data(b"avcC", data)
}

fn stsd() -> Mp4Box {
    let mut avc1_data = Vec::new();
    avc1_data.extend_from_slice(&[0; 6]); // reserved
    avc1_data.extend_from_slice(&1u16.to_be_bytes()); // data reference index
    avc1_data.extend_from_slice(&[0; 16]); // pre_defined & reserved
    avc1_data.extend_from_slice(&1u16.to_be_bytes()); // width
    avc1_data.extend_from_slice(&1u16.to_be_bytes()); // height
    avc1_data.extend_from_slice(&0x0048_0000u32.to_be_bytes()); // 72 dpi
    avc1_data.extend_from_slice(&0x0048_0000u32.to_be_bytes());
    avc1_data.extend_from_slice(&[0; 4]); // reserved
    avc1_data.extend_from_slice(&1u16.to_be_bytes()); // frame count
    avc1_data.extend_from_slice(&[0; 32]); // compressor name
    avc1_data.extend_from_slice(&0x0018u16.to_be_bytes()); // depth
    avc1_data.extend_from_slice(&0xFFFFu16.to_be_bytes()); // pre_defined = -1
    avcc().write_into(&mut avc1_data);
    let avc1 = Mp4Box::data(b"avc1", avc1_data);

    let mut stsd_data = Vec::new();
    stsd_data.extend_from_slice(&[0; 4]);
    stsd_data.extend_from_slice(&1u32.to_be_bytes()); // entry count
    avc1.write_into(&mut stsd_data);
    Mp4Box::data(b"stsd", stsd_data)
}

fn stts() -> Mp4Box {
    let mut data = Vec::new();
    data.extend_from_slice(&[0; 4]);
    data.extend_from_slice(&1u32.to_be_bytes()); // entry count
    data.extend_from_slice(&1u32.to_be_bytes()); // sample count
    data.extend_from_slice(&1000u32.to_be_bytes()); // sample duration
    Mp4Box::data(b"stts", data)
}

fn stsc() -> Mp4Box {
    let mut data = Vec::new();
    data.extend_from_slice(&[0; 4]);
    data.extend_from_slice(&1u32.to_be_bytes()); // entry count
    data.extend_from_slice(&1u32.to_be_bytes()); // first chunk
    data.extend_from_slice(&1u32.to_be_bytes()); // samples per chunk
    data.extend_from_slice(&1u32.to_be_bytes()); // sample description index
    Mp4Box::data(b"stsc", data)
}

fn stsz() -> Mp4Box {
    let mut data = Vec::new();
    data.extend_from_slice(&[0; 4]);
    data.extend_from_slice(&(H264_FRAME.len() as u32).to_be_bytes()); // sample size
    data.extend_from_slice(&1u32.to_be_bytes()); // sample count
    Mp4Box::data(b"stsz", data)
}

fn stco(chunk_offset: u32) -> Mp4Box {
    let mut data = Vec::new();
    data.extend_from_slice(&[0; 4]);
    data.extend_from_slice(&1u32.to_be_bytes()); // entry count
    data.extend_from_slice(&chunk_offset.to_be_bytes());
    Mp4Box::data(b"stco", data)
}

/// The full header tree (`ftyp` + `moov`) with the given `stco` entry.
fn header_tree(chunk_offset: u32) -> [Mp4Box; 2] {
    let stbl = Mp4Box::container(
        b"stbl",
        vec![stsd(), stts(), stsc(), stsz(), stco(chunk_offset)],
    );
    let minf = Mp4Box::container(b"minf", vec![vmhd(), dinf(), stbl]);
    let mdia = Mp4Box::container(b"mdia", vec![mdhd(), hdlr(), minf]);
    let trak = Mp4Box::container(b"trak", vec![tkhd(), mdia]);
    let moov = Mp4Box::container(b"moov", vec![mvhd(), trak]);
    [ftyp(), moov]
}

fn render(tree: &[Mp4Box; 2]) -> Vec<u8> {
    let mut out = Vec::new();
    for node in tree {
        node.write_into(&mut out);
    }
    out
}

/// Header length is independent of the patched offset, so pass one resolves
/// it with a placeholder.
static HEADER_LEN: LazyLock<u64> = LazyLock::new(|| {
    header_tree(0).iter().map(Mp4Box::len).sum()
});

/// Header plus an `mdat` just big enough for the single frame.
pub(crate) fn min_size() -> u64 {
    *HEADER_LEN + 8 + H264_FRAME.len() as u64
}

/// Renders the header with `stco` pointing at the `mdat` payload, which sits
/// `mdat_header_len` bytes past the header.
fn render_header(mdat_header_len: u64) -> Result<Vec<u8>> {
    let offset = u32::try_from(*HEADER_LEN + mdat_header_len).map_err(|_| Error::Encode {
        context: "chunk offset exceeds the u32 stco field".to_string(),
    })?;
    Ok(render(&header_tree(offset)))
}

static ZERO: LazyLock<Bytes> = LazyLock::new(|| Bytes::from(vec![0u8; CHUNK_SIZE]));

pub struct Mp4Encoder;

impl FormatEncoder for Mp4Encoder {
    fn kind(&self) -> FormatKind {
        FormatKind::Mp4
    }

    fn produce(&self, target: u64) -> ChunkIter {
        if target < min_size() {
            let minimal = match render_header(8) {
                Ok(mut header) => {
                    let mdat_size = (min_size() - *HEADER_LEN) as u32;
                    header.extend_from_slice(&mdat_size.to_be_bytes());
                    header.extend_from_slice(b"mdat");
                    header.extend_from_slice(&H264_FRAME);
                    header
                }
                Err(e) => return Box::new(core::iter::once(Err(e))),
            };
            return degraded_prefix(minimal, target, false);
        }

        let mdat_size = target - *HEADER_LEN;
        // The 64-bit largesize form costs 8 extra header bytes.
        let largesize = mdat_size > u64::from(u32::MAX);
        let mdat_header_len: u64 = if largesize { 16 } else { 8 };

        let header = match render_header(mdat_header_len) {
            Ok(header) => header,
            Err(e) => return Box::new(core::iter::once(Err(e))),
        };

        let mut mdat_head = Vec::with_capacity(mdat_header_len as usize + H264_FRAME.len());
        if largesize {
            mdat_head.extend_from_slice(&1u32.to_be_bytes());
            mdat_head.extend_from_slice(b"mdat");
            mdat_head.extend_from_slice(&mdat_size.to_be_bytes());
        } else {
            mdat_head.extend_from_slice(&(mdat_size as u32).to_be_bytes());
            mdat_head.extend_from_slice(b"mdat");
        }
        mdat_head.extend_from_slice(&H264_FRAME);

        let padding = mdat_size - mdat_header_len - H264_FRAME.len() as u64;
        Box::new(Mp4Chunks {
            head: vec![Bytes::from(header), Bytes::from(mdat_head)].into_iter(),
            padding_left: padding,
        })
    }
}

struct Mp4Chunks {
    head: std::vec::IntoIter<Bytes>,
    /// Zero padding owed after the frame inside `mdat`.
    padding_left: u64,
}

impl Iterator for Mp4Chunks {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(chunk) = self.head.next() {
            return Some(Ok(chunk));
        }
        if self.padding_left == 0 {
            return None;
        }
        let len = self.padding_left.min(CHUNK_SIZE as u64) as usize;
        self.padding_left -= len as u64;
        Some(Ok(ZERO.slice(..len)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{assert_exact_sizes, collect};
    use super::*;
    use crate::FormatKind;

    /// Parses one level of boxes, returning `(fourcc, header_len, body)` per
    /// box.
    fn boxes(buf: &[u8]) -> Vec<(String, usize, &[u8])> {
        let mut out = Vec::new();
        let mut pos = 0;
        while pos < buf.len() {
            let size32 = u32::from_be_bytes(buf[pos..pos + 4].try_into().unwrap()) as u64;
            let fourcc = String::from_utf8(buf[pos + 4..pos + 8].to_vec()).unwrap();
            let (size, header_len) = if size32 == 1 {
                let large = u64::from_be_bytes(buf[pos + 8..pos + 16].try_into().unwrap());
                (large, 16)
            } else {
                (size32, 8)
            };
            let body = &buf[pos + header_len..pos + size as usize];
            out.push((fourcc, header_len, body));
            pos += size as usize;
        }
        assert_eq!(pos, buf.len(), "trailing bytes after the last box");
        out
    }

    fn find<'a>(level: &'a [(String, usize, &'a [u8])], fourcc: &str) -> &'a [u8] {
        level
            .iter()
            .find(|(name, _, _)| name == fourcc)
            .unwrap_or_else(|| panic!("missing box {fourcc}"))
            .2
    }

    #[test]
    fn sums_exactly() {
        assert_exact_sizes(FormatKind::Mp4);
    }

    #[test]
    fn box_tree_is_complete() {
        let out = collect(FormatKind::Mp4, 4096);
        let top = boxes(&out);
        let names: Vec<&str> = top.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(names, ["ftyp", "moov", "mdat"]);

        let moov = boxes(find(&top, "moov"));
        let trak = boxes(find(&moov, "trak"));
        let mdia = boxes(find(&trak, "mdia"));
        let minf = boxes(find(&mdia, "minf"));
        let stbl = boxes(find(&minf, "stbl"));
        for required in ["stsd", "stts", "stsc", "stsz", "stco"] {
            find(&stbl, required);
        }
    }

    #[test]
    fn stco_points_at_the_mdat_payload() {
        for target in [min_size(), min_size() + 1, 4096, 100_000] {
            let out = collect(FormatKind::Mp4, target);
            let top = boxes(&out);

            // Locate where mdat's payload actually starts.
            let mut pos = 0;
            let mut payload_start = None;
            for (fourcc, header_len, body) in &top {
                if fourcc == "mdat" {
                    payload_start = Some(pos + header_len);
                    assert_eq!(&body[..4], &H264_FRAME[..4], "frame first in mdat");
                }
                pos += header_len + body.len();
            }

            let moov = boxes(find(&top, "moov"));
            let trak = boxes(find(&moov, "trak"));
            let mdia = boxes(find(&trak, "mdia"));
            let minf = boxes(find(&mdia, "minf"));
            let stbl = boxes(find(&minf, "stbl"));
            let stco = find(&stbl, "stco");
            assert_eq!(u32::from_be_bytes(stco[4..8].try_into().unwrap()), 1);
            let offset = u32::from_be_bytes(stco[8..12].try_into().unwrap()) as usize;
            assert_eq!(Some(offset), payload_start, "stco offset at {target}");
        }
    }

    #[test]
    fn mdat_pads_with_zeros() {
        let out = collect(FormatKind::Mp4, 8192);
        let top = boxes(&out);
        let mdat = find(&top, "mdat");
        assert_eq!(&mdat[..H264_FRAME.len()], &H264_FRAME);
        assert!(mdat[H264_FRAME.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn degrades_to_a_header_prefix() {
        let out = collect(FormatKind::Mp4, 16);
        assert_eq!(&out[4..8], b"ftyp");
        let full = collect(FormatKind::Mp4, min_size());
        assert_eq!(out, full[..16]);
    }

    #[test]
    fn skeleton_is_identical_across_runs() {
        let a = collect(FormatKind::Mp4, 2048);
        let b = collect(FormatKind::Mp4, 2048);
        assert_eq!(a, b);
    }
}
