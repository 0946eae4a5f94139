//! PDF: fixed object skeleton, comment-line padding, fixed trailer.
//!
//! The document proper (catalog, page tree, one empty page, xref table,
//! trailer) never changes; the gap between the xref table and the trailer is
//! filled by repeating a comment line, truncated wherever the byte budget
//! runs out. Comment bytes between objects are ignored by PDF readers.

use bytes::Bytes;

use super::{degraded_prefix, ChunkIter, FormatEncoder, CHUNK_SIZE};
use crate::{FormatKind, Result};

const HEADER: &str = "%PDF-1.4\n";

const BODY: &str = "1 0 obj\n<<\n/Type /Catalog\n/Pages 2 0 R\n>>\nendobj\n\
                    2 0 obj\n<<\n/Type /Pages\n/Kids [3 0 R]\n/Count 1\n>>\nendobj\n\
                    3 0 obj\n<<\n/Type /Page\n/Parent 2 0 R\n/MediaBox [0 0 612 792]\n>>\nendobj\n\
                    xref\n0 4\n\
                    0000000000 65535 f \n\
                    0000000010 00000 n \n\
                    0000000079 00000 n \n\
                    0000000126 00000 n \n";

const TRAILER: &str = "trailer\n<<\n/Size 4\n/Root 1 0 R\n>>\nstartxref\n194\n%%EOF\n";

const COMMENT: &str = "% Generated by Fillr\n";

pub(crate) const MIN_SIZE: u64 = (HEADER.len() + BODY.len() + TRAILER.len()) as u64;

pub struct PdfEncoder;

impl FormatEncoder for PdfEncoder {
    fn kind(&self) -> FormatKind {
        FormatKind::Pdf
    }

    fn produce(&self, target: u64) -> ChunkIter {
        if target < MIN_SIZE {
            let mut skeleton = Vec::with_capacity(MIN_SIZE as usize);
            skeleton.extend_from_slice(HEADER.as_bytes());
            skeleton.extend_from_slice(BODY.as_bytes());
            skeleton.extend_from_slice(TRAILER.as_bytes());
            return degraded_prefix(skeleton, target, false);
        }
        Box::new(PdfChunks {
            filler_left: target - MIN_SIZE,
            stage: Stage::Head,
        })
    }
}

enum Stage {
    Head,
    Filler { offset: usize },
    Trailer,
    Done,
}

struct PdfChunks {
    filler_left: u64,
    stage: Stage,
}

impl Iterator for PdfChunks {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.stage {
            Stage::Head => {
                self.stage = Stage::Filler { offset: 0 };
                let mut head = Vec::with_capacity(HEADER.len() + BODY.len());
                head.extend_from_slice(HEADER.as_bytes());
                head.extend_from_slice(BODY.as_bytes());
                Some(Ok(Bytes::from(head)))
            }
            Stage::Filler { offset } => {
                if self.filler_left == 0 {
                    self.stage = Stage::Trailer;
                    return self.next();
                }
                let len = self.filler_left.min(CHUNK_SIZE as u64) as usize;
                let comment = COMMENT.as_bytes();
                let mut buf = vec![0u8; len];
                for (i, b) in buf.iter_mut().enumerate() {
                    *b = comment[(offset + i) % comment.len()];
                }
                self.filler_left -= len as u64;
                self.stage = Stage::Filler {
                    offset: (offset + len) % comment.len(),
                };
                Some(Ok(Bytes::from(buf)))
            }
            Stage::Trailer => {
                self.stage = Stage::Done;
                Some(Ok(Bytes::from_static(TRAILER.as_bytes())))
            }
            Stage::Done => None,
        }
    }
}
