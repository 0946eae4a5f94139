//! JSON: a flat object of sequentially keyed integer values.
//!
//! Keys cycle through a base-26 letter scheme (`a`..`z`, `a1`..`z1`, ...),
//! each holding its own index. Once no further whole pair fits, the gap
//! before the closing brace is padded with ASCII spaces, which keeps the
//! document syntactically valid at any byte position the target lands on.

use bytes::Bytes;

use super::{degraded_prefix, ChunkIter, FormatEncoder, CHUNK_SIZE};
use crate::{FormatKind, Result};

/// `{}` is the smallest fully valid instance.
pub(crate) const MIN_SIZE: u64 = 2;

fn key(id: u64) -> String {
    let letter = (b'a' + (id % 26) as u8) as char;
    match id / 26 {
        0 => letter.to_string(),
        n => format!("{letter}{n}"),
    }
}

fn pair(id: u64) -> String {
    let key = key(id);
    if id == 0 {
        format!("\"{key}\":{id}")
    } else {
        format!(",\"{key}\":{id}")
    }
}

pub struct JsonEncoder;

impl FormatEncoder for JsonEncoder {
    fn kind(&self) -> FormatKind {
        FormatKind::Json
    }

    fn produce(&self, target: u64) -> ChunkIter {
        if target <= MIN_SIZE {
            return degraded_prefix(b"{}".to_vec(), target, false);
        }
        Box::new(JsonChunks {
            target,
            produced: 0,
            next_id: 0,
            stage: Stage::Open,
        })
    }
}

enum Stage {
    Open,
    Pairs,
    Close,
    Done,
}

struct JsonChunks {
    target: u64,
    produced: u64,
    next_id: u64,
    stage: Stage,
}

impl Iterator for JsonChunks {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.stage {
            Stage::Open => {
                self.stage = Stage::Pairs;
                self.produced = 1;
                Some(Ok(Bytes::from_static(b"{")))
            }
            Stage::Pairs => {
                let mut buf = String::new();
                loop {
                    let pair = pair(self.next_id);
                    // Stop once the pair plus the closing brace no longer fits.
                    if self.produced + (buf.len() + pair.len()) as u64 + 1 > self.target {
                        self.stage = Stage::Close;
                        break;
                    }
                    if !buf.is_empty() && buf.len() + pair.len() > CHUNK_SIZE {
                        break;
                    }
                    buf.push_str(&pair);
                    self.next_id += 1;
                }
                if buf.is_empty() {
                    return self.next();
                }
                self.produced += buf.len() as u64;
                Some(Ok(Bytes::from(buf.into_bytes())))
            }
            Stage::Close => {
                self.stage = Stage::Done;
                let padding = (self.target - self.produced - 1) as usize;
                let mut buf = vec![b' '; padding + 1];
                buf[padding] = b'}';
                Some(Ok(Bytes::from(buf)))
            }
            Stage::Done => None,
        }
    }
}
