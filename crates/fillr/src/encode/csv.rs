//! CSV: fixed header plus deterministic per-row records.
//!
//! Row `i` is a pure function of the row index, so two runs produce
//! identical output. The final row is truncated mid-field when needed to
//! land exactly on the target.

use bytes::Bytes;

use super::{degraded_prefix, ChunkIter, FormatEncoder, CHUNK_SIZE};
use crate::{FormatKind, Result};

pub(crate) const HEADER: &str = "ID,Name,Email,Phone,Address,City,Country\n";

/// A header-only file is the smallest fully valid instance.
pub(crate) const MIN_SIZE: u64 = HEADER.len() as u64;

pub(crate) fn row(id: u64) -> String {
    let country = if id % 2 == 0 { "USA" } else { "Canada" };
    format!(
        "{id},User{id:04},user{id}@example.com,555-{phone:04},{id} Main Street,City{city},{country}\n",
        phone = id % 10_000,
        city = id % 100,
    )
}

pub struct CsvEncoder;

impl FormatEncoder for CsvEncoder {
    fn kind(&self) -> FormatKind {
        FormatKind::Csv
    }

    fn produce(&self, target: u64) -> ChunkIter {
        if target <= MIN_SIZE {
            return degraded_prefix(HEADER.as_bytes().to_vec(), target, false);
        }
        Box::new(CsvChunks {
            remaining: target,
            next_id: 1,
            header_pending: true,
        })
    }
}

struct CsvChunks {
    /// Bytes still to emit, header included.
    remaining: u64,
    next_id: u64,
    header_pending: bool,
}

impl Iterator for CsvChunks {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.header_pending {
            self.header_pending = false;
            self.remaining -= HEADER.len() as u64;
            return Some(Ok(Bytes::from_static(HEADER.as_bytes())));
        }
        if self.remaining == 0 {
            return None;
        }

        let mut buf = String::with_capacity(CHUNK_SIZE.min(self.remaining as usize + 1));
        while self.remaining > 0 {
            let record = row(self.next_id);
            // The final row truncates mid-field to land exactly on target.
            let take = (record.len() as u64).min(self.remaining) as usize;
            if !buf.is_empty() && buf.len() + take > CHUNK_SIZE {
                break;
            }
            self.next_id += 1;
            buf.push_str(&record[..take]);
            self.remaining -= take as u64;
        }
        Some(Ok(Bytes::from(buf.into_bytes())))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{assert_exact_sizes, collect};
    use super::*;
    use crate::FormatKind;

    #[test]
    fn sums_exactly() {
        assert_exact_sizes(FormatKind::Csv);
    }

    #[test]
    fn starts_with_the_fixed_header() {
        let out = collect(FormatKind::Csv, 4096);
        assert!(out.starts_with(HEADER.as_bytes()));

        // A target inside the header yields a truncated header.
        let out = collect(FormatKind::Csv, 10);
        assert_eq!(out, HEADER.as_bytes()[..10]);
    }

    #[test]
    fn rows_follow_the_deterministic_formula() {
        assert_eq!(
            row(1),
            "1,User0001,user1@example.com,555-0001,1 Main Street,City1,Canada\n"
        );
        assert_eq!(
            row(2),
            "2,User0002,user2@example.com,555-0002,2 Main Street,City2,USA\n"
        );
        assert_eq!(
            row(12_345),
            "12345,User12345,user12345@example.com,555-2345,12345 Main Street,City45,Canada\n"
        );

        let out = collect(FormatKind::Csv, 64 * 1024);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        assert_eq!(lines[0], HEADER);
        // Every non-final line matches its row formula.
        for (i, line) in lines[1..lines.len() - 1].iter().enumerate() {
            assert_eq!(*line, row(i as u64 + 1));
        }
    }

    #[test]
    fn output_is_identical_across_runs() {
        let a = collect(FormatKind::Csv, 100_000);
        let b = collect(FormatKind::Csv, 100_000);
        assert_eq!(a, b);
    }
}
