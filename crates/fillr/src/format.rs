//! The format registry.
//!
//! [`FormatKind`] is a closed enumeration of the seven supported container
//! formats. Each variant carries its MIME type, file extension, structural
//! minimum byte count, and the encoder that produces it. Adding a format
//! means adding one variant and one [`FormatEncoder`] implementation; there
//! is no string-keyed dispatcher to extend.

use core::fmt;
use core::str::FromStr;

use crate::encode::{self, FormatEncoder};
use crate::Error;

/// The seven supported output container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    PlainText,
    Csv,
    Json,
    Png,
    Pdf,
    Mp3,
    Mp4,
}

impl FormatKind {
    /// Every variant, in registry order.
    pub const ALL: [FormatKind; 7] = [
        FormatKind::PlainText,
        FormatKind::Csv,
        FormatKind::Json,
        FormatKind::Png,
        FormatKind::Pdf,
        FormatKind::Mp3,
        FormatKind::Mp4,
    ];

    /// MIME type served alongside the artifact.
    pub const fn mime(&self) -> &'static str {
        match self {
            FormatKind::PlainText => "text/plain;charset=utf-8",
            FormatKind::Csv => "text/csv",
            FormatKind::Json => "application/json",
            FormatKind::Png => "image/png",
            FormatKind::Pdf => "application/pdf",
            FormatKind::Mp3 => "audio/mpeg",
            FormatKind::Mp4 => "video/mp4",
        }
    }

    /// File extension, which doubles as the external format token.
    pub const fn extension(&self) -> &'static str {
        match self {
            FormatKind::PlainText => "txt",
            FormatKind::Csv => "csv",
            FormatKind::Json => "json",
            FormatKind::Png => "png",
            FormatKind::Pdf => "pdf",
            FormatKind::Mp3 => "mp3",
            FormatKind::Mp4 => "mp4",
        }
    }

    /// Structural minimum: the smallest target for which the encoder can
    /// emit a fully valid instance. Below it the encoder emits a truncated
    /// header prefix (see [`FormatEncoder`]).
    pub fn min_size(&self) -> u64 {
        match self {
            FormatKind::PlainText => 0,
            FormatKind::Csv => encode::csv::MIN_SIZE,
            FormatKind::Json => encode::json::MIN_SIZE,
            FormatKind::Png => encode::png::MIN_SIZE,
            FormatKind::Pdf => encode::pdf::MIN_SIZE,
            FormatKind::Mp3 => encode::mp3::MIN_SIZE,
            FormatKind::Mp4 => encode::mp4::min_size(),
        }
    }

    /// The encoder for this variant: the closed dispatch table.
    pub fn encoder(&self) -> &'static dyn FormatEncoder {
        match self {
            FormatKind::PlainText => &encode::text::PlainTextEncoder,
            FormatKind::Csv => &encode::csv::CsvEncoder,
            FormatKind::Json => &encode::json::JsonEncoder,
            FormatKind::Png => &encode::png::PngEncoder,
            FormatKind::Pdf => &encode::pdf::PdfEncoder,
            FormatKind::Mp3 => &encode::mp3::Mp3Encoder,
            FormatKind::Mp4 => &encode::mp4::Mp4Encoder,
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for FormatKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "txt" => Ok(FormatKind::PlainText),
            "csv" => Ok(FormatKind::Csv),
            "json" => Ok(FormatKind::Json),
            "png" => Ok(FormatKind::Png),
            "pdf" => Ok(FormatKind::Pdf),
            "mp3" => Ok(FormatKind::Mp3),
            "mp4" => Ok(FormatKind::Mp4),
            _ => Err(Error::UnsupportedFormat {
                token: s.to_string(),
            }),
        }
    }
}

/// Suggested artifact filename: `fillr-<FORMAT>-<size>bytes[-<ts>].<ext>`.
///
/// The timestamp (milliseconds) is supplied by the caller so that the engine
/// stays deterministic; passing `None` omits it.
pub fn suggested_filename(kind: FormatKind, size: u64, timestamp_millis: Option<u64>) -> String {
    let ext = kind.extension();
    let tag = ext.to_ascii_uppercase();
    match timestamp_millis {
        Some(ts) => format!("fillr-{tag}-{size}bytes-{ts}.{ext}"),
        None => format!("fillr-{tag}-{size}bytes.{ext}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_consistent() {
        for kind in FormatKind::ALL {
            assert!(!kind.mime().is_empty());
            assert!(!kind.extension().is_empty());
            assert_eq!(kind.encoder().kind(), kind);
        }
    }

    #[test]
    fn parses_format_tokens() {
        assert_eq!("txt".parse::<FormatKind>().unwrap(), FormatKind::PlainText);
        assert_eq!("PNG".parse::<FormatKind>().unwrap(), FormatKind::Png);
        assert_eq!("Mp4".parse::<FormatKind>().unwrap(), FormatKind::Mp4);
        assert!(matches!(
            "wav".parse::<FormatKind>(),
            Err(Error::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn known_structural_minimums() {
        assert_eq!(FormatKind::PlainText.min_size(), 0);
        assert_eq!(FormatKind::Json.min_size(), 2);
        assert_eq!(FormatKind::Png.min_size(), 67);
        assert!(FormatKind::Mp4.min_size() > 0);
    }

    #[test]
    fn suggested_filenames() {
        assert_eq!(
            suggested_filename(FormatKind::Png, 1024, None),
            "fillr-PNG-1024bytes.png"
        );
        assert_eq!(
            suggested_filename(FormatKind::PlainText, 5, Some(1700000000000)),
            "fillr-TXT-5bytes-1700000000000.txt"
        );
    }
}
