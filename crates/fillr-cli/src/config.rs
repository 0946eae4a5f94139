use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use clap::Parser;
use fillr::{suggested_filename, FormatKind, SizeResolver, DEFAULT_MAX_BYTES};
use fillr_stream::GenerationRequest;

/// Runtime configuration for the `fillr` binary.
///
/// All values are parsed from CLI arguments or environment variables. Size
/// resolution happens during [`Config`] construction, so every invalid
/// request is rejected before any generation work starts.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "fillr",
    version,
    about = "Generate a synthetic file of an exact byte size"
)]
pub struct CliArgs {
    /// Output container format: txt, csv, json, png, pdf, mp3 or mp4.
    ///
    /// Environment variable: `FILLR_FORMAT`
    #[arg(short, long, env = "FILLR_FORMAT")]
    pub format: String,

    /// Size value; fractional values are allowed ("0.5", "1.5").
    ///
    /// Environment variable: `FILLR_SIZE`
    #[arg(short, long, env = "FILLR_SIZE")]
    pub size: String,

    /// Size unit: B, KB, MB, GB, TB (decimal) or KiB, MiB, GiB, TiB
    /// (binary).
    ///
    /// Environment variable: `FILLR_UNIT`
    #[arg(short, long, env = "FILLR_UNIT", default_value = "MB")]
    pub unit: String,

    /// Output path. Defaults to a timestamped filename in the working
    /// directory: `fillr-<FORMAT>-<size>bytes-<ts>.<ext>`.
    ///
    /// Environment variable: `OUTPUT_PATH`
    #[arg(short, long, env = "OUTPUT_PATH")]
    pub output: Option<PathBuf>,

    /// Resolution ceiling in bytes.
    ///
    /// Environment variable: `MAX_FILE_BYTES`
    #[arg(long, env = "MAX_FILE_BYTES", default_value_t = DEFAULT_MAX_BYTES)]
    pub max_bytes: u64,

    /// Capacity of the event channel between the generation session and
    /// this process's file writer. Lower values increase backpressure
    /// responsiveness; higher values enable deeper pipelining.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 8)]
    pub buffer: usize,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub request: GenerationRequest,
    pub output: PathBuf,
    pub buffer: usize,
}

impl TryFrom<CliArgs> for Config {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let kind: FormatKind = args
            .format
            .parse()
            .with_context(|| format!("unrecognized --format {:?}", args.format))?;

        let resolver = SizeResolver::new(args.max_bytes);
        let bytes = resolver
            .resolve(&args.size, &args.unit)
            .with_context(|| format!("cannot resolve {} {}", args.size, args.unit))?;

        let request = GenerationRequest::new(kind, bytes)?;

        let output = args.output.unwrap_or_else(|| {
            let millis = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0);
            PathBuf::from(suggested_filename(kind, bytes, Some(millis)))
        });

        Ok(Self {
            request,
            output,
            buffer: args.buffer.max(1),
        })
    }
}
