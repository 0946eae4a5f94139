#![doc = include_str!("../README.md")]

mod config;
mod telemetry;

use anyhow::Context;
use clap::Parser;
use config::{CliArgs, Config};
use fillr::format_bytes;
use fillr_stream::{environment, Error, GeneratorHost, SessionEvent};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::signal;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

// mimalloc keeps large-buffer churn cheap, especially on musl.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    telemetry::init_telemetry();

    let config = Config::try_from(args)?;
    environment::precheck()?;

    if config.request.below_minimum() {
        tracing::warn!(
            "{} bytes is below the {} structural minimum of {} bytes; emitting a degraded header prefix",
            config.request.total_bytes(),
            config.request.kind(),
            config.request.kind().min_size(),
        );
    }

    tracing::info!(
        "generating {} ({}) -> {}",
        format_bytes(config.request.total_bytes()),
        config.request.kind(),
        config.output.display(),
    );

    run(config).await
}

async fn run(config: Config) -> anyhow::Result<()> {
    let host = GeneratorHost::spawn();
    let events = host.generate(config.request, config.buffer).await?;
    let mut events = ReceiverStream::new(events);

    let mut file = File::create(&config.output)
        .await
        .with_context(|| format!("cannot create {}", config.output.display()))?;

    let mut next_report = 0.1f64;
    let mut outcome: Result<u64, Error> = Err(Error::Channel {
        context: "session ended without a terminal event".to_string(),
    });

    loop {
        tokio::select! {
            signalled = signal::ctrl_c() => {
                signalled.context("failed to install the Ctrl-C handler")?;
                tracing::info!("cancellation requested; stopping at the next chunk boundary");
                // Keep draining: the session terminates with an Aborted event.
                host.cancel().await.ok();
            }
            event = events.next() => match event {
                None => break,
                Some(SessionEvent::Chunk(chunk)) => {
                    if let Err(e) = file.write_all(&chunk).await {
                        host.cancel().await.ok();
                        discard(file, &config).await;
                        host.shutdown().await.ok();
                        return Err(e).context("write to the output file failed");
                    }
                }
                Some(SessionEvent::Progress(progress)) => {
                    if progress.fraction() >= next_report {
                        next_report = (progress.fraction() + 0.1).min(1.0);
                        tracing::info!(
                            "progress: {:>3.0}% ({} / {})",
                            progress.fraction() * 100.0,
                            format_bytes(progress.bytes_produced),
                            format_bytes(progress.total_bytes),
                        );
                    }
                }
                Some(SessionEvent::Complete { total_bytes }) => {
                    outcome = Ok(total_bytes);
                    break;
                }
                Some(SessionEvent::Error(error)) => {
                    outcome = Err(error);
                    break;
                }
            }
        }
    }

    match outcome {
        Ok(total_bytes) => {
            file.flush().await.context("flush failed")?;
            tracing::info!(
                "wrote {} ({} bytes) to {}",
                format_bytes(total_bytes),
                total_bytes,
                config.output.display(),
            );
            host.shutdown().await.ok();
            Ok(())
        }
        Err(Error::Aborted) => {
            discard(file, &config).await;
            tracing::info!("generation cancelled; partial output removed");
            host.shutdown().await.ok();
            Ok(())
        }
        Err(error) => {
            discard(file, &config).await;
            host.shutdown().await.ok();
            Err(error).context("generation failed")
        }
    }
}

/// Partial output is never left behind: the sink side owns disposal.
async fn discard(file: File, config: &Config) {
    drop(file);
    if let Err(e) = tokio::fs::remove_file(&config.output).await {
        tracing::warn!("could not remove partial {}: {e}", config.output.display());
    }
}
