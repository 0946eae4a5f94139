//! Drives one encoder's chunk sequence into a sink.
//!
//! ## Responsibilities
//!
//! - Pull chunks from the format encoder, lazily and in order.
//! - Forward each chunk to the sink and await acceptance (backpressure).
//! - Report progress at every chunk boundary, at least once per session.
//! - Observe the cancellation token at the suspension point between chunks.
//! - Reach exactly one terminal state: `Completed`, `Cancelled` or `Failed`.

use fillr::ChunkIter;
use tokio_util::sync::CancellationToken;

use crate::{ChunkSink, Error, GenerationRequest, Progress};

/// Terminal result of one pipeline session.
///
/// `Completed` is reported if and only if every emitted chunk was accepted
/// by the sink and the byte sum equals the target; it is never reported
/// after a cancellation was observed for the session.
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    Completed { total_bytes: u64 },
    Cancelled,
    Failed(Error),
}

/// Per-session accounting, exclusively owned by the running pipeline and
/// dropped at the terminal state.
#[derive(Debug, Clone, Copy)]
struct GenerationState {
    bytes_produced: u64,
    total_bytes: u64,
    cancelled: bool,
}

/// Runs one generation session to a terminal state.
///
/// A pipeline is single-use: a fresh request needs a fresh instance (the
/// chunk sequence is forward-only and not restartable).
pub struct ChunkPipeline<S> {
    sink: S,
}

impl<S: ChunkSink> ChunkPipeline<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Drives the encoder until completion, cancellation or failure, and
    /// hands the sink back for inspection or disposal by the caller.
    ///
    /// # Behavior
    ///
    /// - Between chunks the pipeline yields to the scheduler and checks
    ///   `cancel`; an in-flight chunk always completes first, so worst-case
    ///   cancellation latency is one chunk's production time.
    /// - On cancellation: the sink is aborted and already-delivered bytes
    ///   are not retracted.
    /// - On an encoder or sink error: the sink is aborted and the cause is
    ///   propagated in the outcome.
    pub async fn run(
        self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> (SessionOutcome, S) {
        let chunks = request.kind().encoder().produce(request.total_bytes());
        self.drive(request, cancel, chunks).await
    }

    async fn drive(
        mut self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
        mut chunks: ChunkIter,
    ) -> (SessionOutcome, S) {
        let mut state = GenerationState {
            bytes_produced: 0,
            total_bytes: request.total_bytes(),
            cancelled: false,
        };
        let mut progress_reports = 0u64;

        loop {
            // The suspension point between chunks.
            tokio::task::yield_now().await;
            if cancel.is_cancelled() {
                state.cancelled = true;
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    bytes = state.bytes_produced,
                    "cancellation observed at chunk boundary"
                );
                self.sink.abort().await;
                return (SessionOutcome::Cancelled, self.sink);
            }

            let Some(next) = chunks.next() else { break };
            let chunk = match next {
                Ok(chunk) => chunk,
                Err(source) => {
                    self.sink.abort().await;
                    return (
                        SessionOutcome::Failed(Error::Generation { source }),
                        self.sink,
                    );
                }
            };

            state.bytes_produced += chunk.len() as u64;
            if let Err(e) = self.sink.write(chunk).await {
                return self.write_failure(e, cancel).await;
            }

            let progress = Progress {
                bytes_produced: state.bytes_produced,
                total_bytes: state.total_bytes,
            };
            if let Err(e) = self.sink.progress(progress).await {
                return self.write_failure(e, cancel).await;
            }
            progress_reports += 1;
        }

        // The sequence is exhausted; a cancel that raced the final chunk
        // still wins over completion.
        if cancel.is_cancelled() {
            state.cancelled = true;
            self.sink.abort().await;
            return (SessionOutcome::Cancelled, self.sink);
        }

        if state.bytes_produced != state.total_bytes {
            let source = fillr::Error::Encode {
                context: format!(
                    "byte sum mismatch: produced {} of {}",
                    state.bytes_produced, state.total_bytes
                ),
            };
            self.sink.abort().await;
            return (
                SessionOutcome::Failed(Error::Generation { source }),
                self.sink,
            );
        }

        // Even a zero-chunk session reports progress once.
        if progress_reports == 0 {
            let progress = Progress {
                bytes_produced: state.bytes_produced,
                total_bytes: state.total_bytes,
            };
            if let Err(e) = self.sink.progress(progress).await {
                return self.write_failure(e, cancel).await;
            }
        }

        if let Err(e) = self.sink.close().await {
            return (SessionOutcome::Failed(e), self.sink);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(bytes = state.total_bytes, "session completed");
        debug_assert!(!state.cancelled);
        (
            SessionOutcome::Completed {
                total_bytes: state.total_bytes,
            },
            self.sink,
        )
    }

    /// A sink refusal during a cancellation race is a cancel, not a failure.
    async fn write_failure(
        mut self,
        error: Error,
        cancel: &CancellationToken,
    ) -> (SessionOutcome, S) {
        self.sink.abort().await;
        let outcome = if cancel.is_cancelled() {
            SessionOutcome::Cancelled
        } else {
            SessionOutcome::Failed(error)
        };
        (outcome, self.sink)
    }
}
