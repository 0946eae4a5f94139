//! Single-session execution host.
//!
//! ## Responsibilities
//!
//! - Run generation sessions on a background task, one at a time.
//! - Expose a message-passing boundary: generate / cancel / shutdown in,
//!   chunk / progress / complete / error out. No shared state crosses it.
//! - Enforce last-request-wins: a new generate cancels the in-flight
//!   session and waits for it to retire before starting.
//! - Shut down gracefully, acknowledging over a one-shot channel.

use core::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::sink::EventSink;
use crate::{
    ChunkPipeline, Error, GenerationRequest, HostCommand, Result, SessionEvent, SessionOutcome,
};

/// Command-channel depth. Commands are tiny and the loop drains fast; this
/// only smooths over bursts of cancel/generate pairs.
const COMMAND_BUFFER: usize = 8;

/// Handle to a spawned generation host.
///
/// Cloning hands out another requester for the same host; the loop exits
/// once a shutdown is acknowledged or every handle is dropped.
#[derive(Clone)]
pub struct GeneratorHost {
    commands: mpsc::Sender<HostCommand>,
}

impl GeneratorHost {
    /// Spawns the host loop on the current Tokio runtime.
    pub fn spawn() -> Self {
        let (commands, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(host_loop(rx));
        Self { commands }
    }

    /// Starts a session and returns its event receiver.
    ///
    /// `buffer` is the event-channel capacity, i.e. how many chunks may sit
    /// between producer and consumer before backpressure stalls production.
    ///
    /// If a session is already running it is cancelled first; its channel
    /// terminates with [`Error::Aborted`] and the new session gets a fresh
    /// one. Session events arrive strictly in production order, ending with
    /// exactly one `Complete` or `Error`.
    pub async fn generate(
        &self,
        request: GenerationRequest,
        buffer: usize,
    ) -> Result<mpsc::Receiver<SessionEvent>> {
        let (events, receiver) = mpsc::channel(buffer.max(1));
        self.commands
            .send(HostCommand::Generate { request, events })
            .await
            .map_err(|_| Error::HostShutdown)?;
        Ok(receiver)
    }

    /// Requests cancellation of the current session. Idempotent when none
    /// is running.
    pub async fn cancel(&self) -> Result<()> {
        self.commands
            .send(HostCommand::Cancel)
            .await
            .map_err(|_| Error::HostShutdown)
    }

    /// Gracefully shuts the host down, waiting for the acknowledgement.
    ///
    /// The active session (if any) is cancelled and awaited first.
    pub async fn shutdown(self) -> Result<()> {
        let (ack, acked) = oneshot::channel();
        self.commands
            .send(HostCommand::Shutdown { ack })
            .await
            .map_err(|_| Error::HostShutdown)?;
        acked.await.map_err(|_| Error::Channel {
            context: "host exited without acknowledging shutdown".to_string(),
        })
    }
}

struct ActiveSession {
    token: CancellationToken,
    task: JoinHandle<()>,
}

async fn host_loop(mut commands: mpsc::Receiver<HostCommand>) {
    #[cfg(feature = "tracing")]
    tracing::trace!("generator host started");

    let mut active: Option<ActiveSession> = None;

    while let Some(command) = commands.recv().await {
        match command {
            HostCommand::Generate { request, events } => {
                // Last-request-wins: retire the in-flight session before
                // starting the next so at most one pipeline runs.
                retire(&mut active).await;

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    format = %request.kind(),
                    bytes = request.total_bytes(),
                    "starting session"
                );

                let token = CancellationToken::new();
                let task = tokio::spawn(run_session(request, events, token.clone()));
                active = Some(ActiveSession { token, task });
            }
            HostCommand::Cancel => {
                if let Some(session) = &active {
                    session.token.cancel();
                }
            }
            HostCommand::Shutdown { ack } => {
                retire(&mut active).await;
                let _ = ack.send(());
                break;
            }
        }
    }

    // Handles dropped without an explicit shutdown land here too.
    retire(&mut active).await;

    #[cfg(feature = "tracing")]
    tracing::trace!("generator host stopped");
}

/// How long a retiring session may take to acknowledge its cancellation
/// before it is torn down outright.
const RETIRE_TIMEOUT: Duration = Duration::from_secs(3);

/// Cancels and awaits the active session, if any. Normally bounded by one
/// chunk's production time; a consumer that holds its receiver hostage is
/// cut off after [`RETIRE_TIMEOUT`].
async fn retire(active: &mut Option<ActiveSession>) {
    if let Some(session) = active.take() {
        session.token.cancel();
        let mut task = session.task;
        match tokio::time::timeout(RETIRE_TIMEOUT, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(_e)) => {
                #[cfg(feature = "tracing")]
                tracing::error!("session task panicked: {_e}");
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("session retirement timed out; tearing the task down");
                task.abort();
            }
        }
    }
}

/// One session: pipeline run plus the terminal event.
async fn run_session(
    request: GenerationRequest,
    events: mpsc::Sender<SessionEvent>,
    cancel: CancellationToken,
) {
    let sink = EventSink::new(events.clone(), cancel.clone());
    let (outcome, _sink) = ChunkPipeline::new(sink).run(&request, &cancel).await;

    let terminal = match outcome {
        SessionOutcome::Completed { total_bytes } => SessionEvent::Complete { total_bytes },
        SessionOutcome::Cancelled => SessionEvent::Error(Error::Aborted),
        SessionOutcome::Failed(error) => SessionEvent::Error(error),
    };

    // Best effort: a dropped receiver resolves immediately through
    // `closed()`, and a consumer that stopped draining cannot hold the
    // session open past the delivery timeout.
    let delivery = async {
        tokio::select! {
            sent = events.send(terminal) => {
                if let Err(_e) = sent {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("consumer gone before the terminal event");
                }
            }
            () = events.closed() => {}
        }
    };
    let _ = tokio::time::timeout(RETIRE_TIMEOUT, delivery).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use fillr::FormatKind;
    use tokio_stream::wrappers::ReceiverStream;
    use tokio_stream::StreamExt;

    fn request(kind: FormatKind, bytes: u64) -> GenerationRequest {
        GenerationRequest::new(kind, bytes).unwrap()
    }

    async fn drain(mut events: mpsc::Receiver<SessionEvent>) -> (Vec<u8>, Vec<SessionEvent>) {
        let mut bytes = Vec::new();
        let mut terminal = Vec::new();
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Chunk(chunk) => bytes.extend_from_slice(&chunk),
                SessionEvent::Progress(_) => {}
                other => terminal.push(other),
            }
        }
        (bytes, terminal)
    }

    #[tokio::test]
    async fn generates_to_completion() {
        let host = GeneratorHost::spawn();
        let events = host.generate(request(FormatKind::Json, 50_000), 8).await.unwrap();
        let (bytes, terminal) = drain(events).await;

        assert_eq!(bytes.len(), 50_000);
        assert!(matches!(
            terminal.as_slice(),
            [SessionEvent::Complete { total_bytes: 50_000 }]
        ));
        host.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn events_arrive_in_protocol_order() {
        let host = GeneratorHost::spawn();
        let events = host
            .generate(request(FormatKind::PlainText, 3 * 1024 * 1024), 4)
            .await
            .unwrap();

        let all: Vec<SessionEvent> = ReceiverStream::new(events).collect().await;
        let complete_at = all
            .iter()
            .position(|e| matches!(e, SessionEvent::Complete { .. }))
            .expect("complete event");
        // Nothing follows Complete.
        assert_eq!(complete_at, all.len() - 1);
        // Progress fractions never decrease.
        let fractions: Vec<f64> = all
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Progress(p) => Some(p.fraction()),
                _ => None,
            })
            .collect();
        assert!(!fractions.is_empty());
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));

        host.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn cancel_suppresses_completion() {
        let host = GeneratorHost::spawn();
        // A small buffer so the producer parks on backpressure quickly.
        let mut events = host
            .generate(request(FormatKind::PlainText, 64 * 1024 * 1024), 1)
            .await
            .unwrap();

        // Take a couple of chunks, then cancel mid-session.
        let mut taken = 0;
        while let Some(event) = events.recv().await {
            if matches!(event, SessionEvent::Chunk(_)) {
                taken += 1;
                if taken == 2 {
                    break;
                }
            }
        }
        host.cancel().await.unwrap();

        let (_, terminal) = drain(events).await;
        assert!(matches!(
            terminal.as_slice(),
            [SessionEvent::Error(Error::Aborted)]
        ));
        host.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn cancel_without_a_session_is_idempotent() {
        let host = GeneratorHost::spawn();
        host.cancel().await.unwrap();
        host.cancel().await.unwrap();

        // The host still serves requests afterwards.
        let events = host.generate(request(FormatKind::Csv, 1000), 8).await.unwrap();
        let (bytes, terminal) = drain(events).await;
        assert_eq!(bytes.len(), 1000);
        assert!(matches!(
            terminal.as_slice(),
            [SessionEvent::Complete { .. }]
        ));
        host.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn a_new_generate_cancels_the_running_session() {
        let host = GeneratorHost::spawn();
        let first = host
            .generate(request(FormatKind::PlainText, 64 * 1024 * 1024), 1)
            .await
            .unwrap();

        // Second request while the first is parked on backpressure.
        let second = host.generate(request(FormatKind::Json, 10_000), 8).await.unwrap();

        let (_, first_terminal) = drain(first).await;
        assert!(matches!(
            first_terminal.as_slice(),
            [] | [SessionEvent::Error(Error::Aborted)]
        ));

        let (bytes, terminal) = drain(second).await;
        assert_eq!(bytes.len(), 10_000);
        assert!(matches!(
            terminal.as_slice(),
            [SessionEvent::Complete { .. }]
        ));
        host.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn dropping_the_receiver_stops_production() {
        let host = GeneratorHost::spawn();
        let events = host
            .generate(request(FormatKind::PlainText, 64 * 1024 * 1024), 1)
            .await
            .unwrap();
        drop(events);

        // The next request proceeds normally; the host retired the orphan.
        let events = host.generate(request(FormatKind::Pdf, 2048), 8).await.unwrap();
        let (bytes, _) = drain(events).await;
        assert_eq!(bytes.len(), 2048);
        host.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_is_acknowledged_and_terminal() {
        let host = GeneratorHost::spawn();
        let handle = host.clone();
        host.shutdown().await.unwrap();

        assert!(matches!(
            handle.cancel().await,
            Err(Error::HostShutdown)
        ));
        assert!(matches!(
            handle.generate(request(FormatKind::Csv, 100), 8).await,
            Err(Error::HostShutdown)
        ));
    }

    #[tokio::test]
    async fn concurrent_hosts_are_independent() {
        let hosts: Vec<GeneratorHost> = (0..4).map(|_| GeneratorHost::spawn()).collect();
        let tasks = hosts.iter().map(|host| {
            let host = host.clone();
            async move {
                let events = host.generate(request(FormatKind::Mp3, 20_000), 8).await?;
                let (bytes, _) = drain(events).await;
                Ok::<usize, Error>(bytes.len())
            }
        });
        let sizes = futures::future::try_join_all(tasks).await.unwrap();
        assert!(sizes.iter().all(|&n| n == 20_000));
        for host in hosts {
            host.shutdown().await.unwrap();
        }
    }
}
