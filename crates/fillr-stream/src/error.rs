//! Error types for the generation pipeline and its host.
//!
//! Request validation failures wrap [`fillr::Error`] and surface
//! synchronously, before any background work begins. Everything else is
//! asynchronous: it arrives as a [`SessionEvent::Error`] and terminates the
//! session.
//!
//! [`SessionEvent::Error`]: crate::SessionEvent::Error

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for generation sessions.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// The request failed validation before a session started.
    #[error(transparent)]
    Size(#[from] fillr::Error),

    /// The session was cancelled cooperatively. Distinct from completion,
    /// but not an application failure.
    #[error("Generation was aborted")]
    Aborted,

    /// An encoder raised an unexpected fault mid-production.
    #[error("Generation failed: {source}")]
    Generation { source: fillr::Error },

    /// The downstream sink rejected or failed to accept a chunk.
    #[error("Sink write failed: {context}")]
    SinkWrite { context: String },

    /// Internal channel send/receive failure (e.g. the event receiver was
    /// dropped mid-session).
    #[error("Channel error: {context}")]
    Channel { context: String },

    /// The host refused the command because it is shutting down.
    #[error("Host is shutting down")]
    HostShutdown,

    /// A required platform capability is missing; detected at precheck.
    #[error("Environment unsupported: {missing}")]
    EnvironmentUnsupported { missing: String },
}
