//! Capability precheck for the host environment.

use crate::{Error, Result};

/// Verifies that generation sessions can run here at all.
///
/// The only capability that can genuinely be absent in a Rust process is a
/// background execution context: sessions are spawned onto the ambient
/// Tokio runtime, so calling [`GeneratorHost::spawn`] outside of one would
/// panic. Collaborators invoke this once before the first request and treat
/// a failure as terminal — no generation is attempted.
///
/// [`GeneratorHost::spawn`]: crate::GeneratorHost::spawn
pub fn precheck() -> Result<()> {
    tokio::runtime::Handle::try_current()
        .map(|_| ())
        .map_err(|_| Error::EnvironmentUnsupported {
            missing: "a Tokio runtime context for background execution".to_string(),
        })
}
