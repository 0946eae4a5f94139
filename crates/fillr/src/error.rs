//! Error types for size resolution and encoding.
//!
//! Everything here is reportable to the caller before or during a
//! generation session. Resolution errors (`InvalidValue`, `UnsupportedUnit`,
//! `InvalidSizeCalculation`, `SizeZero`, `SizeTooLarge`, `UnsupportedFormat`)
//! are synchronous and surface before any chunk is produced; `Encode` is the
//! only variant an encoder can raise mid-production.

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the encoding engine.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// The size input did not parse to a finite, non-negative number.
    #[error("Invalid size value: {input:?}")]
    InvalidValue { input: String },

    /// The unit token is not in the recognized decimal/binary set.
    #[error("Unsupported unit: {unit:?}")]
    UnsupportedUnit { unit: String },

    /// Unit multiplication produced a non-finite or negative result.
    #[error("Invalid size calculation result")]
    InvalidSizeCalculation,

    /// The resolved byte count is exactly zero.
    #[error("Size must be greater than 0")]
    SizeZero,

    /// The resolved byte count exceeds the configured maximum.
    #[error("Requested size {bytes} exceeds the maximum of {max} bytes")]
    SizeTooLarge { bytes: u64, max: u64 },

    /// The format token is not in the registry.
    #[error("Unsupported format: {token:?}")]
    UnsupportedFormat { token: String },

    /// An encoder hit a structural fault mid-production.
    #[error("Encoding fault: {context}")]
    Encode { context: String },
}
