//! Engine-level error type.

use scpi_engine_tables::InitError;

/// Failures surfaced to the host, as opposed to SCPI errors, which are
/// queued and read back with `SYSTem:ERRor?`.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A single message outgrew the input buffer. A `-363` entry has been
    /// queued and the buffered bytes dropped.
    #[error("input buffer overrun: message exceeds {capacity} bytes")]
    BufferOverflow {
        /// Configured input capacity.
        capacity: usize,
    },

    /// Input was refused because an earlier overrun has not been cleared
    /// with [`Context::reset`](crate::Context::reset).
    #[error("input refused until the session is reset")]
    ResetRequired,

    /// A configuration value is unusable.
    #[error("invalid configuration: {field} {reason}")]
    InvalidConfig {
        /// The offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The command table could not be built.
    #[error("command table initialization failed")]
    Init(#[from] InitError),
}
