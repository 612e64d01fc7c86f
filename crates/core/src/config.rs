//! Session configuration.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Line ending appended after each command that produced output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// `\n`.
    #[default]
    Lf,
    /// `\r\n`.
    Crlf,
}

impl LineEnding {
    /// The bytes written.
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            LineEnding::Lf => b"\n",
            LineEnding::Crlf => b"\r\n",
        }
    }
}

/// Buffer sizes and output format of one [`Context`](crate::Context).
///
/// Defaults:
/// - `input_capacity`: 256 bytes (the longest single message accepted)
/// - `output_capacity`: 4096 bytes (response bytes per message)
/// - `error_queue_capacity`: 17 entries
/// - `line_ending`: `\n`
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Maximum number of buffered, not yet dispatched input bytes.
    pub input_capacity: usize,
    /// Maximum number of response bytes held between flushes.
    pub output_capacity: usize,
    /// Maximum number of queued errors, overflow sentinel included.
    pub error_queue_capacity: usize,
    /// Response line ending.
    pub line_ending: LineEnding,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_capacity: 256,
            output_capacity: 4096,
            error_queue_capacity: 17,
            line_ending: LineEnding::Lf,
        }
    }
}

impl Config {
    /// Reject configurations no session can run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        let zero = [
            ("input_capacity", self.input_capacity),
            ("output_capacity", self.output_capacity),
            ("error_queue_capacity", self.error_queue_capacity),
        ]
        .into_iter()
        .find(|&(_, value)| value == 0);
        match zero {
            Some((field, _)) => Err(EngineError::InvalidConfig {
                field,
                reason: "must be greater than zero".to_string(),
            }),
            None => Ok(()),
        }
    }
}
