//! Error reporting for the SCPI engine.
//!
//! Provides [`ErrorEntry`] (a signed SCPI error code plus its message), the
//! bounded [`ErrorQueue`](queue::ErrorQueue) serviced by `SYSTem:ERRor?`,
//! and the [`Span`]/[`LineIndex`] helpers used to point at source bytes.
//! Standard error codes are defined in the [`codes`] module.

#![warn(missing_docs)]

/// Error code constants auto-generated from `data/errors.jsonc`.
pub mod codes;
/// Fixed-capacity error FIFO with overflow collapse.
pub mod queue;

pub use queue::ErrorQueue;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

// ── LineIndex ────────────────────────────────────────────────────────────

/// Maps byte offsets in a command script to line and column positions.
///
/// Lines and columns are **0-indexed**. Built in O(n); lookups are
/// O(log n) via binary search.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the start of each line. `line_starts[0]` is always 0.
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Build a `LineIndex` from raw input bytes.
    pub fn new(bytes: &[u8]) -> Self {
        let mut line_starts = vec![0usize];
        line_starts.extend(
            bytes
                .iter()
                .enumerate()
                .filter(|&(_, &b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { line_starts }
    }

    /// Convert a byte offset to a 0-indexed `(line, column)` pair.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next.saturating_sub(1),
        };
        (line, offset.saturating_sub(self.line_starts[line]))
    }

    /// Byte span of the given 0-indexed line, newline included.
    ///
    /// `total_len` is the length of the indexed input. Returns `None` if
    /// `line` is out of bounds.
    pub fn line_span(&self, line: usize, total_len: usize) -> Option<Span> {
        let start = *self.line_starts.get(line)?;
        let end = self
            .line_starts
            .get(line + 1)
            .copied()
            .unwrap_or(total_len);
        Some(Span::new(start, end.max(start)))
    }

    /// Total number of lines (at least 1).
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

// ── Span ─────────────────────────────────────────────────────────────────

/// Byte span `[start, end)` in an input buffer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Span {
    /// Byte offset of the first byte.
    pub start: usize,
    /// Byte offset one past the last byte.
    pub end: usize,
}

impl Span {
    /// Create a span covering `[start, end)`.
    ///
    /// Panics if `end < start`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(end >= start, "Span end ({end}) < start ({start})");
        Self { start, end }
    }

    /// Create a zero-width span at the given position.
    pub fn empty(pos: usize) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }

    /// Number of bytes covered.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the span covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The covered bytes of `buf`.
    pub fn slice<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.start..self.end]
    }

    /// Shift the span right by `offset` bytes.
    pub fn offset(self, offset: usize) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
        }
    }
}

// ── ErrorClass ───────────────────────────────────────────────────────────

/// SCPI error class, derived from the code range.
///
/// The class decides which standard event status bit an error sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum ErrorClass {
    /// Code `0`.
    None,
    /// `-100..=-199`: grammar violations.
    Command,
    /// `-200..=-299`: valid command that could not be executed.
    Execution,
    /// `-300..=-399` and all positive codes.
    DeviceSpecific,
    /// `-400..=-499`: output queue protocol violations.
    Query,
    /// `-500..=-599`.
    PowerOn,
    /// `-600..=-699`.
    UserRequest,
    /// `-700..=-799`.
    RequestControl,
    /// `-800..=-899`.
    OperationComplete,
}

impl ErrorClass {
    /// Classify a signed SCPI error code.
    pub fn of(code: i16) -> Self {
        match code {
            0 => ErrorClass::None,
            1.. => ErrorClass::DeviceSpecific,
            -199..=-100 => ErrorClass::Command,
            -299..=-200 => ErrorClass::Execution,
            -399..=-300 => ErrorClass::DeviceSpecific,
            -499..=-400 => ErrorClass::Query,
            -599..=-500 => ErrorClass::PowerOn,
            -699..=-600 => ErrorClass::UserRequest,
            -799..=-700 => ErrorClass::RequestControl,
            -899..=-800 => ErrorClass::OperationComplete,
            _ => ErrorClass::DeviceSpecific,
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::None => write!(f, "none"),
            ErrorClass::Command => write!(f, "command"),
            ErrorClass::Execution => write!(f, "execution"),
            ErrorClass::DeviceSpecific => write!(f, "device-specific"),
            ErrorClass::Query => write!(f, "query"),
            ErrorClass::PowerOn => write!(f, "power-on"),
            ErrorClass::UserRequest => write!(f, "user-request"),
            ErrorClass::RequestControl => write!(f, "request-control"),
            ErrorClass::OperationComplete => write!(f, "operation-complete"),
        }
    }
}

// ── ErrorEntry ───────────────────────────────────────────────────────────

/// One entry of the SCPI error queue: a signed code and short message.
///
/// Displays in `SYSTem:ERRor?` response form, e.g. `-113,"Undefined header"`.
/// Handlers return it as their error type, so it also implements
/// [`std::error::Error`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code},\"{message}\"")]
pub struct ErrorEntry {
    /// Signed SCPI error code (negative: standard, positive: device-defined).
    pub code: i16,
    /// Human-readable message.
    pub message: Cow<'static, str>,
}

impl ErrorEntry {
    /// Create an entry with an explicit message.
    pub fn new(code: i16, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create an entry for a code, using its canonical message.
    ///
    /// Unknown codes fall back to the message of their class's generic code
    /// (e.g. `-219` → `"Execution error"`).
    pub fn from_code(code: i16) -> Self {
        let message = codes::message(code).unwrap_or_else(|| {
            let generic = match ErrorClass::of(code) {
                ErrorClass::Command => codes::COMMAND_ERROR,
                ErrorClass::Execution => codes::EXECUTION_ERROR,
                ErrorClass::Query => codes::QUERY_ERROR,
                _ => codes::DEVICE_SPECIFIC_ERROR,
            };
            codes::message(generic).unwrap_or("Unknown error")
        });
        Self::new(code, message)
    }

    /// The "no error" sentinel returned when popping an empty queue.
    pub fn no_error() -> Self {
        Self::from_code(codes::NO_ERROR)
    }

    /// The sentinel that replaces the newest entry of an overflowing queue.
    pub fn queue_overflow() -> Self {
        Self::from_code(codes::QUEUE_OVERFLOW)
    }

    /// Whether this is the "no error" sentinel.
    pub fn is_no_error(&self) -> bool {
        self.code == codes::NO_ERROR
    }

    /// The class of this entry's code.
    pub fn class(&self) -> ErrorClass {
        ErrorClass::of(self.code)
    }

    /// Returns the long-form explanation for this entry's code, if available.
    pub fn explain(&self) -> Option<&'static str> {
        explain(self.code)
    }
}

impl From<i16> for ErrorEntry {
    fn from(code: i16) -> Self {
        Self::from_code(code)
    }
}

/// Returns the long-form explanation for an error code, if known.
///
/// Auto-generated from `data/errors.jsonc` at build time.
pub fn explain(code: i16) -> Option<&'static str> {
    include!(concat!(env!("OUT_DIR"), "/generated_explain.rs"))
}
