//! Response encoding.
//!
//! [`Response`] is the bounded output buffer of a session. Handlers append
//! typed results to it; results of one command are separated by `,` and the
//! command's output is closed with the configured line ending. Output that
//! would exceed the capacity fails with `-223 Too much data`, and the
//! dispatcher rolls the failed command's bytes back.

use std::fmt::{Display, LowerExp};

use scpi_engine_diagnostics::{ErrorEntry, codes};

use crate::config::LineEnding;

/// SCPI encoding of NaN.
pub const NAN_RESPONSE: &str = "9.91E+37";
/// SCPI encoding of positive infinity.
pub const INFINITY_RESPONSE: &str = "9.9E+37";
/// SCPI encoding of negative infinity.
pub const NEG_INFINITY_RESPONSE: &str = "-9.9E+37";

/// Radix for non-decimal integer responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    /// `#H` hexadecimal.
    Hex,
    /// `#Q` octal.
    Octal,
    /// `#B` binary.
    Binary,
}

/// Bounded response buffer.
#[derive(Debug, Clone)]
pub struct Response {
    buf: Vec<u8>,
    capacity: usize,
    line_ending: LineEnding,
    mark: usize,
    results: usize,
    overflowed: bool,
}

impl Response {
    /// Create an empty buffer holding at most `capacity` bytes.
    pub fn new(capacity: usize, line_ending: LineEnding) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            line_ending,
            mark: 0,
            results: 0,
            overflowed: false,
        }
    }

    /// Bytes accumulated so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Number of results the current command has produced.
    pub fn results(&self) -> usize {
        self.results
    }

    /// Append a signed integer.
    pub fn int(&mut self, value: impl Into<i64>) -> Result<(), ErrorEntry> {
        self.push(value.into().to_string().as_bytes())
    }

    /// Append an unsigned integer in decimal.
    pub fn uint(&mut self, value: u64) -> Result<(), ErrorEntry> {
        self.push(value.to_string().as_bytes())
    }

    /// Append an unsigned integer in `#H`/`#Q`/`#B` form.
    pub fn radix(&mut self, value: u64, radix: Radix) -> Result<(), ErrorEntry> {
        let text = match radix {
            Radix::Hex => format!("#H{value:X}"),
            Radix::Octal => format!("#Q{value:o}"),
            Radix::Binary => format!("#B{value:b}"),
        };
        self.push(text.as_bytes())
    }

    /// Append a double.
    pub fn double(&mut self, value: f64) -> Result<(), ErrorEntry> {
        let text = if value.is_nan() {
            NAN_RESPONSE.to_string()
        } else if value.is_infinite() {
            infinity(value.is_sign_positive()).to_string()
        } else {
            format_real(value)
        };
        self.push(text.as_bytes())
    }

    /// Append a float, formatted at single precision.
    pub fn float(&mut self, value: f32) -> Result<(), ErrorEntry> {
        let text = if value.is_nan() {
            NAN_RESPONSE.to_string()
        } else if value.is_infinite() {
            infinity(value.is_sign_positive()).to_string()
        } else {
            format_real(value)
        };
        self.push(text.as_bytes())
    }

    /// Append a boolean as `1` or `0`.
    pub fn bool(&mut self, value: bool) -> Result<(), ErrorEntry> {
        self.push(if value { b"1" } else { b"0" })
    }

    /// Append a double-quoted string, doubling embedded quotes.
    pub fn text(&mut self, value: &str) -> Result<(), ErrorEntry> {
        let mut quoted = String::with_capacity(value.len() + 2);
        quoted.push('"');
        for c in value.chars() {
            if c == '"' {
                quoted.push('"');
            }
            quoted.push(c);
        }
        quoted.push('"');
        self.push(quoted.as_bytes())
    }

    /// Append character data verbatim.
    pub fn mnemonic(&mut self, value: &str) -> Result<(), ErrorEntry> {
        self.push(value.as_bytes())
    }

    /// Append a definite-length arbitrary block.
    pub fn block(&mut self, data: &[u8]) -> Result<(), ErrorEntry> {
        let len = data.len().to_string();
        let mut encoded = format!("#{}{len}", len.len()).into_bytes();
        encoded.extend_from_slice(data);
        self.push(&encoded)
    }

    /// Append an error entry as `code,"message"`.
    pub fn error_entry(&mut self, entry: &ErrorEntry) -> Result<(), ErrorEntry> {
        self.int(entry.code)?;
        self.text(&entry.message)
    }

    /// Append one result, preceded by `,` unless it is the command's first.
    fn push(&mut self, bytes: &[u8]) -> Result<(), ErrorEntry> {
        let sep = usize::from(self.results > 0);
        if self.buf.len() + sep + bytes.len() > self.capacity {
            self.overflowed = true;
            return Err(ErrorEntry::from_code(codes::TOO_MUCH_DATA));
        }
        if sep == 1 {
            self.buf.push(b',');
        }
        self.buf.extend_from_slice(bytes);
        self.results += 1;
        Ok(())
    }

    // ── Dispatcher hooks ───────────────────────────────────────────────

    /// Start a command: later output can be rolled back to here.
    pub(crate) fn begin_command(&mut self) {
        self.mark = self.buf.len();
        self.results = 0;
        self.overflowed = false;
    }

    /// Whether a result was refused since [`Self::begin_command`].
    pub(crate) fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Drop the current command's output.
    pub(crate) fn rollback(&mut self) {
        self.buf.truncate(self.mark);
        self.results = 0;
    }

    /// Close the current command, appending the line ending if it produced
    /// any result.
    pub(crate) fn end_command(&mut self) -> Result<(), ErrorEntry> {
        if self.results == 0 {
            return Ok(());
        }
        let ending = self.line_ending.as_bytes();
        if self.buf.len() + ending.len() > self.capacity {
            self.overflowed = true;
            return Err(ErrorEntry::from_code(codes::TOO_MUCH_DATA));
        }
        self.buf.extend_from_slice(ending);
        self.results = 0;
        self.mark = self.buf.len();
        Ok(())
    }

    /// Take the buffered bytes, leaving the buffer empty.
    pub(crate) fn take(&mut self) -> Vec<u8> {
        self.mark = 0;
        self.results = 0;
        std::mem::replace(&mut self.buf, Vec::with_capacity(self.capacity))
    }

    /// Discard everything.
    pub(crate) fn clear(&mut self) {
        self.buf.clear();
        self.mark = 0;
        self.results = 0;
        self.overflowed = false;
    }
}

fn infinity(positive: bool) -> &'static str {
    if positive {
        INFINITY_RESPONSE
    } else {
        NEG_INFINITY_RESPONSE
    }
}

/// Shortest round-tripping decimal: positional for decimal exponents in
/// `-4..15`, otherwise `d.dddE±x`.
pub fn format_real<T: Display + LowerExp>(value: T) -> String {
    let sci = format!("{value:e}");
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    if (-4..15).contains(&exp) {
        value.to_string()
    } else {
        format!("{mantissa}E{}{}", if exp < 0 { '-' } else { '+' }, exp.abs())
    }
}
