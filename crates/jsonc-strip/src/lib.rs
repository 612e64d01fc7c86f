//! JSONC comment stripping for build-time data files.
//!
//! Removes `//` line comments and `/* ... */` block comments while leaving
//! string literals (escapes included) untouched. Line comments keep their
//! terminating newline so line numbers in `serde_json` errors still point at
//! the original source line.

/// Scanner position relative to JSON lexical structure.
#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    Str,
    StrEscape,
    LineComment,
    BlockComment,
}

/// Strip `//` and `/* */` comments from JSONC input.
///
/// An unterminated block comment swallows the rest of the input.
#[must_use]
pub fn strip_jsonc(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut state = State::Code;
    let mut i = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match state {
            State::Code => match (b, next) {
                (b'"', _) => {
                    out.push(b);
                    state = State::Str;
                }
                (b'/', Some(b'/')) => {
                    state = State::LineComment;
                    i += 1;
                }
                (b'/', Some(b'*')) => {
                    state = State::BlockComment;
                    i += 1;
                }
                _ => out.push(b),
            },
            State::Str => {
                out.push(b);
                state = match b {
                    b'\\' => State::StrEscape,
                    b'"' => State::Code,
                    _ => State::Str,
                };
            }
            State::StrEscape => {
                out.push(b);
                state = State::Str;
            }
            State::LineComment => {
                if b == b'\n' {
                    out.push(b);
                    state = State::Code;
                }
            }
            State::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    state = State::Code;
                    i += 1;
                }
            }
        }
        i += 1;
    }

    // Only ASCII bytes were ever dropped, so the output is still valid UTF-8.
    String::from_utf8(out).unwrap_or_default()
}
