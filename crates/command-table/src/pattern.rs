//! Command pattern parsing.
//!
//! A pattern such as `MEASure:VOLTage[:DC]?` or `TEST#:NUMbers#` is split
//! into [`Segment`]s. Each segment carries its short form (the uppercase
//! prefix) and its long form (the whole word, uppercased); input matches a
//! segment only when it equals one of the two, ignoring case. `#` marks a
//! numeric-suffix segment, brackets mark an optional segment, and a final
//! `?` makes the pattern a query.

use serde::{Deserialize, Serialize};

use crate::InitError;

/// Maximum number of bracketed (optional) segments in one pattern.
pub const MAX_OPTIONAL_SEGMENTS: usize = 8;

/// One `:`-separated component of a command pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Short form, uppercase (e.g. `"MEAS"`, `"*IDN"`).
    pub short: String,
    /// Long form, uppercase (e.g. `"MEASURE"`); equals `short` when the
    /// pattern has no lowercase suffix.
    pub long: String,
    /// Whether the segment accepts trailing digits as a numeric suffix.
    #[serde(default)]
    pub numeric_suffix: bool,
    /// Whether the segment was bracketed in the pattern.
    #[serde(default)]
    pub optional: bool,
}

/// Result of matching one input mnemonic against a [`Segment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentMatch<'i> {
    /// Trailing digits captured by a numeric-suffix segment, if any.
    pub suffix: Option<&'i [u8]>,
}

impl Segment {
    /// Parse a single segment body (no brackets, no colons).
    ///
    /// Returns a short reason on failure; [`CommandPattern::parse`] wraps it
    /// into an [`InitError`].
    pub fn parse(text: &str) -> Result<Self, &'static str> {
        let (body, numeric_suffix) = match text.strip_suffix('#') {
            Some(body) => (body, true),
            None => (text, false),
        };
        if body.is_empty() {
            return Err("empty segment");
        }
        if body.contains('#') {
            return Err("`#` may only end a segment");
        }
        let (common, word) = match body.strip_prefix('*') {
            Some(word) => (true, word),
            None => (false, body),
        };
        if !word.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err("invalid character in segment");
        }
        if !word.as_bytes().first().is_some_and(u8::is_ascii_uppercase) {
            return Err("segment must start with an uppercase letter");
        }
        let short_len = short_form_len(word);
        let suffix = &word[short_len..];
        if suffix.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err("uppercase letter after the long-form suffix");
        }
        if common && !suffix.is_empty() {
            return Err("common command mnemonics have no long form");
        }
        if numeric_suffix && word.as_bytes().last().is_some_and(u8::is_ascii_digit) {
            return Err("`#` cannot follow a digit");
        }

        let short = format!("{}{}", if common { "*" } else { "" }, &word[..short_len]);
        let long = format!("{short}{}", suffix.to_ascii_uppercase());
        Ok(Self {
            short,
            long,
            numeric_suffix,
            optional: false,
        })
    }

    /// Whether this is an IEEE 488.2 common command mnemonic (`*IDN`).
    pub fn is_common(&self) -> bool {
        self.short.starts_with('*')
    }

    /// Whether two segments compile to the same tree node: they agree on
    /// the numeric suffix and some mnemonic is accepted by both.
    pub fn same_node(&self, other: &Segment) -> bool {
        self.numeric_suffix == other.numeric_suffix
            && [&self.short, &self.long]
                .into_iter()
                .any(|word| *word == other.short || *word == other.long)
    }

    /// Match one input mnemonic (as received, any case).
    pub fn match_mnemonic<'i>(&self, input: &'i [u8]) -> Option<SegmentMatch<'i>> {
        if !self.numeric_suffix {
            return self.matches_word(input).then_some(SegmentMatch { suffix: None });
        }
        let digits = input.iter().rev().take_while(|b| b.is_ascii_digit()).count();
        let (stem, suffix) = input.split_at(input.len() - digits);
        self.matches_word(stem).then_some(SegmentMatch {
            suffix: (!suffix.is_empty()).then_some(suffix),
        })
    }

    fn matches_word(&self, word: &[u8]) -> bool {
        word.eq_ignore_ascii_case(self.short.as_bytes())
            || word.eq_ignore_ascii_case(self.long.as_bytes())
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.short)?;
        f.write_str(&self.long[self.short.len()..].to_ascii_lowercase())?;
        if self.numeric_suffix {
            f.write_str("#")?;
        }
        Ok(())
    }
}

/// Length of the short form of a mixed-case keyword (its uppercase prefix).
fn short_form_len(word: &str) -> usize {
    word.bytes()
        .take_while(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        .count()
}

/// Match `input` against a mixed-case keyword such as `MEDium`.
///
/// Accepts the short form (`MED`) or the complete long form (`MEDIUM`), in
/// any case. Used for choice parameters, which follow the header rule.
pub fn keyword_matches(keyword: &str, input: &[u8]) -> bool {
    let short = &keyword.as_bytes()[..short_form_len(keyword)];
    input.eq_ignore_ascii_case(short) || input.eq_ignore_ascii_case(keyword.as_bytes())
}

/// A parsed command pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandPattern {
    /// The pattern as registered.
    pub text: String,
    /// Header segments in order, optional ones included.
    pub segments: Vec<Segment>,
    /// Whether the pattern ends in `?`.
    pub query: bool,
}

impl CommandPattern {
    /// Parse a pattern string.
    pub fn parse(text: &str) -> Result<Self, InitError> {
        let malformed = |reason: &str| InitError::MalformedPattern {
            pattern: text.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(malformed("pattern is empty"));
        }
        let (body, query) = match trimmed.strip_suffix('?') {
            Some(body) => (body, true),
            None => (trimmed, false),
        };
        if body.contains('?') {
            return Err(malformed("`?` may only end the pattern"));
        }

        // `A[:B]` is written `A:[B]` internally so every piece splits on ':'.
        let normalized = body.replace("[:", ":[");
        let normalized = normalized.strip_prefix(':').unwrap_or(&normalized);
        if normalized.is_empty() {
            return Err(malformed("pattern has no segments"));
        }

        let mut segments = Vec::new();
        for piece in normalized.split(':') {
            let (inner, optional) = match piece.strip_prefix('[') {
                Some(rest) => (
                    rest.strip_suffix(']')
                        .ok_or_else(|| malformed("unbalanced brackets"))?,
                    true,
                ),
                None => (piece, false),
            };
            if inner.contains(['[', ']']) {
                return Err(malformed("unbalanced brackets"));
            }
            let mut segment = Segment::parse(inner).map_err(malformed)?;
            segment.optional = optional;
            segments.push(segment);
        }

        if segments.iter().any(Segment::is_common) && segments.len() != 1 {
            return Err(malformed("a common command must be a single mnemonic"));
        }
        let optional = segments.iter().filter(|s| s.optional).count();
        if optional > MAX_OPTIONAL_SEGMENTS {
            return Err(malformed("too many optional segments"));
        }
        if optional == segments.len() {
            return Err(malformed("pattern has no mandatory segment"));
        }

        Ok(Self {
            text: text.to_string(),
            segments,
            query,
        })
    }

    /// Whether this is an IEEE 488.2 common command (`*RST`, `*IDN?`).
    pub fn is_common(&self) -> bool {
        self.segments.first().is_some_and(Segment::is_common)
    }

    /// Every concrete segment path this pattern accepts.
    ///
    /// The path with all optional segments omitted comes first.
    pub fn expansions(&self) -> Vec<Vec<&Segment>> {
        let optional = self.segments.iter().filter(|s| s.optional).count();
        let mut out = Vec::with_capacity(1 << optional);
        for mask in 0u32..(1 << optional) {
            let mut bit = 0;
            let path: Vec<&Segment> = self
                .segments
                .iter()
                .filter(|s| {
                    if !s.optional {
                        return true;
                    }
                    let keep = mask & (1 << bit) != 0;
                    bit += 1;
                    keep
                })
                .collect();
            out.push(path);
        }
        out
    }

    /// Canonical text of every expansion, e.g. `["SYSTem:ERRor?",
    /// "SYSTem:ERRor:NEXT?"]`.
    pub fn canonical_forms(&self) -> Vec<String> {
        self.expansions()
            .into_iter()
            .map(|path| {
                let mut s = path
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(":");
                if self.query {
                    s.push('?');
                }
                s
            })
            .collect()
    }

    /// Whether a header string such as `"meas:volt?"` matches this pattern.
    ///
    /// Numeric suffixes are accepted but not range-checked.
    pub fn matches(&self, header: &str) -> bool {
        let header = header.trim();
        let header = header.strip_prefix(':').unwrap_or(header);
        let (header, query) = match header.strip_suffix('?') {
            Some(h) => (h, true),
            None => (header, false),
        };
        if query != self.query {
            return false;
        }
        let words: Vec<&[u8]> = header.split(':').map(str::as_bytes).collect();
        self.expansions().iter().any(|path| {
            path.len() == words.len()
                && path
                    .iter()
                    .zip(&words)
                    .all(|(seg, word)| seg.match_mnemonic(word).is_some())
        })
    }
}

impl std::fmt::Display for CommandPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}
