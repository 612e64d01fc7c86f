//! Streaming SCPI lexer.
//!
//! The lexer works over the bytes buffered so far. Tokens never borrow; they
//! carry [`Span`]s into the buffer they were produced from. A command is
//! complete once its `;` or terminator (`\n`) has been lexed, or, when the
//! caller has signalled end-of-input, once the buffer is exhausted. Until
//! then [`scan_command`] reports nothing and the caller waits for more
//! bytes.
//!
//! Strings, blocks and expressions may legitimately contain terminators (a
//! block is binary-safe), so they are lexed as single tokens. If one of them
//! is still open at end-of-input it becomes an [`TokenKind::Invalid`] token
//! reaching up to the next raw newline, so lexing resumes after it.

use scpi_engine_diagnostics::{Span, codes};

/// Classification of a lexed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Program mnemonic or character data (`MEAS`, `*IDN`, `ON`).
    Mnemonic,
    /// `:` header separator.
    Colon,
    /// `;` command separator.
    Semicolon,
    /// `,` parameter separator.
    Comma,
    /// `?` query marker.
    Query,
    /// Decimal numeric data, with an optional unit suffix.
    Decimal {
        /// The number itself, sign and exponent included.
        number: Span,
        /// The suffix (`MV`, `KHZ`), if any.
        unit: Option<Span>,
    },
    /// `#H`, `#Q` or `#B` numeric data. Digits start two bytes into the span.
    NonDecimal {
        /// 16, 8 or 2.
        radix: u32,
    },
    /// Quoted string data, quotes included in the span.
    Str {
        /// The opening (and closing) quote byte.
        quote: u8,
    },
    /// Arbitrary block data.
    Block {
        /// The raw payload bytes.
        payload: Span,
    },
    /// Parenthesized program expression, parentheses included.
    Expression,
    /// Message terminator.
    Terminator,
    /// Malformed input, carrying the SCPI error code to report.
    Invalid {
        /// Error code (`-101`, `-102`, `-121`, `-151`, `-161`, `-171`).
        code: i16,
    },
}

/// A lexed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    /// Classification.
    pub kind: TokenKind,
    /// Bytes covered in the source buffer.
    pub span: Span,
    /// Whether whitespace preceded the token.
    pub ws_before: bool,
}

impl Token {
    /// The token's bytes in `buf`.
    pub fn text<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        self.span.slice(buf)
    }

    /// Whether this token can start a parameter.
    pub fn is_data(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Mnemonic
                | TokenKind::Decimal { .. }
                | TokenKind::NonDecimal { .. }
                | TokenKind::Str { .. }
                | TokenKind::Block { .. }
                | TokenKind::Expression
        )
    }
}

/// Outcome of one lexer step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A complete token.
    Token(Token),
    /// The buffer ends mid-token or mid-message; more bytes are needed.
    NeedMore,
    /// End-of-input was signalled and every byte has been lexed.
    End,
}

/// An open string, block or expression ran into the end of the buffer.
struct Incomplete {
    code: i16,
}

/// IEEE 488.2 whitespace: every control byte and space except newline.
fn is_ws(b: u8) -> bool {
    b <= b' ' && b != b'\n'
}

fn is_delimiter(b: u8) -> bool {
    is_ws(b) || matches!(b, b',' | b';' | b'\n')
}

/// Token producer over a byte buffer.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    buf: &'a [u8],
    pos: usize,
    eof: bool,
}

impl<'a> Lexer<'a> {
    /// Lex `buf`. With `eof` set, the buffer is final: open tokens are
    /// reported invalid and the buffer end acts as a terminator.
    pub fn new(buf: &'a [u8], eof: bool) -> Self {
        Self { buf, pos: 0, eof }
    }

    /// Byte offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Produce the next token.
    pub fn next_token(&mut self) -> Step {
        let ws_start = self.pos;
        while self.buf.get(self.pos).copied().is_some_and(is_ws) {
            self.pos += 1;
        }
        let ws_before = self.pos > ws_start;
        let start = self.pos;
        let Some(&b) = self.buf.get(start) else {
            return if self.eof { Step::End } else { Step::NeedMore };
        };

        let lexed = match b {
            b'\n' => Ok(self.single(TokenKind::Terminator)),
            b':' => Ok(self.single(TokenKind::Colon)),
            b';' => Ok(self.single(TokenKind::Semicolon)),
            b',' => Ok(self.single(TokenKind::Comma)),
            b'?' => Ok(self.single(TokenKind::Query)),
            b'*' | b'A'..=b'Z' | b'a'..=b'z' => Ok(self.mnemonic()),
            b'0'..=b'9' | b'+' | b'-' | b'.' => Ok(self.decimal()),
            b'#' => self.hash(),
            b'"' | b'\'' => self.string(b),
            b'(' => self.expression(),
            0x80.. => Ok(self.single(TokenKind::Invalid {
                code: codes::INVALID_CHARACTER,
            })),
            _ => Ok(self.single(TokenKind::Invalid {
                code: codes::SYNTAX_ERROR,
            })),
        };

        let kind = match lexed {
            Ok(kind) => kind,
            Err(Incomplete { .. }) if !self.eof => {
                tracing::trace!(offset = start, "lexer suspended on open token");
                return Step::NeedMore;
            }
            Err(Incomplete { code }) => self.skip_line(start, code),
        };
        Step::Token(Token {
            kind,
            span: Span::new(start, self.pos),
            ws_before,
        })
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    /// Discard from `start` up to (not including) the next newline.
    fn skip_line(&mut self, start: usize, code: i16) -> TokenKind {
        self.pos = self.buf[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(self.buf.len(), |i| start + i);
        TokenKind::Invalid { code }
    }

    /// Discard up to the next delimiter.
    fn skip_word(&mut self, code: i16) -> TokenKind {
        while self.buf.get(self.pos).is_some_and(|&b| !is_delimiter(b)) {
            self.pos += 1;
        }
        TokenKind::Invalid { code }
    }

    fn count_while(&self, from: usize, pred: impl Fn(u8) -> bool) -> usize {
        self.buf[from..].iter().take_while(|&&b| pred(b)).count()
    }

    fn mnemonic(&mut self) -> TokenKind {
        if self.buf[self.pos] == b'*' {
            self.pos += 1;
            if !self.buf.get(self.pos).is_some_and(u8::is_ascii_alphabetic) {
                return TokenKind::Invalid {
                    code: codes::SYNTAX_ERROR,
                };
            }
        }
        self.pos += self.count_while(self.pos, |b| b.is_ascii_alphanumeric() || b == b'_');
        TokenKind::Mnemonic
    }

    fn decimal(&mut self) -> TokenKind {
        let start = self.pos;
        let mut i = start;
        if matches!(self.buf[i], b'+' | b'-') {
            i += 1;
        }
        let int_digits = self.count_while(i, |b| b.is_ascii_digit());
        i += int_digits;
        let mut frac_digits = 0;
        if self.buf.get(i) == Some(&b'.') {
            i += 1;
            frac_digits = self.count_while(i, |b| b.is_ascii_digit());
            i += frac_digits;
        }
        if int_digits + frac_digits == 0 {
            self.pos = i;
            return self.skip_word(codes::INVALID_CHARACTER_IN_NUMBER);
        }

        if matches!(self.buf.get(i), Some(b'e' | b'E')) {
            let mut j = i + 1;
            if matches!(self.buf.get(j), Some(b'+' | b'-')) {
                j += 1;
            }
            let exp_digits = self.count_while(j, |b| b.is_ascii_digit());
            if exp_digits > 0 {
                i = j + exp_digits;
            }
        }
        let number = Span::new(start, i);

        let mut unit = None;
        let unit_start = i + self.count_while(i, is_ws);
        if self.buf.get(unit_start).is_some_and(u8::is_ascii_alphabetic) {
            let len = self.count_while(unit_start, |b| b.is_ascii_alphanumeric() || b == b'/');
            i = unit_start + len;
            unit = Some(Span::new(unit_start, i));
        }

        self.pos = i;
        if self.buf.get(i).is_some_and(|&b| !is_delimiter(b)) {
            return self.skip_word(codes::INVALID_CHARACTER_IN_NUMBER);
        }
        TokenKind::Decimal { number, unit }
    }

    fn hash(&mut self) -> Result<TokenKind, Incomplete> {
        let start = self.pos;
        let incomplete = Incomplete {
            code: codes::INVALID_BLOCK_DATA,
        };
        let Some(&marker) = self.buf.get(start + 1) else {
            return Err(incomplete);
        };
        let radix = match marker.to_ascii_uppercase() {
            b'H' => Some(16),
            b'Q' => Some(8),
            b'B' => Some(2),
            _ => None,
        };
        if let Some(radix) = radix {
            self.pos = start + 2;
            let digits = self.count_while(self.pos, |b| char::from(b).is_digit(radix));
            self.pos += digits;
            if digits == 0 || self.buf.get(self.pos).is_some_and(|&b| !is_delimiter(b)) {
                return Ok(self.skip_word(codes::INVALID_CHARACTER_IN_NUMBER));
            }
            return Ok(TokenKind::NonDecimal { radix });
        }

        match marker {
            b'0' => {
                let from = start + 2;
                let end = match self.buf[from..].iter().position(|&b| b == b'\n') {
                    Some(i) => from + i,
                    None if self.eof => self.buf.len(),
                    None => return Err(incomplete),
                };
                self.pos = end;
                Ok(TokenKind::Block {
                    payload: Span::new(from, end),
                })
            }
            b'1'..=b'9' => {
                let n = usize::from(marker - b'0');
                let len_from = start + 2;
                let Some(len_digits) = self.buf.get(len_from..len_from + n) else {
                    return Err(incomplete);
                };
                if !len_digits.iter().all(u8::is_ascii_digit) {
                    return Ok(self.skip_line(start, codes::INVALID_BLOCK_DATA));
                }
                let len = len_digits
                    .iter()
                    .fold(0usize, |acc, &d| acc * 10 + usize::from(d - b'0'));
                let from = len_from + n;
                if from + len > self.buf.len() {
                    return Err(incomplete);
                }
                self.pos = from + len;
                Ok(TokenKind::Block {
                    payload: Span::new(from, from + len),
                })
            }
            _ => {
                self.pos = start + 1;
                Ok(TokenKind::Invalid {
                    code: codes::SYNTAX_ERROR,
                })
            }
        }
    }

    fn string(&mut self, quote: u8) -> Result<TokenKind, Incomplete> {
        let mut i = self.pos + 1;
        loop {
            match self.buf.get(i) {
                None => {
                    return Err(Incomplete {
                        code: codes::INVALID_STRING_DATA,
                    });
                }
                Some(b'\n') => {
                    self.pos = i;
                    return Ok(TokenKind::Invalid {
                        code: codes::INVALID_STRING_DATA,
                    });
                }
                Some(&b) if b == quote => {
                    if self.buf.get(i + 1) == Some(&quote) {
                        i += 2;
                        continue;
                    }
                    self.pos = i + 1;
                    return Ok(TokenKind::Str { quote });
                }
                Some(_) => i += 1,
            }
        }
    }

    fn expression(&mut self) -> Result<TokenKind, Incomplete> {
        let mut depth = 0usize;
        let mut i = self.pos;
        loop {
            match self.buf.get(i) {
                None => {
                    return Err(Incomplete {
                        code: codes::INVALID_EXPRESSION,
                    });
                }
                Some(b'\n') => {
                    self.pos = i;
                    return Ok(TokenKind::Invalid {
                        code: codes::INVALID_EXPRESSION,
                    });
                }
                Some(b'(') => depth += 1,
                Some(b')') => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos = i + 1;
                        return Ok(TokenKind::Expression);
                    }
                }
                Some(_) => {}
            }
            i += 1;
        }
    }
}

/// How a [`Command`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandEnd {
    /// A `;` separator: more commands of the same message follow.
    Separator,
    /// A terminator, or the end of final input: the message is complete.
    Terminator,
}

/// One complete command: its tokens (the ending `;` or terminator
/// excluded), how it ended, and the number of buffer bytes it spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Tokens in order.
    pub tokens: Vec<Token>,
    /// What ended the command.
    pub end: CommandEnd,
    /// Bytes consumed from the front of the buffer.
    pub len: usize,
}

/// Lex the first complete command in `buf`.
///
/// Returns `None` when the buffer does not yet hold a complete command.
/// With `eof` set, whatever remains is a complete, message-ending command;
/// an exhausted buffer yields an empty one with `len == 0`.
pub fn scan_command(buf: &[u8], eof: bool) -> Option<Command> {
    let mut lexer = Lexer::new(buf, eof);
    let mut tokens = Vec::new();
    loop {
        let (end, len) = match lexer.next_token() {
            Step::Token(token) => match token.kind {
                TokenKind::Semicolon => (CommandEnd::Separator, token.span.end),
                TokenKind::Terminator => (CommandEnd::Terminator, token.span.end),
                _ => {
                    tokens.push(token);
                    continue;
                }
            },
            Step::NeedMore => return None,
            Step::End => (CommandEnd::Terminator, buf.len()),
        };
        return Some(Command { tokens, end, len });
    }
}

/// Lex a complete, final input into tokens.
pub fn tokenize(input: &[u8]) -> Vec<Token> {
    let mut lexer = Lexer::new(input, true);
    let mut tokens = Vec::new();
    while let Step::Token(token) = lexer.next_token() {
        tokens.push(token);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &[u8]) -> Vec<TokenKind> {
        tokenize(input).into_iter().map(|t| t.kind).collect()
    }

    fn invalid(code: i16) -> TokenKind {
        TokenKind::Invalid { code }
    }

    #[test]
    fn header_tokens() {
        use TokenKind::*;
        assert_eq!(
            kinds(b":MEAS:VOLT?;*IDN?\n"),
            vec![Colon, Mnemonic, Colon, Mnemonic, Query, Semicolon, Mnemonic, Query, Terminator]
        );
    }

    #[test]
    fn whitespace_flag() {
        let toks = tokenize(b"TEST:INT32 7,8");
        assert!(!toks[1].ws_before);
        assert!(toks[3].ws_before);
        assert!(!toks[4].ws_before);
        assert_eq!(toks[3].text(b"TEST:INT32 7,8"), b"7");
    }

    #[test]
    fn crlf_is_whitespace_then_terminator() {
        use TokenKind::*;
        assert_eq!(kinds(b"*RST\r\n"), vec![Mnemonic, Terminator]);
        assert_eq!(kinds(b"A\rB"), vec![Mnemonic, Mnemonic]);
    }

    #[test]
    fn decimal_forms() {
        let input = b"1 -2.5 .5 +3e-2 4E+3";
        let toks = tokenize(input);
        assert_eq!(toks.len(), 5);
        for t in &toks {
            let TokenKind::Decimal { number, unit } = t.kind else {
                panic!("expected decimal, got {:?}", t.kind);
            };
            assert_eq!(number, t.span);
            assert_eq!(unit, None);
        }
    }

    #[test]
    fn decimal_with_unit() {
        let input = b"10 MV,2.5kHz";
        let toks = tokenize(input);
        let TokenKind::Decimal { number, unit } = toks[0].kind else {
            panic!("{:?}", toks[0].kind);
        };
        assert_eq!(number.slice(input), b"10");
        assert_eq!(unit.map(|u| u.slice(input)), Some(&b"MV"[..]));
        let TokenKind::Decimal { unit, .. } = toks[2].kind else {
            panic!("{:?}", toks[2].kind);
        };
        assert_eq!(unit.map(|u| u.slice(input)), Some(&b"kHz"[..]));
    }

    #[test]
    fn malformed_numbers() {
        assert_eq!(kinds(b"1.2.3"), vec![invalid(codes::INVALID_CHARACTER_IN_NUMBER)]);
        assert_eq!(kinds(b"+"), vec![invalid(codes::INVALID_CHARACTER_IN_NUMBER)]);
        assert_eq!(kinds(b"#HXZ"), vec![invalid(codes::INVALID_CHARACTER_IN_NUMBER)]);
    }

    #[test]
    fn non_decimal() {
        assert_eq!(
            kinds(b"#HFF,#q17,#b101"),
            vec![
                TokenKind::NonDecimal { radix: 16 },
                TokenKind::Comma,
                TokenKind::NonDecimal { radix: 8 },
                TokenKind::Comma,
                TokenKind::NonDecimal { radix: 2 },
            ]
        );
    }

    #[test]
    fn strings_with_doubled_quotes() {
        let input = br#""say ""hi""",'it''s'"#;
        let toks = tokenize(input);
        assert_eq!(toks[0].kind, TokenKind::Str { quote: b'"' });
        assert_eq!(toks[0].text(input), br#""say ""hi""""#);
        assert_eq!(toks[2].kind, TokenKind::Str { quote: b'\'' });
    }

    #[test]
    fn newline_inside_string_is_invalid() {
        assert_eq!(
            kinds(b"\"abc\nX\n"),
            vec![
                invalid(codes::INVALID_STRING_DATA),
                TokenKind::Terminator,
                TokenKind::Mnemonic,
                TokenKind::Terminator,
            ]
        );
    }

    #[test]
    fn definite_block_is_binary_safe() {
        let input = b"#15a\n\0;b;X";
        let toks = tokenize(input);
        let TokenKind::Block { payload } = toks[0].kind else {
            panic!("{:?}", toks[0].kind);
        };
        assert_eq!(payload.slice(input), b"a\n\0;b");
        assert_eq!(toks[1].kind, TokenKind::Semicolon);
    }

    #[test]
    fn indefinite_block_runs_to_newline() {
        let input = b"#0abc;d\nX";
        let toks = tokenize(input);
        let TokenKind::Block { payload } = toks[0].kind else {
            panic!("{:?}", toks[0].kind);
        };
        assert_eq!(payload.slice(input), b"abc;d");
        assert_eq!(toks[1].kind, TokenKind::Terminator);
    }

    #[test]
    fn truncated_block_at_eof_skips_to_newline() {
        assert_eq!(
            kinds(b"#220ab\nX?\n"),
            vec![
                invalid(codes::INVALID_BLOCK_DATA),
                TokenKind::Terminator,
                TokenKind::Mnemonic,
                TokenKind::Query,
                TokenKind::Terminator,
            ]
        );
    }

    #[test]
    fn expressions() {
        let input = b"(@1,2:4,1!2)";
        let toks = tokenize(input);
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].kind, TokenKind::Expression);
        assert_eq!(kinds(b"(1\n"), vec![invalid(codes::INVALID_EXPRESSION), TokenKind::Terminator]);
    }

    #[test]
    fn stray_characters() {
        assert_eq!(kinds(b"!"), vec![invalid(codes::SYNTAX_ERROR)]);
        assert_eq!(kinds(&[0xC3]), vec![invalid(codes::INVALID_CHARACTER)]);
        assert_eq!(kinds(b"*1"), vec![invalid(codes::SYNTAX_ERROR), TokenKind::Decimal {
            number: Span::new(1, 2),
            unit: None,
        }]);
    }

    #[test]
    fn scan_stops_at_each_command() {
        assert_eq!(scan_command(b"*IDN?", false), None);
        let c = scan_command(b"*OPC;*IDN?\n", false).unwrap();
        assert_eq!((c.len, c.end, c.tokens.len()), (5, CommandEnd::Separator, 1));
        let c = scan_command(b"*IDN?\n*RST\n", false).unwrap();
        assert_eq!((c.len, c.end, c.tokens.len()), (6, CommandEnd::Terminator, 2));
    }

    #[test]
    fn empty_commands_are_reported() {
        let c = scan_command(b";X\n", false).unwrap();
        assert_eq!((c.len, c.end), (1, CommandEnd::Separator));
        assert!(c.tokens.is_empty());
        let c = scan_command(b"  \n", false).unwrap();
        assert_eq!((c.len, c.end), (3, CommandEnd::Terminator));
        assert!(c.tokens.is_empty());
    }

    #[test]
    fn scan_waits_for_block_payload() {
        // The newline and `;` inside the declared payload are data.
        assert_eq!(scan_command(b"X #15a;\n", false), None);
        let c = scan_command(b"X #15a;\ncd\n", false).unwrap();
        assert_eq!(c.len, 11);
        assert_eq!(c.end, CommandEnd::Terminator);
    }

    #[test]
    fn scan_at_eof_takes_remainder() {
        let c = scan_command(b"*IDN?", true).unwrap();
        assert_eq!((c.len, c.end, c.tokens.len()), (5, CommandEnd::Terminator, 2));
        let c = scan_command(b"  ", true).unwrap();
        assert_eq!((c.len, c.tokens.len()), (2, 0));
        assert_eq!(scan_command(b"", true).map(|c| c.len), Some(0));
    }

    #[test]
    fn scan_suspends_on_open_string() {
        assert_eq!(scan_command(b"X 'a;bc", false), None);
        let c = scan_command(b"X 'a;bc", true).unwrap();
        assert_eq!(c.tokens[1].kind, invalid(codes::INVALID_STRING_DATA));
        assert_eq!(c.len, 7);
    }
}
