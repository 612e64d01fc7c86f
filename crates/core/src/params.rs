//! Parameter extraction.
//!
//! A [`Params`] cursor walks the parameter tokens of one command. Every pull
//! takes a `mandatory` flag and returns `Ok(None)` when an optional
//! parameter is absent. On any error the cursor stays on the offending
//! parameter.
//!
//! | pull | accepts | errors |
//! |------|---------|--------|
//! | `int32`/`int64` | decimal (rounded), `#H`/`#Q`/`#B` | -104, -138, -222 |
//! | `float`/`double` | decimal, non-decimal | -104, -138, -222 |
//! | `bool` | numeric (non-zero is true), `ON`/`OFF`/`TRUE`/`FALSE` | -104, -224 |
//! | `text` | quoted string | -104 |
//! | `characters` | character data | -104 |
//! | `choice` | character data from a keyword list | -104, -224 |
//! | `block` | arbitrary block | -104 |
//! | `number` | decimal with unit, non-decimal, `MIN`/`MAX`/... | -104, -131, -224 |
//! | `channel_list` | `(@1,2:4,1!2)` | -104, -171 |
//!
//! Shared errors: `-109` for a missing mandatory parameter, `-103` when the
//! separating comma is absent and `-102` for an empty parameter.

use scpi_engine_diagnostics::{ErrorEntry, codes};
use scpi_engine_tables::keyword_matches;

use crate::lexer::{Token, TokenKind};

fn fail(code: i16) -> ErrorEntry {
    ErrorEntry::from_code(code)
}

// ── Param ───────────────────────────────────────────────────────────────

/// One raw parameter: a data token and the message it was lexed from.
#[derive(Debug, Clone, Copy)]
pub struct Param<'a> {
    token: Token,
    msg: &'a [u8],
}

impl<'a> Param<'a> {
    /// The token classification.
    pub fn kind(&self) -> TokenKind {
        self.token.kind
    }

    /// The parameter exactly as received.
    pub fn text(&self) -> &'a [u8] {
        self.token.span.slice(self.msg)
    }

    /// Decimal value of a numeric parameter; units are refused.
    fn real(&self) -> Result<f64, ErrorEntry> {
        match self.token.kind {
            TokenKind::Decimal { unit: Some(_), .. } => Err(fail(codes::SUFFIX_NOT_ALLOWED)),
            TokenKind::Decimal { number, unit: None } => parse_real(number.slice(self.msg)),
            TokenKind::NonDecimal { radix } => Ok(self.unsigned(radix)? as f64),
            _ => Err(fail(codes::DATA_TYPE_ERROR)),
        }
    }

    fn unsigned(&self, radix: u32) -> Result<u64, ErrorEntry> {
        let digits = std::str::from_utf8(&self.text()[2..])
            .map_err(|_| fail(codes::INVALID_CHARACTER_IN_NUMBER))?;
        u64::from_str_radix(digits, radix).map_err(|_| fail(codes::DATA_OUT_OF_RANGE))
    }

    fn integer(&self) -> Result<i64, ErrorEntry> {
        match self.token.kind {
            TokenKind::Decimal { number, unit: None } => {
                let text = number.slice(self.msg);
                if text.iter().all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-')) {
                    let text = std::str::from_utf8(text)
                        .map_err(|_| fail(codes::INVALID_CHARACTER_IN_NUMBER))?;
                    return text.parse().map_err(|_| fail(codes::DATA_OUT_OF_RANGE));
                }
                let rounded = parse_real(text)?.round();
                if rounded < i64::MIN as f64 || rounded >= i64::MAX as f64 {
                    return Err(fail(codes::DATA_OUT_OF_RANGE));
                }
                Ok(rounded as i64)
            }
            TokenKind::NonDecimal { radix } => {
                i64::try_from(self.unsigned(radix)?).map_err(|_| fail(codes::DATA_OUT_OF_RANGE))
            }
            _ => self.real().map(|_| 0),
        }
    }

    fn str_data(&self) -> Result<String, ErrorEntry> {
        let TokenKind::Str { quote } = self.token.kind else {
            return Err(fail(codes::DATA_TYPE_ERROR));
        };
        let text = self.text();
        let inner = &text[1..text.len() - 1];
        let mut out = Vec::with_capacity(inner.len());
        let mut i = 0;
        while i < inner.len() {
            out.push(inner[i]);
            i += if inner[i] == quote { 2 } else { 1 };
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    fn mnemonic(&self) -> Result<&'a str, ErrorEntry> {
        if self.token.kind != TokenKind::Mnemonic {
            return Err(fail(codes::DATA_TYPE_ERROR));
        }
        std::str::from_utf8(self.text()).map_err(|_| fail(codes::INVALID_CHARACTER_DATA))
    }
}

fn parse_real(text: &[u8]) -> Result<f64, ErrorEntry> {
    let value: f64 = std::str::from_utf8(text)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| fail(codes::NUMERIC_DATA_ERROR))?;
    if !value.is_finite() {
        return Err(fail(codes::DATA_OUT_OF_RANGE));
    }
    Ok(value)
}

// ── FromParam ───────────────────────────────────────────────────────────

/// Types that can be decoded from a single parameter.
///
/// `String` decodes quoted string data; `&str` decodes character data.
pub trait FromParam<'a>: Sized {
    /// Decode `param`, or report why it does not fit.
    fn from_param(param: Param<'a>) -> Result<Self, ErrorEntry>;
}

impl<'a> FromParam<'a> for i64 {
    fn from_param(param: Param<'a>) -> Result<Self, ErrorEntry> {
        param.integer()
    }
}

impl<'a> FromParam<'a> for i32 {
    fn from_param(param: Param<'a>) -> Result<Self, ErrorEntry> {
        i32::try_from(param.integer()?).map_err(|_| fail(codes::DATA_OUT_OF_RANGE))
    }
}

impl<'a> FromParam<'a> for f64 {
    fn from_param(param: Param<'a>) -> Result<Self, ErrorEntry> {
        param.real()
    }
}

impl<'a> FromParam<'a> for f32 {
    fn from_param(param: Param<'a>) -> Result<Self, ErrorEntry> {
        let value = param.real()?;
        if value.abs() > f64::from(f32::MAX) {
            return Err(fail(codes::DATA_OUT_OF_RANGE));
        }
        Ok(value as f32)
    }
}

impl<'a> FromParam<'a> for bool {
    fn from_param(param: Param<'a>) -> Result<Self, ErrorEntry> {
        if param.kind() == TokenKind::Mnemonic {
            let word = param.text();
            return if word.eq_ignore_ascii_case(b"ON") || word.eq_ignore_ascii_case(b"TRUE") {
                Ok(true)
            } else if word.eq_ignore_ascii_case(b"OFF") || word.eq_ignore_ascii_case(b"FALSE") {
                Ok(false)
            } else {
                Err(fail(codes::ILLEGAL_PARAMETER_VALUE))
            };
        }
        Ok(param.real()?.round() != 0.0)
    }
}

impl<'a> FromParam<'a> for String {
    fn from_param(param: Param<'a>) -> Result<Self, ErrorEntry> {
        param.str_data()
    }
}

impl<'a> FromParam<'a> for &'a str {
    fn from_param(param: Param<'a>) -> Result<Self, ErrorEntry> {
        param.mnemonic()
    }
}

impl<'a> FromParam<'a> for &'a [u8] {
    fn from_param(param: Param<'a>) -> Result<Self, ErrorEntry> {
        match param.kind() {
            TokenKind::Block { payload } => Ok(payload.slice(param.msg)),
            _ => Err(fail(codes::DATA_TYPE_ERROR)),
        }
    }
}

impl<'a> FromParam<'a> for Param<'a> {
    fn from_param(param: Param<'a>) -> Result<Self, ErrorEntry> {
        Ok(param)
    }
}

// ── Number ──────────────────────────────────────────────────────────────

/// Measurement units recognised in numeric suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    /// `V`
    Volt,
    /// `A`
    Ampere,
    /// `OHM`
    Ohm,
    /// `HZ`
    Hertz,
    /// `CEL`
    Celsius,
    /// `S`
    Second,
    /// `M`
    Meter,
    /// `F`
    Farad,
    /// `W`
    Watt,
    /// `DB`
    Decibel,
}

const UNITS: &[(&str, Unit)] = &[
    ("V", Unit::Volt),
    ("A", Unit::Ampere),
    ("OHM", Unit::Ohm),
    ("HZ", Unit::Hertz),
    ("CEL", Unit::Celsius),
    ("S", Unit::Second),
    ("M", Unit::Meter),
    ("F", Unit::Farad),
    ("W", Unit::Watt),
    ("DB", Unit::Decibel),
];

/// Longest prefixes first: `MA` (mega) must be tried before `M` (milli).
const PREFIXES: &[(&str, f64)] = &[
    ("EX", 1e18),
    ("PE", 1e15),
    ("MA", 1e6),
    ("T", 1e12),
    ("G", 1e9),
    ("K", 1e3),
    ("M", 1e-3),
    ("U", 1e-6),
    ("N", 1e-9),
    ("P", 1e-12),
    ("F", 1e-15),
    ("A", 1e-18),
];

fn base_unit(text: &[u8]) -> Option<Unit> {
    UNITS
        .iter()
        .find(|(name, _)| name.as_bytes() == text)
        .map(|&(_, unit)| unit)
}

/// Decode a unit suffix into its unit and multiplier.
///
/// `MHZ` and `MOHM` mean mega, as SCPI requires; otherwise a leading `M`
/// is milli and `MA` is mega.
pub fn parse_unit(text: &[u8]) -> Option<(Unit, f64)> {
    let upper = text.to_ascii_uppercase();
    match upper.as_slice() {
        b"MHZ" => return Some((Unit::Hertz, 1e6)),
        b"MOHM" => return Some((Unit::Ohm, 1e6)),
        _ => {}
    }
    if let Some(unit) = base_unit(&upper) {
        return Some((unit, 1.0));
    }
    PREFIXES.iter().find_map(|&(prefix, mult)| {
        upper
            .strip_prefix(prefix.as_bytes())
            .and_then(base_unit)
            .map(|unit| (unit, mult))
    })
}

/// Keyword values a numeric parameter may take instead of a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Special {
    /// `MINimum`
    Minimum,
    /// `MAXimum`
    Maximum,
    /// `DEFault`
    Default,
    /// `UP`
    Up,
    /// `DOWN`
    Down,
    /// `NAN`
    NotANumber,
    /// `INFinity`
    Infinity,
    /// `NINFinity`
    NegativeInfinity,
    /// `AUTO`
    Auto,
}

const SPECIALS: &[(&str, Special)] = &[
    ("MINimum", Special::Minimum),
    ("MAXimum", Special::Maximum),
    ("DEFault", Special::Default),
    ("UP", Special::Up),
    ("DOWN", Special::Down),
    ("NAN", Special::NotANumber),
    ("INFinity", Special::Infinity),
    ("NINFinity", Special::NegativeInfinity),
    ("AUTO", Special::Auto),
];

/// A numeric parameter with unit and keyword support.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// A plain value, already scaled by the unit's prefix.
    Value {
        /// Value in base units.
        value: f64,
        /// Unit given in the suffix, if any.
        unit: Option<Unit>,
    },
    /// A keyword such as `MAX`.
    Special(Special),
}

impl Number {
    /// The numeric value, where one is defined. `NAN`, `INF` and `NINF`
    /// map to their IEEE counterparts; other keywords give `None`.
    pub fn value(&self) -> Option<f64> {
        match *self {
            Number::Value { value, .. } => Some(value),
            Number::Special(Special::NotANumber) => Some(f64::NAN),
            Number::Special(Special::Infinity) => Some(f64::INFINITY),
            Number::Special(Special::NegativeInfinity) => Some(f64::NEG_INFINITY),
            Number::Special(_) => None,
        }
    }
}

impl<'a> FromParam<'a> for Number {
    fn from_param(param: Param<'a>) -> Result<Self, ErrorEntry> {
        match param.kind() {
            TokenKind::Decimal { number, unit } => {
                let value = parse_real(number.slice(param.msg))?;
                let Some(unit) = unit else {
                    return Ok(Number::Value { value, unit: None });
                };
                let (unit, mult) =
                    parse_unit(unit.slice(param.msg)).ok_or_else(|| fail(codes::INVALID_SUFFIX))?;
                Ok(Number::Value {
                    value: value * mult,
                    unit: Some(unit),
                })
            }
            TokenKind::NonDecimal { .. } => Ok(Number::Value {
                value: param.real()?,
                unit: None,
            }),
            TokenKind::Mnemonic => SPECIALS
                .iter()
                .find(|(word, _)| keyword_matches(word, param.text()))
                .map(|&(_, special)| Number::Special(special))
                .ok_or_else(|| fail(codes::ILLEGAL_PARAMETER_VALUE)),
            _ => Err(fail(codes::DATA_TYPE_ERROR)),
        }
    }
}

// ── Channel lists ───────────────────────────────────────────────────────

/// One channel-list entry. Addresses have one value per dimension
/// (`1!2` is row 1, column 2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    /// A single address.
    Single(Vec<i32>),
    /// An inclusive range of addresses.
    Range {
        /// First address.
        from: Vec<i32>,
        /// Last address.
        to: Vec<i32>,
    },
}

impl Channel {
    /// Number of dimensions of the address.
    pub fn dimensions(&self) -> usize {
        match self {
            Channel::Single(addr) => addr.len(),
            Channel::Range { from, to } => from.len().max(to.len()),
        }
    }
}

/// A parsed `(@...)` channel list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelList {
    /// Entries in order.
    pub entries: Vec<Channel>,
}

fn parse_address(text: &str) -> Result<Vec<i32>, ErrorEntry> {
    text.split('!')
        .map(|dim| dim.trim().parse().map_err(|_| fail(codes::INVALID_EXPRESSION)))
        .collect()
}

impl<'a> FromParam<'a> for ChannelList {
    fn from_param(param: Param<'a>) -> Result<Self, ErrorEntry> {
        if param.kind() != TokenKind::Expression {
            return Err(fail(codes::DATA_TYPE_ERROR));
        }
        let text =
            std::str::from_utf8(param.text()).map_err(|_| fail(codes::INVALID_EXPRESSION))?;
        let inner = text
            .strip_prefix("(@")
            .and_then(|t| t.strip_suffix(')'))
            .ok_or_else(|| fail(codes::DATA_TYPE_ERROR))?;
        let mut entries = Vec::new();
        for part in inner.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let entry = match part.split_once(':') {
                Some((from, to)) => Channel::Range {
                    from: parse_address(from)?,
                    to: parse_address(to)?,
                },
                None => Channel::Single(parse_address(part)?),
            };
            entries.push(entry);
        }
        Ok(ChannelList { entries })
    }
}

// ── Params cursor ───────────────────────────────────────────────────────

/// Cursor over the parameters of one command.
#[derive(Debug, Clone)]
pub struct Params<'a> {
    msg: &'a [u8],
    tokens: &'a [Token],
    pos: usize,
    taken: usize,
}

impl<'a> Params<'a> {
    /// Parameters given as tokens of `msg`, starting right after the header.
    pub fn new(msg: &'a [u8], tokens: &'a [Token]) -> Self {
        Self {
            msg,
            tokens,
            pos: 0,
            taken: 0,
        }
    }

    /// Whether unread parameter tokens remain.
    pub fn has_remaining(&self) -> bool {
        self.pos < self.tokens.len()
    }

    /// Number of parameters pulled so far.
    pub fn taken(&self) -> usize {
        self.taken
    }

    /// Locate the next parameter without consuming it.
    fn peek(&self, mandatory: bool) -> Result<Option<(Param<'a>, usize)>, ErrorEntry> {
        let mut i = self.pos;
        if i >= self.tokens.len() {
            return if mandatory {
                Err(fail(codes::MISSING_PARAMETER))
            } else {
                Ok(None)
            };
        }
        if self.taken > 0 {
            if self.tokens[i].kind != TokenKind::Comma {
                return Err(fail(codes::INVALID_SEPARATOR));
            }
            i += 1;
        }
        let token = *self.tokens.get(i).ok_or_else(|| fail(codes::SYNTAX_ERROR))?;
        if !token.is_data() {
            return Err(fail(codes::SYNTAX_ERROR));
        }
        Ok(Some((Param { token, msg: self.msg }, i + 1)))
    }

    fn pull_with<T>(
        &mut self,
        mandatory: bool,
        decode: impl FnOnce(Param<'a>) -> Result<T, ErrorEntry>,
    ) -> Result<Option<T>, ErrorEntry> {
        let Some((param, next)) = self.peek(mandatory)? else {
            return Ok(None);
        };
        let value = decode(param)?;
        self.pos = next;
        self.taken += 1;
        Ok(Some(value))
    }

    /// Pull any [`FromParam`] type.
    pub fn pull<T: FromParam<'a>>(&mut self, mandatory: bool) -> Result<Option<T>, ErrorEntry> {
        self.pull_with(mandatory, T::from_param)
    }

    /// Pull a mandatory parameter.
    pub fn required<T: FromParam<'a>>(&mut self) -> Result<T, ErrorEntry> {
        self.pull(true)?.ok_or_else(|| fail(codes::MISSING_PARAMETER))
    }

    /// Pull an optional parameter.
    pub fn optional<T: FromParam<'a>>(&mut self) -> Result<Option<T>, ErrorEntry> {
        self.pull(false)
    }

    /// 32-bit integer.
    pub fn int32(&mut self, mandatory: bool) -> Result<Option<i32>, ErrorEntry> {
        self.pull(mandatory)
    }

    /// 64-bit integer.
    pub fn int64(&mut self, mandatory: bool) -> Result<Option<i64>, ErrorEntry> {
        self.pull(mandatory)
    }

    /// Single-precision float.
    pub fn float(&mut self, mandatory: bool) -> Result<Option<f32>, ErrorEntry> {
        self.pull(mandatory)
    }

    /// Double-precision float.
    pub fn double(&mut self, mandatory: bool) -> Result<Option<f64>, ErrorEntry> {
        self.pull(mandatory)
    }

    /// Boolean.
    pub fn bool(&mut self, mandatory: bool) -> Result<Option<bool>, ErrorEntry> {
        self.pull(mandatory)
    }

    /// Quoted string, unescaped.
    pub fn text(&mut self, mandatory: bool) -> Result<Option<String>, ErrorEntry> {
        self.pull(mandatory)
    }

    /// Raw character data.
    pub fn characters(&mut self, mandatory: bool) -> Result<Option<&'a str>, ErrorEntry> {
        self.pull(mandatory)
    }

    /// Arbitrary block payload.
    pub fn block(&mut self, mandatory: bool) -> Result<Option<&'a [u8]>, ErrorEntry> {
        self.pull(mandatory)
    }

    /// Number with unit and keyword support.
    pub fn number(&mut self, mandatory: bool) -> Result<Option<Number>, ErrorEntry> {
        self.pull(mandatory)
    }

    /// Channel list.
    pub fn channel_list(&mut self, mandatory: bool) -> Result<Option<ChannelList>, ErrorEntry> {
        self.pull(mandatory)
    }

    /// Keyword from `options`, matched like a header mnemonic. The first
    /// matching option's tag is returned.
    pub fn choice(
        &mut self,
        options: &[(&str, i32)],
        mandatory: bool,
    ) -> Result<Option<i32>, ErrorEntry> {
        self.pull_with(mandatory, |param| {
            let word = param.mnemonic()?;
            options
                .iter()
                .find(|(keyword, _)| keyword_matches(keyword, word.as_bytes()))
                .map(|&(_, tag)| tag)
                .ok_or_else(|| fail(codes::ILLEGAL_PARAMETER_VALUE))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    /// Run `f` over the parameters of `input` (no header).
    fn with_params<'s, T>(input: &'s str, f: impl FnOnce(&mut Params<'s>) -> T) -> T {
        let tokens: &'s [Token] = Box::leak(tokenize(input.as_bytes()).into_boxed_slice());
        let mut p = Params::new(input.as_bytes(), tokens);
        f(&mut p)
    }

    fn code<T: std::fmt::Debug>(r: Result<T, ErrorEntry>) -> i16 {
        r.unwrap_err().code
    }

    #[test]
    fn integers() {
        assert_eq!(with_params("42", |p| p.int32(true)), Ok(Some(42)));
        assert_eq!(with_params("-7", |p| p.int32(true)), Ok(Some(-7)));
        assert_eq!(with_params("2.5", |p| p.int32(true)), Ok(Some(3)));
        assert_eq!(with_params("-2.5", |p| p.int32(true)), Ok(Some(-3)));
        assert_eq!(with_params("1e3", |p| p.int32(true)), Ok(Some(1000)));
        assert_eq!(with_params("#HFF", |p| p.int32(true)), Ok(Some(255)));
        assert_eq!(with_params("#Q17", |p| p.int32(true)), Ok(Some(15)));
        assert_eq!(with_params("#B101", |p| p.int32(true)), Ok(Some(5)));
        assert_eq!(
            with_params("9223372036854775807", |p| p.int64(true)),
            Ok(Some(i64::MAX))
        );
    }

    #[test]
    fn integer_range_errors() {
        assert_eq!(code(with_params("2147483648", |p| p.int32(true))), codes::DATA_OUT_OF_RANGE);
        assert_eq!(code(with_params("1e30", |p| p.int64(true))), codes::DATA_OUT_OF_RANGE);
        assert_eq!(code(with_params("#HFFFFFFFFFFFFFFFFF", |p| p.int64(true))), codes::DATA_OUT_OF_RANGE);
    }

    #[test]
    fn type_mismatch() {
        assert_eq!(code(with_params("\"x\"", |p| p.int32(true))), codes::DATA_TYPE_ERROR);
        assert_eq!(code(with_params("ON", |p| p.double(true))), codes::DATA_TYPE_ERROR);
        assert_eq!(code(with_params("5", |p| p.text(true))), codes::DATA_TYPE_ERROR);
        assert_eq!(code(with_params("5", |p| p.block(true))), codes::DATA_TYPE_ERROR);
    }

    #[test]
    fn suffix_not_allowed_on_plain_numbers() {
        assert_eq!(code(with_params("5 V", |p| p.int32(true))), codes::SUFFIX_NOT_ALLOWED);
        assert_eq!(code(with_params("5V", |p| p.double(true))), codes::SUFFIX_NOT_ALLOWED);
    }

    #[test]
    fn missing_and_optional() {
        assert_eq!(code(with_params("", |p| p.int32(true))), codes::MISSING_PARAMETER);
        assert_eq!(with_params("", |p| p.int32(false)), Ok(None));
        assert_eq!(with_params("", |p| p.optional::<f64>()), Ok(None));
        assert_eq!(code(with_params("", |p| p.required::<bool>())), codes::MISSING_PARAMETER);
    }

    #[test]
    fn separators() {
        with_params("1,2", |p| {
            assert_eq!(p.int32(true), Ok(Some(1)));
            assert_eq!(p.int32(true), Ok(Some(2)));
            assert!(!p.has_remaining());
            assert_eq!(p.taken(), 2);
        });
        with_params("1 2", |p| {
            assert_eq!(p.int32(true), Ok(Some(1)));
            assert_eq!(code(p.int32(true)), codes::INVALID_SEPARATOR);
        });
        with_params("1,", |p| {
            assert_eq!(p.int32(true), Ok(Some(1)));
            assert_eq!(code(p.int32(false)), codes::SYNTAX_ERROR);
        });
        with_params(",1", |p| assert_eq!(code(p.int32(true)), codes::SYNTAX_ERROR));
    }

    #[test]
    fn cursor_does_not_advance_on_error() {
        with_params("\"abc\",5", |p| {
            assert_eq!(code(p.int32(true)), codes::DATA_TYPE_ERROR);
            assert_eq!(p.taken(), 0);
            assert_eq!(p.text(true), Ok(Some("abc".to_string())));
            assert_eq!(p.int32(true), Ok(Some(5)));
        });
    }

    #[test]
    fn doubles() {
        assert_eq!(with_params("-2.5E-3", |p| p.double(true)), Ok(Some(-0.0025)));
        assert_eq!(with_params("#H10", |p| p.double(true)), Ok(Some(16.0)));
        assert_eq!(with_params("0.5", |p| p.float(true)), Ok(Some(0.5f32)));
        assert_eq!(code(with_params("1e39", |p| p.float(true))), codes::DATA_OUT_OF_RANGE);
    }

    #[test]
    fn booleans() {
        for (input, want) in [("ON", true), ("off", false), ("True", true), ("FALSE", false), ("0", false), ("1", true), ("5", true), ("0.4", false), ("-1", true)] {
            assert_eq!(with_params(input, |p| p.bool(true)), Ok(Some(want)), "{input}");
        }
        assert_eq!(code(with_params("MAYBE", |p| p.bool(true))), codes::ILLEGAL_PARAMETER_VALUE);
        assert_eq!(code(with_params("'on'", |p| p.bool(true))), codes::DATA_TYPE_ERROR);
    }

    #[test]
    fn text_unescapes_doubled_quotes() {
        assert_eq!(with_params(r#""say ""hi""""#, |p| p.text(true)), Ok(Some("say \"hi\"".to_string())));
        assert_eq!(with_params("'it''s'", |p| p.text(true)), Ok(Some("it's".to_string())));
        assert_eq!(with_params("'say \"x\"'", |p| p.text(true)), Ok(Some("say \"x\"".to_string())));
    }

    #[test]
    fn characters_and_choice() {
        assert_eq!(with_params("Volt", |p| p.characters(true)), Ok(Some("Volt")));
        let options = [("LOW", 0), ("MEDium", 1), ("HIGH", 2)];
        assert_eq!(with_params("med", |p| p.choice(&options, true)), Ok(Some(1)));
        assert_eq!(with_params("MEDIUM", |p| p.choice(&options, true)), Ok(Some(1)));
        assert_eq!(code(with_params("MEDI", |p| p.choice(&options, true))), codes::ILLEGAL_PARAMETER_VALUE);
        assert_eq!(code(with_params("1", |p| p.choice(&options, true))), codes::DATA_TYPE_ERROR);
    }

    #[test]
    fn blocks() {
        assert_eq!(with_params("#15ab\0cd", |p| p.block(true)), Ok(Some(&b"ab\0cd"[..])));
        assert_eq!(with_params("#0raw", |p| p.block(true)), Ok(Some(&b"raw"[..])));
    }

    #[test]
    fn numbers_with_units_and_keywords() {
        assert_eq!(
            with_params("10 mV", |p| p.number(true)),
            Ok(Some(Number::Value { value: 10.0 * 1e-3, unit: Some(Unit::Volt) }))
        );
        assert_eq!(
            with_params("2 MHZ", |p| p.number(true)),
            Ok(Some(Number::Value { value: 2e6, unit: Some(Unit::Hertz) }))
        );
        assert_eq!(with_params("MAX", |p| p.number(true)), Ok(Some(Number::Special(Special::Maximum))));
        assert_eq!(with_params("minimum", |p| p.number(true)), Ok(Some(Number::Special(Special::Minimum))));
        assert_eq!(
            with_params("#H20", |p| p.number(true)),
            Ok(Some(Number::Value { value: 32.0, unit: None }))
        );
        assert_eq!(code(with_params("5 XYZ", |p| p.number(true))), codes::INVALID_SUFFIX);
        assert_eq!(code(with_params("LOTS", |p| p.number(true))), codes::ILLEGAL_PARAMETER_VALUE);
        assert!(Number::Special(Special::NotANumber).value().is_some_and(f64::is_nan));
        assert_eq!(Number::Special(Special::Up).value(), None);
    }

    #[test]
    fn unit_table() {
        assert_eq!(parse_unit(b"V"), Some((Unit::Volt, 1.0)));
        assert_eq!(parse_unit(b"ma"), Some((Unit::Ampere, 1e-3)));
        assert_eq!(parse_unit(b"MAV"), Some((Unit::Volt, 1e6)));
        assert_eq!(parse_unit(b"KOHM"), Some((Unit::Ohm, 1e3)));
        assert_eq!(parse_unit(b"MOHM"), Some((Unit::Ohm, 1e6)));
        assert_eq!(parse_unit(b"mm"), Some((Unit::Meter, 1e-3)));
        assert_eq!(parse_unit(b"PF"), Some((Unit::Farad, 1e-12)));
        assert_eq!(parse_unit(b"DB"), Some((Unit::Decibel, 1.0)));
        assert_eq!(parse_unit(b"US"), Some((Unit::Second, 1e-6)));
        assert_eq!(parse_unit(b"QQ"), None);
    }

    #[test]
    fn channel_lists() {
        let list = with_params("(@1,2:4,1!2,3!1:3!4)", |p| p.channel_list(true))
            .unwrap()
            .unwrap();
        assert_eq!(
            list.entries,
            vec![
                Channel::Single(vec![1]),
                Channel::Range { from: vec![2], to: vec![4] },
                Channel::Single(vec![1, 2]),
                Channel::Range { from: vec![3, 1], to: vec![3, 4] },
            ]
        );
        assert_eq!(list.entries[2].dimensions(), 2);
        assert_eq!(with_params("(@)", |p| p.channel_list(true)), Ok(Some(ChannelList::default())));
        assert_eq!(code(with_params("(1,2)", |p| p.channel_list(true))), codes::DATA_TYPE_ERROR);
        assert_eq!(code(with_params("(@1,x)", |p| p.channel_list(true))), codes::INVALID_EXPRESSION);
        assert_eq!(code(with_params("1", |p| p.channel_list(true))), codes::DATA_TYPE_ERROR);
    }

    #[test]
    fn raw_param_access() {
        with_params("#H1F", |p| {
            let raw: Param<'_> = p.required().unwrap();
            assert_eq!(raw.kind(), TokenKind::NonDecimal { radix: 16 });
            assert_eq!(raw.text(), b"#H1F");
        });
    }
}
