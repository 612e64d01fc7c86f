//! Command dispatch: header assembly, lookup and handler invocation.
//!
//! Commands are dispatched one at a time as soon as their `;` or terminator
//! has been lexed. Each command's header is built from its mnemonics,
//! relative to the previous command's header unless it starts with `:`, is
//! a common (`*`) command, or starts a new message. Every failing command
//! queues exactly one error, produces no output, and does not stop the
//! commands after it.

use scpi_engine_diagnostics::{ErrorEntry, codes};
use scpi_engine_tables::MatchError;
use tracing::debug;

use crate::context::{Interface, Session};
use crate::handler::{Call, Table};
use crate::lexer::{CommandEnd, Token, TokenKind};
use crate::params::Params;

/// A parsed command header.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Header<'m> {
    /// Mnemonics of the full path, prefix applied.
    path: Vec<&'m [u8]>,
    query: bool,
    common: bool,
    /// Index of the first token after the header.
    params_start: usize,
}

impl Header<'_> {
    fn text(&self) -> String {
        let mut text = self
            .path
            .iter()
            .map(|word| String::from_utf8_lossy(word))
            .collect::<Vec<_>>()
            .join(":");
        if self.query {
            text.push('?');
        }
        text
    }
}

/// Run one command of a message.
///
/// `tokens` excludes the `;` or terminator that ended the command. The
/// common-header prefix and whether a `;` has been seen carry over in the
/// session until the message ends.
pub(crate) fn run_command<U>(
    table: &Table<U>,
    state: &mut U,
    session: &mut Session,
    host: &mut dyn Interface,
    buf: &[u8],
    tokens: &[Token],
    end: CommandEnd,
) {
    let after_separator = session.message.after_separator;
    session.message.after_separator = end == CommandEnd::Separator;

    if tokens.is_empty() {
        // A bare terminator is an empty message; anything else next to a
        // `;` is an empty command.
        session.message.prefix.clear();
        if after_separator || end == CommandEnd::Separator {
            debug!("empty command");
            session.push_error(host, ErrorEntry::from_code(codes::SYNTAX_ERROR));
        }
    } else {
        execute(table, state, session, host, buf, tokens);
    }

    if end == CommandEnd::Terminator {
        session.message.clear();
    }
}

fn execute<U>(
    table: &Table<U>,
    state: &mut U,
    session: &mut Session,
    host: &mut dyn Interface,
    buf: &[u8],
    tokens: &[Token],
) {
    let owned = std::mem::take(&mut session.message.prefix);
    let previous: Vec<&[u8]> = owned.iter().map(Vec::as_slice).collect();
    let header = parse_header(buf, tokens, &previous);
    if let Ok(h) = &header
        && !h.common
    {
        session.message.prefix = h.path[..h.path.len() - 1]
            .iter()
            .map(|word| word.to_vec())
            .collect();
    }

    let invalid = tokens.iter().find_map(|t| match t.kind {
        TokenKind::Invalid { code } => Some(code),
        _ => None,
    });
    let header = match (invalid, header) {
        (Some(code), _) | (None, Err(code)) => {
            debug!(code, "rejected command");
            session.push_error(host, ErrorEntry::from_code(code));
            return;
        }
        (None, Ok(header)) => header,
    };

    let found = match table.lookup(&header.path, header.query) {
        Ok(found) => found,
        Err(err) => {
            let code = match err {
                MatchError::SuffixOutOfRange { .. } => codes::HEADER_SUFFIX_OUT_OF_RANGE,
                _ => codes::UNDEFINED_HEADER,
            };
            debug!(header = %header.text(), code, "no handler");
            session.push_error(host, ErrorEntry::from_code(code));
            return;
        }
    };
    let Some(entry) = table.entry(found.entry) else {
        session.push_error(host, ErrorEntry::from_code(codes::UNDEFINED_HEADER));
        return;
    };

    let text = header.text();
    debug!(header = %text, pattern = %entry.pattern, "dispatching command");
    session.output.begin_command();
    let params = Params::new(buf, &tokens[header.params_start..]);
    let mut call = Call::new(
        params,
        &text,
        &found.suffixes,
        &entry.pattern,
        &mut *state,
        &mut *session,
        &mut *host,
    );
    let mut result = entry.handler.call(&mut call);
    if result.is_ok() && call.has_unread_params() {
        result = Err(ErrorEntry::from_code(codes::PARAMETER_NOT_ALLOWED));
    }
    let already_pushed = call.errors_pushed();

    if session.output.overflowed() {
        result = Err(ErrorEntry::from_code(codes::TOO_MUCH_DATA));
    }
    let result = result.and_then(|()| session.output.end_command());
    if let Err(err) = result {
        session.output.rollback();
        if !already_pushed {
            session.push_error(host, err);
        }
    }
}

/// Parse the header at the start of `tokens`.
///
/// Errors carry the SCPI code: `-102` for structural faults, `-111` when a
/// parameter follows the header without whitespace.
fn parse_header<'m>(
    msg: &'m [u8],
    tokens: &[Token],
    prefix: &[&'m [u8]],
) -> Result<Header<'m>, i16> {
    let absolute = tokens.first().is_some_and(|t| t.kind == TokenKind::Colon);
    let mut i = usize::from(absolute);
    let mut words = Vec::new();
    loop {
        let word = tokens
            .get(i)
            .filter(|t| t.kind == TokenKind::Mnemonic)
            .ok_or(codes::SYNTAX_ERROR)?;
        if i > 0 && word.ws_before {
            return Err(codes::SYNTAX_ERROR);
        }
        words.push(word.text(msg));
        i += 1;
        match tokens.get(i) {
            Some(t) if t.kind == TokenKind::Colon && !t.ws_before => i += 1,
            _ => break,
        }
    }

    let mut query = false;
    if let Some(t) = tokens.get(i).filter(|t| t.kind == TokenKind::Query) {
        if t.ws_before {
            return Err(codes::SYNTAX_ERROR);
        }
        query = true;
        i += 1;
    }

    if let Some(next) = tokens.get(i) {
        match next.kind {
            TokenKind::Colon | TokenKind::Query => return Err(codes::SYNTAX_ERROR),
            TokenKind::Invalid { .. } => {}
            TokenKind::Mnemonic if !next.ws_before => return Err(codes::SYNTAX_ERROR),
            _ if !next.ws_before => return Err(codes::HEADER_SEPARATOR_ERROR),
            _ => {}
        }
    }

    let common = words.len() == 1 && words[0].starts_with(b"*");
    let path = if common || absolute {
        words
    } else {
        prefix.iter().copied().chain(words).collect()
    };
    Ok(Header {
        path,
        query,
        common,
        params_start: i,
    })
}
