//! Command handlers and the per-call context they receive.

use scpi_engine_diagnostics::ErrorEntry;
use scpi_engine_tables::{CommandPattern, CommandTable};

use crate::context::{Identity, Interface, Session};
use crate::params::{ChannelList, FromParam, Number, Params};
use crate::response::Response;
use crate::status::StatusRegisters;

/// A bound command handler.
///
/// Implemented for every `Fn(&mut Call<'_, U>) -> Result<(), ErrorEntry>`
/// closure, so most handlers are plain functions. Returning `Err` queues the
/// entry, unless the handler already queued one with [`Call::push_error`].
pub trait Handler<U>: Send + Sync {
    /// Execute one command.
    fn call(&self, call: &mut Call<'_, U>) -> Result<(), ErrorEntry>;
}

impl<U, F> Handler<U> for F
where
    F: Fn(&mut Call<'_, U>) -> Result<(), ErrorEntry> + Send + Sync,
{
    fn call(&self, call: &mut Call<'_, U>) -> Result<(), ErrorEntry> {
        self(call)
    }
}

/// Type-erased handler stored in a table.
pub type BoxedHandler<U> = Box<dyn Handler<U>>;

/// Command table bound to handlers over instrument state `U`.
pub type Table<U> = CommandTable<BoxedHandler<U>>;

/// Box a closure as a handler. Pins down the closure's argument type so
/// it can be written without annotations.
pub fn handler<U, F>(f: F) -> BoxedHandler<U>
where
    U: 'static,
    F: Fn(&mut Call<'_, U>) -> Result<(), ErrorEntry> + Send + Sync + 'static,
{
    Box::new(f)
}

/// Everything a handler may touch while it runs: its parameters, the
/// matched header, the instrument state and the session's output.
pub struct Call<'a, U> {
    params: Params<'a>,
    header: &'a str,
    suffixes: &'a [Option<u32>],
    pattern: &'a CommandPattern,
    state: &'a mut U,
    session: &'a mut Session,
    host: &'a mut dyn Interface,
    errors_pushed: bool,
}

impl<'a, U> Call<'a, U> {
    pub(crate) fn new(
        params: Params<'a>,
        header: &'a str,
        suffixes: &'a [Option<u32>],
        pattern: &'a CommandPattern,
        state: &'a mut U,
        session: &'a mut Session,
        host: &'a mut dyn Interface,
    ) -> Self {
        Self {
            params,
            header,
            suffixes,
            pattern,
            state,
            session,
            host,
            errors_pushed: false,
        }
    }

    /// The instrument state.
    pub fn state(&mut self) -> &mut U {
        &mut *self.state
    }

    /// The parameter cursor, for pulls not covered by the shortcuts below.
    pub fn params(&mut self) -> &mut Params<'a> {
        &mut self.params
    }

    pub(crate) fn has_unread_params(&self) -> bool {
        self.params.has_remaining()
    }

    pub(crate) fn errors_pushed(&self) -> bool {
        self.errors_pushed
    }

    // ── Parameters ──────────────────────────────────────────────────────

    /// Pull a mandatory parameter of any [`FromParam`] type.
    pub fn required<T: FromParam<'a>>(&mut self) -> Result<T, ErrorEntry> {
        self.params.required()
    }

    /// Pull an optional parameter of any [`FromParam`] type.
    pub fn optional<T: FromParam<'a>>(&mut self) -> Result<Option<T>, ErrorEntry> {
        self.params.optional()
    }

    /// See [`Params::int32`].
    pub fn int32(&mut self, mandatory: bool) -> Result<Option<i32>, ErrorEntry> {
        self.params.int32(mandatory)
    }

    /// See [`Params::int64`].
    pub fn int64(&mut self, mandatory: bool) -> Result<Option<i64>, ErrorEntry> {
        self.params.int64(mandatory)
    }

    /// See [`Params::float`].
    pub fn float(&mut self, mandatory: bool) -> Result<Option<f32>, ErrorEntry> {
        self.params.float(mandatory)
    }

    /// See [`Params::double`].
    pub fn double(&mut self, mandatory: bool) -> Result<Option<f64>, ErrorEntry> {
        self.params.double(mandatory)
    }

    /// See [`Params::bool`].
    pub fn bool(&mut self, mandatory: bool) -> Result<Option<bool>, ErrorEntry> {
        self.params.bool(mandatory)
    }

    /// See [`Params::text`].
    pub fn text(&mut self, mandatory: bool) -> Result<Option<String>, ErrorEntry> {
        self.params.text(mandatory)
    }

    /// See [`Params::characters`].
    pub fn characters(&mut self, mandatory: bool) -> Result<Option<&'a str>, ErrorEntry> {
        self.params.characters(mandatory)
    }

    /// See [`Params::choice`].
    pub fn choice(
        &mut self,
        options: &[(&str, i32)],
        mandatory: bool,
    ) -> Result<Option<i32>, ErrorEntry> {
        self.params.choice(options, mandatory)
    }

    /// See [`Params::block`].
    pub fn block(&mut self, mandatory: bool) -> Result<Option<&'a [u8]>, ErrorEntry> {
        self.params.block(mandatory)
    }

    /// See [`Params::number`].
    pub fn number(&mut self, mandatory: bool) -> Result<Option<Number>, ErrorEntry> {
        self.params.number(mandatory)
    }

    /// See [`Params::channel_list`].
    pub fn channel_list(&mut self, mandatory: bool) -> Result<Option<ChannelList>, ErrorEntry> {
        self.params.channel_list(mandatory)
    }

    // ── Header ──────────────────────────────────────────────────────────

    /// The full header as received, prefix applied (`TEST3:NUMBERS5`).
    pub fn header(&self) -> &str {
        self.header
    }

    /// The pattern that matched.
    pub fn pattern(&self) -> &CommandPattern {
        self.pattern
    }

    /// Whether the matched command is a query.
    pub fn is_query(&self) -> bool {
        self.pattern.query
    }

    /// Whether the received header also matches `pattern`. Lets one handler
    /// serve several table entries.
    pub fn is_command(&self, pattern: &str) -> bool {
        CommandPattern::parse(pattern).is_ok_and(|p| p.matches(self.header))
    }

    /// Captured numeric suffixes, one per `#` segment of the pattern.
    pub fn suffixes(&self) -> &[Option<u32>] {
        self.suffixes
    }

    /// The `index`-th numeric suffix, if the input carried digits for it.
    pub fn suffix(&self, index: usize) -> Option<u32> {
        self.suffixes.get(index).copied().flatten()
    }

    /// The `index`-th numeric suffix, or `default` when absent.
    pub fn suffix_or(&self, index: usize, default: u32) -> u32 {
        self.suffix(index).unwrap_or(default)
    }

    // ── Session ─────────────────────────────────────────────────────────

    /// The response buffer.
    pub fn output(&mut self) -> &mut Response {
        &mut self.session.output
    }

    /// Status registers of the session.
    pub fn status(&mut self) -> &mut StatusRegisters {
        &mut self.session.status
    }

    /// Identification strings.
    pub fn identity(&self) -> &Identity {
        &self.session.identity
    }

    /// Queue an error now. The command still counts as failed if the
    /// handler then returns `Err`, but that entry is not queued a second
    /// time.
    pub fn push_error(&mut self, entry: ErrorEntry) {
        self.errors_pushed = true;
        self.session.push_error(&mut *self.host, entry);
    }

    /// Session and host together, for the common commands.
    pub(crate) fn session_and_host(&mut self) -> (&mut Session, &mut dyn Interface) {
        (&mut *self.session, &mut *self.host)
    }
}
