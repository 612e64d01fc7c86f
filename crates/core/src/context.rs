//! Session context: buffers, host hooks and the input loop.

use std::sync::Arc;

use scpi_engine_diagnostics::{ErrorEntry, ErrorQueue, codes};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::config::Config;
use crate::dispatch;
use crate::error::EngineError;
use crate::handler::Table;
use crate::lexer::{CommandEnd, scan_command};
use crate::response::Response;
use crate::status::StatusRegisters;

// ── Host interface ──────────────────────────────────────────────────────

/// Out-of-band bus signals raised by the engine.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    /// Service request; the value is the status byte.
    ServiceRequest,
}

/// Hooks the host provides to a [`Context`].
///
/// Only [`write`](Interface::write) is required.
pub trait Interface {
    /// Emit response bytes. Returns how many were accepted.
    fn write(&mut self, data: &[u8]) -> usize;

    /// Called once for every queued error.
    fn error(&mut self, _entry: &ErrorEntry) {}

    /// Raise a bus signal.
    fn control(&mut self, _control: Control, _value: u16) {}

    /// Called after a response has been handed to [`write`](Interface::write).
    fn flush(&mut self) {}

    /// Called on `*RST` and [`Context::reset`].
    fn reset(&mut self) {}
}

/// Collects responses in memory.
impl Interface for Vec<u8> {
    fn write(&mut self, data: &[u8]) -> usize {
        self.extend_from_slice(data);
        data.len()
    }
}

/// Strings returned verbatim by `*IDN?`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Manufacturer name.
    pub manufacturer: String,
    /// Model name.
    pub model: String,
    /// Serial number.
    pub serial: String,
    /// Firmware version.
    pub version: String,
}

impl Identity {
    /// Build an identity from its four fields.
    pub fn new(
        manufacturer: impl Into<String>,
        model: impl Into<String>,
        serial: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            manufacturer: manufacturer.into(),
            model: model.into(),
            serial: serial.into(),
            version: version.into(),
        }
    }
}

// ── Session ─────────────────────────────────────────────────────────────

/// Parser state carried from one command to the next within a message.
#[derive(Debug, Default)]
pub(crate) struct MessageState {
    /// Header path minus its last mnemonic, for relative headers.
    pub(crate) prefix: Vec<Vec<u8>>,
    /// The previous command ended with `;`.
    pub(crate) after_separator: bool,
}

impl MessageState {
    pub(crate) fn clear(&mut self) {
        self.prefix.clear();
        self.after_separator = false;
    }
}

/// Per-session state the dispatcher and handlers share.
#[derive(Debug)]
pub(crate) struct Session {
    pub(crate) errors: ErrorQueue,
    pub(crate) status: StatusRegisters,
    pub(crate) output: Response,
    pub(crate) identity: Identity,
    pub(crate) message: MessageState,
    pub(crate) reset_requested: bool,
}

impl Session {
    fn new(config: &Config, identity: Identity) -> Self {
        Self {
            errors: ErrorQueue::new(config.error_queue_capacity),
            status: StatusRegisters::new(),
            output: Response::new(config.output_capacity, config.line_ending),
            identity,
            message: MessageState::default(),
            reset_requested: false,
        }
    }

    /// Queue an error, notify the host and update status.
    pub(crate) fn push_error(&mut self, host: &mut dyn Interface, entry: ErrorEntry) {
        warn!(code = entry.code, message = %entry.message, "scpi error");
        host.error(&entry);
        self.status.record_error(entry.class());
        if !self.errors.push(entry) {
            warn!(capacity = self.errors.capacity(), "error queue overflowed");
        }
        self.update_status(host);
    }

    pub(crate) fn status_byte(&self) -> u8 {
        self.status.status_byte(!self.errors.is_empty())
    }

    /// Raise a service request if one has just become active.
    pub(crate) fn update_status(&mut self, host: &mut dyn Interface) {
        let stb = self.status_byte();
        if self.status.poll_service_request(stb) {
            trace!(stb, "service request");
            host.control(Control::ServiceRequest, u16::from(stb));
        }
    }

    /// What `*RST` clears.
    fn clear_for_reset(&mut self) {
        self.output.clear();
        self.errors.clear();
        self.message.clear();
        self.reset_requested = false;
    }
}

// ── Context ─────────────────────────────────────────────────────────────

/// One SCPI session.
///
/// Bytes go in through [`input`](Self::input); responses come out through
/// the host's [`Interface::write`] at the end of every message. `U` is the
/// instrument state handed to every handler.
pub struct Context<U, I: Interface> {
    table: Arc<Table<U>>,
    host: I,
    user: U,
    config: Config,
    input: Vec<u8>,
    overrun: bool,
    session: Session,
}

impl<U, I: Interface> Context<U, I> {
    /// Create a session over a built table.
    pub fn new(
        table: Arc<Table<U>>,
        host: I,
        user: U,
        identity: Identity,
        config: Config,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            table,
            host,
            user,
            input: Vec::with_capacity(config.input_capacity),
            overrun: false,
            session: Session::new(&config, identity),
            config,
        })
    }

    /// Feed input bytes. An empty slice signals end-of-input: whatever is
    /// buffered is processed as a final message.
    ///
    /// Commands are dispatched as soon as their `;` or terminator is
    /// buffered, so only one command needs to fit in the input buffer at a
    /// time. Responses are flushed at the end of each message.
    pub fn input(&mut self, data: &[u8]) -> Result<(), EngineError> {
        if self.overrun {
            return Err(EngineError::ResetRequired);
        }
        if data.is_empty() {
            self.process(true);
            return Ok(());
        }
        let mut rest = data;
        while !rest.is_empty() {
            let room = self.config.input_capacity - self.input.len();
            if room == 0 {
                return Err(self.overrun());
            }
            let (head, tail) = rest.split_at(room.min(rest.len()));
            self.input.extend_from_slice(head);
            rest = tail;
            if self.process(false) {
                break;
            }
        }
        Ok(())
    }

    fn overrun(&mut self) -> EngineError {
        let capacity = self.config.input_capacity;
        warn!(capacity, "input buffer overrun");
        self.input.clear();
        self.overrun = true;
        self.session.push_error(
            &mut self.host,
            ErrorEntry::from_code(codes::INPUT_BUFFER_OVERRUN),
        );
        EngineError::BufferOverflow { capacity }
    }

    /// Dispatch every complete command in the input buffer, flushing the
    /// response at the end of each message. Returns `true` if `*RST` ran,
    /// in which case all pending input has been dropped.
    fn process(&mut self, eof: bool) -> bool {
        let mut consumed = 0;
        while let Some(command) = scan_command(&self.input[consumed..], eof) {
            let bytes = &self.input[consumed..consumed + command.len];
            consumed += command.len;
            dispatch::run_command(
                &self.table,
                &mut self.user,
                &mut self.session,
                &mut self.host,
                bytes,
                &command.tokens,
                command.end,
            );
            if self.session.reset_requested {
                trace!("*RST: discarding pending input");
                self.input.clear();
                self.session.clear_for_reset();
                self.host.reset();
                return true;
            }
            if command.end == CommandEnd::Terminator {
                self.flush();
            }
            if command.len == 0 {
                break;
            }
        }
        self.input.drain(..consumed);
        false
    }

    fn flush(&mut self) {
        if self.session.output.is_empty() {
            return;
        }
        let bytes = self.session.output.take();
        trace!(len = bytes.len(), "flushing response");
        let written = self.host.write(&bytes);
        if written < bytes.len() {
            warn!(written, len = bytes.len(), "host accepted a partial response");
        }
        self.host.flush();
    }

    /// Drop all buffered input and output, the error queue and status
    /// registers, and call the host's reset hook. Clears a pending
    /// overrun. The table and instrument state are kept.
    pub fn reset(&mut self) {
        self.input.clear();
        self.overrun = false;
        self.session.clear_for_reset();
        self.session.status.reset();
        self.host.reset();
    }

    // ── Accessors ───────────────────────────────────────────────────────

    /// Instrument state.
    pub fn user(&self) -> &U {
        &self.user
    }

    /// Instrument state, mutably.
    pub fn user_mut(&mut self) -> &mut U {
        &mut self.user
    }

    /// Host interface.
    pub fn host(&self) -> &I {
        &self.host
    }

    /// Host interface, mutably.
    pub fn host_mut(&mut self) -> &mut I {
        &mut self.host
    }

    /// The command table.
    pub fn table(&self) -> &Arc<Table<U>> {
        &self.table
    }

    /// Session configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Identification strings.
    pub fn identity(&self) -> &Identity {
        &self.session.identity
    }

    /// Pending errors.
    pub fn errors(&self) -> &ErrorQueue {
        &self.session.errors
    }

    /// Pop the oldest error, or `0,"No error"`.
    pub fn pop_error(&mut self) -> ErrorEntry {
        let entry = self.session.errors.pop();
        self.session.update_status(&mut self.host);
        entry
    }

    /// Queue a device-specific error from outside a handler.
    pub fn push_error(&mut self, entry: ErrorEntry) {
        self.session.push_error(&mut self.host, entry);
    }

    /// Status registers.
    pub fn status(&self) -> &StatusRegisters {
        &self.session.status
    }

    /// Current status byte.
    pub fn status_byte(&self) -> u8 {
        self.session.status_byte()
    }

    /// Whether input is refused until [`reset`](Self::reset).
    pub fn is_overrun(&self) -> bool {
        self.overrun
    }
}
