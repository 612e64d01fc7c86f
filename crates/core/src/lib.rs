//! SCPI command engine core.
//!
//! Feeds raw bytes through a streaming [lexer](lexer), matches each
//! command's header against a compiled [`Table`], and runs the bound
//! [`Handler`]. Handlers pull typed [parameters](params) and append
//! [responses](response); failures are queued as SCPI errors and read back
//! with `SYSTem:ERRor?`. The main entry point is [`Context`].
//!
//! ```
//! use std::sync::Arc;
//! use scpi_engine_core::{Config, Context, Identity, Table, handler, ieee488};
//!
//! let table: Table<i32> = ieee488::register(Table::builder())
//!     .command("VALue", handler(|call| {
//!         let v = call.required::<i32>()?;
//!         *call.state() = v;
//!         Ok(())
//!     }))
//!     .command("VALue?", handler(|call| {
//!         let v = *call.state();
//!         call.output().int(v)
//!     }))
//!     .build()?;
//!
//! let mut ctx = Context::new(Arc::new(table), Vec::new(), 0, Identity::default(), Config::default())?;
//! ctx.input(b"VAL 7;VAL?\n")?;
//! assert_eq!(ctx.host().as_slice(), b"7\n");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]

/// Session configuration.
pub mod config;
/// Session context and host interface.
pub mod context;
mod dispatch;
/// Engine error type.
pub mod error;
/// Handler trait and per-call context.
pub mod handler;
/// IEEE 488.2 common commands.
pub mod ieee488;
/// Streaming tokenizer.
pub mod lexer;
/// Typed parameter extraction.
pub mod params;
/// Response encoding.
pub mod response;
/// IEEE 488.2 status registers.
pub mod status;

// ── Convenience re-exports ──────────────────────────────────────────────

// Session
pub use config::{Config, LineEnding};
pub use context::{Context, Control, Identity, Interface};
pub use error::EngineError;

// Handlers
pub use handler::{BoxedHandler, Call, Handler, Table, handler};
pub use params::{Channel, ChannelList, FromParam, Number, Param, Params, Special, Unit};
pub use response::{Radix, Response};
pub use status::StatusRegisters;

// Lower crates
pub use scpi_engine_diagnostics::{ErrorEntry, ErrorQueue, codes};
pub use scpi_engine_tables::{CommandPattern, CommandTable, InitError, TableBuilder};
