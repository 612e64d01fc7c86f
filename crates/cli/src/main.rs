mod instrument;
mod render;

use std::fs;
use std::io::{self, Read, Write};
use std::process;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use scpi_engine_core::{Config, Context, Control, EngineError, ErrorEntry, Interface, Table, codes};
use scpi_engine_diagnostics::{ErrorClass, LineIndex, Span, explain};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::instrument::Demo;
use crate::render::{Finding, Format, print_summary, render_findings_json, render_findings_pretty};

// ── CLI definition ──────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "scpi",
    version,
    about = "SCPI engine: run, check, and inspect SCPI command scripts against a demo instrument"
)]
struct Cli {
    /// Output mode: "pretty" for coloured terminal output, "json" for
    /// machine-readable JSON. Defaults to "pretty" when stdout is a TTY,
    /// "json" otherwise.
    #[arg(long, global = true, value_parser = ["pretty", "json"])]
    output: Option<String>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Feed a script (or stdin) to one session and print its responses.
    Run {
        /// Script to run. Reads stdin when omitted.
        file: Option<String>,
        /// Feed the input this many bytes at a time.
        #[arg(long)]
        chunk: Option<usize>,
        /// Path to a JSON session config (buffer sizes, line ending).
        #[arg(long)]
        config: Option<String>,
    },

    /// Run every line of a script in a fresh session and report the errors
    /// each one queues.
    Check {
        file: String,
        /// Path to a JSON session config (see `run --help`).
        #[arg(long)]
        config: Option<String>,
    },

    /// Dump the demo instrument's compiled command table.
    Table {
        /// Dump the header tree instead of the pattern list.
        #[arg(long)]
        tree: bool,
    },

    /// Explain an SCPI error code (e.g. -113).
    Explain {
        #[arg(allow_negative_numbers = true)]
        code: i16,
    },
}

// ── Main ────────────────────────────────────────────────────────────────

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let format = Format::resolve_or_detect(cli.output.as_deref());

    if let Err(e) = run(cli.cmd, format) {
        match format {
            Format::Json => {
                let out = serde_json::json!({
                    "success": false,
                    "error": "command_failed",
                    "message": format!("{e:#}"),
                });
                println!("{out}");
            }
            Format::Pretty => eprintln!("error: {e:#}"),
        }
        process::exit(2);
    }
}

fn run(cmd: Cmd, format: Format) -> Result<()> {
    match cmd {
        Cmd::Run {
            file,
            chunk,
            config,
        } => cmd_run(file.as_deref(), chunk, config.as_deref(), format)?,
        Cmd::Check { file, config } => cmd_check(&file, config.as_deref(), format)?,
        Cmd::Table { tree } => cmd_table(tree, format)?,
        Cmd::Explain { code } => cmd_explain(code, format)?,
    }

    Ok(())
}

/// Log to stderr so responses on stdout stay clean. `RUST_LOG` overrides
/// the default `warn` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

// ── Host ────────────────────────────────────────────────────────────────

/// Host interface for CLI sessions: streams responses to stdout or
/// collects them, and records every queued error.
#[derive(Debug, Default)]
struct Terminal {
    stream: bool,
    out: Vec<u8>,
    errors: Vec<ErrorEntry>,
}

impl Terminal {
    fn streaming() -> Self {
        Self {
            stream: true,
            ..Self::default()
        }
    }
}

impl Interface for Terminal {
    fn write(&mut self, data: &[u8]) -> usize {
        if !self.stream {
            self.out.extend_from_slice(data);
            return data.len();
        }
        match io::stdout().lock().write_all(data) {
            Ok(()) => data.len(),
            Err(_) => 0,
        }
    }

    fn error(&mut self, entry: &ErrorEntry) {
        if self.stream {
            eprintln!("**ERROR: {entry}");
        }
        self.errors.push(entry.clone());
    }

    fn control(&mut self, control: Control, value: u16) {
        debug!(?control, value, "bus control");
    }

    fn flush(&mut self) {
        if self.stream {
            io::stdout().flush().ok();
        }
    }

    fn reset(&mut self) {
        debug!("device reset");
    }
}

type Session = Context<Demo, Terminal>;

fn open_session(table: &Arc<Table<Demo>>, host: Terminal, config: Config) -> Result<Session> {
    Context::new(
        Arc::clone(table),
        host,
        Demo::default(),
        instrument::identity(),
        config,
    )
    .context("failed to open session")
}

fn load_config(path: Option<&str>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read config '{path}'"))?;
    serde_json::from_str(&text).with_context(|| format!("invalid config '{path}'"))
}

/// Feed one chunk; an overrun resets the session and carries on.
fn feed(session: &mut Session, chunk: &[u8]) {
    match session.input(chunk) {
        Ok(()) => {}
        Err(e @ (EngineError::BufferOverflow { .. } | EngineError::ResetRequired)) => {
            eprintln!("warning: {e}; session reset");
            session.reset();
        }
        Err(e) => eprintln!("warning: {e}"),
    }
}

// ── Commands ────────────────────────────────────────────────────────────

fn cmd_run(
    file: Option<&str>,
    chunk: Option<usize>,
    config: Option<&str>,
    format: Format,
) -> Result<()> {
    let config = load_config(config)?;
    let input = match file {
        Some(path) => fs::read(path).with_context(|| format!("failed to read '{path}'"))?,
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf).context("failed to read stdin")?;
            buf
        }
    };
    let chunk = match chunk {
        Some(0) => anyhow::bail!("--chunk must be greater than zero"),
        Some(n) => n,
        None => input.len().max(1),
    };

    let table = Arc::new(instrument::table()?);
    let host = match format {
        Format::Pretty => Terminal::streaming(),
        Format::Json => Terminal::default(),
    };
    let mut session = open_session(&table, host, config)?;
    for piece in input.chunks(chunk) {
        feed(&mut session, piece);
    }
    feed(&mut session, &[]);

    if format == Format::Json {
        let status_byte = session.status_byte();
        let mut pending = Vec::new();
        while !session.errors().is_empty() {
            pending.push(session.pop_error());
        }
        let out = serde_json::json!({
            "output": String::from_utf8_lossy(&session.host().out),
            "errors": session.host().errors,
            "pending": pending,
            "statusByte": status_byte,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    }
    Ok(())
}

fn cmd_check(file: &str, config: Option<&str>, format: Format) -> Result<()> {
    let config = load_config(config)?;
    let source = fs::read_to_string(file).with_context(|| format!("failed to read '{file}'"))?;
    let bytes = source.as_bytes();
    let table = Arc::new(instrument::table()?);
    let index = LineIndex::new(bytes);

    let mut findings = Vec::new();
    for line in 0..index.line_count() {
        let Some(span) = index.line_span(line, bytes.len()) else {
            continue;
        };
        let text = span.slice(bytes);
        let trimmed = text.trim_ascii_end();
        if trimmed.trim_ascii_start().is_empty() {
            continue;
        }
        let span = Span::new(span.start, span.start + trimmed.len());

        let mut session = open_session(&table, Terminal::default(), config.clone())?;
        if session.input(trimmed).is_ok() {
            session.input(&[]).ok();
        }
        while !session.errors().is_empty() {
            findings.push(Finding::new(line + 1, span, session.pop_error()));
        }
    }

    match format {
        Format::Json => render_findings_json(&findings)?,
        Format::Pretty => {
            render_findings_pretty(&source, file, &findings);
            print_summary(&findings);
            if findings.is_empty() {
                println!("{file}: ok");
            }
        }
    }

    if !findings.is_empty() {
        process::exit(1);
    }
    Ok(())
}

fn cmd_table(tree: bool, format: Format) -> Result<()> {
    let table = instrument::table()?;
    if tree {
        println!("{}", serde_json::to_string_pretty(table.tree())?);
        return Ok(());
    }
    match format {
        Format::Json => {
            let entries: Vec<_> = table
                .entries()
                .iter()
                .enumerate()
                .map(|(index, entry)| {
                    serde_json::json!({
                        "index": index,
                        "pattern": entry.pattern,
                        "forms": entry.pattern.canonical_forms(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Format::Pretty => {
            for (index, entry) in table.entries().iter().enumerate() {
                let forms = entry.pattern.canonical_forms().join(", ");
                println!("{index:>3}  {:<40} {forms}", entry.pattern.text);
            }
        }
    }
    Ok(())
}

fn cmd_explain(code: i16, format: Format) -> Result<()> {
    let message = codes::message(code);
    let explanation = explain(code);
    match format {
        Format::Json => {
            let out = serde_json::json!({
                "code": code,
                "message": message,
                "class": ErrorClass::of(code),
                "explanation": explanation,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Pretty => {
            use ariadne::Fmt;
            match (message, explanation) {
                (Some(message), Some(text)) => {
                    println!("{}: {message}", code.fg(ariadne::Color::Cyan));
                    println!("{text}");
                }
                _ => println!("{code}: (no explanation available)"),
            }
        }
    }
    Ok(())
}
