//! Shared test helpers for `scpi_engine_core` integration tests.

#![allow(unreachable_pub, dead_code)]

use std::sync::{Arc, LazyLock};

use scpi_engine_core::{
    Call, Config, Context, Control, ErrorEntry, Identity, Interface, Table, codes, handler,
    ieee488,
};

/// Host that records everything the engine hands it.
#[derive(Debug, Default)]
pub struct Recorder {
    pub out: Vec<u8>,
    pub errors: Vec<ErrorEntry>,
    pub srq: Vec<u16>,
    pub writes: usize,
    pub flushes: usize,
    pub resets: usize,
}

impl Interface for Recorder {
    fn write(&mut self, data: &[u8]) -> usize {
        self.writes += 1;
        self.out.extend_from_slice(data);
        data.len()
    }

    fn error(&mut self, entry: &ErrorEntry) {
        self.errors.push(entry.clone());
    }

    fn control(&mut self, control: Control, value: u16) {
        if control == Control::ServiceRequest {
            self.srq.push(value);
        }
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }

    fn reset(&mut self) {
        self.resets += 1;
    }
}

/// Instrument state the fixture handlers operate on.
#[derive(Debug, Default)]
pub struct Instrument {
    pub int32: i32,
    pub text: String,
    pub block: Vec<u8>,
    pub frequency: f64,
    pub numbers: Vec<(u32, u32)>,
    pub channels: usize,
}

fn int32_set(call: &mut Call<'_, Instrument>) -> Result<(), ErrorEntry> {
    let value = call.required()?;
    call.state().int32 = value;
    Ok(())
}

fn int32_query(call: &mut Call<'_, Instrument>) -> Result<(), ErrorEntry> {
    let value = call.state().int32;
    call.output().int(value)
}

fn numbers(call: &mut Call<'_, Instrument>) -> Result<(), ErrorEntry> {
    let pair = (call.suffix_or(0, 1), call.suffix_or(1, 1));
    call.state().numbers.push(pair);
    Ok(())
}

fn numbers_query(call: &mut Call<'_, Instrument>) -> Result<(), ErrorEntry> {
    let (a, b) = (call.suffix_or(0, 1), call.suffix_or(1, 1));
    call.output().uint(a.into())?;
    call.output().uint(b.into())
}

#[allow(clippy::approx_constant)]
fn mixed_query(call: &mut Call<'_, Instrument>) -> Result<(), ErrorEntry> {
    let out = call.output();
    out.int(42)?;
    out.double(3.14)?;
    out.text("hello")
}

fn choice_query(call: &mut Call<'_, Instrument>) -> Result<(), ErrorEntry> {
    let tag = call.choice(&[("LOW", 0), ("MEDium", 1), ("HIGH", 2)], true)?;
    call.output().int(tag.unwrap_or_default())
}

fn frequency(call: &mut Call<'_, Instrument>) -> Result<(), ErrorEntry> {
    if call.is_query() {
        let value = call.state().frequency;
        return call.output().double(value);
    }
    let value = call
        .number(true)?
        .and_then(|n| n.value())
        .ok_or_else(|| ErrorEntry::from_code(codes::ILLEGAL_PARAMETER_VALUE))?;
    call.state().frequency = value;
    Ok(())
}

/// Table shared by every test in a binary.
pub static TABLE: LazyLock<Arc<Table<Instrument>>> = LazyLock::new(|| {
    let table = ieee488::register(Table::builder())
        .command("TEST:INT32", handler(int32_set))
        .command("TEST:INT32?", handler(int32_query))
        .command("TEST#:NUMbers#", handler(numbers))
        .command("TEST#:NUMbers#?", handler(numbers_query))
        .command("TEST:QUERy?", handler(mixed_query))
        .command("TEST:CHOice?", handler(choice_query))
        .command(
            "TEST:TEXT",
            handler(|call: &mut Call<'_, Instrument>| {
                let text = call.required::<String>()?;
                call.state().text = text;
                Ok(())
            }),
        )
        .command(
            "TEST:TEXT?",
            handler(|call: &mut Call<'_, Instrument>| {
                let text = call.state().text.clone();
                call.output().text(&text)
            }),
        )
        .command(
            "TEST:BLOCK",
            handler(|call: &mut Call<'_, Instrument>| {
                let data = call.required::<&[u8]>()?.to_vec();
                call.state().block = data;
                Ok(())
            }),
        )
        .command(
            "TEST:BLOCK?",
            handler(|call: &mut Call<'_, Instrument>| {
                let data = call.state().block.clone();
                call.output().block(&data)
            }),
        )
        .command(
            "TEST:FAIL",
            handler(|call: &mut Call<'_, Instrument>| {
                call.output().int(1)?;
                Err(ErrorEntry::new(7, "Device busy"))
            }),
        )
        .command(
            "TEST:PUSH",
            handler(|call: &mut Call<'_, Instrument>| {
                call.push_error(ErrorEntry::new(8, "Pushed by handler"));
                Err(ErrorEntry::from_code(codes::EXECUTION_ERROR))
            }),
        )
        .command(
            "ROUTe:CLOSe",
            handler(|call: &mut Call<'_, Instrument>| {
                let list = call.channel_list(true)?.unwrap_or_default();
                call.state().channels = list.entries.len();
                Ok(())
            }),
        )
        .command("[SOURce]:FREQuency[:CW]", handler(frequency))
        .command("[SOURce]:FREQuency[:CW]?", handler(frequency))
        .build();
    match table {
        Ok(table) => Arc::new(table),
        Err(e) => panic!("fixture table failed to build: {e}"),
    }
});

pub fn identity() -> Identity {
    Identity::new("SCPI", "TEST", "0", "1.0")
}

/// A session with default configuration.
pub fn session() -> Context<Instrument, Recorder> {
    session_with(Config::default())
}

pub fn session_with(config: Config) -> Context<Instrument, Recorder> {
    Context::new(
        Arc::clone(&TABLE),
        Recorder::default(),
        Instrument::default(),
        identity(),
        config,
    )
    .unwrap_or_else(|e| panic!("session: {e}"))
}

/// Feed `input` and return (and clear) the response bytes as text.
pub fn send(ctx: &mut Context<Instrument, Recorder>, input: &str) -> String {
    send_bytes(ctx, input.as_bytes())
}

pub fn send_bytes(ctx: &mut Context<Instrument, Recorder>, input: &[u8]) -> String {
    ctx.input(input).unwrap_or_else(|e| panic!("input failed: {e}"));
    take_output(ctx)
}

pub fn take_output(ctx: &mut Context<Instrument, Recorder>) -> String {
    let out = std::mem::take(&mut ctx.host_mut().out);
    String::from_utf8_lossy(&out).into_owned()
}

/// Pop every queued error code, oldest first.
pub fn drain_errors(ctx: &mut Context<Instrument, Recorder>) -> Vec<i16> {
    let mut codes = Vec::new();
    while !ctx.errors().is_empty() {
        codes.push(ctx.pop_error().code);
    }
    codes
}
