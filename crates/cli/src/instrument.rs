//! Demonstration instrument: a small DMM plus the `TEST:*` commands used
//! to exercise every parameter and result type.
//!
//! Backs `scpi run`, `scpi check` and `scpi table`. Handlers log what they
//! received at `info` level so a session can be followed with
//! `RUST_LOG=info`.

use scpi_engine_core::{
    BoxedHandler, Call, Channel, ErrorEntry, Identity, Table, TableBuilder, codes, handler,
    ieee488,
};
use scpi_engine_tables::InitError;
use tracing::info;

/// Identification reported by `*IDN?`.
pub(crate) fn identity() -> Identity {
    Identity::new("MANUFACTURE", "INSTR2013", "", "01-02")
}

/// State the demo handlers read and write.
#[derive(Debug, Default)]
pub(crate) struct Demo {
    /// Configured DC range and resolution.
    dc_range: Option<(f64, Option<f64>)>,
    /// `STATus:QUEStionable` event register.
    questionable: u16,
    /// `STATus:QUEStionable:ENABle` mask.
    questionable_enable: u16,
    /// Last value written with `TEST:TEXT`.
    text: String,
    /// Last value written with `TEST:BOOL`.
    flag: bool,
    /// Last value written with `TEST:INT32`.
    int32: i32,
    /// Last value written with `TEST:DOUBle`.
    double: f64,
}

type DemoCall<'a> = Call<'a, Demo>;

// ── DMM ─────────────────────────────────────────────────────────────────

fn measure_voltage(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    let range = call.double(false)?;
    let resolution = call.double(false)?;
    info!(header = call.header(), ?range, ?resolution, "measure");
    call.output().double(0.0)
}

fn configure_voltage_dc(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    let range = call.required::<f64>()?;
    let resolution = call.double(false)?;
    info!(range, ?resolution, "configure dc voltage");
    call.state().dc_range = Some((range, resolution));
    Ok(())
}

fn configure_query(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    let Some((range, resolution)) = call.state().dc_range else {
        return call.output().mnemonic("NONE");
    };
    call.output().double(range)?;
    match resolution {
        Some(resolution) => call.output().double(resolution),
        None => call.output().mnemonic("DEF"),
    }
}

fn stub_query(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    call.output().int(0)
}

// ── STATus ──────────────────────────────────────────────────────────────

fn questionable_event_query(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    let event = std::mem::take(&mut call.state().questionable);
    call.output().int(event)
}

fn questionable_enable(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    let mask = call.required::<i32>()?;
    let mask = u16::try_from(mask).map_err(|_| ErrorEntry::from_code(codes::DATA_OUT_OF_RANGE))?;
    call.state().questionable_enable = mask;
    Ok(())
}

fn questionable_enable_query(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    let mask = call.state().questionable_enable;
    call.output().int(mask)
}

fn status_preset(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    let state = call.state();
    state.questionable = 0;
    state.questionable_enable = 0;
    Ok(())
}

// ── TEST ────────────────────────────────────────────────────────────────

const TRIGGER_SOURCES: &[(&str, i32)] = &[("BUS", 5), ("IMMediate", 6), ("EXTernal", 7)];

fn test_bool(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    let flag = call.required::<bool>()?;
    info!(flag, "TEST:BOOL");
    call.state().flag = flag;
    Ok(())
}

fn test_bool_query(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    let flag = call.state().flag;
    call.output().bool(flag)
}

fn test_int32(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    let value = call.required::<i32>()?;
    info!(value, "TEST:INT32");
    call.state().int32 = value;
    Ok(())
}

fn test_int32_query(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    let value = call.state().int32;
    call.output().int(value)
}

fn test_double(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    let value = call.required::<f64>()?;
    info!(value, "TEST:DOUBle");
    call.state().double = value;
    Ok(())
}

fn test_double_query(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    let value = call.state().double;
    call.output().double(value)
}

fn test_noop(_call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    Ok(())
}

#[allow(clippy::approx_constant)]
fn test_fixed_query(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    let out = call.output();
    out.int(42)?;
    out.double(3.14)?;
    out.text("hello")
}

fn test_choice_query(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    let tag = call.choice(TRIGGER_SOURCES, true)?.unwrap_or_default();
    call.output().int(tag)
}

fn test_numbers(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    let (a, b) = (call.suffix_or(0, 1), call.suffix_or(1, 1));
    info!(a, b, "TEST numbers");
    Ok(())
}

fn test_numbers_query(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    let (a, b) = (call.suffix_or(0, 1), call.suffix_or(1, 1));
    call.output().uint(a.into())?;
    call.output().uint(b.into())
}

fn test_text(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    let text = call.optional::<String>()?.unwrap_or_default();
    info!(%text, "TEST:TEXT");
    call.state().text = text;
    Ok(())
}

fn test_text_query(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    let text = call.state().text.clone();
    call.output().text(&text)
}

fn test_arbitrary_query(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    match call.block(false)? {
        Some(data) => call.output().block(data),
        None => Ok(()),
    }
}

/// Expand a channel list into `(row, column)` pairs, walking ranges in
/// either direction.
fn expand_channels(entries: &[Channel]) -> Vec<(i32, i32)> {
    fn walk(from: i32, to: i32) -> Vec<i32> {
        if from <= to {
            (from..=to).collect()
        } else {
            (to..=from).rev().collect()
        }
    }

    fn dim(addr: &[i32], i: usize) -> i32 {
        addr.get(i).copied().unwrap_or(0)
    }

    let mut cells = Vec::new();
    for entry in entries {
        match entry {
            Channel::Single(addr) => cells.push((dim(addr, 0), dim(addr, 1))),
            Channel::Range { from, to } => {
                let rows = walk(dim(from, 0), dim(to, 0));
                match (from.get(1), to.get(1)) {
                    (Some(&c0), Some(&c1)) => {
                        let cols = walk(c0, c1);
                        cells.extend(rows.iter().flat_map(|&r| cols.iter().map(move |&c| (r, c))));
                    }
                    _ => cells.extend(rows.into_iter().map(|r| (r, 0))),
                }
            }
        }
    }
    cells
}

fn test_channel_list(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    let list = call.channel_list(true)?.unwrap_or_default();
    let cells = expand_channels(&list.entries);
    info!(?cells, "TEST:CHANnellist");
    Ok(())
}

fn test_channel_list_query(call: &mut DemoCall<'_>) -> Result<(), ErrorEntry> {
    let list = call.channel_list(true)?.unwrap_or_default();
    for (row, col) in expand_channels(&list.entries) {
        call.output().int(row)?;
        call.output().int(col)?;
    }
    Ok(())
}

// ── Table ───────────────────────────────────────────────────────────────

/// Every demo command beyond the common set, in registration order.
fn demo_commands() -> Vec<(&'static str, BoxedHandler<Demo>)> {
    vec![
        ("STATus:QUEStionable[:EVENt]?", handler(questionable_event_query)),
        ("STATus:QUEStionable:ENABle", handler(questionable_enable)),
        ("STATus:QUEStionable:ENABle?", handler(questionable_enable_query)),
        ("STATus:PRESet", handler(status_preset)),
        ("MEASure:VOLTage[:DC]?", handler(measure_voltage)),
        ("CONFigure:VOLTage[:DC]", handler(configure_voltage_dc)),
        ("CONFigure?", handler(configure_query)),
        ("MEASure:VOLTage:DC:RATio?", handler(stub_query)),
        ("MEASure:VOLTage:AC?", handler(measure_voltage)),
        ("MEASure:CURRent[:DC]?", handler(stub_query)),
        ("MEASure:CURRent:AC?", handler(stub_query)),
        ("MEASure:RESistance?", handler(stub_query)),
        ("MEASure:FRESistance?", handler(stub_query)),
        ("MEASure:FREQuency?", handler(stub_query)),
        ("MEASure:PERiod?", handler(stub_query)),
        ("TEST:INT32", handler(test_int32)),
        ("TEST:INT32?", handler(test_int32_query)),
        ("TEST:DOUBle", handler(test_double)),
        ("TEST:DOUBle?", handler(test_double_query)),
        ("TEST:BOOL", handler(test_bool)),
        ("TEST:BOOL?", handler(test_bool_query)),
        ("TEST:CHOice?", handler(test_choice_query)),
        ("TEST#:NUMbers#", handler(test_numbers)),
        ("TEST#:NUMbers#?", handler(test_numbers_query)),
        ("TEST:TEXT", handler(test_text)),
        ("TEST:TEXT?", handler(test_text_query)),
        ("TEST:ARBitrary?", handler(test_arbitrary_query)),
        ("TEST:NOOP", handler(test_noop)),
        ("TEST:QUERy?", handler(test_fixed_query)),
        ("TEST:CHANnellist", handler(test_channel_list)),
        ("TEST:CHANnellist?", handler(test_channel_list_query)),
    ]
}

/// Builder with the common commands and the demo commands registered.
pub(crate) fn builder() -> TableBuilder<BoxedHandler<Demo>> {
    ieee488::register(Table::builder()).commands(demo_commands())
}

/// Compile the demo table.
pub(crate) fn table() -> Result<Table<Demo>, InitError> {
    builder().build()
}
