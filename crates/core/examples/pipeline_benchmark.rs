//! Lightweight lex/dispatch benchmark harness for local baselines.
//!
//! Run from repository root:
//! `cargo run -p scpi_engine_core --example pipeline_benchmark --release`

use std::sync::Arc;
use std::time::Instant;

use scpi_engine_core::lexer::tokenize;
use scpi_engine_core::{Call, Config, Context, Identity, Table, handler, ieee488};

#[derive(Debug, Default)]
struct Meter {
    range: f64,
    samples: Vec<u8>,
}

fn build_table() -> Result<Table<Meter>, String> {
    ieee488::register(Table::builder())
        .command(
            "[SENSe]:VOLTage[:DC]:RANGe",
            handler(|call: &mut Call<'_, Meter>| {
                let range = call.number(true)?.and_then(|n| n.value()).unwrap_or(10.0);
                call.state().range = range;
                Ok(())
            }),
        )
        .command(
            "[SENSe]:VOLTage[:DC]:RANGe?",
            handler(|call: &mut Call<'_, Meter>| {
                let range = call.state().range;
                call.output().double(range)
            }),
        )
        .command(
            "TRACe:DATA",
            handler(|call: &mut Call<'_, Meter>| {
                let data = call.block(true)?.unwrap_or_default().to_vec();
                call.state().samples = data;
                Ok(())
            }),
        )
        .build()
        .map_err(|e| format!("failed to build table: {e}"))
}

fn workload(messages: usize) -> Vec<u8> {
    let mut input = Vec::new();
    for i in 0..messages {
        let line = match i % 4 {
            0 => format!("VOLT:RANG {}.5 MV;:VOLT:DC:RANG?\n", i % 100),
            1 => "*IDN?;*OPC?\n".to_string(),
            2 => "TRAC:DATA #216abcdefghijklmnop;:SYST:ERR:COUNT?\n".to_string(),
            _ => "SENS:VOLT:RANG MAX;*STB?\n".to_string(),
        };
        input.extend_from_slice(line.as_bytes());
    }
    input
}

fn run_benchmark(label: &str, input: &[u8], table: &Arc<Table<Meter>>, iterations: usize) {
    let lex_start = Instant::now();
    for _ in 0..iterations {
        let _ = tokenize(input);
    }
    let lex_elapsed = lex_start.elapsed();

    let mut output_bytes = 0;
    let dispatch_start = Instant::now();
    for _ in 0..iterations {
        let Ok(mut ctx) = Context::new(
            Arc::clone(table),
            Vec::new(),
            Meter::default(),
            Identity::new("BENCH", "METER", "0", "1.0"),
            Config::default(),
        ) else {
            return;
        };
        for chunk in input.chunks(64) {
            if ctx.input(chunk).is_err() {
                ctx.reset();
            }
        }
        output_bytes = ctx.host().len();
    }
    let dispatch_elapsed = dispatch_start.elapsed();

    println!("Benchmark: {label}");
    println!("  input_bytes:  {}", input.len());
    println!("  output_bytes: {output_bytes}");
    println!(
        "  lex:      total={:?}, per_iter={:.3} ms",
        lex_elapsed,
        lex_elapsed.as_secs_f64() * 1000.0 / iterations as f64
    );
    println!(
        "  dispatch: total={:?}, per_iter={:.3} ms",
        dispatch_elapsed,
        dispatch_elapsed.as_secs_f64() * 1000.0 / iterations as f64
    );
}

fn main() -> Result<(), String> {
    let table = Arc::new(build_table()?);
    let iterations = std::env::var("SCPI_BENCH_ITERS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(500);

    for (label, messages) in [("short", 8), ("long", 512)] {
        run_benchmark(label, &workload(messages), &table, iterations);
    }

    Ok(())
}
