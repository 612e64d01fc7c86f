//! IEEE 488.2 common commands and SCPI-99 mandated system queries.
//!
//! [`register`] splices them into a table builder:
//!
//! | command | effect |
//! |---------|--------|
//! | `*CLS` | clear the error queue and ESR |
//! | `*ESE n` / `*ESE?` | event status enable, `0..=255` |
//! | `*ESR?` | read and clear the ESR |
//! | `*IDN?` | `manufacturer,model,serial,version` |
//! | `*OPC` / `*OPC?` | set the OPC bit / answer `1` |
//! | `*RST` | reset the session; pending input is discarded |
//! | `*SRE n` / `*SRE?` | service request enable, bit 6 ignored |
//! | `*STB?` | status byte |
//! | `*TST?` | self-test, always `0` |
//! | `*WAI` | no-op, commands run to completion |
//! | `SYSTem:ERRor[:NEXT]?` | pop the oldest error |
//! | `SYSTem:ERRor:COUNt?` | pending error count |
//! | `SYSTem:VERSion?` | `1999.0` |

use scpi_engine_diagnostics::{ErrorEntry, codes};
use scpi_engine_tables::TableBuilder;

use crate::handler::{BoxedHandler, Call, handler};
use crate::status::esr;

/// SCPI standard version reported by `SYSTem:VERSion?`.
pub const SCPI_VERSION: &str = "1999.0";

type Outcome = Result<(), ErrorEntry>;

/// Pull a mandatory register value in `0..=255`.
fn register_value<U>(call: &mut Call<'_, U>) -> Result<u8, ErrorEntry> {
    let value: i32 = call.required()?;
    u8::try_from(value).map_err(|_| ErrorEntry::from_code(codes::DATA_OUT_OF_RANGE))
}

fn cls<U>(call: &mut Call<'_, U>) -> Outcome {
    let (session, host) = call.session_and_host();
    session.errors.clear();
    session.status.clear_events();
    session.update_status(host);
    Ok(())
}

fn ese<U>(call: &mut Call<'_, U>) -> Outcome {
    let value = register_value(call)?;
    call.status().set_ese(value);
    let (session, host) = call.session_and_host();
    session.update_status(host);
    Ok(())
}

fn ese_query<U>(call: &mut Call<'_, U>) -> Outcome {
    let value = call.status().ese();
    call.output().int(value)
}

fn esr_query<U>(call: &mut Call<'_, U>) -> Outcome {
    let (session, host) = call.session_and_host();
    let value = session.status.take_esr();
    session.update_status(host);
    call.output().int(value)
}

fn idn_query<U>(call: &mut Call<'_, U>) -> Outcome {
    let id = call.identity().clone();
    let out = call.output();
    out.mnemonic(&id.manufacturer)?;
    out.mnemonic(&id.model)?;
    out.mnemonic(&id.serial)?;
    out.mnemonic(&id.version)
}

fn opc<U>(call: &mut Call<'_, U>) -> Outcome {
    let (session, host) = call.session_and_host();
    session.status.set_esr_bits(esr::OPC);
    session.update_status(host);
    Ok(())
}

fn opc_query<U>(call: &mut Call<'_, U>) -> Outcome {
    call.output().int(1)
}

fn rst<U>(call: &mut Call<'_, U>) -> Outcome {
    let (session, _) = call.session_and_host();
    session.reset_requested = true;
    Ok(())
}

fn sre<U>(call: &mut Call<'_, U>) -> Outcome {
    let value = register_value(call)?;
    call.status().set_sre(value);
    let (session, host) = call.session_and_host();
    session.update_status(host);
    Ok(())
}

fn sre_query<U>(call: &mut Call<'_, U>) -> Outcome {
    let value = call.status().sre();
    call.output().int(value)
}

fn stb_query<U>(call: &mut Call<'_, U>) -> Outcome {
    let (session, _) = call.session_and_host();
    let value = session.status_byte();
    call.output().int(value)
}

fn tst_query<U>(call: &mut Call<'_, U>) -> Outcome {
    call.output().int(0)
}

fn wai<U>(_call: &mut Call<'_, U>) -> Outcome {
    Ok(())
}

fn error_next_query<U>(call: &mut Call<'_, U>) -> Outcome {
    let (session, host) = call.session_and_host();
    let entry = session.errors.pop();
    session.update_status(host);
    call.output().error_entry(&entry)
}

fn error_count_query<U>(call: &mut Call<'_, U>) -> Outcome {
    let (session, _) = call.session_and_host();
    let count = session.errors.count() as u64;
    call.output().uint(count)
}

fn version_query<U>(call: &mut Call<'_, U>) -> Outcome {
    call.output().mnemonic(SCPI_VERSION)
}

/// The common commands as `(pattern, handler)` pairs.
pub fn common_commands<U: 'static>() -> Vec<(&'static str, BoxedHandler<U>)> {
    vec![
        ("*CLS", handler(cls::<U>)),
        ("*ESE", handler(ese::<U>)),
        ("*ESE?", handler(ese_query::<U>)),
        ("*ESR?", handler(esr_query::<U>)),
        ("*IDN?", handler(idn_query::<U>)),
        ("*OPC", handler(opc::<U>)),
        ("*OPC?", handler(opc_query::<U>)),
        ("*RST", handler(rst::<U>)),
        ("*SRE", handler(sre::<U>)),
        ("*SRE?", handler(sre_query::<U>)),
        ("*STB?", handler(stb_query::<U>)),
        ("*TST?", handler(tst_query::<U>)),
        ("*WAI", handler(wai::<U>)),
        ("SYSTem:ERRor[:NEXT]?", handler(error_next_query::<U>)),
        ("SYSTem:ERRor:COUNt?", handler(error_count_query::<U>)),
        ("SYSTem:VERSion?", handler(version_query::<U>)),
    ]
}

/// Add the common commands to `builder`.
pub fn register<U: 'static>(
    builder: TableBuilder<BoxedHandler<U>>,
) -> TableBuilder<BoxedHandler<U>> {
    builder.commands(common_commands())
}
