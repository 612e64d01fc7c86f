//! SCPI error code constants.
//!
//! Auto-generated from `data/errors.jsonc` at build time. Use these instead
//! of integer literals so a typo is a compile error.

include!(concat!(env!("OUT_DIR"), "/generated_codes.rs"));

/// Canonical short message for a standard error code, if the code is known.
pub fn message(code: i16) -> Option<&'static str> {
    include!(concat!(env!("OUT_DIR"), "/generated_messages.rs"))
}
