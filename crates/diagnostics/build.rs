//! Build script for generating SCPI error code tables at compile time.
//!
//! Reads `data/errors.jsonc` and generates:
//! - `generated_codes.rs`: `pub const NAME: i16 = code;` for every entry plus `ALL`
//! - `generated_messages.rs`: match expression mapping code → canonical message
//! - `generated_explain.rs`: match expression mapping code → long description

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;
use scpi_engine_jsonc_strip::strip_jsonc;

fn main() {
    let table_path = Path::new("data/errors.jsonc");
    println!("cargo:rerun-if-changed={}", table_path.display());

    let raw = fs::read_to_string(table_path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", table_path.display()));
    let table: serde_json::Value = serde_json::from_str(&strip_jsonc(&raw))
        .expect("failed to parse errors.jsonc as JSON");
    let errors = table["errors"]
        .as_array()
        .expect("errors.jsonc: expected `errors` array");

    let out_dir = env::var("OUT_DIR").unwrap();
    let out_path = Path::new(&out_dir);

    let mut seen_codes: HashSet<i64> = HashSet::new();
    let mut seen_names: HashSet<String> = HashSet::new();

    let mut codes = String::from("// Auto-generated from data/errors.jsonc: DO NOT EDIT.\n\n");
    let mut messages = String::from("match code {\n");
    let mut explain = String::from("match code {\n");
    let mut all = Vec::with_capacity(errors.len());

    for (i, entry) in errors.iter().enumerate() {
        let code = entry["code"]
            .as_i64()
            .unwrap_or_else(|| panic!("errors[{i}] missing integer `code`"));
        assert!(
            i64::from(i16::MIN) <= code && code <= i64::from(i16::MAX),
            "errors[{i}]: code {code} does not fit in i16"
        );
        let const_name = entry["constName"]
            .as_str()
            .unwrap_or_else(|| panic!("errors[{i}] (code={code}) missing `constName`"));
        let message = entry["message"]
            .as_str()
            .unwrap_or_else(|| panic!("errors[{i}] (code={code}) missing `message`"));
        let description = entry["description"]
            .as_str()
            .unwrap_or_else(|| panic!("errors[{i}] (code={code}) missing `description`"));

        assert!(
            !const_name.is_empty()
                && const_name
                    .bytes()
                    .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
                && const_name.as_bytes()[0].is_ascii_uppercase(),
            "errors[{i}] (code={code}): constName '{const_name}' is not SCREAMING_SNAKE_CASE"
        );
        assert!(
            seen_codes.insert(code),
            "errors[{i}]: duplicate code {code}"
        );
        assert!(
            seen_names.insert(const_name.to_string()),
            "errors[{i}] (code={code}): duplicate constName '{const_name}'"
        );
        // SCPI responses quote the message with `"`; a raw quote would need doubling.
        assert!(
            !message.contains('"'),
            "errors[{i}] (code={code}): message must not contain '\"'"
        );

        codes.push_str(&format!("/// {message} ({code})\n"));
        codes.push_str(&format!("pub const {const_name}: i16 = {code};\n\n"));
        messages.push_str(&format!(
            "    {code} => Some(\"{}\"),\n",
            escape_rust_string_literal(message)
        ));
        explain.push_str(&format!(
            "    {code} => Some(\"{}\"),\n",
            escape_rust_string_literal(description)
        ));
        all.push(const_name.to_string());
    }

    codes.push_str("/// Every code defined in `data/errors.jsonc`, in file order.\n");
    codes.push_str(&format!("pub const ALL: &[i16] = &[{}];\n", all.join(", ")));
    messages.push_str("    _ => None,\n}\n");
    explain.push_str("    _ => None,\n}\n");

    fs::write(out_path.join("generated_codes.rs"), &codes)
        .expect("failed to write generated_codes.rs");
    fs::write(out_path.join("generated_messages.rs"), &messages)
        .expect("failed to write generated_messages.rs");
    fs::write(out_path.join("generated_explain.rs"), &explain)
        .expect("failed to write generated_explain.rs");
}

fn escape_rust_string_literal(value: &str) -> String {
    value.chars().flat_map(char::escape_default).collect()
}
