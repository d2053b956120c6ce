//! Output helpers shared by the command handlers

use crate::OutputFormat;
use serde::Serialize;

/// Serialize `value` as JSON according to `format`
pub fn to_json<T: Serialize>(value: &T, format: OutputFormat) -> serde_json::Result<String> {
    if matches!(format, OutputFormat::JsonPretty) {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}

/// Print a `key: value` line with the key padded to `width`
pub fn print_key_value(key: &str, value: impl std::fmt::Display, width: usize) {
    println!("  {:<width$} {value}", format!("{key}:"));
}

/// Print a section header
pub fn print_section_header(title: &str) {
    println!("{title}");
    println!("{}", "=".repeat(title.len()));
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_json_formats() {
        let value = serde_json::json!({ "a": 1 });
        assert_eq!(to_json(&value, OutputFormat::Json).unwrap(), r#"{"a":1}"#);
        assert!(
            to_json(&value, OutputFormat::JsonPretty)
                .unwrap()
                .contains('\n')
        );
    }
}
