// Sparse-array repair: fills omitted array slots with `null` so the text parses as JSON.
//
// The server elides unset fields as empty slots: `[1,,3]` or `[,2]`. Strings are
// copied through untouched, so commas inside string literals are never rewritten.

use crate::pblite::{CodingPath, DecodeError};

use super::value::WireValue;

/// Anti-hijacking prefix some responses carry ahead of the JSON body.
const XSSI_PREFIX: &str = ")]}'";

/// Insert `null` into every empty array slot.
///
/// A slot is empty when a `,` directly follows `[` or another `,`, or when
/// `]` directly follows a `,` (whitespace in between is preserved).
pub fn repair_sparse_slots(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut escaped = false;
    let mut last_significant: Option<char> = None;

    for ch in text.chars() {
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
                last_significant = Some(ch);
            }
            continue;
        }

        match ch {
            ',' if matches!(last_significant, Some('[') | Some(',')) => out.push_str("null"),
            // Wider than a comma-lookahead repair: a dangling slot before `]`
            // is filled as well, so `[1,]` reads as `[1,null]`.
            ']' if last_significant == Some(',') => out.push_str("null"),
            '"' => in_string = true,
            _ => {}
        }

        out.push(ch);
        if !ch.is_whitespace() {
            last_significant = Some(ch);
        }
    }

    out
}

/// Repair and parse a document of any shape.
pub fn parse_repaired(text: &str) -> Result<WireValue, DecodeError> {
    let body = strip_xssi_prefix(text);
    let repaired = repair_sparse_slots(body);
    WireValue::parse_json(&repaired).map_err(|error| DecodeError::DataCorrupted {
        path: CodingPath::root(),
        message: format!("invalid JSON after sparse-slot repair: {error}"),
    })
}

/// Repair and parse a document that must be a top-level sequence.
pub fn sanitize(text: &str) -> Result<Vec<WireValue>, DecodeError> {
    match parse_repaired(text)? {
        WireValue::Sequence(items) => Ok(items),
        other => Err(DecodeError::DataCorrupted {
            path: CodingPath::root(),
            message: format!("expected a top-level sequence, found {}", other.describe()),
        }),
    }
}

fn strip_xssi_prefix(text: &str) -> &str {
    let trimmed = text.trim_start();
    trimmed.strip_prefix(XSSI_PREFIX).unwrap_or(trimmed)
}
