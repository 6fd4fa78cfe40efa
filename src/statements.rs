//! Statement-list sourcing.
//!
//! Splits a SQL script into individual statements on `;`, ignoring
//! separators inside quotes, dollar-quoted bodies and comments.

use crate::error::{ParityError, Result};
use std::io::Read;
use std::path::Path;

/// Reads a script from `path`, or from stdin when `path` is `None`, and
/// splits it into statements.
pub fn read_statements(path: Option<&Path>) -> Result<Vec<String>> {
    let script = match path {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            ParityError::config(format!(
                "Failed to read statements from {}: {e}",
                path.display()
            ))
        })?,
        None => {
            let mut script = String::new();
            std::io::stdin()
                .read_to_string(&mut script)
                .map_err(|e| ParityError::config(format!("Failed to read statements from stdin: {e}")))?;
            script
        }
    };
    Ok(split_statements(&script))
}

/// Splits `script` into trimmed statements.
///
/// Segments holding nothing but whitespace and comments are dropped.
pub fn split_statements(script: &str) -> Vec<String> {
    let bytes = script.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut has_code = false;
    let mut i = 0;

    while i < bytes.len() {
        let rest = &bytes[i..];
        match bytes[i] {
            b'-' if rest.starts_with(b"--") => {
                i += find(rest, b"\n").map_or(rest.len(), |n| n + 1);
                continue;
            }
            b'/' if rest.starts_with(b"/*") => {
                i += find(&rest[2..], b"*/").map_or(rest.len(), |n| n + 4);
                continue;
            }
            b'\'' | b'"' | b'`' => {
                has_code = true;
                i += quoted_len(rest);
                continue;
            }
            b'$' => {
                has_code = true;
                if let Some(tag_len) = dollar_tag_len(rest) {
                    let tag = &rest[..tag_len];
                    i += find(&rest[tag_len..], tag)
                        .map_or(rest.len(), |n| tag_len + n + tag_len);
                    continue;
                }
            }
            b';' => {
                push_statement(&mut statements, &script[start..i], has_code);
                start = i + 1;
                has_code = false;
            }
            b if !b.is_ascii_whitespace() => has_code = true,
            _ => {}
        }
        i += 1;
    }

    push_statement(&mut statements, &script[start..], has_code);
    statements
}

fn push_statement(statements: &mut Vec<String>, text: &str, has_code: bool) {
    if has_code {
        statements.push(text.trim().to_string());
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Length of the quoted token at the start of `rest`, including both
/// quotes. A doubled quote is an escaped quote, and inside string literals
/// a backslash escapes the next byte, as MySQL reads them. Unterminated
/// tokens run to the end of the input.
fn quoted_len(rest: &[u8]) -> usize {
    let quote = rest[0];
    let backslash_escapes = quote != b'`';
    let mut j = 1;
    while j < rest.len() {
        if backslash_escapes && rest[j] == b'\\' {
            j += 2;
            continue;
        }
        if rest[j] == quote {
            if rest.get(j + 1) == Some(&quote) {
                j += 2;
                continue;
            }
            return j + 1;
        }
        j += 1;
    }
    rest.len()
}

/// Length of a `$tag$` opener at the start of `rest`, if there is one.
/// Positional parameters such as `$1` are not openers.
fn dollar_tag_len(rest: &[u8]) -> Option<usize> {
    let tag_end = rest[1..]
        .iter()
        .position(|b| !(b.is_ascii_alphanumeric() || *b == b'_'))
        .map(|n| n + 1)?;
    if rest[tag_end] != b'$' || rest.get(1).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    Some(tag_end + 1)
}
