//! store::codec
//!
//! The two-field line codec used by every tablet.
//!
//! # Format
//!
//! A line is two fields separated by [`DELIMITER`]. Before quoting, each field
//! escapes backslash, line feed, and carriage return as `\\`, `\n`, and `\r`,
//! so an encoded line never spans two physical lines. A field is then wrapped
//! in `"` when it contains the delimiter or a quote, or when it begins or ends
//! with whitespace; embedded quotes are doubled.
//!
//! [`decode_line`] is the exact inverse of [`encode_line`].
//!
//! # Example
//!
//! ```
//! use arbordb::store::codec::{decode_line, encode_line};
//!
//! let line = encode_line("k1", "hello, world");
//! assert_eq!(line, "k1,\"hello, world\"");
//! assert_eq!(decode_line(&line).unwrap(), ("k1".to_string(), "hello, world".to_string()));
//! ```

use thiserror::Error;

/// Field separator.
pub const DELIMITER: char = ',';

const QUOTE: char = '"';

/// Reasons a line fails to decode.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("expected 2 fields, found {0}")]
    FieldCount(usize),

    #[error("unterminated quoted field")]
    UnterminatedQuote,

    #[error("unexpected character after closing quote")]
    TrailingAfterQuote,
}

/// Encode one `(first, second)` row, without line terminator.
pub fn encode_line(first: &str, second: &str) -> String {
    let mut line = String::with_capacity(first.len() + second.len() + 1);
    encode_field(first, &mut line);
    line.push(DELIMITER);
    encode_field(second, &mut line);
    line
}

fn encode_field(value: &str, out: &mut String) {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            c => escaped.push(c),
        }
    }

    let needs_quotes = escaped.contains(DELIMITER)
        || escaped.contains(QUOTE)
        || escaped.starts_with(char::is_whitespace)
        || escaped.ends_with(char::is_whitespace);

    if needs_quotes {
        out.push(QUOTE);
        for c in escaped.chars() {
            if c == QUOTE {
                out.push(QUOTE);
            }
            out.push(c);
        }
        out.push(QUOTE);
    } else {
        out.push_str(&escaped);
    }
}

/// Decode one line into its two fields.
///
/// # Errors
///
/// Any line that does not split into exactly two well-formed fields.
pub fn decode_line(line: &str) -> Result<(String, String), CodecError> {
    let mut fields = split_fields(line)?;
    if fields.len() != 2 {
        return Err(CodecError::FieldCount(fields.len()));
    }
    let second = unescape(&fields.pop().unwrap_or_default());
    let first = unescape(&fields.pop().unwrap_or_default());
    Ok((first, second))
}

fn split_fields(line: &str) -> Result<Vec<String>, CodecError> {
    let mut fields = Vec::with_capacity(2);
    let mut chars = line.chars().peekable();

    loop {
        let mut field = String::new();
        if chars.peek() == Some(&QUOTE) {
            chars.next();
            loop {
                match chars.next() {
                    Some(QUOTE) if chars.peek() == Some(&QUOTE) => {
                        chars.next();
                        field.push(QUOTE);
                    }
                    Some(QUOTE) => break,
                    Some(c) => field.push(c),
                    None => return Err(CodecError::UnterminatedQuote),
                }
            }
            match chars.peek() {
                None | Some(&DELIMITER) => {}
                Some(_) => return Err(CodecError::TrailingAfterQuote),
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == DELIMITER {
                    break;
                }
                field.push(c);
                chars.next();
            }
        }
        fields.push(field);

        match chars.next() {
            Some(DELIMITER) => continue,
            _ => break,
        }
    }
    Ok(fields)
}

fn unescape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
