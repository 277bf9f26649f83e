// Reader for Java-style `.properties` files, the format the portal configuration is deployed in.
// Supports `=`, `:` and whitespace separators, `#`/`!` comments, backslash line continuations
// and the usual escapes including `\uXXXX` (with surrogate pairs).

use indexmap::IndexMap;
use std::str::Chars;

const WHITESPACE: [char; 3] = [' ', '\t', '\x0c'];

#[derive(Debug, PartialEq)]
pub(crate) struct ParseError {
    pub line: usize,
    pub message: String,
}

/// Parses `input` into an ordered key/value map. Later duplicates replace earlier ones.
pub(crate) fn parse(input: &str) -> Result<IndexMap<String, String>, ParseError> {
    let mut values = IndexMap::new();
    let mut lines = input.lines().enumerate();

    while let Some((index, raw)) = lines.next() {
        let line_number = index + 1;
        let trimmed = raw.trim_start_matches(WHITESPACE);
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut logical = trimmed.to_string();
        while has_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some((_, next)) => logical.push_str(next.trim_start_matches(WHITESPACE)),
                None => break,
            }
        }

        let (key, value) = split_entry(&logical);
        let to_error = |message| ParseError {
            line: line_number,
            message,
        };
        let key = unescape(key).map_err(to_error)?;
        let value = unescape(value).map_err(to_error)?;
        values.insert(key, value);
    }

    Ok(values)
}

fn has_continuation(line: &str) -> bool {
    let trailing = line.chars().rev().take_while(|c| *c == '\\').count();
    trailing % 2 == 1
}

fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();

    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\x0c' => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let mut rest = line[key_end..].trim_start_matches(WHITESPACE);
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start_matches(WHITESPACE);
    }
    (key, rest)
}

fn unescape(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => out.push(unicode_escape(&mut chars)?),
            Some(other) => out.push(other),
            None => {}
        }
    }

    Ok(out)
}

fn hex_unit(chars: &mut Chars<'_>) -> Result<u32, String> {
    let hex: String = chars.by_ref().take(4).collect();
    if hex.len() != 4 {
        return Err(format!("truncated unicode escape \\u{hex}"));
    }
    u32::from_str_radix(&hex, 16).map_err(|_| format!("invalid unicode escape \\u{hex}"))
}

fn unicode_escape(chars: &mut Chars<'_>) -> Result<char, String> {
    let unit = hex_unit(chars)?;
    if !(0xD800..0xDC00).contains(&unit) {
        return char::from_u32(unit).ok_or_else(|| format!("invalid code point {unit:#x}"));
    }

    // High surrogate, the low half must follow as another escape.
    if chars.next() != Some('\\') || chars.next() != Some('u') {
        return Err(format!("unpaired surrogate {unit:#x}"));
    }
    let low = hex_unit(chars)?;
    if !(0xDC00..0xE000).contains(&low) {
        return Err(format!("unpaired surrogate {unit:#x}"));
    }
    let code_point = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
    char::from_u32(code_point).ok_or_else(|| format!("invalid code point {code_point:#x}"))
}
