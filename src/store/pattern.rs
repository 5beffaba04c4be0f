//! Glob pattern matching for key enumeration.

use regex::Regex;

use crate::error::{CacheError, Result};

/// Compiles a glob pattern into an anchored regex.
///
/// Supports `*`, `?`, `[abc]`, `[a-z]`, `[^a]`/`[!a]` and `\` escapes.
pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut re = String::with_capacity(pattern.len() * 2 + 8);
    re.push_str("(?s)^");

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '\\' if i + 1 < chars.len() => {
                i += 1;
                push_literal(&mut re, chars[i]);
            }
            '[' => {
                let close = class_end(&chars, i + 1).ok_or_else(|| {
                    CacheError::InvalidRequest(format!(
                        "Unclosed character class in pattern '{}'",
                        pattern
                    ))
                })?;

                let mut body = &chars[i + 1..close];
                re.push('[');
                if let Some('^' | '!') = body.first() {
                    re.push('^');
                    body = &body[1..];
                }
                let mut j = 0;
                while j < body.len() {
                    match body[j] {
                        '-' => re.push('-'),
                        '\\' if j + 1 < body.len() => {
                            j += 1;
                            push_literal(&mut re, body[j]);
                        }
                        c => push_literal(&mut re, c),
                    }
                    j += 1;
                }
                re.push(']');
                i = close;
            }
            other => push_literal(&mut re, other),
        }
        i += 1;
    }

    re.push('$');
    Regex::new(&re).map_err(|e| CacheError::InvalidRequest(format!("Invalid pattern: {}", e)))
}

/// Index of the `]` closing a class whose body starts at `start`, skipping escapes.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            ']' => return Some(j),
            _ => j += 1,
        }
    }
    None
}

fn push_literal(re: &mut String, c: char) {
    re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
}
