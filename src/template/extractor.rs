//! Path-based value extraction from JSON message content.
//!
//! Paths are dotted with optional bracket segments:
//! `alert.labels.severity`, `$.items[0].name`, `data["key.with.dots"]`,
//! `a\.b` (a literal dot in a key). A numeric dotted segment indexes arrays,
//! so `items.0` and `items[0]` are equivalent.

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// Resolve every string mapping against `content`.
///
/// Missing or malformed paths yield `null`. Mappings whose value is not a
/// string are skipped.
pub fn extract_variables(content: &Value, mappings: &Map<String, Value>) -> Map<String, Value> {
    let mut variables = Map::with_capacity(mappings.len());

    for (name, path) in mappings {
        match path {
            Value::String(path) => {
                let value = extract_path(content, path).cloned().unwrap_or(Value::Null);
                variables.insert(name.clone(), value);
            }
            other => {
                tracing::debug!(
                    variable = %name,
                    path = %other,
                    "Ignoring non-string variable mapping"
                );
            }
        }
    }

    variables
}

/// Resolve a single path. `None` when the path is malformed or matches nothing.
pub fn extract_path<'a>(content: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = parse_path(path)?;
    segments
        .iter()
        .try_fold(content, |current, segment| step(current, segment))
}

fn step<'a>(current: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (current, segment) {
        (Value::Object(map), Segment::Key(key)) => map.get(key),
        (Value::Array(items), Segment::Index(index)) => items.get(*index),
        (Value::Array(items), Segment::Key(key)) => {
            key.parse::<usize>().ok().and_then(|index| items.get(index))
        }
        (Value::Object(map), Segment::Index(index)) => map.get(&index.to_string()),
        _ => None,
    }
}

fn parse_path(path: &str) -> Option<Vec<Segment>> {
    let path = path.trim();
    let mut chars = path.chars().peekable();
    let mut segments = Vec::new();

    if chars.peek() == Some(&'$') {
        chars.next();
        if chars.peek() == Some(&'.') {
            chars.next();
            // "$." must be followed by something
            chars.peek()?;
        }
    } else if path.is_empty() {
        return None;
    }

    // Whether a key segment is required next (after a '.')
    let mut expect_key = false;

    while let Some(&c) = chars.peek() {
        match c {
            '[' => {
                if expect_key {
                    return None;
                }
                chars.next();
                segments.push(parse_bracket(&mut chars)?);
            }
            '.' => {
                if expect_key || segments.is_empty() {
                    return None;
                }
                chars.next();
                expect_key = true;
            }
            _ => {
                if !segments.is_empty() && !expect_key {
                    return None;
                }
                let mut key = String::new();
                while let Some(&c) = chars.peek() {
                    match c {
                        '\\' => {
                            chars.next();
                            key.push(chars.next()?);
                        }
                        '.' | '[' => break,
                        _ => {
                            key.push(c);
                            chars.next();
                        }
                    }
                }
                segments.push(Segment::Key(key));
                expect_key = false;
            }
        }
    }

    if expect_key {
        return None;
    }

    Some(segments)
}

fn parse_bracket(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<Segment> {
    match chars.peek().copied()? {
        quote @ ('"' | '\'') => {
            chars.next();
            let mut key = String::new();
            loop {
                match chars.next()? {
                    '\\' => key.push(chars.next()?),
                    c if c == quote => break,
                    c => key.push(c),
                }
            }
            (chars.next()? == ']').then_some(Segment::Key(key))
        }
        _ => {
            let mut digits = String::new();
            loop {
                match chars.next()? {
                    ']' => break,
                    c if c.is_ascii_digit() => digits.push(c),
                    _ => return None,
                }
            }
            digits.parse().ok().map(Segment::Index)
        }
    }
}
