//! Placeholder substitution for route message templates.
//!
//! Placeholders are `{{ name }}` or `{{.name}}`, optionally navigating into
//! objects and arrays (`{{.alert.labels.severity}}`, `{{ items.0 }}`).
//! `{{.}}` renders the whole variable set as JSON. A lone `}}` is plain text.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Template syntax error at byte {position}: {reason}")]
    Syntax { position: usize, reason: String },
}

impl TemplateError {
    fn syntax(position: usize, reason: impl Into<String>) -> Self {
        TemplateError::Syntax {
            position,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Text(String),
    /// Variable name followed by navigation segments
    Placeholder(Vec<String>),
    /// `{{.}}`
    Root,
}

/// A parsed message template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    parts: Vec<Part>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut parts = Vec::new();
        let mut rest = source;
        let mut offset = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                parts.push(Part::Text(rest[..start].to_string()));
            }

            let open = offset + start;
            let after_open = &rest[start + 2..];
            let end = after_open
                .find("}}")
                .ok_or_else(|| TemplateError::syntax(open, "unclosed placeholder"))?;

            parts.push(parse_placeholder(&after_open[..end], open)?);

            let consumed = start + 2 + end + 2;
            rest = &rest[consumed..];
            offset += consumed;
        }

        if !rest.is_empty() {
            parts.push(Part::Text(rest.to_string()));
        }

        Ok(Self { parts })
    }

    /// Substitute variables. Missing or null values render as empty text.
    pub fn render(&self, variables: &Map<String, Value>) -> String {
        let mut output = String::new();

        for part in &self.parts {
            match part {
                Part::Text(text) => output.push_str(text),
                Part::Root => output.push_str(&Value::Object(variables.clone()).to_string()),
                Part::Placeholder(path) => {
                    if let Some(value) = lookup(variables, path) {
                        push_value(&mut output, value);
                    }
                }
            }
        }

        output
    }
}

/// Parse and render in one step.
pub fn render_template(
    source: &str,
    variables: &Map<String, Value>,
) -> Result<String, TemplateError> {
    Ok(Template::parse(source)?.render(variables))
}

fn parse_placeholder(inner: &str, position: usize) -> Result<Part, TemplateError> {
    let expr = inner.trim();
    if expr.is_empty() {
        return Err(TemplateError::syntax(position, "empty placeholder"));
    }
    if expr == "." {
        return Ok(Part::Root);
    }

    let expr = expr.strip_prefix('.').unwrap_or(expr);
    let segments: Vec<String> = expr.split('.').map(str::to_string).collect();

    for (i, segment) in segments.iter().enumerate() {
        let valid = if i == 0 {
            is_identifier(segment)
        } else {
            is_identifier(segment) || is_index(segment)
        };
        if !valid {
            return Err(TemplateError::syntax(
                position,
                format!("invalid placeholder `{}`", inner.trim()),
            ));
        }
    }

    Ok(Part::Placeholder(segments))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

fn is_index(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn lookup<'a>(variables: &'a Map<String, Value>, path: &[String]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    rest.iter()
        .try_fold(variables.get(first)?, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

fn push_value(output: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => output.push_str(s),
        Value::Number(n) => output.push_str(&n.to_string()),
        Value::Bool(b) => output.push_str(if *b { "true" } else { "false" }),
        // Arrays and objects use their JSON representation
        other => output.push_str(&other.to_string()),
    }
}
