//! RFC 6570 URI templates, level 1: simple string expansion.
//!
//! Enough to decide whether a concrete URI belongs to a template's family and
//! to pull the variable values out. A URI with no `{...}` expressions is a
//! plain resource URI, not a template.

use std::collections::HashMap;

use crate::error::{McpError, McpResult};

/// Whether a URI string contains template expressions.
pub fn is_template(uri: &str) -> bool {
    uri.contains('{')
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A parsed URI template.
#[derive(Debug, Clone, PartialEq)]
pub struct UriTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl UriTemplate {
    pub fn parse(raw: &str) -> McpResult<Self> {
        let mut segments = Vec::new();
        let mut rest = raw;

        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let close = rest[open..].find('}').ok_or_else(|| {
                McpError::invalid_params(format!("unterminated expression in template {raw:?}"))
            })? + open;
            let name = &rest[open + 1..close];
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(McpError::invalid_params(format!(
                    "unsupported expression {{{name}}} in template {raw:?}"
                )));
            }
            if matches!(segments.last(), Some(Segment::Variable(_))) {
                return Err(McpError::invalid_params(format!(
                    "adjacent expressions in template {raw:?}"
                )));
            }
            segments.push(Segment::Variable(name.to_string()));
            rest = &rest[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match a concrete URI against this template, returning the captured
    /// variable values on success. Every variable must capture at least one
    /// character.
    pub fn matches(&self, uri: &str) -> Option<HashMap<String, String>> {
        let mut vars = HashMap::new();
        let mut rest = uri;
        let mut segments = self.segments.iter().peekable();

        while let Some(segment) = segments.next() {
            match segment {
                Segment::Literal(lit) => {
                    rest = rest.strip_prefix(lit.as_str())?;
                }
                Segment::Variable(name) => match segments.peek() {
                    // a variable is always followed by a literal or nothing
                    Some(Segment::Literal(lit)) => {
                        let at = rest.find(lit.as_str())?;
                        if at == 0 {
                            return None;
                        }
                        vars.insert(name.clone(), rest[..at].to_string());
                        rest = &rest[at..];
                    }
                    _ => {
                        if rest.is_empty() {
                            return None;
                        }
                        vars.insert(name.clone(), rest.to_string());
                        rest = "";
                    }
                },
            }
        }

        rest.is_empty().then_some(vars)
    }
}
