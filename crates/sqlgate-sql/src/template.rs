// SPDX-License-Identifier: Apache-2.0

//! `{name}` SQL templates.
//!
//! Substitution is plain text replacement for trusted, internally authored
//! templates. It is not parameter binding; values are inserted verbatim.
//! `{{` and `}}` produce literal braces.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use sqlgate_core::{GateError, GateResult, TemplateError};

/// Placeholder values keyed by name
pub type Params = HashMap<String, String>;

/// SQL text plus the identifier it was loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlTemplate {
    source_id: String,
    text: String,
}

impl SqlTemplate {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
        }
    }

    /// Reads a template file; the path becomes the source identifier
    pub fn load(path: impl AsRef<Path>) -> GateResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| GateError::unreadable_source(path.display().to_string(), e.to_string()))?;
        Ok(Self::new(path.display().to_string(), text))
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Names of all placeholders, in order of appearance
    pub fn placeholders(&self) -> Result<Vec<String>, TemplateError> {
        let mut names = Vec::new();
        walk(&self.text, |segment| {
            if let Segment::Placeholder(name) = segment {
                names.push(name.to_string());
            }
            Ok(())
        })?;
        Ok(names)
    }

    /// Substitutes every placeholder from `params`
    pub fn render(&self, params: &Params) -> Result<String, TemplateError> {
        render(&self.text, params)
    }
}

/// Substitutes every `{name}` in `text`; a missing name is an error
pub fn render(text: &str, params: &Params) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(text.len());
    walk(text, |segment| {
        match segment {
            Segment::Literal(s) => out.push_str(s),
            Segment::Placeholder(name) => {
                let value = params.get(name).ok_or_else(|| TemplateError::missing(name))?;
                out.push_str(value);
            }
        }
        Ok(())
    })?;
    Ok(out)
}

enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

fn walk<'a, F>(text: &'a str, mut visit: F) -> Result<(), TemplateError>
where
    F: FnMut(Segment<'a>) -> Result<(), TemplateError>,
{
    let bytes = text.as_bytes();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                visit(Segment::Literal(&text[literal_start..=i]))?;
                i += 2;
                literal_start = i;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                visit(Segment::Literal(&text[literal_start..=i]))?;
                i += 2;
                literal_start = i;
            }
            b'{' => {
                let close = text[i + 1..]
                    .find(|c: char| c == '{' || c == '}')
                    .map(|off| i + 1 + off)
                    .filter(|&end| bytes[end] == b'}')
                    .ok_or_else(|| TemplateError::malformed(i, "unclosed '{'"))?;
                let name = &text[i + 1..close];
                if !is_valid_name(name) {
                    return Err(TemplateError::malformed(
                        i,
                        format!("invalid placeholder name '{name}'"),
                    ));
                }
                visit(Segment::Literal(&text[literal_start..i]))?;
                visit(Segment::Placeholder(name))?;
                i = close + 1;
                literal_start = i;
            }
            b'}' => return Err(TemplateError::malformed(i, "single '}' outside a placeholder")),
            _ => i += 1,
        }
    }

    visit(Segment::Literal(&text[literal_start..]))
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
