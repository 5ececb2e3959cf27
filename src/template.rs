//! @ai:module:intent Prompt templates with named `{{placeholder}}` substitution
//! @ai:module:layer domain
//! @ai:module:public_api PromptTemplate
//! @ai:module:stateless true

use crate::dataset::InputRecord;
use crate::error::TemplateError;
use regex::Regex;
use std::sync::OnceLock;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_\-]*)\s*\}\}").unwrap_or_else(|e| {
            unreachable!("placeholder pattern is a valid regex: {}", e)
        })
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// @ai:intent A parsed prompt template
/// @ai:invariant segments concatenate back to the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// @ai:intent Parse a template, splitting literals from placeholders
    /// @ai:pre every `{{` is closed by `}}`
    /// @ai:effects pure
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut cursor = 0;

        for caps in placeholder_pattern().captures_iter(source) {
            let whole = caps.get(0).map(|m| (m.start(), m.end()));
            let name = caps.get(1).map(|m| m.as_str().to_string());

            if let (Some((start, end)), Some(name)) = (whole, name) {
                push_literal(&mut segments, &source[cursor..start], cursor)?;
                segments.push(Segment::Placeholder(name));
                cursor = end;
            }
        }

        push_literal(&mut segments, &source[cursor..], cursor)?;

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// @ai:intent Load a template from a file
    /// @ai:effects fs:read
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read template file: {}", path.display()))?;
        Ok(Self::parse(&content)?)
    }

    /// @ai:intent Original template text
    /// @ai:effects pure
    pub fn source(&self) -> &str {
        &self.source
    }

    /// @ai:intent Distinct placeholder names in order of first appearance
    /// @ai:effects pure
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();

        for segment in &self.segments {
            if let Segment::Placeholder(name) = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }

        names
    }

    /// @ai:intent Substitute every placeholder with the record's value
    /// @ai:post result is identical for identical (template, record) pairs
    /// @ai:effects pure
    pub fn render(&self, record: &InputRecord) -> Result<String, TemplateError> {
        let mut output = String::with_capacity(self.source.len());

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Placeholder(name) => {
                    let value = record
                        .get(name)
                        .ok_or_else(|| TemplateError::MissingPlaceholder { name: name.clone() })?;
                    output.push_str(value);
                }
            }
        }

        Ok(output)
    }
}

/// A literal gap must not contain an opening brace pair left unmatched.
fn push_literal(segments: &mut Vec<Segment>, text: &str, offset: usize) -> Result<(), TemplateError> {
    if let Some(pos) = text.find("{{") {
        return Err(TemplateError::Unterminated {
            offset: offset + pos,
        });
    }

    if !text.is_empty() {
        segments.push(Segment::Literal(text.to_string()));
    }

    Ok(())
}
