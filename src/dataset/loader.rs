//! @ai:module:intent JSONL dataset loader for labelled text examples
//! @ai:module:layer infrastructure
//! @ai:module:public_api DatasetLoader, DatasetLoaderTrait
//! @ai:module:stateless true

use crate::dataset::record::{InputRecord, LabeledExample};
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

/// @ai:intent Trait for loading an ordered labelled dataset
pub trait DatasetLoaderTrait: Send + Sync {
    /// @ai:intent Load all examples in file order
    fn load(&self, path: &Path) -> Result<Vec<LabeledExample>>;
}

/// @ai:intent Reads one JSON object per line with `text` and `label` keys
/// @ai:effects pure (stateless)
pub struct DatasetLoader {
    text_field: String,
    label_field: String,
}

impl DatasetLoader {
    /// @ai:intent Create a loader for the default `text`/`label` keys
    /// @ai:effects pure
    pub fn new() -> Self {
        Self {
            text_field: "text".to_string(),
            label_field: "label".to_string(),
        }
    }

    /// @ai:intent Use different keys for the text and label columns
    /// @ai:effects pure
    pub fn with_fields(text_field: &str, label_field: &str) -> Self {
        Self {
            text_field: text_field.to_string(),
            label_field: label_field.to_string(),
        }
    }

    /// @ai:intent Parse one JSONL line into an example
    /// @ai:effects pure
    fn parse_line(&self, line: &str) -> Result<LabeledExample> {
        let value: Value = serde_json::from_str(line).context("Invalid JSON")?;

        let object = value
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("Expected a JSON object"))?;

        let label = object
            .get(&self.label_field)
            .map(value_to_string)
            .ok_or_else(|| anyhow::anyhow!("Missing '{}' field", self.label_field))?;

        if !object.contains_key(&self.text_field) {
            anyhow::bail!("Missing '{}' field", self.text_field);
        }

        // Every non-label field is available to the prompt template
        let record: InputRecord = object
            .iter()
            .filter(|(key, _)| **key != self.label_field)
            .map(|(key, value)| (key.clone(), value_to_string(value)))
            .collect();

        Ok(LabeledExample { record, label })
    }

    /// @ai:intent Parse JSONL content already read into memory
    /// @ai:effects pure
    pub fn parse(&self, content: &str) -> Result<Vec<LabeledExample>> {
        let mut examples = Vec::new();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() {
                continue;
            }

            let example = self
                .parse_line(line)
                .with_context(|| format!("Dataset line {}", index + 1))?;
            examples.push(example);
        }

        Ok(examples)
    }
}

impl Default for DatasetLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetLoaderTrait for DatasetLoader {
    /// @ai:intent Load all examples from a JSONL file
    /// @ai:effects fs:read
    fn load(&self, path: &Path) -> Result<Vec<LabeledExample>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset: {}", path.display()))?;

        let examples = self.parse(&content)?;
        tracing::debug!("Loaded {} examples from {}", examples.len(), path.display());
        Ok(examples)
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_parse_preserves_order_and_extra_fields() {
        let content = r#"
{"text": "great film", "label": "positive"}
{"text": "bad film", "label": "negative", "source": "imdb"}

{"text": "ok film", "label": 1}
"#;
        let examples = DatasetLoader::new().parse(content).unwrap();

        assert_eq!(examples.len(), 3);
        assert_eq!(examples[0].record.get("text"), Some("great film"));
        assert_eq!(examples[1].record.get("source"), Some("imdb"));
        assert_eq!(examples[1].record.get("label"), None);
        assert_eq!(examples[2].label, "1");
    }

    #[test]
    fn test_missing_label_reports_line() {
        let content = "{\"text\": \"a\", \"label\": \"x\"}\n{\"text\": \"b\"}\n";
        let err = DatasetLoader::new().parse(content).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }

    #[test]
    fn test_custom_fields() {
        let content = r#"{"sentence": "fine", "sentiment": "neutral"}"#;
        let examples = DatasetLoader::with_fields("sentence", "sentiment")
            .parse(content)
            .unwrap();
        assert_eq!(examples[0].record.get("sentence"), Some("fine"));
        assert_eq!(examples[0].label, "neutral");
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.jsonl");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, r#"{{"text": "great film", "label": "positive"}}"#).unwrap();

        let examples = DatasetLoader::new().load(&path).unwrap();
        assert_eq!(examples, vec![LabeledExample::text("great film", "positive")]);
    }
}
