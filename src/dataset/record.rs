//! @ai:module:intent Input records and labelled examples
//! @ai:module:layer domain
//! @ai:module:public_api InputRecord, LabeledExample
//! @ai:module:stateless true

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// @ai:intent Placeholder name to substitution value, one per dataset example
/// @ai:invariant immutable once constructed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputRecord {
    fields: BTreeMap<String, String>,
}

impl InputRecord {
    /// @ai:intent Build a record from key/value pairs
    /// @ai:effects pure
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            fields: pairs.into_iter().collect(),
        }
    }

    /// @ai:intent Look up a placeholder value
    /// @ai:effects pure
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for InputRecord {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::from_pairs(iter.into_iter().map(|(k, v)| (k.into(), v.into())))
    }
}

/// @ai:intent One dataset example: its template fields plus the gold label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledExample {
    pub record: InputRecord,
    pub label: String,
}

impl LabeledExample {
    /// @ai:intent Build an example whose only field is `text`
    /// @ai:effects pure
    pub fn text(text: &str, label: &str) -> Self {
        Self {
            record: [("text", text)].into_iter().collect(),
            label: label.to_string(),
        }
    }
}
