//! Loosely-typed provider entries.
//!
//! Every inventory mechanism hands back a bag of named properties. Adapters
//! copy those into a [`RawEntry`] under the provider's own field names, and a
//! per-source mapping function turns that into a typed record.

use chrono::{DateTime, Utc};

use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Int(i64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawEntry {
    fields: BTreeMap<String, FieldValue>,
}

impl RawEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Text value of a field; numbers are rendered as text, and empty or
    /// absent values give `None`.
    pub fn text(&self, name: &str) -> Option<String> {
        let s = match self.get(name)? {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Int(n) => n.to_string(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Timestamp(t) => t.to_rfc3339(),
            FieldValue::Null => return None,
        };
        Some(s).filter(|s| !s.is_empty())
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            FieldValue::Int(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Int(n) => Some(*n != 0),
            _ => None,
        }
    }

    pub fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        match self.get(name)? {
            FieldValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for RawEntry {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn text_skips_null_and_empty() {
        let raw = RawEntry::new()
            .with("Name", FieldValue::Text("Foo".into()))
            .with("Vendor", FieldValue::Text(String::new()))
            .with("Language", FieldValue::Null)
            .with("Count", FieldValue::Int(1033));
        assert_eq!(raw.text("Name").as_deref(), Some("Foo"));
        assert_eq!(raw.text("Vendor"), None);
        assert_eq!(raw.text("Language"), None);
        assert_eq!(raw.text("Missing"), None);
        assert_eq!(raw.text("Count").as_deref(), Some("1033"));
    }

    #[test]
    fn int_accepts_numeric_text() {
        let raw = RawEntry::new()
            .with("A", FieldValue::Text(" 42 ".into()))
            .with("B", FieldValue::Text("x".into()))
            .with("C", FieldValue::Int(-1));
        assert_eq!(raw.int("A"), Some(42));
        assert_eq!(raw.int("B"), None);
        assert_eq!(raw.int("C"), Some(-1));
    }

    #[test]
    fn flag_accepts_ints() {
        let raw: RawEntry = [
            ("IsFramework", FieldValue::Int(1)),
            ("Other", FieldValue::Bool(false)),
        ]
        .into_iter()
        .collect();
        assert_eq!(raw.flag("IsFramework"), Some(true));
        assert_eq!(raw.flag("Other"), Some(false));
        assert_eq!(raw.flag("Missing"), None);
    }
}
