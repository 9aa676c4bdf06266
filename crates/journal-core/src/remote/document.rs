//! Schemaless document model shared by all remote stores

use std::collections::BTreeMap;

/// A single field value as stored remotely
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// One document of the remote collection
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteDocument {
    /// Document key within the collection
    pub id: String,
    pub fields: BTreeMap<String, FieldValue>,
}

impl RemoteDocument {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// String field, or `None` when absent or not a string
    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(FieldValue::String(value)) => Some(value),
            _ => None,
        }
    }

    /// Integer field, or `None` when absent or not an integer
    pub fn get_integer(&self, name: &str) -> Option<i64> {
        match self.fields.get(name) {
            Some(FieldValue::Integer(value)) => Some(*value),
            _ => None,
        }
    }
}

/// Full contents of the collection at one point in time
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteSnapshot {
    pub documents: Vec<RemoteDocument>,
}

impl RemoteSnapshot {
    /// Build a snapshot with documents ordered by key
    pub fn new(mut documents: Vec<RemoteDocument>) -> Self {
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
