use std::{collections::BTreeMap, fmt, sync::Arc};

use chrono::{DateTime, Utc};

/// Store-assigned document identifier.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DocumentId(pub Arc<str>);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self(id.into())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Null,
    Text(Arc<str>),
    Timestamp(DateTime<Utc>),
    /// Write-time marker; the store replaces it with its own clock.
    ServerTimestamp,
}

impl FieldValue {
    pub fn text(value: impl Into<Arc<str>>) -> Self {
        Self::Text(value.into())
    }

    pub fn as_text(&self) -> Option<&Arc<str>> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

pub type Record = BTreeMap<Arc<str>, FieldValue>;

#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub fields: Record,
}

impl Document {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }
}

/// A complete materialization of a query result, as delivered by a live subscription.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub documents: Vec<Document>,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}
