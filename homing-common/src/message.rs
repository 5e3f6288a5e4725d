use std::{
    collections::BTreeMap,
    ops::RangeBounds,
    sync::Arc,
};

use chrono::{DateTime, Utc};

use crate::{Document, DocumentError, DocumentId, FieldValue, IdentityState};

/// Field names of a message record in the document store.
pub mod fields {
    pub const TEXT: &str = "text";
    pub const CREATED_AT: &str = "createdAt";
    pub const AUTHOR_ID: &str = "uid";
    pub const AUTHOR_DISPLAY_NAME: &str = "displayName";
}

/// Server-assigned creation time. A write whose server timestamp has not been resolved yet is
/// `Pending`, which sorts after every resolved timestamp.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum CreatedAt {
    Server(DateTime<Utc>),
    Pending,
}

#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct MessageKey {
    pub created_at: CreatedAt,
    pub id: DocumentId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub key: MessageKey,
    pub text: Arc<str>,
    pub author_id: Arc<str>,
    pub author_display_name: Option<Arc<str>>,
}

impl ChatMessage {
    pub fn key(&self) -> MessageKey {
        self.key.clone()
    }

    pub fn id(&self) -> &DocumentId {
        &self.key.id
    }

    pub fn from_document(document: &Document) -> Result<Self, DocumentError> {
        let required_text = |field: &'static str| {
            document
                .get(field)
                .and_then(FieldValue::as_text)
                .cloned()
                .ok_or_else(|| DocumentError::MissingField {
                    id: document.id.clone(),
                    field,
                })
        };
        let text = required_text(fields::TEXT)?;
        let author_id = required_text(fields::AUTHOR_ID)?;
        let author_display_name = match document.get(fields::AUTHOR_DISPLAY_NAME) {
            None | Some(FieldValue::Null) => None,
            Some(FieldValue::Text(name)) => Some(name.clone()),
            Some(_) => {
                return Err(DocumentError::WrongType {
                    id: document.id.clone(),
                    field: fields::AUTHOR_DISPLAY_NAME,
                })
            }
        };
        let created_at = match document.get(fields::CREATED_AT) {
            Some(FieldValue::Timestamp(timestamp)) => CreatedAt::Server(*timestamp),
            None | Some(FieldValue::Null | FieldValue::ServerTimestamp) => CreatedAt::Pending,
            Some(FieldValue::Text(_)) => {
                return Err(DocumentError::WrongType {
                    id: document.id.clone(),
                    field: fields::CREATED_AT,
                })
            }
        };
        Ok(Self {
            key: MessageKey {
                created_at,
                id: document.id.clone(),
            },
            text,
            author_id,
            author_display_name,
        })
    }

    /// Whether this message was sent by whoever is signed in.
    pub fn is_from(&self, identity: &IdentityState) -> bool {
        identity.id() == Some(&*self.author_id)
    }

    /// The sender's display name, or `fallback` when it is missing or blank.
    pub fn author_label<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.author_display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(fallback)
    }
}

/// The ordered message feed, rebuilt from scratch for every snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeedView {
    messages: BTreeMap<MessageKey, ChatMessage>,
}

impl FeedView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, message: ChatMessage) -> Option<ChatMessage> {
        let key = message.key.clone();
        self.messages.insert(key, message)
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ChatMessage> {
        self.messages.values()
    }

    pub fn range<R>(&self, range: R) -> impl DoubleEndedIterator<Item = &ChatMessage>
    where
        R: RangeBounds<MessageKey>,
    {
        self.messages.range(range).map(|(_, message)| message)
    }

    pub fn contains(&self, key: &MessageKey) -> bool {
        self.messages.contains_key(key)
    }

    pub fn position(&self, key: &MessageKey) -> Option<usize> {
        self.messages.keys().position(|k| k == key)
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.values().next_back()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl FromIterator<ChatMessage> for FeedView {
    fn from_iter<I: IntoIterator<Item = ChatMessage>>(iter: I) -> Self {
        let mut view = Self::new();
        iter.into_iter().for_each(|message| {
            view.insert(message);
        });
        view
    }
}
