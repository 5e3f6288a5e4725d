use thiserror::Error;

use crate::DocumentId;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("write to `{collection}` rejected: {reason}")]
    Rejected { collection: String, reason: String },
    #[error("live query on `{collection}` failed: {reason}")]
    Query { collection: String, reason: String },
    #[error("timed out waiting for the store")]
    Timeout,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum PushError {
    #[error("notification permission request failed: {0}")]
    Permission(String),
    #[error("delivery token request failed: {0}")]
    Token(String),
    #[error("timed out waiting for the push subsystem")]
    Timeout,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum AuthError {
    #[error("sign-out failed: {0}")]
    SignOut(String),
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum BackendError {
    #[error("could not reach subscription endpoint: {0}")]
    Transport(String),
    #[error("subscription endpoint answered {0}")]
    Status(u16),
    #[error("timed out waiting for the subscription endpoint")]
    Timeout,
}

/// A stored record that cannot be read as a chat message.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DocumentError {
    #[error("document {id} has no `{field}`")]
    MissingField { id: DocumentId, field: &'static str },
    #[error("document {id} has the wrong type for `{field}`")]
    WrongType { id: DocumentId, field: &'static str },
}
