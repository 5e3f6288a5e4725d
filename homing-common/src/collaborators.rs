//! Contracts of the systems the synchronizer talks to but does not own.

use std::{fmt, sync::Arc};

use async_trait::async_trait;

use crate::{
    AuthError, BackendError, Direction, DocumentId, IdentityState, Permission, PushError,
    PushPayload, Record, Snapshot, StoreError, Subscription, TokenRequest,
};

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Subscribes to sign-in, sign-out and refresh notifications. The current state is delivered
    /// first.
    fn on_change(&self) -> Subscription<IdentityState>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Opens a live query over a whole collection. Every update is a complete snapshot.
    fn subscribe_ordered(
        &self,
        collection: &str,
        order_by: &str,
        direction: Direction,
    ) -> Subscription<Result<Snapshot, StoreError>>;

    async fn add(&self, collection: &str, record: Record) -> Result<DocumentId, StoreError>;

    /// Creates or overwrites the document at `key`.
    async fn set(&self, collection: &str, key: &str, record: Record) -> Result<(), StoreError>;
}

#[async_trait]
pub trait PushSubsystem: Send + Sync {
    async fn request_permission(&self) -> Result<Permission, PushError>;

    async fn get_token(&self, request: &TokenRequest) -> Result<Option<Arc<str>>, PushError>;

    fn on_foreground_message(&self) -> Subscription<PushPayload>;
}

/// The backend endpoint that subscribes delivery tokens to the chat topic.
#[async_trait]
pub trait SubscriptionBackend: Send + Sync {
    async fn subscribe(&self, token: &str) -> Result<(), BackendError>;
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Alert {
    pub title: Option<Arc<str>>,
    pub body: Option<Arc<str>>,
}

impl From<PushPayload> for Alert {
    fn from(payload: PushPayload) -> Self {
        Self {
            title: payload.title,
            body: payload.body,
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            self.title.as_deref().unwrap_or_default(),
            self.body.as_deref().unwrap_or_default()
        )
    }
}

/// Shows an alert to the user. Resolves once the user has dismissed it.
#[async_trait]
pub trait Alerter: Send + Sync {
    async fn alert(&self, alert: Alert);
}
