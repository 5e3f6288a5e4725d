mod collaborators;
mod document;
mod error;
mod identity;
mod message;
mod push;
mod subscription;

pub use collaborators::{
    Alert, Alerter, DocumentStore, IdentityProvider, PushSubsystem, SubscriptionBackend,
};
pub use document::{Direction, Document, DocumentId, FieldValue, Record, Snapshot};
pub use error::{AuthError, BackendError, DocumentError, PushError, StoreError};
pub use identity::{Identity, IdentityState};
pub use message::{fields, ChatMessage, CreatedAt, FeedView, MessageKey};
pub use push::{NotificationToken, Permission, PushPayload, TokenRequest};
pub use subscription::Subscription;
