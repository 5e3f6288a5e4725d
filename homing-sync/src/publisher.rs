use std::{sync::Arc, time::Duration};

use homing_common::{
    fields, DocumentId, DocumentStore, FieldValue, IdentityState, Record, StoreError,
};

use crate::{bounded, ClientConfig};

/// Text the user is composing.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Draft {
    text: String,
}

impl Draft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn push(&mut self, c: char) {
        self.text.push(c);
    }

    pub fn pop(&mut self) -> Option<char> {
        self.text.pop()
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

impl From<&str> for Draft {
    fn from(text: &str) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SkipReason {
    EmptyText,
    NoIdentity,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PublishOutcome {
    /// A precondition did not hold; nothing was written.
    Skipped(SkipReason),
    Sent(DocumentId),
    /// The store refused the write. The draft is left as it was.
    Failed,
}

#[derive(Clone)]
pub struct MessagePublisher {
    store: Arc<dyn DocumentStore>,
    collection: Arc<str>,
    fallback_display_name: Arc<str>,
    step_timeout: Option<Duration>,
}

impl MessagePublisher {
    pub fn new(store: Arc<dyn DocumentStore>, config: &ClientConfig) -> Self {
        Self {
            store,
            collection: config.messages_collection.clone(),
            fallback_display_name: config.fallback_display_name.clone(),
            step_timeout: config.step_timeout,
        }
    }

    /// Sends the draft as a message from `identity`. The draft is cleared only once the store
    /// has accepted the message.
    pub async fn publish(&self, draft: &mut Draft, identity: &IdentityState) -> PublishOutcome {
        let text = draft.text().trim();
        if text.is_empty() {
            tracing::debug!("not publishing an empty message");
            return PublishOutcome::Skipped(SkipReason::EmptyText);
        }
        let Some(identity) = identity.identity() else {
            tracing::debug!("not publishing without an identity");
            return PublishOutcome::Skipped(SkipReason::NoIdentity);
        };

        let display_name = identity
            .display_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.fallback_display_name.clone());
        let record = Record::from([
            (fields::TEXT.into(), FieldValue::text(text)),
            (fields::CREATED_AT.into(), FieldValue::ServerTimestamp),
            (fields::AUTHOR_ID.into(), FieldValue::Text(identity.id.clone())),
            (fields::AUTHOR_DISPLAY_NAME.into(), FieldValue::Text(display_name)),
        ]);
        match bounded(
            self.step_timeout,
            StoreError::Timeout,
            self.store.add(&self.collection, record),
        )
        .await
        {
            Ok(id) => {
                tracing::debug!(%id, uid = %identity.id, "message sent");
                draft.clear();
                PublishOutcome::Sent(id)
            }
            Err(error) => {
                tracing::error!(%error, uid = %identity.id, "failed to send message");
                PublishOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use homing_common::Identity;
    use homing_fake_backend::MemoryStore;

    use super::*;

    fn publisher(store: &MemoryStore) -> MessagePublisher {
        MessagePublisher::new(Arc::new(store.clone()), &ClientConfig::default())
    }

    fn signed_in() -> IdentityState {
        Identity::new("u1").with_display_name("Dana").into()
    }

    #[tokio::test]
    async fn blank_text_or_no_identity_writes_nothing() {
        let store = MemoryStore::new();
        let publisher = publisher(&store);
        for text in ["", "   ", "\n\t"] {
            let mut draft = Draft::from(text);
            assert_eq!(
                publisher.publish(&mut draft, &signed_in()).await,
                PublishOutcome::Skipped(SkipReason::EmptyText)
            );
            assert_eq!(draft.text(), text);
        }
        let mut draft = Draft::from("hello");
        assert_eq!(
            publisher.publish(&mut draft, &IdentityState::NoIdentity).await,
            PublishOutcome::Skipped(SkipReason::NoIdentity)
        );
        assert_eq!(draft.text(), "hello");
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn sends_trimmed_text_with_server_time() {
        let store = MemoryStore::new();
        let mut draft = Draft::from("  hello there \n");
        let outcome = publisher(&store).publish(&mut draft, &signed_in()).await;
        assert!(matches!(outcome, PublishOutcome::Sent(_)));
        assert!(draft.text().is_empty());

        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        let record = &writes[0].record;
        assert_eq!(&*writes[0].collection, "messages");
        assert_eq!(record[fields::TEXT], FieldValue::text("hello there"));
        assert_eq!(record[fields::AUTHOR_ID], FieldValue::text("u1"));
        assert_eq!(record[fields::AUTHOR_DISPLAY_NAME], FieldValue::text("Dana"));
        assert_eq!(record[fields::CREATED_AT], FieldValue::ServerTimestamp);
    }

    #[tokio::test]
    async fn missing_display_name_uses_fallback() {
        let store = MemoryStore::new();
        let mut draft = Draft::from("hi");
        publisher(&store)
            .publish(&mut draft, &Identity::new("u1").into())
            .await;
        assert_eq!(
            store.writes()[0].record[fields::AUTHOR_DISPLAY_NAME],
            FieldValue::text("Anonymous")
        );
    }

    #[tokio::test]
    async fn blank_display_name_uses_fallback() {
        let store = MemoryStore::new();
        let mut draft = Draft::from("hi");
        publisher(&store)
            .publish(&mut draft, &Identity::new("u1").with_display_name(" ").into())
            .await;
        assert_eq!(
            store.writes()[0].record[fields::AUTHOR_DISPLAY_NAME],
            FieldValue::text("Anonymous")
        );
    }

    #[tokio::test]
    async fn slow_write_times_out_and_keeps_draft() {
        let store = MemoryStore::new();
        store.pause_writes();
        let config = ClientConfig {
            step_timeout: Some(Duration::from_millis(20)),
            ..Default::default()
        };
        let publisher = MessagePublisher::new(Arc::new(store.clone()), &config);
        let mut draft = Draft::from("hello");
        assert_eq!(
            publisher.publish(&mut draft, &signed_in()).await,
            PublishOutcome::Failed
        );
        assert_eq!(draft.text(), "hello");
        assert_eq!(store.pending_writes(), 0);

        store.resume_writes();
        assert_eq!(store.len("messages"), 0);
    }

    #[tokio::test]
    async fn failed_write_keeps_draft() {
        let store = MemoryStore::new();
        store.fail_writes(Some(StoreError::Unavailable("offline".into())));
        let mut draft = Draft::from("keep me");
        assert_eq!(
            publisher(&store).publish(&mut draft, &signed_in()).await,
            PublishOutcome::Failed
        );
        assert_eq!(draft.text(), "keep me");
    }

    #[tokio::test]
    async fn draft_is_cleared_only_after_the_write_resolves() {
        let store = MemoryStore::new();
        store.pause_writes();
        let publisher = publisher(&store);
        let task = tokio::spawn(async move {
            let mut draft = Draft::from("hello");
            let outcome = publisher.publish(&mut draft, &signed_in()).await;
            (outcome, draft)
        });

        while store.pending_writes() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(!task.is_finished());
        assert_eq!(store.len("messages"), 0);

        store.resume_writes();
        let (outcome, draft) = task.await.unwrap();
        assert!(matches!(outcome, PublishOutcome::Sent(_)));
        assert_eq!(draft, Draft::new());
        assert_eq!(store.len("messages"), 1);
    }
}
