use std::sync::Arc;

use homing_common::{
    fields, Alerter, Direction, DocumentStore, IdentityProvider, IdentityState, PushSubsystem,
    SubscriptionBackend,
};
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    ClientConfig, Draft, FeedState, ForegroundNotificationRelay, IdentitySession,
    MessageFeedSubscriber, MessagePublisher, NotificationTokenManager, PublishOutcome,
    SessionTerminator, SignOutOutcome,
};

/// Everything the client talks to but does not own.
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn DocumentStore>,
    pub push: Arc<dyn PushSubsystem>,
    pub backend: Arc<dyn SubscriptionBackend>,
    pub alerter: Arc<dyn Alerter>,
}

/// One running chat session.
///
/// Starting a client opens three subscriptions (identity changes, the message feed and
/// foreground push messages) which stay open until [`ChatClient::shutdown`] or until the client
/// is dropped.
pub struct ChatClient {
    identity: watch::Receiver<IdentityState>,
    feed: watch::Receiver<FeedState>,
    publisher: MessagePublisher,
    terminator: SessionTerminator,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl ChatClient {
    /// Must be called from within a tokio runtime.
    pub fn start(config: &ClientConfig, collaborators: Collaborators) -> Self {
        let (shutdown, stopped) = watch::channel(false);

        let mut session = IdentitySession::new();
        let identity = session.watch();
        let transitions = session.transitions();
        let tokens = NotificationTokenManager::new(
            collaborators.push.clone(),
            collaborators.store.clone(),
            collaborators.backend.clone(),
            identity.clone(),
            config,
        );
        let feed_subscriber = MessageFeedSubscriber::new();
        let feed = feed_subscriber.watch();
        let relay = ForegroundNotificationRelay::new(collaborators.alerter.clone());

        let identity_changes = collaborators.identity.on_change();
        let snapshots = collaborators.store.subscribe_ordered(
            &config.messages_collection,
            fields::CREATED_AT,
            Direction::Ascending,
        );
        let payloads = collaborators.push.on_foreground_message();

        let tasks = vec![
            tokio::spawn(tokens.run(transitions, stopped.clone())),
            tokio::spawn(session.run(identity_changes, stopped.clone())),
            tokio::spawn(feed_subscriber.run(snapshots, stopped.clone())),
            tokio::spawn(relay.run(payloads, stopped)),
        ];

        Self {
            identity,
            feed,
            publisher: MessagePublisher::new(collaborators.store.clone(), config),
            terminator: SessionTerminator::new(collaborators.identity.clone()),
            shutdown,
            tasks,
        }
    }

    pub fn identity(&self) -> IdentityState {
        self.identity.borrow().clone()
    }

    pub fn watch_identity(&self) -> watch::Receiver<IdentityState> {
        self.identity.clone()
    }

    pub fn watch_feed(&self) -> watch::Receiver<FeedState> {
        self.feed.clone()
    }

    /// Publishes the draft as the identity that is current right now.
    pub async fn publish(&self, draft: &mut Draft) -> PublishOutcome {
        let identity = self.identity();
        self.publisher.publish(draft, &identity).await
    }

    pub async fn sign_out(&self) -> SignOutOutcome {
        self.terminator.sign_out().await
    }

    /// Stops every component and waits until all subscriptions have been released.
    pub async fn shutdown(mut self) {
        self.shutdown.send_replace(true);
        for task in std::mem::take(&mut self.tasks) {
            if let Err(error) = task.await {
                tracing::warn!(%error, "client task ended abnormally");
            }
        }
        tracing::debug!("chat client shut down");
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
