//! Keeps a chat session in sync with its collaborators: who is signed in, the live message feed,
//! the push delivery token, and foreground notifications.

mod backend;
mod client;
mod config;
mod feed;
mod identity;
mod publisher;
mod relay;
mod terminator;
mod token;

pub use backend::HttpSubscriptionBackend;
pub use client::{ChatClient, Collaborators};
pub use config::ClientConfig;
pub use feed::{FeedState, MessageFeedSubscriber};
pub use identity::{IdentitySession, Transition};
pub use publisher::{Draft, MessagePublisher, PublishOutcome, SkipReason};
pub use relay::ForegroundNotificationRelay;
pub use terminator::{SessionTerminator, SignOutOutcome};
pub use token::{NotificationTokenManager, RegistrationOutcome, RegistrationStep};

use std::{future::Future, time::Duration};

/// Waits for `step`, giving up after `limit` if one is set.
async fn bounded<T, E>(
    limit: Option<Duration>,
    timed_out: E,
    step: impl Future<Output = Result<T, E>>,
) -> Result<T, E> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, step)
            .await
            .unwrap_or(Err(timed_out)),
        None => step.await,
    }
}
