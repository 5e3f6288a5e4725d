use std::{sync::Arc, time::Duration};

use homing_common::{
    BackendError, DocumentStore, Identity, IdentityState, NotificationToken, Permission,
    PushError, PushSubsystem, StoreError, SubscriptionBackend, TokenRequest,
};
use tokio::{
    sync::{mpsc, watch},
    task::JoinSet,
};

use crate::{bounded, ClientConfig, Transition};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RegistrationStep {
    Permission,
    Token,
    Store,
}

/// How a registration cycle ended. Nothing here is raised to the caller; it is reported for
/// observers and tests.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RegistrationOutcome {
    PermissionNotGranted(Permission),
    NoToken,
    /// The identity stopped being current before the token was stored.
    Superseded,
    Failed(RegistrationStep),
    Registered {
        token: NotificationToken,
        /// The backend subscription is a separate side effect; failing it keeps the stored token.
        backend_notified: bool,
    },
}

/// Registers a push delivery token every time an identity signs in.
#[derive(Clone)]
pub struct NotificationTokenManager {
    push: Arc<dyn PushSubsystem>,
    store: Arc<dyn DocumentStore>,
    backend: Arc<dyn SubscriptionBackend>,
    current: watch::Receiver<IdentityState>,
    request: TokenRequest,
    tokens_collection: Arc<str>,
    step_timeout: Option<Duration>,
    revalidate_identity: bool,
}

impl NotificationTokenManager {
    pub fn new(
        push: Arc<dyn PushSubsystem>,
        store: Arc<dyn DocumentStore>,
        backend: Arc<dyn SubscriptionBackend>,
        current: watch::Receiver<IdentityState>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            push,
            store,
            backend,
            current,
            request: TokenRequest {
                vapid_key: config.vapid_key.clone(),
            },
            tokens_collection: config.tokens_collection.clone(),
            step_timeout: config.step_timeout,
            revalidate_identity: config.revalidate_identity,
        }
    }

    /// Runs one registration cycle for `identity`: permission, token, store record, backend
    /// subscription. Each step only runs if the previous one succeeded.
    pub async fn register(&self, identity: Identity) -> RegistrationOutcome {
        let uid = identity.id.clone();
        tracing::debug!(%uid, "requesting notification permission");
        let permission = match bounded(
            self.step_timeout,
            PushError::Timeout,
            self.push.request_permission(),
        )
        .await
        {
            Ok(permission) => permission,
            Err(error) => {
                tracing::warn!(%uid, %error, "notification permission request failed");
                return RegistrationOutcome::Failed(RegistrationStep::Permission);
            }
        };
        if permission != Permission::Granted {
            tracing::info!(%uid, ?permission, "notification permission not granted");
            return RegistrationOutcome::PermissionNotGranted(permission);
        }

        let value = match bounded(
            self.step_timeout,
            PushError::Timeout,
            self.push.get_token(&self.request),
        )
        .await
        {
            Ok(Some(value)) => value,
            Ok(None) => {
                tracing::info!(%uid, "no registration token available");
                return RegistrationOutcome::NoToken;
            }
            Err(error) => {
                tracing::warn!(%uid, %error, "failed to retrieve registration token");
                return RegistrationOutcome::Failed(RegistrationStep::Token);
            }
        };

        let still_current = self.current.borrow().id() == Some(&*uid);
        if self.revalidate_identity && !still_current {
            tracing::info!(%uid, "identity changed while fetching token, dropping it");
            return RegistrationOutcome::Superseded;
        }

        let token = NotificationToken {
            value,
            owner_id: uid.clone(),
        };
        if let Err(error) = bounded(
            self.step_timeout,
            StoreError::Timeout,
            self.store
                .set(&self.tokens_collection, &uid, token.to_record()),
        )
        .await
        {
            tracing::error!(%uid, %error, "failed to store registration token");
            return RegistrationOutcome::Failed(RegistrationStep::Store);
        }
        tracing::info!(%uid, "registration token stored");

        let backend_notified = match bounded(
            self.step_timeout,
            BackendError::Timeout,
            self.backend.subscribe(&token.value),
        )
        .await
        {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(%uid, %error, "failed to subscribe token with backend");
                false
            }
        };
        RegistrationOutcome::Registered {
            token,
            backend_notified,
        }
    }

    /// Starts an independent registration cycle for every transition into an identity. Cycles
    /// still running at shutdown are aborted.
    pub async fn run(
        self,
        mut transitions: mpsc::UnboundedReceiver<Transition>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut cycles = JoinSet::new();
        loop {
            tokio::select! {
                transition = transitions.recv() => match transition {
                    Some(transition) => {
                        if let Some(identity) = transition.entered() {
                            let manager = self.clone();
                            let identity = identity.clone();
                            cycles.spawn(async move { manager.register(identity).await });
                        }
                    }
                    None => break,
                },
                Some(finished) = cycles.join_next(), if !cycles.is_empty() => {
                    match finished {
                        Ok(outcome) => tracing::debug!(?outcome, "token registration finished"),
                        Err(error) => tracing::warn!(%error, "token registration aborted"),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        cycles.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use homing_common::{FieldValue, PushPayload, Subscription};
    use homing_fake_backend::{FakePush, MemoryStore, RecordingBackend};

    use super::*;

    struct Fixture {
        push: FakePush,
        store: MemoryStore,
        backend: RecordingBackend,
        current: watch::Sender<IdentityState>,
        config: ClientConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                push: FakePush::new(),
                store: MemoryStore::new(),
                backend: RecordingBackend::new(),
                current: watch::channel(Identity::new("u1").into()).0,
                config: ClientConfig {
                    vapid_key: "vapid".into(),
                    ..Default::default()
                },
            }
        }

        fn manager(&self) -> NotificationTokenManager {
            NotificationTokenManager::new(
                Arc::new(self.push.clone()),
                Arc::new(self.store.clone()),
                Arc::new(self.backend.clone()),
                self.current.subscribe(),
                &self.config,
            )
        }
    }

    #[tokio::test]
    async fn granted_permission_stores_and_subscribes() {
        let fixture = Fixture::new();
        fixture.push.set_token(Ok(Some("tok-1".into())));

        let outcome = fixture.manager().register(Identity::new("u1")).await;
        let token = NotificationToken {
            value: "tok-1".into(),
            owner_id: "u1".into(),
        };
        assert_eq!(
            outcome,
            RegistrationOutcome::Registered {
                token: token.clone(),
                backend_notified: true,
            }
        );
        assert_eq!(fixture.store.get("fcmTokens", "u1"), Some(token.to_record()));
        assert_eq!(fixture.backend.subscribed(), vec![Arc::<str>::from("tok-1")]);
        assert_eq!(&*fixture.push.token_requests()[0].vapid_key, "vapid");
    }

    #[tokio::test]
    async fn permission_other_than_granted_does_nothing() {
        for permission in [Permission::Denied, Permission::Dismissed] {
            let fixture = Fixture::new();
            fixture.push.set_permission(Ok(permission));
            let outcome = fixture.manager().register(Identity::new("u1")).await;
            assert_eq!(outcome, RegistrationOutcome::PermissionNotGranted(permission));
            assert!(fixture.push.token_requests().is_empty());
            assert!(fixture.store.writes().is_empty());
            assert!(fixture.backend.subscribed().is_empty());
        }
    }

    #[tokio::test]
    async fn missing_token_is_a_soft_failure() {
        let fixture = Fixture::new();
        fixture.push.set_token(Ok(None));
        let outcome = fixture.manager().register(Identity::new("u1")).await;
        assert_eq!(outcome, RegistrationOutcome::NoToken);
        assert!(fixture.store.writes().is_empty());
        assert!(fixture.backend.subscribed().is_empty());
    }

    #[tokio::test]
    async fn each_failing_step_stops_the_cycle() {
        let fixture = Fixture::new();
        fixture
            .push
            .set_permission(Err(PushError::Permission("blocked".into())));
        assert_eq!(
            fixture.manager().register(Identity::new("u1")).await,
            RegistrationOutcome::Failed(RegistrationStep::Permission)
        );

        let fixture = Fixture::new();
        fixture.push.set_token(Err(PushError::Token("no service worker".into())));
        assert_eq!(
            fixture.manager().register(Identity::new("u1")).await,
            RegistrationOutcome::Failed(RegistrationStep::Token)
        );
        assert!(fixture.store.writes().is_empty());

        let fixture = Fixture::new();
        fixture
            .store
            .fail_writes(Some(StoreError::Unavailable("offline".into())));
        assert_eq!(
            fixture.manager().register(Identity::new("u1")).await,
            RegistrationOutcome::Failed(RegistrationStep::Store)
        );
        assert!(fixture.backend.subscribed().is_empty());
    }

    #[tokio::test]
    async fn backend_failure_keeps_stored_token() {
        let fixture = Fixture::new();
        fixture.backend.fail(Some(BackendError::Status(502)));
        let outcome = fixture.manager().register(Identity::new("u1")).await;
        assert!(matches!(
            outcome,
            RegistrationOutcome::Registered {
                backend_notified: false,
                ..
            }
        ));
        let record = fixture.store.get("fcmTokens", "u1").unwrap();
        assert_eq!(record[NotificationToken::FIELD_OWNER], FieldValue::text("u1"));
        assert_eq!(fixture.backend.subscribed().len(), 1);
    }

    #[tokio::test]
    async fn repeat_registration_overwrites() {
        let fixture = Fixture::new();
        let manager = fixture.manager();
        fixture.push.set_token(Ok(Some("first".into())));
        manager.register(Identity::new("u1")).await;
        fixture.push.set_token(Ok(Some("second".into())));
        manager.register(Identity::new("u1")).await;

        assert_eq!(fixture.store.len("fcmTokens"), 1);
        let record = fixture.store.get("fcmTokens", "u1").unwrap();
        assert_eq!(record[NotificationToken::FIELD_VALUE], FieldValue::text("second"));
    }

    #[tokio::test]
    async fn token_for_a_stale_identity_is_dropped() {
        let fixture = Fixture::new();
        fixture.current.send_replace(Identity::new("u2").into());
        assert_eq!(
            fixture.manager().register(Identity::new("u1")).await,
            RegistrationOutcome::Superseded
        );
        assert!(fixture.store.writes().is_empty());

        let mut fixture = fixture;
        fixture.config.revalidate_identity = false;
        assert!(matches!(
            fixture.manager().register(Identity::new("u1")).await,
            RegistrationOutcome::Registered { .. }
        ));
    }

    struct StalledPush;

    #[async_trait]
    impl PushSubsystem for StalledPush {
        async fn request_permission(&self) -> Result<Permission, PushError> {
            std::future::pending().await
        }

        async fn get_token(&self, _: &TokenRequest) -> Result<Option<Arc<str>>, PushError> {
            std::future::pending().await
        }

        fn on_foreground_message(&self) -> Subscription<PushPayload> {
            Subscription::new(mpsc::unbounded_channel().1, || {})
        }
    }

    #[tokio::test]
    async fn step_timeout_bounds_the_wait() {
        let fixture = Fixture::new();
        let config = ClientConfig {
            step_timeout: Some(Duration::from_millis(20)),
            ..fixture.config.clone()
        };
        let manager = NotificationTokenManager::new(
            Arc::new(StalledPush),
            Arc::new(fixture.store.clone()),
            Arc::new(fixture.backend.clone()),
            fixture.current.subscribe(),
            &config,
        );
        assert_eq!(
            manager.register(Identity::new("u1")).await,
            RegistrationOutcome::Failed(RegistrationStep::Permission)
        );
    }
}
