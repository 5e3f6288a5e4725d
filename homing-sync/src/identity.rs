use homing_common::{Identity, IdentityState, Subscription};
use tokio::sync::{mpsc, watch};

/// A change in who is signed in.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Transition {
    SignedIn(Identity),
    /// A different identity replaced the current one without an intermediate sign-out.
    Switched { from: Identity, to: Identity },
    /// Same identity id, delivered again (e.g. after a credential refresh).
    Refreshed(Identity),
    SignedOut(Identity),
}

impl Transition {
    fn between(previous: &IdentityState, next: &IdentityState) -> Option<Self> {
        use IdentityState::{HasIdentity, NoIdentity};
        match (previous, next) {
            (NoIdentity, NoIdentity) => None,
            (NoIdentity, HasIdentity(identity)) => Some(Self::SignedIn(identity.clone())),
            (HasIdentity(identity), NoIdentity) => Some(Self::SignedOut(identity.clone())),
            (HasIdentity(from), HasIdentity(to)) if from.id == to.id => {
                Some(Self::Refreshed(to.clone()))
            }
            (HasIdentity(from), HasIdentity(to)) => Some(Self::Switched {
                from: from.clone(),
                to: to.clone(),
            }),
        }
    }

    /// The identity this transition entered, if it moved into an identity that was not already
    /// current.
    pub fn entered(&self) -> Option<&Identity> {
        match self {
            Self::SignedIn(identity) | Self::Switched { to: identity, .. } => Some(identity),
            Self::Refreshed(_) | Self::SignedOut(_) => None,
        }
    }
}

/// Holds the current [`IdentityState`].
///
/// The session is the only writer: the value changes only when the identity provider delivers a
/// new state. Readers get a [`watch::Receiver`] and transition listeners get every
/// [`Transition`] in provider order.
#[derive(Debug)]
pub struct IdentitySession {
    current: watch::Sender<IdentityState>,
    listeners: Vec<mpsc::UnboundedSender<Transition>>,
}

impl Default for IdentitySession {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentitySession {
    pub fn new() -> Self {
        let (current, _) = watch::channel(IdentityState::NoIdentity);
        Self {
            current,
            listeners: Vec::new(),
        }
    }

    pub fn watch(&self) -> watch::Receiver<IdentityState> {
        self.current.subscribe()
    }

    pub fn transitions(&mut self) -> mpsc::UnboundedReceiver<Transition> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.push(tx);
        rx
    }

    fn apply(&mut self, next: IdentityState) -> Option<Transition> {
        let previous = self.current.send_replace(next.clone());
        let transition = Transition::between(&previous, &next)?;
        match &transition {
            Transition::SignedIn(identity) => tracing::info!(uid = %identity.id, "signed in"),
            Transition::Switched { from, to } => {
                tracing::info!(from = %from.id, to = %to.id, "identity switched")
            }
            Transition::Refreshed(identity) => {
                tracing::debug!(uid = %identity.id, "identity refreshed")
            }
            Transition::SignedOut(identity) => tracing::info!(uid = %identity.id, "signed out"),
        }
        self.listeners
            .retain(|listener| listener.send(transition.clone()).is_ok());
        Some(transition)
    }

    /// Follows the provider's changes until the provider goes away or `shutdown` fires. The
    /// subscription is released on every exit path.
    pub async fn run(
        mut self,
        mut changes: Subscription<IdentityState>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                change = changes.next() => match change {
                    Some(state) => {
                        self.apply(state);
                    }
                    None => {
                        tracing::info!("identity stream stopped, shutting down");
                        break;
                    }
                },
                _ = shutdown.changed() => break,
            }
        }
        changes.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use homing_common::IdentityProvider;
    use homing_fake_backend::FakeIdentityProvider;

    use super::*;

    fn u(id: &str) -> IdentityState {
        Identity::new(id).into()
    }

    #[test]
    fn transitions_follow_provider_order() {
        let mut session = IdentitySession::new();
        let reader = session.watch();
        let mut transitions = session.transitions();

        assert_eq!(session.apply(IdentityState::NoIdentity), None);
        session.apply(u("u1"));
        session.apply(u("u1"));
        session.apply(u("u2"));
        session.apply(IdentityState::NoIdentity);
        assert_eq!(*reader.borrow(), IdentityState::NoIdentity);

        let mut seen = Vec::new();
        while let Ok(transition) = transitions.try_recv() {
            seen.push(transition);
        }
        assert_eq!(
            seen,
            [
                Transition::SignedIn(Identity::new("u1")),
                Transition::Refreshed(Identity::new("u1")),
                Transition::Switched {
                    from: Identity::new("u1"),
                    to: Identity::new("u2"),
                },
                Transition::SignedOut(Identity::new("u2")),
            ]
        );
        let entered = seen.iter().filter_map(Transition::entered).collect::<Vec<_>>();
        assert_eq!(entered, [&Identity::new("u1"), &Identity::new("u2")]);
    }

    #[test]
    fn display_name_change_is_a_refresh() {
        let mut session = IdentitySession::new();
        session.apply(u("u1"));
        let renamed = Identity::new("u1").with_display_name("Dana");
        assert_eq!(
            session.apply(renamed.clone().into()),
            Some(Transition::Refreshed(renamed.clone()))
        );
        assert_eq!(*session.watch().borrow(), renamed.into());
    }

    #[tokio::test]
    async fn holds_latest_delivery_and_releases_on_shutdown() {
        let provider = FakeIdentityProvider::new();
        let session = IdentitySession::new();
        let mut reader = session.watch();
        let (stop, shutdown) = watch::channel(false);
        let task = tokio::spawn(session.run(provider.on_change(), shutdown));

        provider.sign_in(Identity::new("u1"));
        reader.wait_for(|state| *state == u("u1")).await.unwrap();
        provider.emit(IdentityState::NoIdentity);
        provider.sign_in(Identity::new("u3"));
        reader.wait_for(|state| *state == u("u3")).await.unwrap();
        assert_eq!(provider.active_listeners(), 1);

        stop.send_replace(true);
        task.await.unwrap();
        assert_eq!(provider.active_listeners(), 0);
        assert_eq!(provider.listeners_released(), 1);
    }
}
