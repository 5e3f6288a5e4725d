use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use homing_common::{AuthError, Identity, IdentityProvider, IdentityState, Subscription};
use parking_lot::Mutex;
use tokio::sync::mpsc;

#[derive(Default)]
struct IdentityInner {
    current: IdentityState,
    listeners: BTreeMap<u64, mpsc::UnboundedSender<IdentityState>>,
    next_listener: u64,
    opened: usize,
    releases: usize,
    sign_out_calls: usize,
    sign_out_failure: Option<AuthError>,
}

/// An identity provider whose sign-ins are driven by the caller.
#[derive(Clone, Default)]
pub struct FakeIdentityProvider {
    inner: Arc<Mutex<IdentityInner>>,
}

impl FakeIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(identity: Identity) -> Self {
        let provider = Self::new();
        provider.inner.lock().current = identity.into();
        provider
    }

    pub fn sign_in(&self, identity: Identity) {
        self.emit(identity.into());
    }

    /// Replaces the current state and notifies every listener, as the provider does on sign-in,
    /// sign-out and token refresh.
    pub fn emit(&self, state: IdentityState) {
        let mut inner = self.inner.lock();
        inner.current = state.clone();
        for listener in inner.listeners.values() {
            let _ = listener.send(state.clone());
        }
    }

    pub fn current(&self) -> IdentityState {
        self.inner.lock().current.clone()
    }

    pub fn fail_sign_out(&self, error: Option<AuthError>) {
        self.inner.lock().sign_out_failure = error;
    }

    pub fn sign_out_calls(&self) -> usize {
        self.inner.lock().sign_out_calls
    }

    pub fn active_listeners(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    pub fn listeners_opened(&self) -> usize {
        self.inner.lock().opened
    }

    pub fn listeners_released(&self) -> usize {
        self.inner.lock().releases
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    fn on_change(&self) -> Subscription<IdentityState> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        let id = inner.next_listener;
        inner.next_listener += 1;
        inner.opened += 1;
        let _ = tx.send(inner.current.clone());
        inner.listeners.insert(id, tx);
        drop(inner);

        let provider = self.inner.clone();
        Subscription::new(rx, move || {
            let mut inner = provider.lock();
            if inner.listeners.remove(&id).is_some() {
                inner.releases += 1;
            }
        })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let failure = {
            let mut inner = self.inner.lock();
            inner.sign_out_calls += 1;
            inner.sign_out_failure.clone()
        };
        match failure {
            Some(error) => Err(error),
            None => {
                self.emit(IdentityState::NoIdentity);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_current_state_first() {
        let provider = FakeIdentityProvider::signed_in(Identity::new("u1"));
        let mut changes = provider.on_change();
        assert_eq!(changes.next().await, Some(Identity::new("u1").into()));

        provider.sign_out().await.unwrap();
        assert_eq!(changes.next().await, Some(IdentityState::NoIdentity));
    }

    #[tokio::test]
    async fn failed_sign_out_keeps_identity() {
        let provider = FakeIdentityProvider::signed_in(Identity::new("u1"));
        provider.fail_sign_out(Some(AuthError::SignOut("network".into())));
        assert!(provider.sign_out().await.is_err());
        assert_eq!(provider.current(), Identity::new("u1").into());
        assert_eq!(provider.sign_out_calls(), 1);
    }
}
