use std::sync::Arc;

use async_trait::async_trait;
use homing_common::{Alert, Alerter, BackendError, SubscriptionBackend};
use parking_lot::Mutex;

#[derive(Default)]
struct BackendInner {
    subscribed: Vec<Arc<str>>,
    failure: Option<BackendError>,
}

/// A subscription endpoint that remembers every token it was sent.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    inner: Arc<Mutex<BackendInner>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, error: Option<BackendError>) {
        self.inner.lock().failure = error;
    }

    /// Every token received, including the ones answered with an error.
    pub fn subscribed(&self) -> Vec<Arc<str>> {
        self.inner.lock().subscribed.clone()
    }
}

#[async_trait]
impl SubscriptionBackend for RecordingBackend {
    async fn subscribe(&self, token: &str) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        inner.subscribed.push(token.into());
        match &inner.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
struct AlerterInner {
    shown: Vec<Alert>,
    showing: usize,
    max_showing: usize,
}

/// An alerter that records what it was asked to show and how many alerts were up at once.
#[derive(Clone, Default)]
pub struct RecordingAlerter {
    inner: Arc<Mutex<AlerterInner>>,
}

impl RecordingAlerter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> Vec<Alert> {
        self.inner.lock().shown.clone()
    }

    pub fn max_showing(&self) -> usize {
        self.inner.lock().max_showing
    }
}

#[async_trait]
impl Alerter for RecordingAlerter {
    async fn alert(&self, alert: Alert) {
        {
            let mut inner = self.inner.lock();
            inner.shown.push(alert);
            inner.showing += 1;
            inner.max_showing = inner.max_showing.max(inner.showing);
        }
        // give the user a moment to dismiss
        tokio::task::yield_now().await;
        self.inner.lock().showing -= 1;
    }
}
