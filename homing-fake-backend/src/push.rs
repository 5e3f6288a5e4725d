use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use homing_common::{Permission, PushError, PushPayload, PushSubsystem, Subscription, TokenRequest};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

struct PushInner {
    permission: Result<Permission, PushError>,
    /// `None` hands out a fresh token on every request.
    token: Option<Result<Option<Arc<str>>, PushError>>,
    permission_requests: usize,
    token_requests: Vec<TokenRequest>,
    listeners: BTreeMap<u64, mpsc::UnboundedSender<PushPayload>>,
    next_listener: u64,
    opened: usize,
    releases: usize,
}

impl Default for PushInner {
    fn default() -> Self {
        Self {
            permission: Ok(Permission::Granted),
            token: None,
            permission_requests: 0,
            token_requests: Vec::new(),
            listeners: BTreeMap::new(),
            next_listener: 0,
            opened: 0,
            releases: 0,
        }
    }
}

/// A push subsystem that grants permission and issues tokens unless told otherwise.
#[derive(Clone, Default)]
pub struct FakePush {
    inner: Arc<Mutex<PushInner>>,
}

impl FakePush {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_permission(&self, permission: Result<Permission, PushError>) {
        self.inner.lock().permission = permission;
    }

    pub fn set_token(&self, token: Result<Option<Arc<str>>, PushError>) {
        self.inner.lock().token = Some(token);
    }

    /// Delivers a payload to every foreground listener.
    pub fn deliver(&self, payload: PushPayload) {
        for listener in self.inner.lock().listeners.values() {
            let _ = listener.send(payload.clone());
        }
    }

    pub fn permission_requests(&self) -> usize {
        self.inner.lock().permission_requests
    }

    pub fn token_requests(&self) -> Vec<TokenRequest> {
        self.inner.lock().token_requests.clone()
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
impl PushSubsystem for FakePush {
    async fn request_permission(&self) -> Result<Permission, PushError> {
        let mut inner = self.inner.lock();
        inner.permission_requests += 1;
        inner.permission.clone()
    }

    async fn get_token(&self, request: &TokenRequest) -> Result<Option<Arc<str>>, PushError> {
        let mut inner = self.inner.lock();
        inner.token_requests.push(request.clone());
        match &inner.token {
            Some(token) => token.clone(),
            None => Ok(Some(Uuid::now_v7().to_string().into())),
        }
    }

    fn on_foreground_message(&self) -> Subscription<PushPayload> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        let id = inner.next_listener;
        inner.next_listener += 1;
        inner.opened += 1;
        inner.listeners.insert(id, tx);
        drop(inner);

        let push = self.inner.clone();
        Subscription::new(rx, move || {
            let mut inner = push.lock();
            if inner.listeners.remove(&id).is_some() {
                inner.releases += 1;
            }
        })
    }
}
