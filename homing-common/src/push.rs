use std::sync::Arc;

use crate::{FieldValue, Record};

/// Outcome of asking the platform for permission to show notifications.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Permission {
    Granted,
    Denied,
    /// The prompt was closed without an answer.
    Dismissed,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TokenRequest {
    /// Application server public key (VAPID).
    pub vapid_key: Arc<str>,
}

/// A delivery token and the identity it was registered for.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NotificationToken {
    pub value: Arc<str>,
    pub owner_id: Arc<str>,
}

impl NotificationToken {
    pub const FIELD_VALUE: &'static str = "token";
    pub const FIELD_OWNER: &'static str = "uid";

    pub fn to_record(&self) -> Record {
        Record::from([
            (Self::FIELD_VALUE.into(), FieldValue::Text(self.value.clone())),
            (Self::FIELD_OWNER.into(), FieldValue::Text(self.owner_id.clone())),
        ])
    }
}

/// A push message delivered while the session is in the foreground.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PushPayload {
    pub title: Option<Arc<str>>,
    pub body: Option<Arc<str>>,
}

impl PushPayload {
    pub fn new(title: impl Into<Arc<str>>, body: impl Into<Arc<str>>) -> Self {
        Self {
            title: Some(title.into()),
            body: Some(body.into()),
        }
    }
}
