use std::{sync::Arc, time::Duration};

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Application server public key handed to the push subsystem when requesting a token.
    pub vapid_key: Arc<str>,
    pub messages_collection: Arc<str>,
    pub tokens_collection: Arc<str>,
    /// Shown for authors without a display name.
    pub fallback_display_name: Arc<str>,
    /// Upper bound for each asynchronous step of token registration and publishing. `None`
    /// waits indefinitely.
    pub step_timeout: Option<Duration>,
    /// Abandon a token registration whose identity stopped being current during the
    /// permission/token round trip.
    pub revalidate_identity: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            vapid_key: "".into(),
            messages_collection: "messages".into(),
            tokens_collection: "fcmTokens".into(),
            fallback_display_name: "Anonymous".into(),
            step_timeout: None,
            revalidate_identity: true,
        }
    }
}
