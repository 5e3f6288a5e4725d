use async_trait::async_trait;
use homing_common::{BackendError, SubscriptionBackend};
use serde::Serialize;
use url::Url;

#[derive(Debug, Serialize)]
struct SubscribeRequest<'a> {
    token: &'a str,
}

/// Posts delivery tokens to `{base}/subscribe` as `{"token": "..."}`.
#[derive(Clone, Debug)]
pub struct HttpSubscriptionBackend {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpSubscriptionBackend {
    pub fn new(base: &Url) -> Result<Self, url::ParseError> {
        let endpoint = Url::parse(&format!(
            "{}/subscribe",
            base.as_str().trim_end_matches('/')
        ))?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl SubscriptionBackend for HttpSubscriptionBackend {
    async fn subscribe(&self, token: &str) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&SubscribeRequest { token })
            .send()
            .await
            .map_err(|error| BackendError::Transport(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }
        tracing::debug!(%status, endpoint = %self.endpoint, "token subscribed");
        Ok(())
    }
}
