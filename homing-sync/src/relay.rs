use std::sync::Arc;

use homing_common::{Alert, Alerter, PushPayload, Subscription};
use tokio::sync::watch;

/// Shows push messages that arrive while the session is in the foreground.
pub struct ForegroundNotificationRelay {
    alerter: Arc<dyn Alerter>,
}

impl ForegroundNotificationRelay {
    pub fn new(alerter: Arc<dyn Alerter>) -> Self {
        Self { alerter }
    }

    /// Alerts are shown one at a time, in arrival order: the next payload is not read until the
    /// current alert has been dismissed. Shutdown does not wait for an alert that is still up.
    pub async fn run(
        self,
        mut payloads: Subscription<PushPayload>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                payload = payloads.next() => match payload {
                    Some(payload) => {
                        tracing::info!(?payload, "message received in foreground");
                        tokio::select! {
                            () = self.alerter.alert(Alert::from(payload)) => {}
                            _ = shutdown.changed() => break,
                        }
                    }
                    None => {
                        tracing::info!("foreground messages stopped, shutting down");
                        break;
                    }
                },
                _ = shutdown.changed() => break,
            }
        }
        payloads.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use homing_common::PushSubsystem;
    use homing_fake_backend::{FakePush, RecordingAlerter};

    use super::*;

    /// Never dismissed.
    #[derive(Default)]
    struct StuckAlerter {
        showing: AtomicUsize,
    }

    #[async_trait]
    impl Alerter for StuckAlerter {
        async fn alert(&self, _alert: Alert) {
            self.showing.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<()>().await
        }
    }

    #[tokio::test]
    async fn alerts_in_arrival_order_one_at_a_time() {
        let push = FakePush::new();
        let alerter = RecordingAlerter::new();
        let (stop, shutdown) = watch::channel(false);
        let relay = ForegroundNotificationRelay::new(Arc::new(alerter.clone()));
        let task = tokio::spawn(relay.run(push.on_foreground_message(), shutdown));

        push.deliver(PushPayload::new("first", "a"));
        push.deliver(PushPayload::new("second", "b"));
        push.deliver(PushPayload {
            title: Some("third".into()),
            body: None,
        });
        while alerter.shown().len() < 3 {
            tokio::task::yield_now().await;
        }
        let shown = alerter
            .shown()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        assert_eq!(shown, ["first: a", "second: b", "third: "]);
        assert_eq!(alerter.max_showing(), 1);

        stop.send_replace(true);
        task.await.unwrap();
        assert_eq!(push.active_listeners(), 0);
        assert_eq!(push.listeners_released(), 1);
    }

    #[tokio::test]
    async fn shutdown_does_not_wait_for_an_open_alert() {
        let push = FakePush::new();
        let alerter = Arc::new(StuckAlerter::default());
        let (stop, shutdown) = watch::channel(false);
        let relay = ForegroundNotificationRelay::new(alerter.clone());
        let task = tokio::spawn(relay.run(push.on_foreground_message(), shutdown));

        push.deliver(PushPayload::new("Chat", "hello"));
        push.deliver(PushPayload::new("Chat", "queued"));
        while alerter.showing.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        stop.send_replace(true);
        tokio::time::timeout(std::time::Duration::from_secs(2), task)
            .await
            .expect("relay kept waiting on the alert")
            .unwrap();
        assert_eq!(alerter.showing.load(Ordering::SeqCst), 1);
        assert_eq!(push.active_listeners(), 0);
        assert_eq!(push.listeners_released(), 1);
    }
}
