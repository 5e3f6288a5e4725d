use tokio::sync::mpsc;

type Release = Box<dyn FnOnce() + Send>;

/// A live subscription to a stream of updates from a collaborator.
///
/// The release callback runs exactly once: on the first call to [`Subscription::unsubscribe`],
/// or when the subscription is dropped, whichever comes first. Later calls do nothing.
pub struct Subscription<T> {
    updates: mpsc::UnboundedReceiver<T>,
    release: Option<Release>,
}

impl<T> Subscription<T> {
    pub fn new(
        updates: mpsc::UnboundedReceiver<T>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            updates,
            release: Some(Box::new(release)),
        }
    }

    /// Waits for the next update. Returns `None` once unsubscribed or once the producer is gone.
    pub async fn next(&mut self) -> Option<T> {
        if self.release.is_none() {
            return None;
        }
        self.updates.recv().await
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    pub fn unsubscribe(&mut self) {
        if let Some(release) = self.release.take() {
            self.updates.close();
            release();
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
