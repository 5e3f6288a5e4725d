use homing_common::{ChatMessage, FeedView, Snapshot, StoreError, Subscription};
use tokio::sync::watch;

#[derive(Clone, Debug, Default, PartialEq)]
pub enum FeedState {
    /// No snapshot has arrived yet.
    #[default]
    Connecting,
    Live(FeedView),
    /// The live query broke. Terminal: the feed does not resubscribe.
    Failed(String),
}

impl FeedState {
    pub fn view(&self) -> Option<&FeedView> {
        match self {
            Self::Live(view) => Some(view),
            Self::Connecting | Self::Failed(_) => None,
        }
    }
}

/// Turns the live message query into a [`FeedView`], replaced wholesale on every snapshot.
#[derive(Debug)]
pub struct MessageFeedSubscriber {
    state: watch::Sender<FeedState>,
}

impl Default for MessageFeedSubscriber {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageFeedSubscriber {
    pub fn new() -> Self {
        let (state, _) = watch::channel(FeedState::Connecting);
        Self { state }
    }

    pub fn watch(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    fn apply(&self, update: Result<Snapshot, StoreError>) -> Result<(), StoreError> {
        let snapshot = match update {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::error!(%error, "message feed failed");
                self.state.send_replace(FeedState::Failed(error.to_string()));
                return Err(error);
            }
        };
        let view = snapshot
            .documents
            .iter()
            .filter_map(|document| match ChatMessage::from_document(document) {
                Ok(message) => Some(message),
                Err(error) => {
                    tracing::warn!(%error, "skipping unreadable message");
                    None
                }
            })
            .collect::<FeedView>();
        tracing::trace!(messages = view.len(), "feed snapshot");
        self.state.send_replace(FeedState::Live(view));
        Ok(())
    }

    /// Follows `snapshots` until the query fails, the store goes away or `shutdown` fires. The
    /// subscription is released on every exit path.
    pub async fn run(
        self,
        mut snapshots: Subscription<Result<Snapshot, StoreError>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                update = snapshots.next() => match update {
                    Some(update) => {
                        if self.apply(update).is_err() {
                            break;
                        }
                    }
                    None => {
                        tracing::info!("message feed stopped, shutting down");
                        break;
                    }
                },
                _ = shutdown.changed() => break,
            }
        }
        snapshots.unsubscribe();
    }
}
