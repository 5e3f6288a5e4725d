use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use homing_common::{
    Direction, Document, DocumentId, DocumentStore, FieldValue, Record, Snapshot, StoreError,
    Subscription,
};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// A write as it was submitted, before server timestamps were resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct StoreWrite {
    pub collection: Arc<str>,
    /// `None` for `add`, the caller's key for `set`.
    pub key: Option<Arc<str>>,
    pub record: Record,
}

struct Listener {
    collection: Arc<str>,
    order_by: Arc<str>,
    direction: Direction,
    updates: mpsc::UnboundedSender<Result<Snapshot, StoreError>>,
}

#[derive(Default)]
struct StoreInner {
    collections: HashMap<Arc<str>, BTreeMap<DocumentId, Record>>,
    listeners: BTreeMap<u64, Listener>,
    next_listener: u64,
    last_timestamp: Option<DateTime<Utc>>,
    writes: Vec<StoreWrite>,
    pending_writes: usize,
    opened: usize,
    releases: usize,
    failure: Option<StoreError>,
}

/// A document store with live ordered queries, kept entirely in memory.
///
/// Server timestamps are strictly increasing in write order.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
    paused: Arc<watch::Sender<bool>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            inner: Default::default(),
            paused: Arc::new(watch::channel(false).0),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following write fail with `error`, or succeed again with `None`.
    pub fn fail_writes(&self, error: Option<StoreError>) {
        self.inner.lock().failure = error;
    }

    /// Holds writes in flight until [`MemoryStore::resume_writes`].
    pub fn pause_writes(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume_writes(&self) {
        self.paused.send_replace(false);
    }

    /// Pushes an arbitrary snapshot to every live query on `collection`, bypassing the store's
    /// own ordering.
    pub fn push_snapshot(&self, collection: &str, snapshot: Snapshot) {
        let inner = self.inner.lock();
        for listener in inner.listeners.values() {
            if &*listener.collection == collection {
                let _ = listener.updates.send(Ok(snapshot.clone()));
            }
        }
    }

    /// Breaks every live query on `collection`.
    pub fn fail_query(&self, collection: &str, reason: &str) {
        let inner = self.inner.lock();
        for listener in inner.listeners.values() {
            if &*listener.collection == collection {
                let _ = listener.updates.send(Err(StoreError::Query {
                    collection: collection.to_owned(),
                    reason: reason.to_owned(),
                }));
            }
        }
    }

    pub fn writes(&self) -> Vec<StoreWrite> {
        self.inner.lock().writes.clone()
    }

    pub fn pending_writes(&self) -> usize {
        self.inner.lock().pending_writes
    }

    pub fn get(&self, collection: &str, key: &str) -> Option<Record> {
        self.inner
            .lock()
            .collections
            .get(collection)?
            .get(&DocumentId(key.into()))
            .cloned()
    }

    pub fn len(&self, collection: &str) -> usize {
        self.inner
            .lock()
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    pub fn active_queries(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    pub fn queries_opened(&self) -> usize {
        self.inner.lock().opened
    }

    pub fn queries_released(&self) -> usize {
        self.inner.lock().releases
    }

    async fn write(
        &self,
        collection: &str,
        key: Option<&str>,
        record: Record,
    ) -> Result<DocumentId, StoreError> {
        let pending = PendingWrite::start(&self.inner);
        let mut paused = self.paused.subscribe();
        // the sender lives as long as `self`, so this only errors if it was dropped mid-wait
        let _ = paused.wait_for(|paused| !paused).await;
        drop(pending);

        let mut inner = self.inner.lock();
        let collection: Arc<str> = collection.into();
        inner.writes.push(StoreWrite {
            collection: collection.clone(),
            key: key.map(Into::into),
            record: record.clone(),
        });
        if let Some(error) = inner.failure.clone() {
            return Err(error);
        }

        let now = inner.tick();
        let record = record
            .into_iter()
            .map(|(field, value)| match value {
                FieldValue::ServerTimestamp => (field, FieldValue::Timestamp(now)),
                value => (field, value),
            })
            .collect();
        let id = DocumentId(match key {
            Some(key) => key.into(),
            None => Uuid::now_v7().to_string().into(),
        });
        inner
            .collections
            .entry(collection.clone())
            .or_default()
            .insert(id.clone(), record);
        inner.notify(&collection);
        Ok(id)
    }
}

/// Counts a write as in flight until it is dropped, including when the caller gives up on it.
struct PendingWrite<'a>(&'a Mutex<StoreInner>);

impl<'a> PendingWrite<'a> {
    fn start(inner: &'a Mutex<StoreInner>) -> Self {
        inner.lock().pending_writes += 1;
        Self(inner)
    }
}

impl Drop for PendingWrite<'_> {
    fn drop(&mut self) {
        self.0.lock().pending_writes -= 1;
    }
}

impl StoreInner {
    fn tick(&mut self) -> DateTime<Utc> {
        let now = match self.last_timestamp {
            Some(last) => Utc::now().max(last + TimeDelta::microseconds(1)),
            None => Utc::now(),
        };
        self.last_timestamp = Some(now);
        now
    }

    fn snapshot(&self, collection: &str, order_by: &str, direction: Direction) -> Snapshot {
        let mut documents = self
            .collections
            .get(collection)
            .into_iter()
            .flatten()
            .filter(|(_, record)| record.contains_key(order_by))
            .map(|(id, record)| Document {
                id: id.clone(),
                fields: record.clone(),
            })
            .collect::<Vec<_>>();
        documents.sort_by(|a, b| {
            compare_fields(&a.fields[order_by], &b.fields[order_by]).then_with(|| a.id.cmp(&b.id))
        });
        if direction == Direction::Descending {
            documents.reverse();
        }
        Snapshot { documents }
    }

    fn notify(&self, collection: &str) {
        for listener in self.listeners.values() {
            if &*listener.collection == collection {
                let snapshot = self.snapshot(collection, &listener.order_by, listener.direction);
                let _ = listener.updates.send(Ok(snapshot));
            }
        }
    }
}

fn compare_fields(a: &FieldValue, b: &FieldValue) -> Ordering {
    fn rank(value: &FieldValue) -> u8 {
        match value {
            FieldValue::Null => 0,
            FieldValue::Timestamp(_) => 1,
            FieldValue::Text(_) => 2,
            FieldValue::ServerTimestamp => 3,
        }
    }
    match (a, b) {
        (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => a.cmp(b),
        (FieldValue::Text(a), FieldValue::Text(b)) => a.cmp(b),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn subscribe_ordered(
        &self,
        collection: &str,
        order_by: &str,
        direction: Direction,
    ) -> Subscription<Result<Snapshot, StoreError>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        let id = inner.next_listener;
        inner.next_listener += 1;
        inner.opened += 1;
        let _ = tx.send(Ok(inner.snapshot(collection, order_by, direction)));
        inner.listeners.insert(
            id,
            Listener {
                collection: collection.into(),
                order_by: order_by.into(),
                direction,
                updates: tx,
            },
        );
        drop(inner);

        let store = self.inner.clone();
        Subscription::new(rx, move || {
            let mut inner = store.lock();
            if inner.listeners.remove(&id).is_some() {
                inner.releases += 1;
            }
        })
    }

    async fn add(&self, collection: &str, record: Record) -> Result<DocumentId, StoreError> {
        self.write(collection, None, record).await
    }

    async fn set(&self, collection: &str, key: &str, record: Record) -> Result<(), StoreError> {
        self.write(collection, Some(key), record).await.map(drop)
    }
}
