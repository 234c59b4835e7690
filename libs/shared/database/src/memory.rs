use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{
    CommitResult, Document, DocumentStore, FieldValue, FieldWrite, Fields, Precondition, Query,
    Write, WriteBatch,
};
use crate::subscription::{Snapshot, Subscription};

type Collections = HashMap<String, BTreeMap<String, Fields>>;

#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub collection: String,
    pub id: String,
}

/// In-process document store. A single lock makes every commit atomic.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    collections: RwLock<Collections>,
    changes: broadcast::Sender<ChangeEvent>,
    last_timestamp: Mutex<Option<DateTime<Utc>>>,
    offline: AtomicBool,
    failing_commits: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(Inner {
                collections: RwLock::new(HashMap::new()),
                changes,
                last_timestamp: Mutex::new(None),
                offline: AtomicBool::new(false),
                failing_commits: AtomicUsize::new(0),
            }),
        }
    }

    /// Simulate an outage: every call fails with `Unavailable` while set.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail the next `count` commits with `Unavailable` without applying them.
    pub fn fail_next_commits(&self, count: usize) {
        self.inner.failing_commits.store(count, Ordering::SeqCst);
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.inner
            .collections
            .read()
            .await
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }
}

impl Inner {
    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Strictly increasing, so ordering by timestamp follows commit order.
    fn next_timestamp(&self) -> String {
        let mut last = self
            .last_timestamp
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Utc::now();
        let ts = match *last {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        *last = Some(ts);
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    async fn run_query(&self, query: &Query) -> Vec<Document> {
        let collections = self.collections.read().await;
        let docs = collections
            .get(&query.collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Document::new(id.clone(), data.clone()))
                    .filter(|doc| query.matches(doc))
                    .collect()
            })
            .unwrap_or_default();
        query.finish(docs)
    }
}

fn check_precondition(collections: &Collections, pre: &Precondition) -> Result<(), StoreError> {
    match pre {
        Precondition::Exists { collection, id } => {
            let exists = collections
                .get(collection)
                .map(|docs| docs.contains_key(id))
                .unwrap_or(false);
            if !exists {
                return Err(StoreError::not_found(collection, id));
            }
        }
        Precondition::FieldEquals {
            collection,
            id,
            field,
            expected,
        } => {
            let doc = collections
                .get(collection)
                .and_then(|docs| docs.get(id))
                .ok_or_else(|| StoreError::not_found(collection, id))?;
            let actual = doc.get(field).unwrap_or(&Value::Null);
            if actual != expected {
                return Err(StoreError::PreconditionFailed(format!(
                    "{}/{}: expected {} = {}, found {}",
                    collection, id, field, expected, actual
                )));
            }
        }
    }
    Ok(())
}

fn apply_fields(
    target: &mut Fields,
    fields: &[FieldWrite],
    timestamp: &str,
) -> Result<(), StoreError> {
    for write in fields {
        let value = match &write.value {
            FieldValue::Set(v) => v.clone(),
            FieldValue::ServerTimestamp => Value::String(timestamp.to_string()),
            FieldValue::Increment(by) => {
                let current = match target.get(&write.field) {
                    None | Some(Value::Null) => 0,
                    Some(v) => v.as_i64().ok_or_else(|| {
                        StoreError::InvalidWrite(format!(
                            "cannot increment non-integer field {}",
                            write.field
                        ))
                    })?,
                };
                Value::from(current + by)
            }
        };
        target.insert(write.field.clone(), value);
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.inner.check_online()?;
        let collections = self.inner.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document::new(id, data.clone())))
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.inner.check_online()?;
        Ok(self.inner.run_query(query).await)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<CommitResult, StoreError> {
        self.inner.check_online()?;
        if self.inner.take_injected_failure() {
            warn!("Injected commit failure");
            return Err(StoreError::Unavailable("injected commit failure".to_string()));
        }

        let mut collections = self.inner.collections.write().await;

        for pre in &batch.preconditions {
            check_precondition(&collections, pre)?;
        }

        // Stage every write against a working copy so a late failure leaves nothing applied.
        let timestamp = self.inner.next_timestamp();
        let mut staged: HashMap<(String, String), Option<Fields>> = HashMap::new();
        let mut order: Vec<(String, String)> = Vec::new();
        let mut created_ids = Vec::new();

        for write in &batch.writes {
            let (key, fields, must_exist, create) = match write {
                Write::Create {
                    collection,
                    id,
                    fields,
                } => {
                    let id = id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
                    created_ids.push(id.clone());
                    ((collection.clone(), id), Some(fields), false, true)
                }
                Write::Update {
                    collection,
                    id,
                    fields,
                } => ((collection.clone(), id.clone()), Some(fields), true, false),
                Write::Delete { collection, id } => {
                    ((collection.clone(), id.clone()), None, true, false)
                }
            };

            let current = match staged.get(&key) {
                Some(doc) => doc.clone(),
                None => collections
                    .get(&key.0)
                    .and_then(|docs| docs.get(&key.1))
                    .cloned(),
            };

            if create && current.is_some() {
                return Err(StoreError::AlreadyExists(format!("{}/{}", key.0, key.1)));
            }
            if must_exist && current.is_none() {
                return Err(StoreError::not_found(&key.0, &key.1));
            }

            let next = match fields {
                Some(fields) => {
                    let mut doc = current.unwrap_or_default();
                    apply_fields(&mut doc, fields, &timestamp)?;
                    Some(doc)
                }
                None => None,
            };

            if !staged.contains_key(&key) {
                order.push(key.clone());
            }
            staged.insert(key, next);
        }

        for key in &order {
            let docs = collections.entry(key.0.clone()).or_default();
            match staged.remove(key).flatten() {
                Some(doc) => {
                    docs.insert(key.1.clone(), doc);
                }
                None => {
                    docs.remove(&key.1);
                }
            }
        }
        drop(collections);

        debug!("Committed {} writes", order.len());
        for (collection, id) in order {
            // No receivers is fine: nobody is watching.
            let _ = self.inner.changes.send(ChangeEvent { collection, id });
        }

        Ok(CommitResult { created_ids })
    }

    async fn watch(&self, query: Query) -> Result<Subscription, StoreError> {
        self.inner.check_online()?;
        let inner = Arc::clone(&self.inner);
        // Subscribe before the first read so no change slips between the two.
        let mut changes = inner.changes.subscribe();

        Ok(Subscription::spawn(move |sender| async move {
            let initial = inner.run_query(&query).await;
            if sender.send(Ok(Snapshot::new(initial))).await.is_err() {
                return;
            }

            loop {
                match changes.recv().await {
                    Ok(event) if event.collection != query.collection => continue,
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Subscription lagged by {} changes, resyncing", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }

                let docs = inner.run_query(&query).await;
                if sender.send(Ok(Snapshot::new(docs))).await.is_err() {
                    break;
                }
            }
        }))
    }
}
