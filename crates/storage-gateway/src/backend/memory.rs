//! In-process storage implementation.
//!
//! Mirrors the observable behavior of the four Azure Storage services closely
//! enough for tests and local development: resources are created on demand,
//! queue messages accumulate, entity inserts reject duplicate keys, and blob
//! and file writes overwrite.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::{ResourceBackend, StorageAccount, StorageError, StorageResult, check_object_name};
use crate::request::{BackendKind, ObjectUpload, QueueMessage, TableEntity};

/// A backend interaction, recorded in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// A fresh backend client was constructed.
    Connect(BackendKind),
    /// Create-if-absent on a named resource.
    Resolve { kind: BackendKind, name: String },
    /// A write against a named resource.
    Write { kind: BackendKind, name: String },
}

/// Blob or file contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: Option<String>,
}

type Entities = HashMap<(String, String), BTreeMap<String, String>>;
type Objects = HashMap<String, StoredObject>;

#[derive(Debug, Default)]
struct MemoryState {
    queues: HashMap<String, Vec<String>>,
    tables: HashMap<String, Entities>,
    containers: HashMap<String, Objects>,
    shares: HashMap<String, Objects>,
    journal: Vec<Operation>,
}

impl MemoryState {
    fn record(&mut self, operation: Operation) {
        self.journal.push(operation);
    }

    fn objects(&mut self, kind: BackendKind) -> &mut HashMap<String, Objects> {
        match kind {
            BackendKind::File => &mut self.shares,
            _ => &mut self.containers,
        }
    }
}

type SharedState = Arc<Mutex<MemoryState>>;

// Critical sections never await, so a poisoned lock still holds consistent data.
fn lock(state: &SharedState) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Storage account kept entirely in memory.
///
/// Clones share the same underlying state.
#[derive(Debug, Clone, Default)]
pub struct MemoryAccount {
    state: SharedState,
}

impl MemoryAccount {
    /// Create an empty account.
    pub fn new() -> Self {
        Self::default()
    }

    fn connect(&self, kind: BackendKind) -> SharedState {
        lock(&self.state).record(Operation::Connect(kind));
        self.state.clone()
    }

    /// Every backend interaction so far, oldest first.
    pub fn journal(&self) -> Vec<Operation> {
        lock(&self.state).journal.clone()
    }

    /// Whether the named queue, table, container or share exists.
    pub fn has_resource(&self, kind: BackendKind, name: &str) -> bool {
        let state = lock(&self.state);
        match kind {
            BackendKind::Queue => state.queues.contains_key(name),
            BackendKind::Table => state.tables.contains_key(name),
            BackendKind::Blob => state.containers.contains_key(name),
            BackendKind::File => state.shares.contains_key(name),
        }
    }

    /// Number of resources of the given kind.
    pub fn resource_count(&self, kind: BackendKind) -> usize {
        let state = lock(&self.state);
        match kind {
            BackendKind::Queue => state.queues.len(),
            BackendKind::Table => state.tables.len(),
            BackendKind::Blob => state.containers.len(),
            BackendKind::File => state.shares.len(),
        }
    }

    /// Messages in a queue, in enqueue order.
    pub fn queue_messages(&self, queue: &str) -> Option<Vec<String>> {
        lock(&self.state).queues.get(queue).cloned()
    }

    /// Properties of a stored entity.
    pub fn entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Option<BTreeMap<String, String>> {
        lock(&self.state)
            .tables
            .get(table)?
            .get(&(partition_key.to_string(), row_key.to_string()))
            .cloned()
    }

    /// Contents of a blob.
    pub fn blob(&self, container: &str, name: &str) -> Option<StoredObject> {
        lock(&self.state).containers.get(container)?.get(name).cloned()
    }

    /// Contents of a file in a share.
    pub fn file(&self, share: &str, name: &str) -> Option<StoredObject> {
        lock(&self.state).shares.get(share)?.get(name).cloned()
    }
}

impl StorageAccount for MemoryAccount {
    type Queues = MemoryQueues;
    type Tables = MemoryTables;
    type Containers = MemoryContainers;
    type Shares = MemoryShares;

    fn queues(&self) -> StorageResult<MemoryQueues> {
        Ok(MemoryQueues {
            state: self.connect(BackendKind::Queue),
        })
    }

    fn tables(&self) -> StorageResult<MemoryTables> {
        Ok(MemoryTables {
            state: self.connect(BackendKind::Table),
        })
    }

    fn containers(&self) -> StorageResult<MemoryContainers> {
        Ok(MemoryContainers {
            state: self.connect(BackendKind::Blob),
        })
    }

    fn shares(&self) -> StorageResult<MemoryShares> {
        Ok(MemoryShares {
            state: self.connect(BackendKind::File),
        })
    }
}

/// Queue service view of a [`MemoryAccount`].
#[derive(Debug, Clone)]
pub struct MemoryQueues {
    state: SharedState,
}

#[async_trait]
impl ResourceBackend for MemoryQueues {
    const KIND: BackendKind = BackendKind::Queue;
    type Handle = String;
    type Payload = QueueMessage;

    async fn resolve(&self, name: &str) -> StorageResult<String> {
        let mut state = lock(&self.state);
        state.record(Operation::Resolve {
            kind: Self::KIND,
            name: name.to_string(),
        });
        state.queues.entry(name.to_string()).or_default();
        Ok(name.to_string())
    }

    async fn write(&self, queue: &String, message: QueueMessage) -> StorageResult<()> {
        let mut state = lock(&self.state);
        state.record(Operation::Write {
            kind: Self::KIND,
            name: queue.clone(),
        });
        let messages = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| StorageError::NotFound(queue.clone()))?;
        messages.push(message.text);
        debug!("Enqueued message #{} on {}", messages.len(), queue);
        Ok(())
    }
}

/// Table service view of a [`MemoryAccount`].
#[derive(Debug, Clone)]
pub struct MemoryTables {
    state: SharedState,
}

#[async_trait]
impl ResourceBackend for MemoryTables {
    const KIND: BackendKind = BackendKind::Table;
    type Handle = String;
    type Payload = TableEntity;

    async fn resolve(&self, name: &str) -> StorageResult<String> {
        let mut state = lock(&self.state);
        state.record(Operation::Resolve {
            kind: Self::KIND,
            name: name.to_string(),
        });
        state.tables.entry(name.to_string()).or_default();
        Ok(name.to_string())
    }

    async fn write(&self, table: &String, entity: TableEntity) -> StorageResult<()> {
        let mut state = lock(&self.state);
        state.record(Operation::Write {
            kind: Self::KIND,
            name: table.clone(),
        });
        let entities = state
            .tables
            .get_mut(table)
            .ok_or_else(|| StorageError::NotFound(table.clone()))?;

        // Insert, not upsert: an existing key is a conflict.
        let key = (entity.partition_key, entity.row_key);
        if entities.contains_key(&key) {
            return Err(StorageError::Conflict(format!(
                "entity ({}, {}) already exists in {}",
                key.0, key.1, table
            )));
        }
        entities.insert(key, entity.fields);
        Ok(())
    }
}

fn resolve_objects(state: &SharedState, kind: BackendKind, name: &str) -> String {
    let mut state = lock(state);
    state.record(Operation::Resolve {
        kind,
        name: name.to_string(),
    });
    state.objects(kind).entry(name.to_string()).or_default();
    name.to_string()
}

fn put_object(
    state: &SharedState,
    kind: BackendKind,
    parent: &str,
    upload: ObjectUpload,
) -> StorageResult<()> {
    check_object_name(&upload.name)?;
    let mut state = lock(state);
    state.record(Operation::Write {
        kind,
        name: parent.to_string(),
    });
    let objects = state
        .objects(kind)
        .get_mut(parent)
        .ok_or_else(|| StorageError::NotFound(parent.to_string()))?;
    debug!(
        "Stored {} bytes at {}/{}",
        upload.body.len(),
        parent,
        upload.name
    );
    objects.insert(
        upload.name,
        StoredObject {
            body: upload.body,
            content_type: upload.content_type,
        },
    );
    Ok(())
}

/// Blob service view of a [`MemoryAccount`].
#[derive(Debug, Clone)]
pub struct MemoryContainers {
    state: SharedState,
}

#[async_trait]
impl ResourceBackend for MemoryContainers {
    const KIND: BackendKind = BackendKind::Blob;
    type Handle = String;
    type Payload = ObjectUpload;

    async fn resolve(&self, name: &str) -> StorageResult<String> {
        Ok(resolve_objects(&self.state, Self::KIND, name))
    }

    async fn write(&self, container: &String, upload: ObjectUpload) -> StorageResult<()> {
        put_object(&self.state, Self::KIND, container, upload)
    }
}

/// File share view of a [`MemoryAccount`].
#[derive(Debug, Clone)]
pub struct MemoryShares {
    state: SharedState,
}

#[async_trait]
impl ResourceBackend for MemoryShares {
    const KIND: BackendKind = BackendKind::File;
    type Handle = String;
    type Payload = ObjectUpload;

    async fn resolve(&self, name: &str) -> StorageResult<String> {
        Ok(resolve_objects(&self.state, Self::KIND, name))
    }

    async fn write(&self, share: &String, upload: ObjectUpload) -> StorageResult<()> {
        put_object(&self.state, Self::KIND, share, upload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::DATA_PROPERTY;

    #[tokio::test]
    async fn test_resolve_creates_queue_once() {
        let account = MemoryAccount::new();
        let queues = account.queues().unwrap();

        queues.resolve("jobs").await.unwrap();
        queues.resolve("jobs").await.unwrap();

        assert!(account.has_resource(BackendKind::Queue, "jobs"));
        assert_eq!(account.resource_count(BackendKind::Queue), 1);
        assert_eq!(account.queue_messages("jobs"), Some(vec![]));
    }

    #[tokio::test]
    async fn test_resolve_keeps_existing_messages() {
        let account = MemoryAccount::new();
        let queues = account.queues().unwrap();

        let handle = queues.resolve("jobs").await.unwrap();
        queues
            .write(&handle, QueueMessage::new("first"))
            .await
            .unwrap();
        queues.resolve("jobs").await.unwrap();

        assert_eq!(account.queue_messages("jobs"), Some(vec!["first".to_string()]));
    }

    #[tokio::test]
    async fn test_duplicate_messages_are_kept() {
        let account = MemoryAccount::new();
        let queues = account.queues().unwrap();

        let handle = queues.resolve("jobs").await.unwrap();
        queues.write(&handle, QueueMessage::new("hello")).await.unwrap();
        queues.write(&handle, QueueMessage::new("hello")).await.unwrap();

        assert_eq!(
            account.queue_messages("jobs"),
            Some(vec!["hello".to_string(), "hello".to_string()])
        );
    }

    #[tokio::test]
    async fn test_write_to_unresolved_queue_fails() {
        let account = MemoryAccount::new();
        let queues = account.queues().unwrap();

        let err = queues
            .write(&"missing".to_string(), QueueMessage::new("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_entity_insert_rejects_duplicate_key() {
        let account = MemoryAccount::new();
        let tables = account.tables().unwrap();
        let handle = tables.resolve("t").await.unwrap();

        let entity = TableEntity::new("p", "r").with_field(DATA_PROPERTY, "x");
        tables.write(&handle, entity.clone()).await.unwrap();
        let err = tables.write(&handle, entity).await.unwrap_err();

        assert!(matches!(err, StorageError::Conflict(_)));
        let stored = account.entity("t", "p", "r").unwrap();
        assert_eq!(stored.get(DATA_PROPERTY).map(String::as_str), Some("x"));
    }

    #[tokio::test]
    async fn test_blob_write_overwrites() {
        let account = MemoryAccount::new();
        let containers = account.containers().unwrap();
        let handle = containers.resolve("c").await.unwrap();

        containers
            .write(&handle, ObjectUpload::new("f.txt", "one"))
            .await
            .unwrap();
        containers
            .write(&handle, ObjectUpload::new("f.txt", "two"))
            .await
            .unwrap();

        assert_eq!(account.blob("c", "f.txt").unwrap().body, Bytes::from("two"));
        assert!(account.file("c", "f.txt").is_none());
    }

    #[tokio::test]
    async fn test_object_names_keep_empty_segments_but_not_dot_segments() {
        let account = MemoryAccount::new();
        let containers = account.containers().unwrap();
        let handle = containers.resolve("c").await.unwrap();

        containers
            .write(&handle, ObjectUpload::new("a//b.txt", "x"))
            .await
            .unwrap();
        assert!(account.blob("c", "a//b.txt").is_some());

        let err = containers
            .write(&handle, ObjectUpload::new("dir/../secret.txt", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidName(_)));
        assert!(account.blob("c", "dir/../secret.txt").is_none());
    }

    #[tokio::test]
    async fn test_shares_are_separate_from_containers() {
        let account = MemoryAccount::new();
        let shares = account.shares().unwrap();
        let handle = shares.resolve("docs").await.unwrap();

        shares
            .write(&handle, ObjectUpload::new("a.txt", "hello"))
            .await
            .unwrap();

        assert!(account.has_resource(BackendKind::File, "docs"));
        assert!(!account.has_resource(BackendKind::Blob, "docs"));
        assert_eq!(account.file("docs", "a.txt").unwrap().body, Bytes::from("hello"));
    }

    #[tokio::test]
    async fn test_journal_records_call_order() {
        let account = MemoryAccount::new();
        let queues = account.queues().unwrap();
        let handle = queues.resolve("jobs").await.unwrap();
        queues.write(&handle, QueueMessage::new("hi")).await.unwrap();

        assert_eq!(
            account.journal(),
            vec![
                Operation::Connect(BackendKind::Queue),
                Operation::Resolve {
                    kind: BackendKind::Queue,
                    name: "jobs".to_string()
                },
                Operation::Write {
                    kind: BackendKind::Queue,
                    name: "jobs".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_clones_share_state() {
        let account = MemoryAccount::new();
        let clone = account.clone();
        let _ = clone.queues().unwrap();
        assert_eq!(account.journal().len(), 1);
    }
}
