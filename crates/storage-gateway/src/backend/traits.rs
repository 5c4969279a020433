//! Backend capability traits.

use async_trait::async_trait;

use super::StorageResult;
use crate::request::{BackendKind, ObjectUpload, Payload, QueueMessage, TableEntity};

/// One storage service reached through "resolve, then write".
///
/// `resolve` creates the named resource when it does not exist yet and must
/// be safe to repeat. `write` performs exactly one logical write against the
/// resolved resource.
#[async_trait]
pub trait ResourceBackend: Send + Sync {
    /// Which service this backend writes to.
    const KIND: BackendKind;

    /// Reference to a resolved queue, table, container or share.
    type Handle: Send + Sync;

    /// What a single write carries.
    type Payload: Payload + Send + 'static;

    /// Get the named resource, creating it if absent.
    async fn resolve(&self, name: &str) -> StorageResult<Self::Handle>;

    /// Write the payload to a resolved resource.
    async fn write(&self, handle: &Self::Handle, payload: Self::Payload) -> StorageResult<()>;
}

/// A storage account that hands out one fresh backend per request.
pub trait StorageAccount: Clone + Send + Sync + 'static {
    type Queues: ResourceBackend<Payload = QueueMessage>;
    type Tables: ResourceBackend<Payload = TableEntity>;
    type Containers: ResourceBackend<Payload = ObjectUpload>;
    type Shares: ResourceBackend<Payload = ObjectUpload>;

    /// Queue service client.
    fn queues(&self) -> StorageResult<Self::Queues>;

    /// Table service client.
    fn tables(&self) -> StorageResult<Self::Tables>;

    /// Blob service client.
    fn containers(&self) -> StorageResult<Self::Containers>;

    /// File share service client.
    fn shares(&self) -> StorageResult<Self::Shares>;
}
