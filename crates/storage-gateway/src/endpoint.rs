//! The validate, connect, resolve, write pipeline shared by every backend kind.

use tracing::{debug, info};

use crate::backend::{ResourceBackend, StorageAccount, StorageResult};
use crate::error::GatewayError;
use crate::request::{ObjectUpload, QueueMessage, TableEntity, WriteRequest, WriteResult};

/// Accepts write requests and forwards each one to a storage account.
///
/// Holds no per-request state: every call validates, builds a fresh backend
/// client, resolves the named resource and performs exactly one write.
#[derive(Debug, Clone)]
pub struct StorageGatewayEndpoint<A> {
    account: A,
}

impl<A: StorageAccount> StorageGatewayEndpoint<A> {
    pub fn new(account: A) -> Self {
        Self { account }
    }

    pub fn account(&self) -> &A {
        &self.account
    }

    /// Add a message to a queue.
    pub async fn enqueue_message(
        &self,
        request: WriteRequest<QueueMessage>,
    ) -> Result<WriteResult, GatewayError> {
        self.handle(A::queues, request).await
    }

    /// Insert an entity into a table.
    pub async fn store_entity(
        &self,
        request: WriteRequest<TableEntity>,
    ) -> Result<WriteResult, GatewayError> {
        self.handle(A::tables, request).await
    }

    /// Write a blob into a container, replacing any existing one.
    pub async fn upload_blob(
        &self,
        request: WriteRequest<ObjectUpload>,
    ) -> Result<WriteResult, GatewayError> {
        self.handle(A::containers, request).await
    }

    /// Create a file in a share's root directory and upload its contents.
    pub async fn upload_file(
        &self,
        request: WriteRequest<ObjectUpload>,
    ) -> Result<WriteResult, GatewayError> {
        self.handle(A::shares, request).await
    }

    async fn handle<B, C>(
        &self,
        connect: C,
        request: WriteRequest<B::Payload>,
    ) -> Result<WriteResult, GatewayError>
    where
        B: ResourceBackend,
        C: FnOnce(&A) -> StorageResult<B>,
    {
        let kind = B::KIND;
        if !request.is_valid() {
            return Err(GatewayError::validation(kind));
        }

        let upstream = |source| GatewayError::upstream(kind, source);
        let backend = connect(&self.account).map_err(upstream)?;

        debug!("Resolving {} {}", kind.resource_label(), request.resource);
        let handle = backend.resolve(&request.resource).await.map_err(upstream)?;

        debug!("Writing to {} {}", kind.resource_label(), request.resource);
        backend
            .write(&handle, request.payload)
            .await
            .map_err(upstream)?;

        info!(
            "{} write to {} {} completed",
            kind,
            kind.resource_label(),
            request.resource
        );
        Ok(WriteResult::completed(kind))
    }
}
