use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::info;

use crate::AppState;
use crate::backend::StorageAccount;
use crate::error::GatewayError;
use crate::request::{
    DATA_PROPERTY, ObjectUpload, QueueMessage, TableEntity, WriteRequest, WriteResult,
};

/// Greeting returned by the root endpoint.
pub const WELCOME_MESSAGE: &str = "Welcome to Azure Functions!";

// Absent and empty parameters are treated the same way, so every field is
// optional here and validation happens in the endpoint.

/// Query parameters for enqueue-message
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueMessageQuery {
    pub queue_name: Option<String>,
    pub message: Option<String>,
}

impl From<EnqueueMessageQuery> for WriteRequest<QueueMessage> {
    fn from(query: EnqueueMessageQuery) -> Self {
        WriteRequest::new(
            query.queue_name.unwrap_or_default(),
            QueueMessage::new(query.message.unwrap_or_default()),
        )
    }
}

/// Query parameters for store-entity
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreEntityQuery {
    pub table_name: Option<String>,
    pub partition_key: Option<String>,
    pub row_key: Option<String>,
    pub data: Option<String>,
}

impl From<StoreEntityQuery> for WriteRequest<TableEntity> {
    fn from(query: StoreEntityQuery) -> Self {
        let entity = TableEntity::new(
            query.partition_key.unwrap_or_default(),
            query.row_key.unwrap_or_default(),
        )
        .with_field(DATA_PROPERTY, query.data.unwrap_or_default());
        WriteRequest::new(query.table_name.unwrap_or_default(), entity)
    }
}

/// Query parameters for upload-blob
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadBlobQuery {
    pub container_name: Option<String>,
    pub blob_name: Option<String>,
}

/// Query parameters for upload-file
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileQuery {
    pub share_name: Option<String>,
    pub file_name: Option<String>,
}

fn object_upload(name: Option<String>, headers: &HeaderMap, body: Bytes) -> ObjectUpload {
    let upload = ObjectUpload::new(name.unwrap_or_default(), body);
    match headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    {
        Some(content_type) => upload.with_content_type(content_type),
        None => upload,
    }
}

impl IntoResponse for WriteResult {
    fn into_response(self) -> Response {
        (StatusCode::OK, self.message).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET|POST / - Static greeting
pub async fn root() -> &'static str {
    info!("HTTP trigger processed a request");
    WELCOME_MESSAGE
}

/// POST /enqueue-message - Add a message to a storage queue
pub async fn enqueue_message<A: StorageAccount>(
    State(state): State<AppState<A>>,
    Query(query): Query<EnqueueMessageQuery>,
) -> Result<WriteResult, GatewayError> {
    state.endpoint.enqueue_message(query.into()).await
}

/// POST /store-entity - Insert an entity with a `Data` property into a table
pub async fn store_entity<A: StorageAccount>(
    State(state): State<AppState<A>>,
    Query(query): Query<StoreEntityQuery>,
) -> Result<WriteResult, GatewayError> {
    state.endpoint.store_entity(query.into()).await
}

/// POST /upload-blob - Upload the request body as a block blob
pub async fn upload_blob<A: StorageAccount>(
    State(state): State<AppState<A>>,
    Query(query): Query<UploadBlobQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<WriteResult, GatewayError> {
    let upload = object_upload(query.blob_name, &headers, body);
    let request = WriteRequest::new(query.container_name.unwrap_or_default(), upload);
    state.endpoint.upload_blob(request).await
}

/// POST /upload-file - Upload the request body to a file share's root directory
pub async fn upload_file<A: StorageAccount>(
    State(state): State<AppState<A>>,
    Query(query): Query<UploadFileQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<WriteResult, GatewayError> {
    let upload = object_upload(query.file_name, &headers, body);
    let request = WriteRequest::new(query.share_name.unwrap_or_default(), upload);
    state.endpoint.upload_file(request).await
}
