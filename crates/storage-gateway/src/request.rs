//! Write requests accepted by the gateway and the result returned for them.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;

/// Entity property that carries the `data` query parameter.
pub const DATA_PROPERTY: &str = "Data";

/// The four storage services the gateway can write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Queue,
    Table,
    Blob,
    File,
}

impl BackendKind {
    /// Message returned with a 400 when a required parameter is missing.
    pub fn validation_message(self) -> &'static str {
        match self {
            Self::Queue => "Queue name and message must be provided.",
            Self::Table => "Table name, partition key, row key, and data must be provided.",
            Self::Blob => "Container name and blob name must be provided.",
            Self::File => "Share name and file name must be provided.",
        }
    }

    /// Acknowledgement returned with a 200 once the write went through.
    pub fn success_message(self) -> &'static str {
        match self {
            Self::Queue => "Message added to queue",
            Self::Table => "Data added to table",
            Self::Blob => "Blob uploaded",
            Self::File => "File uploaded to Azure Files",
        }
    }

    /// What the named resource is called for this kind of service.
    pub fn resource_label(self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::Table => "table",
            Self::Blob => "container",
            Self::File => "share",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Queue => "queue",
            Self::Table => "table",
            Self::Blob => "blob",
            Self::File => "file",
        };
        f.write_str(name)
    }
}

/// A payload knows whether its identifying fields are present.
pub trait Payload {
    /// True when every field the backend needs is non-empty.
    fn is_complete(&self) -> bool;
}

/// A single write against a named resource.
#[derive(Debug, Clone)]
pub struct WriteRequest<P> {
    /// Queue, table, container or share name.
    pub resource: String,
    pub payload: P,
}

impl<P: Payload> WriteRequest<P> {
    pub fn new(resource: impl Into<String>, payload: P) -> Self {
        Self {
            resource: resource.into(),
            payload,
        }
    }

    /// Resource name and payload are both present.
    pub fn is_valid(&self) -> bool {
        !self.resource.is_empty() && self.payload.is_complete()
    }
}

/// Text message for a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub text: String,
}

impl QueueMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Payload for QueueMessage {
    fn is_complete(&self) -> bool {
        !self.text.is_empty()
    }
}

/// Table entity addressed by partition and row key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntity {
    pub partition_key: String,
    pub row_key: String,
    pub fields: BTreeMap<String, String>,
}

impl TableEntity {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Add a string property.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

impl Payload for TableEntity {
    fn is_complete(&self) -> bool {
        !self.partition_key.is_empty()
            && !self.row_key.is_empty()
            && !self.fields.is_empty()
            && self.fields.values().all(|value| !value.is_empty())
    }
}

/// Raw bytes destined for a blob or a file.
#[derive(Debug, Clone)]
pub struct ObjectUpload {
    /// Blob or file name inside the container/share.
    pub name: String,
    pub body: Bytes,
    /// Content type supplied by the caller, if any.
    pub content_type: Option<String>,
}

impl ObjectUpload {
    pub fn new(name: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Caller-supplied content type, else a guess from the name.
    pub fn resolved_content_type(&self) -> String {
        match &self.content_type {
            Some(content_type) if !content_type.is_empty() => content_type.clone(),
            _ => mime_guess::from_path(&self.name)
                .first_or_octet_stream()
                .to_string(),
        }
    }
}

// An empty body is a valid zero-length object; only the name is required.
impl Payload for ObjectUpload {
    fn is_complete(&self) -> bool {
        !self.name.is_empty()
    }
}

/// Outcome of a single gateway request.
///
/// Failures travel as `GatewayError`, so a returned result is always a success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResult {
    pub success: bool,
    pub message: String,
}

impl WriteResult {
    pub fn completed(kind: BackendKind) -> Self {
        Self {
            success: true,
            message: kind.success_message().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_message_requires_text() {
        assert!(QueueMessage::new("hello").is_complete());
        assert!(!QueueMessage::new("").is_complete());
    }

    #[test]
    fn test_table_entity_requires_keys_and_data() {
        let entity = TableEntity::new("p", "r").with_field(DATA_PROPERTY, "x");
        assert!(entity.is_complete());

        assert!(!TableEntity::new("", "r").with_field(DATA_PROPERTY, "x").is_complete());
        assert!(!TableEntity::new("p", "").with_field(DATA_PROPERTY, "x").is_complete());
        assert!(!TableEntity::new("p", "r").is_complete());
        assert!(!TableEntity::new("p", "r").with_field(DATA_PROPERTY, "").is_complete());
    }

    #[test]
    fn test_object_upload_allows_empty_body() {
        assert!(ObjectUpload::new("f.txt", Bytes::new()).is_complete());
        assert!(!ObjectUpload::new("", Bytes::from_static(b"data")).is_complete());
    }

    #[test]
    fn test_write_request_requires_resource() {
        assert!(WriteRequest::new("jobs", QueueMessage::new("hi")).is_valid());
        assert!(!WriteRequest::new("", QueueMessage::new("hi")).is_valid());
        assert!(!WriteRequest::new("jobs", QueueMessage::new("")).is_valid());
    }

    #[test]
    fn test_resolved_content_type() {
        let upload = ObjectUpload::new("report.json", Bytes::new());
        assert_eq!(upload.resolved_content_type(), "application/json");

        let upload = ObjectUpload::new("blob", Bytes::new());
        assert_eq!(upload.resolved_content_type(), "application/octet-stream");

        let upload = ObjectUpload::new("f.txt", Bytes::new()).with_content_type("image/png");
        assert_eq!(upload.resolved_content_type(), "image/png");
    }

    #[test]
    fn test_kind_messages() {
        assert_eq!(
            WriteResult::completed(BackendKind::File).message,
            "File uploaded to Azure Files"
        );
        assert_eq!(
            BackendKind::Queue.validation_message(),
            "Queue name and message must be provided."
        );
        assert_eq!(BackendKind::Blob.to_string(), "blob");
    }
}
