//! Azure Storage backends.
//!
//! Talks to the Queue, Table, Blob and File services over their REST APIs
//! using `reqwest`. Every `StorageAccount` call builds a fresh client, so no
//! connection state outlives the request that created it.

mod auth;
mod blob;
mod connection;
mod file;
mod queue;
mod table;

use std::sync::Arc;

use chrono::Utc;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{StorageAccount, StorageError, StorageResult, is_relative_segment};
use crate::request::BackendKind;

pub use blob::{AzureContainers, ContainerHandle};
pub use connection::{ConnectionSettings, Credential, DEVELOPMENT_ACCOUNT};
pub use file::{AzureShares, ShareHandle};
pub use queue::{AzureQueues, QueueHandle};
pub use table::{AzureTables, TableHandle};

/// REST API version for the Blob, Queue and File services.
pub const API_VERSION: &str = "2023-11-03";

/// REST API version for the Table service.
pub const TABLE_API_VERSION: &str = "2019-02-02";

/// How queue message text is put on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueMessageEncoding {
    /// Message text is sent as-is.
    #[default]
    None,
    /// Message text is base64-encoded, as queue-triggered Functions expect.
    Base64,
}

/// Azure Storage account reached through a connection string.
#[derive(Debug, Clone)]
pub struct AzureAccount {
    settings: Arc<ConnectionSettings>,
    queue_encoding: QueueMessageEncoding,
}

impl AzureAccount {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings: Arc::new(settings),
            queue_encoding: QueueMessageEncoding::default(),
        }
    }

    /// Parse the connection string and build an account from it.
    pub fn from_connection_string(connection_string: &str) -> StorageResult<Self> {
        ConnectionSettings::parse(connection_string).map(Self::new)
    }

    pub fn with_queue_encoding(mut self, encoding: QueueMessageEncoding) -> Self {
        self.queue_encoding = encoding;
        self
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    fn service(&self, kind: BackendKind) -> StorageResult<ServiceClient> {
        ServiceClient::connect(&self.settings, kind)
    }
}

impl StorageAccount for AzureAccount {
    type Queues = AzureQueues;
    type Tables = AzureTables;
    type Containers = AzureContainers;
    type Shares = AzureShares;

    fn queues(&self) -> StorageResult<AzureQueues> {
        Ok(AzureQueues::new(
            self.service(BackendKind::Queue)?,
            self.queue_encoding,
        ))
    }

    fn tables(&self) -> StorageResult<AzureTables> {
        Ok(AzureTables::new(self.service(BackendKind::Table)?))
    }

    fn containers(&self) -> StorageResult<AzureContainers> {
        Ok(AzureContainers::new(self.service(BackendKind::Blob)?))
    }

    fn shares(&self) -> StorageResult<AzureShares> {
        Ok(AzureShares::new(self.service(BackendKind::File)?))
    }
}

/// HTTP plumbing shared by the four service clients.
#[derive(Debug, Clone)]
pub(crate) struct ServiceClient {
    http: reqwest::Client,
    endpoint: Url,
    credential: Credential,
    kind: BackendKind,
}

impl ServiceClient {
    fn connect(settings: &ConnectionSettings, kind: BackendKind) -> StorageResult<Self> {
        let endpoint = settings.endpoint(kind)?;
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            endpoint,
            credential: settings.credential().clone(),
            kind,
        })
    }

    /// Endpoint URL extended by the given segments, each percent-encoded.
    pub(crate) fn url(&self, segments: &[&str]) -> StorageResult<Url> {
        let mut url = self.endpoint.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                StorageError::Configuration(format!("{} endpoint is not a base URL", self.kind))
            })?;
            path.pop_if_empty();
            for segment in segments {
                // `.` and `..` would be dropped by the URL and retarget the request.
                if is_relative_segment(segment) {
                    return Err(StorageError::InvalidName((*segment).to_string()));
                }
                path.push(segment);
            }
        }
        Ok(url)
    }

    /// URL of a blob or file; `/` in `name` separates virtual directories.
    pub(crate) fn object_url(&self, parent: &str, name: &str) -> StorageResult<Url> {
        let segments: Vec<&str> = std::iter::once(parent).chain(name.split('/')).collect();
        self.url(&segments)
    }

    /// Start a request carrying the date and version headers.
    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let version = match self.kind {
            BackendKind::Table => TABLE_API_VERSION,
            _ => API_VERSION,
        };
        self.http
            .request(method, url)
            .header("x-ms-date", http_date())
            .header("x-ms-version", version)
    }

    /// Sign and send a request, turning error statuses into `StorageError`.
    pub(crate) async fn send(&self, builder: RequestBuilder) -> StorageResult<Response> {
        let mut request = builder.build()?;
        self.credential.authorize(&mut request, self.kind)?;
        debug!(
            "{} {} {}",
            self.kind,
            request.method(),
            request.url().path()
        );

        let response = self.http.execute(request).await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(service_error(response).await)
        }
    }

    /// Send a create request, treating `exists_code` as success.
    ///
    /// Returns whether the resource was newly created.
    pub(crate) async fn create_if_absent(
        &self,
        builder: RequestBuilder,
        exists_code: &str,
    ) -> StorageResult<bool> {
        match self.send(builder).await {
            // The Queue service answers 204 for an existing queue with identical metadata.
            Ok(response) => Ok(response.status() != reqwest::StatusCode::NO_CONTENT),
            Err(e) if e.service_code() == Some(exists_code) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Bodiless PUT/POST still need an explicit zero length.
pub(crate) fn empty_body(builder: RequestBuilder) -> RequestBuilder {
    builder.header(CONTENT_LENGTH, 0)
}

/// RFC 1123 timestamp for `x-ms-date`.
fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[derive(Deserialize)]
struct ODataErrorBody {
    #[serde(rename = "odata.error")]
    error: ODataError,
}

#[derive(Deserialize)]
struct ODataError {
    code: Option<String>,
    message: Option<ODataMessage>,
}

#[derive(Deserialize)]
struct ODataMessage {
    value: Option<String>,
}

async fn service_error(response: Response) -> StorageError {
    let status = response.status();
    let header_code = response
        .headers()
        .get("x-ms-error-code")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.unwrap_or_default();
    parse_service_error(status.as_u16(), header_code, &body)
}

#[derive(Deserialize)]
#[serde(rename = "Error")]
struct XmlError {
    #[serde(rename = "Code")]
    code: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
}

fn parse_service_error(status: u16, header_code: Option<String>, body: &str) -> StorageError {
    let odata = serde_json::from_str::<ODataErrorBody>(body).ok();
    let (body_code, body_message) = match odata {
        Some(ODataErrorBody { error }) => (error.code, error.message.and_then(|m| m.value)),
        // Blob, Queue and File answer with an `<Error>` document instead.
        None => match quick_xml::de::from_str::<XmlError>(body) {
            Ok(xml) => (xml.code, xml.message),
            Err(_) => (None, None),
        },
    };

    StorageError::Service {
        status,
        code: header_code.or(body_code),
        message: body_message
            .map(|message| message.trim().to_string())
            .unwrap_or_else(|| body.trim().to_string()),
    }
}
