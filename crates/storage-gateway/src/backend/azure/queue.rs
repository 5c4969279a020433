//! Queue service client.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Url};
use serde::Serialize;
use tracing::{debug, info};

use super::{QueueMessageEncoding, ServiceClient, empty_body};
use crate::backend::{ResourceBackend, StorageError, StorageResult};
use crate::request::{BackendKind, QueueMessage};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

#[derive(Serialize)]
#[serde(rename = "QueueMessage")]
struct PutMessageBody<'a> {
    #[serde(rename = "MessageText")]
    message_text: &'a str,
}

/// A queue that is known to exist.
#[derive(Debug, Clone)]
pub struct QueueHandle {
    name: String,
    messages_url: Url,
}

/// Azure Queue service client.
#[derive(Debug, Clone)]
pub struct AzureQueues {
    service: ServiceClient,
    encoding: QueueMessageEncoding,
}

impl AzureQueues {
    pub(crate) fn new(service: ServiceClient, encoding: QueueMessageEncoding) -> Self {
        Self { service, encoding }
    }
}

pub(crate) fn message_body(text: &str, encoding: QueueMessageEncoding) -> StorageResult<String> {
    let encoded;
    let message_text = match encoding {
        QueueMessageEncoding::None => text,
        QueueMessageEncoding::Base64 => {
            encoded = BASE64_STANDARD.encode(text);
            encoded.as_str()
        }
    };
    let xml = quick_xml::se::to_string(&PutMessageBody { message_text })
        .map_err(|e| StorageError::Backend(format!("failed to encode queue message: {e}")))?;
    Ok(format!("{XML_DECLARATION}{xml}"))
}

#[async_trait]
impl ResourceBackend for AzureQueues {
    const KIND: BackendKind = BackendKind::Queue;
    type Handle = QueueHandle;
    type Payload = QueueMessage;

    async fn resolve(&self, name: &str) -> StorageResult<QueueHandle> {
        let url = self.service.url(&[name])?;
        let request = empty_body(self.service.request(Method::PUT, url));
        if self
            .service
            .create_if_absent(request, "QueueAlreadyExists")
            .await?
        {
            info!("Created queue {}", name);
        }

        Ok(QueueHandle {
            name: name.to_string(),
            messages_url: self.service.url(&[name, "messages"])?,
        })
    }

    async fn write(&self, queue: &QueueHandle, message: QueueMessage) -> StorageResult<()> {
        let body = message_body(&message.text, self.encoding)?;
        let request = self
            .service
            .request(Method::POST, queue.messages_url.clone())
            .header(CONTENT_TYPE, "application/xml")
            .body(body);
        self.service.send(request).await?;
        debug!("Sent message to queue {}", queue.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_body_plain() {
        let body = message_body("hello", QueueMessageEncoding::None).unwrap();
        assert_eq!(
            body,
            r#"<?xml version="1.0" encoding="utf-8"?><QueueMessage><MessageText>hello</MessageText></QueueMessage>"#
        );
    }

    #[test]
    fn test_message_body_escapes_markup() {
        let body = message_body("a < b & c", QueueMessageEncoding::None).unwrap();
        assert!(body.contains("<MessageText>a &lt; b &amp; c</MessageText>"));
    }

    #[test]
    fn test_message_body_base64() {
        let body = message_body("hello", QueueMessageEncoding::Base64).unwrap();
        assert!(body.contains("<MessageText>aGVsbG8=</MessageText>"));
    }
}
