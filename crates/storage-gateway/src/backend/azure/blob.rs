//! Blob service client.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Url};
use tracing::{debug, info};

use super::{ServiceClient, empty_body};
use crate::backend::{ResourceBackend, StorageResult};
use crate::request::{BackendKind, ObjectUpload};

/// A container that is known to exist.
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    name: String,
}

/// Azure Blob service client.
#[derive(Debug, Clone)]
pub struct AzureContainers {
    service: ServiceClient,
}

impl AzureContainers {
    pub(crate) fn new(service: ServiceClient) -> Self {
        Self { service }
    }

    fn container_url(&self, name: &str) -> StorageResult<Url> {
        let mut url = self.service.url(&[name])?;
        url.query_pairs_mut().append_pair("restype", "container");
        Ok(url)
    }
}

#[async_trait]
impl ResourceBackend for AzureContainers {
    const KIND: BackendKind = BackendKind::Blob;
    type Handle = ContainerHandle;
    type Payload = ObjectUpload;

    async fn resolve(&self, name: &str) -> StorageResult<ContainerHandle> {
        let request = empty_body(self.service.request(Method::PUT, self.container_url(name)?));
        if self
            .service
            .create_if_absent(request, "ContainerAlreadyExists")
            .await?
        {
            info!("Created container {}", name);
        }

        Ok(ContainerHandle {
            name: name.to_string(),
        })
    }

    // Put Blob replaces any existing blob of the same name.
    async fn write(&self, container: &ContainerHandle, upload: ObjectUpload) -> StorageResult<()> {
        let url = self.service.object_url(&container.name, &upload.name)?;
        let size = upload.body.len();
        let mut request = self
            .service
            .request(Method::PUT, url)
            .header("x-ms-blob-type", "BlockBlob")
            .header(CONTENT_TYPE, upload.resolved_content_type());
        request = if size == 0 {
            empty_body(request)
        } else {
            request.body(upload.body)
        };
        self.service.send(request).await?;
        debug!(
            "Uploaded blob {}/{} ({} bytes)",
            container.name, upload.name, size
        );
        Ok(())
    }
}
