//! File share service client.

use async_trait::async_trait;
use reqwest::{Method, Url};
use tracing::{debug, info};

use super::{ServiceClient, empty_body};
use crate::backend::{ResourceBackend, StorageResult};
use crate::request::{BackendKind, ObjectUpload};

/// Largest body a single Put Range accepts.
pub const MAX_RANGE_BYTES: usize = 4 * 1024 * 1024;

/// A share whose root directory is known to exist.
#[derive(Debug, Clone)]
pub struct ShareHandle {
    name: String,
}

/// Azure Files service client.
#[derive(Debug, Clone)]
pub struct AzureShares {
    service: ServiceClient,
}

impl AzureShares {
    pub(crate) fn new(service: ServiceClient) -> Self {
        Self { service }
    }

    fn share_url(&self, name: &str) -> StorageResult<Url> {
        let mut url = self.service.url(&[name])?;
        url.query_pairs_mut().append_pair("restype", "share");
        Ok(url)
    }
}

/// Inclusive byte ranges covering `len` bytes.
pub(crate) fn ranges(len: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..len)
        .step_by(MAX_RANGE_BYTES)
        .map(move |start| (start, (start + MAX_RANGE_BYTES).min(len) - 1))
}

#[async_trait]
impl ResourceBackend for AzureShares {
    const KIND: BackendKind = BackendKind::File;
    type Handle = ShareHandle;
    type Payload = ObjectUpload;

    async fn resolve(&self, name: &str) -> StorageResult<ShareHandle> {
        let request = empty_body(self.service.request(Method::PUT, self.share_url(name)?));
        if self
            .service
            .create_if_absent(request, "ShareAlreadyExists")
            .await?
        {
            info!("Created file share {}", name);
        }

        Ok(ShareHandle {
            name: name.to_string(),
        })
    }

    // Create File sizes (or resets) the file, then Put Range fills it in.
    async fn write(&self, share: &ShareHandle, upload: ObjectUpload) -> StorageResult<()> {
        let file_url = self.service.object_url(&share.name, &upload.name)?;
        let size = upload.body.len();

        let create = self
            .service
            .request(Method::PUT, file_url.clone())
            .header("x-ms-type", "file")
            .header("x-ms-content-length", size)
            .header("x-ms-content-type", upload.resolved_content_type());
        self.service.send(empty_body(create)).await?;

        let mut range_url = file_url;
        range_url.query_pairs_mut().append_pair("comp", "range");
        for (start, end) in ranges(size) {
            let request = self
                .service
                .request(Method::PUT, range_url.clone())
                .header("x-ms-range", format!("bytes={start}-{end}"))
                .header("x-ms-write", "update")
                .body(upload.body.slice(start..=end));
            self.service.send(request).await?;
        }

        debug!(
            "Uploaded file {}/{} ({} bytes)",
            share.name, upload.name, size
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges_empty() {
        assert_eq!(ranges(0).count(), 0);
    }

    #[test]
    fn test_ranges_single() {
        assert_eq!(ranges(11).collect::<Vec<_>>(), vec![(0, 10)]);
    }

    #[test]
    fn test_ranges_split_at_limit() {
        let len = MAX_RANGE_BYTES * 2 + 5;
        assert_eq!(
            ranges(len).collect::<Vec<_>>(),
            vec![
                (0, MAX_RANGE_BYTES - 1),
                (MAX_RANGE_BYTES, MAX_RANGE_BYTES * 2 - 1),
                (MAX_RANGE_BYTES * 2, len - 1),
            ]
        );
    }

    #[test]
    fn test_ranges_exact_multiple() {
        assert_eq!(
            ranges(MAX_RANGE_BYTES).collect::<Vec<_>>(),
            vec![(0, MAX_RANGE_BYTES - 1)]
        );
    }
}
