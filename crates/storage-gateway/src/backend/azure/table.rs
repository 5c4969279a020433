//! Table service client.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Method, Url};
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use super::ServiceClient;
use crate::backend::{ResourceBackend, StorageResult};
use crate::request::{BackendKind, TableEntity};

const JSON_NO_METADATA: &str = "application/json;odata=nometadata";
const DATA_SERVICE_VERSION: &str = "3.0";

/// A table that is known to exist.
#[derive(Debug, Clone)]
pub struct TableHandle {
    name: String,
    url: Url,
}

/// Azure Table service client.
#[derive(Debug, Clone)]
pub struct AzureTables {
    service: ServiceClient,
}

impl AzureTables {
    pub(crate) fn new(service: ServiceClient) -> Self {
        Self { service }
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.service
            .request(method, url)
            .header(ACCEPT, JSON_NO_METADATA)
            .header("DataServiceVersion", DATA_SERVICE_VERSION)
            .header("MaxDataServiceVersion", DATA_SERVICE_VERSION)
    }
}

/// JSON body for Insert Entity. Keys win over same-named fields.
pub(crate) fn entity_body(entity: &TableEntity) -> Value {
    let mut body = Map::new();
    for (name, value) in &entity.fields {
        body.insert(name.clone(), Value::String(value.clone()));
    }
    body.insert(
        "PartitionKey".to_string(),
        Value::String(entity.partition_key.clone()),
    );
    body.insert("RowKey".to_string(), Value::String(entity.row_key.clone()));
    Value::Object(body)
}

#[async_trait]
impl ResourceBackend for AzureTables {
    const KIND: BackendKind = BackendKind::Table;
    type Handle = TableHandle;
    type Payload = TableEntity;

    async fn resolve(&self, name: &str) -> StorageResult<TableHandle> {
        let request = self
            .request(Method::POST, self.service.url(&["Tables"])?)
            .json(&json!({ "TableName": name }));
        if self
            .service
            .create_if_absent(request, "TableAlreadyExists")
            .await?
        {
            info!("Created table {}", name);
        }

        Ok(TableHandle {
            name: name.to_string(),
            url: self.service.url(&[name])?,
        })
    }

    // Insert Entity: an existing (PartitionKey, RowKey) fails with 409 EntityAlreadyExists.
    async fn write(&self, table: &TableHandle, entity: TableEntity) -> StorageResult<()> {
        let request = self
            .request(Method::POST, table.url.clone())
            .header("Prefer", "return-no-content")
            .json(&entity_body(&entity));
        self.service.send(request).await?;
        debug!(
            "Inserted entity ({}, {}) into table {}",
            entity.partition_key, entity.row_key, table.name
        );
        Ok(())
    }
}
