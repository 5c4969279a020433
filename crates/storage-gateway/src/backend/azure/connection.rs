//! Azure Storage connection strings.
//!
//! Accepts the `key=value;key=value` format issued by the Azure portal,
//! explicit per-service endpoints, SAS connection strings, and the
//! `UseDevelopmentStorage=true` shorthand for Azurite.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use reqwest::Url;

use crate::backend::{StorageError, StorageResult};
use crate::request::BackendKind;

/// Account name used by the local storage emulator.
pub const DEVELOPMENT_ACCOUNT: &str = "devstoreaccount1";

/// Well-known, publicly documented emulator key.
const DEVELOPMENT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// How requests are authorized.
#[derive(Clone)]
pub enum Credential {
    /// HMAC-SHA256 request signing with the account key.
    SharedKey { account: String, key: Vec<u8> },
    /// Pre-signed SAS token appended to every request URL.
    Sas { token: String },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SharedKey { account, .. } => f
                .debug_struct("SharedKey")
                .field("account", account)
                .field("key", &"<redacted>")
                .finish(),
            Self::Sas { .. } => f
                .debug_struct("Sas")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

/// Parsed connection string.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    account: Option<String>,
    credential: Credential,
    blob_endpoint: Option<Url>,
    queue_endpoint: Option<Url>,
    table_endpoint: Option<Url>,
    file_endpoint: Option<Url>,
}

impl ConnectionSettings {
    /// Parse a connection string.
    pub fn parse(connection_string: &str) -> StorageResult<Self> {
        let values = parse_pairs(connection_string)?;
        let get = |key: &str| values.get(key).map(String::as_str).filter(|v| !v.is_empty());

        if get("usedevelopmentstorage").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
            return Ok(Self::development());
        }

        let account = get("accountname").map(str::to_string);
        let credential = match (get("accountkey"), get("sharedaccesssignature")) {
            (Some(key), _) => {
                let account = account.clone().ok_or_else(|| {
                    StorageError::Configuration("AccountKey requires AccountName".to_string())
                })?;
                let key = BASE64_STANDARD.decode(key).map_err(|e| {
                    StorageError::Configuration(format!("AccountKey is not valid base64: {e}"))
                })?;
                Credential::SharedKey { account, key }
            }
            (None, Some(sas)) => Credential::Sas {
                token: sas.trim_start_matches('?').to_string(),
            },
            (None, None) => {
                return Err(StorageError::Configuration(
                    "connection string has neither AccountKey nor SharedAccessSignature"
                        .to_string(),
                ));
            }
        };

        let protocol = get("defaultendpointsprotocol").unwrap_or("https");
        let suffix = get("endpointsuffix").unwrap_or(DEFAULT_ENDPOINT_SUFFIX);
        let endpoint = |explicit: &str, service: &str| -> StorageResult<Option<Url>> {
            match (get(explicit), &account) {
                (Some(url), _) => parse_endpoint(url).map(Some),
                (None, Some(account)) => {
                    parse_endpoint(&format!("{protocol}://{account}.{service}.{suffix}")).map(Some)
                }
                (None, None) => Ok(None),
            }
        };

        let settings = Self {
            blob_endpoint: endpoint("blobendpoint", "blob")?,
            queue_endpoint: endpoint("queueendpoint", "queue")?,
            table_endpoint: endpoint("tableendpoint", "table")?,
            file_endpoint: endpoint("fileendpoint", "file")?,
            account,
            credential,
        };

        if settings.blob_endpoint.is_none()
            && settings.queue_endpoint.is_none()
            && settings.table_endpoint.is_none()
            && settings.file_endpoint.is_none()
        {
            return Err(StorageError::Configuration(
                "connection string names no account and no service endpoints".to_string(),
            ));
        }

        Ok(settings)
    }

    /// Settings for a local Azurite emulator.
    pub fn development() -> Self {
        let local = |port: u16| Url::parse(&format!("http://127.0.0.1:{port}/{DEVELOPMENT_ACCOUNT}")).ok();
        Self {
            account: Some(DEVELOPMENT_ACCOUNT.to_string()),
            credential: Credential::SharedKey {
                account: DEVELOPMENT_ACCOUNT.to_string(),
                key: BASE64_STANDARD.decode(DEVELOPMENT_KEY).unwrap_or_default(),
            },
            blob_endpoint: local(10000),
            queue_endpoint: local(10001),
            table_endpoint: local(10002),
            // Azurite has no file service.
            file_endpoint: None,
        }
    }

    /// Storage account name, when known.
    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Base URL of the service that handles the given kind of write.
    pub fn endpoint(&self, kind: BackendKind) -> StorageResult<Url> {
        let endpoint = match kind {
            BackendKind::Queue => &self.queue_endpoint,
            BackendKind::Table => &self.table_endpoint,
            BackendKind::Blob => &self.blob_endpoint,
            BackendKind::File => &self.file_endpoint,
        };
        endpoint.clone().ok_or_else(|| {
            StorageError::Configuration(format!("no {kind} service endpoint configured"))
        })
    }
}

impl FromStr for ConnectionSettings {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_pairs(connection_string: &str) -> StorageResult<HashMap<String, String>> {
    let mut values = HashMap::new();
    for segment in connection_string.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        // Keys can't contain '=', values (base64 keys, SAS tokens) can.
        let (key, value) = segment.split_once('=').ok_or_else(|| {
            StorageError::Configuration(format!(
                "malformed connection string segment without '=': {segment}"
            ))
        })?;
        values.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
    }
    Ok(values)
}

fn parse_endpoint(raw: &str) -> StorageResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| StorageError::Configuration(format!("invalid endpoint {raw}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(StorageError::Configuration(format!(
            "invalid endpoint {raw}: not a base URL"
        )));
    }
    Ok(url)
}
