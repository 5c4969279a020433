//! Request authorization for Azure Storage.
//!
//! Shared Key signing covers two string-to-sign layouts: the full layout used
//! by the Blob, Queue and File services, and the shorter Table service layout.
//! SAS credentials are appended to the request URL instead.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Request, Url};
use sha2::Sha256;

use super::connection::Credential;
use crate::backend::{StorageError, StorageResult};
use crate::request::BackendKind;

type HmacSha256 = Hmac<Sha256>;

impl Credential {
    /// Authorize a fully built request in place.
    pub fn authorize(&self, request: &mut Request, kind: BackendKind) -> StorageResult<()> {
        match self {
            Self::SharedKey { account, key } => {
                let string_to_sign = match kind {
                    BackendKind::Table => table_string_to_sign(account, request),
                    _ => string_to_sign(account, request),
                };
                let signature = sign(key, &string_to_sign)?;
                let value = HeaderValue::from_str(&format!("SharedKey {account}:{signature}"))
                    .map_err(|e| StorageError::Authorization(e.to_string()))?;
                request.headers_mut().insert(AUTHORIZATION, value);
            }
            Self::Sas { token } => append_sas(request.url_mut(), token),
        }
        Ok(())
    }
}

fn header<'a>(request: &'a Request, name: &str) -> &'a str {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

/// Blob, Queue and File services (version 2009-09-19 and later).
pub(crate) fn string_to_sign(account: &str, request: &Request) -> String {
    // Zero-length bodies sign as an empty Content-Length.
    let content_length = request
        .body()
        .and_then(|body| body.as_bytes())
        .map(<[u8]>::len)
        .filter(|len| *len > 0)
        .map(|len| len.to_string())
        .unwrap_or_default();

    format!(
        "{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}{}",
        request.method().as_str(),
        header(request, "content-encoding"),
        header(request, "content-language"),
        content_length,
        header(request, "content-md5"),
        header(request, "content-type"),
        header(request, "date"),
        header(request, "if-modified-since"),
        header(request, "if-match"),
        header(request, "if-none-match"),
        header(request, "if-unmodified-since"),
        header(request, "range"),
        canonicalized_headers(request),
        canonicalized_resource(account, request.url()),
    )
}

/// Table service Shared Key layout.
pub(crate) fn table_string_to_sign(account: &str, request: &Request) -> String {
    let mut resource = format!("/{}{}", account, request.url().path());
    if let Some((_, comp)) = request.url().query_pairs().find(|(name, _)| name == "comp") {
        resource.push_str("?comp=");
        resource.push_str(&comp);
    }

    let date = match header(request, "x-ms-date") {
        "" => header(request, "date"),
        date => date,
    };

    format!(
        "{}\n{}\n{}\n{}\n{}",
        request.method().as_str(),
        header(request, "content-md5"),
        header(request, "content-type"),
        date,
        resource,
    )
}

fn canonicalized_headers(request: &Request) -> String {
    let mut ms_headers: Vec<(String, String)> = request
        .headers()
        .iter()
        .filter(|(name, _)| name.as_str().starts_with("x-ms-"))
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or("").trim().to_string(),
            )
        })
        .collect();
    ms_headers.sort();

    ms_headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect()
}

fn canonicalized_resource(account: &str, url: &Url) -> String {
    let mut resource = format!("/{}{}", account, url.path());

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| (name.to_lowercase(), value.into_owned()))
        .collect();
    params.sort();

    // Repeated parameters collapse into one comma-separated line.
    let mut lines: Vec<(String, Vec<String>)> = Vec::new();
    for (name, value) in params {
        match lines.last_mut() {
            Some((last, values)) if *last == name => values.push(value),
            _ => lines.push((name, vec![value])),
        }
    }
    for (name, values) in lines {
        resource.push('\n');
        resource.push_str(&name);
        resource.push(':');
        resource.push_str(&values.join(","));
    }

    resource
}

fn sign(key: &[u8], string_to_sign: &str) -> StorageResult<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StorageError::Authorization(format!("HMAC key error: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

fn append_sas(url: &mut Url, token: &str) {
    let query = match url.query() {
        Some(existing) if !existing.is_empty() => format!("{existing}&{token}"),
        _ => token.to_string(),
    };
    url.set_query(Some(&query));
}
