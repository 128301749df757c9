//! Per-request authentication metadata.
//!
//! Every RPC carries the headers produced here: identification headers on
//! every call, plus an HMAC-SHA1 authorization header when credentials are
//! configured. The header names and the authorization string layout are
//! wire-frozen; brokers parse them byte-for-byte.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use tonic::metadata::{MetadataMap, MetadataValue};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

pub const TENANT_ID_KEY: &str = "x-mq-tenant-id";
pub const NAMESPACE_KEY: &str = "x-mq-namespace";
pub const AUTHORIZATION_KEY: &str = "authorization";
pub const DATE_TIME_KEY: &str = "x-mq-date-time";
pub const SESSION_TOKEN_KEY: &str = "x-mq-session-token";
pub const REQUEST_ID_KEY: &str = "x-mq-request-id";
pub const LANGUAGE_KEY: &str = "x-mq-language";
pub const CLIENT_VERSION_KEY: &str = "x-mq-client-version";
pub const PROTOCOL_VERSION_KEY: &str = "x-mq-protocol";

pub const ALGORITHM: &str = "MQv2-HMAC-SHA1";

/// Brokers key client-language behavior off this literal; it must stay
/// `"JAVA"` to interoperate with existing deployments.
pub const LANGUAGE: &str = "JAVA";

pub const PROTOCOL_VERSION: &str = "v1";

const DATE_TIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";

type HmacSha1 = Hmac<Sha1>;

/// Builds the metadata for one RPC.
///
/// Always emits: request id, date-time, language, protocol version, client
/// version; tenant id and namespace when configured. When the credentials
/// provider yields a non-blank access key and secret it additionally emits
/// the session token (if any) and an `authorization` header of the shape
///
/// `MQv2-HMAC-SHA1 Credential=<ak>/<region>/<service>,
/// SignedHeaders=x-mq-date-time, Signature=<hex>`
///
/// where the signature is the lowercase-hex HMAC-SHA1 of the date-time
/// string keyed by the access secret. Missing or blank credentials yield
/// unsigned metadata, not an error.
pub fn sign(config: &ClientConfig, now: DateTime<Utc>) -> Result<MetadataMap> {
    let mut metadata = MetadataMap::new();

    if !config.tenant_id.is_empty() {
        put(&mut metadata, TENANT_ID_KEY, &config.tenant_id)?;
    }

    put(&mut metadata, LANGUAGE_KEY, LANGUAGE)?;
    put(&mut metadata, PROTOCOL_VERSION_KEY, PROTOCOL_VERSION)?;
    put(&mut metadata, CLIENT_VERSION_KEY, env!("CARGO_PKG_VERSION"))?;

    if !config.namespace.is_empty() {
        put(&mut metadata, NAMESPACE_KEY, &config.namespace)?;
    }

    let date_time = now.format(DATE_TIME_FORMAT).to_string();
    put(&mut metadata, DATE_TIME_KEY, &date_time)?;

    let request_id = Uuid::new_v4().to_string();
    put(&mut metadata, REQUEST_ID_KEY, &request_id)?;

    let Some(provider) = &config.credentials_provider else {
        return Ok(metadata);
    };
    let credentials = provider.credentials();

    if let Some(token) = credentials.security_token.as_deref() {
        if !token.is_empty() {
            put(&mut metadata, SESSION_TOKEN_KEY, token)?;
        }
    }

    if credentials.access_key.is_empty() || credentials.access_secret.is_empty() {
        return Ok(metadata);
    }

    let signature = hmac_sha1_hex(credentials.access_secret.as_bytes(), &date_time)?;
    let authorization = format!(
        "{ALGORITHM} Credential={}/{}/{}, SignedHeaders={DATE_TIME_KEY}, Signature={signature}",
        credentials.access_key, config.region_id, config.service_name,
    );
    put(&mut metadata, AUTHORIZATION_KEY, &authorization)?;

    Ok(metadata)
}

fn hmac_sha1_hex(key: &[u8], payload: &str) -> Result<String> {
    let mut mac = HmacSha1::new_from_slice(key)
        .map_err(|err| ClientError::Signing(format!("invalid HMAC key: {err}")))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn put(metadata: &mut MetadataMap, key: &'static str, value: &str) -> Result<()> {
    let value = MetadataValue::try_from(value)
        .map_err(|err| ClientError::Signing(format!("invalid value for header '{key}': {err}")))?;
    metadata.insert(key, value);
    Ok(())
}
