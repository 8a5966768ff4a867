//! # Pre-signed Blob URLs
//!
//! The service never handles file bytes. It hands out short-lived URLs the
//! blob gateway accepts for exactly one method on exactly one locator:
//!
//! ```text
//! {base}/{bucket}/{locator}?method=PUT&expires=<unix secs>&signature=<sig>
//! sig = base64url(HMAC-SHA256(key, "PUT\n{locator}\n{expires}"))
//! ```
//!
//! The gateway recomputes the signature with the shared key. [`BlobSigner::verify`]
//! is the same check, used by the CLI and tests.

use std::collections::HashMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of an upload URL.
pub const UPLOAD_URL_TTL_MINUTES: i64 = 15;
/// Lifetime of a download URL.
pub const DOWNLOAD_URL_TTL_MINUTES: i64 = 60;

const MAX_FILE_NAME_LEN: usize = 128;

/// HTTP method a URL is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobMethod {
    /// Download.
    Get,
    /// Upload.
    Put,
}

impl BlobMethod {
    /// Method name as signed.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
        }
    }

    /// Parse a method name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "GET" => Some(Self::Get),
            "PUT" => Some(Self::Put),
            _ => None,
        }
    }
}

/// Signing and verification failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlobError {
    /// The base URL or presented URL does not parse.
    #[error("invalid blob url: {0}")]
    InvalidUrl(String),
    /// The URL does not point into the configured bucket.
    #[error("url is outside the configured bucket")]
    ForeignBucket,
    /// A query parameter is absent or malformed.
    #[error("missing or malformed parameter: {0}")]
    BadParameter(&'static str),
    /// The URL's expiry has passed.
    #[error("url expired")]
    Expired,
    /// The signature does not match.
    #[error("signature mismatch")]
    BadSignature,
    /// The key cannot initialise the MAC.
    #[error("invalid signing key")]
    InvalidKey,
}

/// A signed URL and the instant it stops working.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedUrl {
    /// The URL to hand to the client.
    pub url: String,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
}

/// What a verified URL grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedGrant {
    /// Allowed method.
    pub method: BlobMethod,
    /// Object locator inside the bucket.
    pub locator: String,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
}

/// Issues and checks pre-signed URLs.
#[derive(Clone)]
pub struct BlobSigner {
    base_url: String,
    bucket: String,
    key: Vec<u8>,
}

impl std::fmt::Debug for BlobSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobSigner")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl BlobSigner {
    /// Signer for a gateway base URL, bucket and shared key.
    pub fn new(base_url: &str, bucket: &str, key: &[u8]) -> Result<Self, BlobError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| BlobError::InvalidUrl(e.to_string()))?;
        Ok(Self {
            base_url,
            bucket: bucket.trim_matches('/').to_string(),
            key: key.to_vec(),
        })
    }

    /// Bucket URLs point into.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn bucket_root(&self) -> Result<Url, BlobError> {
        Url::parse(&format!("{}/{}/", self.base_url, self.bucket))
            .map_err(|e| BlobError::InvalidUrl(e.to_string()))
    }

    fn mac(&self, method: BlobMethod, locator: &str, expires: i64) -> Result<HmacSha256, BlobError> {
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|_| BlobError::InvalidKey)?;
        mac.update(method.as_str().as_bytes());
        mac.update(b"\n");
        mac.update(locator.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    /// Signature over `method \n locator \n expires`.
    pub fn signature(&self, method: BlobMethod, locator: &str, expires: i64) -> Result<String, BlobError> {
        let mac = self.mac(method, locator, expires)?;
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    /// Issue a URL for one method on one locator, valid for `ttl` from `now`.
    pub fn presign(
        &self,
        method: BlobMethod,
        locator: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<PresignedUrl, BlobError> {
        let expires_at = now + ttl;
        let expires = expires_at.timestamp();
        let signature = self.signature(method, locator, expires)?;

        let mut url = self
            .bucket_root()?
            .join(locator)
            .map_err(|e| BlobError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("method", method.as_str())
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &signature);

        Ok(PresignedUrl {
            url: url.to_string(),
            expires_at,
        })
    }

    /// Check a presented URL the way the gateway does.
    pub fn verify(&self, presented: &str, now: DateTime<Utc>) -> Result<VerifiedGrant, BlobError> {
        let url = Url::parse(presented).map_err(|e| BlobError::InvalidUrl(e.to_string()))?;
        let root = self.bucket_root()?;
        if url.origin() != root.origin() {
            return Err(BlobError::ForeignBucket);
        }
        let locator = url
            .path()
            .strip_prefix(root.path())
            .filter(|l| !l.is_empty())
            .ok_or(BlobError::ForeignBucket)?
            .to_string();

        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let method = params
            .get("method")
            .and_then(|m| BlobMethod::parse(m))
            .ok_or(BlobError::BadParameter("method"))?;
        let expires: i64 = params
            .get("expires")
            .and_then(|e| e.parse().ok())
            .ok_or(BlobError::BadParameter("expires"))?;
        let signature = params
            .get("signature")
            .and_then(|s| URL_SAFE_NO_PAD.decode(s).ok())
            .ok_or(BlobError::BadParameter("signature"))?;

        self.mac(method, &locator, expires)?
            .verify_slice(&signature)
            .map_err(|_| BlobError::BadSignature)?;

        let expires_at = Utc
            .timestamp_opt(expires, 0)
            .single()
            .ok_or(BlobError::BadParameter("expires"))?;
        if expires_at <= now {
            return Err(BlobError::Expired);
        }

        Ok(VerifiedGrant {
            method,
            locator,
            expires_at,
        })
    }
}

/// Locator for an evidence upload.
pub fn evidence_locator(tenant_id: Uuid, evidence_id: Uuid, file_name: &str) -> String {
    format!("{tenant_id}/evidence/{evidence_id}-{}", sanitize_file_name(file_name))
}

/// Reduce a client-supplied file name to a safe path segment.
///
/// Directory components are dropped. Anything outside `[A-Za-z0-9._-]`
/// becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILE_NAME_LEN)
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}
