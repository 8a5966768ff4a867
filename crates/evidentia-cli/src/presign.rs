//! # Presign CLI: Sign and verify blob gateway URLs.
//!
//! Uses the server's signer, so `verify` is the check the blob gateway
//! performs and `sign` is useful for exercising the gateway by hand.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Args, Subcommand};

use evidentia_api::blob::{BlobMethod, BlobSigner};
use evidentia_api::config::{DEFAULT_BLOB_BASE_URL, DEFAULT_BLOB_BUCKET};

/// Presign subcommand arguments.
#[derive(Args, Debug)]
pub struct PresignArgs {
    /// Gateway base URL.
    #[arg(long, env = "EVIDENTIA_BLOB_BASE_URL", default_value = DEFAULT_BLOB_BASE_URL)]
    pub base_url: String,

    /// Bucket name.
    #[arg(long, env = "EVIDENTIA_BLOB_BUCKET", default_value = DEFAULT_BLOB_BUCKET)]
    pub bucket: String,

    /// Shared signing key.
    #[arg(long, env = "EVIDENTIA_BLOB_SIGNING_KEY", hide_env_values = true)]
    pub key: String,

    #[command(subcommand)]
    pub command: PresignCommand,
}

/// Available presign subcommands.
#[derive(Subcommand, Debug)]
pub enum PresignCommand {
    /// Issue a URL for one method on one locator.
    Sign {
        /// GET or PUT.
        #[arg(long, default_value = "GET")]
        method: String,

        /// Object locator inside the bucket.
        #[arg(long)]
        locator: String,

        /// Validity in minutes.
        #[arg(long, default_value_t = 60)]
        ttl_minutes: i64,
    },

    /// Check a URL's signature and expiry.
    Verify {
        /// The full URL.
        url: String,
    },
}

/// Execute the presign subcommand.
pub fn run_presign(args: &PresignArgs) -> Result<u8> {
    let signer = BlobSigner::new(&args.base_url, &args.bucket, args.key.as_bytes())
        .context("invalid blob gateway settings")?;
    match &args.command {
        PresignCommand::Sign {
            method,
            locator,
            ttl_minutes,
        } => {
            println!("{}", sign(&signer, method, locator, *ttl_minutes)?);
            Ok(0)
        }
        PresignCommand::Verify { url } => Ok(verify(&signer, url)),
    }
}

fn sign(signer: &BlobSigner, method: &str, locator: &str, ttl_minutes: i64) -> Result<String> {
    if ttl_minutes <= 0 {
        anyhow::bail!("--ttl-minutes must be positive");
    }
    let method = BlobMethod::parse(&method.to_ascii_uppercase())
        .with_context(|| format!("unsupported method '{method}', expected GET or PUT"))?;
    let presigned = signer
        .presign(method, locator, Duration::minutes(ttl_minutes), Utc::now())
        .context("failed to sign URL")?;
    Ok(presigned.url)
}

fn verify(signer: &BlobSigner, url: &str) -> u8 {
    match signer.verify(url, Utc::now()) {
        Ok(grant) => {
            println!("OK: {} {}", grant.method.as_str(), grant.locator);
            println!("expires: {}", grant.expires_at.to_rfc3339());
            0
        }
        Err(e) => {
            println!("REJECTED: {e}");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer(key: &str) -> BlobSigner {
        BlobSigner::new(DEFAULT_BLOB_BASE_URL, DEFAULT_BLOB_BUCKET, key.as_bytes()).unwrap()
    }

    #[test]
    fn signed_url_verifies() {
        let url = sign(&signer("k"), "put", "t/evidence/e-adv.pdf", 15).unwrap();
        assert!(url.contains("method=PUT"));
        assert_eq!(verify(&signer("k"), &url), 0);
    }

    #[test]
    fn other_key_is_rejected() {
        let url = sign(&signer("k"), "GET", "t/reports/r.pdf", 15).unwrap();
        assert_eq!(verify(&signer("other"), &url), 1);
    }

    #[test]
    fn unsupported_method_is_an_error() {
        assert!(sign(&signer("k"), "DELETE", "t/x", 15).is_err());
    }
}
