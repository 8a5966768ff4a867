//! # Token CLI: Development identity tokens.
//!
//! Stands in for the identity provider in local environments: mints HS256
//! tokens the API accepts, and decodes tokens with the server's rules.

use anyhow::{Context, Result};
use chrono::Duration;
use clap::{Args, Subcommand};
use uuid::Uuid;

use evidentia_api::auth::{AuthConfig, TokenSigner};
use evidentia_core::Role;

/// Token subcommand arguments.
#[derive(Args, Debug)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommand,
}

/// Available token subcommands.
#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Mint a token for a tenant member and print it.
    Mint {
        /// Tenant the token is scoped to.
        #[arg(long)]
        tenant_id: Uuid,

        /// User e-mail.
        #[arg(long)]
        email: String,

        /// admin, compliance_officer or viewer.
        #[arg(long, default_value = "admin")]
        role: String,

        /// Subject. A fresh id when omitted.
        #[arg(long)]
        user_id: Option<Uuid>,

        /// Lifetime in hours.
        #[arg(long, default_value_t = 24)]
        ttl_hours: i64,

        /// HS256 shared secret.
        #[arg(long, env = "EVIDENTIA_JWT_SECRET", hide_env_values = true)]
        secret: String,

        /// Issuer claim.
        #[arg(long, env = "EVIDENTIA_JWT_ISSUER")]
        issuer: Option<String>,
    },

    /// Verify a token and print the caller it resolves to.
    Inspect {
        /// The token.
        token: String,

        /// HS256 shared secret.
        #[arg(long, env = "EVIDENTIA_JWT_SECRET", hide_env_values = true)]
        secret: String,

        /// Required issuer.
        #[arg(long, env = "EVIDENTIA_JWT_ISSUER")]
        issuer: Option<String>,
    },
}

/// Execute the token subcommand.
pub fn run_token(args: &TokenArgs) -> Result<u8> {
    match &args.command {
        TokenCommand::Mint {
            tenant_id,
            email,
            role,
            user_id,
            ttl_hours,
            secret,
            issuer,
        } => {
            let token = mint(
                *tenant_id,
                email,
                role,
                user_id.unwrap_or_else(Uuid::new_v4),
                *ttl_hours,
                secret,
                issuer.as_deref(),
            )?;
            println!("{token}");
            Ok(0)
        }
        TokenCommand::Inspect {
            token,
            secret,
            issuer,
        } => run_inspect(token, secret, issuer.as_deref()),
    }
}

/// Mint a token with the given claims.
pub fn mint(
    tenant_id: Uuid,
    email: &str,
    role: &str,
    user_id: Uuid,
    ttl_hours: i64,
    secret: &str,
    issuer: Option<&str>,
) -> Result<String> {
    if ttl_hours <= 0 {
        anyhow::bail!("--ttl-hours must be positive");
    }
    let role = Role::parse(role).map_err(|e| anyhow::anyhow!("{e}"))?;
    let token = TokenSigner::new(secret, issuer)
        .mint(user_id, email, tenant_id, role, Duration::hours(ttl_hours))
        .context("failed to sign token")?;
    tracing::info!(%tenant_id, %user_id, %role, ttl_hours, "token minted");
    Ok(token)
}

fn run_inspect(token: &str, secret: &str, issuer: Option<&str>) -> Result<u8> {
    match AuthConfig::new(secret, issuer).verify(token) {
        Ok(caller) => {
            println!("user_id:   {}", caller.user_id);
            println!("email:     {}", caller.email);
            println!("tenant_id: {}", caller.tenant_id);
            println!("role:      {}", caller.role);
            Ok(0)
        }
        Err(failure) => {
            println!("REJECTED: {failure:?}");
            Ok(1)
        }
    }
}
