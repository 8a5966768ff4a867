//! # evidentia-cli: Operator CLI for Evidentia
//!
//! Provides the `evidentia` command-line interface.
//!
//! ## Subcommands
//!
//! - `evidentia token`: mint and inspect development identity tokens.
//! - `evidentia catalog`: validate and list requirement template catalogs.
//! - `evidentia presign`: sign and verify blob gateway URLs.
//!
//! ```bash
//! evidentia token mint --tenant-id <uuid> --email cco@acme-ria.com --role admin
//! evidentia catalog check ./catalog.yaml
//! evidentia presign verify 'https://storage.local/evidentia-evidence/...'
//! ```
//!
//! Secrets are read from the same environment variables the API server
//! uses, so a shell configured for the server works unchanged.

pub mod catalog;
pub mod presign;
pub mod token;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_modules_are_accessible() {
        let _ = std::any::type_name::<catalog::CatalogArgs>();
        let _ = std::any::type_name::<presign::PresignArgs>();
        let _ = std::any::type_name::<token::TokenArgs>();
    }
}
