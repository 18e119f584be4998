//! # Vaultkeep Membership Data Layer
//!
//! This crate contains the shared membership models and reconciliation logic
//! used by the Vaultkeep API server. It owns the user/group/project membership
//! relations and the set-algebra over them; the HTTP layer and secret storage
//! live elsewhere.
//!
//! ## Module Organization
//!
//! - `models`: Database models and their CRUD operations
//! - `reconcile`: Membership reconciliation engine (effective-access queries)
//! - `db`: Connection pool and migration runner
//! - `config`: Configuration management
//! - `error`: Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod reconcile;

/// Current version of the membership data layer
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
