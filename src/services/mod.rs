pub mod vault_service;

pub use vault_service::{ServiceError, VaultService};
