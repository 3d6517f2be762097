pub mod crypto;
pub mod repair;
