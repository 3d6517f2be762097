pub mod codec;
pub mod error;
pub mod key;
pub mod setup;

pub use codec::{decrypt, decrypt_with_ttl, encrypt, looks_encrypted, Codec, FieldCipher};
pub use error::{ConfigurationError, DecryptionError, EncodingError, EncryptionError};
pub use key::{derive_key, KeyMaterial};
pub use setup::{generate_master_secret, validate_setup, SetupReport};
