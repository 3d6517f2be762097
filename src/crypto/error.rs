use thiserror::Error;

/// Fatal startup problems with the master secret or encryption settings
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("ENCRYPTION_KEY is not set")]
    MissingSecret,

    #[error("Master secret must be exactly {expected} characters, got {got}")]
    InvalidSecretLength { expected: usize, got: usize },

    #[error("Key fingerprint mismatch: configured {expected}, derived {actual}")]
    FingerprintMismatch { expected: String, actual: String },

    #[error("Refusing to use the development default key in {0} mode")]
    DefaultKeyNotAllowed(String),

    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// The text-safe layer of a payload could not be decoded
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Malformed payload encoding: {0}")]
pub struct EncodingError(pub String);

impl From<base64::DecodeError> for EncodingError {
    fn from(err: base64::DecodeError) -> Self {
        EncodingError(err.to_string())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecryptionError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("Malformed payload: {0}")]
    Malformed(&'static str),

    #[error("Unsupported payload version: {0:#04x}")]
    UnsupportedVersion(u8),

    #[error("Integrity check failed (wrong key or corrupted data)")]
    IntegrityCheckFailed,

    #[error("Decrypted payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("Payload expired: issued at {issued_at}, ttl {ttl_secs}s")]
    Expired { issued_at: u64, ttl_secs: u64 },

    #[error("Payload timestamp {issued_at} is in the future")]
    NotYetValid { issued_at: u64 },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncryptionError {
    #[error("Refusing to encrypt an empty value")]
    EmptyPlaintext,

    #[error("Field '{0}' holds a non-text value and cannot be encrypted")]
    NonTextValue(String),

    #[error("Cipher failure: {0}")]
    Cipher(String),
}
