use serde::Serialize;
use std::env;
use std::time::Duration;

use crate::crypto::codec::Codec;
use crate::crypto::error::ConfigurationError;
use crate::crypto::key::KeyMaterial;
use crate::database::schema::SchemaRegistry;

/// Key used only when `ENCRYPTION_ALLOW_DEFAULT_KEY=true` in development
pub const DEV_DEFAULT_SECRET: &str = "development-key-change-me-now!!!";

/// Upper bound on layers peeled by a single repair
pub const MAX_REPAIR_PASSES: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub encryption: EncryptionConfig,
    pub repair: RepairConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    #[serde(skip)]
    pub schemas: SchemaRegistry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Clone, Default, Serialize)]
pub struct EncryptionConfig {
    #[serde(skip)]
    pub master_secret: Option<String>,
    pub fingerprint: Option<String>,
    pub ttl_secs: Option<u64>,
    pub using_default_key: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepairConfig {
    pub batch_size: usize,
    pub max_passes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseConfig {
    #[serde(skip)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiConfig {
    pub port: u16,
    pub max_page_size: usize,
    pub enable_request_logging: bool,
}

impl std::fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionConfig")
            .field("master_secret", &self.master_secret.as_ref().map(|_| "[REDACTED]"))
            .field("fingerprint", &self.fingerprint)
            .field("ttl_secs", &self.ttl_secs)
            .field("using_default_key", &self.using_default_key)
            .finish()
    }
}

impl EncryptionConfig {
    /// Derive key material, enforcing the pinned fingerprint when one is configured
    pub fn key_material(&self) -> Result<KeyMaterial, ConfigurationError> {
        let secret = self
            .master_secret
            .as_deref()
            .ok_or(ConfigurationError::MissingSecret)?;

        let key = KeyMaterial::derive(secret)?;
        if let Some(expected) = &self.fingerprint {
            key.verify_fingerprint(expected)?;
        }
        Ok(key)
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }

    pub fn codec(&self) -> Result<Codec, ConfigurationError> {
        let key = self.key_material()?;
        Ok(Codec::new(std::sync::Arc::new(key)).with_ttl(self.ttl()))
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from any variable source; `from_env` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_overrides(&lookup)
    }

    fn with_overrides<F>(mut self, lookup: &F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Encryption: every setting here is security relevant, so bad values are fatal
        self.encryption.master_secret = lookup("ENCRYPTION_KEY").filter(|v| !v.is_empty());
        self.encryption.fingerprint = lookup("ENCRYPTION_KEY_FINGERPRINT")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        if let Some(v) = lookup("ENCRYPTION_TTL_SECS") {
            let secs = parse_strict::<u64>("ENCRYPTION_TTL_SECS", &v)?;
            self.encryption.ttl_secs = (secs > 0).then_some(secs);
        }

        let allow_default = match lookup("ENCRYPTION_ALLOW_DEFAULT_KEY") {
            Some(v) => parse_strict::<bool>("ENCRYPTION_ALLOW_DEFAULT_KEY", &v)?,
            None => false,
        };
        if allow_default && self.encryption.master_secret.is_none() {
            if self.environment != Environment::Development {
                return Err(ConfigurationError::DefaultKeyNotAllowed(
                    format!("{:?}", self.environment).to_lowercase(),
                ));
            }
            self.encryption.master_secret = Some(DEV_DEFAULT_SECRET.to_string());
        }
        self.encryption.using_default_key =
            self.encryption.master_secret.as_deref() == Some(DEV_DEFAULT_SECRET);

        // Repair overrides
        if let Some(v) = lookup("REPAIR_BATCH_SIZE") {
            self.repair.batch_size = v.parse().unwrap_or(self.repair.batch_size).max(1);
        }
        if let Some(v) = lookup("REPAIR_MAX_PASSES") {
            let passes = parse_strict::<usize>("REPAIR_MAX_PASSES", &v)?;
            if passes == 0 || passes > MAX_REPAIR_PASSES {
                return Err(ConfigurationError::InvalidValue {
                    var: "REPAIR_MAX_PASSES",
                    value: v,
                });
            }
            self.repair.max_passes = passes;
        }

        // Database overrides
        self.database.url = lookup("DATABASE_URL").filter(|v| !v.is_empty());
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Some(v) = lookup("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Some(v) = lookup("VAULT_API_PORT").or_else(|| lookup("PORT")) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Some(v) = lookup("API_MAX_PAGE_SIZE") {
            self.api.max_page_size = v.parse().unwrap_or(self.api.max_page_size).max(1);
        }
        if let Some(v) = lookup("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Sensitive field declarations
        if let Some(v) = lookup("VAULT_SCHEMAS").filter(|v| !v.trim().is_empty()) {
            self.schemas = SchemaRegistry::parse(&v)?;
        }

        Ok(self)
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            encryption: EncryptionConfig::default(),
            repair: RepairConfig {
                batch_size: 100,
                max_passes: MAX_REPAIR_PASSES,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                port: 9001,
                max_page_size: 1000,
                enable_request_logging: true,
            },
            schemas: SchemaRegistry::builtin(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            encryption: EncryptionConfig::default(),
            repair: RepairConfig {
                batch_size: 500,
                max_passes: MAX_REPAIR_PASSES,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                port: 9001,
                max_page_size: 500,
                enable_request_logging: true,
            },
            schemas: SchemaRegistry::builtin(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            encryption: EncryptionConfig::default(),
            repair: RepairConfig {
                batch_size: 500,
                max_passes: MAX_REPAIR_PASSES,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                port: 9001,
                max_page_size: 100,
                enable_request_logging: false,
            },
            schemas: SchemaRegistry::builtin(),
        }
    }
}

fn parse_strict<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigurationError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigurationError::InvalidValue {
            var,
            value: value.to_string(),
        })
}
