use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::crypto::Codec;
use crate::database::{PgStore, RecordStore, SensitiveSchema};

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(target), Some(Value::Object(extra))) = (response.as_object_mut(), data) {
                target.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output a serializable value; text mode prints `text` instead
pub fn output_value<T: Serialize>(output_format: &OutputFormat, value: &T, text: &str) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => println!("{}", text),
    }
    Ok(())
}

/// Configuration plus a codec built from it; fails on a missing or mismatched key
pub fn load_codec() -> anyhow::Result<(AppConfig, Codec)> {
    let config = AppConfig::from_env()?;
    let codec = config.encryption.codec()?;
    Ok((config, codec))
}

pub async fn connect_store(config: &AppConfig) -> anyhow::Result<Arc<dyn RecordStore>> {
    let store = PgStore::connect(&config.database).await?;
    Ok(Arc::new(store))
}

/// The named record type, or every registered type when none is given
pub fn resolve_schemas(config: &AppConfig, name: Option<&str>) -> anyhow::Result<Vec<Arc<SensitiveSchema>>> {
    match name {
        Some(name) => config
            .schemas
            .get(name)
            .map(|schema| vec![schema])
            .ok_or_else(|| {
                let known: Vec<&str> = config.schemas.names().collect();
                anyhow::anyhow!("Unknown record type '{}' (known: {})", name, known.join(", "))
            }),
        None => Ok(config.schemas.iter().cloned().collect()),
    }
}
