use clap::Subcommand;
use serde_json::json;
use std::io::Read;

use crate::cli::utils::{load_codec, output_success, output_value};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::crypto::{generate_master_secret, validate_setup, FieldCipher, KeyMaterial};

#[derive(Subcommand)]
pub enum CryptoCommands {
    #[command(about = "Validate the configured key and run an encryption self test")]
    Check,

    #[command(about = "Generate a new random master secret")]
    GenerateKey,

    #[command(about = "Show the fingerprint of the configured key")]
    Fingerprint,

    #[command(about = "Encrypt a single value with the configured key")]
    Encrypt {
        #[arg(help = "Plaintext value, or - to read stdin")]
        value: String,
    },

    #[command(about = "Decrypt a single stored payload with the configured key")]
    Decrypt {
        #[arg(help = "Encrypted payload, or - to read stdin")]
        payload: String,
    },
}

pub async fn handle(cmd: CryptoCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        CryptoCommands::Check => check(output_format),
        CryptoCommands::GenerateKey => generate_key(output_format),
        CryptoCommands::Fingerprint => {
            let (_, codec) = load_codec()?;
            let fingerprint = codec.key().fingerprint();
            output_value(&output_format, &json!({ "fingerprint": fingerprint }), fingerprint)
        }
        CryptoCommands::Encrypt { value } => {
            let (_, codec) = load_codec()?;
            let payload = codec.encrypt(&read_arg(value)?)?;
            output_value(&output_format, &json!({ "payload": payload }), &payload)
        }
        CryptoCommands::Decrypt { payload } => {
            let (_, codec) = load_codec()?;
            let plaintext = codec.decrypt(&read_arg(payload)?)?;
            output_value(&output_format, &json!({ "plaintext": plaintext }), &plaintext)
        }
    }
}

fn check(output_format: OutputFormat) -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let report = validate_setup(&config.encryption);

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            let mark = |ok: bool| if ok { "✓" } else { "✗" };
            println!("{} key configured", mark(report.key_configured));
            println!("{} encryption enabled", mark(report.encryption_enabled));
            println!("{} round trip self test", mark(report.roundtrip_test));
            if let Some(fingerprint) = &report.fingerprint {
                println!(
                    "  fingerprint {}{}",
                    fingerprint,
                    if report.fingerprint_pinned { " (pinned)" } else { "" }
                );
            }
            if let Some(ttl) = report.ttl_secs {
                println!("  payload ttl {}s", ttl);
            }
            if report.using_default_key {
                println!("! using the development default key");
            }
            if let Some(error) = &report.error {
                println!("Error: {}", error);
            }
            for recommendation in &report.recommendations {
                println!("  - {}", recommendation);
            }
        }
    }

    if !report.is_healthy() {
        anyhow::bail!("encryption setup check failed");
    }
    Ok(())
}

fn generate_key(output_format: OutputFormat) -> anyhow::Result<()> {
    let secret = generate_master_secret();
    let key = KeyMaterial::derive(&secret)?;

    match output_format {
        OutputFormat::Json => output_success(
            &output_format,
            "Generated master secret",
            Some(json!({
                "key": secret,
                "fingerprint": key.fingerprint(),
            })),
        ),
        OutputFormat::Text => {
            println!("ENCRYPTION_KEY={}", secret);
            println!("ENCRYPTION_KEY_FINGERPRINT={}", key.fingerprint());
            Ok(())
        }
    }
}

fn read_arg(value: String) -> anyhow::Result<String> {
    if value != "-" {
        return Ok(value);
    }
    let mut buffer = String::new();
    std::io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer.trim_end_matches(['\r', '\n']).to_string())
}
