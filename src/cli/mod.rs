pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "vault")]
#[command(about = "Vault CLI - key management and repair tooling for encrypted record fields")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Encryption key checks and single-value operations")]
    Crypto {
        #[command(subcommand)]
        cmd: commands::crypto::CryptoCommands,
    },

    #[command(about = "Scan, repair and migrate stored sensitive fields")]
    Repair {
        #[command(subcommand)]
        cmd: commands::repair::RepairCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Crypto { cmd } => commands::crypto::handle(cmd, output_format).await,
        Commands::Repair { cmd } => commands::repair::handle(cmd, output_format).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repair_apply_dry_run() {
        let cli = Cli::try_parse_from(["vault", "--json", "repair", "apply", "--schema", "user", "--dry-run"])
            .expect("parse");
        assert_eq!(OutputFormat::from_cli(&cli), OutputFormat::Json);
        match cli.command {
            Commands::Repair {
                cmd: commands::repair::RepairCommands::Apply { schema, dry_run, after },
            } => {
                assert_eq!(schema.as_deref(), Some("user"));
                assert!(dry_run);
                assert!(after.is_none());
            }
            _ => panic!("expected repair apply"),
        }
    }

    #[test]
    fn test_global_json_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["vault", "crypto", "check", "--json"]).expect("parse");
        assert_eq!(OutputFormat::from_cli(&cli), OutputFormat::Json);
    }

    #[test]
    fn test_invalid_cursor_rejected() {
        let result = Cli::try_parse_from(["vault", "repair", "scan", "--after", "not-a-uuid"]);
        assert!(result.is_err());
    }
}
