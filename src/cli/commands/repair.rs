use clap::Subcommand;
use futures::TryStreamExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::cli::utils::{connect_store, load_codec, resolve_schemas};
use crate::cli::OutputFormat;
use crate::crypto::FieldCipher;
use crate::repair::{AnomalyKind, FieldReport, MigrationStats, Migrator, RepairSummary, Repairer, Scanner};

#[derive(Subcommand)]
pub enum RepairCommands {
    #[command(about = "Report legacy, multi-encrypted and corrupt values without changing anything")]
    Scan {
        #[arg(long, help = "Record type to scan (default: every registered type)")]
        schema: Option<String>,
        #[arg(long, help = "Resume after this record id")]
        after: Option<Uuid>,
    },

    #[command(about = "Collapse multi-encrypted values back to a single layer")]
    Apply {
        #[arg(long, help = "Record type to repair (default: every registered type)")]
        schema: Option<String>,
        #[arg(long, help = "Resume after this record id")]
        after: Option<Uuid>,
        #[arg(long, help = "Report what would change without writing")]
        dry_run: bool,
    },

    #[command(about = "Encrypt legacy plaintext values")]
    Migrate {
        #[arg(long, help = "Record type to migrate (default: every registered type)")]
        schema: Option<String>,
        #[arg(long, help = "Resume after this record id")]
        after: Option<Uuid>,
        #[arg(long, help = "Report what would change without writing")]
        dry_run: bool,
    },
}

#[derive(Debug, Default, Serialize)]
struct ScanSummary {
    schema: String,
    counts: BTreeMap<String, usize>,
    anomalies: Vec<FieldReport>,
    last_record_id: Option<Uuid>,
}

pub async fn handle(cmd: RepairCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let (config, codec) = load_codec()?;
    let cipher: Arc<dyn FieldCipher> = Arc::new(codec);
    let store = connect_store(&config).await?;
    let batch_size = config.repair.batch_size;

    match cmd {
        RepairCommands::Scan { schema, after } => {
            let scanner = Scanner::new(store, cipher, batch_size);
            let mut summaries = Vec::new();

            for schema in resolve_schemas(&config, schema.as_deref())? {
                let mut summary = ScanSummary {
                    schema: schema.name().to_string(),
                    ..Default::default()
                };
                let mut reports = scanner.scan(schema, after);
                while let Some(report) = reports.try_next().await? {
                    *summary.counts.entry(report.kind.to_string()).or_default() += 1;
                    summary.last_record_id = Some(report.record_id);
                    if report.kind.is_anomaly() {
                        summary.anomalies.push(report);
                    }
                }
                print_scan(&output_format, &summary);
                summaries.push(summary);
            }

            if output_format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            }
            Ok(())
        }
        RepairCommands::Apply { schema, after, dry_run } => {
            let repairer = Repairer::new(store, cipher, config.repair.max_passes, batch_size);
            let mut results = Vec::new();

            for schema in resolve_schemas(&config, schema.as_deref())? {
                let name = schema.name().to_string();
                let summary = repairer.repair_all(schema, after, dry_run).await?;
                print_repair(&output_format, &name, &summary, dry_run);
                results.push(serde_json::json!({ "schema": name, "dry_run": dry_run, "summary": summary }));
            }

            if output_format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            }
            Ok(())
        }
        RepairCommands::Migrate { schema, after, dry_run } => {
            let migrator = Migrator::new(store, cipher, batch_size);
            let mut results = Vec::new();

            for schema in resolve_schemas(&config, schema.as_deref())? {
                let name = schema.name().to_string();
                let stats = migrator.migrate(schema, after, dry_run).await?;
                print_migration(&output_format, &name, &stats, dry_run);
                results.push(serde_json::json!({ "schema": name, "dry_run": dry_run, "stats": stats }));
            }

            if output_format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            }
            Ok(())
        }
    }
}

fn print_scan(output_format: &OutputFormat, summary: &ScanSummary) {
    if *output_format != OutputFormat::Text {
        return;
    }
    println!("{}:", summary.schema);
    for kind in [
        AnomalyKind::Ok,
        AnomalyKind::LegacyPlaintext,
        AnomalyKind::MultiEncrypted,
        AnomalyKind::Corrupt,
    ] {
        let count = summary.counts.get(&kind.to_string()).copied().unwrap_or(0);
        println!("  {:<18} {}", kind, count);
    }
    for report in &summary.anomalies {
        println!(
            "  {} {}.{} {}{}",
            report.record_id,
            report.schema,
            report.field,
            report.kind,
            report.detail.as_deref().map(|d| format!(" ({})", d)).unwrap_or_default()
        );
    }
}

fn print_repair(output_format: &OutputFormat, schema: &str, summary: &RepairSummary, dry_run: bool) {
    if *output_format != OutputFormat::Text {
        return;
    }
    let stats = &summary.stats;
    println!(
        "{}{}: {} records ({} fields), {} {}, skipped {}, flagged {}, failed {}",
        schema,
        if dry_run { " (dry run)" } else { "" },
        stats.records_processed,
        stats.fields_processed,
        if dry_run { "would fix" } else { "fixed" },
        stats.fixed,
        stats.skipped,
        stats.flagged,
        stats.failed
    );
    for report in &summary.flagged {
        println!(
            "  flagged {}.{} {}: {}",
            report.schema,
            report.field,
            report.record_id,
            report.detail.as_deref().unwrap_or("needs review")
        );
    }
    if let Some(last) = summary.last_record_id {
        println!("  last record {}", last);
    }
}

fn print_migration(output_format: &OutputFormat, schema: &str, stats: &MigrationStats, dry_run: bool) {
    if *output_format != OutputFormat::Text {
        return;
    }
    println!(
        "{}{}: {} records ({} fields), {} {}, skipped {}, failed {}",
        schema,
        if dry_run { " (dry run)" } else { "" },
        stats.records_processed,
        stats.fields_processed,
        if dry_run { "would encrypt" } else { "encrypted" },
        stats.encrypted,
        stats.skipped,
        stats.failed
    );
}
