use std::collections::BTreeMap;

use anyhow::{bail, Context};
use colored::Colorize;
use rollbook_ledger::{AuditReport, MirrorAudit};
use rollbook_server::{RollbookServer, ServerConfig};
use rollbook_store::{LedgerMirror, MirrorRow, SqliteMirror};
use rollbook_types::EventKind;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args).await,
        Command::Verify => cmd_verify(&open_mirror(&config).await?, cli.format).await,
        Command::Chain(args) => cmd_chain(&open_mirror(&config).await?, args, cli.format).await,
        Command::Show(args) => cmd_show(&open_mirror(&config).await?, args, cli.format).await,
        Command::Blocks(args) => cmd_blocks(&open_mirror(&config).await?, args, cli.format).await,
        Command::Kinds => cmd_kinds(&open_mirror(&config).await?, cli.format).await,
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(url) = &cli.database {
        config.database_url = url.clone();
    }
    Ok(config)
}

async fn open_mirror(config: &ServerConfig) -> anyhow::Result<SqliteMirror> {
    SqliteMirror::connect(&config.database_url)
        .await
        .with_context(|| format!("opening mirror {}", config.database_url))
}

async fn cmd_serve(mut config: ServerConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    tracing::info!(database = %config.database_url, bind = %config.bind_addr, "starting server");
    let server = RollbookServer::open(config).await?;
    server.serve().await?;
    Ok(())
}

async fn cmd_verify(mirror: &dyn LedgerMirror, format: OutputFormat) -> anyhow::Result<()> {
    let rows = mirror.all().await?;
    let report = MirrorAudit::audit(&rows);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }
    if !report.valid {
        bail!("ledger failed verification");
    }
    Ok(())
}

fn print_report(report: &AuditReport) {
    let stats = &report.statistics;
    if report.valid {
        println!("{} Ledger integrity verified", "✓".green().bold());
    } else {
        println!(
            "{} Ledger integrity broken at {} block(s)",
            "✗".red().bold(),
            report.broken_indices.len()
        );
    }
    println!("  Blocks: {}", stats.total_entries.to_string().bold());
    for (kind, count) in &stats.counts_by_kind {
        println!("    {kind}: {count}");
    }
    if let Some(first) = &stats.first_digest {
        println!("  First: {}", first.cyan());
    }
    if let Some(last) = &stats.last_digest {
        println!("  Last:  {}", last.cyan());
    }
    for issue in &report.issues {
        println!("  {} {issue}", "issue:".red());
    }
    for warning in &report.warnings {
        println!("  {} {warning}", "warning:".yellow());
    }
}

async fn cmd_chain(
    mirror: &dyn LedgerMirror,
    args: ChainArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut rows = mirror.latest(args.limit).await?;
    rows.reverse();
    print_rows(&rows, format)
}

async fn cmd_show(
    mirror: &dyn LedgerMirror,
    args: ShowArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let Some(row) = mirror.by_digest(&args.hash).await? else {
        bail!("no block with hash {}", args.hash);
    };
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&row)?),
        OutputFormat::Text => {
            println!("Block {}", row.block_index.to_string().yellow().bold());
            println!("  Kind:      {}", row.data_type.green());
            if let Some(id) = row.record_id {
                println!("  Record:    {id}");
            }
            println!("  Timestamp: {}", row.timestamp);
            println!("  Hash:      {}", row.block_hash.cyan());
            println!("  Previous:  {}", row.prev_hash.dimmed());
            if !row.data_hash.is_empty() {
                println!("  Content:   {}", row.data_hash.dimmed());
            }
        }
    }
    Ok(())
}

async fn cmd_blocks(
    mirror: &dyn LedgerMirror,
    args: BlocksArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let kind: EventKind = args.kind.parse()?;
    let rows = mirror.by_kind(kind.as_str()).await?;
    print_rows(&rows, format)
}

async fn cmd_kinds(mirror: &dyn LedgerMirror, format: OutputFormat) -> anyhow::Result<()> {
    let rows = mirror.all().await?;
    let mut counts: BTreeMap<&str, u64> =
        EventKind::ALL.iter().map(|k| (k.as_str(), 0)).collect();
    for row in &rows {
        *counts.entry(row.data_type.as_str()).or_default() += 1;
    }
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&counts)?),
        OutputFormat::Text => {
            for (kind, count) in counts {
                println!("{:<22} {}", kind, count.to_string().bold());
            }
        }
    }
    Ok(())
}

fn print_rows(rows: &[MirrorRow], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(rows)?),
        OutputFormat::Text => {
            if rows.is_empty() {
                println!("No blocks.");
            }
            for row in rows {
                let record = row
                    .record_id
                    .map(|id| format!("#{id}"))
                    .unwrap_or_default();
                println!(
                    "{:>6}  {}  {:<20} {:<6} {}",
                    row.block_index.to_string().yellow(),
                    short(&row.block_hash).cyan(),
                    row.data_type,
                    record,
                    row.timestamp.dimmed()
                );
            }
        }
    }
    Ok(())
}

fn short(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
