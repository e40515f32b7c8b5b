//! CLI command bodies. Each `run_*` prints to stdout for one `pdesk` subcommand.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::desk::{Desk, LookupReport};
use crate::llm::list_models;
use crate::memory::{harvest, MemoryStore};
use crate::models::ProductRow;
use crate::pricing::format_baht;

pub async fn run_lookup(config: &Config, query: &str, json: bool) -> Result<()> {
    let desk = Desk::from_config(config)?;
    let report = desk.lookup(query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    print_lookup(&report);
    Ok(())
}

fn print_lookup(report: &LookupReport) {
    let Some(row) = &report.product else {
        println!("No product found for \"{}\".", report.query);
        return;
    };

    println!("{}  [{}]", row.sku, report.result.provenance.label());
    println!("  {}", row.description);
    if let Some(brand) = &row.brand {
        println!("  brand: {}", brand);
    }
    println!("  stock: {}", row.stock_qty);
    println!("  cost: {} ฿", format_baht(row.unit_cost));
    if let Some(q) = &report.suggested {
        println!(
            "  suggested ({}%): {} ฿  (profit {} ฿)",
            q.margin_pct,
            format_baht(q.price),
            format_baht(q.profit)
        );
    }

    if let Some(attrs) = &report.attributes {
        println!(
            "  memory: {} / {} / {} {}",
            attrs.brand, attrs.kind, attrs.spec, attrs.tags
        );
    }

    if !report.margins.is_empty() {
        println!();
        println!("  margin    price      profit");
        for q in &report.margins {
            println!(
                "  {:>4}%  {:>9}  {:>9}",
                q.margin_pct,
                format_baht(q.price),
                format_baht(q.profit)
            );
        }
    }

    if !report.competitors.is_empty() {
        println!();
        for link in &report.competitors {
            println!("  {:<14} {}", link.store, link.url);
        }
    }
}

pub async fn run_search(config: &Config, sentence: &str, limit: usize, json: bool) -> Result<()> {
    if sentence.trim().is_empty() {
        bail!("search sentence must not be empty");
    }
    let desk = Desk::from_config(config)?;
    let report = desk.search(sentence, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.filters.is_empty() {
        println!("Could not turn \"{}\" into filters.", sentence);
        return Ok(());
    }
    for f in &report.filters {
        println!("filter: {} {:?} {}", f.column, f.operator, f.value);
    }
    if report.products.is_empty() {
        println!("No results.");
        return Ok(());
    }
    println!();
    for row in &report.products {
        print_row(row);
    }
    if report.total > report.products.len() {
        println!("... {} more", report.total - report.products.len());
    }
    Ok(())
}

fn print_row(row: &ProductRow) {
    println!(
        "{:<16} {:>10} ฿  stock {:<4} {}",
        row.sku,
        format_baht(row.unit_cost),
        row.stock_qty,
        row.description
    );
}

pub async fn run_harvest(config: &Config, limit: Option<usize>, dry_run: bool) -> Result<()> {
    let Some(path) = &config.memory.path else {
        bail!("[memory].path is not configured");
    };
    if !dry_run && !config.llm.is_enabled() {
        bail!("memory harvest needs an LLM provider; set [llm].provider");
    }

    let desk = Desk::from_config(config)?;
    let snapshot = desk.catalog.current().await?;
    let mut memory = MemoryStore::load(path).await?;

    let report = harvest(
        desk.provider.as_ref(),
        &snapshot.catalog,
        &mut memory,
        config.memory.batch_size,
        limit,
        dry_run,
    )
    .await?;

    if dry_run {
        println!("{} products without memory (dry run, nothing sent)", report.pending);
    } else {
        println!(
            "{} pending, {} saved, {} failed batches",
            report.pending, report.saved, report.failed_batches
        );
    }
    Ok(())
}

pub async fn run_memory_show(config: &Config, sku: &str) -> Result<()> {
    let Some(path) = &config.memory.path else {
        bail!("[memory].path is not configured");
    };
    let memory = MemoryStore::load(path).await?;
    match memory.get(sku) {
        Some(a) => {
            println!("SKU:      {}", a.sku);
            println!("AI_Brand: {}", a.brand);
            println!("AI_Type:  {}", a.kind);
            println!("AI_Spec:  {}", a.spec);
            println!("AI_Tags:  {}", a.tags);
        }
        None => println!("No memory for {}.", sku.trim()),
    }
    Ok(())
}

pub async fn run_models(config: &Config) -> Result<()> {
    if !config.llm.is_enabled() {
        bail!("no LLM provider configured; set [llm].provider");
    }
    let models = list_models(&config.llm).await?;
    if models.is_empty() {
        println!("No models support generateContent for this key.");
    }
    for m in models {
        println!("{}", m);
    }
    Ok(())
}
