//! AI memory: per-SKU attributes harvested once via the LLM and kept in a
//! CSV table (`SKU, AI_Brand, AI_Type, AI_Spec, AI_Tags`).
//!
//! The table is append-only. [`harvest`] only asks about SKUs that have no
//! entry yet, so repeated runs cost nothing once the catalog is covered.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::catalog::parse_csv;
use crate::error::MemoryError;
use crate::llm::{extract_json_block, LlmProvider};
use crate::models::{ProductCatalog, ProductRow};

pub const MEMORY_HEADERS: [&str; 5] = ["SKU", "AI_Brand", "AI_Type", "AI_Spec", "AI_Tags"];

/// Attributes remembered for one SKU.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Attributes {
    pub sku: String,
    pub brand: String,
    pub kind: String,
    pub spec: String,
    pub tags: String,
}

impl Attributes {
    /// Value for one of the `AI_*` column names.
    pub fn field(&self, column: &str) -> Option<&str> {
        match column {
            "AI_Brand" => Some(&self.brand),
            "AI_Type" => Some(&self.kind),
            "AI_Spec" => Some(&self.spec),
            "AI_Tags" => Some(&self.tags),
            _ => None,
        }
    }

    fn record(&self) -> [&str; 5] {
        [&self.sku, &self.brand, &self.kind, &self.spec, &self.tags]
    }
}

/// In-memory view of the memory table, keyed by trimmed SKU.
#[derive(Debug, Default)]
pub struct MemoryStore {
    path: Option<PathBuf>,
    entries: HashMap<String, Attributes>,
}

impl MemoryStore {
    /// Load the memory CSV. A missing file is an empty store.
    pub async fn load(path: &Path) -> Result<Self, MemoryError> {
        let read_err = |source: io::Error| MemoryError::Read {
            path: path.to_path_buf(),
            source,
        };
        if !tokio::fs::try_exists(path).await.map_err(read_err)? {
            return Ok(Self::empty_at(path));
        }
        let bytes = tokio::fs::read(path).await.map_err(read_err)?;
        Self::from_bytes(path, &bytes)
    }

    fn empty_at(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
            entries: HashMap::new(),
        }
    }

    fn from_bytes(path: &Path, bytes: &[u8]) -> Result<Self, MemoryError> {
        let mut store = Self::empty_at(path);
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(store);
        }
        let table = parse_csv(bytes).map_err(|e| MemoryError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let pos = |name: &str| table.headers.iter().position(|h| h == name);
        let cols: Vec<Option<usize>> = MEMORY_HEADERS.iter().map(|&h| pos(h)).collect();
        let get = |row: &[String], col: Option<usize>| {
            col.and_then(|c| row.get(c))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };

        for row in &table.rows {
            let row = row.as_slice();
            let attrs = Attributes {
                sku: get(row, cols[0]),
                brand: get(row, cols[1]),
                kind: get(row, cols[2]),
                spec: get(row, cols[3]),
                tags: get(row, cols[4]),
            };
            if attrs.sku.is_empty() {
                continue;
            }
            store.entries.entry(attrs.sku.clone()).or_insert(attrs);
        }
        Ok(store)
    }

    /// Attributes for `sku`, matched after trimming.
    pub fn get(&self, sku: &str) -> Option<&Attributes> {
        self.entries.get(sku.trim())
    }

    /// True once `sku` has an entry, even an all-blank one.
    pub fn contains(&self, sku: &str) -> bool {
        self.entries.contains_key(sku.trim())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Persist new entries (append) and add them to the in-memory view.
    pub fn append(&mut self, new: Vec<Attributes>) -> Result<()> {
        if new.is_empty() {
            return Ok(());
        }
        if let Some(path) = &self.path {
            append_rows(path, &new)?;
        }
        for attrs in new {
            self.entries.entry(attrs.sku.trim().to_string()).or_insert(attrs);
        }
        Ok(())
    }
}

/// Last byte of the file, or `None` when it is missing or empty.
fn last_byte(path: &Path) -> Result<Option<u8>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if file.metadata()?.len() == 0 {
        return Ok(None);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut byte = [0u8; 1];
    file.read_exact(&mut byte)?;
    Ok(Some(byte[0]))
}

fn append_rows(path: &Path, rows: &[Attributes]) -> Result<()> {
    let last = last_byte(path)
        .with_context(|| format!("Failed to inspect memory file: {}", path.display()))?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open memory file: {}", path.display()))?;

    // Start the new rows on a fresh line.
    if matches!(last, Some(b) if b != b'\n') {
        file.write_all(b"\n")?;
    }
    let needs_header = last.is_none();
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if needs_header {
        writer.write_record(MEMORY_HEADERS)?;
    }
    for row in rows {
        writer.write_record(row.record())?;
    }
    writer.flush()?;
    Ok(())
}

/// A catalog row joined with its remembered attributes (left join on SKU).
#[derive(Debug, Clone, Copy)]
pub struct EnrichedRow<'a> {
    pub index: usize,
    pub row: &'a ProductRow,
    pub attributes: Option<&'a Attributes>,
}

/// Every catalog row in order, with attributes where memory has the SKU.
pub fn merge<'a>(catalog: &'a ProductCatalog, memory: &'a MemoryStore) -> Vec<EnrichedRow<'a>> {
    catalog
        .rows()
        .iter()
        .enumerate()
        .map(|(index, row)| EnrichedRow {
            index,
            row,
            attributes: memory.get(&row.sku),
        })
        .collect()
}

// ============ Harvesting ============

/// Counts from one harvest run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    pub pending: usize,
    pub saved: usize,
    pub failed_batches: usize,
}

/// Rows whose SKU has no memory yet, one per SKU, in catalog order.
pub fn pending_rows<'a>(catalog: &'a ProductCatalog, memory: &MemoryStore) -> Vec<&'a ProductRow> {
    let mut seen = HashSet::new();
    catalog
        .rows()
        .iter()
        .filter(|r| !memory.contains(&r.sku))
        .filter(|r| seen.insert(r.sku.trim().to_string()))
        .collect()
}

/// Prompt asking for `AI_*` attributes of a batch, as a JSON array in
/// batch order.
pub fn build_extract_prompt(rows: &[&ProductRow]) -> String {
    let items: Vec<serde_json::Value> = rows
        .iter()
        .map(|r| serde_json::json!({ "sku": r.sku, "description": r.description }))
        .collect();
    let listing = serde_json::to_string(&items).unwrap_or_default();

    format!(
        "Analyse these products and extract their key attributes:\n{}\n\n\
         Reply with a JSON array only, one object per product in the same order:\n\
         [{{\"AI_Brand\": \"brand (e.g. Samsung, Toshiba)\", \
         \"AI_Type\": \"product type (e.g. ตู้เย็น, ทีวี, เครื่องซักผ้า)\", \
         \"AI_Spec\": \"headline spec (e.g. 12คิว, 55นิ้ว, ฝาบน)\", \
         \"AI_Tags\": \"search keywords (e.g. ประหยัดไฟ, 2ประตู, 4K)\"}}]",
        listing
    )
}

fn text_field(value: &serde_json::Value, key: &str) -> String {
    match &value[key] {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .collect::<Vec<_>>()
            .join(", "),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Pair an extraction reply with the batch it describes, by position.
pub fn parse_extraction(reply: &str, batch: &[&ProductRow]) -> Result<Vec<Attributes>> {
    let block = extract_json_block(reply, '[', ']')
        .ok_or_else(|| anyhow::anyhow!("no JSON array in extraction reply"))?;
    let items: Vec<serde_json::Value> =
        serde_json::from_str(&block).context("extraction reply is not a JSON array")?;

    if items.len() != batch.len() {
        warn!(
            expected = batch.len(),
            got = items.len(),
            "extraction reply length differs from batch"
        );
    }

    Ok(batch
        .iter()
        .zip(items.iter())
        .map(|(row, item)| Attributes {
            sku: row.sku.trim().to_string(),
            brand: text_field(item, "AI_Brand"),
            kind: text_field(item, "AI_Type"),
            spec: text_field(item, "AI_Spec"),
            tags: text_field(item, "AI_Tags"),
        })
        .collect())
}

/// Ask the LLM about SKUs without memory, in batches, and append the answers.
///
/// A failed batch is logged and skipped; the run continues.
pub async fn harvest(
    provider: &dyn LlmProvider,
    catalog: &ProductCatalog,
    memory: &mut MemoryStore,
    batch_size: usize,
    limit: Option<usize>,
    dry_run: bool,
) -> Result<HarvestReport> {
    let mut pending = pending_rows(catalog, memory);
    if let Some(limit) = limit {
        pending.truncate(limit);
    }
    let mut report = HarvestReport {
        pending: pending.len(),
        ..HarvestReport::default()
    };
    if dry_run || pending.is_empty() {
        return Ok(report);
    }

    for batch in pending.chunks(batch_size.max(1)) {
        let prompt = build_extract_prompt(batch);
        let attrs = match provider.complete(&prompt).await {
            Ok(reply) => parse_extraction(&reply, batch),
            Err(e) => Err(e),
        };
        match attrs {
            Ok(attrs) => {
                let n = attrs.len();
                memory.append(attrs)?;
                report.saved += n;
                info!(saved = n, "memory batch stored");
            }
            Err(e) => {
                report.failed_batches += 1;
                let error = format!("{:#}", e);
                warn!(%error, size = batch.len(), "memory batch failed");
            }
        }
    }
    Ok(report)
}
