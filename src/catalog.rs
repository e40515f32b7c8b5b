//! Catalog sources and the TTL-bounded snapshot cache.
//!
//! A [`CatalogSource`] yields a raw [`Table`] (header row + string cells).
//! [`build_catalog`] turns it into typed [`ProductRow`]s, coercing numeric
//! cells once. [`CatalogCache`] keeps one immutable [`CatalogSnapshot`] and
//! replaces it wholesale when the TTL expires: readers holding the old
//! `Arc` keep using it until they finish.
//!
//! # Sources
//!
//! | Source | `catalog.source` value |
//! |--------|------------------------|
//! | [`CsvFileSource`] | a local path, e.g. `data/products.csv` |
//! | [`HttpCsvSource`] | an `http(s)://` CSV export URL; Google Sheets edit links are rewritten to their CSV export |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::{CatalogConfig, ColumnConfig};
use crate::error::CatalogError;
use crate::matcher::CatalogIndex;
use crate::models::{ProductCatalog, ProductRow};
use crate::normalize::{parse_numeric, parse_quantity};

/// Raw tabular data as delivered by a source.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Last modification time reported by the source, if any.
    pub modified: Option<DateTime<Utc>>,
}

/// Something that can produce the product table.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Human-readable origin shown next to results (file name or URL).
    fn label(&self) -> String;

    async fn fetch(&self) -> Result<Table, CatalogError>;
}

/// Pick a source for `catalog.source`.
pub fn source_from_config(config: &CatalogConfig) -> Box<dyn CatalogSource> {
    let source = config.source.trim();
    if source.starts_with("http://") || source.starts_with("https://") {
        Box::new(HttpCsvSource::new(
            source,
            Duration::from_secs(config.fetch_timeout_secs),
        ))
    } else {
        Box::new(CsvFileSource::new(source))
    }
}

/// Parse CSV bytes into a [`Table`]. Short rows are allowed.
pub fn parse_csv(bytes: &[u8]) -> Result<Table, CatalogError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(CatalogError::Empty);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table {
        headers,
        rows,
        modified: None,
    })
}

// ============ Local CSV ============

pub struct CsvFileSource {
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for CsvFileSource {
    fn label(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    async fn fetch(&self) -> Result<Table, CatalogError> {
        let read_err = |source| CatalogError::Read {
            path: self.path.display().to_string(),
            source,
        };
        let bytes = tokio::fs::read(&self.path).await.map_err(read_err)?;
        let modified = tokio::fs::metadata(&self.path)
            .await
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        let mut table = parse_csv(&bytes)?;
        table.modified = modified;
        Ok(table)
    }
}

// ============ HTTP CSV export ============

pub struct HttpCsvSource {
    url: String,
    timeout: Duration,
}

impl HttpCsvSource {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            url: sheet_export_url(url),
            timeout,
        }
    }
}

/// Rewrite a Google Sheets link (`.../spreadsheets/d/<id>/edit...`) to its
/// CSV export URL. Other URLs pass through unchanged.
pub fn sheet_export_url(url: &str) -> String {
    const MARKER: &str = "docs.google.com/spreadsheets/d/";
    if url.contains("/export") {
        return url.to_string();
    }
    match url.split_once(MARKER) {
        Some((_, rest)) => {
            let id = rest.split(['/', '?', '#']).next().unwrap_or(rest);
            format!("https://{}{}/export?format=csv", MARKER, id)
        }
        None => url.to_string(),
    }
}

#[async_trait]
impl CatalogSource for HttpCsvSource {
    fn label(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<Table, CatalogError> {
        let fetch_err = |message: String| CatalogError::Fetch {
            url: self.url.clone(),
            message,
        };

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| fetch_err(e.to_string()))?;
        let response = client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {}", status)));
        }

        let modified = response
            .headers()
            .get(reqwest::header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        let mut table = parse_csv(&bytes)?;
        table.modified = modified;
        Ok(table)
    }
}

// ============ Row building ============

fn column_position(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name.trim())
}

fn required_column(headers: &[String], name: &str) -> Result<usize, CatalogError> {
    column_position(headers, name).ok_or_else(|| CatalogError::MissingColumn(name.to_string()))
}

fn optional_column(headers: &[String], name: &str) -> Option<usize> {
    let pos = column_position(headers, name);
    if pos.is_none() {
        warn!(column = name, "catalog column missing; values default to zero");
    }
    pos
}

/// Map a raw table onto typed rows.
///
/// SKU and description columns are required. Invalid cost or stock cells
/// become zero; rows with a blank SKU are skipped.
pub fn build_catalog(table: &Table, columns: &ColumnConfig) -> Result<ProductCatalog, CatalogError> {
    let headers = &table.headers;
    let sku_col = required_column(headers, &columns.sku)?;
    let desc_col = required_column(headers, &columns.description)?;
    let cost_col = optional_column(headers, &columns.unit_cost);
    let stock_col = optional_column(headers, &columns.stock_qty);
    let brand_col = columns
        .brand
        .as_deref()
        .and_then(|b| column_position(headers, b));

    let mut rows = Vec::with_capacity(table.rows.len());
    let mut skipped = 0usize;
    let mut coerced = 0usize;

    for (line, raw) in table.rows.iter().enumerate() {
        let cell = |pos: usize| raw.get(pos).map(|s| s.trim()).unwrap_or("");

        let sku = cell(sku_col);
        if sku.is_empty() {
            skipped += 1;
            continue;
        }

        let unit_cost = match cost_col.map(cell) {
            Some(v) => parse_numeric(v).unwrap_or_else(|e| {
                debug!(row = line + 2, error = %e, "unit cost defaulted to zero");
                coerced += 1;
                Decimal::ZERO
            }),
            None => Decimal::ZERO,
        };
        let stock_qty = match stock_col.map(cell) {
            Some(v) => parse_quantity(v).unwrap_or_else(|e| {
                debug!(row = line + 2, error = %e, "stock defaulted to zero");
                coerced += 1;
                0
            }),
            None => 0,
        };
        let brand = brand_col
            .map(cell)
            .filter(|b| !b.is_empty())
            .map(str::to_string);

        let cells = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), raw.get(i).cloned().unwrap_or_default()))
            .collect();

        rows.push(ProductRow {
            sku: sku.to_string(),
            description: cell(desc_col).to_string(),
            unit_cost,
            stock_qty,
            brand,
            cells,
        });
    }

    if skipped > 0 {
        warn!(skipped, "catalog rows without a SKU were skipped");
    }
    if coerced > 0 {
        debug!(coerced, "numeric cells coerced to zero");
    }

    Ok(ProductCatalog::new(rows))
}

// ============ Snapshot + cache ============

/// One immutable load of the product table plus its precomputed index.
#[derive(Debug)]
pub struct CatalogSnapshot {
    pub catalog: ProductCatalog,
    pub index: CatalogIndex,
    pub source: String,
    pub loaded_at: DateTime<Utc>,
    pub source_modified: Option<DateTime<Utc>>,
}

impl CatalogSnapshot {
    pub fn new(catalog: ProductCatalog, source: impl Into<String>) -> Self {
        let index = CatalogIndex::build(&catalog);
        Self {
            catalog,
            index,
            source: source.into(),
            loaded_at: Utc::now(),
            source_modified: None,
        }
    }
}

/// Holds the current snapshot and swaps in a fresh one after `ttl`.
pub struct CatalogCache {
    source: Box<dyn CatalogSource>,
    columns: ColumnConfig,
    ttl: Duration,
    slot: RwLock<Option<(Instant, Arc<CatalogSnapshot>)>>,
    reload: Mutex<()>,
}

impl CatalogCache {
    pub fn new(source: Box<dyn CatalogSource>, columns: ColumnConfig, ttl: Duration) -> Self {
        Self {
            source,
            columns,
            ttl,
            slot: RwLock::new(None),
            reload: Mutex::new(()),
        }
    }

    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(
            source_from_config(config),
            config.columns.clone(),
            Duration::from_secs(config.ttl_secs),
        )
    }

    async fn fresh(&self) -> Option<Arc<CatalogSnapshot>> {
        let slot = self.slot.read().await;
        match slot.as_ref() {
            Some((at, snap)) if at.elapsed() < self.ttl => Some(Arc::clone(snap)),
            _ => None,
        }
    }

    /// The current snapshot, loading a new one if missing or expired.
    pub async fn current(&self) -> Result<Arc<CatalogSnapshot>, CatalogError> {
        if let Some(snap) = self.fresh().await {
            return Ok(snap);
        }

        let _guard = self.reload.lock().await;
        // Another caller may have reloaded while we waited.
        if let Some(snap) = self.fresh().await {
            return Ok(snap);
        }

        let snap = Arc::new(self.load().await?);
        *self.slot.write().await = Some((Instant::now(), Arc::clone(&snap)));
        Ok(snap)
    }

    async fn load(&self) -> Result<CatalogSnapshot, CatalogError> {
        let table = self.source.fetch().await?;
        let catalog = build_catalog(&table, &self.columns)?;
        info!(
            source = %self.source.label(),
            rows = catalog.len(),
            "catalog snapshot loaded"
        );
        let mut snap = CatalogSnapshot::new(catalog, self.source.label());
        snap.source_modified = table.modified;
        Ok(snap)
    }

    /// Drop the cached snapshot so the next call reloads.
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }
}
