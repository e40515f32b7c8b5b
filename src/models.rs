//! Core data models shared by the resolver, pricing, and presentation layers.

use rust_decimal::Decimal;
use serde::Serialize;

/// One catalog entry. Numeric fields are coerced once at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRow {
    pub sku: String,
    pub description: String,
    pub unit_cost: Decimal,
    pub stock_qty: u64,
    pub brand: Option<String>,
    /// Every raw cell of the source row as `(header, value)`, in column order.
    #[serde(skip)]
    pub cells: Vec<(String, String)>,
}

impl ProductRow {
    pub fn new(sku: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            description: description.into(),
            unit_cost: Decimal::ZERO,
            stock_qty: 0,
            brand: None,
            cells: Vec::new(),
        }
    }

    /// All columns concatenated, used by the shortlister.
    ///
    /// Falls back to the typed fields when the row was built without raw cells.
    pub fn serialized_fields(&self) -> String {
        if !self.cells.is_empty() {
            return self
                .cells
                .iter()
                .map(|(_, v)| v.as_str())
                .collect::<Vec<_>>()
                .join(" ");
        }
        let mut out = format!(
            "{} {} {} {}",
            self.sku, self.description, self.unit_cost, self.stock_qty
        );
        if let Some(brand) = &self.brand {
            out.push(' ');
            out.push_str(brand);
        }
        out
    }

    /// Raw value of a named column, if the source had one.
    pub fn cell(&self, header: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }
}

/// Ordered rows; the position is the index the resolver and ranker exchange.
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    rows: Vec<ProductRow>,
}

impl ProductCatalog {
    pub fn new(rows: Vec<ProductRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[ProductRow] {
        &self.rows
    }

    pub fn get(&self, index: usize) -> Option<&ProductRow> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl FromIterator<ProductRow> for ProductCatalog {
    fn from_iter<I: IntoIterator<Item = ProductRow>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Which tier produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Provenance {
    SkuExact,
    DescriptionMatch,
    ExternalResolved,
    NotFound,
}

impl Provenance {
    /// Trust signal shown next to a result.
    pub fn label(self) -> &'static str {
        match self {
            Self::SkuExact => "found via product code",
            Self::DescriptionMatch => "found via description",
            Self::ExternalResolved => "AI guess, please verify",
            Self::NotFound => "not found",
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::SkuExact => "SKU_EXACT",
            Self::DescriptionMatch => "DESCRIPTION_MATCH",
            Self::ExternalResolved => "EXTERNAL_RESOLVED",
            Self::NotFound => "NOT_FOUND",
        };
        f.write_str(tag)
    }
}

/// Outcome of one lookup. Created fresh per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub found: bool,
    pub row_index: Option<usize>,
    pub provenance: Provenance,
}

impl MatchResult {
    pub fn hit(row_index: usize, provenance: Provenance) -> Self {
        Self {
            found: true,
            row_index: Some(row_index),
            provenance,
        }
    }

    pub fn not_found() -> Self {
        Self {
            found: false,
            row_index: None,
            provenance: Provenance::NotFound,
        }
    }
}

/// What the external ranker is shown for each shortlisted row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub index: usize,
    pub sku: String,
    pub description: String,
}

impl Candidate {
    pub fn from_row(index: usize, row: &ProductRow) -> Self {
        Self {
            index,
            sku: row.sku.clone(),
            description: row.description.clone(),
        }
    }
}
