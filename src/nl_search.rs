//! Natural-language search: a sentence becomes field filters.
//!
//! The LLM is asked to translate the sentence into
//! `{"filters": [{"column", "operator", "value"}]}`. Price bounds written
//! in the sentence ("ไม่เกิน 10,000", "under 5k", "5000-9000") are also
//! extracted locally so a range still applies when the LLM is disabled or
//! leaves it out. Filters are ANDed over the catalog joined with AI memory.

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::llm::{extract_json_block, LlmProvider};
use crate::memory::{merge, EnrichedRow, MemoryStore, MEMORY_HEADERS};
use crate::models::ProductCatalog;
use crate::normalize::parse_numeric;

/// Column name the local price extraction filters on.
pub const COST_COLUMN: &str = "unit_cost";

const TYPED_COLUMNS: [&str; 5] = ["sku", "description", COST_COLUMN, "stock_qty", "brand"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Contains,
    #[serde(alias = "=", alias = "==", alias = "eq")]
    Equals,
    #[serde(alias = ">")]
    Gt,
    #[serde(alias = "<")]
    Lt,
    #[serde(alias = ">=", alias = "ge")]
    Gte,
    #[serde(alias = "<=", alias = "le")]
    Lte,
}

impl Operator {
    fn is_numeric(self) -> bool {
        matches!(self, Self::Gt | Self::Lt | Self::Gte | Self::Lte)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub operator: Operator,
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
}

impl Filter {
    pub fn new(column: &str, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            column: column.to_string(),
            operator,
            value: value.into(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct FilterReply {
    #[serde(default)]
    filters: Vec<Filter>,
}

/// Every column a filter may name: typed fields, raw sheet headers, memory fields.
pub fn available_columns(catalog: &ProductCatalog) -> Vec<String> {
    let mut columns: Vec<String> = TYPED_COLUMNS.iter().map(|c| c.to_string()).collect();
    if let Some(first) = catalog.rows().first() {
        columns.extend(first.cells.iter().map(|(h, _)| h.clone()));
    }
    columns.extend(MEMORY_HEADERS.iter().skip(1).map(|c| c.to_string()));
    let mut seen = std::collections::HashSet::new();
    columns.retain(|c| seen.insert(c.clone()));
    columns
}

/// Prompt asking the LLM to turn `query` into `{"filters": [...]}` over
/// `columns`.
pub fn build_filter_prompt(query: &str, columns: &[String]) -> String {
    format!(
        "You are a data analyst. Translate the question \"{}\" into filters over a product table.\n\n\
         Available columns: {}\n\n\
         Reply with JSON only:\n\
         {{\"filters\": [{{\"column\": \"col_name\", \"operator\": \"contains|equals|gt|lt\", \"value\": \"val\"}}]}}\n\n\
         Notes:\n\
         - use gt or lt for prices and other numbers\n\
         - use contains for text",
        query,
        columns.join(", ")
    )
}

/// Parse a filter reply. Anything unusable yields an error.
pub fn parse_filters(reply: &str) -> anyhow::Result<Vec<Filter>> {
    let block = extract_json_block(reply, '{', '}')
        .ok_or_else(|| anyhow::anyhow!("no JSON object in filter reply"))?;
    let parsed: FilterReply = serde_json::from_str(&block)?;
    Ok(parsed.filters)
}

/// Ask the LLM for filters. Failure is logged and yields no filters.
pub async fn ask_filters(provider: &dyn LlmProvider, query: &str, columns: &[String]) -> Vec<Filter> {
    let prompt = build_filter_prompt(query, columns);
    let reply = match provider.complete(&prompt).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "filter translation unavailable");
            return Vec::new();
        }
    };
    match parse_filters(&reply) {
        Ok(filters) => filters,
        Err(e) => {
            warn!(error = %e, "malformed filter reply");
            Vec::new()
        }
    }
}

// ============ Local price range extraction ============

const NUM: &str = r"(\d[\d,]*(?:\.\d+)?)\s*(k)?";

static RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i){}\s*(?:-|–|ถึง|to)\s*{}", NUM, NUM)).expect("valid range regex")
});

static UPPER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:ไม่เกิน|ต่ำกว่า|น้อยกว่า|ถูกกว่า|\b(?:under|below|less than|at most)|<=?)\s*{}",
        NUM
    ))
    .expect("valid upper-bound regex")
});

static LOWER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?:มากกว่า|สูงกว่า|เกิน|\b(?:over|above|more than|at least)|>=?)\s*{}",
        NUM
    ))
    .expect("valid lower-bound regex")
});

static FLOOR_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i){}\s*(?:บาท\s*)?ขึ้นไป", NUM)).expect("valid floor regex")
});

/// Inclusive price bounds found in a sentence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriceRange {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

impl PriceRange {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn to_filters(self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if let Some(min) = self.min {
            filters.push(Filter::new(COST_COLUMN, Operator::Gte, min.to_string()));
        }
        if let Some(max) = self.max {
            filters.push(Filter::new(COST_COLUMN, Operator::Lte, max.to_string()));
        }
        filters
    }
}

fn amount(number: &str, thousands: Option<regex::Match<'_>>) -> Option<Decimal> {
    let value = parse_numeric(number).ok()?;
    Some(match thousands {
        Some(_) => value * Decimal::ONE_THOUSAND,
        None => value,
    })
}

/// Pull price bounds out of free text. Plain numbers without a bound word
/// (e.g. "12000 BTU") are left alone.
pub fn extract_price_range(query: &str) -> PriceRange {
    let mut range = PriceRange::default();

    // "ไม่เกิน" contains "เกิน", so upper bounds are taken first and their
    // spans excluded from the lower-bound scan.
    let mut taken: Vec<(usize, usize)> = Vec::new();
    if let Some(c) = UPPER.captures(query) {
        range.max = amount(&c[1], c.get(2));
        if let Some(m) = c.get(0) {
            taken.push((m.start(), m.end()));
        }
    }
    let overlaps = |s: usize, e: usize| taken.iter().any(|(ts, te)| s < *te && *ts < e);

    if let Some(c) = LOWER
        .captures_iter(query)
        .find(|c| c.get(0).is_some_and(|m| !overlaps(m.start(), m.end())))
    {
        range.min = amount(&c[1], c.get(2));
    } else if let Some(c) = FLOOR_SUFFIX.captures(query) {
        range.min = amount(&c[1], c.get(2));
    }

    if range.is_empty() {
        if let Some(c) = RANGE.captures(query) {
            let lo = amount(&c[1], c.get(2));
            let hi = amount(&c[3], c.get(4));
            // Model codes like "RT20-25" are not prices.
            let plausible = |v: &Option<Decimal>| v.is_some_and(|d| d >= Decimal::ONE_HUNDRED);
            if plausible(&lo) && plausible(&hi) {
                range.min = lo.min(hi);
                range.max = lo.max(hi);
            }
        }
    }
    range
}

// ============ Filter application ============

fn column_value(row: &EnrichedRow<'_>, column: &str) -> Option<String> {
    if column.starts_with("AI_") {
        return row
            .attributes
            .and_then(|a| a.field(column))
            .map(str::to_string);
    }
    match column {
        "sku" => Some(row.row.sku.clone()),
        "description" => Some(row.row.description.clone()),
        COST_COLUMN => Some(row.row.unit_cost.to_string()),
        "stock_qty" => Some(row.row.stock_qty.to_string()),
        "brand" => row
            .row
            .brand
            .clone()
            .or_else(|| row.attributes.map(|a| a.brand.clone())),
        other => row.row.cell(other).map(str::to_string),
    }
}

fn matches(row: &EnrichedRow<'_>, filter: &Filter) -> bool {
    let Some(actual) = column_value(row, &filter.column) else {
        return false;
    };

    if filter.operator.is_numeric() {
        let (Ok(lhs), Ok(rhs)) = (parse_numeric(&actual), parse_numeric(&filter.value)) else {
            return false;
        };
        return match filter.operator {
            Operator::Gt => lhs > rhs,
            Operator::Lt => lhs < rhs,
            Operator::Gte => lhs >= rhs,
            Operator::Lte => lhs <= rhs,
            Operator::Contains | Operator::Equals => false,
        };
    }

    let actual = actual.trim().to_lowercase();
    let wanted = filter.value.trim().to_lowercase();
    match filter.operator {
        Operator::Contains => actual.contains(&wanted),
        _ => actual == wanted,
    }
}

/// Keep rows that satisfy every filter.
pub fn apply_filters<'a>(rows: &[EnrichedRow<'a>], filters: &[Filter]) -> Vec<EnrichedRow<'a>> {
    rows.iter()
        .filter(|row| filters.iter().all(|f| matches(row, f)))
        .copied()
        .collect()
}

/// Result of one natural-language search.
#[derive(Debug, Clone, Serialize)]
pub struct NaturalSearch {
    pub filters: Vec<Filter>,
    /// Catalog positions of matching rows, in catalog order.
    pub rows: Vec<usize>,
    pub total: usize,
}

/// Translate `query` into filters and run them over the catalog.
///
/// With no usable filter the result is empty rather than the whole catalog.
pub async fn natural_search(
    provider: &dyn LlmProvider,
    catalog: &ProductCatalog,
    memory: &MemoryStore,
    query: &str,
    limit: usize,
) -> NaturalSearch {
    let columns = available_columns(catalog);
    let mut filters = ask_filters(provider, query, &columns).await;

    let has_price = filters
        .iter()
        .any(|f| f.operator.is_numeric() && f.column == COST_COLUMN);
    if !has_price {
        filters.extend(extract_price_range(query).to_filters());
    }

    filters.retain(|f| {
        let known = columns.iter().any(|c| c == &f.column);
        if !known {
            warn!(column = %f.column, "dropping filter on unknown column");
        }
        known
    });
    debug!(?filters, "natural search filters");

    if filters.is_empty() {
        return NaturalSearch {
            filters,
            rows: Vec::new(),
            total: 0,
        };
    }

    let merged = merge(catalog, memory);
    let hits = apply_filters(&merged, &filters);
    let total = hits.len();
    NaturalSearch {
        filters,
        rows: hits.iter().take(limit).map(|r| r.index).collect(),
        total,
    }
}
