//! The assembled price desk: catalog cache, resolver and LLM wired from config.
//!
//! Both the CLI and the HTTP server go through [`Desk`], so a lookup
//! produces the same [`LookupReport`] whichever surface asked for it.
//!
//! The AI memory table is cached beside the catalog snapshot and expires
//! on the same `[catalog].ttl_secs`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::catalog::CatalogCache;
use crate::competitors::{competitor_links, CompetitorLink};
use crate::config::Config;
use crate::error::{CatalogError, DeskError, MemoryError};
use crate::llm::{create_provider, LlmProvider};
use crate::memory::{Attributes, MemoryStore};
use crate::models::{MatchResult, ProductRow};
use crate::nl_search::{natural_search, Filter};
use crate::pricing::{margin_table, suggested_price, Quote};
use crate::ranker::{LlmRanker, Ranker};
use crate::resolver::Resolver;

/// Everything shown for one lookup.
#[derive(Debug, Clone, Serialize)]
pub struct LookupReport {
    pub query: String,
    pub result: MatchResult,
    /// The matched row; `None` when nothing was found.
    pub product: Option<ProductRow>,
    pub attributes: Option<Attributes>,
    /// Price at the configured target margin.
    pub suggested: Option<Quote>,
    /// One quote per `[pricing].margin_table` entry.
    pub margins: Vec<Quote>,
    pub competitors: Vec<CompetitorLink>,
    pub catalog_loaded_at: DateTime<Utc>,
}

/// Result of a natural-language search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub query: String,
    /// Filters actually applied, after dropping unknown columns.
    pub filters: Vec<Filter>,
    /// Matches before the limit was applied.
    pub total: usize,
    pub products: Vec<ProductRow>,
}

/// Catalog, AI memory, resolver and LLM provider behind one handle.
pub struct Desk {
    pub config: Arc<Config>,
    pub catalog: CatalogCache,
    /// Used for filter extraction and memory harvesting. The ranker holds its own.
    pub provider: Arc<dyn LlmProvider>,
    resolver: Resolver,
    memory_ttl: Duration,
    memory: RwLock<Option<(Instant, Arc<MemoryStore>)>>,
}

impl Desk {
    /// Build from config: catalog source, LLM provider and an LLM-backed ranker.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = create_provider(&config.llm)?;
        let ranker: Arc<dyn Ranker> = Arc::new(LlmRanker::new(provider.clone()));
        let catalog = CatalogCache::from_config(&config.catalog);
        Ok(Self::new(config.clone(), catalog, provider, ranker))
    }

    pub fn new(
        config: Config,
        catalog: CatalogCache,
        provider: Arc<dyn LlmProvider>,
        ranker: Arc<dyn Ranker>,
    ) -> Self {
        let resolver = Resolver::new(ranker, &config.resolver);
        let memory_ttl = Duration::from_secs(config.catalog.ttl_secs);
        Self {
            config: Arc::new(config),
            catalog,
            provider,
            resolver,
            memory_ttl,
            memory: RwLock::new(None),
        }
    }

    /// The memory table, reread from disk once the cached copy expires.
    /// Without `[memory].path` this is an empty store.
    pub async fn memory(&self) -> Result<Arc<MemoryStore>, MemoryError> {
        if let Some((at, store)) = self.memory.read().await.as_ref() {
            if at.elapsed() < self.memory_ttl {
                return Ok(Arc::clone(store));
            }
        }

        let store = Arc::new(match &self.config.memory.path {
            Some(path) => MemoryStore::load(path).await?,
            None => MemoryStore::default(),
        });
        debug!(entries = store.len(), "memory table loaded");
        *self.memory.write().await = Some((Instant::now(), Arc::clone(&store)));
        Ok(store)
    }

    /// Drop the cached catalog snapshot and memory table.
    pub async fn invalidate(&self) {
        self.catalog.invalidate().await;
        *self.memory.write().await = None;
    }

    /// Resolve `query` and attach pricing and competitor links to the hit.
    pub async fn lookup(&self, query: &str) -> Result<LookupReport, CatalogError> {
        let snapshot = self.catalog.current().await?;
        let result = self.resolver.resolve(&snapshot, query).await;

        let product = result
            .row_index
            .and_then(|i| snapshot.catalog.get(i))
            .cloned();

        let pricing = &self.config.pricing;
        let (suggested, margins, competitors) = match &product {
            Some(row) => (
                Some(suggested_price(row.unit_cost, pricing.target_margin_pct)),
                margin_table(row.unit_cost, &pricing.margin_table),
                competitor_links(&self.config.competitors, &row.sku),
            ),
            None => (None, Vec::new(), Vec::new()),
        };

        // A broken memory file must not fail a lookup.
        let attributes = match &product {
            Some(row) => match self.memory().await {
                Ok(memory) => memory.get(&row.sku).cloned(),
                Err(e) => {
                    warn!(error = %e, "memory unavailable for lookup");
                    None
                }
            },
            None => None,
        };

        Ok(LookupReport {
            query: query.to_string(),
            result,
            product,
            attributes,
            suggested,
            margins,
            competitors,
            catalog_loaded_at: snapshot.loaded_at,
        })
    }

    /// Natural-language search over the catalog joined with AI memory.
    pub async fn search(&self, query: &str, limit: usize) -> Result<SearchReport, DeskError> {
        let snapshot = self.catalog.current().await?;
        let memory = self.memory().await?;
        let found = natural_search(
            self.provider.as_ref(),
            &snapshot.catalog,
            memory.as_ref(),
            query,
            limit,
        )
        .await;

        Ok(SearchReport {
            query: query.to_string(),
            filters: found.filters,
            total: found.total,
            products: found
                .rows
                .iter()
                .filter_map(|&i| snapshot.catalog.get(i).cloned())
                .collect(),
        })
    }
}
