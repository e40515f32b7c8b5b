//! Tiered lookup: decides which single catalog row a query meant.
//!
//! ```text
//! START → TIER1 (sku) ──hit──▶ SKU_EXACT
//!           │ miss
//!           ▼
//!         TIER2 (description) ──hit──▶ DESCRIPTION_MATCH
//!           │ miss
//!           ▼
//!         SHORTLIST → TIER3 (external) ──hit──▶ EXTERNAL_RESOLVED
//!                                        └─miss─▶ NOT_FOUND
//! ```
//!
//! Each tier runs at most once. Within a tier the lowest catalog index wins;
//! a SKU hit pre-empts any description hit, however weak the SKU match is.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::catalog::CatalogSnapshot;
use crate::config::ResolverConfig;
use crate::matcher::{match_by_description, match_by_sku};
use crate::models::{Candidate, MatchResult, Provenance};
use crate::normalize::normalize;
use crate::ranker::{resolve_externally, Ranker};
use crate::shortlist::shortlist;

/// Runs the tier pipeline against a catalog snapshot.
pub struct Resolver {
    ranker: Arc<dyn Ranker>,
    shortlist_max: usize,
    random_sample: usize,
    timeout: Duration,
}

impl Resolver {
    pub fn new(ranker: Arc<dyn Ranker>, config: &ResolverConfig) -> Self {
        Self {
            ranker,
            shortlist_max: config.shortlist_max,
            random_sample: config.random_sample,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Resolve `query` using the thread-local RNG for the fallback sample.
    pub async fn resolve(&self, snapshot: &CatalogSnapshot, query: &str) -> MatchResult {
        let candidates = match self.direct_match(snapshot, query) {
            Direct::Done(result) => return result,
            Direct::Shortlist => {
                let mut rng = rand::thread_rng();
                self.candidates(snapshot, query, &mut rng)
            }
        };
        self.external(query, &candidates).await
    }

    /// Like [`resolve`](Self::resolve) but with a caller-supplied RNG.
    pub async fn resolve_with_rng<R: Rng + ?Sized>(
        &self,
        snapshot: &CatalogSnapshot,
        query: &str,
        rng: &mut R,
    ) -> MatchResult {
        let candidates = match self.direct_match(snapshot, query) {
            Direct::Done(result) => return result,
            Direct::Shortlist => self.candidates(snapshot, query, rng),
        };
        self.external(query, &candidates).await
    }

    fn direct_match(&self, snapshot: &CatalogSnapshot, query: &str) -> Direct {
        if query.trim().is_empty() {
            return Direct::Done(MatchResult::not_found());
        }

        let nq = normalize(query);
        // An empty pattern would match every row; only the shortlist can help.
        if nq.is_empty() {
            debug!(query, "query has no matchable characters");
            return Direct::Shortlist;
        }

        if let Some(&row) = match_by_sku(&snapshot.index, &nq).first() {
            info!(query, row, "resolved by sku");
            return Direct::Done(MatchResult::hit(row, Provenance::SkuExact));
        }
        if let Some(&row) = match_by_description(&snapshot.index, &nq).first() {
            info!(query, row, "resolved by description");
            return Direct::Done(MatchResult::hit(row, Provenance::DescriptionMatch));
        }
        Direct::Shortlist
    }

    fn candidates<R: Rng + ?Sized>(
        &self,
        snapshot: &CatalogSnapshot,
        query: &str,
        rng: &mut R,
    ) -> Vec<Candidate> {
        let pool = shortlist(
            &snapshot.index,
            query,
            self.shortlist_max,
            self.random_sample,
            rng,
        );
        debug!(query, pool = pool.len(), "shortlist built");
        pool.into_iter()
            .filter_map(|i| snapshot.catalog.get(i).map(|row| Candidate::from_row(i, row)))
            .collect()
    }

    async fn external(&self, query: &str, candidates: &[Candidate]) -> MatchResult {
        match resolve_externally(self.ranker.as_ref(), query, candidates, self.timeout).await {
            Some(row) => {
                info!(query, row, "resolved by external ranker");
                MatchResult::hit(row, Provenance::ExternalResolved)
            }
            None => {
                info!(query, "no match");
                MatchResult::not_found()
            }
        }
    }
}

enum Direct {
    Done(MatchResult),
    Shortlist,
}
