//! Tier 3: ask an external ranking collaborator to pick one candidate.
//!
//! The collaborator only sees `index | sku | description` lines and must
//! reply with a single index from that set, or `-1` for "no match".
//! Every failure (call error, timeout, unparseable or out-of-range reply)
//! goes through [`ResolveError`] and is mapped to "not found" in one place,
//! [`resolve_externally`]. Nothing is retried here.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ResolveError;
use crate::llm::{strip_code_fences, LlmProvider};
use crate::models::Candidate;

/// Sentinel a ranker returns when nothing fits.
pub const NO_MATCH: i64 = -1;

/// An opaque collaborator that returns raw text naming one candidate index.
#[async_trait]
pub trait Ranker: Send + Sync {
    async fn rank(&self, query: &str, candidates: &[Candidate]) -> Result<String>;
}

/// [`Ranker`] backed by an [`LlmProvider`] prompt.
pub struct LlmRanker {
    provider: Arc<dyn LlmProvider>,
}

impl LlmRanker {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Ranker for LlmRanker {
    async fn rank(&self, query: &str, candidates: &[Candidate]) -> Result<String> {
        let prompt = build_prompt(query, candidates);
        self.provider.complete(&prompt).await
    }
}

/// Render the ranking prompt. Only index, SKU and description are sent.
pub fn build_prompt(query: &str, candidates: &[Candidate]) -> String {
    let listing: String = candidates
        .iter()
        .map(|c| format!("{} | {} | {}\n", c.index, c.sku, c.description))
        .collect();

    format!(
        "You are a product lookup assistant. Find the row that best matches the search query.\n\n\
         Query: \"{}\"\n\n\
         Products (index | code | description):\n{}\n\
         Reply with only the index number of the single best row. If none match, reply {}.",
        query, listing, NO_MATCH
    )
}

/// Parse a ranker reply into a candidate index.
///
/// `Ok(None)` is an explicit "no match"; any other unusable reply is an error.
pub fn parse_reply(reply: &str, candidates: &[Candidate]) -> Result<Option<usize>, ResolveError> {
    let cleaned = strip_code_fences(reply);
    let value: i64 = cleaned
        .trim_matches(|c: char| c.is_whitespace() || c == '.' || c == '"' || c == '`')
        .parse()
        .map_err(|_| ResolveError::MalformedResolverResponse(reply.trim().to_string()))?;

    if value == NO_MATCH {
        return Ok(None);
    }

    let index = usize::try_from(value).map_err(|_| ResolveError::OutOfRange(value))?;
    if candidates.iter().any(|c| c.index == index) {
        Ok(Some(index))
    } else {
        Err(ResolveError::OutOfRange(value))
    }
}

async fn try_resolve(
    ranker: &dyn Ranker,
    query: &str,
    candidates: &[Candidate],
    timeout: Duration,
) -> Result<Option<usize>, ResolveError> {
    let reply = tokio::time::timeout(timeout, ranker.rank(query, candidates))
        .await
        .map_err(|_| ResolveError::Timeout(timeout.as_secs()))?
        .map_err(|e| ResolveError::ResolverUnavailable(format!("{:#}", e)))?;

    debug!(reply = %reply.trim(), "ranker replied");
    parse_reply(&reply, candidates)
}

/// Run Tier 3 once. Returns the chosen catalog index or `None`.
///
/// An empty candidate set returns `None` without calling the ranker.
pub async fn resolve_externally(
    ranker: &dyn Ranker,
    query: &str,
    candidates: &[Candidate],
    timeout: Duration,
) -> Option<usize> {
    if candidates.is_empty() {
        debug!("no candidates; skipping external ranker");
        return None;
    }

    match try_resolve(ranker, query, candidates, timeout).await {
        Ok(found) => found,
        Err(e) => {
            warn!(kind = e.kind(), error = %e, "external ranker miss");
            None
        }
    }
}
