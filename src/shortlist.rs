//! Candidate pool for the external ranker.
//!
//! Only consulted after both direct tiers miss. The pool is bounded so the
//! prompt stays small; there is no scoring, only presence of a keyword.

use rand::Rng;

use crate::matcher::CatalogIndex;
use crate::normalize::is_thai;

fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || is_thai(c)
}

/// Split the raw query into lowercase keywords.
///
/// Falls back to the whole (trimmed, lowercased) query when splitting
/// yields nothing, e.g. a query made only of punctuation.
pub fn tokenize(raw_query: &str) -> Vec<String> {
    let tokens: Vec<String> = raw_query
        .split(|c: char| !is_token_char(c))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect();

    if tokens.is_empty() {
        let whole = raw_query.trim().to_lowercase();
        if whole.is_empty() {
            return Vec::new();
        }
        return vec![whole];
    }
    tokens
}

/// Build the bounded candidate list, as catalog positions in catalog order.
///
/// - rows matching any token, truncated to the first `max_size`;
/// - if nothing matches, `min(sample_size, len)` rows drawn uniformly at random.
pub fn shortlist<R: Rng + ?Sized>(
    index: &CatalogIndex,
    raw_query: &str,
    max_size: usize,
    sample_size: usize,
    rng: &mut R,
) -> Vec<usize> {
    let tokens = tokenize(raw_query);

    let mut matched: Vec<usize> = index
        .haystacks()
        .iter()
        .enumerate()
        .filter(|(_, hay)| tokens.iter().any(|t| hay.contains(t.as_str())))
        .map(|(i, _)| i)
        .collect();

    if matched.is_empty() {
        return random_sample(index.len(), sample_size.min(max_size), rng);
    }

    matched.truncate(max_size);
    matched
}

fn random_sample<R: Rng + ?Sized>(len: usize, amount: usize, rng: &mut R) -> Vec<usize> {
    let amount = amount.min(len);
    if amount == 0 {
        return Vec::new();
    }
    let mut picked = rand::seq::index::sample(rng, len, amount).into_vec();
    picked.sort_unstable();
    picked
}
