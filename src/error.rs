//! Error taxonomy for catalog loading and lookup.
//!
//! | Error | Class | Effect on a lookup |
//! |-------|-------|--------------------|
//! | [`CatalogError`] | infrastructure | fatal, surfaced to the caller |
//! | [`MemoryError`] | AI memory table | lookup drops attributes, search fails |
//! | [`ResolveError`] | Tier-3 failure | mapped to `NOT_FOUND` |
//! | [`ParseError`] | bad numeric cell | value defaults to zero |

use std::path::PathBuf;
use thiserror::Error;

/// The product table could not be loaded. Distinct from "no such product".
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch catalog from {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("malformed catalog CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("catalog is missing required column '{0}'")]
    MissingColumn(String),

    #[error("catalog source returned no header row")]
    Empty,
}

/// The AI memory table could not be read. Never a catalog outage.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("failed to read memory file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV was unreadable. Only the message of the underlying
    /// parse failure is kept.
    #[error("failed to parse memory file {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },
}

/// A desk operation failed before it could produce a report.
#[derive(Debug, Error)]
pub enum DeskError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Why the external ranking collaborator produced no usable answer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("resolver unavailable: {0}")]
    ResolverUnavailable(String),

    #[error("resolver timed out after {0}s")]
    Timeout(u64),

    #[error("malformed resolver response: {0:?}")]
    MalformedResolverResponse(String),

    #[error("resolver returned index {0} which is not in the candidate set")]
    OutOfRange(i64),
}

impl ResolveError {
    /// Short tag used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ResolverUnavailable(_) => "resolver_unavailable",
            Self::Timeout(_) => "timeout",
            Self::MalformedResolverResponse(_) => "malformed_response",
            Self::OutOfRange(_) => "out_of_range",
        }
    }
}

/// A numeric cell that could not be coerced.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot parse {value:?} as a non-negative number")]
pub struct ParseError {
    pub value: String,
}
