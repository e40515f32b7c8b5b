//! # Price Desk
//!
//! Counter-side price checking for an appliance retailer.
//!
//! A salesperson types a product code or a free-text description (Thai or
//! English) and gets back exactly one catalog row, its cost, a suggested
//! selling price at the target margin, and search links to competitor
//! stores. Lookups go through a tiered resolver; only when the cheap
//! substring tiers miss is an external ranker (an LLM) asked to choose
//! from a shortlist.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌─────────────────────┐
//! │ CSV / Sheet │──▶│ CatalogCache │──▶│ Resolver            │
//! │  (source)   │   │ (TTL swap)   │   │ sku → desc → ranker │
//! └─────────────┘   └──────────────┘   └──────────┬──────────┘
//!                                                 │
//!                           ┌─────────────────────┤
//!                           ▼                     ▼
//!                      ┌──────────┐         ┌──────────┐
//!                      │   CLI    │         │   HTTP   │
//!                      │ (pdesk)  │         │  (axum)  │
//!                      └──────────┘         └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`normalize`] | Text normalization and numeric coercion |
//! | [`catalog`] | Catalog sources and snapshot cache |
//! | [`matcher`] | Tier 1 and 2 substring matching |
//! | [`shortlist`] | Candidate pool for the external tier |
//! | [`ranker`] | Tier 3 external ranking |
//! | [`resolver`] | The tier pipeline |
//! | [`pricing`] | Margin prices |
//! | [`competitors`] | Competitor search links |
//! | [`llm`] | LLM provider abstraction |
//! | [`memory`] | AI attribute memory |
//! | [`nl_search`] | Natural-language filter search |
//! | [`desk`] | Wiring shared by CLI and server |
//! | [`server`] | HTTP API |

pub mod catalog;
pub mod commands;
pub mod competitors;
pub mod config;
pub mod desk;
pub mod error;
pub mod llm;
pub mod matcher;
pub mod memory;
pub mod models;
pub mod nl_search;
pub mod normalize;
pub mod pricing;
pub mod ranker;
pub mod resolver;
pub mod server;
pub mod shortlist;
