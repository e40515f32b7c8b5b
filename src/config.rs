//! TOML configuration parsing and validation.
//!
//! Every section has serde defaults so a minimal file only needs
//! `[catalog] source = "..."`. [`load_config`] rejects values that would
//! make the resolver or pricing misbehave.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default = "default_competitors")]
    pub competitors: Vec<CompetitorConfig>,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    /// Local CSV path or an `http(s)://` CSV export URL.
    pub source: String,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default)]
    pub columns: ColumnConfig,
}

fn default_ttl_secs() -> u64 {
    600
}
fn default_fetch_timeout_secs() -> u64 {
    30
}

/// Header names of the catalog sheet.
#[derive(Debug, Deserialize, Clone)]
pub struct ColumnConfig {
    #[serde(default = "default_sku_column")]
    pub sku: String,
    #[serde(default = "default_description_column")]
    pub description: String,
    #[serde(default = "default_cost_column")]
    pub unit_cost: String,
    #[serde(default = "default_stock_column")]
    pub stock_qty: String,
    #[serde(default)]
    pub brand: Option<String>,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            sku: default_sku_column(),
            description: default_description_column(),
            unit_cost: default_cost_column(),
            stock_qty: default_stock_column(),
            brand: None,
        }
    }
}

fn default_sku_column() -> String {
    "รหัสสินค้า".to_string()
}
fn default_description_column() -> String {
    "รายละเอียดสินค้า".to_string()
}
fn default_cost_column() -> String {
    "ราคาทุนต่อหน่วย".to_string()
}
fn default_stock_column() -> String {
    "จำนวนสต้อก".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResolverConfig {
    #[serde(default = "default_shortlist_max")]
    pub shortlist_max: usize,
    #[serde(default = "default_random_sample")]
    pub random_sample: usize,
    #[serde(default = "default_resolver_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            shortlist_max: default_shortlist_max(),
            random_sample: default_random_sample(),
            timeout_secs: default_resolver_timeout_secs(),
        }
    }
}

fn default_shortlist_max() -> usize {
    30
}
fn default_random_sample() -> usize {
    15
}
fn default_resolver_timeout_secs() -> u64 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: Option<String>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            timeout_secs: default_llm_timeout_secs(),
            api_key_env: default_api_key_env(),
            endpoint: default_endpoint(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_model() -> Option<String> {
    Some("gemini-1.5-flash".to_string())
}
fn default_llm_timeout_secs() -> u64 {
    30
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingConfig {
    #[serde(default = "default_target_margin")]
    pub target_margin_pct: u32,
    #[serde(default = "default_margin_table")]
    pub margin_table: Vec<u32>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            target_margin_pct: default_target_margin(),
            margin_table: default_margin_table(),
        }
    }
}

fn default_target_margin() -> u32 {
    12
}
fn default_margin_table() -> Vec<u32> {
    vec![3, 5, 7, 9, 12, 15]
}

/// A competitor store whose search page takes the SKU via `{q}`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CompetitorConfig {
    pub name: String,
    pub url_template: String,
}

fn default_competitors() -> Vec<CompetitorConfig> {
    [
        ("HomePro", "https://www.homepro.co.th/search?q={q}"),
        ("PowerBuy", "https://www.powerbuy.co.th/th/search/{q}"),
        ("ThaiWatsadu", "https://www.thaiwatsadu.com/th/search/{q}"),
        ("Big C", "https://www.bigc.co.th/search?q={q}"),
        ("Global House", "https://globalhouse.co.th/search?keyword={q}"),
        ("Makro", "https://www.makro.pro/c/search?q={q}"),
        ("Dohome", "https://www.dohome.co.th/search?q={q}"),
    ]
    .into_iter()
    .map(|(name, url)| CompetitorConfig {
        name: name.to_string(),
        url_template: url.to_string(),
    })
    .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_memory_batch")]
    pub batch_size: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            batch_size: default_memory_batch(),
        }
    }
}

fn default_memory_batch() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)?;
    validate(&config)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

fn validate(config: &Config) -> Result<()> {
    if config.catalog.source.trim().is_empty() {
        anyhow::bail!("catalog.source must not be empty");
    }
    if config.catalog.ttl_secs == 0 {
        anyhow::bail!("catalog.ttl_secs must be > 0");
    }

    if config.resolver.shortlist_max == 0 {
        anyhow::bail!("resolver.shortlist_max must be >= 1");
    }
    if config.resolver.random_sample == 0 {
        anyhow::bail!("resolver.random_sample must be >= 1");
    }
    if config.resolver.timeout_secs == 0 {
        anyhow::bail!("resolver.timeout_secs must be > 0");
    }

    if config.pricing.target_margin_pct > 100 {
        anyhow::bail!("pricing.target_margin_pct must be in [0, 100]");
    }
    if let Some(m) = config.pricing.margin_table.iter().find(|m| **m > 100) {
        anyhow::bail!("pricing.margin_table entry {} is outside [0, 100]", m);
    }

    for store in &config.competitors {
        if !store.url_template.contains("{q}") {
            anyhow::bail!(
                "competitor '{}' url_template must contain the {{q}} placeholder",
                store.name
            );
        }
    }

    if config.memory.batch_size == 0 {
        anyhow::bail!("memory.batch_size must be >= 1");
    }

    match config.llm.provider.as_str() {
        "disabled" => {}
        "gemini" => {
            if config.llm.model.as_deref().map_or(true, str::is_empty) {
                anyhow::bail!("llm.model must be specified when provider is 'gemini'");
            }
        }
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be disabled or gemini.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_and_validate(toml: &str) -> Result<Config> {
        let config = parse_config(toml)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse_and_validate("[catalog]\nsource = \"data/products.csv\"\n").unwrap();
        assert_eq!(config.catalog.ttl_secs, 600);
        assert_eq!(config.catalog.columns.sku, "รหัสสินค้า");
        assert_eq!(config.resolver.shortlist_max, 30);
        assert_eq!(config.resolver.random_sample, 15);
        assert_eq!(config.pricing.target_margin_pct, 12);
        assert_eq!(config.pricing.margin_table, vec![3, 5, 7, 9, 12, 15]);
        assert_eq!(config.competitors.len(), 7);
        assert!(!config.llm.is_enabled());
    }

    #[test]
    fn rejects_zero_shortlist() {
        let err = parse_and_validate(
            "[catalog]\nsource = \"x.csv\"\n[resolver]\nshortlist_max = 0\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("shortlist_max"));
    }

    #[test]
    fn rejects_template_without_placeholder() {
        let err = parse_and_validate(
            "[catalog]\nsource = \"x.csv\"\n\n[[competitors]]\nname = \"Shop\"\nurl_template = \"https://shop.example/search\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("{q}"));
    }

    #[test]
    fn rejects_unknown_provider() {
        let err = parse_and_validate("[catalog]\nsource = \"x.csv\"\n[llm]\nprovider = \"magic\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("Unknown llm provider"));
    }

    #[test]
    fn custom_columns_override_defaults() {
        let config = parse_and_validate(
            "[catalog]\nsource = \"x.csv\"\n[catalog.columns]\nsku = \"code\"\ndescription = \"name\"\nbrand = \"brand\"\n",
        )
        .unwrap();
        assert_eq!(config.catalog.columns.sku, "code");
        assert_eq!(config.catalog.columns.description, "name");
        assert_eq!(config.catalog.columns.unit_cost, "ราคาทุนต่อหน่วย");
        assert_eq!(config.catalog.columns.brand.as_deref(), Some("brand"));
    }

    #[test]
    fn example_config_is_valid() {
        let config = parse_and_validate(include_str!("../config/desk.example.toml")).unwrap();
        assert_eq!(config.memory.batch_size, 20);
        assert_eq!(config.competitors.len(), 7);
    }
}
