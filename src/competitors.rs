//! Search links to competitor stores for manual price comparison.

use serde::Serialize;

use crate::config::CompetitorConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompetitorLink {
    pub store: String,
    pub url: String,
}

/// Fill each store's `{q}` placeholder with the percent-encoded SKU.
pub fn competitor_links(stores: &[CompetitorConfig], sku: &str) -> Vec<CompetitorLink> {
    let encoded = urlencoding::encode(sku.trim());
    stores
        .iter()
        .map(|s| CompetitorLink {
            store: s.name.clone(),
            url: s.url_template.replace("{q}", &encoded),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stores() -> Vec<CompetitorConfig> {
        vec![
            CompetitorConfig {
                name: "HomePro".into(),
                url_template: "https://www.homepro.co.th/search?q={q}".into(),
            },
            CompetitorConfig {
                name: "PowerBuy".into(),
                url_template: "https://www.powerbuy.co.th/th/search/{q}".into(),
            },
        ]
    }

    #[test]
    fn fills_query_and_path_templates() {
        let links = competitor_links(&stores(), "RT20-ABC");
        assert_eq!(links[0].url, "https://www.homepro.co.th/search?q=RT20-ABC");
        assert_eq!(links[1].url, "https://www.powerbuy.co.th/th/search/RT20-ABC");
        assert_eq!(links[1].store, "PowerBuy");
    }

    #[test]
    fn encodes_reserved_characters() {
        let links = competitor_links(&stores(), "AB 12/3");
        assert_eq!(links[0].url, "https://www.homepro.co.th/search?q=AB%2012%2F3");
    }
}
