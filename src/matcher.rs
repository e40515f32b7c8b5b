//! Tier 1 (SKU) and Tier 2 (description) substring matchers.
//!
//! Both tiers compare against fields normalized once per catalog snapshot
//! by [`CatalogIndex`]. Results keep catalog order, so the caller takes the
//! first element as the winner. The index also keeps a lowercased copy of
//! every row's full field set for the shortlister.

use crate::models::ProductCatalog;
use crate::normalize::normalize;

/// Normalized SKU and description for every row of one catalog snapshot.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    skus: Vec<String>,
    descriptions: Vec<String>,
    haystacks: Vec<String>,
}

impl CatalogIndex {
    pub fn build(catalog: &ProductCatalog) -> Self {
        let rows = catalog.rows();
        Self {
            skus: rows.iter().map(|r| normalize(&r.sku)).collect(),
            descriptions: rows.iter().map(|r| normalize(&r.description)).collect(),
            haystacks: rows
                .iter()
                .map(|r| r.serialized_fields().to_lowercase())
                .collect(),
        }
    }

    /// Lowercased concatenation of all columns, one entry per row.
    pub fn haystacks(&self) -> &[String] {
        &self.haystacks
    }

    pub fn len(&self) -> usize {
        self.skus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skus.is_empty()
    }
}

fn positions_containing(fields: &[String], needle: &str) -> Vec<usize> {
    fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.contains(needle))
        .map(|(i, _)| i)
        .collect()
}

/// Rows whose normalized SKU contains `normalized_query`.
pub fn match_by_sku(index: &CatalogIndex, normalized_query: &str) -> Vec<usize> {
    positions_containing(&index.skus, normalized_query)
}

/// Rows whose normalized description contains `normalized_query`.
pub fn match_by_description(index: &CatalogIndex, normalized_query: &str) -> Vec<usize> {
    positions_containing(&index.descriptions, normalized_query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductRow;

    fn catalog() -> ProductCatalog {
        ProductCatalog::new(vec![
            ProductRow::new("RT20-ABC", "ตู้เย็น 2 ประตู"),
            ProductRow::new("XYZ", "ทีวี 55 นิ้ว"),
            ProductRow::new("RT20-DEF", "ตู้เย็น 1 ประตู"),
            ProductRow::new("AC-12000", "แอร์ 12000 BTU"),
        ])
    }

    #[test]
    fn sku_matches_in_catalog_order() {
        let idx = CatalogIndex::build(&catalog());
        assert_eq!(match_by_sku(&idx, "rt20"), vec![0, 2]);
        assert_eq!(match_by_sku(&idx, "xyz"), vec![1]);
        assert!(match_by_sku(&idx, "zzz").is_empty());
    }

    #[test]
    fn description_matches_thai_text() {
        let idx = CatalogIndex::build(&catalog());
        assert_eq!(match_by_description(&idx, "ตู้เย็น"), vec![0, 2]);
        assert_eq!(match_by_description(&idx, "12000btu"), vec![3]);
    }

    #[test]
    fn sku_tier_ignores_descriptions() {
        let idx = CatalogIndex::build(&catalog());
        assert!(match_by_sku(&idx, "ตู้เย็น").is_empty());
    }

    #[test]
    fn index_length_tracks_catalog() {
        let idx = CatalogIndex::build(&catalog());
        assert_eq!(idx.len(), 4);
        assert!(CatalogIndex::build(&ProductCatalog::default()).is_empty());
    }
}
