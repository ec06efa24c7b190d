//! Product catalog: category → ordered product names

use crate::canonical::AssetKey;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

/// Read-only catalog loaded once at startup.
///
/// Each product is assumed to appear under exactly one category; this is
/// reported but not enforced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogMap {
    categories: BTreeMap<String, Vec<String>>,
}

impl CatalogMap {
    pub fn new(categories: BTreeMap<String, Vec<String>>) -> Self {
        Self { categories }
    }

    /// Load the catalog from a JSON document
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        let catalog: CatalogMap = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse catalog {}", path.display()))?;

        for (product, categories) in catalog.duplicates() {
            warn!(product = %product, categories = ?categories, "Product listed in several categories");
        }

        info!(
            categories = catalog.categories.len(),
            products = catalog.product_count(),
            path = %path.display(),
            "Catalog loaded"
        );

        Ok(catalog)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> + '_ {
        self.categories.keys().map(String::as_str)
    }

    pub fn products_in(&self, category: &str) -> Option<&[String]> {
        self.categories.get(category).map(Vec::as_slice)
    }

    /// Every (category, product) pair in catalog order
    pub fn products(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.categories.iter().flat_map(|(category, products)| {
            products
                .iter()
                .map(move |product| (category.as_str(), product.as_str()))
        })
    }

    pub fn product_count(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn category_of(&self, product: &str) -> Option<&str> {
        self.products()
            .find(|(_, p)| *p == product)
            .map(|(category, _)| category)
    }

    /// Distinct asset keys across the catalog
    pub fn asset_keys(&self) -> Vec<AssetKey> {
        let mut keys: Vec<AssetKey> = self
            .products()
            .map(|(_, product)| AssetKey::from_product(product))
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Products that appear under more than one category
    pub fn duplicates(&self) -> Vec<(String, Vec<String>)> {
        let mut seen: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (category, product) in self.products() {
            seen.entry(product).or_default().push(category.to_string());
        }
        seen.into_iter()
            .filter(|(_, categories)| categories.len() > 1)
            .map(|(product, categories)| (product.to_string(), categories))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CATALOG: &str = r#"{
        "Cereals": ["Teff", "Maize (White)"],
        "Dairy": ["Cheese (Ayib)", "Milk"]
    }"#;

    #[test]
    fn test_load_and_query() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("product_list.json");
        std::fs::write(&path, CATALOG).unwrap();

        let catalog = CatalogMap::load(&path).unwrap();
        assert_eq!(catalog.product_count(), 4);
        assert_eq!(catalog.categories().collect::<Vec<_>>(), vec!["Cereals", "Dairy"]);
        assert_eq!(
            catalog.products_in("Cereals").unwrap(),
            &["Teff".to_string(), "Maize (White)".to_string()]
        );
        assert_eq!(catalog.category_of("Milk"), Some("Dairy"));
        assert_eq!(catalog.category_of("Coffee"), None);
    }

    #[test]
    fn test_asset_keys_are_canonical() {
        let catalog: CatalogMap = serde_json::from_str(CATALOG).unwrap();
        let keys: Vec<String> = catalog.asset_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["Cheese_Ayib", "Maize_White", "Milk", "Teff"]);
    }

    #[test]
    fn test_duplicates_reported() {
        let catalog: CatalogMap =
            serde_json::from_str(r#"{"A": ["Salt"], "B": ["Salt", "Sugar"]}"#).unwrap();
        assert_eq!(
            catalog.duplicates(),
            vec![("Salt".to_string(), vec!["A".to_string(), "B".to_string()])]
        );
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(CatalogMap::load("/no/such/catalog.json").is_err());
    }
}
