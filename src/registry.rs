//! Immutable bundle registry for the preload strategy.
//!
//! Built once at startup from the catalog and never mutated afterwards.
//! Reloading artifacts requires a restart.

use crate::canonical::AssetKey;
use crate::catalog::CatalogMap;
use crate::models::artifact::{locate, ArtifactKind};
use crate::models::loader::{ModelBundle, ModelBundleLoader};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Debug)]
struct RegistryEntry {
    bundle: Arc<ModelBundle>,
    corrupt: Vec<ArtifactKind>,
}

/// Bundles for every catalog product, keyed by asset key.
#[derive(Debug, Default)]
pub struct BundleRegistry {
    entries: HashMap<AssetKey, RegistryEntry>,
}

impl BundleRegistry {
    /// Load each distinct catalog asset key exactly once.
    pub fn build<P: AsRef<Path>>(
        catalog: &CatalogMap,
        models_dir: P,
        loader: &ModelBundleLoader,
    ) -> Self {
        let start = Instant::now();
        let models_dir = models_dir.as_ref();
        let mut entries = HashMap::new();
        let mut failures = 0;

        for key in catalog.asset_keys() {
            if key.is_empty() {
                continue;
            }
            let load = loader.load(&locate(&key, models_dir));
            let corrupt = load.failed_kinds();
            failures += corrupt.len();

            if load.bundle.is_empty() && corrupt.is_empty() {
                continue;
            }
            entries.insert(
                key,
                RegistryEntry {
                    bundle: Arc::new(load.bundle),
                    corrupt,
                },
            );
        }

        let registry = Self { entries };
        info!(
            products = catalog.product_count(),
            bundles = registry.loaded_count(),
            failed_artifacts = failures,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Bundle registry built"
        );
        registry
    }

    /// Bundle and corrupt kinds recorded for `key`
    pub fn get(&self, key: &AssetKey) -> Option<(Arc<ModelBundle>, &[ArtifactKind])> {
        self.entries
            .get(key)
            .map(|entry| (Arc::clone(&entry.bundle), entry.corrupt.as_slice()))
    }

    /// Number of keys with at least one loaded artifact
    pub fn loaded_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| !entry.bundle.is_empty())
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::forest::{RandomForest, RegressionTree, TreeNode};
    use tempfile::TempDir;

    #[test]
    fn test_build_skips_products_without_artifacts() {
        let dir = TempDir::new().unwrap();
        let forest = RandomForest {
            n_features: None,
            trees: vec![RegressionTree {
                nodes: vec![TreeNode::Leaf { value: 1.0 }],
            }],
        };
        std::fs::write(
            dir.path().join("Maize_White_rf_model.pkl"),
            serde_json::to_vec(&forest).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.path().join("Milk_scaler.pkl"), b"not json").unwrap();

        let catalog: CatalogMap = serde_json::from_str(
            r#"{"Cereals": ["Teff", "Maize (White)"], "Dairy": ["Milk"]}"#,
        )
        .unwrap();
        let registry = BundleRegistry::build(&catalog, dir.path(), &ModelBundleLoader::new());

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.loaded_count(), 1);

        let (bundle, corrupt) = registry.get(&AssetKey::from_product("Maize White")).unwrap();
        assert_eq!(bundle.kinds(), vec![ArtifactKind::TreeEnsemble]);
        assert!(corrupt.is_empty());

        let (bundle, corrupt) = registry.get(&AssetKey::from_product("Milk")).unwrap();
        assert!(bundle.is_empty());
        assert_eq!(corrupt, &[ArtifactKind::Scaler]);

        assert!(registry.get(&AssetKey::from_product("Teff")).is_none());
    }
}
