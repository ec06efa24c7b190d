//! Offline audit of missing model artifacts across the catalog

use crate::catalog::CatalogMap;
use crate::canonical::AssetKey;
use crate::models::artifact::{locate, ArtifactKind};
use serde::Serialize;
use std::path::Path;
use tracing::warn;

/// Artifacts missing for one catalog product
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingAssets {
    pub category: String,
    pub product: String,
    pub asset_key: AssetKey,
    pub absent: Vec<ArtifactKind>,
    /// Kinds whose path could not be checked at all
    pub unreadable: Vec<ArtifactKind>,
}

impl MissingAssets {
    /// `arima, rf, lstm, scaler`-style listing
    pub fn absent_names(&self) -> String {
        join_names(&self.absent)
    }

    pub fn unreadable_names(&self) -> String {
        join_names(&self.unreadable)
    }
}

fn join_names(kinds: &[ArtifactKind]) -> String {
    kinds
        .iter()
        .map(ArtifactKind::short_name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// List every catalog product with at least one absent or unreadable
/// artifact kind.
///
/// Only checks existence; whether a present file actually loads is the
/// service's concern.
pub fn audit_catalog<P: AsRef<Path>>(catalog: &CatalogMap, models_dir: P) -> Vec<MissingAssets> {
    let models_dir = models_dir.as_ref();

    catalog
        .products()
        .filter_map(|(category, product)| {
            let asset_key = AssetKey::from_product(product);
            let paths = locate(&asset_key, models_dir);
            let mut absent = Vec::new();
            let mut unreadable = Vec::new();
            for (kind, path) in paths.iter() {
                match path.try_exists() {
                    Ok(true) => {}
                    Ok(false) => absent.push(kind),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Cannot check artifact");
                        unreadable.push(kind);
                    }
                }
            }

            (!absent.is_empty() || !unreadable.is_empty()).then(|| MissingAssets {
                category: category.to_string(),
                product: product.to_string(),
                asset_key,
                absent,
                unreadable,
            })
        })
        .collect()
}
