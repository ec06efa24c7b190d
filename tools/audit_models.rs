//! Model Asset Audit
//!
//! Lists every catalog product that is missing one or more model artifacts.

use product_forecast::audit::audit_catalog;
use product_forecast::catalog::CatalogMap;
use tracing::info;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("audit_models=info".parse()?),
        )
        .init();

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let catalog_path = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("data/product_list.json");
    let models_dir = args.get(2).map(|s| s.as_str()).unwrap_or("Models");

    info!(catalog = %catalog_path, models_dir = %models_dir, "Auditing model assets");

    let catalog = CatalogMap::load(catalog_path)?;
    let missing = audit_catalog(&catalog, models_dir);

    println!("=== Missing model assets ===");
    for entry in missing.iter().filter(|e| !e.absent.is_empty()) {
        println!("{}: {}", entry.product, entry.absent_names());
    }

    let unreadable: Vec<_> = missing.iter().filter(|e| !e.unreadable.is_empty()).collect();
    if !unreadable.is_empty() {
        println!();
        println!("=== Unreadable model assets ===");
        for entry in unreadable {
            println!("{}: {}", entry.product, entry.unreadable_names());
        }
    }

    info!(
        products = catalog.product_count(),
        incomplete = missing.len(),
        "Audit complete"
    );

    Ok(())
}
