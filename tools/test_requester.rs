//! Test Forecast Requester
//!
//! Sends forecast requests for random catalog products over NATS and logs
//! the replies.

use product_forecast::catalog::CatalogMap;
use product_forecast::features::FeatureInput;
use product_forecast::types::{ForecastRequest, ForecastResponse};
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};

/// Random request generator over the catalog
struct RequestGenerator {
    rng: rand::rngs::ThreadRng,
    products: Vec<String>,
    feature_len: usize,
}

impl RequestGenerator {
    fn new(catalog: &CatalogMap, feature_len: usize) -> Self {
        Self {
            rng: rand::thread_rng(),
            products: catalog.products().map(|(_, p)| p.to_string()).collect(),
            feature_len,
        }
    }

    /// Request for a random catalog product with plausible price features
    fn generate(&mut self) -> ForecastRequest {
        let product = if self.products.is_empty() || self.rng.gen_bool(0.05) {
            // Occasionally ask for something the catalog does not carry
            format!("Unknown Product {}", self.rng.gen_range(1..100))
        } else {
            self.products[self.rng.gen_range(0..self.products.len())].clone()
        };

        let base: f64 = self.rng.gen_range(20.0..200.0);
        let csv = (0..self.feature_len)
            .map(|_| format!("{:.2}", base * self.rng.gen_range(0.9..1.1)))
            .collect::<Vec<_>>()
            .join(",");

        ForecastRequest::new(product, FeatureInput::Csv(csv))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_requester=info".parse()?),
        )
        .init();

    info!("Starting Test Forecast Requester");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("forecast.predict");
    let catalog_path = args
        .get(3)
        .map(|s| s.as_str())
        .unwrap_or("data/product_list.json");
    let count: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(20);
    let feature_len: usize = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(5);
    let delay_ms: u64 = args.get(6).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        feature_len = feature_len,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let catalog = CatalogMap::load(catalog_path)?;
    let mut generator = RequestGenerator::new(&catalog, feature_len.max(1));

    // Connect to NATS
    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(&mut generator, count, delay_ms).await;
        }
    };

    let mut answered = 0u64;
    let mut failed = 0u64;

    for i in 0..count {
        let request = generator.generate();
        let payload = serde_json::to_vec(&request)?;

        match client.request(subject.to_string(), payload.into()).await {
            Ok(reply) => match serde_json::from_slice::<ForecastResponse>(&reply.payload) {
                Ok(response) => {
                    answered += 1;
                    info!(
                        request_id = %response.request_id,
                        product = %response.product,
                        code = response.code,
                        predictions = ?response.predictions,
                        error = ?response.error,
                        "Forecast reply"
                    );
                }
                Err(e) => {
                    failed += 1;
                    warn!(error = %e, "Unreadable forecast reply");
                }
            },
            Err(e) => {
                failed += 1;
                warn!(request_id = %request.request_id, error = %e, "Request failed");
            }
        }

        if (i + 1) % 10 == 0 {
            info!("Sent {}/{} requests ({} answered, {} failed)", i + 1, count, answered, failed);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Sent {} requests ({} answered, {} failed)",
        count, answered, failed
    );

    Ok(())
}

async fn run_dry_mode(
    generator: &mut RequestGenerator,
    count: u64,
    delay_ms: u64,
) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    for i in 0..count {
        let request = generator.generate();
        let json = serde_json::to_string_pretty(&request)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample request {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
