//! Product Forecast Service - Main Entry Point
//!
//! Answers forecast requests over NATS request/reply, resolving each
//! product's model bundle and running the ensemble on a bounded worker pool.

use anyhow::Result;
use futures::StreamExt;
use product_forecast::{
    canonical::AssetKey,
    catalog::CatalogMap,
    config::{AppConfig, LoggingConfig},
    consumer::RequestConsumer,
    error::ForecastError,
    metrics::{MetricsReporter, ServiceMetrics},
    pipeline::WorkerPool,
    producer::ReplyPublisher,
    service::PredictionService,
    types::{ForecastRequest, ForecastResponse},
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().or_else(|_| {
        tracing_subscriber::EnvFilter::try_new(format!("product_forecast={}", logging.level))
    })?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration (optional path as first argument)
    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    init_logging(&config.logging)?;

    info!("Starting Product Forecast Service");
    info!(
        models_dir = %config.models.models_dir,
        loading = ?config.models.loading,
        runtime = ?config.models.network_runtime,
        "Configuration loaded"
    );

    let catalog = Arc::new(CatalogMap::load(&config.catalog.path)?);
    let metrics = Arc::new(ServiceMetrics::new());
    let service = Arc::new(
        PredictionService::from_config(&config.models, &catalog)?.with_metrics(metrics.clone()),
    );

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let publisher = ReplyPublisher::new(client.clone());
    let mut predictions = RequestConsumer::new(client.clone(), &config.nats.predict_subject)
        .with_queue_group(config.nats.queue_group.as_deref())
        .subscribe()
        .await?;
    let mut catalog_requests = RequestConsumer::new(client.clone(), &config.nats.catalog_subject)
        .subscribe()
        .await?;

    // Start metrics reporter
    let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
    tokio::spawn(reporter.start());

    // Catalog replies are cheap and served inline
    {
        let publisher = publisher.clone();
        let catalog = catalog.clone();
        tokio::spawn(async move {
            while let Some(message) = catalog_requests.next().await {
                let Some(reply) = message.reply else {
                    continue;
                };
                if let Err(e) = publisher.publish_json(reply, catalog.as_ref()).await {
                    error!(error = %e, "Failed to publish catalog");
                }
            }
        });
    }

    let pool = WorkerPool::new(config.pipeline.workers);
    info!(
        workers = config.pipeline.workers,
        subject = %config.nats.predict_subject,
        "Serving forecast requests"
    );

    loop {
        let message = tokio::select! {
            message = predictions.next() => match message {
                Some(message) => message,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        };

        // Acquire permit (limits concurrent tasks)
        let Some(permit) = pool.acquire().await else {
            break;
        };

        let service = service.clone();
        let publisher = publisher.clone();
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();

            let response = match serde_json::from_slice::<ForecastRequest>(&message.payload) {
                Ok(request) => handle_request(service, request).await,
                Err(e) => {
                    warn!(error = %e, "Failed to deserialize forecast request");
                    ForecastResponse::malformed(format!("invalid request: {}", e))
                }
            };

            let elapsed = start_time.elapsed();
            metrics.record_request(response.status.outcome(), elapsed);
            info!(
                request_id = %response.request_id,
                product = %response.product,
                status = ?response.status,
                predictions = response.predictions.len(),
                processing_time_us = elapsed.as_micros(),
                "Forecast request handled"
            );

            if let Err(e) = publisher.respond(message.reply, &response).await {
                error!(
                    request_id = %response.request_id,
                    error = %e,
                    "Failed to publish forecast response"
                );
            }

            drop(permit);
        });
    }

    info!(in_flight = pool.in_flight(), "Forecast service shutting down...");
    // Let running requests publish their replies first
    pool.drain().await;
    metrics.print_summary();

    Ok(())
}

async fn handle_request(service: Arc<PredictionService>, request: ForecastRequest) -> ForecastResponse {
    let ForecastRequest {
        request_id,
        product,
        features,
    } = request;

    let features = match features.into_vector() {
        Ok(features) => features,
        Err(e) => {
            warn!(request_id = %request_id, product = %product, error = %e, "Malformed features");
            return ForecastResponse::bad_features(&request_id, &product, &e);
        }
    };

    // Artifact loading and inference block, keep them off the async workers
    let name = product.clone();
    let outcome = tokio::task::spawn_blocking(move || service.handle(&name, &features))
        .await
        .unwrap_or_else(|e| {
            error!(request_id = %request_id, error = %e, "Prediction task panicked");
            Err(ForecastError::ComputeFailure {
                asset_key: AssetKey::from_product(&product),
                failures: Vec::new(),
            })
        });

    ForecastResponse::from_outcome(&request_id, &product, outcome)
}
