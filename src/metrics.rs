//! Request and model statistics for the forecast service.

use crate::models::artifact::ArtifactKind;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Final status of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestOutcome {
    Predicted,
    NotFound,
    ComputeFailure,
    BadRequest,
}

impl RequestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestOutcome::Predicted => "predicted",
            RequestOutcome::NotFound => "not_found",
            RequestOutcome::ComputeFailure => "compute_failure",
            RequestOutcome::BadRequest => "bad_request",
        }
    }
}

/// Metrics collector shared by request workers
pub struct ServiceMetrics {
    /// Total requests answered
    pub requests_handled: AtomicU64,
    outcomes: RwLock<HashMap<RequestOutcome, u64>>,
    /// Request latencies (in microseconds)
    request_times: RwLock<Vec<u64>>,
    /// Predictor latencies (in microseconds)
    model_times: RwLock<HashMap<ArtifactKind, Vec<u64>>>,
    predictor_failures: RwLock<HashMap<ArtifactKind, u64>>,
    load_failures: RwLock<HashMap<ArtifactKind, u64>>,
    start_time: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_handled: AtomicU64::new(0),
            outcomes: RwLock::new(HashMap::new()),
            request_times: RwLock::new(Vec::with_capacity(1000)),
            model_times: RwLock::new(HashMap::new()),
            predictor_failures: RwLock::new(HashMap::new()),
            load_failures: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record a finished request
    pub fn record_request(&self, outcome: RequestOutcome, elapsed: Duration) {
        self.requests_handled.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut outcomes) = self.outcomes.write() {
            *outcomes.entry(outcome).or_insert(0) += 1;
        }

        if let Ok(mut times) = self.request_times.write() {
            times.push(elapsed.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    /// Record one predictor invocation time
    pub fn record_model_time(&self, kind: ArtifactKind, duration: Duration) {
        if let Ok(mut times) = self.model_times.write() {
            let kind_times = times.entry(kind).or_default();
            kind_times.push(duration.as_micros() as u64);
            if kind_times.len() > 1000 {
                kind_times.drain(0..500);
            }
        }
    }

    pub fn record_predictor_failure(&self, kind: ArtifactKind) {
        if let Ok(mut failures) = self.predictor_failures.write() {
            *failures.entry(kind).or_insert(0) += 1;
        }
    }

    pub fn record_load_failure(&self, kind: ArtifactKind) {
        if let Ok(mut failures) = self.load_failures.write() {
            *failures.entry(kind).or_insert(0) += 1;
        }
    }

    pub fn outcome_count(&self, outcome: RequestOutcome) -> u64 {
        self.outcomes
            .read()
            .map(|o| o.get(&outcome).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn predictor_failures(&self) -> HashMap<ArtifactKind, u64> {
        self.predictor_failures
            .read()
            .map(|f| f.clone())
            .unwrap_or_default()
    }

    pub fn load_failures(&self) -> HashMap<ArtifactKind, u64> {
        self.load_failures
            .read()
            .map(|f| f.clone())
            .unwrap_or_default()
    }

    /// Request latency statistics
    pub fn get_request_stats(&self) -> LatencyStats {
        self.request_times
            .read()
            .map(|times| LatencyStats::from_samples(&times))
            .unwrap_or_default()
    }

    /// Per-predictor latency statistics
    pub fn get_model_stats(&self) -> HashMap<ArtifactKind, LatencyStats> {
        let Ok(times) = self.model_times.read() else {
            return HashMap::new();
        };

        times
            .iter()
            .filter(|(_, samples)| !samples.is_empty())
            .map(|(kind, samples)| (*kind, LatencyStats::from_samples(samples)))
            .collect()
    }

    /// Requests per second since startup
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.requests_handled.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let handled = self.requests_handled.load(Ordering::Relaxed);
        let latency = self.get_request_stats();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║              FORECAST SERVICE - METRICS SUMMARY              ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Requests Handled: {:>8}  │  Throughput: {:>6.1} req/s      ║",
            handled,
            self.get_throughput()
        );
        info!(
            "║ Latency (μs): mean={:>6} p50={:>6} p95={:>6} p99={:>6}   ║",
            latency.mean_us, latency.p50_us, latency.p95_us, latency.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Outcomes:                                                    ║");
        for outcome in [
            RequestOutcome::Predicted,
            RequestOutcome::NotFound,
            RequestOutcome::ComputeFailure,
            RequestOutcome::BadRequest,
        ] {
            let count = self.outcome_count(outcome);
            let pct = if handled > 0 {
                (count as f64 / handled as f64) * 100.0
            } else {
                0.0
            };
            info!("║   {:16}: {:>6} ({:>5.1}%)", outcome.as_str(), count, pct);
        }
        info!("╚══════════════════════════════════════════════════════════════╝");

        let model_stats = self.get_model_stats();
        if !model_stats.is_empty() {
            info!("Predictor Times (μs):");
            for (kind, stats) in &model_stats {
                info!(
                    "  {}: mean={} p50={} p99={} (calls={})",
                    kind, stats.mean_us, stats.p50_us, stats.p99_us, stats.count
                );
            }
        }

        for (kind, count) in self.predictor_failures() {
            info!(kind = %kind, failures = count, "Predictor failures");
        }
        for (kind, count) in self.load_failures() {
            info!(kind = %kind, failures = count, "Artifact load failures");
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

impl LatencyStats {
    fn from_samples(samples: &[u64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        Self {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: at(0.5),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }
}

/// Periodic metrics summary logger
pub struct MetricsReporter {
    metrics: Arc<ServiceMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServiceMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_recording() {
        let metrics = ServiceMetrics::new();
        metrics.record_request(RequestOutcome::Predicted, Duration::from_micros(100));
        metrics.record_request(RequestOutcome::Predicted, Duration::from_micros(300));
        metrics.record_request(RequestOutcome::NotFound, Duration::from_micros(50));

        assert_eq!(metrics.requests_handled.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.outcome_count(RequestOutcome::Predicted), 2);
        assert_eq!(metrics.outcome_count(RequestOutcome::ComputeFailure), 0);

        let stats = metrics.get_request_stats();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.mean_us, 150);
        assert_eq!(stats.max_us, 300);
    }

    #[test]
    fn test_failure_counters() {
        let metrics = ServiceMetrics::new();
        metrics.record_predictor_failure(ArtifactKind::SequenceModel);
        metrics.record_predictor_failure(ArtifactKind::SequenceModel);
        metrics.record_load_failure(ArtifactKind::Scaler);

        assert_eq!(metrics.predictor_failures()[&ArtifactKind::SequenceModel], 2);
        assert_eq!(metrics.load_failures()[&ArtifactKind::Scaler], 1);
    }

    #[test]
    fn test_model_stats() {
        let metrics = ServiceMetrics::new();
        metrics.record_model_time(ArtifactKind::TreeEnsemble, Duration::from_micros(10));
        metrics.record_model_time(ArtifactKind::TreeEnsemble, Duration::from_micros(30));

        let stats = metrics.get_model_stats();
        assert_eq!(stats[&ArtifactKind::TreeEnsemble].count, 2);
        assert_eq!(stats[&ArtifactKind::TreeEnsemble].mean_us, 20);
    }
}
