/// Prometheus metrics for the recommendation engine
use once_cell::sync::Lazy;
use prometheus::{register_histogram, register_int_counter_vec, Histogram, IntCounterVec};

static RECOMMENDATION_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "recommender_requests_total",
        "Total number of recommendation requests",
        &["strategy"]
    )
    .expect("Failed to register recommendation requests metric")
});

static RECOMMENDATION_FALLBACKS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "recommender_fallbacks_total",
        "Total number of requests answered by the popularity fallback",
        &["strategy", "reason"]
    )
    .expect("Failed to register recommendation fallbacks metric")
});

static SNAPSHOT_BUILD_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "recommender_snapshot_build_seconds",
        "Duration of snapshot builds"
    )
    .expect("Failed to register snapshot build duration metric")
});

/// Metrics collector for the recommendation engine
pub struct RecommenderMetrics;

impl RecommenderMetrics {
    pub fn record_request(strategy: &str) {
        RECOMMENDATION_REQUESTS.with_label_values(&[strategy]).inc();
    }

    pub fn record_fallback(strategy: &str, reason: &str) {
        RECOMMENDATION_FALLBACKS
            .with_label_values(&[strategy, reason])
            .inc();
    }

    pub fn observe_snapshot_build(duration_secs: f64) {
        SNAPSHOT_BUILD_DURATION.observe(duration_secs);
    }

    pub fn requests(strategy: &str) -> u64 {
        RECOMMENDATION_REQUESTS.with_label_values(&[strategy]).get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_counter_increments() {
        let before = RecommenderMetrics::requests("metrics-test");
        RecommenderMetrics::record_request("metrics-test");
        assert_eq!(RecommenderMetrics::requests("metrics-test"), before + 1);
    }
}
