pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod services;
pub mod snapshot;
pub mod utils;

pub use config::{Config, EngineConfig};
pub use error::{RecommendError, Result};
pub use models::{Dataset, Product, Strategy, Transaction, User};
pub use services::{RecommendStrategy, RecommendationEngine};
pub use snapshot::{build_snapshot, Snapshot, SnapshotStore};

/// Recommend `n` products for `user_id` from `snapshot` with the given strategy.
pub fn recommend(
    snapshot: &Snapshot,
    user_id: &str,
    strategy: Strategy,
    n: usize,
) -> Result<Vec<String>> {
    RecommendationEngine::new().recommend(snapshot, user_id, strategy, n)
}
