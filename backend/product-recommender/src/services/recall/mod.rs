mod collaborative;
mod content;
mod popularity;

use crate::metrics::RecommenderMetrics;
use crate::models::{ScoredProduct, Strategy};
use crate::snapshot::Snapshot;
use tracing::info;

pub use collaborative::CollaborativeFilter;
pub use content::ContentFilter;
pub use popularity::PopularityRanker;

/// A single-source ranking strategy over one snapshot.
///
/// Implementations are stateless; everything they read lives in the
/// snapshot, so one instance serves any number of concurrent requests.
pub trait RecommendStrategy: Send + Sync {
    /// Ranked product positions, at most `limit` long, without duplicates.
    fn rank(&self, snapshot: &Snapshot, user_id: &str, limit: usize) -> Vec<ScoredProduct>;

    fn source(&self) -> Strategy;

    /// Ranked product ids.
    fn recommend(&self, snapshot: &Snapshot, user_id: &str, limit: usize) -> Vec<String> {
        snapshot.product_ids(&self.rank(snapshot, user_id, limit))
    }
}

/// Why a strategy handed the request to the popularity ranker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    UnknownUser,
    NoInteractions,
    UnknownProducts,
    ZeroProfile,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::UnknownUser => "unknown_user",
            FallbackReason::NoInteractions => "no_interactions",
            FallbackReason::UnknownProducts => "unknown_products",
            FallbackReason::ZeroProfile => "zero_profile",
        }
    }
}

/// Popularity ranking for a user a strategy cannot personalize.
///
/// Products the user already bought are left out, so a user with a zero
/// profile is not sent back to their own purchases. Cold-start users have
/// no purchases and get the popularity ranking unchanged.
pub(crate) fn fallback_to_popular(
    snapshot: &Snapshot,
    strategy: Strategy,
    reason: FallbackReason,
    user_id: &str,
    limit: usize,
) -> Vec<ScoredProduct> {
    info!(
        user_id = %user_id,
        strategy = %strategy,
        reason = reason.as_str(),
        "Falling back to popularity ranking"
    );
    RecommenderMetrics::record_fallback(strategy.as_str(), reason.as_str());

    let Some(purchased) = snapshot.purchased_products(user_id) else {
        return PopularityRanker::new().rank(snapshot, user_id, limit);
    };

    snapshot
        .popularity()
        .iter()
        .filter(|entry| {
            snapshot
                .products()
                .id(entry.index)
                .map_or(true, |id| !purchased.contains(id))
        })
        .take(limit)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_reason_labels() {
        assert_eq!(FallbackReason::UnknownUser.as_str(), "unknown_user");
        assert_eq!(FallbackReason::ZeroProfile.as_str(), "zero_profile");
    }

    #[test]
    fn test_strategy_sources() {
        assert_eq!(CollaborativeFilter::new().source(), Strategy::Collaborative);
        assert_eq!(ContentFilter::new().source(), Strategy::Content);
        assert_eq!(PopularityRanker::new().source(), Strategy::Popular);
    }
}
