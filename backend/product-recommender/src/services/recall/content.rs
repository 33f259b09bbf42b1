use super::{fallback_to_popular, FallbackReason, RecommendStrategy};
use crate::models::{ScoredProduct, Strategy};
use crate::snapshot::Snapshot;
use crate::utils::{cosine_similarity, is_zero_vector, quantize_score, rank_top_n};
use ndarray::Array1;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Content-based Filter
///
/// Builds a taste profile as the mean TF-IDF vector of the user's distinct
/// purchases and ranks every other product by cosine similarity to it.
/// Purchases the vectorizer never saw are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentFilter;

impl ContentFilter {
    pub fn new() -> Self {
        Self
    }

    /// Mean feature vector of the purchased products, or None if none are known.
    fn taste_profile<'a, I>(&self, snapshot: &Snapshot, purchased: I) -> Option<Array1<f64>>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let features = snapshot.features();
        let mut profile = Array1::<f64>::zeros(features.dimension());
        let mut known = 0usize;

        for product_id in purchased {
            match features.vector(product_id) {
                Ok(vector) => {
                    profile += &vector;
                    known += 1;
                }
                Err(err) if err.is_fallback() => {
                    debug!(error = %err, "Skipping purchase without feature vector")
                }
                Err(err) => warn!(error = %err, "Feature lookup failed"),
            }
        }

        if known == 0 {
            return None;
        }

        profile /= known as f64;
        Some(profile)
    }
}

impl RecommendStrategy for ContentFilter {
    fn rank(&self, snapshot: &Snapshot, user_id: &str, limit: usize) -> Vec<ScoredProduct> {
        let purchased = match snapshot.purchased_products(user_id) {
            Some(purchased) if !purchased.is_empty() => purchased,
            _ => {
                return fallback_to_popular(
                    snapshot,
                    self.source(),
                    FallbackReason::NoInteractions,
                    user_id,
                    limit,
                )
            }
        };

        let profile = match self.taste_profile(snapshot, purchased) {
            Some(profile) if !is_zero_vector(&profile) => profile,
            Some(_) => {
                return fallback_to_popular(
                    snapshot,
                    self.source(),
                    FallbackReason::ZeroProfile,
                    user_id,
                    limit,
                )
            }
            None => {
                return fallback_to_popular(
                    snapshot,
                    self.source(),
                    FallbackReason::UnknownProducts,
                    user_id,
                    limit,
                )
            }
        };

        let excluded: HashSet<usize> = purchased
            .iter()
            .filter_map(|id| snapshot.products().position(id))
            .collect();

        let features = snapshot.features();
        let profile_view = profile.view();
        let similarities = (0..features.product_count())
            .filter(|idx| !excluded.contains(idx))
            .map(|idx| {
                let similarity = cosine_similarity(&profile_view, &features.row(idx));
                (idx, quantize_score(similarity))
            });

        let ranked = rank_top_n(similarities, limit);

        debug!(
            user_id = %user_id,
            purchased = purchased.len(),
            returned = ranked.len(),
            "Content similarity ranking completed"
        );

        ranked
    }

    fn source(&self) -> Strategy {
        Strategy::Content
    }
}
