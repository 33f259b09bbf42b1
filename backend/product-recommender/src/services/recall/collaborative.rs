use super::{fallback_to_popular, FallbackReason, RecommendStrategy};
use crate::models::{ScoredProduct, Strategy};
use crate::snapshot::Snapshot;
use crate::utils::{cosine_similarity, is_zero_vector, quantize_score, rank_top_n};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// User-based Collaborative Filter
///
/// Algorithm:
/// 1. Take the target user's row of the truncated SVD factors
/// 2. Cosine similarity against every other user's row
/// 3. Keep the top `neighbor_count` neighbours (ties: lower user index;
///    similarities are compared at `SCORE_RESOLUTION`)
/// 4. For each product the target has not rated, sum rating x similarity
///    over neighbours that rated it
/// 5. Rank by score descending (ties: lower product index)
///
/// Users unknown to the snapshot, or known but without any rating, are
/// cold-start and receive the popularity ranking instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct CollaborativeFilter;

impl CollaborativeFilter {
    pub fn new() -> Self {
        Self
    }

    /// Most similar users to `user`, excluding the user itself.
    /// Entries carry the neighbour's user position in `index`.
    fn nearest_neighbors(&self, snapshot: &Snapshot, user: usize) -> Vec<ScoredProduct> {
        let factors = snapshot.factorization().user_factors();
        let target = factors.row(user);

        let similarities = (0..factors.nrows())
            .filter(|&other| other != user)
            .map(|other| {
                let similarity = cosine_similarity(&target, &factors.row(other));
                (other, quantize_score(similarity))
            });

        rank_top_n(similarities, snapshot.config().neighbor_count)
    }
}

impl RecommendStrategy for CollaborativeFilter {
    fn rank(&self, snapshot: &Snapshot, user_id: &str, limit: usize) -> Vec<ScoredProduct> {
        let interactions = snapshot.interactions();

        let user = match snapshot.user_position(user_id) {
            Ok(user) if interactions.has_ratings(user) => user,
            Ok(_) => {
                return fallback_to_popular(
                    snapshot,
                    self.source(),
                    FallbackReason::NoInteractions,
                    user_id,
                    limit,
                )
            }
            Err(err) => {
                debug!(error = %err, "Collaborative filter: cold-start user");
                return fallback_to_popular(
                    snapshot,
                    self.source(),
                    FallbackReason::UnknownUser,
                    user_id,
                    limit,
                );
            }
        };

        if is_zero_vector(&snapshot.factorization().user_factors().row(user)) {
            return fallback_to_popular(
                snapshot,
                self.source(),
                FallbackReason::ZeroProfile,
                user_id,
                limit,
            );
        }

        let neighbors = self.nearest_neighbors(snapshot, user);
        if neighbors.is_empty() {
            info!(
                user_id = %user_id,
                "Collaborative filter: no other users to compare against"
            );
            return Vec::new();
        }

        let mut scores: BTreeMap<usize, f64> = BTreeMap::new();
        let (_, product_count) = interactions.dim();

        for product in 0..product_count {
            if interactions.rating(user, product) != 0.0 {
                continue;
            }

            for neighbor in &neighbors {
                let rating = interactions.rating(neighbor.index, product);
                if rating == 0.0 {
                    continue;
                }
                *scores.entry(product).or_insert(0.0) += rating * neighbor.score;
            }
        }

        debug!(
            user_id = %user_id,
            neighbors = neighbors.len(),
            candidates = scores.len(),
            "Collaborative scores accumulated"
        );

        let quantized = scores
            .into_iter()
            .map(|(product, score)| (product, quantize_score(score)));

        rank_top_n(quantized, limit)
    }

    fn source(&self) -> Strategy {
        Strategy::Collaborative
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::{Product, Transaction, User};
    use crate::snapshot::build_snapshot;
    use chrono::{TimeZone, Utc};

    fn product(id: &str) -> Product {
        Product {
            product_id: id.to_string(),
            name: id.to_string(),
            category: "Electronics".to_string(),
            brand: "Sony".to_string(),
            price: 10.0,
            rating: 4.0,
            description: "product".to_string(),
        }
    }

    fn tx(user: &str, product: &str, rating: u8) -> Transaction {
        Transaction {
            transaction_id: String::new(),
            user_id: user.to_string(),
            product_id: product.to_string(),
            rating,
            quantity: 1,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        }
    }

    fn snapshot(transactions: Vec<Transaction>) -> Snapshot {
        let users = ["U1", "U2", "U3", "U4"].iter().map(|u| User::new(*u)).collect();
        let products = ["P1", "P2", "P3", "P4"].iter().map(|p| product(p)).collect();
        build_snapshot(users, products, transactions, EngineConfig::default())
    }

    fn ids(snapshot: &Snapshot, ranked: &[ScoredProduct]) -> Vec<String> {
        ranked
            .iter()
            .map(|s| snapshot.products().id(s.index).unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_recommends_products_rated_by_similar_users() {
        let snapshot = snapshot(vec![
            tx("U1", "P1", 5),
            tx("U1", "P2", 4),
            tx("U2", "P1", 5),
            tx("U2", "P2", 4),
            tx("U2", "P3", 5),
            tx("U3", "P4", 2),
        ]);

        let ranked = CollaborativeFilter::new().rank(&snapshot, "U1", 5);
        let recommended = ids(&snapshot, &ranked);

        // U2 mirrors U1 and adds P3; U3 is orthogonal and contributes zero
        assert_eq!(recommended[0], "P3");
        assert!(!recommended.contains(&"P1".to_string()));
        assert!(!recommended.contains(&"P2".to_string()));
    }

    #[test]
    fn test_excludes_rated_products() {
        let snapshot = snapshot(vec![
            tx("U1", "P1", 5),
            tx("U2", "P1", 4),
            tx("U2", "P2", 3),
            tx("U3", "P1", 2),
            tx("U3", "P3", 5),
            tx("U4", "P4", 1),
        ]);

        let ranked = CollaborativeFilter::new().rank(&snapshot, "U1", 10);
        assert!(ranked.iter().all(|s| s.index != 0));
    }

    #[test]
    fn test_cold_start_uses_popularity() {
        let snapshot = snapshot(vec![tx("U1", "P1", 5), tx("U2", "P2", 4)]);

        let cf = CollaborativeFilter::new().rank(&snapshot, "U9", 3);
        let known_without_ratings = CollaborativeFilter::new().rank(&snapshot, "U4", 3);
        let popular: Vec<ScoredProduct> = snapshot.popularity().iter().take(3).cloned().collect();

        assert_eq!(cf, popular);
        assert_eq!(known_without_ratings, popular);
    }

    /// U0 rates only P0; U1..U6 rate P0 and their own product with 1, 2, 3,
    /// 4, 5, 5. U5 and U6 are then tied at cosine 1/sqrt(2) to U0.
    fn tied_neighbors_snapshot() -> Snapshot {
        let users = (0..7).map(|i| User::new(format!("U{}", i))).collect();
        let products = (0..7).map(|i| product(&format!("P{}", i))).collect();

        let mut transactions = vec![tx("U0", "P0", 5)];
        for (i, rating) in [1, 2, 3, 4, 5, 5].into_iter().enumerate() {
            let user = format!("U{}", i + 1);
            transactions.push(tx(&user, "P0", 5));
            transactions.push(tx(&user, &format!("P{}", i + 1), rating));
        }

        build_snapshot(users, products, transactions, EngineConfig::default())
    }

    #[test]
    fn test_neighbors_are_capped_and_ties_prefer_lower_index() {
        let snapshot = tied_neighbors_snapshot();
        let target = snapshot.user_position("U0").unwrap();

        let neighbors = CollaborativeFilter::new().nearest_neighbors(&snapshot, target);
        let names: Vec<&str> = neighbors
            .iter()
            .map(|n| snapshot.users().id(n.index).unwrap())
            .collect();

        // Six candidates, five slots: U5 keeps the tied last slot over U6
        assert_eq!(names, vec!["U1", "U2", "U3", "U4", "U5"]);
        assert_eq!(neighbors[4].score, quantize_score(std::f64::consts::FRAC_1_SQRT_2));

        for (neighbor, rating) in neighbors.iter().zip([1.0f64, 2.0, 3.0, 4.0, 5.0]) {
            let expected = 5.0 / (25.0 + rating * rating).sqrt();
            assert!((neighbor.score - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_tied_neighbor_at_cap_decides_top_product() {
        let snapshot = tied_neighbors_snapshot();

        let ranked = CollaborativeFilter::new().rank(&snapshot, "U0", 10);

        // P6 belongs to the excluded U6 and is never scored
        assert_eq!(ids(&snapshot, &ranked), vec!["P5", "P4", "P3", "P2", "P1"]);
    }

    #[test]
    fn test_scores_sum_rating_times_similarity() {
        let snapshot = tied_neighbors_snapshot();

        let ranked = CollaborativeFilter::new().rank(&snapshot, "U0", 10);

        // Each candidate is rated by exactly one neighbour: r * 5 / sqrt(25 + r^2)
        for (entry, rating) in ranked.iter().zip([5.0f64, 4.0, 3.0, 2.0, 1.0]) {
            let expected = rating * 5.0 / (25.0 + rating * rating).sqrt();
            assert!(
                (entry.score - expected).abs() < 1e-8,
                "{} != {}",
                entry.score,
                expected
            );
        }
    }

    #[test]
    fn test_scores_accumulate_over_neighbors() {
        // U2 and U3 both match U1 exactly on P1 and both rated P2
        let snapshot = snapshot(vec![
            tx("U1", "P1", 4),
            tx("U2", "P1", 4),
            tx("U2", "P2", 3),
            tx("U3", "P1", 2),
            tx("U3", "P2", 5),
            tx("U4", "P4", 1),
        ]);

        let ranked = CollaborativeFilter::new().rank(&snapshot, "U1", 10);
        let u1 = snapshot.user_position("U1").unwrap();
        let factors = snapshot.factorization().user_factors();
        let similarity = |other: &str| {
            let other = snapshot.user_position(other).unwrap();
            quantize_score(cosine_similarity(&factors.row(u1), &factors.row(other)))
        };
        let expected = 3.0 * similarity("U2") + 5.0 * similarity("U3");

        assert_eq!(ids(&snapshot, &ranked)[0], "P2");
        assert!((ranked[0].score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_single_user_yields_empty() {
        let users = vec![User::new("U1")];
        let products = vec![product("P1"), product("P2")];
        let snapshot = build_snapshot(
            users,
            products,
            vec![tx("U1", "P1", 4)],
            EngineConfig::default(),
        );

        assert!(CollaborativeFilter::new().rank(&snapshot, "U1", 5).is_empty());
    }
}
