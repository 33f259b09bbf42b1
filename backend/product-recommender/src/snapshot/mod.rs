// ============================================
// Snapshot
// ============================================
//
// Immutable bundle of everything the strategies read: interaction matrix,
// truncated SVD factors, TF-IDF features, purchase sets and the popularity
// ranking. Built in one pass, then shared read-only behind an Arc.
// A rebuild produces a new Snapshot off to the side and swaps the pointer.

use crate::config::EngineConfig;
use crate::error::{RecommendError, Result};
use crate::metrics::RecommenderMetrics;
use crate::models::{
    Dataset, DatasetSummary, Product, PurchaseRecord, ScoredProduct, Transaction, User,
};
use crate::services::factorization::{Factorization, TruncatedSvd};
use crate::services::features::FeatureMatrix;
use crate::services::interaction::{IdIndex, InteractionMatrix};
use crate::services::recall::PopularityRanker;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Snapshot {
    users: IdIndex,
    products: IdIndex,
    catalog: HashMap<String, Product>,
    transactions: Vec<Transaction>,
    interactions: InteractionMatrix,
    factorization: Factorization,
    features: FeatureMatrix,
    /// user id -> distinct purchased product ids
    purchases: HashMap<String, BTreeSet<String>>,
    popularity: Vec<ScoredProduct>,
    summary: DatasetSummary,
    config: EngineConfig,
    built_at: DateTime<Utc>,
}

/// Build a snapshot from already-validated records. Deterministic in its inputs.
pub fn build_snapshot(
    users: Vec<User>,
    products: Vec<Product>,
    transactions: Vec<Transaction>,
    config: EngineConfig,
) -> Snapshot {
    let started = Instant::now();

    let user_index = IdIndex::new(users.iter().map(|u| u.user_id.clone()));
    let product_index = IdIndex::new(products.iter().map(|p| p.product_id.clone()));

    let interactions = InteractionMatrix::build(&transactions, &user_index, &product_index);
    let factorization = TruncatedSvd::new(config.svd_rank).fit_transform(interactions.ratings());
    let features = FeatureMatrix::build(&products, config.max_features);
    let popularity = PopularityRanker::score_products(&transactions, &product_index, &config);

    let mut purchases: HashMap<String, BTreeSet<String>> = HashMap::new();
    for tx in &transactions {
        purchases
            .entry(tx.user_id.clone())
            .or_default()
            .insert(tx.product_id.clone());
    }

    let summary = summarize(&user_index, &product_index, &transactions);

    let catalog: HashMap<String, Product> = products
        .into_iter()
        .map(|p| (p.product_id.clone(), p))
        .collect();

    let elapsed = started.elapsed();
    RecommenderMetrics::observe_snapshot_build(elapsed.as_secs_f64());

    info!(
        users = user_index.len(),
        products = product_index.len(),
        transactions = transactions.len(),
        vocabulary = features.dimension(),
        rank = factorization.rank(),
        elapsed_ms = elapsed.as_millis() as u64,
        "Snapshot built"
    );

    Snapshot {
        users: user_index,
        products: product_index,
        catalog,
        transactions,
        interactions,
        factorization,
        features,
        purchases,
        popularity,
        summary,
        config,
        built_at: Utc::now(),
    }
}

fn summarize(users: &IdIndex, products: &IdIndex, transactions: &[Transaction]) -> DatasetSummary {
    let mut rating_distribution = [0usize; 5];
    let mut rating_sum = 0.0;

    for tx in transactions {
        rating_sum += f64::from(tx.rating);
        if (1..=5).contains(&tx.rating) {
            rating_distribution[usize::from(tx.rating) - 1] += 1;
        }
    }

    let average_rating = if transactions.is_empty() {
        None
    } else {
        Some(rating_sum / transactions.len() as f64)
    };

    DatasetSummary {
        product_count: products.len(),
        user_count: users.len(),
        transaction_count: transactions.len(),
        average_rating,
        rating_distribution,
    }
}

impl Snapshot {
    pub fn from_dataset(dataset: Dataset, config: EngineConfig) -> Self {
        build_snapshot(dataset.users, dataset.products, dataset.transactions, config)
    }

    pub fn users(&self) -> &IdIndex {
        &self.users
    }

    /// Row of `user_id` in the interaction matrix.
    pub fn user_position(&self, user_id: &str) -> Result<usize> {
        self.users
            .position(user_id)
            .ok_or_else(|| RecommendError::UnknownUser(user_id.to_string()))
    }

    pub fn products(&self) -> &IdIndex {
        &self.products
    }

    pub fn product(&self, product_id: &str) -> Option<&Product> {
        self.catalog.get(product_id)
    }

    /// Map ranked positions back to product ids.
    pub fn product_ids(&self, ranked: &[ScoredProduct]) -> Vec<String> {
        ranked
            .iter()
            .filter_map(|s| self.products.id(s.index))
            .map(str::to_string)
            .collect()
    }

    pub fn interactions(&self) -> &InteractionMatrix {
        &self.interactions
    }

    pub fn factorization(&self) -> &Factorization {
        &self.factorization
    }

    pub fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    pub fn purchased_products(&self, user_id: &str) -> Option<&BTreeSet<String>> {
        self.purchases.get(user_id)
    }

    /// Full popularity ranking, best first.
    pub fn popularity(&self) -> &[ScoredProduct] {
        &self.popularity
    }

    pub fn summary(&self) -> &DatasetSummary {
        &self.summary
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// The user's transactions in input order joined with catalog data.
    /// Transactions on products missing from the catalog are left out.
    pub fn purchase_history(&self, user_id: &str) -> Vec<PurchaseRecord> {
        self.transactions
            .iter()
            .filter(|tx| tx.user_id == user_id)
            .filter_map(|tx| {
                self.catalog.get(&tx.product_id).map(|product| PurchaseRecord {
                    product_id: tx.product_id.clone(),
                    name: product.name.clone(),
                    category: product.category.clone(),
                    user_rating: tx.rating,
                    price: product.price,
                    quantity: tx.quantity,
                    timestamp: tx.timestamp,
                })
            })
            .collect()
    }

    /// Purchase counts per category, most purchased first, then by name.
    pub fn category_preferences(&self, user_id: &str) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for record in self.purchase_history(user_id) {
            *counts.entry(record.category).or_insert(0) += 1;
        }

        let mut preferences: Vec<(String, usize)> = counts.into_iter().collect();
        preferences.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        preferences
    }
}

/// Holder of the current snapshot.
///
/// Readers clone the Arc and release the lock before scoring; writers swap a
/// fully built snapshot in, so a request never observes a partial rebuild.
#[derive(Debug)]
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotStore {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// Replace the current snapshot, returning the previous one.
    pub fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let next = Arc::new(snapshot);
        let previous = std::mem::replace(&mut *self.current.write(), next);

        info!("Snapshot published");
        previous
    }

    /// Build from a new dataset outside the lock, then publish.
    pub fn rebuild(&self, dataset: Dataset, config: EngineConfig) -> Arc<Snapshot> {
        let snapshot = Snapshot::from_dataset(dataset, config);
        self.publish(snapshot);
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn product(id: &str, category: &str) -> Product {
        Product {
            product_id: id.to_string(),
            name: format!("Product {}", id),
            category: category.to_string(),
            brand: "Samsung".to_string(),
            price: 99.5,
            rating: 4.0,
            description: "High quality product".to_string(),
        }
    }

    fn tx(user: &str, product: &str, rating: u8) -> Transaction {
        Transaction {
            transaction_id: String::new(),
            user_id: user.to_string(),
            product_id: product.to_string(),
            rating,
            quantity: 2,
            timestamp: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        }
    }

    fn dataset() -> Dataset {
        Dataset {
            users: vec![User::new("U2"), User::new("U1")],
            products: vec![
                product("P2", "Books"),
                product("P1", "Electronics"),
                product("P3", "Books"),
            ],
            transactions: vec![
                tx("U1", "P1", 5),
                tx("U1", "P2", 3),
                tx("U1", "P3", 4),
                tx("U2", "P1", 4),
                tx("U1", "P9", 2),
            ],
        }
    }

    #[test]
    fn test_indices_are_sorted() {
        let snapshot = Snapshot::from_dataset(dataset(), EngineConfig::default());

        assert_eq!(snapshot.users().ids(), &["U1", "U2"]);
        assert_eq!(snapshot.products().ids(), &["P1", "P2", "P3"]);
        assert_eq!(snapshot.interactions().rating(0, 0), 5.0);
        assert_eq!(snapshot.user_position("U2"), Ok(1));
        assert_eq!(
            snapshot.user_position("U7"),
            Err(RecommendError::UnknownUser("U7".to_string()))
        );
    }

    #[test]
    fn test_summary() {
        let snapshot = Snapshot::from_dataset(dataset(), EngineConfig::default());
        let summary = snapshot.summary();

        assert_eq!(summary.user_count, 2);
        assert_eq!(summary.product_count, 3);
        assert_eq!(summary.transaction_count, 5);
        assert!((summary.average_rating.unwrap() - 3.6).abs() < 1e-9);
        assert_eq!(summary.rating_distribution, [0, 1, 1, 2, 1]);
    }

    #[test]
    fn test_empty_summary_has_no_average() {
        let snapshot = Snapshot::from_dataset(Dataset::default(), EngineConfig::default());
        assert_eq!(snapshot.summary().average_rating, None);
        assert!(snapshot.popularity().is_empty());
    }

    #[test]
    fn test_purchase_history_and_categories() {
        let snapshot = Snapshot::from_dataset(dataset(), EngineConfig::default());

        let history = snapshot.purchase_history("U1");
        let ids: Vec<&str> = history.iter().map(|r| r.product_id.as_str()).collect();
        assert_eq!(ids, vec!["P1", "P2", "P3"]);
        assert_eq!(history[0].user_rating, 5);
        assert_eq!(history[0].quantity, 2);

        assert_eq!(
            snapshot.category_preferences("U1"),
            vec![("Books".to_string(), 2), ("Electronics".to_string(), 1)]
        );
        assert!(snapshot.purchase_history("U3").is_empty());
    }

    #[test]
    fn test_purchases_are_distinct() {
        let mut data = dataset();
        data.transactions.push(tx("U2", "P1", 2));
        let snapshot = Snapshot::from_dataset(data, EngineConfig::default());

        assert_eq!(snapshot.purchased_products("U2").unwrap().len(), 1);
        assert!(snapshot.purchased_products("U3").is_none());
    }

    #[test]
    fn test_store_publish_swaps_snapshot() {
        let store = SnapshotStore::new(Snapshot::from_dataset(
            Dataset::default(),
            EngineConfig::default(),
        ));
        let before = store.current();
        assert_eq!(before.summary().transaction_count, 0);

        let after = store.rebuild(dataset(), EngineConfig::default());

        assert_eq!(after.summary().transaction_count, 5);
        assert_eq!(store.current().summary().transaction_count, 5);
        // Readers holding the old Arc keep a consistent view
        assert_eq!(before.summary().transaction_count, 0);
    }
}
