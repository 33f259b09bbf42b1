// ============================================
// Interaction Matrix Builder
// ============================================
//
// Dense user x product rating matrix. Rows and columns follow the sorted
// id order so two builds over the same data index identically.
// Repeated (user, product) pairs keep the last rating in input order.

use crate::models::Transaction;
use ndarray::{Array2, ArrayView1};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Sorted, de-duplicated identifiers with reverse lookup.
#[derive(Debug, Clone, Default)]
pub struct IdIndex {
    ids: Vec<String>,
    positions: HashMap<String, usize>,
}

impl IdIndex {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        ids.sort();
        ids.dedup();

        let positions = ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx))
            .collect();

        Self { ids, positions }
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn id(&self, position: usize) -> Option<&str> {
        self.ids.get(position).map(String::as_str)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct InteractionMatrix {
    ratings: Array2<f64>,
}

impl InteractionMatrix {
    /// Build the matrix; transactions naming ids outside the index sets are skipped.
    pub fn build(transactions: &[Transaction], users: &IdIndex, products: &IdIndex) -> Self {
        let mut ratings = Array2::<f64>::zeros((users.len(), products.len()));
        let mut skipped = 0usize;

        for tx in transactions {
            match (users.position(&tx.user_id), products.position(&tx.product_id)) {
                (Some(u), Some(p)) => ratings[[u, p]] = f64::from(tx.rating),
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(
                skipped = skipped,
                "Transactions referencing unknown users or products were ignored"
            );
        }

        debug!(
            users = users.len(),
            products = products.len(),
            transactions = transactions.len(),
            "Interaction matrix built"
        );

        Self { ratings }
    }

    pub fn ratings(&self) -> &Array2<f64> {
        &self.ratings
    }

    pub fn rating(&self, user: usize, product: usize) -> f64 {
        self.ratings[[user, product]]
    }

    pub fn user_row(&self, user: usize) -> ArrayView1<'_, f64> {
        self.ratings.row(user)
    }

    /// True when the user has at least one non-zero cell.
    pub fn has_ratings(&self, user: usize) -> bool {
        self.ratings.row(user).iter().any(|r| *r != 0.0)
    }

    pub fn dim(&self) -> (usize, usize) {
        self.ratings.dim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn tx(user: &str, product: &str, rating: u8) -> Transaction {
        Transaction {
            transaction_id: String::new(),
            user_id: user.to_string(),
            product_id: product.to_string(),
            rating,
            quantity: 1,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_id_index_is_sorted() {
        let index = IdIndex::new(vec!["U3", "U1", "U2", "U1"]);
        assert_eq!(index.ids(), &["U1", "U2", "U3"]);
        assert_eq!(index.position("U2"), Some(1));
        assert_eq!(index.id(2), Some("U3"));
        assert_eq!(index.position("U9"), None);
    }

    #[test]
    fn test_last_write_wins() {
        let users = IdIndex::new(vec!["U1"]);
        let products = IdIndex::new(vec!["P1"]);
        let matrix = InteractionMatrix::build(
            &[tx("U1", "P1", 2), tx("U1", "P1", 5), tx("U1", "P1", 3)],
            &users,
            &products,
        );

        assert_eq!(matrix.rating(0, 0), 3.0);
    }

    #[test]
    fn test_empty_transactions_yield_zero_matrix() {
        let users = IdIndex::new(vec!["U1", "U2"]);
        let products = IdIndex::new(vec!["P1", "P2", "P3"]);
        let matrix = InteractionMatrix::build(&[], &users, &products);

        assert_eq!(matrix.dim(), (2, 3));
        assert!(matrix.ratings().iter().all(|r| *r == 0.0));
        assert!(!matrix.has_ratings(0));
    }

    #[test]
    fn test_unknown_ids_are_skipped() {
        let users = IdIndex::new(vec!["U1"]);
        let products = IdIndex::new(vec!["P1"]);
        let matrix =
            InteractionMatrix::build(&[tx("U9", "P1", 4), tx("U1", "P9", 4)], &users, &products);

        assert!(!matrix.has_ratings(0));
    }
}
