// ============================================
// Feature Vectorizer
// ============================================
//
// TF-IDF vectors over category, brand and description text.
// Vocabulary is frozen at build time; a product absent from the build
// has no vector and lookups fail with UnknownProduct.

pub mod stopwords;

use crate::error::{RecommendError, Result};
use crate::models::Product;
use crate::services::interaction::IdIndex;
use crate::utils::normalize_vector;
use ndarray::{Array2, ArrayView1};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

pub use stopwords::is_stop_word;

static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("token pattern is valid"));

/// Lowercased word tokens of length >= 2, stop words removed.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|t| !is_stop_word(t))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    products: IdIndex,
    /// Column order, lexicographic
    vocabulary: Vec<String>,
    idf: Vec<f64>,
    /// One L2-normalized row per product, in product index order
    vectors: Array2<f64>,
}

impl FeatureMatrix {
    pub fn build(products: &[Product], max_features: usize) -> Self {
        let index = IdIndex::new(products.iter().map(|p| p.product_id.clone()));

        // Later duplicates overwrite earlier ones, same as the catalog lookup
        let mut by_id: HashMap<&str, &Product> = HashMap::new();
        for product in products {
            by_id.insert(product.product_id.as_str(), product);
        }

        let documents: Vec<Vec<String>> = index
            .ids()
            .iter()
            .map(|id| {
                by_id
                    .get(id.as_str())
                    .map(|p| tokenize(&p.feature_text()))
                    .unwrap_or_default()
            })
            .collect();

        let vocabulary = select_vocabulary(&documents, max_features);
        let columns: HashMap<&str, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(i, t)| (t.as_str(), i))
            .collect();

        let n_documents = documents.len() as f64;
        let mut document_frequency = vec![0usize; vocabulary.len()];
        for doc in &documents {
            let unique: HashSet<usize> = doc
                .iter()
                .filter_map(|t| columns.get(t.as_str()).copied())
                .collect();
            for col in unique {
                document_frequency[col] += 1;
            }
        }

        let idf: Vec<f64> = document_frequency
            .iter()
            .map(|df| ((1.0 + n_documents) / (1.0 + *df as f64)).ln() + 1.0)
            .collect();

        let mut vectors = Array2::<f64>::zeros((documents.len(), vocabulary.len()));
        for (row, doc) in documents.iter().enumerate() {
            for term in doc {
                if let Some(&col) = columns.get(term.as_str()) {
                    vectors[[row, col]] += 1.0;
                }
            }
            for (col, weight) in idf.iter().enumerate() {
                vectors[[row, col]] *= weight;
            }
            normalize_vector(&mut vectors.row_mut(row));
        }

        debug!(
            products = index.len(),
            vocabulary = vocabulary.len(),
            "Feature matrix built"
        );

        Self {
            products: index,
            vocabulary,
            idf,
            vectors,
        }
    }

    pub fn vector(&self, product_id: &str) -> Result<ArrayView1<'_, f64>> {
        self.products
            .position(product_id)
            .map(|idx| self.vectors.row(idx))
            .ok_or_else(|| RecommendError::UnknownProduct(product_id.to_string()))
    }

    pub fn row(&self, index: usize) -> ArrayView1<'_, f64> {
        self.vectors.row(index)
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    pub fn product_count(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn dimension(&self) -> usize {
        self.vectors.ncols()
    }
}

/// Top `max_features` terms by corpus frequency, ties by term; returned sorted.
fn select_vocabulary(documents: &[Vec<String>], max_features: usize) -> Vec<String> {
    let mut frequency: BTreeMap<&str, usize> = BTreeMap::new();
    for doc in documents {
        for term in doc {
            *frequency.entry(term.as_str()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = frequency.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(max_features);

    let mut vocabulary: Vec<String> = ranked.into_iter().map(|(t, _)| t.to_string()).collect();
    vocabulary.sort();
    vocabulary
}
