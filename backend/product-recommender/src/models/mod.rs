use crate::error::RecommendError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Demographic fields are carried for callers but never used in scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub user_id: String,
    #[serde(default, flatten)]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl User {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            attributes: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub product_id: String,
    #[serde(default)]
    pub name: String,
    pub category: String,
    pub brand: String,
    #[serde(default)]
    pub price: f64,
    /// Aggregate catalog rating, independent of transaction ratings
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub description: String,
}

impl Product {
    /// Text fed to the vectorizer: category, brand and description.
    pub fn feature_text(&self) -> String {
        format!("{} {} {}", self.category, self.brand, self.description)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    #[serde(default)]
    pub transaction_id: String,
    pub user_id: String,
    pub product_id: String,
    /// 1..=5, validated upstream
    pub rating: u8,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub timestamp: DateTime<Utc>,
}

impl Dataset {
    pub fn from_json(raw: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

fn default_quantity() -> u32 {
    1
}

/// Already-parsed tabular input for one snapshot build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Strategy {
    Hybrid,
    Collaborative,
    Content,
    Popular,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Hybrid => "hybrid",
            Strategy::Collaborative => "collaborative",
            Strategy::Content => "content",
            Strategy::Popular => "popular",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = RecommendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hybrid" => Ok(Strategy::Hybrid),
            "collaborative" | "collaborative filtering" | "cf" => Ok(Strategy::Collaborative),
            "content" | "content-based" | "cb" => Ok(Strategy::Content),
            "popular" | "popular items" | "popularity" => Ok(Strategy::Popular),
            other => Err(RecommendError::InvalidRequest(format!(
                "unknown strategy '{}'",
                other
            ))),
        }
    }
}

/// Product id with the score it was ranked by.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredProduct {
    pub index: usize,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DatasetSummary {
    pub product_count: usize,
    pub user_count: usize,
    pub transaction_count: usize,
    /// None when there are no transactions
    pub average_rating: Option<f64>,
    /// Index 0 counts rating 1, index 4 counts rating 5
    pub rating_distribution: [usize; 5],
}

/// One row of a user's purchase history joined with catalog data.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PurchaseRecord {
    pub product_id: String,
    pub name: String,
    pub category: String,
    pub user_rating: u8,
    pub price: f64,
    pub quantity: u32,
    pub timestamp: DateTime<Utc>,
}
