use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// JSON document with users, products and transactions
    #[serde(default = "default_dataset_path")]
    pub dataset_path: String,
}

fn default_service_name() -> String {
    "product-recommender".to_string()
}

fn default_dataset_path() -> String {
    "data/dataset.json".to_string()
}

/// Scoring parameters frozen into every snapshot.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Rank of the truncated factorization, clamped to the matrix dimensions
    pub svd_rank: usize,
    /// Similar users consulted by the collaborative filter
    pub neighbor_count: usize,
    /// Vocabulary cap for the TF-IDF vectorizer
    pub max_features: usize,
    pub cf_weight: f64,
    pub cb_weight: f64,
    pub popularity_rating_weight: f64,
    pub popularity_frequency_weight: f64,
    pub default_count: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            svd_rank: 10,
            neighbor_count: 5,
            max_features: 100,
            cf_weight: 0.6,
            cb_weight: 0.4,
            popularity_rating_weight: 0.7,
            popularity_frequency_weight: 0.3,
            default_count: 5,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.svd_rank == 0 {
            return Err(ConfigError::Invalid("svd_rank must be positive".to_string()));
        }

        if self.neighbor_count == 0 {
            return Err(ConfigError::Invalid(
                "neighbor_count must be positive".to_string(),
            ));
        }

        if self.max_features == 0 {
            return Err(ConfigError::Invalid(
                "max_features must be positive".to_string(),
            ));
        }

        let weights = [
            self.cf_weight,
            self.cb_weight,
            self.popularity_rating_weight,
            self.popularity_frequency_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::Invalid(
                "all weights must be finite and non-negative".to_string(),
            ));
        }

        Ok(())
    }
}

impl Config {
    /// SERVICE_NAME / DATASET_PATH plus RECOMMENDER_* engine overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let service: ServiceConfig = envy::from_env()?;
        let engine: EngineConfig = envy::prefixed("RECOMMENDER_").from_env()?;
        engine.validate()?;

        Ok(Config { service, engine })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_engine_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.svd_rank, 10);
        assert_eq!(config.neighbor_count, 5);
    }

    #[test]
    fn test_rejects_negative_weight() {
        let config = EngineConfig {
            cb_weight: -0.4,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_zero_rank() {
        let config = EngineConfig {
            svd_rank: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_engine_config_from_pairs() {
        let vars = vec![
            ("RECOMMENDER_SVD_RANK".to_string(), "4".to_string()),
            ("RECOMMENDER_CF_WEIGHT".to_string(), "0.5".to_string()),
        ];
        let config: EngineConfig = envy::prefixed("RECOMMENDER_")
            .from_iter(vars)
            .unwrap();

        assert_eq!(config.svd_rank, 4);
        assert_eq!(config.cf_weight, 0.5);
        assert_eq!(config.max_features, 100);
    }
}
