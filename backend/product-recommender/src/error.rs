use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecommendError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecommendError {
    /// Caller-side mistakes: zero count, unknown strategy tag.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Product was not part of the snapshot the feature matrix was built from.
    #[error("Unknown product: {0}")]
    UnknownProduct(String),

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Dataset error: {0}")]
    Dataset(String),
}

impl RecommendError {
    /// Conditions that strategies absorb by falling back to popularity.
    pub fn is_fallback(&self) -> bool {
        matches!(
            self,
            RecommendError::UnknownProduct(_) | RecommendError::UnknownUser(_)
        )
    }
}

impl From<serde_json::Error> for RecommendError {
    fn from(err: serde_json::Error) -> Self {
        RecommendError::Dataset(err.to_string())
    }
}
