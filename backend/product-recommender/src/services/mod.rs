pub mod engine;
pub mod factorization;
pub mod features;
pub mod hybrid;
pub mod interaction;
pub mod recall;

pub use engine::RecommendationEngine;
pub use features::FeatureMatrix;
pub use hybrid::HybridCombiner;
pub use interaction::{IdIndex, InteractionMatrix};
pub use recall::{CollaborativeFilter, ContentFilter, PopularityRanker, RecommendStrategy};
