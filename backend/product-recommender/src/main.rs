use anyhow::{bail, Context};
use product_recommender::{
    Config, Dataset, RecommendationEngine, Snapshot, SnapshotStore, Strategy,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const USAGE: &str = "usage: product-recommender <user_id> [strategy] [count]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // Load config
    let config = Config::from_env().context("Failed to load config")?;

    let mut args = std::env::args().skip(1);
    let Some(user_id) = args.next() else {
        bail!(USAGE);
    };
    let strategy: Strategy = match args.next() {
        Some(tag) => tag.parse()?,
        None => Strategy::Hybrid,
    };
    let count: usize = match args.next() {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("Invalid count '{}'. {}", raw, USAGE))?,
        None => config.engine.default_count,
    };

    info!(
        "Starting {} with dataset {}",
        config.service.service_name, config.service.dataset_path
    );

    let raw = tokio::fs::read_to_string(&config.service.dataset_path)
        .await
        .with_context(|| format!("Failed to read dataset {}", config.service.dataset_path))?;
    let dataset = Dataset::from_json(&raw).context("Failed to parse dataset")?;

    // Factorization and vectorization are CPU-bound; keep them off the runtime threads
    let engine_config = config.engine.clone();
    let snapshot =
        tokio::task::spawn_blocking(move || Snapshot::from_dataset(dataset, engine_config))
            .await
            .context("Snapshot build task failed")?;
    let store = SnapshotStore::new(snapshot);

    let snapshot = store.current();
    let recommendations =
        RecommendationEngine::new().recommend(&snapshot, &user_id, strategy, count)?;

    for (rank, product_id) in recommendations.iter().enumerate() {
        let line = match snapshot.product(product_id) {
            Some(product) => serde_json::json!({
                "rank": rank + 1,
                "product_id": product_id,
                "name": product.name,
                "category": product.category,
                "brand": product.brand,
                "price": product.price,
                "rating": product.rating,
            }),
            None => serde_json::json!({ "rank": rank + 1, "product_id": product_id }),
        };
        println!("{}", line);
    }

    if recommendations.is_empty() {
        info!(user_id = %user_id, "No recommendation available");
    }

    Ok(())
}
