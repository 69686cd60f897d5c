//! Postgres persistence for incidents and derived scam patterns.
//!
//! Runtime-bound sqlx queries; document-shaped fields (scammer details, ML
//! annotation, keywords, distributions) live in JSONB columns and round-trip
//! through `serde_json`.

mod error;
mod incidents;
mod patterns;
mod rows;

pub use error::StoreError;
pub use incidents::IncidentRepo;
pub use patterns::PatternRepo;

use sqlx::PgPool;

/// Connect a pool and run the embedded migrations.
pub async fn connect(database_url: &str) -> Result<PgPool, StoreError> {
    let pool = PgPool::connect(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}
