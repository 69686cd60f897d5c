use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Stored row is not decodable: {0}")]
    Decode(String),
}

impl StoreError {
    /// True when the operation targeted a row that does not exist.
    pub fn is_row_not_found(&self) -> bool {
        matches!(self, StoreError::Sqlx(sqlx::Error::RowNotFound))
    }
}
