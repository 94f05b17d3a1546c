use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Diesel error: {0}")]
    Diesel(String),
    #[error("R2D2 error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Tokio error: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Corrupted record [{id}]: {msg}")]
    Corrupted { id: String, msg: String },
}

impl From<diesel::result::Error> for DbError {
    fn from(e: diesel::result::Error) -> Self {
        DbError::Diesel(format!("{:?}", e))
    }
}

impl From<diesel_migrations::RunMigrationsError> for DbError {
    fn from(e: diesel_migrations::RunMigrationsError) -> Self {
        DbError::Migration(e.to_string())
    }
}
