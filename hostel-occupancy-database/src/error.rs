use std::env::VarError;

use diesel_async::pooled_connection::deadpool;
use hostel_occupancy_ledger::model::UnknownVariant;
use hostel_occupancy_ledger::LedgerError;
use thiserror::Error;

#[allow(clippy::module_name_repetitions)]
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database url not set in env variable DATABASE_URL")]
    DatabaseEnvUrl(#[from] VarError),
    #[error("Failed to create database pool {0}")]
    PoolBuild(#[from] deadpool::BuildError),
    #[error("Database pool failed {0}")]
    Pool(#[from] deadpool::PoolError),
    #[error("Database query failed {0}")]
    Database(#[from] diesel::result::Error),
    #[error("Database contains invalid data: {0}")]
    UnknownVariant(#[from] UnknownVariant),
    #[error("Database contains invalid {column} {value}")]
    OutOfRange { column: &'static str, value: i64 },
    /// A business rule rejected the operation inside a transaction.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<DatabaseError> for LedgerError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::Ledger(error) => error,
            other => Self::store(other),
        }
    }
}
