//! # Database Persistence Layer
//!
//! Postgres persistence via SQLx.
//!
//! The database layer is **optional**. When `DATABASE_URL` is set, every
//! write goes to Postgres first and the in-memory stores second, and the
//! stores are hydrated from the tables on startup. When absent, the API
//! runs in in-memory-only mode (development and tests).
//!
//! | Module | Table |
//! |--------|-------|
//! | [`accounts`] | `accounts` |
//! | [`documents`] | `credential_documents` |
//! | [`notifications`] | `notifications` |
//! | [`discrepancies`] | `reconciliation_discrepancies` |
//! | [`audit`] | `audit_events` |
//! | [`transitions`] | multi-row writes in one transaction |

pub mod accounts;
pub mod audit;
pub mod discrepancies;
pub mod documents;
pub mod notifications;
pub mod transitions;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set, running in-memory only mode. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Wrap a serialization failure as an encode error.
pub(crate) fn encode_error(e: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Encode(Box::new(e))
}

/// A stored value that does not map back onto the domain type.
pub(crate) fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        message,
    )))
}

/// `ContractId` to `BIGINT`.
pub(crate) fn contract_id_column(id: sphere_core::ContractId) -> Result<i64, sqlx::Error> {
    i64::try_from(id.value()).map_err(encode_error)
}

/// `BIGINT` to `ContractId`.
pub(crate) fn contract_id_from_column(raw: i64) -> Result<sphere_core::ContractId, sqlx::Error> {
    u64::try_from(raw)
        .map(sphere_core::ContractId::new)
        .map_err(|_| decode_error(format!("negative contract_id {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sphere_core::ContractId;

    #[test]
    fn contract_id_column_rejects_values_beyond_bigint() {
        assert_eq!(contract_id_column(ContractId::new(42)).unwrap(), 42);
        assert!(contract_id_column(ContractId::new(u64::MAX)).is_err());
    }

    #[test]
    fn contract_id_from_column_rejects_negative() {
        assert_eq!(contract_id_from_column(7).unwrap(), ContractId::new(7));
        assert!(contract_id_from_column(-1).is_err());
    }
}
