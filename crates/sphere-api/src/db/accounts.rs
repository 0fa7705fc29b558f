//! Account persistence.
//!
//! The tagged `Account` JSON is stored whole in `payload`; `email`,
//! `wallet_address` and `organization_type` are copied into columns for
//! the unique constraints and the directory filter.

use sphere_core::Account;
use sqlx::{PgExecutor, PgPool};

use super::{decode_error, encode_error};

fn payload(account: &Account) -> Result<serde_json::Value, sqlx::Error> {
    serde_json::to_value(account).map_err(|e| {
        tracing::error!(error = %e, id = %account.id(), "failed to serialize account");
        encode_error(e)
    })
}

/// Insert a new account. Duplicate emails or wallets surface as a
/// database error for which `is_unique_violation()` holds.
pub async fn insert<'e, E: PgExecutor<'e>>(exec: E, account: &Account) -> Result<(), sqlx::Error> {
    let (organization_type, created_at) = match account {
        Account::User(u) => (None, u.created_at),
        Account::Organization(o) => (Some(o.organization_type.as_str()), o.created_at),
    };
    sqlx::query(
        "INSERT INTO accounts (id, kind, email, wallet_address, organization_type, payload,
         created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $7)",
    )
    .bind(account.id())
    .bind(account.kind())
    .bind(account.email())
    .bind(account.wallet_address().map(|w| w.as_str()))
    .bind(organization_type)
    .bind(payload(account)?)
    .bind(created_at)
    .execute(exec)
    .await?;
    Ok(())
}

/// Rewrite the stored profile, e.g. after a credential was appended.
pub async fn update_payload<'e, E: PgExecutor<'e>>(
    exec: E,
    account: &Account,
) -> Result<(), sqlx::Error> {
    let result = sqlx::query("UPDATE accounts SET payload = $1, updated_at = NOW() WHERE id = $2")
        .bind(payload(account)?)
        .bind(account.id())
        .execute(exec)
        .await?;
    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

/// Load all accounts on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Account>, sqlx::Error> {
    let rows: Vec<(uuid::Uuid, serde_json::Value)> =
        sqlx::query_as("SELECT id, payload FROM accounts ORDER BY created_at")
            .fetch_all(pool)
            .await?;

    rows.into_iter()
        .map(|(id, value)| {
            serde_json::from_value::<Account>(value)
                .map_err(|e| decode_error(format!("account {id}: {e}")))
        })
        .collect()
}

/// Whether a database error is a unique-constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
