//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! ## Architecture
//!
//! - **Documents**: uploaded certificates and degrees with their payment link
//! - **Notifications**: the organizations' review queues
//! - **Accounts**: user and organization profiles
//! - **Discrepancies**: chain/off-chain divergences awaiting an operator
//! - **Ledger**: the credential contract adapter, when configured
//! - **Content client**: the pinning service, when configured
//!
//! Postgres is the durable copy. The stores are hydrated from it on startup
//! and written after every successful database write.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use sphere_content_client::ContentClient;
use sphere_core::{Account, CredentialDocument, Notification, ReconciliationDiscrepancy};
use sphere_ledger::CredentialLedger;
use sqlx::PgPool;
use uuid::Uuid;

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// All operations are synchronous (the RwLock is `parking_lot`, not `tokio::sync`)
/// because the lock is never held across `.await` points.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: Uuid, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Retrieve a record by ID.
    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// List all records.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// Records matching a predicate, cloned under one read lock.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data
            .read()
            .values()
            .filter(|v| pred(v))
            .cloned()
            .collect()
    }

    /// First record matching a predicate.
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.data.read().values().find(|v| pred(v)).cloned()
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- In-Flight Guard ----------------------------------------------------------

/// Something a payment report or decision holds exclusively while it runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Claim {
    Document(Uuid),
    /// A reported transaction hash, lowercase.
    Transaction(String),
    /// A reported contract id.
    Contract(u64),
}

impl std::fmt::Display for Claim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Claim::Document(id) => write!(f, "document {id}"),
            Claim::Transaction(hash) => write!(f, "transaction {hash}"),
            Claim::Contract(id) => write!(f, "contract id {id}"),
        }
    }
}

/// Claims held by payment reports and decisions currently running.
///
/// A second request for a held claim fails fast instead of queueing
/// behind the first one's chain call.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    active: Arc<Mutex<HashSet<Claim>>>,
}

impl InFlight {
    /// Claim a document. `None` if another request holds it.
    pub fn try_acquire(&self, id: Uuid) -> Option<InFlightGuard> {
        self.try_acquire_all([Claim::Document(id)])
    }

    /// Take every claim or none of them. `None` if any is already held.
    pub fn try_acquire_all(
        &self,
        claims: impl IntoIterator<Item = Claim>,
    ) -> Option<InFlightGuard> {
        let claims: Vec<Claim> = claims.into_iter().collect();
        let mut active = self.active.lock();
        if claims.iter().any(|c| active.contains(c)) {
            return None;
        }
        active.extend(claims.iter().cloned());
        Some(InFlightGuard {
            active: Arc::clone(&self.active),
            claims,
        })
    }

    /// Whether a claim is currently held.
    pub fn is_active(&self, claim: &Claim) -> bool {
        self.active.lock().contains(claim)
    }
}

/// Releases its claims on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    active: Arc<Mutex<HashSet<Claim>>>,
    claims: Vec<Claim>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut active = self.active.lock();
        for claim in &self.claims {
            active.remove(claim);
        }
    }
}

// -- Configuration ------------------------------------------------------------

/// Application configuration.
///
/// Custom `Debug` redacts `auth_token`.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Shared secret for bearer authentication. `None` disables auth.
    pub auth_token: Option<String>,
    /// Record declines on chain as well as accepts. When `false` a decline
    /// is off-chain only and the contract keeps holding the fee.
    pub decline_on_chain: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("decline_on_chain", &self.decline_on_chain)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            decline_on_chain: true,
        }
    }
}

// -- Application State --------------------------------------------------------

/// Shared application state accessible to all route handlers.
///
/// Clone-friendly via `Arc` internals in each `Store`.
#[derive(Debug, Clone)]
pub struct AppState {
    pub documents: Store<CredentialDocument>,
    pub notifications: Store<Notification>,
    pub accounts: Store<Account>,
    pub discrepancies: Store<ReconciliationDiscrepancy>,

    /// Documents with a payment report or decision in progress.
    pub in_flight: InFlight,

    // -- Database persistence (optional) --
    /// When `Some`, every write goes to Postgres before the stores are
    /// touched. When `None`, the API runs in in-memory-only mode.
    pub db_pool: Option<PgPool>,

    // -- External services --
    /// Credential contract adapter. Payment and decision endpoints return
    /// 503 without it.
    pub ledger: Option<Arc<dyn CredentialLedger>>,
    /// Pinning service. Uploads return 503 without it.
    pub content: Option<ContentClient>,

    pub config: AppConfig,
}

impl AppState {
    /// Default configuration, no database, no external services.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// The given configuration, no database, no external services.
    pub fn with_config(config: AppConfig) -> Self {
        Self {
            documents: Store::new(),
            notifications: Store::new(),
            accounts: Store::new(),
            discrepancies: Store::new(),
            in_flight: InFlight::default(),
            db_pool: None,
            ledger: None,
            content: None,
            config,
        }
    }

    /// Attach the credential contract adapter.
    pub fn with_ledger(mut self, ledger: Arc<dyn CredentialLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Attach the pinning service client.
    pub fn with_content_client(mut self, client: ContentClient) -> Self {
        self.content = Some(client);
        self
    }

    /// Attach a database pool.
    pub fn with_db_pool(mut self, pool: PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Hydrate in-memory stores from the database.
    ///
    /// Called once on startup when a database pool is available. Documents
    /// that fail their invariant check are logged and left out of the store
    /// so that no handler acts on them.
    pub async fn hydrate_from_db(&self) -> Result<(), String> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        // Load accounts
        let accounts = crate::db::accounts::load_all(pool)
            .await
            .map_err(|e| format!("failed to load accounts: {e}"))?;
        let account_count = accounts.len();
        for account in accounts {
            self.accounts.insert(account.id(), account);
        }

        // Load documents
        let documents = crate::db::documents::load_all(pool)
            .await
            .map_err(|e| format!("failed to load documents: {e}"))?;
        let mut document_count = 0usize;
        for doc in documents {
            if let Err(reason) = doc.check_invariants() {
                tracing::error!(document_id = %doc.id, %reason, "skipping inconsistent document row");
                continue;
            }
            self.documents.insert(*doc.id.as_uuid(), doc);
            document_count += 1;
        }

        // Load notifications
        let notifications = crate::db::notifications::load_all(pool)
            .await
            .map_err(|e| format!("failed to load notifications: {e}"))?;
        let notification_count = notifications.len();
        for n in notifications {
            self.notifications.insert(*n.id.as_uuid(), n);
        }

        // Load discrepancies
        let discrepancies = crate::db::discrepancies::load_all(pool)
            .await
            .map_err(|e| format!("failed to load discrepancies: {e}"))?;
        let discrepancy_count = discrepancies.len();
        for d in discrepancies {
            self.discrepancies.insert(*d.id.as_uuid(), d);
        }

        tracing::info!(
            accounts = account_count,
            documents = document_count,
            notifications = notification_count,
            discrepancies = discrepancy_count,
            "Hydrated in-memory stores from database"
        );

        Ok(())
    }

    /// Whether a document has an unresolved discrepancy.
    pub fn has_discrepancy(&self, document_id: &sphere_core::DocumentId) -> bool {
        self.discrepancies
            .find(|d| d.document_id == *document_id)
            .is_some()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
