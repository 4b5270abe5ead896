use rota_storage::*;
use rota_store_memory::MemoryStore;
use rota_store_sqlite::SqliteStore;
use std::sync::Arc;

/// Prefix of database URLs that select the in-memory store.
pub const MEMORY_URL: &str = "memory:";

/// StoreBackend abstracts over the SQLite and in-memory implementations
#[derive(Clone)]
pub enum StoreBackend {
    Sqlite(Arc<SqliteStore>),
    Memory(Arc<MemoryStore>),
}

impl StoreBackend {
    /// Open the store a database URL points at: `memory:` or `sqlite://…`.
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        if url.starts_with(MEMORY_URL) {
            Ok(StoreBackend::Memory(Arc::new(MemoryStore::new())))
        } else {
            Ok(StoreBackend::Sqlite(Arc::new(SqliteStore::open(url).await?)))
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StoreBackend::Sqlite(_) => "sqlite",
            StoreBackend::Memory(_) => "memory",
        }
    }
}

#[async_trait::async_trait]
impl RoundStore for StoreBackend {
    async fn create_round(&self, params: &CreateRoundParams) -> Result<Round, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.create_round(params).await,
            StoreBackend::Memory(s) => s.create_round(params).await,
        }
    }

    async fn get_round(&self, id: &RoundId) -> Result<Round, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.get_round(id).await,
            StoreBackend::Memory(s) => s.get_round(id).await,
        }
    }

    async fn update_if_status(
        &self,
        id: &RoundId,
        expected: &Precondition,
        changes: &RoundChanges,
        outbox: &[NewNotification],
    ) -> Result<Round, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.update_if_status(id, expected, changes, outbox).await,
            StoreBackend::Memory(s) => s.update_if_status(id, expected, changes, outbox).await,
        }
    }

    async fn list_rounds_by_creator(&self, creator: &UserId) -> Result<Vec<Round>, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.list_rounds_by_creator(creator).await,
            StoreBackend::Memory(s) => s.list_rounds_by_creator(creator).await,
        }
    }

    async fn list_pending_rounds_for_candidate(
        &self,
        candidate: &UserId,
    ) -> Result<Vec<Round>, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.list_pending_rounds_for_candidate(candidate).await,
            StoreBackend::Memory(s) => s.list_pending_rounds_for_candidate(candidate).await,
        }
    }

    async fn enqueue_notifications(&self, rows: &[NewNotification]) -> Result<(), StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.enqueue_notifications(rows).await,
            StoreBackend::Memory(s) => s.enqueue_notifications(rows).await,
        }
    }

    async fn claim_notifications(&self, limit: usize) -> Result<Vec<OutboxMessage>, StoreError> {
        match self {
            StoreBackend::Sqlite(s) => s.claim_notifications(limit).await,
            StoreBackend::Memory(s) => s.claim_notifications(limit).await,
        }
    }
}
