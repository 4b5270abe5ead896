use chrono::{DateTime, Utc};
use rota_storage::{
    Channel, CreateRoundParams, NewNotification, NotificationKind, OutboxId, OutboxMessage,
    Precondition, Progress, Round, RoundChanges, RoundId, RoundMode, RoundStatus, RoundStore,
    StoreError, TargetId, UserId,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const ROUND_COLUMNS: &str =
    "id, creator_id, target_id, mode, status, pointer_index, revision, created_at, updated_at";

pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct RoundRow {
    id: String,
    creator_id: String,
    target_id: String,
    mode: String,
    status: String,
    pointer_index: i64,
    revision: i64,
    created_at: i64,
    updated_at: i64,
}

#[derive(sqlx::FromRow)]
struct OutboxRow {
    seq: i64,
    id: String,
    round_id: String,
    recipient_id: String,
    kind: String,
    channel: String,
    title: String,
    body: String,
    created_at: i64,
}

fn backend(e: impl ToString) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn parse_uuid(s: &str) -> Result<Uuid, StoreError> {
    Uuid::try_parse(s).map_err(backend)
}

fn parse_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Backend(format!("invalid timestamp {}", ms)))
}

impl SqliteStore {
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(backend)?
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(backend)?;

        MIGRATOR.run(&pool).await.map_err(backend)?;

        Ok(Self { pool })
    }

    async fn hydrate(&self, row: RoundRow) -> Result<Round, StoreError> {
        let candidates = sqlx::query_as::<_, (String, Option<i64>)>(
            "SELECT user_id, declined_seq FROM round_candidates WHERE round_id = ? ORDER BY position",
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut order = Vec::with_capacity(candidates.len());
        let mut declined: Vec<(i64, UserId)> = Vec::new();
        for (user_id, declined_seq) in candidates {
            let user = UserId(parse_uuid(&user_id)?);
            if let Some(seq) = declined_seq {
                declined.push((seq, user.clone()));
            }
            order.push(user);
        }
        declined.sort_by_key(|(seq, _)| *seq);

        let mode = RoundMode::from_str(&row.mode).map_err(backend)?;
        let status = RoundStatus::from_str(&row.status).map_err(backend)?;
        let pointer = usize::try_from(row.pointer_index).map_err(backend)?;
        let progress = match mode {
            RoundMode::Sequential => Progress::Sequential { pointer },
            RoundMode::Parallel => Progress::Parallel {
                declined: declined.into_iter().map(|(_, u)| u).collect(),
                accepted: (status == RoundStatus::Accepted).then_some(pointer),
            },
        };

        Ok(Round {
            id: RoundId(parse_uuid(&row.id)?),
            creator_id: UserId(parse_uuid(&row.creator_id)?),
            target_id: TargetId(parse_uuid(&row.target_id)?),
            candidates: order,
            progress,
            status,
            revision: row.revision,
            created_at: parse_millis(row.created_at)?,
            updated_at: parse_millis(row.updated_at)?,
        })
    }

    async fn hydrate_all(&self, rows: Vec<RoundRow>) -> Result<Vec<Round>, StoreError> {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(self.hydrate(row).await?);
        }
        Ok(out)
    }

    async fn insert_outbox(
        tx: &mut Transaction<'_, Sqlite>,
        rows: &[NewNotification],
    ) -> Result<(), StoreError> {
        let now = Utc::now().timestamp_millis();
        for n in rows {
            sqlx::query(
                "INSERT INTO notification_outbox(id,round_id,recipient_id,kind,channel,title,body,created_at)
                 VALUES(?,?,?,?,?,?,?,?)",
            )
            .bind(Uuid::now_v7().to_string())
            .bind(n.round_id.0.to_string())
            .bind(n.recipient_id.0.to_string())
            .bind(n.kind.as_str())
            .bind(n.channel.as_str())
            .bind(&n.title)
            .bind(&n.body)
            .bind(now)
            .execute(&mut **tx)
            .await
            .map_err(backend)?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RoundStore for SqliteStore {
    // ───────────────────────────── Rounds ─────────────────────────────

    async fn create_round(&self, params: &CreateRoundParams) -> Result<Round, StoreError> {
        let now = Utc::now().timestamp_millis();
        let round_id = params.id.0.to_string();
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(
            "INSERT INTO rounds(id,creator_id,target_id,mode,status,pointer_index,revision,created_at,updated_at)
             VALUES(?,?,?,?,'pending',0,0,?,?)",
        )
        .bind(&round_id)
        .bind(params.creator_id.0.to_string())
        .bind(params.target_id.0.to_string())
        .bind(params.mode.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            let s = e.to_string();
            if s.contains("UNIQUE") {
                StoreError::AlreadyExists
            } else {
                StoreError::Backend(s)
            }
        })?;

        for (position, user) in params.candidates.iter().enumerate() {
            sqlx::query("INSERT INTO round_candidates(round_id,position,user_id) VALUES(?,?,?)")
                .bind(&round_id)
                .bind(position as i64)
                .bind(user.0.to_string())
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        self.get_round(&params.id).await
    }

    async fn get_round(&self, id: &RoundId) -> Result<Round, StoreError> {
        let row = sqlx::query_as::<_, RoundRow>(&format!(
            "SELECT {} FROM rounds WHERE id = ?",
            ROUND_COLUMNS
        ))
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            None => Err(StoreError::NotFound),
            Some(row) => self.hydrate(row).await,
        }
    }

    async fn update_if_status(
        &self,
        id: &RoundId,
        expected: &Precondition,
        changes: &RoundChanges,
        outbox: &[NewNotification],
    ) -> Result<Round, StoreError> {
        let round_id = id.0.to_string();
        let pointer = changes
            .progress
            .as_ref()
            .map(|p| p.pointer_index() as i64);
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // status + revision compare-and-swap in a single statement
        let result = sqlx::query(
            "UPDATE rounds
                SET status = COALESCE(?, status),
                    pointer_index = COALESCE(?, pointer_index),
                    revision = revision + 1,
                    updated_at = ?
              WHERE id = ? AND status = ? AND revision = ?",
        )
        .bind(changes.status.map(|s| s.as_str()))
        .bind(pointer)
        .bind(Utc::now().timestamp_millis())
        .bind(&round_id)
        .bind(expected.status.as_str())
        .bind(expected.revision)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM rounds WHERE id = ?")
                .bind(&round_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(backend)?;
            tx.rollback().await.map_err(backend)?;
            return Err(match exists {
                Some(_) => StoreError::Conflict,
                None => StoreError::NotFound,
            });
        }

        if let Some(Progress::Parallel { declined, .. }) = &changes.progress {
            sqlx::query("UPDATE round_candidates SET declined_seq = NULL WHERE round_id = ?")
                .bind(&round_id)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
            for (seq, user) in declined.iter().enumerate() {
                let marked = sqlx::query(
                    "UPDATE round_candidates SET declined_seq = ? WHERE round_id = ? AND user_id = ?",
                )
                .bind(seq as i64 + 1)
                .bind(&round_id)
                .bind(user.0.to_string())
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
                if marked.rows_affected() == 0 {
                    // dropping tx rolls back
                    return Err(StoreError::Backend(format!(
                        "declined user {} is not a candidate of round {}",
                        user, id
                    )));
                }
            }
        }

        Self::insert_outbox(&mut tx, outbox).await?;
        tx.commit().await.map_err(backend)?;

        self.get_round(id).await
    }

    async fn list_rounds_by_creator(&self, creator: &UserId) -> Result<Vec<Round>, StoreError> {
        let rows = sqlx::query_as::<_, RoundRow>(&format!(
            "SELECT {} FROM rounds WHERE creator_id = ? ORDER BY created_at DESC, id DESC",
            ROUND_COLUMNS
        ))
        .bind(creator.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        self.hydrate_all(rows).await
    }

    async fn list_pending_rounds_for_candidate(
        &self,
        candidate: &UserId,
    ) -> Result<Vec<Round>, StoreError> {
        let rows = sqlx::query_as::<_, RoundRow>(
            "SELECT r.id, r.creator_id, r.target_id, r.mode, r.status, r.pointer_index,
                    r.revision, r.created_at, r.updated_at
               FROM rounds r
               JOIN round_candidates c ON c.round_id = r.id
              WHERE c.user_id = ? AND r.status = 'pending'
              ORDER BY r.created_at DESC, r.id DESC",
        )
        .bind(candidate.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        self.hydrate_all(rows).await
    }

    // ────────────────────────────── Outbox ───────────────────────────────

    async fn enqueue_notifications(&self, rows: &[NewNotification]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(backend)?;
        Self::insert_outbox(&mut tx, rows).await?;
        tx.commit().await.map_err(backend)
    }

    async fn claim_notifications(&self, limit: usize) -> Result<Vec<OutboxMessage>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let rows = sqlx::query_as::<_, OutboxRow>(
            "SELECT seq, id, round_id, recipient_id, kind, channel, title, body, created_at
               FROM notification_outbox ORDER BY seq LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&mut *tx)
        .await
        .map_err(backend)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            sqlx::query("DELETE FROM notification_outbox WHERE seq = ?")
                .bind(row.seq)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
            out.push(OutboxMessage {
                id: OutboxId(parse_uuid(&row.id)?),
                round_id: RoundId(parse_uuid(&row.round_id)?),
                recipient_id: UserId(parse_uuid(&row.recipient_id)?),
                kind: row.kind.parse::<NotificationKind>().map_err(backend)?,
                channel: row.channel.parse::<Channel>().map_err(backend)?,
                title: row.title,
                body: row.body,
                created_at: parse_millis(row.created_at)?,
            });
        }

        tx.commit().await.map_err(backend)?;
        Ok(out)
    }
}
