//! Postgres-backed stores using runtime-checked sqlx queries.
//!
//! `run_migrations` creates the logical schema: `tasks`,
//! `execution_records` (unique task_id), `outbox_messages` and
//! `processed_events` (composite key). Command paths that must pair a row
//! mutation with an outbox append do so inside one transaction.

use crate::error::{Result, TaskFlowError};
use crate::events::{Priority, TaskType};
use crate::execution::record::ExecutionRecord;
use crate::execution::states::ExecutionStatus;
use crate::execution::store::ExecutionStore;
use crate::idempotency::ledger::IdempotencyLedger;
use crate::intake::states::TaskStatus;
use crate::intake::store::TaskStore;
use crate::intake::task::Task;
use crate::outbox::message::OutboxMessage;
use crate::outbox::store::OutboxStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

fn storage_err(err: sqlx::Error) -> TaskFlowError {
    TaskFlowError::StorageError(err.to_string())
}

/// Create the per-service tables if they do not exist
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id UUID PRIMARY KEY,
            user_id TEXT NOT NULL,
            task_type TEXT NOT NULL,
            priority TEXT NOT NULL,
            payload TEXT,
            status TEXT NOT NULL,
            scheduled_at TIMESTAMPTZ,
            result_location TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS execution_records (
            id UUID PRIMARY KEY,
            task_id UUID NOT NULL UNIQUE,
            user_id TEXT NOT NULL,
            task_type TEXT NOT NULL,
            priority TEXT NOT NULL,
            payload TEXT,
            status TEXT NOT NULL,
            progress_percent INTEGER NOT NULL DEFAULT 0,
            status_message TEXT,
            result_location TEXT,
            error_message TEXT,
            retry_count INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL,
            started_at TIMESTAMPTZ,
            completed_at TIMESTAMPTZ,
            correlation_id TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS outbox_messages (
            id UUID PRIMARY KEY,
            event_type TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            processed_at TIMESTAMPTZ,
            retry_count INTEGER NOT NULL DEFAULT 0,
            error TEXT
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS processed_events (
            event_id UUID NOT NULL,
            consumer_name TEXT NOT NULL,
            processed_at TIMESTAMPTZ NOT NULL,
            PRIMARY KEY (event_id, consumer_name)
        )
        "#,
    ];

    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(storage_err)?;
    }
    Ok(())
}

fn task_from_row(row: &PgRow) -> Result<Task> {
    let status: String = row.try_get("status").map_err(storage_err)?;
    let task_type: String = row.try_get("task_type").map_err(storage_err)?;
    let priority: String = row.try_get("priority").map_err(storage_err)?;

    Ok(Task {
        id: row.try_get("id").map_err(storage_err)?,
        user_id: row.try_get("user_id").map_err(storage_err)?,
        task_type: TaskType::parse(&task_type),
        priority: Priority::parse(&priority),
        payload: row.try_get("payload").map_err(storage_err)?,
        status: status
            .parse::<TaskStatus>()
            .map_err(TaskFlowError::StorageError)?,
        scheduled_at: row.try_get("scheduled_at").map_err(storage_err)?,
        result_location: row.try_get("result_location").map_err(storage_err)?,
        created_at: row.try_get("created_at").map_err(storage_err)?,
        updated_at: row.try_get("updated_at").map_err(storage_err)?,
    })
}

async fn add_outbox_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    message: &OutboxMessage,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO outbox_messages (id, event_type, payload, created_at, processed_at, retry_count, error)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(message.id)
    .bind(&message.event_type)
    .bind(&message.payload)
    .bind(message.created_at)
    .bind(message.processed_at)
    .bind(message.retry_count)
    .bind(&message.error)
    .execute(&mut **tx)
    .await
    .map_err(storage_err)?;
    Ok(())
}

async fn upsert_task_in_tx(tx: &mut Transaction<'_, Postgres>, task: &Task) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tasks (id, user_id, task_type, priority, payload, status,
                           scheduled_at, result_location, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO UPDATE SET
            status = EXCLUDED.status,
            priority = EXCLUDED.priority,
            result_location = EXCLUDED.result_location,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(task.id)
    .bind(&task.user_id)
    .bind(task.task_type.to_string())
    .bind(task.priority.to_string())
    .bind(&task.payload)
    .bind(task.status.to_string())
    .bind(task.scheduled_at)
    .bind(&task.result_location)
    .bind(task.created_at)
    .bind(task.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(storage_err)?;
    Ok(())
}

/// Intake-side task store over Postgres
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn get(&self, id: Uuid) -> Result<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn get_by_user(&self, user_id: &str) -> Result<Vec<Task>> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.iter().map(task_from_row).collect()
    }

    async fn count_active(&self, user_id: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tasks WHERE user_id = $1 AND status <> 'cancelled'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(count as usize)
    }

    async fn insert_with_outbox(&self, task: Task, message: OutboxMessage) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        upsert_task_in_tx(&mut tx, &task).await?;
        add_outbox_in_tx(&mut tx, &message).await?;
        tx.commit().await.map_err(storage_err)
    }

    async fn update(&self, task: Task) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE tasks SET status = $2, priority = $3, result_location = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(task.id)
        .bind(task.status.to_string())
        .bind(task.priority.to_string())
        .bind(&task.result_location)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(TaskFlowError::NotFound(format!("task {}", task.id)));
        }
        Ok(())
    }

    async fn update_with_outbox(&self, task: Task, message: OutboxMessage) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        upsert_task_in_tx(&mut tx, &task).await?;
        add_outbox_in_tx(&mut tx, &message).await?;
        tx.commit().await.map_err(storage_err)
    }
}

fn execution_record_from_row(row: &PgRow) -> Result<ExecutionRecord> {
    let status: String = row.try_get("status").map_err(storage_err)?;
    Ok(ExecutionRecord {
        id: row.try_get("id").map_err(storage_err)?,
        task_id: row.try_get("task_id").map_err(storage_err)?,
        user_id: row.try_get("user_id").map_err(storage_err)?,
        task_type: row.try_get("task_type").map_err(storage_err)?,
        priority: row.try_get("priority").map_err(storage_err)?,
        payload: row.try_get("payload").map_err(storage_err)?,
        status: status
            .parse::<ExecutionStatus>()
            .map_err(TaskFlowError::StorageError)?,
        progress_percent: row.try_get("progress_percent").map_err(storage_err)?,
        status_message: row.try_get("status_message").map_err(storage_err)?,
        result_location: row.try_get("result_location").map_err(storage_err)?,
        error_message: row.try_get("error_message").map_err(storage_err)?,
        retry_count: row.try_get("retry_count").map_err(storage_err)?,
        created_at: row.try_get("created_at").map_err(storage_err)?,
        started_at: row.try_get("started_at").map_err(storage_err)?,
        completed_at: row.try_get("completed_at").map_err(storage_err)?,
        correlation_id: row.try_get("correlation_id").map_err(storage_err)?,
    })
}

/// Execution-side record store over Postgres
pub struct PgExecutionStore {
    pool: PgPool,
}

impl PgExecutionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionStore for PgExecutionStore {
    async fn get_by_task_id(&self, task_id: Uuid) -> Result<Option<ExecutionRecord>> {
        let row = sqlx::query("SELECT * FROM execution_records WHERE task_id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(execution_record_from_row).transpose()
    }

    async fn insert(&self, record: ExecutionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO execution_records (
                id, task_id, user_id, task_type, priority, payload, status,
                progress_percent, status_message, result_location, error_message,
                retry_count, created_at, started_at, completed_at, correlation_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(record.id)
        .bind(record.task_id)
        .bind(&record.user_id)
        .bind(&record.task_type)
        .bind(&record.priority)
        .bind(&record.payload)
        .bind(record.status.to_string())
        .bind(record.progress_percent)
        .bind(&record.status_message)
        .bind(&record.result_location)
        .bind(&record.error_message)
        .bind(record.retry_count)
        .bind(record.created_at)
        .bind(record.started_at)
        .bind(record.completed_at)
        .bind(&record.correlation_id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn update(&self, record: ExecutionRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE execution_records SET
                status = $2, progress_percent = $3, status_message = $4,
                result_location = $5, error_message = $6, retry_count = $7,
                started_at = $8, completed_at = $9
            WHERE task_id = $1
            "#,
        )
        .bind(record.task_id)
        .bind(record.status.to_string())
        .bind(record.progress_percent)
        .bind(&record.status_message)
        .bind(&record.result_location)
        .bind(&record.error_message)
        .bind(record.retry_count)
        .bind(record.started_at)
        .bind(record.completed_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(TaskFlowError::NotFound(format!(
                "execution record for task {}",
                record.task_id
            )));
        }
        Ok(())
    }
}

/// Outbox rows over Postgres
pub struct PgOutboxStore {
    pool: PgPool,
    retry_limit: i32,
}

impl PgOutboxStore {
    pub fn new(pool: PgPool, retry_limit: i32) -> Self {
        Self { pool, retry_limit }
    }
}

fn outbox_from_row(row: &PgRow) -> Result<OutboxMessage> {
    Ok(OutboxMessage {
        id: row.try_get("id").map_err(storage_err)?,
        event_type: row.try_get("event_type").map_err(storage_err)?,
        payload: row.try_get("payload").map_err(storage_err)?,
        created_at: row.try_get("created_at").map_err(storage_err)?,
        processed_at: row.try_get("processed_at").map_err(storage_err)?,
        retry_count: row.try_get("retry_count").map_err(storage_err)?,
        error: row.try_get("error").map_err(storage_err)?,
    })
}

#[async_trait]
impl OutboxStore for PgOutboxStore {
    async fn add(&self, message: OutboxMessage) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        add_outbox_in_tx(&mut tx, &message).await?;
        tx.commit().await.map_err(storage_err)
    }

    async fn get_unprocessed(&self, batch_size: usize) -> Result<Vec<OutboxMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM outbox_messages
            WHERE processed_at IS NULL AND retry_count < $1
            ORDER BY created_at ASC
            LIMIT $2
            "#,
        )
        .bind(self.retry_limit)
        .bind(batch_size as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows.iter().map(outbox_from_row).collect()
    }

    async fn mark_processed(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE outbox_messages SET processed_at = $2 WHERE id = $1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE outbox_messages SET retry_count = retry_count + 1, error = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }
}

/// Per-service dedup ledger over Postgres
pub struct PgIdempotencyLedger {
    pool: PgPool,
}

impl PgIdempotencyLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdempotencyLedger for PgIdempotencyLedger {
    async fn is_processed(&self, event_id: Uuid, consumer_name: &str) -> Result<bool> {
        let exists: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT processed_at FROM processed_events WHERE event_id = $1 AND consumer_name = $2",
        )
        .bind(event_id)
        .bind(consumer_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(exists.is_some())
    }

    async fn mark_processed(&self, event_id: Uuid, consumer_name: &str) -> Result<()> {
        // Write-once: a concurrent duplicate insert is not an error.
        sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, consumer_name, processed_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id, consumer_name) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(consumer_name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }
}
