use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use cortado_core::StorageError;
use cortado_order::{ChangeHistoryRecorder, ChangeRecord};

/// Append-only writer for the order change log.
pub struct PgChangeHistory {
    pool: PgPool,
}

impl PgChangeHistory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn records_for(&self, order_id: Uuid) -> Result<Vec<ChangeRecord>, StorageError> {
        let rows = sqlx::query_as::<_, ChangeRow>(
            "SELECT event_type, old_value, new_value, changed_at \
             FROM order_change_history WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::database)?;
        Ok(rows.into_iter().map(ChangeRow::into_record).collect())
    }
}

#[derive(sqlx::FromRow)]
struct ChangeRow {
    event_type: String,
    old_value: String,
    new_value: String,
    changed_at: chrono::DateTime<chrono::Utc>,
}

impl ChangeRow {
    fn into_record(self) -> ChangeRecord {
        ChangeRecord {
            timestamp: self.changed_at,
            event_type: self.event_type,
            old_value: self.old_value,
            new_value: self.new_value,
        }
    }
}

#[async_trait]
impl ChangeHistoryRecorder for PgChangeHistory {
    async fn append(&self, order_id: Uuid, records: &[ChangeRecord]) -> Result<(), StorageError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(StorageError::database)?;
        for record in records {
            sqlx::query(
                "INSERT INTO order_change_history (order_id, event_type, old_value, new_value, changed_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(order_id)
            .bind(&record.event_type)
            .bind(&record.old_value)
            .bind(&record.new_value)
            .bind(record.timestamp)
            .execute(&mut *tx)
            .await
            .map_err(StorageError::database)?;
        }
        tx.commit().await.map_err(StorageError::database)
    }
}
