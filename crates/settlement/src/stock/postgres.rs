use async_trait::async_trait;
use domain::MedicationId;
use sqlx::{PgPool, Row};

use super::{StockChange, StockLedger};
use crate::error::StockError;

/// PostgreSQL-backed stock ledger over the `medication_stock` table.
///
/// Each decrement is one `UPDATE`, so the row lock makes it atomic per
/// medication across server instances.
#[derive(Clone)]
pub struct PostgresStockLedger {
    pool: PgPool,
}

impl PostgresStockLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StockLedger for PostgresStockLedger {
    async fn decrement(
        &self,
        medication_id: MedicationId,
        amount: u32,
    ) -> Result<StockChange, StockError> {
        let amount = i64::from(amount);

        let row = sqlx::query(
            r#"
            UPDATE medication_stock AS s
            SET quantity = GREATEST(s.quantity - $2, 0), updated_at = NOW()
            FROM (
                SELECT medication_id, quantity
                FROM medication_stock
                WHERE medication_id = $1
                FOR UPDATE
            ) AS prev
            WHERE s.medication_id = prev.medication_id
            RETURNING prev.quantity AS previous, s.quantity AS current
            "#,
        )
        .bind(medication_id.as_i64())
        .bind(amount)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StockError::UnknownMedication(medication_id))?;

        let previous: i64 = row.try_get("previous")?;
        let current: i64 = row.try_get("current")?;

        Ok(StockChange {
            medication_id,
            previous,
            current,
            clamped: previous < amount,
        })
    }

    async fn restock(&self, medication_id: MedicationId, amount: u32) -> Result<i64, StockError> {
        let level: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO medication_stock (medication_id, quantity, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (medication_id)
            DO UPDATE SET quantity = medication_stock.quantity + EXCLUDED.quantity,
                          updated_at = NOW()
            RETURNING quantity
            "#,
        )
        .bind(medication_id.as_i64())
        .bind(i64::from(amount))
        .fetch_one(&self.pool)
        .await?;

        Ok(level)
    }

    async fn level(&self, medication_id: MedicationId) -> Result<i64, StockError> {
        sqlx::query_scalar("SELECT quantity FROM medication_stock WHERE medication_id = $1")
            .bind(medication_id.as_i64())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StockError::UnknownMedication(medication_id))
    }
}
