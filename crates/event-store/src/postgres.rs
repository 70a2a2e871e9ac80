use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventQuery, EventStoreError, Result, Version,
    store::{EventStore, LoggedEvent, LoggedEventStream, StreamAppend, validate_commit},
};

/// Advisory lock held by every writing transaction until it commits.
///
/// `position` values are drawn inside the lock, so writes become visible in
/// position order and a reader never sees a gap that is filled later.
pub const COMMIT_LOCK_KEY: i64 = 0x636c_696e_6963;

const SELECT_COLUMNS: &str =
    "SELECT position, id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata FROM events";

/// PostgreSQL-backed event store.
///
/// Global ordering follows the `position` column; a multi-stream commit runs
/// in one transaction, serialized with other writers by [`COMMIT_LOCK_KEY`].
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Creates a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            version: Version::new(row.try_get("version")?),
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
            metadata,
        })
    }

    async fn current_version(
        tx: &mut Transaction<'_, Postgres>,
        aggregate_id: AggregateId,
    ) -> Result<Version> {
        let current: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&mut **tx)
                .await?;
        Ok(Version::new(current.unwrap_or(0)))
    }

    async fn insert_event(
        tx: &mut Transaction<'_, Postgres>,
        event: &EventEnvelope,
        expected: Option<Version>,
    ) -> Result<()> {
        let metadata_json = serde_json::to_value(&event.metadata)?;

        sqlx::query(
            r#"
            INSERT INTO events (id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.event_id.as_uuid())
        .bind(&event.event_type)
        .bind(event.aggregate_id.as_uuid())
        .bind(&event.aggregate_type)
        .bind(event.version.as_i64())
        .bind(event.timestamp)
        .bind(&event.payload)
        .bind(metadata_json)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            // A racing writer got this version first.
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_aggregate_version")
            {
                return EventStoreError::ConcurrencyConflict {
                    aggregate_id: event.aggregate_id,
                    expected: expected.unwrap_or(Version::initial()),
                    actual: event.version,
                };
            }
            EventStoreError::Database(e)
        })?;

        Ok(())
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    #[tracing::instrument(skip(self, appends), fields(streams = appends.len()))]
    async fn commit(&self, appends: Vec<StreamAppend>) -> Result<Vec<Version>> {
        validate_commit(&appends)?;

        let commit_id = Uuid::new_v4().to_string();
        let stamp = appends.len() > 1;
        let mut versions = Vec::with_capacity(appends.len());

        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(COMMIT_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        for append in appends {
            let aggregate_id = append.events[0].aggregate_id;

            if let Some(expected) = append.options.expected_version {
                let actual = Self::current_version(&mut tx, aggregate_id).await?;
                if actual != expected {
                    metrics::counter!("event_store_conflicts_total").increment(1);
                    return Err(EventStoreError::ConcurrencyConflict {
                        aggregate_id,
                        expected,
                        actual,
                    });
                }
            }

            let mut last = Version::initial();
            for mut event in append.events {
                if stamp {
                    event.stamp_commit(&commit_id);
                }
                if let Err(e) =
                    Self::insert_event(&mut tx, &event, append.options.expected_version).await
                {
                    if e.is_conflict() {
                        metrics::counter!("event_store_conflicts_total").increment(1);
                    }
                    return Err(e);
                }
                last = event.version;
            }
            versions.push(last);
        }

        tx.commit().await?;
        Ok(versions)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE aggregate_id = $1 ORDER BY version ASC"
        ))
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        let mut sql = format!("{SELECT_COLUMNS} WHERE 1=1");
        let mut param_count = 0;

        if query.aggregate_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND aggregate_id = ${param_count}"));
        }
        if query.aggregate_type.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND aggregate_type = ${param_count}"));
        }
        if query.event_types.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND event_type = ANY(${param_count})"));
        }
        if query.from_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND timestamp >= ${param_count}"));
        }
        if query.to_timestamp.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND timestamp <= ${param_count}"));
        }

        sql.push_str(" ORDER BY position ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(id) = query.aggregate_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(agg_type) = query.aggregate_type {
            sqlx_query = sqlx_query.bind(agg_type);
        }
        if let Some(event_types) = query.event_types {
            sqlx_query = sqlx_query.bind(event_types);
        }
        if let Some(from_ts) = query.from_timestamp {
            sqlx_query = sqlx_query.bind(from_ts);
        }
        if let Some(to_ts) = query.to_timestamp {
            sqlx_query = sqlx_query.bind(to_ts);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn stream_events_after(&self, position: u64) -> Result<LoggedEventStream> {
        use futures_util::StreamExt;

        let after = i64::try_from(position).unwrap_or(i64::MAX);
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE position > $1 ORDER BY position ASC"
        ))
        .bind(after)
        .fetch_all(&self.pool)
        .await?;

        let stream = futures_util::stream::iter(rows).map(|row| -> Result<LoggedEvent> {
            let position: i64 = row.try_get("position")?;
            Ok(LoggedEvent {
                position: position as u64,
                event: Self::row_to_event(row)?,
            })
        });
        Ok(Box::pin(stream))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }
}
