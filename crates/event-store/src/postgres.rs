use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventStoreError, NewEvent, Result, RowProjector,
    Version,
    read_model::NoReadModel,
    store::{EventStore, EventStream, ReadModelStore, validate_new_event},
};

const EVENT_COLUMNS: &str =
    "id, aggregate_id, aggregate_type, event_type, payload, version, created_at";

const STREAM_PAGE_SIZE: i64 = 500;

/// PostgreSQL-backed event store.
///
/// The event insert and the read-model upsert share one transaction. Several
/// stores may share a pool and the `events` table; rows are partitioned by
/// [`RowProjector::model`].
pub struct PostgresEventStore<P: RowProjector = NoReadModel> {
    pool: PgPool,
    _projector: PhantomData<fn() -> P>,
}

impl<P: RowProjector> Clone for PostgresEventStore<P> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _projector: PhantomData,
        }
    }
}

impl<P: RowProjector> PostgresEventStore<P> {
    /// Creates a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _projector: PhantomData,
        }
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
        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            event_type: row.try_get("event_type")?,
            payload: row.try_get("payload")?,
            version: Version::new(row.try_get("version")?),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }

    /// Reads the page of events committed after sequence `after`, together
    /// with the cursor for the next page (`None` once the log is exhausted).
    async fn fetch_page(
        pool: &PgPool,
        after: i64,
    ) -> Result<Option<(Vec<EventEnvelope>, Option<i64>)>> {
        let rows = sqlx::query(&format!(
            "SELECT sequence, {EVENT_COLUMNS} FROM events WHERE sequence > $1 ORDER BY sequence ASC LIMIT $2"
        ))
        .bind(after)
        .bind(STREAM_PAGE_SIZE)
        .fetch_all(pool)
        .await?;

        let Some(last) = rows.last() else {
            return Ok(None);
        };
        let last_sequence: i64 = last.try_get("sequence")?;
        let next = (rows.len() as i64 == STREAM_PAGE_SIZE).then_some(last_sequence);

        let events = rows
            .into_iter()
            .map(Self::row_to_event)
            .collect::<Result<Vec<_>>>()?;
        Ok(Some((events, next)))
    }

    fn decode_row(value: serde_json::Value) -> Result<P::Row> {
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl<P: RowProjector> EventStore for PostgresEventStore<P> {
    async fn append(&self, event: NewEvent, expected_version: Version) -> Result<EventEnvelope> {
        validate_new_event(&event, expected_version)?;

        let aggregate_id = event.aggregate_id;
        let mut tx = self.pool.begin().await?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&mut *tx)
                .await?;
        let actual = Version::new(current.unwrap_or(0));

        if actual != expected_version {
            metrics::counter!("event_store_conflicts_total").increment(1);
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        let mut envelope = event.into_envelope(expected_version.next());

        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            INSERT INTO events (id, aggregate_id, aggregate_type, event_type, payload, version, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING created_at
            "#,
        )
        .bind(envelope.event_id.as_uuid())
        .bind(aggregate_id.as_uuid())
        .bind(&envelope.aggregate_type)
        .bind(&envelope.event_type)
        .bind(&envelope.payload)
        .bind(envelope.version.as_i64())
        .bind(envelope.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            // A concurrent writer inserted the same version first.
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_aggregate_version")
            {
                metrics::counter!("event_store_conflicts_total").increment(1);
                return EventStoreError::ConcurrencyConflict {
                    aggregate_id,
                    expected: expected_version,
                    actual: expected_version.next(),
                };
            }
            EventStoreError::Database(e)
        })?;
        envelope.created_at = created_at;

        let current_row: Option<serde_json::Value> = sqlx::query_scalar(
            "SELECT data FROM read_models WHERE model = $1 AND aggregate_id = $2 FOR UPDATE",
        )
        .bind(P::model())
        .bind(aggregate_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        let current_row = current_row.map(Self::decode_row).transpose()?;

        if let Some(row) = P::project(current_row, &envelope)? {
            sqlx::query(
                r#"
                INSERT INTO read_models (model, aggregate_id, data, version, updated_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (model, aggregate_id) DO UPDATE SET
                    data = EXCLUDED.data,
                    version = EXCLUDED.version,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(P::model())
            .bind(aggregate_id.as_uuid())
            .bind(serde_json::to_value(&row)?)
            .bind(envelope.version.as_i64())
            .bind(envelope.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        metrics::counter!("event_store_appends_total").increment(1);
        Ok(envelope)
    }

    async fn load_events(&self, aggregate_id: AggregateId) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE aggregate_id = $1 ORDER BY version ASC"
        ))
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(Version::new))
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::{StreamExt, TryStreamExt, stream};

        let pool = self.pool.clone();
        let pages = stream::try_unfold(Some(0_i64), move |cursor| {
            let pool = pool.clone();
            async move {
                match cursor {
                    Some(after) => Self::fetch_page(&pool, after).await,
                    None => Ok(None),
                }
            }
        });

        let stream = pages
            .map_ok(|events| stream::iter(events.into_iter().map(Ok)))
            .try_flatten();

        Ok(stream.boxed())
    }
}

#[async_trait]
impl<P: RowProjector> ReadModelStore for PostgresEventStore<P> {
    type Row = P::Row;

    async fn get_row(&self, aggregate_id: AggregateId) -> Result<Option<P::Row>> {
        let row: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT data FROM read_models WHERE model = $1 AND aggregate_id = $2")
                .bind(P::model())
                .bind(aggregate_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Self::decode_row).transpose()
    }

    async fn list_rows(&self) -> Result<Vec<P::Row>> {
        let rows: Vec<serde_json::Value> = sqlx::query_scalar(
            "SELECT data FROM read_models WHERE model = $1 ORDER BY updated_at DESC",
        )
        .bind(P::model())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::decode_row).collect()
    }
}
