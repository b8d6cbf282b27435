use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::event_sourcing::core::{Event, EventRecord, PayloadRegistry, Result, StoreError};
use crate::event_sourcing::store::driver::{duplicate_in_batch, Driver, StreamReader};

// ============================================================================
// PostgreSQL Driver - unique index + transaction
// ============================================================================
//
// Locking relies entirely on `UNIQUE (aggregate_id, aggregate_version)`:
// every batch is inserted inside one transaction, and a unique violation on
// any row aborts the whole transaction and is reported as an optimistic
// locking violation. Ids come from the `BIGSERIAL` column and `created` from
// the column default.
//
// Provisioning the table is up to the caller; `PostgresDriver::schema`
// returns the expected DDL.
//
// ============================================================================

const COLUMNS: &str = r#"id, "type", aggregate_id, aggregate_type, aggregate_version, payload, created"#;

pub struct PostgresDriver {
    pool: PgPool,
    table: String,
    registry: Arc<PayloadRegistry>,
}

impl PostgresDriver {
    pub fn new(pool: PgPool, table: &str, registry: Arc<PayloadRegistry>) -> Self {
        Self {
            pool,
            table: quote_identifier(table),
            registry,
        }
    }

    /// DDL of the table this driver reads and writes.
    pub fn schema(table: &str) -> String {
        let table = quote_identifier(table);
        format!(
            r#"CREATE TABLE IF NOT EXISTS {table} (
    id BIGSERIAL PRIMARY KEY,
    "type" TEXT NOT NULL,
    aggregate_id TEXT NOT NULL,
    aggregate_type TEXT NOT NULL,
    aggregate_version BIGINT NOT NULL,
    payload TEXT NOT NULL,
    created TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (aggregate_id, aggregate_version)
)"#
        )
    }

    fn load_sql(&self) -> String {
        format!(
            "SELECT {COLUMNS} FROM {} WHERE aggregate_id = $1 ORDER BY aggregate_version ASC",
            self.table
        )
    }

    fn insert_sql(&self) -> String {
        format!(
            r#"INSERT INTO {} ("type", aggregate_id, aggregate_type, aggregate_version, payload) VALUES ($1, $2, $3, $4, $5) RETURNING id, created"#,
            self.table
        )
    }

    fn read_forward_sql(&self) -> String {
        format!("SELECT {COLUMNS} FROM {} WHERE id > $1 ORDER BY id ASC LIMIT $2", self.table)
    }

    fn read_of_types_sql(&self) -> String {
        format!(
            r#"SELECT {COLUMNS} FROM {} WHERE id > $1 AND "type" = ANY($2) ORDER BY id ASC LIMIT $3"#,
            self.table
        )
    }

    fn decode_rows(&self, rows: Vec<PgRow>) -> Result<Vec<Event>> {
        rows.into_iter()
            .map(|row| record_from_row(&row)?.into_event(&self.registry))
            .collect()
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn record_from_row(row: &PgRow) -> Result<EventRecord> {
    Ok(EventRecord {
        id: row.try_get("id")?,
        event_type: row.try_get("type")?,
        aggregate_id: row.try_get("aggregate_id")?,
        aggregate_type: row.try_get("aggregate_type")?,
        aggregate_version: row.try_get("aggregate_version")?,
        payload: row.try_get("payload")?,
        created: row.try_get("created")?,
    })
}

fn map_insert_error(err: sqlx::Error, event: &Event) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::conflict(event.aggregate_id.clone(), event.aggregate_version)
        }
        _ => err.into(),
    }
}

fn sql_limit(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

#[async_trait]
impl Driver for PostgresDriver {
    async fn load(&self, aggregate_id: &str) -> Result<Vec<Event>> {
        let rows = sqlx::query(&self.load_sql())
            .bind(aggregate_id)
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(aggregate_id = %aggregate_id, rows = rows.len(), "Loaded events from Postgres");

        self.decode_rows(rows)
    }

    async fn save(&self, events: &mut [Event]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        if let Some((aggregate_id, version)) = duplicate_in_batch(events) {
            return Err(StoreError::conflict(aggregate_id, version));
        }

        let insert = self.insert_sql();
        let mut stamps: Vec<(i64, DateTime<Utc>)> = Vec::with_capacity(events.len());

        // Dropping the transaction without commit rolls it back.
        let mut tx = self.pool.begin().await?;

        for event in events.iter() {
            let payload = event.payload.to_json()?;

            let row = sqlx::query(&insert)
                .bind(&event.event_type)
                .bind(&event.aggregate_id)
                .bind(&event.aggregate_type)
                .bind(event.aggregate_version)
                .bind(payload)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_insert_error(e, event))?;

            stamps.push((row.try_get("id")?, row.try_get("created")?));
        }

        tx.commit().await?;

        for (event, (id, created)) in events.iter_mut().zip(stamps) {
            event.id = id;
            event.created = created;
        }

        tracing::info!(
            table = %self.table,
            event_count = events.len(),
            "Appended events to Postgres"
        );

        Ok(())
    }
}

#[async_trait]
impl StreamReader for PostgresDriver {
    async fn read_forward(&self, position: i64, count: usize) -> Result<Vec<Event>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&self.read_forward_sql())
            .bind(position)
            .bind(sql_limit(count))
            .fetch_all(&self.pool)
            .await?;

        self.decode_rows(rows)
    }

    async fn read_of_types(&self, position: i64, count: usize, types: &[String]) -> Result<Vec<Event>> {
        if types.is_empty() || count == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&self.read_of_types_sql())
            .bind(position)
            .bind(types)
            .bind(sql_limit(count))
            .fetch_all(&self.pool)
            .await?;

        self.decode_rows(rows)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::DomainEvent;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    struct SomethingHappened {
        data: String,
    }

    impl DomainEvent for SomethingHappened {
        const EVENT_TYPE: &'static str = "SomethingHappened";
        const AGGREGATE_TYPE: &'static str = "SampleAggregate";
    }

    fn lazy_driver(table: &str) -> PostgresDriver {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/eventlog")
            .unwrap();
        let registry = PayloadRegistry::builder()
            .register::<SomethingHappened>()
            .unwrap()
            .build();
        PostgresDriver::new(pool, table, registry)
    }

    #[test]
    fn test_identifiers_are_quoted() {
        assert_eq!(quote_identifier("events"), r#""events""#);
        assert_eq!(quote_identifier(r#"ev"il"#), r#""ev""il""#);
    }

    #[test]
    fn test_schema_declares_version_uniqueness() {
        let ddl = PostgresDriver::schema("events");

        assert!(ddl.starts_with(r#"CREATE TABLE IF NOT EXISTS "events""#));
        assert!(ddl.contains("UNIQUE (aggregate_id, aggregate_version)"));
        assert!(ddl.contains("id BIGSERIAL PRIMARY KEY"));
    }

    #[tokio::test]
    async fn test_sql_statements_target_quoted_table() {
        let driver = lazy_driver("events");

        assert!(driver.load_sql().contains(r#"FROM "events" WHERE aggregate_id = $1 ORDER BY aggregate_version"#));
        assert!(driver.insert_sql().starts_with(r#"INSERT INTO "events""#));
        assert!(driver.insert_sql().ends_with("RETURNING id, created"));
        assert!(driver.read_forward_sql().contains("WHERE id > $1 ORDER BY id ASC LIMIT $2"));
        assert!(driver.read_of_types_sql().contains(r#""type" = ANY($2)"#));
    }

    #[test]
    fn test_sql_limit_saturates() {
        assert_eq!(sql_limit(10), 10);
        assert_eq!(sql_limit(usize::MAX), i64::MAX);
    }

    #[test]
    fn test_non_constraint_errors_stay_backend_errors() {
        let event = Event::new("1", SomethingHappened { data: "a".to_string() });
        let err = map_insert_error(sqlx::Error::RowNotFound, &event);

        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[tokio::test]
    async fn test_empty_batch_skips_the_database() {
        // The pool is lazy and points nowhere; any round trip would fail.
        let driver = lazy_driver("events");
        driver.save(&mut []).await.unwrap();
        assert!(driver.read_of_types(0, 10, &[]).await.unwrap().is_empty());
        assert!(driver.read_forward(0, 0).await.unwrap().is_empty());
    }

    /// Requires a database: `DATABASE_URL=postgres://... cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn test_conflict_against_live_database() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let pool = PgPool::connect(&url).await.unwrap();
        let table = format!("events_{}", uuid::Uuid::new_v4().simple());
        sqlx::query(&PostgresDriver::schema(&table)).execute(&pool).await.unwrap();

        let registry = PayloadRegistry::builder()
            .register::<SomethingHappened>()
            .unwrap()
            .build();
        let driver = PostgresDriver::new(pool.clone(), &table, registry);

        let mut first = Event::new("1", SomethingHappened { data: "a".to_string() });
        first.aggregate_version = 1;
        driver.save(std::slice::from_mut(&mut first)).await.unwrap();
        assert!(first.id > 0);

        let mut second = first.clone();
        second.id = 0;
        let mut batch = vec![
            {
                let mut e = Event::new("1", SomethingHappened { data: "b".to_string() });
                e.aggregate_version = 2;
                e
            },
            second,
        ];
        let err = driver.save(&mut batch).await.unwrap_err();
        assert!(err.is_conflict());

        let loaded = driver.load("1").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(
            loaded[0].payload_as::<SomethingHappened>(),
            Some(&SomethingHappened { data: "a".to_string() })
        );

        sqlx::query(&format!("DROP TABLE {}", quote_identifier(&table)))
            .execute(&pool)
            .await
            .unwrap();
    }
}
