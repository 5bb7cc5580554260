use crate::route::{MatchQuery, MatchResult, MatchingEngine, Point, RouteRecord};
use crate::store::error::{StoreError, StoreResult};
use crate::store::types::{cutoff_for, PurgeReport, RouteFilter, SaveOutcome, INVALID_ROUTE_RETENTION};
use crate::store::{PersistentStore, RouteReader};
use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;

pub struct SqliteRouteStore {
    pool: SqlitePool,
}

impl SqliteRouteStore {
    /// Open (creating if missing) a route store at `database_url`
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    /// Open the store, retrying with exponential backoff until `max_elapsed`
    pub async fn connect_with_backoff(database_url: &str, max_elapsed: Duration) -> StoreResult<Self> {
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(2),
            max_elapsed_time: Some(max_elapsed),
            ..Default::default()
        };

        loop {
            match Self::new(database_url).await {
                Ok(store) => return Ok(store),
                Err(e) => match backoff.next_backoff() {
                    Some(delay) => {
                        tracing::warn!(error = %e, ?delay, "Route store connect failed, retrying");
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(e),
                },
            }
        }
    }

    /// Create route store with in-memory database (for testing).
    ///
    /// Every SQLite connection to `:memory:` is its own database, so the pool
    /// is pinned to one connection that never expires.
    pub async fn new_in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::init_schema(&pool).await?;
        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> StoreResult<()> {
        // Point columns stay nullable so rows written by older clients can
        // still be found and removed by purge_invalid.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS routes (
                owner_user_id TEXT NOT NULL,
                connection_id TEXT NOT NULL,
                source TEXT,
                destination TEXT,
                path TEXT,
                via TEXT NOT NULL DEFAULT '[]',
                extra TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (owner_user_id, connection_id)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_routes_updated ON routes(updated_at)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Close database connection
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn insert_if_absent(&self, record: &RouteRecord, encoded: &EncodedRoute) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO routes
            (owner_user_id, connection_id, source, destination, path, via, extra, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.owner_user_id)
        .bind(&record.connection_id)
        .bind(&encoded.source)
        .bind(&encoded.destination)
        .bind(&encoded.path)
        .bind(&encoded.via)
        .bind(&encoded.extra)
        .bind(record.created_at.timestamp_millis())
        .bind(record.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_existing(&self, record: &RouteRecord, encoded: &EncodedRoute) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE routes
            SET source = ?, destination = ?, path = ?, via = ?, extra = ?, updated_at = ?
            WHERE owner_user_id = ? AND connection_id = ?
            "#,
        )
        .bind(&encoded.source)
        .bind(&encoded.destination)
        .bind(&encoded.path)
        .bind(&encoded.via)
        .bind(&encoded.extra)
        .bind(record.updated_at.timestamp_millis())
        .bind(&record.owner_user_id)
        .bind(&record.connection_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_older_than(&self, age: Duration) -> StoreResult<u64> {
        let cutoff = cutoff_for(age).timestamp_millis();
        let result = sqlx::query("DELETE FROM routes WHERE updated_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

struct EncodedRoute {
    source: String,
    destination: String,
    path: String,
    via: String,
    extra: String,
}

impl EncodedRoute {
    fn encode(record: &RouteRecord) -> StoreResult<Self> {
        Ok(Self {
            source: serde_json::to_string(&record.source)?,
            destination: serde_json::to_string(&record.destination)?,
            path: serde_json::to_string(&record.path)?,
            via: serde_json::to_string(&record.via)?,
            extra: serde_json::to_string(&record.extra)?,
        })
    }
}

fn decode_timestamp(millis: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::Serialization(format!("timestamp out of range: {}", millis)))
}

fn decode_point(row: &SqliteRow, column: &str) -> StoreResult<Point> {
    let raw: Option<String> = row.try_get(column)?;
    let raw = raw.ok_or_else(|| StoreError::Serialization(format!("{} is missing", column)))?;
    Ok(serde_json::from_str(&raw)?)
}

fn decode_row(row: &SqliteRow) -> StoreResult<RouteRecord> {
    let path: Option<String> = row.try_get("path")?;
    let path = path.ok_or_else(|| StoreError::Serialization("path is missing".to_string()))?;

    Ok(RouteRecord {
        owner_user_id: row.try_get("owner_user_id")?,
        connection_id: row.try_get("connection_id")?,
        source: decode_point(row, "source")?,
        destination: decode_point(row, "destination")?,
        path: serde_json::from_str(&path)?,
        via: serde_json::from_str(&row.try_get::<String, _>("via")?)?,
        extra: serde_json::from_str(&row.try_get::<String, _>("extra")?)?,
        created_at: decode_timestamp(row.try_get("created_at")?)?,
        updated_at: decode_timestamp(row.try_get("updated_at")?)?,
    })
}

/// Decode rows, skipping (and logging) the ones that no longer parse
fn decode_rows(rows: Vec<SqliteRow>) -> Vec<RouteRecord> {
    rows.iter()
        .filter_map(|row| match decode_row(row) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping undecodable route row");
                None
            }
        })
        .collect()
}

#[async_trait]
impl RouteReader for SqliteRouteStore {
    async fn query(&self, filter: &RouteFilter) -> StoreResult<Vec<RouteRecord>> {
        let cutoff = cutoff_for(filter.since).timestamp_millis();
        let limit = i64::try_from(filter.limit).unwrap_or(i64::MAX);

        let rows = match &filter.owner_user_id {
            Some(owner) => {
                sqlx::query(
                    "SELECT * FROM routes WHERE updated_at >= ? AND owner_user_id = ? ORDER BY updated_at DESC LIMIT ?",
                )
                .bind(cutoff)
                .bind(owner)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM routes WHERE updated_at >= ? ORDER BY updated_at DESC LIMIT ?")
                    .bind(cutoff)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(decode_rows(rows))
    }

    async fn find_matches(
        &self,
        query: &MatchQuery,
        since: Duration,
    ) -> StoreResult<Vec<MatchResult>> {
        let cutoff = cutoff_for(since).timestamp_millis();

        let rows = sqlx::query(
            "SELECT * FROM routes WHERE updated_at >= ? AND owner_user_id != ? ORDER BY updated_at DESC",
        )
        .bind(cutoff)
        .bind(&query.owner_user_id)
        .fetch_all(&self.pool)
        .await?;

        // Classification happens in Rust so both backends agree exactly
        Ok(MatchingEngine::rank(decode_rows(rows), query))
    }
}

#[async_trait]
impl PersistentStore for SqliteRouteStore {
    async fn save(&self, record: &RouteRecord) -> StoreResult<SaveOutcome> {
        let encoded = EncodedRoute::encode(record)?;

        // A purge may delete the row between the two statements; one retry
        // turns that into a fresh insert.
        for _ in 0..2 {
            if self.insert_if_absent(record, &encoded).await? {
                tracing::info!(
                    owner = %record.owner_user_id,
                    connection_id = %record.connection_id,
                    "New route inserted"
                );
                return Ok(SaveOutcome::Inserted);
            }
            if self.update_existing(record, &encoded).await? {
                tracing::info!(
                    owner = %record.owner_user_id,
                    connection_id = %record.connection_id,
                    "Route updated"
                );
                return Ok(SaveOutcome::Updated);
            }
        }

        Err(StoreError::Database(format!(
            "upsert did not settle for ({}, {})",
            record.owner_user_id, record.connection_id
        )))
    }

    async fn purge_expired(&self, older_than: Duration) -> StoreResult<u64> {
        let removed = self.delete_older_than(older_than).await?;
        if removed > 0 {
            tracing::info!(removed, "Cleaned up expired routes");
        }
        Ok(removed)
    }

    async fn purge_invalid(&self) -> StoreResult<PurgeReport> {
        let original_count = self.count().await?;
        let expired_removed = self.delete_older_than(INVALID_ROUTE_RETENTION).await?;

        let invalid = sqlx::query(
            r#"
            DELETE FROM routes
            WHERE trim(owner_user_id) = ''
               OR source IS NULL
               OR destination IS NULL
               OR path IS NULL
               OR CASE WHEN json_valid(path) THEN json_type(path) != 'array' ELSE 1 END
            "#,
        )
        .execute(&self.pool)
        .await?;

        let new_count = self.count().await?;

        Ok(PurgeReport {
            original_count,
            new_count,
            expired_removed,
            invalid_removed: invalid.rows_affected(),
        })
    }

    async fn count(&self) -> StoreResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM routes")
            .fetch_one(&self.pool)
            .await?;

        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
