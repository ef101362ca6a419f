//! Feature tables in PostgreSQL/PostGIS.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};
use std::env;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use geo_common::{StoreError, StoreResult, TableName};

use crate::secrets::SecretSource;
use crate::spatial::{FeatureRecord, SpatialStore, MAX_CHUNK_SIZE};

const INSERT_COLUMNS: &str =
    "(feature_index, feature_id, geometry, properties, file_source, processed_at, processing_id) ";

/// Connection settings for the spatial store.
#[derive(Debug, Clone)]
pub struct PostgisConfig {
    /// Where the connection credentials come from
    pub secret: SecretSource,
    /// Pool size
    pub max_connections: u32,
    /// How long a load waits for a free connection
    pub acquire_timeout: Duration,
}

impl PostgisConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            secret: SecretSource::from_env(),
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            acquire_timeout: Duration::from_secs(
                env::var("DB_ACQUIRE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            ),
        }
    }
}

/// PostGIS-backed spatial store.
///
/// The pool is created on first use and then shared; every load runs on its
/// own pooled connection inside its own transaction.
pub struct PostgisStore {
    config: PostgisConfig,
    pool: OnceCell<PgPool>,
}

impl PostgisStore {
    pub fn new(config: PostgisConfig) -> Self {
        Self {
            config,
            pool: OnceCell::new(),
        }
    }

    /// Get the connection pool, connecting on first call.
    pub async fn pool(&self) -> StoreResult<&PgPool> {
        self.pool
            .get_or_try_init(|| async {
                let url = self.config.secret.resolve().await?;

                let pool = PgPoolOptions::new()
                    .max_connections(self.config.max_connections)
                    .acquire_timeout(self.config.acquire_timeout)
                    .connect(&url)
                    .await
                    .map_err(|e| StoreError::Database(format!("Connection failed: {}", e)))?;

                sqlx::query("CREATE EXTENSION IF NOT EXISTS postgis")
                    .execute(&pool)
                    .await
                    .map_err(|e| {
                        StoreError::Database(format!("Failed to enable PostGIS: {}", e))
                    })?;

                info!(
                    max_connections = self.config.max_connections,
                    "Database connection established"
                );
                Ok::<_, StoreError>(pool)
            })
            .await
    }

    /// Number of rows currently in a table.
    pub async fn count_rows(&self, table: &TableName) -> StoreResult<i64> {
        let pool = self.pool().await?;
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table.quoted()))
            .fetch_one(pool)
            .await
            .map_err(|e| StoreError::Database(format!("Count failed: {}", e)))
    }
}

fn create_table_sql(table: &TableName) -> String {
    format!(
        "CREATE TABLE {} (\
            feature_index INTEGER NOT NULL, \
            feature_id TEXT, \
            geometry geometry, \
            properties JSONB NOT NULL, \
            file_source TEXT NOT NULL, \
            processed_at TIMESTAMPTZ NOT NULL, \
            processing_id UUID NOT NULL\
        )",
        table.quoted()
    )
}

fn push_chunk<'a>(builder: &mut QueryBuilder<'a, Postgres>, chunk: &'a [FeatureRecord]) {
    builder.push_values(chunk, |mut row, record| {
        row.push_bind(record.feature_index)
            .push_bind(record.feature_id.clone())
            .push("ST_SetSRID(ST_GeomFromGeoJSON(")
            .push_bind_unseparated(record.geometry_json())
            .push_unseparated("::text), 4326)")
            .push_bind(record.properties.to_string())
            .push_unseparated("::jsonb")
            .push_bind(record.file_source.clone())
            .push_bind(record.processed_at)
            .push_bind(record.processing_id);
    });
}

#[async_trait]
impl SpatialStore for PostgisStore {
    #[instrument(skip(self, records), fields(table = %table, rows = records.len()))]
    async fn replace_table(
        &self,
        table: &TableName,
        records: &[FeatureRecord],
        chunk_size: usize,
    ) -> StoreResult<u64> {
        let pool = self.pool().await?;
        let chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
        let db_err = |what: &str, e: sqlx::Error| {
            StoreError::Database(format!("{} for {} failed: {}", what, table, e))
        };

        // DDL is transactional: until COMMIT other sessions keep seeing the old table,
        // and any failure below rolls back to it.
        let mut tx = pool.begin().await.map_err(|e| db_err("Begin", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(table.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("Table lock", e))?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table.quoted()))
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("Drop", e))?;

        sqlx::query(&create_table_sql(table))
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("Create", e))?;

        let insert = format!("INSERT INTO {} {}", table.quoted(), INSERT_COLUMNS);
        let total_chunks = records.len().div_ceil(chunk_size);
        let mut written = 0u64;

        for (chunk_idx, chunk) in records.chunks(chunk_size).enumerate() {
            let mut builder = QueryBuilder::<Postgres>::new(insert.as_str());
            push_chunk(&mut builder, chunk);

            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| db_err(&format!("Insert chunk {}/{}", chunk_idx + 1, total_chunks), e))?;

            written += chunk.len() as u64;
            debug!(chunk = chunk_idx + 1, total_chunks, written, "Wrote chunk");
        }

        sqlx::query(&format!(
            "CREATE INDEX ON {} USING GIST (geometry)",
            table.quoted()
        ))
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("Spatial index", e))?;

        tx.commit().await.map_err(|e| db_err("Commit", e))?;

        info!(rows = written, "Replaced table");
        Ok(written)
    }

    async fn ping(&self) -> StoreResult<String> {
        let pool = self.pool().await?;
        sqlx::query_scalar::<_, String>("SELECT version()")
            .fetch_one(pool)
            .await
            .map_err(|e| StoreError::Database(format!("Query failed: {}", e)))
    }
}
