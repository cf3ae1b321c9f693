use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgPool, SqlitePool, migrate::Migrator};

use crate::argument_parsing::Args;
use crate::shared_queries::*;

pub const SQLITE_CONNECTION_STRING: &str = "sqlite://stats_logviewer.db?mode=rwc";

/// One request log entry, as submitted for insertion. The store assigns
/// the row id; rows are append-only and never updated.
#[derive(Debug, Deserialize)]
pub struct NewLogRecord {
    pub access_time: DateTime<Utc>,
    pub publisher_time: f64,
    pub traverse_time: f64,
    pub commit_time: f64,
    pub transform_time: f64,
    pub setstate_time: f64,
    pub total_object_loads: i64,
    pub object_loads_from_cache: i64,
    pub objects_modified: i64,
    pub action: String,
    pub url: String,
    pub start_rss: f64,
    pub end_rss: f64,
}

#[derive(Clone)]
pub enum LogStore {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl LogStore {
    fn new(postgres: Option<PgPool>, sqlite: Option<SqlitePool>) -> Self {
        match (postgres, sqlite) {
            (Some(p), _) => LogStore::Postgres(p),
            (_, Some(s)) => LogStore::Sqlite(s),
            _ => panic!("You need to configure either Postgres or Sqlite!"),
        }
    }

    pub async fn from_args(args: Args) -> Self {
        match args.pg {
            Some(pg_string) if !pg_string.is_empty() => LogStore::new(
                Some(
                    PgPool::connect(&pg_string)
                        .await
                        .expect("Postgres connection failed"),
                ),
                None,
            ),
            _ => LogStore::new(
                None,
                Some(
                    SqlitePool::connect(SQLITE_CONNECTION_STRING)
                        .await
                        .expect("Sqlite connection failed"),
                ),
            ),
        }
    }

    pub async fn migrate_db(&self) {
        match self {
            Self::Postgres(p) => Self::migrate_postgres(p).await,
            Self::Sqlite(s) => Self::migrate_sqlite(s).await,
        }
    }

    async fn migrate_postgres(pool: &PgPool) {
        let migrator = Migrator::new(std::path::Path::new("./migrations_pg"))
            .await
            .expect("Migration folder couldn't be found");
        migrator
            .run(pool)
            .await
            .expect("Postgres migrations failed");
    }

    async fn migrate_sqlite(pool: &SqlitePool) {
        let migrator = Migrator::new(std::path::Path::new("./migrations_sq"))
            .await
            .expect("Migrations folder couldn't be found");
        migrator.run(pool).await.expect("Sqlite migration failed");
    }

    pub async fn insert(&self, record: &NewLogRecord) -> Result<(), sqlx::Error> {
        match self {
            Self::Postgres(p) => {
                sqlx::query(INSERT_INTO_LOGS_QUERY)
                    .bind(record.access_time)
                    .bind(record.publisher_time)
                    .bind(record.traverse_time)
                    .bind(record.commit_time)
                    .bind(record.transform_time)
                    .bind(record.setstate_time)
                    .bind(record.total_object_loads)
                    .bind(record.object_loads_from_cache)
                    .bind(record.objects_modified)
                    .bind(&record.action)
                    .bind(&record.url)
                    .bind(record.start_rss)
                    .bind(record.end_rss)
                    .execute(p)
                    .await?;
            }
            Self::Sqlite(s) => {
                sqlx::query(INSERT_INTO_LOGS_QUERY)
                    .bind(record.access_time)
                    .bind(record.publisher_time)
                    .bind(record.traverse_time)
                    .bind(record.commit_time)
                    .bind(record.transform_time)
                    .bind(record.setstate_time)
                    .bind(record.total_object_loads)
                    .bind(record.object_loads_from_cache)
                    .bind(record.objects_modified)
                    .bind(&record.action)
                    .bind(&record.url)
                    .bind(record.start_rss)
                    .bind(record.end_rss)
                    .execute(s)
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let row: (i64,) = match self {
            Self::Postgres(p) => sqlx::query_as(COUNT_LOGS_QUERY).fetch_one(p).await?,
            Self::Sqlite(s) => sqlx::query_as(COUNT_LOGS_QUERY).fetch_one(s).await?,
        };
        Ok(row.0)
    }

    /// Earliest and latest `access_time` across the whole table, or None
    /// when the table is empty.
    pub async fn access_time_bounds(
        &self,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, sqlx::Error> {
        let row: (Option<DateTime<Utc>>, Option<DateTime<Utc>>) = match self {
            Self::Postgres(p) => {
                sqlx::query_as(SELECT_ACCESS_TIME_BOUNDS_QUERY)
                    .fetch_one(p)
                    .await?
            }
            Self::Sqlite(s) => {
                sqlx::query_as(SELECT_ACCESS_TIME_BOUNDS_QUERY)
                    .fetch_one(s)
                    .await?
            }
        };
        Ok(row.0.zip(row.1))
    }

    pub async fn sum_render_time(&self) -> Result<f64, sqlx::Error> {
        let row: (Option<f64>,) = match self {
            Self::Postgres(p) => sqlx::query_as(SUM_RENDER_TIME_QUERY).fetch_one(p).await?,
            Self::Sqlite(s) => sqlx::query_as(SUM_RENDER_TIME_QUERY).fetch_one(s).await?,
        };
        Ok(row.0.unwrap_or(0.0))
    }

    /// Per-URL average render time, slowest first, at most `limit` rows.
    pub async fn slowest_urls(&self, limit: i64) -> Result<Vec<(f64, String)>, sqlx::Error> {
        let rows: Vec<(f64, String)> = match self {
            Self::Postgres(p) => {
                sqlx::query_as(SELECT_SLOWEST_URLS_QUERY)
                    .bind(limit)
                    .fetch_all(p)
                    .await?
            }
            Self::Sqlite(s) => {
                sqlx::query_as(SELECT_SLOWEST_URLS_QUERY)
                    .bind(limit)
                    .fetch_all(s)
                    .await?
            }
        };
        Ok(rows)
    }

    /// Every `(access_time, publisher_time)` pair for one URL, oldest first.
    pub async fn response_times(
        &self,
        url: &str,
    ) -> Result<Vec<(DateTime<Utc>, f64)>, sqlx::Error> {
        let rows: Vec<(DateTime<Utc>, f64)> = match self {
            Self::Postgres(p) => {
                sqlx::query_as(SELECT_RESPONSE_TIMES_BY_URL_QUERY)
                    .bind(url)
                    .fetch_all(p)
                    .await?
            }
            Self::Sqlite(s) => {
                sqlx::query_as(SELECT_RESPONSE_TIMES_BY_URL_QUERY)
                    .bind(url)
                    .fetch_all(s)
                    .await?
            }
        };
        Ok(rows)
    }

    pub async fn sum_render_time_for_url(&self, url: &str) -> Result<f64, sqlx::Error> {
        let row: (Option<f64>,) = match self {
            Self::Postgres(p) => {
                sqlx::query_as(SUM_RENDER_TIME_BY_URL_QUERY)
                    .bind(url)
                    .fetch_one(p)
                    .await?
            }
            Self::Sqlite(s) => {
                sqlx::query_as(SUM_RENDER_TIME_BY_URL_QUERY)
                    .bind(url)
                    .fetch_one(s)
                    .await?
            }
        };
        Ok(row.0.unwrap_or(0.0))
    }

    pub async fn count_for_url(&self, url: &str) -> Result<i64, sqlx::Error> {
        let row: (i64,) = match self {
            Self::Postgres(p) => {
                sqlx::query_as(COUNT_LOGS_BY_URL_QUERY)
                    .bind(url)
                    .fetch_one(p)
                    .await?
            }
            Self::Sqlite(s) => {
                sqlx::query_as(COUNT_LOGS_BY_URL_QUERY)
                    .bind(url)
                    .fetch_one(s)
                    .await?
            }
        };
        Ok(row.0)
    }

    /// Per-row `end_rss - start_rss`, largest first, at most `limit` rows.
    /// Degenerate negative deltas are kept.
    pub async fn memory_deltas(&self, limit: i64) -> Result<Vec<(String, f64)>, sqlx::Error> {
        let rows: Vec<(String, f64)> = match self {
            Self::Postgres(p) => {
                sqlx::query_as(SELECT_MEMORY_DELTAS_QUERY)
                    .bind(limit)
                    .fetch_all(p)
                    .await?
            }
            Self::Sqlite(s) => {
                sqlx::query_as(SELECT_MEMORY_DELTAS_QUERY)
                    .bind(limit)
                    .fetch_all(s)
                    .await?
            }
        };
        Ok(rows)
    }

    pub async fn sum_memory_delta(&self) -> Result<f64, sqlx::Error> {
        let row: (Option<f64>,) = match self {
            Self::Postgres(p) => sqlx::query_as(SUM_MEMORY_DELTA_QUERY).fetch_one(p).await?,
            Self::Sqlite(s) => sqlx::query_as(SUM_MEMORY_DELTA_QUERY).fetch_one(s).await?,
        };
        Ok(row.0.unwrap_or(0.0))
    }
}
