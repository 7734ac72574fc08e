//! Postgres-backed job store.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `UniqueViolation` | A provider id already exists (or repeats within a batch) |
//! | Database (other) | Any other | `Database` | Schema or data errors |
//! | PoolTimedOut / PoolClosed / Io | N/A | `Connection` | No connection available |
//! | ColumnDecode / Decode | N/A | `Decode` | Row does not fit the domain model |
//! | Other | N/A | `Database` | Everything else |
//!
//! ## Sessions
//!
//! `PostgresJobStore` owns the pool; each request acquires one
//! `PostgresJobSession` (a checked-out connection) and runs every statement on
//! it. Writes run inside a transaction on that connection; a transaction that
//! is dropped without commit is rolled back by SQLx.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Connection, PgPool, Postgres, Row};
use tracing::{debug, instrument, warn};

use jobsearch_core::{JobPosting, JobRecord, NewJob, ProviderId, StoreId};

use super::r#trait::{JobStore, JobStorePool, StoreError, StoreQuery};

const SCHEMA: &str = include_str!("../../sql/jobs.sql");

const COLUMNS: &str = r#"
    id, job_id, date_posted, site, job_url, job_url_direct, title, company,
    location, job_type, salary_source, interval, min_amount, max_amount,
    currency, is_remote, job_level, job_function, listing_type, description,
    company_industry, company_url, company_logo, company_url_direct,
    company_addresses, company_num_employees, company_revenue,
    company_description, experience_range, company_rating,
    company_reviews_count, vacancy_count, work_from_home_type
"#;

/// Pooled Postgres job store.
#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a bounded pool against `database_url`.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the `jobs` table and its indexes if they do not exist.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl JobStorePool for PostgresJobStore {
    type Session = PostgresJobSession;

    async fn acquire(&self) -> Result<Self::Session, StoreError> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))?;
        Ok(PostgresJobSession { conn })
    }
}

/// A single checked-out connection. Returned to the pool on drop.
#[derive(Debug)]
pub struct PostgresJobSession {
    conn: PoolConnection<Postgres>,
}

#[async_trait::async_trait]
impl JobStore for PostgresJobSession {
    #[instrument(
        skip(self, query),
        fields(operation = "search", offset = query.offset, limit = query.limit),
        err
    )]
    async fn search(&mut self, query: &StoreQuery) -> Result<Vec<JobRecord>, StoreError> {
        let sql = format!(
            r#"
            SELECT {COLUMNS}
            FROM jobs
            WHERE ($1::text IS NULL
                   OR to_tsvector('english', coalesce(title, '')) @@ websearch_to_tsquery('english', $1)
                   OR to_tsvector('english', coalesce(company, '')) @@ websearch_to_tsquery('english', $1)
                   OR to_tsvector('english', coalesce(description, '')) @@ websearch_to_tsquery('english', $1))
              AND ($2::text IS NULL OR location ILIKE '%' || $2 || '%' ESCAPE '\')
              AND ($3::boolean IS NULL OR is_remote = $3)
              AND ($4::text IS NULL OR job_type ILIKE '%' || $4 || '%' ESCAPE '\')
              AND ($5::timestamptz IS NULL OR date_posted >= $5)
            ORDER BY date_posted DESC NULLS LAST, id ASC
            OFFSET $6
            LIMIT $7
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(query.text.as_ref().map(|t| t.as_str()))
            .bind(query.location.as_deref().map(escape_like))
            .bind(query.is_remote)
            .bind(query.job_type.as_deref().map(escape_like))
            .bind(query.posted_since)
            .bind(i64::from(query.offset))
            .bind(i64::from(query.limit))
            .fetch_all(&mut *self.conn)
            .await
            .map_err(|e| map_sqlx_error("search", e))?;

        let records = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        debug!(count = records.len(), "store search complete");
        Ok(records)
    }

    #[instrument(skip(self, ids), fields(operation = "existing_provider_ids", probe = ids.len()), err)]
    async fn existing_provider_ids(
        &mut self,
        ids: &[ProviderId],
    ) -> Result<HashSet<ProviderId>, StoreError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let probe: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();

        let rows = sqlx::query("SELECT job_id FROM jobs WHERE job_id = ANY($1)")
            .bind(probe)
            .fetch_all(&mut *self.conn)
            .await
            .map_err(|e| map_sqlx_error("existing_provider_ids", e))?;

        rows.iter()
            .map(|row| {
                let raw: String = row
                    .try_get("job_id")
                    .map_err(|e| StoreError::Decode(e.to_string()))?;
                ProviderId::new(raw).map_err(|e| StoreError::Decode(e.to_string()))
            })
            .collect()
    }

    #[instrument(skip(self, jobs), fields(operation = "insert_batch", batch = jobs.len()), err)]
    async fn insert_batch(&mut self, jobs: &[NewJob]) -> Result<Vec<JobRecord>, StoreError> {
        if jobs.is_empty() {
            return Ok(vec![]);
        }

        let mut tx = self
            .conn
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let mut committed = Vec::with_capacity(jobs.len());
        for job in jobs {
            let store_id = StoreId::new();
            if let Err(e) = insert_statement(store_id, job).execute(&mut *tx).await {
                let rollback = tx.rollback().await;
                return Err(insert_failure("insert_batch", e, rollback));
            }
            committed.push(job.clone().into_record(store_id));
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;
        Ok(committed)
    }

    #[instrument(
        skip(self, job),
        fields(operation = "insert_one", provider_id = %job.provider_id()),
        err
    )]
    async fn insert_one(&mut self, job: &NewJob) -> Result<JobRecord, StoreError> {
        let mut tx = self
            .conn
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let store_id = StoreId::new();
        if let Err(e) = insert_statement(store_id, job).execute(&mut *tx).await {
            let rollback = tx.rollback().await;
            return Err(insert_failure("insert_one", e, rollback));
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;
        Ok(job.clone().into_record(store_id))
    }
}

fn insert_statement(store_id: StoreId, job: &NewJob) -> Query<'_, Postgres, PgArguments> {
    let p = job.posting();
    sqlx::query(
        r#"
        INSERT INTO jobs (
            id, job_id, date_posted, site, job_url, job_url_direct, title, company,
            location, job_type, salary_source, interval, min_amount, max_amount,
            currency, is_remote, job_level, job_function, listing_type, description,
            company_industry, company_url, company_logo, company_url_direct,
            company_addresses, company_num_employees, company_revenue,
            company_description, experience_range, company_rating,
            company_reviews_count, vacancy_count, work_from_home_type
        )
        VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
            $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30,
            $31, $32, $33
        )
        "#,
    )
    .bind(*store_id.as_uuid())
    .bind(job.provider_id().as_str())
    .bind(p.date_posted)
    .bind(p.site.as_deref())
    .bind(p.job_url.as_deref())
    .bind(p.job_url_direct.as_deref())
    .bind(p.title.as_deref())
    .bind(p.company.as_deref())
    .bind(p.location.as_deref())
    .bind(p.job_type.as_deref())
    .bind(p.salary_source.as_deref())
    .bind(p.interval.as_deref())
    .bind(p.min_amount)
    .bind(p.max_amount)
    .bind(p.currency.as_deref())
    .bind(p.is_remote)
    .bind(p.job_level.as_deref())
    .bind(p.job_function.as_deref())
    .bind(p.listing_type.as_deref())
    .bind(p.description.as_deref())
    .bind(p.company_industry.as_deref())
    .bind(p.company_url.as_deref())
    .bind(p.company_logo.as_deref())
    .bind(p.company_url_direct.as_deref())
    .bind(p.company_addresses.as_deref())
    .bind(p.company_num_employees.as_deref())
    .bind(p.company_revenue.as_deref())
    .bind(p.company_description.as_deref())
    .bind(p.experience_range.as_deref())
    .bind(p.company_rating)
    .bind(p.company_reviews_count)
    .bind(p.vacancy_count)
    .bind(p.work_from_home_type.as_deref())
}

fn record_from_row(row: &PgRow) -> Result<JobRecord, sqlx::Error> {
    let id: uuid::Uuid = row.try_get("id")?;
    let job_id: Option<String> = row.try_get("job_id")?;
    let date_posted: Option<DateTime<Utc>> = row.try_get("date_posted")?;

    let posting = JobPosting {
        date_posted,
        site: row.try_get("site")?,
        job_url: row.try_get("job_url")?,
        job_url_direct: row.try_get("job_url_direct")?,
        title: row.try_get("title")?,
        company: row.try_get("company")?,
        location: row.try_get("location")?,
        job_type: row.try_get("job_type")?,
        salary_source: row.try_get("salary_source")?,
        interval: row.try_get("interval")?,
        min_amount: row.try_get("min_amount")?,
        max_amount: row.try_get("max_amount")?,
        currency: row.try_get("currency")?,
        is_remote: row.try_get("is_remote")?,
        job_level: row.try_get("job_level")?,
        job_function: row.try_get("job_function")?,
        listing_type: row.try_get("listing_type")?,
        description: row.try_get("description")?,
        company_industry: row.try_get("company_industry")?,
        company_url: row.try_get("company_url")?,
        company_logo: row.try_get("company_logo")?,
        company_url_direct: row.try_get("company_url_direct")?,
        company_addresses: row.try_get("company_addresses")?,
        company_num_employees: row.try_get("company_num_employees")?,
        company_revenue: row.try_get("company_revenue")?,
        company_description: row.try_get("company_description")?,
        experience_range: row.try_get("experience_range")?,
        company_rating: row.try_get("company_rating")?,
        company_reviews_count: row.try_get("company_reviews_count")?,
        vacancy_count: row.try_get("vacancy_count")?,
        work_from_home_type: row.try_get("work_from_home_type")?,
    };

    // Blank provider ids can only come from rows written outside this store.
    let provider_id = job_id.and_then(|raw| ProviderId::new(raw).ok());
    Ok(JobRecord::from_storage(
        StoreId::from_uuid(id),
        provider_id,
        posting,
    ))
}

/// Escape `LIKE` metacharacters so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    if is_unique_violation(&err) {
        return StoreError::UniqueViolation(format!("{operation}: {err}"));
    }
    match err {
        sqlx::Error::Database(db_err) => StoreError::database(operation, db_err.message()),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Connection(format!("{operation}: {err}"))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Decode(format!("{operation}: {err}"))
        }
        other => StoreError::database(operation, other.to_string()),
    }
}

/// Classify a failed insert. A failed rollback is only logged: the insert
/// error decides whether the caller may fall back or must give up.
fn insert_failure(
    operation: &'static str,
    err: sqlx::Error,
    rollback: Result<(), sqlx::Error>,
) -> StoreError {
    if let Err(rollback_err) = rollback {
        warn!(operation, error = %rollback_err, "rollback after failed insert also failed");
    }
    map_sqlx_error(operation, err)
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}
