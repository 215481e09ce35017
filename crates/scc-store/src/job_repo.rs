//! Repository for the authoritative `jobs` table.

use chrono::{DateTime, Utc};
use sqlx::error::DatabaseError;
use sqlx::{Row, SqlitePool};

use scc_models::{Fingerprint, Job, JobId, JobState, QueueName, StructuredError, TemplateName};

use crate::error::{StoreError, StoreResult};

/// Filter applied by [`JobRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub queue: Option<QueueName>,
    pub state: Option<JobState>,
    pub template_name: Option<TemplateName>,
}

pub struct JobRepository {
    pool: SqlitePool,
}

impl JobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new job. Fails with [`StoreError::DuplicateActiveFingerprint`]
    /// if a non-terminal job already claims the same fingerprint.
    pub async fn insert(&self, job: &Job) -> StoreResult<()> {
        let payload = serde_json::to_string(&job.payload)?;
        let last_error = job.last_error.as_ref().map(serde_json::to_string).transpose()?;

        let result = sqlx::query(
            r#"
            INSERT INTO jobs (
                job_id, template_name, queue, fingerprint, state, attempt, max_attempts,
                earliest_start, lease_deadline, created_at, updated_at, last_error,
                parent_job_id, payload
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.job_id.as_str())
        .bind(job.template_name.as_str())
        .bind(job.queue.as_str())
        .bind(job.fingerprint.as_ref().map(Fingerprint::as_str))
        .bind(job.state.as_str())
        .bind(job.attempt as i64)
        .bind(job.max_attempts as i64)
        .bind(job.earliest_start.to_rfc3339())
        .bind(job.lease_deadline.map(|t| t.to_rfc3339()))
        .bind(job.created_at.to_rfc3339())
        .bind(job.updated_at.to_rfc3339())
        .bind(last_error)
        .bind(job.parent_job_id.as_ref().map(JobId::as_str))
        .bind(payload)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                StoreError::DuplicateActiveFingerprint(job.fingerprint.as_ref().map(Fingerprint::as_str).unwrap_or("").to_string()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, job_id: &JobId) -> StoreResult<Job> {
        let row = sqlx::query("SELECT * FROM jobs WHERE job_id = ?")
            .bind(job_id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::JobNotFound(job_id.as_str().to_string()))?;
        row_to_job(&row)
    }

    pub async fn list(&self, filter: &JobFilter) -> StoreResult<Vec<Job>> {
        // Runtime-built query: the `query` macro variants require a live
        // database at compile time, which this store's callers cannot assume.
        let mut sql = String::from("SELECT * FROM jobs WHERE 1=1");
        if filter.queue.is_some() {
            sql.push_str(" AND queue = ?");
        }
        if filter.state.is_some() {
            sql.push_str(" AND state = ?");
        }
        if filter.template_name.is_some() {
            sql.push_str(" AND template_name = ?");
        }
        sql.push_str(" ORDER BY earliest_start ASC, created_at ASC");

        let mut query = sqlx::query(&sql);
        if let Some(q) = &filter.queue {
            query = query.bind(q.as_str());
        }
        if let Some(s) = &filter.state {
            query = query.bind(s.as_str());
        }
        if let Some(t) = &filter.template_name {
            query = query.bind(t.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_job).collect()
    }

    /// Atomically lease the oldest queued (or due-for-retry) job in `queue`,
    /// setting `lease_deadline` and transitioning to `Leased`.
    pub async fn lease_next(&self, queue: &QueueName, lease_deadline: DateTime<Utc>) -> StoreResult<Option<Job>> {
        let mut tx = self.pool.begin().await?;

        let now = Utc::now().to_rfc3339();
        let candidate = sqlx::query(
            r#"
            SELECT * FROM jobs
            WHERE queue = ? AND state IN ('queued', 'retrying') AND earliest_start <= ?
            ORDER BY earliest_start ASC, created_at ASC
            LIMIT 1
            "#,
        )
        .bind(queue.as_str())
        .bind(&now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = candidate else {
            tx.commit().await?;
            return Ok(None);
        };

        let mut job = row_to_job(&row)?;
        job.state = JobState::Leased;
        job.lease_deadline = Some(lease_deadline);
        job.updated_at = Utc::now();

        sqlx::query("UPDATE jobs SET state = ?, lease_deadline = ?, updated_at = ? WHERE job_id = ?")
            .bind(job.state.as_str())
            .bind(job.lease_deadline.map(|t| t.to_rfc3339()))
            .bind(job.updated_at.to_rfc3339())
            .bind(job.job_id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(job))
    }

    /// Jobs whose lease has expired while Leased/Running: the worker is
    /// presumed dead. Transitions them to `Retrying` without consuming an attempt.
    pub async fn reclaim_expired(&self, now: DateTime<Utc>) -> StoreResult<Vec<JobId>> {
        let rows = sqlx::query(
            "SELECT job_id FROM jobs WHERE state IN ('leased', 'running') AND lease_deadline IS NOT NULL AND lease_deadline < ?",
        )
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            let job_id: String = row.try_get("job_id")?;
            sqlx::query("UPDATE jobs SET state = 'retrying', lease_deadline = NULL, updated_at = ? WHERE job_id = ?")
                .bind(Utc::now().to_rfc3339())
                .bind(&job_id)
                .execute(&self.pool)
                .await?;
            ids.push(JobId::from_string(job_id));
        }
        Ok(ids)
    }

    pub async fn transition(&self, job_id: &JobId, new_state: JobState, last_error: Option<StructuredError>) -> StoreResult<()> {
        let last_error_json = last_error.as_ref().map(serde_json::to_string).transpose()?;
        let result = sqlx::query(
            "UPDATE jobs SET state = ?, last_error = COALESCE(?, last_error), updated_at = ? WHERE job_id = ?",
        )
        .bind(new_state.as_str())
        .bind(last_error_json)
        .bind(Utc::now().to_rfc3339())
        .bind(job_id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::JobNotFound(job_id.as_str().to_string()));
        }
        Ok(())
    }

    /// Move a job to `Retrying`, incrementing `attempt` and setting the next
    /// `earliest_start` per the caller-computed backoff delay.
    pub async fn retry(&self, job_id: &JobId, next_earliest_start: DateTime<Utc>, last_error: StructuredError) -> StoreResult<()> {
        let last_error_json = serde_json::to_string(&last_error)?;
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'retrying', attempt = attempt + 1, earliest_start = ?, lease_deadline = NULL,
                last_error = ?, updated_at = ?
            WHERE job_id = ?
            "#,
        )
        .bind(next_earliest_start.to_rfc3339())
        .bind(last_error_json)
        .bind(Utc::now().to_rfc3339())
        .bind(job_id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::JobNotFound(job_id.as_str().to_string()));
        }
        Ok(())
    }

    pub async fn cancel(&self, job_id: &JobId) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE jobs SET state = 'cancelled', updated_at = ? WHERE job_id = ? AND state IN ('queued', 'leased', 'retrying')",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(job_id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::JobNotFound(job_id.as_str().to_string()));
        }
        Ok(())
    }
}

fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> StoreResult<Job> {
    let state: String = row.try_get("state")?;
    let payload: String = row.try_get("payload")?;
    let last_error: Option<String> = row.try_get("last_error")?;
    let fingerprint: Option<String> = row.try_get("fingerprint")?;
    let parent_job_id: Option<String> = row.try_get("parent_job_id")?;
    let lease_deadline: Option<String> = row.try_get("lease_deadline")?;

    Ok(Job {
        job_id: JobId::from_string(row.try_get::<String, _>("job_id")?),
        template_name: row.try_get::<String, _>("template_name")?.into(),
        queue: row.try_get::<String, _>("queue")?.into(),
        fingerprint: fingerprint.map(Fingerprint::from_string),
        state: parse_job_state(&state),
        attempt: row.try_get::<i64, _>("attempt")? as u32,
        max_attempts: row.try_get::<i64, _>("max_attempts")? as u32,
        earliest_start: parse_datetime(row.try_get::<String, _>("earliest_start")?)?,
        lease_deadline: lease_deadline.map(parse_datetime).transpose()?,
        created_at: parse_datetime(row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_datetime(row.try_get::<String, _>("updated_at")?)?,
        last_error: last_error.map(|s| serde_json::from_str(&s)).transpose()?,
        parent_job_id: parent_job_id.map(JobId::from_string),
        payload: serde_json::from_str(&payload)?,
    })
}

fn parse_datetime(s: String) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))
}

fn parse_job_state(s: &str) -> JobState {
    match s {
        "queued" => JobState::Queued,
        "leased" => JobState::Leased,
        "running" => JobState::Running,
        "succeeded" => JobState::Succeeded,
        "failed" => JobState::Failed,
        "retrying" => JobState::Retrying,
        "cancelled" => JobState::Cancelled,
        other => unreachable!("unknown job state persisted in store: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::connect;
    use scc_models::JobPayload;

    async fn repo() -> JobRepository {
        let pool = connect(":memory:").await.unwrap();
        JobRepository::new(pool)
    }

    #[tokio::test]
    async fn insert_and_get_round_trips() {
        let repo = repo().await;
        let job = Job::new("cleanup", "default", JobPayload::Cleanup, 3);
        repo.insert(&job).await.unwrap();
        let fetched = repo.get(&job.job_id).await.unwrap();
        assert_eq!(fetched.job_id, job.job_id);
        assert_eq!(fetched.state, JobState::Queued);
    }

    #[tokio::test]
    async fn duplicate_active_fingerprint_is_rejected() {
        let repo = repo().await;
        let fp = Fingerprint::from_string("abc123");
        let job1 = Job::new("process-single-vod", "vod_processing", JobPayload::CaptionCheck, 5).with_fingerprint(fp.clone());
        let job2 = Job::new("process-single-vod", "vod_processing", JobPayload::CaptionCheck, 5).with_fingerprint(fp);
        repo.insert(&job1).await.unwrap();
        let err = repo.insert(&job2).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateActiveFingerprint(_)));
    }

    #[tokio::test]
    async fn lease_next_picks_oldest_queued_job() {
        let repo = repo().await;
        let job = Job::new("cleanup", "default", JobPayload::Cleanup, 3);
        repo.insert(&job).await.unwrap();

        let leased = repo.lease_next(&QueueName::from("default"), Utc::now() + chrono::Duration::minutes(5)).await.unwrap();
        assert!(leased.is_some());
        assert_eq!(leased.unwrap().state, JobState::Leased);

        let none_left = repo.lease_next(&QueueName::from("default"), Utc::now() + chrono::Duration::minutes(5)).await.unwrap();
        assert!(none_left.is_none());
    }

    #[tokio::test]
    async fn reclaim_expired_moves_stale_leases_to_retrying() {
        let repo = repo().await;
        let job = Job::new("cleanup", "default", JobPayload::Cleanup, 3);
        repo.insert(&job).await.unwrap();
        repo.lease_next(&QueueName::from("default"), Utc::now() - chrono::Duration::minutes(1)).await.unwrap();

        let reclaimed = repo.reclaim_expired(Utc::now()).await.unwrap();
        assert_eq!(reclaimed, vec![job.job_id.clone()]);

        let fetched = repo.get(&job.job_id).await.unwrap();
        assert_eq!(fetched.state, JobState::Retrying);
        assert!(fetched.lease_deadline.is_none());
    }

    #[tokio::test]
    async fn cancel_refuses_terminal_jobs() {
        let repo = repo().await;
        let job = Job::new("cleanup", "default", JobPayload::Cleanup, 3);
        repo.insert(&job).await.unwrap();
        repo.transition(&job.job_id, JobState::Succeeded, None).await.unwrap();

        let err = repo.cancel(&job.job_id).await.unwrap_err();
        assert!(matches!(err, StoreError::JobNotFound(_)));
    }
}
