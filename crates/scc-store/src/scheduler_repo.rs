//! Repository for scheduler firing state: `last_fired_at` per template.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use scc_models::TemplateName;

use crate::error::StoreResult;

pub struct SchedulerRepository {
    pool: SqlitePool,
}

impl SchedulerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn last_fired_at(&self, template_name: &TemplateName) -> StoreResult<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT last_fired_at FROM scheduler_state WHERE template_name = ?")
            .bind(template_name.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            None => Ok(None),
            Some(row) => {
                let raw: Option<String> = row.try_get("last_fired_at")?;
                Ok(raw
                    .map(|s| DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc)))
                    .transpose()
                    .map_err(|e| sqlx::Error::Decode(Box::new(e)))?)
            }
        }
    }

    /// Record a firing (or suppression) decision transactionally.
    pub async fn record_fired(&self, template_name: &TemplateName, fired_at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO scheduler_state (template_name, last_fired_at) VALUES (?, ?)
            ON CONFLICT(template_name) DO UPDATE SET last_fired_at = excluded.last_fired_at
            "#,
        )
        .bind(template_name.as_str())
        .bind(fired_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::connect;

    #[tokio::test]
    async fn last_fired_at_is_none_before_first_record() {
        let pool = connect(":memory:").await.unwrap();
        let repo = SchedulerRepository::new(pool);
        let name = TemplateName::from("daily-vod-process");
        assert!(repo.last_fired_at(&name).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn record_fired_then_last_fired_at_round_trips() {
        let pool = connect(":memory:").await.unwrap();
        let repo = SchedulerRepository::new(pool);
        let name = TemplateName::from("daily-vod-process");
        let now = Utc::now();
        repo.record_fired(&name, now).await.unwrap();

        let fetched = repo.last_fired_at(&name).await.unwrap().unwrap();
        assert_eq!(fetched.timestamp(), now.timestamp());
    }

    #[tokio::test]
    async fn record_fired_overwrites_previous_value() {
        let pool = connect(":memory:").await.unwrap();
        let repo = SchedulerRepository::new(pool);
        let name = TemplateName::from("daily-vod-process");
        repo.record_fired(&name, Utc::now() - chrono::Duration::hours(1)).await.unwrap();
        let second = Utc::now();
        repo.record_fired(&name, second).await.unwrap();

        let fetched = repo.last_fired_at(&name).await.unwrap().unwrap();
        assert_eq!(fetched.timestamp(), second.timestamp());
    }
}
