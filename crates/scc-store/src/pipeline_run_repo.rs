//! Repository for the authoritative `pipeline_runs` table.

use sqlx::{Row, SqlitePool};

use scc_models::{CablecastShowId, CablecastVodId, JobId, PipelineRun, PipelineStage, RunId};

use crate::error::{StoreError, StoreResult};

pub struct PipelineRunRepository {
    pool: SqlitePool,
}

impl PipelineRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, run: &PipelineRun) -> StoreResult<()> {
        let recording = serde_json::to_string(&run.recording)?;
        let artifacts = serde_json::to_string(&run.artifacts)?;

        sqlx::query(
            r#"
            INSERT INTO pipeline_runs (
                run_id, job_id, recording, stage, artifacts, cablecast_show_id, cablecast_vod_id, needs_review
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(run_id) DO UPDATE SET
                recording = excluded.recording,
                stage = excluded.stage,
                artifacts = excluded.artifacts,
                cablecast_show_id = excluded.cablecast_show_id,
                cablecast_vod_id = excluded.cablecast_vod_id,
                needs_review = excluded.needs_review
            "#,
        )
        .bind(run.run_id.as_str())
        .bind(run.job_id.as_str())
        .bind(recording)
        .bind(format!("{:?}", run.stage).to_lowercase())
        .bind(artifacts)
        .bind(run.cablecast_show_id.as_ref().map(CablecastShowId::as_str))
        .bind(run.cablecast_vod_id.as_ref().map(CablecastVodId::as_str))
        .bind(run.needs_review)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, run_id: &RunId) -> StoreResult<PipelineRun> {
        let row = sqlx::query("SELECT * FROM pipeline_runs WHERE run_id = ?")
            .bind(run_id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::RunNotFound(run_id.as_str().to_string()))?;
        row_to_run(&row)
    }

    pub async fn get_by_job(&self, job_id: &JobId) -> StoreResult<Option<PipelineRun>> {
        let row = sqlx::query("SELECT * FROM pipeline_runs WHERE job_id = ?")
            .bind(job_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_run).transpose()
    }
}

fn row_to_run(row: &sqlx::sqlite::SqliteRow) -> StoreResult<PipelineRun> {
    let stage: String = row.try_get("stage")?;
    let recording: String = row.try_get("recording")?;
    let artifacts: String = row.try_get("artifacts")?;
    let cablecast_show_id: Option<String> = row.try_get("cablecast_show_id")?;
    let cablecast_vod_id: Option<String> = row.try_get("cablecast_vod_id")?;

    Ok(PipelineRun {
        run_id: RunId::from_string(row.try_get::<String, _>("run_id")?),
        job_id: JobId::from_string(row.try_get::<String, _>("job_id")?),
        recording: serde_json::from_str(&recording)?,
        stage: parse_stage(&stage),
        artifacts: serde_json::from_str(&artifacts)?,
        cablecast_show_id: cablecast_show_id.map(CablecastShowId::from_string),
        cablecast_vod_id: cablecast_vod_id.map(CablecastVodId::from_string),
        needs_review: row.try_get("needs_review")?,
    })
}

fn parse_stage(s: &str) -> PipelineStage {
    use PipelineStage::*;
    match s {
        "discovered" => Discovered,
        "transcribed" => Transcribed,
        "captioned" => Captioned,
        "remuxed" => Remuxed,
        "uploaded" => Uploaded,
        "validated" => Validated,
        "cleaned" => Cleaned,
        "failed" => Failed,
        other => unreachable!("unknown pipeline stage persisted in store: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::connect;
    use scc_models::{Recording, VolumeId};
    use std::path::PathBuf;

    async fn repo() -> PipelineRunRepository {
        let pool = connect(":memory:").await.unwrap();
        PipelineRunRepository::new(pool)
    }

    fn sample_run() -> PipelineRun {
        let recording = Recording::new(VolumeId::from("flex-1"), PathBuf::from("/mnt/flex-1/a.mp4"), 100, chrono::Utc::now());
        PipelineRun::new(JobId::new(), recording)
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let repo = repo().await;
        let run = sample_run();
        repo.upsert(&run).await.unwrap();
        let fetched = repo.get(&run.run_id).await.unwrap();
        assert_eq!(fetched.run_id, run.run_id);
        assert_eq!(fetched.stage, PipelineStage::Discovered);
    }

    #[tokio::test]
    async fn upsert_is_idempotent_on_conflict() {
        let repo = repo().await;
        let mut run = sample_run();
        repo.upsert(&run).await.unwrap();

        run.stage = PipelineStage::Transcribed;
        repo.upsert(&run).await.unwrap();

        let fetched = repo.get(&run.run_id).await.unwrap();
        assert_eq!(fetched.stage, PipelineStage::Transcribed);
    }

    #[tokio::test]
    async fn get_by_job_finds_the_run_for_that_job() {
        let repo = repo().await;
        let run = sample_run();
        repo.upsert(&run).await.unwrap();

        let found = repo.get_by_job(&run.job_id).await.unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().run_id, run.run_id);
    }
}
