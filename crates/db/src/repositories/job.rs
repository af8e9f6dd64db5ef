use sqlx::{sqlite::SqliteRow, Row};

use workflow_core::domain::job::{Job, JobId, JobStatus};
use workflow_core::identity::ActorId;

use super::{decode_date, decode_decimal, decode_timestamp, JobRepository, RepositoryError};
use crate::DbPool;

const SELECT_COLUMNS: &str = "SELECT
        id,
        title,
        description,
        location,
        budget,
        status,
        assigned_to,
        due_date,
        created_by,
        created_at,
        updated_at
     FROM job";

pub struct SqlJobRepository {
    pool: DbPool,
}

impl SqlJobRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl JobRepository for SqlJobRepository {
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(job_from_row).transpose()
    }

    async fn insert(&self, job: &Job) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO job (
                id,
                title,
                description,
                location,
                budget,
                status,
                assigned_to,
                due_date,
                created_by,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&job.id.0)
        .bind(&job.title)
        .bind(&job.description)
        .bind(&job.location)
        .bind(job.budget.to_string())
        .bind(job.status.as_str())
        .bind(job.assigned_to.as_ref().map(|id| id.0.as_str()))
        .bind(job.due_date.map(|date| date.format("%Y-%m-%d").to_string()))
        .bind(job.created_by.as_ref().map(|id| id.0.as_str()))
        .bind(job.created_at.to_rfc3339())
        .bind(job.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save(&self, job: &Job) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE job SET
                title = ?,
                description = ?,
                location = ?,
                budget = ?,
                status = ?,
                assigned_to = ?,
                due_date = ?,
                updated_at = ?
             WHERE id = ?",
        )
        .bind(&job.title)
        .bind(&job.description)
        .bind(&job.location)
        .bind(job.budget.to_string())
        .bind(job.status.as_str())
        .bind(job.assigned_to.as_ref().map(|id| id.0.as_str()))
        .bind(job.due_date.map(|date| date.format("%Y-%m-%d").to_string()))
        .bind(job.updated_at.to_rfc3339())
        .bind(&job.id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("job {}", job.id)));
        }
        Ok(())
    }

    async fn list(&self, status: Option<JobStatus>) -> Result<Vec<Job>, RepositoryError> {
        let rows = if let Some(status) = status {
            sqlx::query(&format!(
                "{SELECT_COLUMNS} WHERE status = ? ORDER BY created_at DESC, id ASC"
            ))
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY created_at DESC, id ASC"))
                .fetch_all(&self.pool)
                .await?
        };

        rows.into_iter().map(job_from_row).collect()
    }
}

fn job_from_row(row: SqliteRow) -> Result<Job, RepositoryError> {
    let status_raw: String = row.try_get("status")?;
    let status = JobStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown job status `{status_raw}`")))?;
    let due_date = row
        .try_get::<Option<String>, _>("due_date")?
        .map(|raw| decode_date("due_date", &raw))
        .transpose()?;

    Ok(Job {
        id: JobId(row.try_get("id")?),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        location: row.try_get("location")?,
        budget: decode_decimal("budget", &row.try_get::<String, _>("budget")?)?,
        status,
        assigned_to: row.try_get::<Option<String>, _>("assigned_to")?.map(ActorId),
        due_date,
        created_by: row.try_get::<Option<String>, _>("created_by")?.map(ActorId),
        created_at: decode_timestamp("created_at", &row.try_get::<String, _>("created_at")?)?,
        updated_at: decode_timestamp("updated_at", &row.try_get::<String, _>("updated_at")?)?,
    })
}
