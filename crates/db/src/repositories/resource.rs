use sqlx::{sqlite::SqliteRow, Row};

use workflow_core::domain::job::JobId;
use workflow_core::domain::resource::{Resource, ResourceId, ResourceStatus, ResourceType};

use super::{decode_timestamp, RepositoryError, ResourceRepository};
use crate::DbPool;

const SELECT_COLUMNS: &str = "SELECT
        id,
        name,
        resource_type,
        quantity,
        unit,
        status,
        assigned_to,
        driver_name,
        driver_license,
        created_at
     FROM resource";

pub struct SqlResourceRepository {
    pool: DbPool,
}

impl SqlResourceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ResourceRepository for SqlResourceRepository {
    async fn insert(&self, resource: &Resource) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO resource (
                id,
                name,
                resource_type,
                quantity,
                unit,
                status,
                assigned_to,
                driver_name,
                driver_license,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&resource.id.0)
        .bind(&resource.name)
        .bind(resource.resource_type.as_str())
        .bind(i64::from(resource.quantity))
        .bind(&resource.unit)
        .bind(resource.status.as_str())
        .bind(resource.assigned_to.as_ref().map(|id| id.0.as_str()))
        .bind(resource.driver_name.as_deref())
        .bind(resource.driver_license.as_deref())
        .bind(resource.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_job(&self, job_id: &JobId) -> Result<Vec<Resource>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE assigned_to = ? ORDER BY created_at ASC, id ASC"
        ))
        .bind(&job_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(resource_from_row).collect()
    }

    async fn list_all(&self) -> Result<Vec<Resource>, RepositoryError> {
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY created_at ASC, id ASC"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(resource_from_row).collect()
    }
}

fn resource_from_row(row: SqliteRow) -> Result<Resource, RepositoryError> {
    let type_raw: String = row.try_get("resource_type")?;
    let resource_type = ResourceType::parse(&type_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown resource type `{type_raw}`")))?;
    let status_raw: String = row.try_get("status")?;
    let status = ResourceStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown resource status `{status_raw}`")))?;
    let quantity: i64 = row.try_get("quantity")?;

    Ok(Resource {
        id: ResourceId(row.try_get("id")?),
        name: row.try_get("name")?,
        resource_type,
        quantity: u32::try_from(quantity)
            .map_err(|_| RepositoryError::Decode(format!("quantity `{quantity}` out of range")))?,
        unit: row.try_get("unit")?,
        status,
        assigned_to: row.try_get::<Option<String>, _>("assigned_to")?.map(JobId),
        driver_name: row.try_get("driver_name")?,
        driver_license: row.try_get("driver_license")?,
        created_at: decode_timestamp("created_at", &row.try_get::<String, _>("created_at")?)?,
    })
}
