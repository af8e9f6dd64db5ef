use sqlx::{sqlite::SqliteRow, Row};

use workflow_core::domain::job::JobId;
use workflow_core::domain::payment::{
    CostBreakdown, PaymentRequest, PaymentRequestId, PaymentStatus,
};
use workflow_core::identity::ActorId;

use super::{
    decode_decimal, decode_optional_timestamp, decode_timestamp, decode_version,
    PaymentRepository, RepositoryError,
};
use crate::DbPool;

const SELECT_COLUMNS: &str = "SELECT
        id,
        title,
        job_id,
        amount,
        food_cost,
        labor_cost,
        vehicle_cost,
        fuel_cost,
        mileage,
        status,
        notes,
        created_by,
        approved_by,
        approved_at,
        rejected_by,
        rejected_at,
        version,
        created_at,
        updated_at
     FROM payment_request";

pub struct SqlPaymentRepository {
    pool: DbPool,
}

impl SqlPaymentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn current_version(&self, id: &PaymentRequestId) -> Result<Option<u32>, RepositoryError> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM payment_request WHERE id = ?")
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?;
        version.map(decode_version).transpose()
    }
}

#[async_trait::async_trait]
impl PaymentRepository for SqlPaymentRepository {
    async fn find_by_id(
        &self,
        id: &PaymentRequestId,
    ) -> Result<Option<PaymentRequest>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(payment_from_row).transpose()
    }

    async fn insert(&self, request: &PaymentRequest) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO payment_request (
                id,
                title,
                job_id,
                amount,
                food_cost,
                labor_cost,
                vehicle_cost,
                fuel_cost,
                mileage,
                status,
                notes,
                created_by,
                approved_by,
                approved_at,
                rejected_by,
                rejected_at,
                version,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.id.0)
        .bind(&request.title)
        .bind(request.job_id.as_ref().map(|id| id.0.as_str()))
        .bind(request.amount.to_string())
        .bind(request.costs.food_cost.to_string())
        .bind(request.costs.labor_cost.to_string())
        .bind(request.costs.vehicle_cost.to_string())
        .bind(request.costs.fuel_cost.to_string())
        .bind(request.costs.mileage.to_string())
        .bind(request.status.as_str())
        .bind(&request.notes)
        .bind(&request.created_by.0)
        .bind(request.approved_by.as_ref().map(|id| id.0.as_str()))
        .bind(request.approved_at.map(|value| value.to_rfc3339()))
        .bind(request.rejected_by.as_ref().map(|id| id.0.as_str()))
        .bind(request.rejected_at.map(|value| value.to_rfc3339()))
        .bind(i64::from(request.version))
        .bind(request.created_at.to_rfc3339())
        .bind(request.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_versioned(
        &self,
        request: &PaymentRequest,
        expected_version: u32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE payment_request SET
                title = ?,
                status = ?,
                notes = ?,
                approved_by = ?,
                approved_at = ?,
                rejected_by = ?,
                rejected_at = ?,
                version = ?,
                updated_at = ?
             WHERE id = ? AND version = ?",
        )
        .bind(&request.title)
        .bind(request.status.as_str())
        .bind(&request.notes)
        .bind(request.approved_by.as_ref().map(|id| id.0.as_str()))
        .bind(request.approved_at.map(|value| value.to_rfc3339()))
        .bind(request.rejected_by.as_ref().map(|id| id.0.as_str()))
        .bind(request.rejected_at.map(|value| value.to_rfc3339()))
        .bind(i64::from(request.version))
        .bind(request.updated_at.to_rfc3339())
        .bind(&request.id.0)
        .bind(i64::from(expected_version))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        match self.current_version(&request.id).await? {
            Some(actual) => Err(RepositoryError::VersionConflict {
                id: request.id.0.clone(),
                expected: expected_version,
                actual,
            }),
            None => Err(RepositoryError::NotFound(format!("payment request {}", request.id))),
        }
    }

    async fn list(
        &self,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<PaymentRequest>, RepositoryError> {
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

        rows.into_iter().map(payment_from_row).collect()
    }
}

fn payment_from_row(row: SqliteRow) -> Result<PaymentRequest, RepositoryError> {
    let status_raw: String = row.try_get("status")?;
    let status = PaymentStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown payment status `{status_raw}`")))?;

    let costs = CostBreakdown {
        food_cost: decode_decimal("food_cost", &row.try_get::<String, _>("food_cost")?)?,
        labor_cost: decode_decimal("labor_cost", &row.try_get::<String, _>("labor_cost")?)?,
        vehicle_cost: decode_decimal("vehicle_cost", &row.try_get::<String, _>("vehicle_cost")?)?,
        fuel_cost: decode_decimal("fuel_cost", &row.try_get::<String, _>("fuel_cost")?)?,
        mileage: decode_decimal("mileage", &row.try_get::<String, _>("mileage")?)?,
    };

    Ok(PaymentRequest {
        id: PaymentRequestId(row.try_get("id")?),
        title: row.try_get("title")?,
        job_id: row.try_get::<Option<String>, _>("job_id")?.map(JobId),
        amount: decode_decimal("amount", &row.try_get::<String, _>("amount")?)?,
        costs,
        status,
        notes: row.try_get("notes")?,
        created_by: ActorId(row.try_get("created_by")?),
        approved_by: row.try_get::<Option<String>, _>("approved_by")?.map(ActorId),
        approved_at: decode_optional_timestamp("approved_at", row.try_get("approved_at")?)?,
        rejected_by: row.try_get::<Option<String>, _>("rejected_by")?.map(ActorId),
        rejected_at: decode_optional_timestamp("rejected_at", row.try_get("rejected_at")?)?,
        version: decode_version(row.try_get("version")?)?,
        created_at: decode_timestamp("created_at", &row.try_get::<String, _>("created_at")?)?,
        updated_at: decode_timestamp("updated_at", &row.try_get::<String, _>("updated_at")?)?,
    })
}
