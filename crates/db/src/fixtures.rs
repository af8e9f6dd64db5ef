use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

struct SeedJob {
    id: &'static str,
    status: &'static str,
    resource_count: i64,
}

struct SeedPayment {
    id: &'static str,
    job_id: &'static str,
    status: &'static str,
    amount: &'static str,
}

const SEED_JOBS: &[SeedJob] = &[
    SeedJob { id: "JOB-DEMO-001", status: "in-progress", resource_count: 1 },
    SeedJob { id: "JOB-DEMO-002", status: "pending", resource_count: 0 },
    SeedJob { id: "JOB-DEMO-003", status: "completed", resource_count: 1 },
];

const SEED_PAYMENTS: &[SeedPayment] = &[
    SeedPayment {
        id: "PAY-DEMO-001",
        job_id: "JOB-DEMO-001",
        status: "pending",
        amount: "1240.00",
    },
    SeedPayment { id: "PAY-DEMO-002", job_id: "JOB-DEMO-001", status: "flagged", amount: "80.00" },
    SeedPayment {
        id: "PAY-DEMO-003",
        job_id: "JOB-DEMO-003",
        status: "completed",
        amount: "410.00",
    },
    SeedPayment { id: "PAY-DEMO-004", job_id: "JOB-DEMO-002", status: "failed", amount: "300.00" },
];

/// Demo dataset covering every payment status and a job per lifecycle stage.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            job_ids: SEED_JOBS.iter().map(|job| job.id).collect(),
            payment_ids: SEED_PAYMENTS.iter().map(|payment| payment.id).collect(),
        })
    }

    /// Checks that every seeded row is present with its seeded status.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for job in SEED_JOBS {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM job WHERE id = ?1 AND status = ?2)")
                    .bind(job.id)
                    .bind(job.status)
                    .fetch_one(pool)
                    .await?;
            checks.push((job.id.to_string(), exists == 1));

            let resources: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM resource WHERE assigned_to = ?1")
                    .bind(job.id)
                    .fetch_one(pool)
                    .await?;
            checks.push((format!("{} resources", job.id), resources == job.resource_count));
        }

        for payment in SEED_PAYMENTS {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM payment_request
                  WHERE id = ?1 AND job_id = ?2 AND status = ?3 AND amount = ?4)",
            )
            .bind(payment.id)
            .bind(payment.job_id)
            .bind(payment.status)
            .bind(payment.amount)
            .fetch_one(pool)
            .await?;
            checks.push((payment.id.to_string(), exists == 1));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub job_ids: Vec<&'static str>,
    pub payment_ids: Vec<&'static str>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}

impl VerificationResult {
    pub fn missing(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|(_, present)| !present)
            .map(|(label, _)| label.as_str())
            .collect()
    }
}
