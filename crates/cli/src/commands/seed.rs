use workflow_db::{DemoSeedDataset, VerificationResult};

use crate::commands::{connect_and_migrate, prepare, CommandResult, StepError, EXIT_SEED};

pub fn run(verify_only: bool) -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_and_migrate(&config).await?;

        let seeded = if verify_only {
            None
        } else {
            let seeded = DemoSeedDataset::load(&pool)
                .await
                .map_err(|error| ("seed_execution", error.to_string(), EXIT_SEED))?;
            Some(seeded)
        };

        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), EXIT_SEED))?;
        pool.close().await;

        verified(&verification)?;
        Ok::<_, StepError>(seeded)
    });

    match result {
        Ok(Some(seeded)) => CommandResult::success(
            "seed",
            format!(
                "demo dataset loaded:\n  - jobs: {}\n  - payment requests: {}",
                seeded.job_ids.join(", "),
                seeded.payment_ids.join(", ")
            ),
        ),
        Ok(None) => CommandResult::success("seed", "demo dataset present"),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn verified(verification: &VerificationResult) -> Result<(), StepError> {
    if verification.all_present {
        return Ok(());
    }
    let message = format!("seed verification failed for: {}", verification.missing().join(", "));
    Err(("seed_verification", message, EXIT_SEED))
}

#[cfg(test)]
mod tests {
    use workflow_db::VerificationResult;

    use super::verified;

    #[test]
    fn verification_error_names_the_missing_rows() {
        let verification = VerificationResult {
            all_present: false,
            checks: vec![
                ("JOB-DEMO-001".to_string(), true),
                ("PAY-DEMO-002".to_string(), false),
                ("JOB-DEMO-003 resources".to_string(), false),
            ],
        };

        let (class, message, code) = verified(&verification).expect_err("rows missing");
        assert_eq!(class, "seed_verification");
        assert_eq!(code, 6);
        assert_eq!(message, "seed verification failed for: PAY-DEMO-002, JOB-DEMO-003 resources");
    }
}
