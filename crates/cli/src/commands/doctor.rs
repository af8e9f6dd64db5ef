use std::path::Path;

use serde::Serialize;
use workflow_core::config::{AppConfig, LoadOptions};
use workflow_db::{connect_with_config, migrations::MIGRATOR, DbPool};

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                format!(
                    "configuration loaded; fuel threshold {} per mile",
                    config.payments.max_fuel_cost_per_mile
                ),
            ));
            checks.extend(check_database(&config));
            checks.push(check_session_store(config.session.store_path.as_deref()));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            for name in ["database_connectivity", "schema_migrations", "session_store"] {
                checks.push(DoctorCheck::skipped(name, "configuration did not load"));
            }
        }
    }

    summarize(checks)
}

fn summarize(checks: Vec<DoctorCheck>) -> DoctorReport {
    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::fail(
                    "database_connectivity",
                    format!("failed to initialize async runtime: {error}"),
                ),
                DoctorCheck::skipped("schema_migrations", "no async runtime"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::skipped("schema_migrations", "the database is unreachable"),
                ];
            }
        };

        let checks = vec![
            DoctorCheck::pass(
                "database_connectivity",
                format!("connected using `{}`", config.database.url),
            ),
            check_schema(&pool).await,
        ];
        pool.close().await;
        checks
    })
}

async fn check_schema(pool: &DbPool) -> DoctorCheck {
    let expected =
        MIGRATOR.iter().filter(|migration| migration.migration_type.is_up_migration()).count();
    let applied = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1",
    )
    .fetch_one(pool)
    .await;

    match applied {
        Ok(applied) if usize::try_from(applied).map_or(false, |count| count >= expected) => {
            DoctorCheck::pass("schema_migrations", format!("{applied} migration(s) applied"))
        }
        Ok(applied) => DoctorCheck::fail(
            "schema_migrations",
            format!("{applied} of {expected} migration(s) applied; run `workflow migrate`"),
        ),
        Err(_) => DoctorCheck::fail(
            "schema_migrations",
            "schema is not initialised; run `workflow migrate`".to_string(),
        ),
    }
}

fn check_session_store(store_path: Option<&Path>) -> DoctorCheck {
    let Some(path) = store_path else {
        return DoctorCheck::pass("session_store", "sessions are kept in memory");
    };

    let parent = path.parent().filter(|parent| !parent.as_os_str().is_empty());
    match parent {
        Some(parent) if !parent.is_dir() => DoctorCheck::fail(
            "session_store",
            format!("directory `{}` does not exist", parent.display()),
        ),
        _ if path.is_dir() => {
            DoctorCheck::fail("session_store", format!("`{}` is a directory", path.display()))
        }
        _ => {
            DoctorCheck::pass("session_store", format!("sessions persist to `{}`", path.display()))
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
