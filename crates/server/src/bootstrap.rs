use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

use workflow_core::audit::AuditSink;
use workflow_core::config::{AppConfig, ConfigError, LoadOptions};
use workflow_core::fraud::FraudDetector;
use workflow_core::identity::AccountDirectory;
use workflow_core::notify::Notifier;
use workflow_core::payments::PaymentWorkflow;
use workflow_core::session::{
    InMemoryKeyValueStore, JsonFileKeyValueStore, KeyValueStore, SessionManager,
};
use workflow_db::repositories::{SqlJobRepository, SqlPaymentRepository, SqlResourceRepository};
use workflow_db::{connect_with_config, migrations, ChangeHub, DbPool};
use workflow_services::{JobService, PaymentService, ResourceService, ServiceContext};

use crate::api::AppState;
use crate::dashboard;
use crate::telemetry::{TracingAuditSink, TracingNotifier};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub hub: ChangeHub,
    pub state: AppState,
    pub dashboard_task: JoinHandle<()>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let hub = ChangeHub::default();
    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let context = ServiceContext::new(hub.clone(), audit.clone(), notifier);

    let payments = Arc::new(SqlPaymentRepository::new(db_pool.clone()));
    let jobs = Arc::new(SqlJobRepository::new(db_pool.clone()));
    let resources = Arc::new(SqlResourceRepository::new(db_pool.clone()));
    let workflow = PaymentWorkflow::new(FraudDetector::new(config.payments.fraud_thresholds()));
    let directory = AccountDirectory::demo();

    let (dashboard, dashboard_task) = dashboard::spawn(payments.clone(), &hub.payments).await;
    info!(
        event_name = "system.bootstrap.dashboard_subscribed",
        correlation_id = "bootstrap",
        table = hub.payments.table(),
        "payment dashboard subscribed to change feed"
    );

    let state = AppState {
        sessions: session_manager(&config, directory.clone()),
        audit,
        payments: Arc::new(PaymentService::new(payments, jobs.clone(), workflow, context.clone())),
        jobs: Arc::new(JobService::new(jobs.clone(), directory, context.clone())),
        resources: Arc::new(ResourceService::new(resources, jobs, context)),
        dashboard,
    };

    Ok(Application { config, db_pool, hub, state, dashboard_task })
}

fn session_manager(config: &AppConfig, directory: AccountDirectory) -> SessionManager {
    let store: Arc<dyn KeyValueStore> = match &config.session.store_path {
        Some(path) => {
            info!(
                event_name = "system.bootstrap.session_store",
                correlation_id = "bootstrap",
                store_path = %path.display(),
                "sessions persist to file"
            );
            Arc::new(JsonFileKeyValueStore::new(path.clone()))
        }
        None => Arc::new(InMemoryKeyValueStore::default()),
    };
    SessionManager::new(store, directory)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use workflow_core::audit::AuditContext;
    use workflow_core::config::{ConfigOverrides, LoadOptions};
    use workflow_core::domain::job::JobId;
    use workflow_core::forms::PaymentRequestForm;
    use workflow_db::DemoSeedDataset;

    use crate::bootstrap::bootstrap;

    fn overrides(dir: &TempDir) -> LoadOptions {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("workflow.db").display());
        LoadOptions {
            overrides: ConfigOverrides { database_url: Some(url), ..ConfigOverrides::default() },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_rejects_an_invalid_fuel_threshold() {
        let dir = TempDir::new().expect("tempdir");
        let mut options = overrides(&dir);
        options.overrides.max_fuel_cost_per_mile = Some(rust_decimal::Decimal::NEGATIVE_ONE);

        let message = bootstrap(options).await.err().expect("invalid config").to_string();
        assert!(message.contains("max_fuel_cost_per_mile"), "{message}");
    }

    #[tokio::test]
    async fn bootstrapped_services_share_the_database_and_the_dashboard() {
        let dir = TempDir::new().expect("tempdir");
        let app = bootstrap(overrides(&dir)).await.expect("bootstrap");
        DemoSeedDataset::load(&app.db_pool).await.expect("seed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('job', 'payment_request', 'resource')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("tables");
        assert_eq!(table_count, 3);

        let session = app.state.sessions.login("leader@example.com", "demo").expect("login");
        let mut form = PaymentRequestForm {
            title: "Diesel".into(),
            fuel_cost: "120".into(),
            mileage: "100".into(),
            ..PaymentRequestForm::default()
        };
        let outcome = app
            .state
            .payments
            .submit(
                &session.actor,
                &AuditContext::new("req-boot", "2"),
                Some(JobId("JOB-DEMO-002".into())),
                &mut form,
            )
            .await;
        assert!(outcome.is_success(), "{:?}", outcome.result);
        assert_eq!(app.hub.payments.subscriber_count(), 1);

        app.dashboard_task.abort();
        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn configured_store_path_keeps_sessions_on_disk() {
        let dir = TempDir::new().expect("tempdir");
        let store = dir.path().join("sessions.json");
        let mut options = overrides(&dir);
        options.overrides.session_store_path = Some(store.clone());

        let app = bootstrap(options).await.expect("bootstrap");
        app.state.sessions.login("admin@example.com", "demo").expect("login");
        assert!(store.exists());
        app.dashboard_task.abort();
        app.db_pool.close().await;
    }
}
