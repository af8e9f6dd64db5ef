use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use toml::Value;
use workflow_core::config::{AppConfig, LoadOptions};

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_values(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn effective_values(config: &AppConfig) -> Vec<Field> {
    let session_store = match &config.session.store_path {
        Some(path) => path.display().to_string(),
        None => "<in-memory>".to_string(),
    };

    vec![
        Field {
            key: "database.url",
            value: config.database.url.clone(),
            env_keys: &["WORKFLOW_DATABASE_URL"],
        },
        Field {
            key: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["WORKFLOW_DATABASE_MAX_CONNECTIONS"],
        },
        Field {
            key: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["WORKFLOW_DATABASE_TIMEOUT_SECS"],
        },
        Field {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["WORKFLOW_SERVER_BIND_ADDRESS"],
        },
        Field {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["WORKFLOW_SERVER_PORT"],
        },
        Field {
            key: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["WORKFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Field {
            key: "payments.max_fuel_cost_per_mile",
            value: config.payments.max_fuel_cost_per_mile.to_string(),
            env_keys: &["WORKFLOW_PAYMENTS_MAX_FUEL_COST_PER_MILE"],
        },
        Field {
            key: "session.store_path",
            value: session_store,
            env_keys: &["WORKFLOW_SESSION_STORE_PATH"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["WORKFLOW_LOGGING_LEVEL", "WORKFLOW_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format).to_ascii_lowercase(),
            env_keys: &["WORKFLOW_LOGGING_FORMAT", "WORKFLOW_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("workflow.toml"), PathBuf::from("config/workflow.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
