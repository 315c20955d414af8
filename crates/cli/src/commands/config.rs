use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use docflow_core::config::{AppConfig, LoadOptions};
use toml::Value;

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
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, &field.value, source));
    }

    lines.join("\n")
}

struct EffectiveValue {
    key_path: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn effective_values(config: &AppConfig) -> Vec<EffectiveValue> {
    vec![
        EffectiveValue {
            key_path: "database.url",
            value: config.database.url.clone(),
            env_keys: &["DOCFLOW_DATABASE_URL"],
        },
        EffectiveValue {
            key_path: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["DOCFLOW_DATABASE_MAX_CONNECTIONS"],
        },
        EffectiveValue {
            key_path: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["DOCFLOW_DATABASE_TIMEOUT_SECS"],
        },
        EffectiveValue {
            key_path: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["DOCFLOW_SERVER_BIND_ADDRESS"],
        },
        EffectiveValue {
            key_path: "server.health_check_port",
            value: config.server.health_check_port.to_string(),
            env_keys: &["DOCFLOW_SERVER_HEALTH_CHECK_PORT"],
        },
        EffectiveValue {
            key_path: "server.graceful_shutdown_secs",
            value: config.server.graceful_shutdown_secs.to_string(),
            env_keys: &["DOCFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        EffectiveValue {
            key_path: "workflow.max_steps",
            value: config.workflow.max_steps.to_string(),
            env_keys: &["DOCFLOW_WORKFLOW_MAX_STEPS"],
        },
        EffectiveValue {
            key_path: "workflow.notify_participants",
            value: config.workflow.notify_participants.to_string(),
            env_keys: &["DOCFLOW_WORKFLOW_NOTIFY_PARTICIPANTS"],
        },
        EffectiveValue {
            key_path: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["DOCFLOW_LOGGING_LEVEL", "DOCFLOW_LOG_LEVEL"],
        },
        EffectiveValue {
            key_path: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["DOCFLOW_LOGGING_FORMAT", "DOCFLOW_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["docflow.toml", "config/docflow.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
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

#[cfg(test)]
mod tests {
    use std::path::Path;

    use toml::Value;

    use super::{contains_path, field_source};

    #[test]
    fn nested_keys_are_found_in_config_documents() {
        let doc: Value = "[workflow]\nmax_steps = 12\n".parse().expect("toml");

        assert!(contains_path(&doc, "workflow.max_steps"));
        assert!(!contains_path(&doc, "workflow.notify_participants"));
        assert!(!contains_path(&doc, "database.url"));
    }

    #[test]
    fn file_source_names_the_config_path() {
        let doc: Value = "[workflow]\nmax_steps = 12\n".parse().expect("toml");

        let source = field_source(
            "workflow.max_steps",
            &["DOCFLOW_TEST_NEVER_SET_MAX_STEPS"],
            Some(&doc),
            Some(Path::new("config/docflow.toml")),
        );
        assert_eq!(source, "file (config/docflow.toml)");

        let fallback =
            field_source("database.url", &["DOCFLOW_TEST_NEVER_SET_URL"], Some(&doc), None);
        assert_eq!(fallback, "default");
    }
}
