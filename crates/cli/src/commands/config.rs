use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tally_core::config::{AppConfig, LoadOptions};
use toml::Value;

use crate::commands::CommandResult;

pub fn run(options: LoadOptions) -> CommandResult {
    let explicit_path = options.config_path.clone();
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            );
        }
    };

    let config_file_path = detect_config_path(explicit_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value) in effective_values(&config) {
        let env_key = format!("TALLY_{}", key.replace('.', "_").to_ascii_uppercase());
        let source =
            field_source(key, &env_key, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }

    CommandResult::success("config", lines.join("\n"))
}

/// Every reported key with its display value. Secrets never leave this function in clear.
fn effective_values(config: &AppConfig) -> Vec<(&'static str, String)> {
    let api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    vec![
        ("database.url", config.database.url.clone()),
        ("database.max_connections", config.database.max_connections.to_string()),
        ("database.timeout_secs", config.database.timeout_secs.to_string()),
        ("llm.provider", config.llm.provider.as_str().to_string()),
        ("llm.model", config.llm.model.clone()),
        ("llm.base_url", config.llm_base_url().unwrap_or_else(|| "<unset>".to_string())),
        ("llm.api_key", api_key.to_string()),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string()),
        ("llm.max_retries", config.llm.max_retries.to_string()),
        ("agent.max_steps", config.agent.max_steps.to_string()),
        ("agent.max_tool_calls", config.agent.max_tool_calls.to_string()),
        ("agent.tool_timeout_secs", config.agent.tool_timeout_secs.to_string()),
        ("agent.allow_mutations", config.agent.allow_mutations.to_string()),
        ("server.bind_address", config.server.bind_address.clone()),
        ("server.port", config.server.port.to_string()),
        ("server.graceful_shutdown_secs", config.server.graceful_shutdown_secs.to_string()),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", config.logging.format.as_str().to_string()),
    ]
}

fn detect_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then_some(path);
    }

    [PathBuf::from("tally.toml"), PathBuf::from("config/tally.toml")]
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
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
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
