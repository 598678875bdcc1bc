use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use botdesk_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE};
use secrecy::ExposeSecret;
use toml::Value;

const UNSET: &str = "<unset>";

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| -> String {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let telegram_token = redact_bot_token(config.telegram.bot_token.expose_secret());
    let admin_password =
        if config.admin.password.expose_secret().is_empty() { UNSET } else { "<redacted>" };
    let notifier_api_key = if config.notifier.api_key.is_some() { "<redacted>" } else { UNSET };

    let fields: Vec<(&str, String, Vec<&str>)> = vec![
        ("database.url", config.database.url.clone(), vec!["BOTDESK_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            vec!["BOTDESK_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            vec!["BOTDESK_DATABASE_TIMEOUT_SECS"],
        ),
        (
            "telegram.bot_token",
            telegram_token,
            vec!["BOTDESK_TELEGRAM_BOT_TOKEN", "TELEGRAM_BOT_TOKEN"],
        ),
        (
            "telegram.poll_timeout_secs",
            config.telegram.poll_timeout_secs.to_string(),
            vec!["BOTDESK_TELEGRAM_POLL_TIMEOUT_SECS"],
        ),
        (
            "telegram.api_base_url",
            config.telegram.api_base_url.clone(),
            vec!["BOTDESK_TELEGRAM_API_BASE_URL"],
        ),
        ("notifier.enabled", config.notifier.enabled.to_string(), vec!["BOTDESK_NOTIFIER_ENABLED"]),
        (
            "notifier.relay_url",
            config.notifier.relay_url.clone().unwrap_or_else(|| UNSET.to_string()),
            vec!["BOTDESK_NOTIFIER_RELAY_URL"],
        ),
        ("notifier.api_key", notifier_api_key.to_string(), vec!["BOTDESK_NOTIFIER_API_KEY"]),
        ("notifier.from", config.notifier.from.clone(), vec!["BOTDESK_NOTIFIER_FROM"]),
        (
            "notifier.to",
            config.notifier.to.clone().unwrap_or_else(|| UNSET.to_string()),
            vec!["BOTDESK_NOTIFIER_TO"],
        ),
        ("admin.username", config.admin.username.clone(), vec!["BOTDESK_ADMIN_USERNAME"]),
        ("admin.password", admin_password.to_string(), vec!["BOTDESK_ADMIN_PASSWORD"]),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            vec!["BOTDESK_SERVER_BIND_ADDRESS"],
        ),
        ("server.port", config.server.port.to_string(), vec!["BOTDESK_SERVER_PORT"]),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            vec!["BOTDESK_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            vec!["BOTDESK_LOGGING_LEVEL", "BOTDESK_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format),
            vec!["BOTDESK_LOGGING_FORMAT", "BOTDESK_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in &fields {
        lines.push(render_line(key, value, source(*key, env_keys.as_slice())));
    }
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config/botdesk.toml")]
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

/// Keeps the public bot id, hides the secret half.
fn redact_bot_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once(':') {
        Some((bot_id, _)) => format!("{bot_id}:***"),
        None => "<redacted>".to_string(),
    }
}
