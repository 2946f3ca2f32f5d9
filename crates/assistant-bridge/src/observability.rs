//! Process-wide `tracing` subscriber setup.
//!
//! The library only emits events; binaries and demos call
//! [`init_observability`] to see them.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const ENABLED_KEYS: [&str; 2] = [
    "ASSISTANT_BRIDGE_OBSERVABILITY_ENABLED",
    "ASSISTANT_BRIDGE_OBSERVABILITY",
];
const LEVEL_KEY: &str = "ASSISTANT_BRIDGE_LOG_LEVEL";
const JSON_PATH_KEY: &str = "ASSISTANT_BRIDGE_JSON_LOG_PATH";
const DEFAULT_JSON_FILE: &str = "assistant-bridge.logs.jsonl";

#[derive(Debug, Clone, PartialEq, Eq)]
enum LogOutput {
    Console,
    JsonFile { dir: PathBuf, file_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Settings {
    enabled: bool,
    level: Option<String>,
    output: LogOutput,
}

impl Settings {
    fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = ENABLED_KEYS
            .iter()
            .find_map(|key| lookup(*key))
            .map(|value| parse_bool_env(&value).unwrap_or(true))
            .unwrap_or(true);
        let level = lookup(LEVEL_KEY).filter(|value| !value.trim().is_empty());
        let output = match lookup(JSON_PATH_KEY).filter(|value| !value.trim().is_empty()) {
            Some(raw) => {
                let path = PathBuf::from(raw);
                let dir = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."))
                    .to_path_buf();
                let file_name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or(DEFAULT_JSON_FILE)
                    .to_string();
                LogOutput::JsonFile { dir, file_name }
            }
            None => LogOutput::Console,
        };
        Self {
            enabled,
            level,
            output,
        }
    }

    fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        if let Some(level) = &self.level
            && let Ok(filter) = tracing_subscriber::EnvFilter::try_new(level)
        {
            return filter;
        }
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    }
}

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// Installs the global subscriber once per process.
///
/// Environment variables:
/// - `ASSISTANT_BRIDGE_OBSERVABILITY_ENABLED` / `ASSISTANT_BRIDGE_OBSERVABILITY`: enable flag (default on).
/// - `ASSISTANT_BRIDGE_LOG_LEVEL`: filter directive (`debug`, `assistant_bridge=trace`, ...).
/// - `RUST_LOG`: fallback filter when the above is unset or invalid. Default `info`.
/// - `ASSISTANT_BRIDGE_JSON_LOG_PATH`: write JSONL to this file instead of compact console output.
///
/// A subscriber installed earlier by the host application is left in place.
pub fn init_observability() {
    INIT.get_or_init(|| {
        let settings = Settings::resolve(|key| std::env::var(key).ok());
        if !settings.enabled {
            return;
        }

        let env_filter = settings.env_filter();
        match settings.output {
            LogOutput::JsonFile { dir, file_name } => {
                let _ = std::fs::create_dir_all(&dir);
                let writer = tracing_appender::rolling::never(dir, file_name);
                let json_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(false)
                    .with_writer(writer);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(json_layer)
                    .try_init();
            }
            LogOutput::Console => {
                let console_layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stdout);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(console_layer)
                    .try_init();
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(vars: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Settings::resolve(|key| vars.get(key).cloned())
    }

    #[test]
    fn parses_common_boolean_spellings() {
        assert_eq!(parse_bool_env(" Yes "), Some(true));
        assert_eq!(parse_bool_env("disabled"), Some(false));
        assert_eq!(parse_bool_env("maybe"), None);
    }

    #[test]
    fn defaults_to_enabled_console_output() {
        let settings = resolve(&[]);
        assert!(settings.enabled);
        assert_eq!(settings.level, None);
        assert_eq!(settings.output, LogOutput::Console);
    }

    #[test]
    fn explicit_flag_wins_and_garbage_keeps_default() {
        assert!(!resolve(&[("ASSISTANT_BRIDGE_OBSERVABILITY_ENABLED", "off")]).enabled);
        assert!(!resolve(&[("ASSISTANT_BRIDGE_OBSERVABILITY", "0")]).enabled);
        assert!(resolve(&[("ASSISTANT_BRIDGE_OBSERVABILITY", "sometimes")]).enabled);
    }

    #[test]
    fn json_path_splits_into_dir_and_file() {
        let settings = resolve(&[("ASSISTANT_BRIDGE_JSON_LOG_PATH", "logs/bridge.jsonl")]);
        assert_eq!(
            settings.output,
            LogOutput::JsonFile {
                dir: PathBuf::from("logs"),
                file_name: "bridge.jsonl".into()
            }
        );
        let bare = resolve(&[("ASSISTANT_BRIDGE_JSON_LOG_PATH", "bridge.jsonl")]);
        assert_eq!(
            bare.output,
            LogOutput::JsonFile {
                dir: PathBuf::from("."),
                file_name: "bridge.jsonl".into()
            }
        );
    }
}
