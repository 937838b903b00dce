//! Configuration loading and management

use super::schema::Config;
use super::validate::validate_config;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Prefix of environment variables overriding config paths,
/// e.g. `AGH__PROTOCOL__MAX_TEXT_LEN=200`
pub const ENV_PREFIX: &str = "AGH__";

const CONFIG_FILE: &str = "config.json";

/// Configuration loader
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// Create a new config loader with the default config directory
    pub fn new() -> Self {
        let config_dir = dirs::home_dir()
            .map(|h| h.join(".agh"))
            .unwrap_or_else(|| PathBuf::from(".agh"));

        Self { config_dir }
    }

    /// Create a new config loader with a custom config directory
    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            config_dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Load configuration from file and environment
    pub fn load(&self) -> crate::Result<Config> {
        self.load_with(std::env::vars())
    }

    /// Load configuration, taking `AGH__` overrides from `vars`
    pub fn load_with<I>(&self, vars: I) -> crate::Result<Config>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config_path = self.config_path();
        let mut tree = serde_json::to_value(Config::default())?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let file: Value = serde_json::from_str(&content)
                .map_err(|e| crate::Error::Config(format!("{}: {}", config_path.display(), e)))?;
            overlay(&mut tree, file);
        }

        for (path, raw) in env_overrides(vars) {
            if !override_path(&mut tree, &path, parse_env_value(&raw)) {
                warn!("Ignoring {}{}: no such setting", ENV_PREFIX, path.join("__").to_uppercase());
            }
        }

        let config: Config = serde_json::from_value(tree)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &Config) -> crate::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(self.config_path(), content)?;
        Ok(())
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Lay `file` over the defaults; objects merge key by key, anything else replaces
fn overlay(tree: &mut Value, file: Value) {
    match (tree, file) {
        (Value::Object(defaults), Value::Object(entries)) => {
            for (key, value) in entries {
                match defaults.get_mut(&key) {
                    Some(slot) => overlay(slot, value),
                    None => {
                        defaults.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// `AGH__SECTION__KEY=value` pairs as lower-case setting paths
fn env_overrides<I>(vars: I) -> Vec<(Vec<String>, String)>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut overrides: Vec<_> = vars
        .into_iter()
        .filter_map(|(key, raw)| {
            let path: Vec<String> = key
                .strip_prefix(ENV_PREFIX)?
                .split("__")
                .filter(|s| !s.is_empty())
                .map(str::to_ascii_lowercase)
                .collect();
            (!path.is_empty()).then_some((path, raw))
        })
        .collect();
    overrides.sort();
    overrides
}

/// Every setting has a default, so an override may only replace an
/// existing leaf. Returns false when `path` names no setting.
fn override_path(tree: &mut Value, path: &[String], value: Value) -> bool {
    let mut current = tree;
    for segment in path {
        match current.get_mut(segment.as_str()) {
            Some(next) => current = next,
            None => return false,
        }
    }
    if current.is_object() {
        return false;
    }
    *current = value;
    true
}

/// Env values are JSON when they parse as such (numbers, lists, quoted
/// strings), booleans in any case, otherwise plain strings.
fn parse_env_value(raw: &str) -> Value {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return value;
    }
    match raw.to_ascii_lowercase().as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::sync::{Mutex, MutexGuard};
    use tempfile::TempDir;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    struct EnvVarGuard {
        key: String,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &str, value: &str) -> Self {
            let original = std::env::var(key).ok();
            // SAFETY: tests serialize env mutations with ENV_LOCK.
            unsafe { std::env::set_var(key, value) };
            Self {
                key: key.to_string(),
                original,
            }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.original {
                // SAFETY: tests serialize env mutations with ENV_LOCK.
                unsafe { std::env::set_var(&self.key, value) };
            } else {
                // SAFETY: tests serialize env mutations with ENV_LOCK.
                unsafe { std::env::remove_var(&self.key) };
            }
        }
    }

    fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[test]
    fn test_load_default_config() {
        let _lock = lock_env();
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        let config = loader.load().unwrap();

        assert_eq!(config.protocol.max_text_len, 120);
        assert_eq!(config.protocol.max_from_len, 64);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_save_and_load_config() {
        let _lock = lock_env();
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());

        let mut config = Config::default();
        config.heartbeat.enabled = true;
        config.heartbeat.interval_s = 5;
        config.channels.console.allow_from = vec!["stdin".to_string()];

        loader.save(&config).unwrap();
        assert!(loader.config_path().exists());
        let loaded = loader.load().unwrap();

        assert!(loaded.heartbeat.enabled);
        assert_eq!(loaded.heartbeat.interval_s, 5);
        assert_eq!(loaded.channels.console.allow_from, vec!["stdin"]);
    }

    #[test]
    fn test_load_applies_path_env_overrides() {
        let _lock = lock_env();
        let _len_guard = EnvVarGuard::set("AGH__PROTOCOL__MAX_TEXT_LEN", "200");
        let _hb_guard = EnvVarGuard::set("AGH__HEARTBEAT__ENABLED", "true");
        let _level_guard = EnvVarGuard::set("AGH__LOGGING__LEVEL", "debug");

        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        let config = loader.load().unwrap();

        assert_eq!(config.protocol.max_text_len, 200);
        assert!(config.heartbeat.enabled);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_path_env_overrides_file() {
        let _lock = lock_env();
        let _path_guard = EnvVarGuard::set("AGH__BUS__DRAIN_IDLE_ITERATIONS", "3");

        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        std::fs::write(
            loader.config_path(),
            r#"{"bus":{"drain_idle_iterations":50,"drain_idle_tick_ms":1}}"#,
        )
        .unwrap();

        let config = loader.load().unwrap();
        assert_eq!(config.bus.drain_idle_iterations, 3);
        assert_eq!(config.bus.drain_idle_tick_ms, 1);
    }

    #[test]
    fn test_validation_rejects_zero_drain() {
        let _lock = lock_env();
        let _guard = EnvVarGuard::set("AGH__BUS__DRAIN_IDLE_ITERATIONS", "0");

        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        let err = loader.load().unwrap_err();
        assert!(err.to_string().contains("drain_idle_iterations"));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let _lock = lock_env();
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        std::fs::write(loader.config_path(), "{ not json").unwrap();

        let err = loader.load().unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_unknown_override_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        let config = loader
            .load_with(vars(&[
                ("AGH__PROTOCOL__MAX_TXT_LEN", "5"),
                ("AGH__PROTOCOL", "7"),
                ("AGH__HEARTBEAT__INTERVAL_S", "60"),
            ]))
            .unwrap();

        assert_eq!(config.protocol.max_text_len, 120);
        assert_eq!(config.heartbeat.interval_s, 60);
    }

    #[test]
    fn test_list_and_case_insensitive_bool_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let loader = ConfigLoader::with_dir(temp_dir.path());
        let config = loader
            .load_with(vars(&[
                ("AGH__CHANNELS__CONSOLE__ALLOW_FROM", r#"["stdin","ops"]"#),
                ("AGH__HEARTBEAT__ENABLED", "TRUE"),
                ("OTHER__HEARTBEAT__ENABLED", "false"),
            ]))
            .unwrap();

        assert_eq!(config.channels.console.allow_from, vec!["stdin", "ops"]);
        assert!(config.heartbeat.enabled);
    }

    #[test]
    fn test_override_path_only_replaces_leaves() {
        let mut tree = serde_json::json!({"bus": {"drain_idle_iterations": 10}});
        let path = |p: &[&str]| p.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert!(override_path(&mut tree, &path(&["bus", "drain_idle_iterations"]), 4.into()));
        assert!(!override_path(&mut tree, &path(&["bus"]), 4.into()));
        assert!(!override_path(&mut tree, &path(&["bus", "missing"]), 4.into()));
        assert_eq!(tree, serde_json::json!({"bus": {"drain_idle_iterations": 4}}));
    }
}
