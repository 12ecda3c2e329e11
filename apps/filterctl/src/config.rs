use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use shared::domain::plug_ids;

pub const DEFAULT_CONFIG_FILE: &str = "filterctl.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: String,
    pub catalog_url: Option<String>,
    pub catalog_api_key: Option<String>,
    /// Plug list used when no catalog url is configured.
    pub offline_plugs: Vec<String>,
    pub log_filter: String,
    pub ready_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/filters.db".into(),
            catalog_url: None,
            catalog_api_key: None,
            offline_plugs: [
                plug_ids::TYPE_1,
                plug_ids::TYPE_2,
                plug_ids::TYPE_3,
                plug_ids::CCS,
                plug_ids::SCHUKO,
                plug_ids::CHADEMO,
                plug_ids::SUPERCHARGER,
                plug_ids::CEE_BLAU,
                plug_ids::CEE_ROT,
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            log_filter: "warn".into(),
            ready_timeout_secs: 10,
        }
    }
}

impl Settings {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    database_url: Option<String>,
    catalog_url: Option<String>,
    catalog_api_key: Option<String>,
    offline_plugs: Option<Vec<String>>,
    log_filter: Option<String>,
    ready_timeout_secs: Option<u64>,
}

/// Defaults, overlaid by the config file if present, then by environment.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let file_cfg: FileSettings = toml::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        apply_file_settings(&mut settings, file_cfg);
    }

    apply_env(&mut settings, |name| std::env::var(name).ok());
    settings.database_url = normalize_database_url(&settings.database_url);
    Ok(settings)
}

fn apply_file_settings(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file_cfg.catalog_url {
        settings.catalog_url = Some(v);
    }
    if let Some(v) = file_cfg.catalog_api_key {
        settings.catalog_api_key = Some(v);
    }
    if let Some(v) = file_cfg.offline_plugs {
        settings.offline_plugs = v;
    }
    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
    if let Some(v) = file_cfg.ready_timeout_secs {
        settings.ready_timeout_secs = v;
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = var("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = var("CATALOG_URL") {
        settings.catalog_url = Some(v);
    }
    if let Some(v) = var("APP__CATALOG_URL") {
        settings.catalog_url = Some(v);
    }

    if let Some(v) = var("CATALOG_API_KEY") {
        settings.catalog_api_key = Some(v);
    }
    if let Some(v) = var("APP__CATALOG_API_KEY") {
        settings.catalog_api_key = Some(v);
    }

    if let Some(v) = var("APP__LOG_FILTER") {
        settings.log_filter = v;
    }

    if let Some(v) = var("APP__READY_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.ready_timeout_secs = parsed;
        }
    }
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn normalizes_plain_file_path_to_sqlite_url() {
        assert_eq!(
            normalize_database_url("./data/test.db"),
            "sqlite://./data/test.db"
        );
        assert_eq!(normalize_database_url("sqlite:x.db"), "sqlite://x.db");
        assert_eq!(normalize_database_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(normalize_database_url("  "), Settings::default().database_url);
    }

    #[test]
    fn file_settings_override_defaults() {
        let file_cfg: FileSettings = toml::from_str(
            r#"
            database_url = "sqlite://other.db"
            catalog_url = "https://api.example.org/ge"
            offline_plugs = ["CCS"]
            "#,
        )
        .expect("parse");
        let mut settings = Settings::default();
        apply_file_settings(&mut settings, file_cfg);

        assert_eq!(settings.database_url, "sqlite://other.db");
        assert_eq!(
            settings.catalog_url.as_deref(),
            Some("https://api.example.org/ge")
        );
        assert_eq!(settings.offline_plugs, vec!["CCS".to_string()]);
        assert_eq!(settings.log_filter, "warn");
    }

    #[test]
    fn prefixed_env_wins_over_plain_env() {
        let env = HashMap::from([
            ("DATABASE_URL", "sqlite://plain.db"),
            ("APP__DATABASE_URL", "sqlite://prefixed.db"),
            ("CATALOG_API_KEY", "k"),
            ("APP__READY_TIMEOUT_SECS", "not a number"),
        ]);
        let mut settings = Settings::default();
        apply_env(&mut settings, |name| env.get(name).map(|v| v.to_string()));

        assert_eq!(settings.database_url, "sqlite://prefixed.db");
        assert_eq!(settings.catalog_api_key.as_deref(), Some("k"));
        assert_eq!(settings.ready_timeout_secs, 10);
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let dir = std::env::temp_dir().join("filterctl-config-test-missing");
        let settings = load_settings(&dir.join(DEFAULT_CONFIG_FILE)).expect("load");
        assert_eq!(settings.offline_plugs.len(), 9);
    }
}
