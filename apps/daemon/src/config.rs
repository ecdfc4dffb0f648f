//! Daemon configuration: optional TOML file, overridden by environment.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_DATA_DIR: &str = "./cardsync-data";
const DEFAULT_UI_LOCALE: &str = "en-US";

/// Shape of the TOML file named by `CARDSYNC_CONFIG`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub access_token: Option<String>,
    pub data_dir: Option<String>,
    pub ui_locale: Option<String>,
    pub notifications_enabled: Option<bool>,
    pub background_enabled: Option<bool>,
}

impl FileConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub api_url: String,
    pub access_token: Option<String>,
    pub data_dir: String,
    pub ui_locale: String,
    pub notifications_enabled: bool,
    pub background_enabled: bool,
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("{} must be a boolean, got '{}'", name, other),
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl DaemonConfig {
    /// Loads from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match lookup("CARDSYNC_CONFIG").and_then(non_empty) {
            Some(path) => FileConfig::from_path(Path::new(&path))?,
            None => FileConfig::default(),
        };
        let env = |name: &str| lookup(name).and_then(non_empty);

        let api_url = env("CARDSYNC_API_URL")
            .or(file.api_url)
            .and_then(non_empty)
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| anyhow!("CARDSYNC_API_URL not configured"))?;

        let notifications_enabled = match env("CARDSYNC_NOTIFICATIONS_ENABLED") {
            Some(value) => parse_bool("CARDSYNC_NOTIFICATIONS_ENABLED", &value)?,
            None => file.notifications_enabled.unwrap_or(true),
        };
        let background_enabled = match env("CARDSYNC_BACKGROUND_ENABLED") {
            Some(value) => parse_bool("CARDSYNC_BACKGROUND_ENABLED", &value)?,
            None => file.background_enabled.unwrap_or(false),
        };

        Ok(Self {
            api_url,
            access_token: env("CARDSYNC_ACCESS_TOKEN").or(file.access_token.and_then(non_empty)),
            data_dir: env("CARDSYNC_DATA_DIR")
                .or(file.data_dir)
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
            ui_locale: env("CARDSYNC_UI_LOCALE")
                .or(file.ui_locale)
                .unwrap_or_else(|| DEFAULT_UI_LOCALE.to_string()),
            notifications_enabled,
            background_enabled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn env_only_config_uses_defaults() {
        let config =
            DaemonConfig::from_lookup(lookup(&[("CARDSYNC_API_URL", " https://cards.test/api/ ")]))
                .unwrap();

        assert_eq!(config.api_url, "https://cards.test/api");
        assert_eq!(config.access_token, None);
        assert_eq!(config.data_dir, DEFAULT_DATA_DIR);
        assert_eq!(config.ui_locale, "en-US");
        assert!(config.notifications_enabled);
        assert!(!config.background_enabled);
    }

    #[test]
    fn missing_api_url_is_an_error() {
        let err = DaemonConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("CARDSYNC_API_URL"));
    }

    #[test]
    fn env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "api_url = \"https://file.test\"\nui_locale = \"de-DE\"\nbackground_enabled = true\naccess_token = \"from-file\""
        )
        .unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = DaemonConfig::from_lookup(lookup(&[
            ("CARDSYNC_CONFIG", path.as_str()),
            ("CARDSYNC_UI_LOCALE", "fr-FR"),
            ("CARDSYNC_NOTIFICATIONS_ENABLED", "no"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://file.test");
        assert_eq!(config.ui_locale, "fr-FR");
        assert_eq!(config.access_token.as_deref(), Some("from-file"));
        assert!(config.background_enabled);
        assert!(!config.notifications_enabled);
    }

    #[test]
    fn invalid_boolean_is_rejected() {
        let err = DaemonConfig::from_lookup(lookup(&[
            ("CARDSYNC_API_URL", "https://cards.test"),
            ("CARDSYNC_BACKGROUND_ENABLED", "maybe"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("CARDSYNC_BACKGROUND_ENABLED"));
    }
}
