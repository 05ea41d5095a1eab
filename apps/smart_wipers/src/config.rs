use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;
use vehicle_app::StartupTiming;

const DEFAULT_CONFIG_FILE: &str = "smart_wipers.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub plugin_name: String,
    pub wipers_on_delay_secs: u64,
    pub hood_open_delay_secs: u64,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            plugin_name: plugins::SMART_WIPERS_PLUGIN.into(),
            wipers_on_delay_secs: 3,
            hood_open_delay_secs: 6,
            log_filter: "debug".into(),
        }
    }
}

impl Settings {
    pub fn startup_timing(&self) -> StartupTiming {
        StartupTiming {
            wipers_on_delay: Duration::from_secs(self.wipers_on_delay_secs),
            hood_open_delay: Duration::from_secs(self.hood_open_delay_secs),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileSettings {
    plugin_name: Option<String>,
    wipers_on_delay_secs: Option<u64>,
    hood_open_delay_secs: Option<u64>,
    log_filter: Option<String>,
}

/// Defaults, then the TOML file, then `APP__*` environment variables.
///
/// Without an explicit `path` a missing `smart_wipers.toml` is fine; an
/// explicit path has to exist.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    if required || path.exists() {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid config file '{}'", path.display()))?;
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.plugin_name {
        settings.plugin_name = v;
    }
    if let Some(v) = file_cfg.wipers_on_delay_secs {
        settings.wipers_on_delay_secs = v;
    }
    if let Some(v) = file_cfg.hood_open_delay_secs {
        settings.hood_open_delay_secs = v;
    }
    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("APP__PLUGIN_NAME") {
        settings.plugin_name = v;
    }
    if let Some(v) = var("APP__WIPERS_ON_DELAY_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.wipers_on_delay_secs = parsed;
        }
    }
    if let Some(v) = var("APP__HOOD_OPEN_DELAY_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.hood_open_delay_secs = parsed;
        }
    }
    if let Some(v) = var("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    fn temp_dir(label: &str) -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let dir = env::temp_dir().join(format!("smart_wipers_{label}_{suffix}"));
        fs::create_dir_all(&dir).expect("temp dir");
        dir
    }

    #[test]
    fn defaults_match_the_startup_scenario() {
        let settings = Settings::default();
        assert_eq!(settings.plugin_name, "SmartWipersBasic");
        assert_eq!(settings.startup_timing(), StartupTiming::default());
        assert_eq!(settings.log_filter, "debug");
    }

    #[test]
    fn file_values_override_defaults() {
        let mut settings = Settings::default();
        apply_file(
            &mut settings,
            "plugin_name = \"Terminal\"\nhood_open_delay_secs = 1\n",
        )
        .expect("valid file");

        assert_eq!(settings.plugin_name, "Terminal");
        assert_eq!(settings.wipers_on_delay_secs, 3);
        assert_eq!(
            settings.startup_timing().hood_open_delay,
            Duration::from_secs(1)
        );
    }

    #[test]
    fn unknown_or_mistyped_file_keys_are_rejected() {
        let mut settings = Settings::default();
        assert!(apply_file(&mut settings, "wiper_delay = 2").is_err());
        assert!(apply_file(&mut settings, "wipers_on_delay_secs = \"soon\"").is_err());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn env_overrides_file_and_ignores_bad_numbers() {
        let env: HashMap<&str, &str> = [
            ("APP__PLUGIN_NAME", "Terminal"),
            ("APP__WIPERS_ON_DELAY_SECS", "later"),
            ("APP__HOOD_OPEN_DELAY_SECS", "12"),
            ("APP__LOG_FILTER", "info,databroker=trace"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        apply_file(&mut settings, "plugin_name = \"Other\"").expect("valid file");
        apply_env(&mut settings, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.plugin_name, "Terminal");
        assert_eq!(settings.wipers_on_delay_secs, 3);
        assert_eq!(settings.hood_open_delay_secs, 12);
        assert_eq!(settings.log_filter, "info,databroker=trace");
    }

    #[test]
    fn explicit_config_path_must_exist() {
        let dir = temp_dir("missing");
        let missing = dir.join("absent.toml");
        let err = load_settings(Some(missing.as_path())).expect_err("missing file");
        assert!(err.to_string().contains("failed to read config file"));
        fs::remove_dir_all(dir).expect("cleanup");
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = temp_dir("load");
        let path = dir.join("wipers.toml");
        fs::write(&path, "wipers_on_delay_secs = 0\nhood_open_delay_secs = 0\n").expect("write");

        let settings = load_settings(Some(path.as_path())).expect("load");
        assert_eq!(settings.startup_timing().wipers_on_delay, Duration::ZERO);
        assert_eq!(settings.startup_timing().hood_open_delay, Duration::ZERO);

        fs::remove_dir_all(dir).expect("cleanup");
    }
}
