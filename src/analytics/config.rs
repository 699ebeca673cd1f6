use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use url::Url;

use crate::analytics::constants::{CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE_NAME};
use crate::analytics::error::{invalid_config, io_error, missing_setting, AnalyticsResult};

/// A single platform setting. Configuration documents only carry flat scalar values.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl SettingValue {
    fn type_label(&self) -> &'static str {
        match self {
            SettingValue::Bool(_) => "boolean",
            SettingValue::Integer(_) => "integer",
            SettingValue::Float(_) => "number",
            SettingValue::String(_) => "string",
        }
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::String(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::String(value)
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Integer(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Float(value)
    }
}

/// One platform's slice of the configuration document (API keys, intervals, flags).
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct PlatformSettings {
    values: BTreeMap<String, SettingValue>,
}

impl PlatformSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the string stored under `key`, failing when it is absent, blank or not a string.
    pub fn require_string(&self, platform: &str, key: &str) -> AnalyticsResult<&str> {
        match self.values.get(key) {
            Some(SettingValue::String(value)) if !value.trim().is_empty() => Ok(value),
            Some(SettingValue::String(_)) | None => Err(missing_setting(platform, key)),
            Some(other) => Err(wrong_type(platform, key, "string", other)),
        }
    }

    pub fn optional_string(&self, platform: &str, key: &str) -> AnalyticsResult<Option<&str>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(SettingValue::String(value)) => Ok(Some(value)),
            Some(other) => Err(wrong_type(platform, key, "string", other)),
        }
    }

    pub fn optional_bool(&self, platform: &str, key: &str) -> AnalyticsResult<Option<bool>> {
        match self.values.get(key) {
            None => Ok(None),
            Some(SettingValue::Bool(value)) => Ok(Some(*value)),
            Some(other) => Err(wrong_type(platform, key, "boolean", other)),
        }
    }

    /// Reads a non-negative number of seconds.
    pub fn optional_seconds(&self, platform: &str, key: &str) -> AnalyticsResult<Option<Duration>> {
        let seconds = match self.values.get(key) {
            None => return Ok(None),
            Some(SettingValue::Integer(value)) => *value as f64,
            Some(SettingValue::Float(value)) => *value,
            Some(other) => return Err(wrong_type(platform, key, "number", other)),
        };
        Duration::try_from_secs_f64(seconds).map(Some).map_err(|_| {
            invalid_config(format!(
                "{platform} setting `{key}` is not a usable number of seconds: {seconds}"
            ))
        })
    }

    /// Reads the `logLevel` setting, either a level name or a number from 0 (off) to 5 (trace).
    pub fn log_level(&self, platform: &str) -> AnalyticsResult<Option<LevelFilter>> {
        match self.values.get("logLevel") {
            None => Ok(None),
            Some(SettingValue::String(name)) => {
                LevelFilter::from_str(name).map(Some).map_err(|_| {
                    invalid_config(format!("{platform} has an unknown logLevel `{name}`"))
                })
            }
            Some(SettingValue::Integer(level)) => {
                let filter = match level {
                    0 => LevelFilter::Off,
                    1 => LevelFilter::Error,
                    2 => LevelFilter::Warn,
                    3 => LevelFilter::Info,
                    4 => LevelFilter::Debug,
                    5 => LevelFilter::Trace,
                    other => {
                        return Err(invalid_config(format!(
                            "{platform} logLevel {other} is outside 0..=5"
                        )))
                    }
                };
                Ok(Some(filter))
            }
            Some(other) => Err(wrong_type(platform, "logLevel", "string or integer", other)),
        }
    }

    /// Reads the `endpoint` override, falling back to `default` and validating the URL.
    pub fn endpoint(&self, platform: &str, default: &str) -> AnalyticsResult<String> {
        let raw = self
            .optional_string(platform, "endpoint")?
            .unwrap_or(default);
        Url::parse(raw).map_err(|err| {
            invalid_config(format!("{platform} endpoint `{raw}` is not a valid URL: {err}"))
        })?;
        Ok(raw.trim_end_matches('/').to_string())
    }
}

fn wrong_type(
    platform: &str,
    key: &str,
    expected: &str,
    found: &SettingValue,
) -> crate::analytics::error::AnalyticsError {
    invalid_config(format!(
        "{platform} setting `{key}` must be a {expected}, found a {}",
        found.type_label()
    ))
}

/// Platform configuration: type-name to settings, in declaration order.
///
/// The order in which platforms appear in the document is the order in which they are built,
/// started and receive every tracking call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlatformConfig {
    entries: Vec<(String, PlatformSettings)>,
}

impl PlatformConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a platform, replacing the settings of an existing entry with the same name
    /// without moving it.
    pub fn with_platform(mut self, name: impl Into<String>, settings: PlatformSettings) -> Self {
        let name = name.into();
        let existing = self.entries.iter_mut().find(|(key, _)| *key == name);
        match existing {
            Some(entry) => entry.1 = settings,
            None => self.entries.push((name, settings)),
        }
        self
    }

    pub fn from_json_str(input: &str) -> AnalyticsResult<Self> {
        serde_json::from_str(input)
            .map_err(|err| invalid_config(format!("invalid analytics configuration: {err}")))
    }

    pub fn from_path(path: &Path) -> AnalyticsResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|err| {
            io_error(format!(
                "failed to read analytics configuration {}: {err}",
                path.display()
            ))
        })?;
        Self::from_json_str(&contents)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PlatformSettings)> {
        self.entries
            .iter()
            .map(|(name, settings)| (name.as_str(), settings))
    }

    pub fn settings(&self, name: &str) -> Option<&PlatformSettings> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, settings)| settings)
    }

    pub fn platform_names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'de> Deserialize<'de> for PlatformConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ConfigVisitor;

        impl<'de> Visitor<'de> for ConfigVisitor {
            type Value = PlatformConfig;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of platform names to platform settings")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries: Vec<(String, PlatformSettings)> = Vec::new();
                while let Some((name, settings)) = map.next_entry::<String, PlatformSettings>()? {
                    if entries.iter().any(|(existing, _)| *existing == name) {
                        return Err(de::Error::custom(format!("duplicate platform `{name}`")));
                    }
                    entries.push((name, settings));
                }
                Ok(PlatformConfig { entries })
            }
        }

        deserializer.deserialize_map(ConfigVisitor)
    }
}

/// Where the dispatcher loads its [`PlatformConfig`] from on every start.
pub trait ConfigSource: Send {
    fn load(&self) -> AnalyticsResult<PlatformConfig>;
}

impl<F> ConfigSource for F
where
    F: Fn() -> AnalyticsResult<PlatformConfig> + Send,
{
    fn load(&self) -> AnalyticsResult<PlatformConfig> {
        self()
    }
}

/// Reads a JSON configuration document from disk.
#[derive(Clone, Debug)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Uses `ANALYTICS_PLATFORM_CONFIG` when set, otherwise `AnalyticsPlatformConfig.json`
    /// inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::new(path),
            None => Self::new(dir.as_ref().join(DEFAULT_CONFIG_FILE_NAME)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigSource {
    fn default() -> Self {
        Self::in_dir(".")
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> AnalyticsResult<PlatformConfig> {
        log::debug!("loading analytics configuration from {}", self.path.display());
        PlatformConfig::from_path(&self.path)
    }
}

/// Serves a configuration built in code.
#[derive(Clone, Debug)]
pub struct StaticConfigSource {
    config: PlatformConfig,
}

impl StaticConfigSource {
    pub fn new(config: PlatformConfig) -> Self {
        Self { config }
    }
}

impl ConfigSource for StaticConfigSource {
    fn load(&self) -> AnalyticsResult<PlatformConfig> {
        Ok(self.config.clone())
    }
}
