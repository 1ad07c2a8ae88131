use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use toml::Value;
use tracing::{info, warn};

use crate::error::{RecoveryError, RecoveryResult};
use crate::policy::{compute_interval, seconds_to_ticks, to_health_units, UNIT_MAX};

const DEFAULT_DURATION_SECS: i64 = 60;
const DEFAULT_DELAY_SECS: i64 = 10;
const DEFAULT_MIN_HEALTH_PERCENT: i64 = 0;
const DEFAULT_MAX_HEALTH_PERCENT: i64 = 100;

/// Settings as written by the operator. Every value is read leniently so a
/// typo degrades to the default instead of disabling recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<Value>,
    #[serde(default, alias = "heal")]
    pub recover: RecoverSection,
    #[serde(flatten)]
    pub unknown: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RecoverSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_health: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_health: Option<Value>,
    #[serde(flatten)]
    pub unknown: BTreeMap<String, Value>,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        Self {
            debug: Some(Value::Boolean(false)),
            recover: RecoverSection::default(),
            unknown: BTreeMap::new(),
        }
    }
}

impl Default for RecoverSection {
    fn default() -> Self {
        Self {
            duration: Some(Value::Integer(DEFAULT_DURATION_SECS)),
            delay: Some(Value::Integer(DEFAULT_DELAY_SECS)),
            min_health: Some(Value::Integer(DEFAULT_MIN_HEALTH_PERCENT)),
            max_health: Some(Value::Integer(DEFAULT_MAX_HEALTH_PERCENT)),
            unknown: BTreeMap::new(),
        }
    }
}

impl RecoverySettings {
    pub fn from_path(path: &Path) -> RecoveryResult<Self> {
        let data = fs::read_to_string(path).map_err(|source| RecoveryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&data)
    }

    pub fn from_toml_str(data: &str) -> RecoveryResult<Self> {
        Ok(toml::from_str(data)?)
    }

    /// Loads the settings at `path`, writing the defaults there first if the
    /// file does not exist yet.
    pub fn load_or_init(path: &Path) -> RecoveryResult<Self> {
        if path.exists() {
            return Self::from_path(path);
        }

        let settings = Self::default();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| RecoveryError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, settings.to_toml_string()?).map_err(|source| RecoveryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(target: "recovery.config", path = %path.display(), "wrote default settings");
        Ok(settings)
    }

    pub fn to_toml_string(&self) -> RecoveryResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Whether diagnostics were requested, read without collecting warnings.
    pub fn debug_enabled(&self) -> bool {
        bool_setting(&mut Vec::new(), "debug", self.debug.as_ref(), false)
    }

    /// Turns the raw settings into the derived configuration the engine runs
    /// on, collecting a warning for every value that had to be replaced.
    pub fn resolve(&self) -> ResolvedConfig {
        let mut warnings = Vec::new();

        for key in self.unknown.keys() {
            warnings.push(ConfigWarning::new(key, "unknown setting, ignored"));
        }
        for key in self.recover.unknown.keys() {
            warnings.push(ConfigWarning::new(
                format!("recover.{key}"),
                "unknown setting, ignored",
            ));
        }

        let debug = bool_setting(&mut warnings, "debug", self.debug.as_ref(), false);
        let section = &self.recover;
        let duration = int_setting(
            &mut warnings,
            "recover.duration",
            section.duration.as_ref(),
            DEFAULT_DURATION_SECS,
        );
        let delay = int_setting(
            &mut warnings,
            "recover.delay",
            section.delay.as_ref(),
            DEFAULT_DELAY_SECS,
        );
        let min_percent = int_setting(
            &mut warnings,
            "recover.min-health",
            section.min_health.as_ref(),
            DEFAULT_MIN_HEALTH_PERCENT,
        );
        let max_percent = int_setting(
            &mut warnings,
            "recover.max-health",
            section.max_health.as_ref(),
            DEFAULT_MAX_HEALTH_PERCENT,
        );

        let min_health = to_health_units(min_percent);
        let max_health = to_health_units(max_percent);
        if min_health > max_health {
            warnings.push(ConfigWarning::new(
                "recover.min-health",
                format!("minimum ({min_health} units) exceeds maximum ({max_health} units), lowered to the maximum"),
            ));
        }

        let config = RecoveryConfig::new(
            min_health,
            max_health,
            seconds_to_ticks(duration.max(1)),
            seconds_to_ticks(delay),
        )
        .with_debug(debug);

        for warning in &warnings {
            warn!(target: "recovery.config", key = %warning.key, "{}", warning.message);
        }

        ResolvedConfig { config, warnings }
    }
}

fn int_setting(
    warnings: &mut Vec<ConfigWarning>,
    key: &str,
    value: Option<&Value>,
    default: i64,
) -> i64 {
    let parsed = match value {
        None => return default,
        Some(Value::Integer(v)) => Some(*v),
        Some(Value::Float(v)) if v.is_finite() => Some(v.trunc() as i64),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v.trunc() as i64))
        }
        Some(_) => None,
    };

    parsed.unwrap_or_else(|| {
        warnings.push(ConfigWarning::new(
            key,
            format!("not a number, using default {default}"),
        ));
        default
    })
}

fn bool_setting(
    warnings: &mut Vec<ConfigWarning>,
    key: &str,
    value: Option<&Value>,
    default: bool,
) -> bool {
    let parsed = match value {
        None => return default,
        Some(Value::Boolean(v)) => Some(*v),
        Some(Value::Integer(v)) => Some(*v != 0),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" => Some(true),
            "false" | "no" | "off" => Some(false),
            _ => None,
        },
        Some(_) => None,
    };

    parsed.unwrap_or_else(|| {
        warnings.push(ConfigWarning::new(
            key,
            format!("not a boolean, using default {default}"),
        ));
        default
    })
}

/// A setting that was replaced or ignored while resolving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub key: String,
    pub message: String,
}

impl ConfigWarning {
    fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub config: RecoveryConfig,
    pub warnings: Vec<ConfigWarning>,
}

/// Validated configuration for one enable cycle. Health values are in units,
/// durations in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    pub min_health: u32,
    pub max_health: u32,
    pub duration_ticks: u64,
    pub delay_ticks: u64,
    pub interval_ticks: u64,
    pub debug: bool,
}

impl RecoveryConfig {
    /// Builds a config from unit bounds and tick durations, clamping anything
    /// out of range.
    pub fn new(min_health: u32, max_health: u32, duration_ticks: u64, delay_ticks: u64) -> Self {
        let max_health = max_health.clamp(1, UNIT_MAX);
        let min_health = min_health.clamp(1, max_health);
        let duration_ticks = duration_ticks.max(1);
        Self {
            min_health,
            max_health,
            duration_ticks,
            delay_ticks,
            interval_ticks: compute_interval(duration_ticks, max_health),
            debug: false,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        RecoverySettings::default().resolve().config
    }
}
