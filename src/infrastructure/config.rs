use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

const APP_JSON: &str = "app.json";
const DEFAULT_TIMEZONE: &str = "UTC";
const DEFAULT_CALENDAR_NAME: &str = "Activities";
const DEFAULT_CALENDAR_COLOR: &str = "#2563EB";
const DEFAULT_EVENT_DURATION_MINUTES: i64 = 60;
const DEFAULT_POLL_INTERVAL_MS: u64 = 4000;
const DEFAULT_NAVIGATION_DELAY_MS: u64 = 50;
const DEFAULT_ROUTE_PREFIX: &str = "/activity";

/// On-disk shape of `app.json`. Missing keys fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfigFile {
    pub schema: u8,
    pub timezone: String,
    pub calendar_name: String,
    pub calendar_color: Option<String>,
    pub default_event_duration_minutes: i64,
    pub poll_interval_ms: u64,
    pub navigation_delay_ms: u64,
    pub activity_route_prefix: String,
}

impl Default for AppConfigFile {
    fn default() -> Self {
        Self {
            schema: 1,
            timezone: DEFAULT_TIMEZONE.to_string(),
            calendar_name: DEFAULT_CALENDAR_NAME.to_string(),
            calendar_color: Some(DEFAULT_CALENDAR_COLOR.to_string()),
            default_event_duration_minutes: DEFAULT_EVENT_DURATION_MINUTES,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            navigation_delay_ms: DEFAULT_NAVIGATION_DELAY_MS,
            activity_route_prefix: DEFAULT_ROUTE_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub timezone: Tz,
    pub calendar_name: String,
    pub calendar_color: Option<String>,
    pub default_event_duration: chrono::Duration,
    pub poll_interval: Duration,
    pub navigation_delay: Duration,
    pub activity_route_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            calendar_name: DEFAULT_CALENDAR_NAME.to_string(),
            calendar_color: Some(DEFAULT_CALENDAR_COLOR.to_string()),
            default_event_duration: chrono::Duration::minutes(DEFAULT_EVENT_DURATION_MINUTES),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            navigation_delay: Duration::from_millis(DEFAULT_NAVIGATION_DELAY_MS),
            activity_route_prefix: DEFAULT_ROUTE_PREFIX.to_string(),
        }
    }
}

impl TryFrom<AppConfigFile> for EngineConfig {
    type Error = InfraError;

    fn try_from(file: AppConfigFile) -> Result<Self, Self::Error> {
        let timezone_name = file.timezone.trim();
        let timezone = if timezone_name.is_empty() {
            Tz::UTC
        } else {
            timezone_name.parse::<Tz>().map_err(|error| {
                InfraError::InvalidConfig(format!("invalid timezone '{timezone_name}': {error}"))
            })?
        };

        let calendar_name = file.calendar_name.trim();
        if file.default_event_duration_minutes <= 0 {
            return Err(InfraError::InvalidConfig(
                "defaultEventDurationMinutes must be positive".to_string(),
            ));
        }
        if file.poll_interval_ms == 0 {
            return Err(InfraError::InvalidConfig(
                "pollIntervalMs must be positive".to_string(),
            ));
        }

        Ok(Self {
            timezone,
            calendar_name: if calendar_name.is_empty() {
                DEFAULT_CALENDAR_NAME.to_string()
            } else {
                calendar_name.to_string()
            },
            calendar_color: file
                .calendar_color
                .map(|color| color.trim().to_string())
                .filter(|color| !color.is_empty()),
            default_event_duration: chrono::Duration::minutes(file.default_event_duration_minutes),
            poll_interval: Duration::from_millis(file.poll_interval_ms),
            navigation_delay: Duration::from_millis(file.navigation_delay_ms),
            activity_route_prefix: file.activity_route_prefix,
        })
    }
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&AppConfigFile::default())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfigFile, InfraError> {
    let value = read_config(&config_dir.join(APP_JSON))?;
    Ok(serde_json::from_value(value)?)
}

pub fn load_engine_config(config_dir: &Path) -> Result<EngineConfig, InfraError> {
    EngineConfig::try_from(load_app_config(config_dir)?)
}
