use crate::domain::models::{DeviceAddress, SensorDescriptor};
use crate::infrastructure::bluetooth::protocol::{SensorFamilyKind, BROADCAST_COMPANY_ID};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_true(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "ble_sensor_gateway".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_sensors")]
    pub sensors: Vec<SensorDescriptor>,
    #[serde(default)]
    pub sensor_family: SensorFamilyKind,

    // Timing
    #[serde(default = "default_scan_period_ms")]
    pub scan_period_ms: u64,
    #[serde(default = "default_read_period_ms")]
    pub read_period_ms: u64,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    // Broadcast sensors
    #[serde(default = "default_company_id")]
    pub broadcast_company_id: u16,

    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sensors: default_sensors(),
            sensor_family: SensorFamilyKind::default(),
            scan_period_ms: default_scan_period_ms(),
            read_period_ms: default_read_period_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            broadcast_company_id: default_company_id(),
            log_settings: LogSettings::default(),
        }
    }
}

impl Settings {
    pub fn scan_period(&self) -> Duration {
        Duration::from_millis(self.scan_period_ms)
    }

    pub fn read_period(&self) -> Duration {
        Duration::from_millis(self.read_period_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn default_sensors() -> Vec<SensorDescriptor> {
    vec![SensorDescriptor::new(
        "ST-2",
        DeviceAddress::new([0x24, 0x71, 0x89, 0x08, 0xBD, 0x82]),
    )]
}
fn default_scan_period_ms() -> u64 {
    10_000
}
fn default_read_period_ms() -> u64 {
    60_000
}
fn default_settle_delay_ms() -> u64 {
    1_000
}
fn default_company_id() -> u16 {
    BROADCAST_COMPANY_ID
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::from_path(settings_path))
    }

    /// Load from an explicit file, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn from_path(settings_path: PathBuf) -> Self {
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!(
                    "Using default settings ({}): {}",
                    settings_path.display(),
                    e
                );
                Settings::default()
            }
        };

        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("BleSensorGateway");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    /// Write the current settings out when no file exists yet, so a first
    /// run leaves an editable file behind. Returns `true` if a file was written.
    pub fn save_if_missing(&self) -> anyhow::Result<bool> {
        if self.settings_path.exists() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "ble_sensor_gateway_{}_{}",
            name,
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir.join("settings.json")
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.scan_period(), Duration::from_secs(10));
        assert_eq!(settings.read_period(), Duration::from_secs(60));
        assert_eq!(settings.settle_delay(), Duration::from_secs(1));
        assert_eq!(settings.broadcast_company_id, 0x0059);
        assert_eq!(settings.sensor_family, SensorFamilyKind::HumidityTemperature);
        assert_eq!(settings.sensors.len(), 1);
        assert_eq!(settings.sensors[0].name, "ST-2");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let json = r#"{
            "sensors": [{ "name": "ST-1", "address": "24:71:89:c1:44:02" }],
            "sensor_family": "optical"
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.sensors[0].address.to_string(), "24:71:89:C1:44:02");
        assert_eq!(settings.sensor_family, SensorFamilyKind::Optical);
        assert_eq!(settings.scan_period_ms, 10_000);
        assert_eq!(settings.log_settings.level, "info");
    }

    #[test]
    fn test_missing_file_is_written_once() {
        let path = scratch_path("first_run");
        let _ = fs::remove_file(&path);

        let service = SettingsService::from_path(path.clone());
        assert_eq!(service.get().sensors.len(), 1);
        assert!(service.save_if_missing().unwrap());
        assert!(!service.save_if_missing().unwrap());

        let reloaded = SettingsService::from_path(path.clone());
        assert_eq!(reloaded.get().sensors, service.get().sensors);
        assert_eq!(reloaded.get().read_period_ms, 60_000);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_edited_file_is_not_overwritten() {
        let path = scratch_path("edited");
        fs::write(
            &path,
            r#"{ "sensors": [{ "name": "ST-1", "address": "24:71:89:C1:44:02" }] }"#,
        )
        .unwrap();

        let service = SettingsService::from_path(path.clone());
        assert!(!service.save_if_missing().unwrap());
        assert_eq!(service.get().sensors[0].name, "ST-1");

        let _ = fs::remove_file(&path);
    }
}
