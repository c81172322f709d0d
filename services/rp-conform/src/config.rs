//! Configuration types for the conformance checker

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub telescope: TelescopeSettings,
    #[serde(default)]
    pub filter_wheel: FilterWheelSettings,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    /// Non-standard error numbers returned by specific drivers
    #[serde(default)]
    pub legacy_error_codes: Vec<LegacyErrorCodes>,
}

/// Kind of device under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Telescope,
    FilterWheel,
}

impl DeviceType {
    /// Path segment used in Alpaca URLs
    pub fn alpaca_name(&self) -> &'static str {
        match self {
            DeviceType::Telescope => "telescope",
            DeviceType::FilterWheel => "filterwheel",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Telescope => write!(f, "Telescope"),
            DeviceType::FilterWheel => write!(f, "FilterWheel"),
        }
    }
}

/// Which device to test and how to reach it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_device_type")]
    pub device_type: DeviceType,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_alpaca_port")]
    pub port: u16,
    #[serde(default)]
    pub device_number: u32,
    #[serde(default = "default_client_id")]
    pub client_id: u32,
    /// Test the in-process simulator instead of a network device
    #[serde(default)]
    pub simulate: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_type: default_device_type(),
            host: default_host(),
            port: default_alpaca_port(),
            device_number: 0,
            client_id: default_client_id(),
            simulate: false,
        }
    }
}

/// Settings shared by every tester
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Interval between polls of a status property while waiting
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,
    /// Wall-clock window of each performance measurement
    #[serde(with = "humantime_serde", default = "default_perf_loop_time")]
    pub perf_loop_time: Duration,
    #[serde(default)]
    pub performance_tests: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            perf_loop_time: default_perf_loop_time(),
            performance_tests: false,
        }
    }
}

/// Telescope test thresholds and switches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelescopeSettings {
    #[serde(default = "default_slew_tolerance")]
    pub slew_tolerance_arcsec: f64,
    #[serde(with = "humantime_serde", default = "default_maximum_slew_time")]
    pub maximum_slew_time: Duration,
    /// Slewing is polled for at least this long after an async slew starts
    #[serde(with = "humantime_serde", default = "default_slew_minimum_wait")]
    pub slew_minimum_wait: Duration,
    #[serde(default = "default_true")]
    pub first_use_tests: bool,
    #[serde(default = "default_true")]
    pub side_of_pier_tests: bool,
    #[serde(default = "default_true")]
    pub park_at_end: bool,
    #[serde(with = "humantime_serde", default = "default_move_axis_duration")]
    pub move_axis_duration: Duration,
    #[serde(with = "humantime_serde", default = "default_pulse_guide_duration")]
    pub pulse_guide_duration: Duration,
    #[serde(with = "humantime_serde", default = "default_pulse_guide_timeout")]
    pub pulse_guide_timeout: Duration,
    #[serde(default)]
    pub extended_rate_offset_tests: bool,
    #[serde(with = "humantime_serde", default = "default_rate_offset_duration")]
    pub rate_offset_duration: Duration,
    /// RightAscensionRate offset in RA seconds per sidereal second
    #[serde(default = "default_ra_rate_offset")]
    pub ra_rate_offset: f64,
    /// DeclinationRate offset in arc-seconds per SI second
    #[serde(default = "default_dec_rate_offset")]
    pub dec_rate_offset: f64,
    #[serde(default = "default_tolerance_pct")]
    pub rate_offset_tolerance_pct: f64,
    #[serde(default)]
    pub extended_pulse_guide_tests: bool,
    #[serde(with = "humantime_serde", default = "default_extended_pulse_guide_duration")]
    pub extended_pulse_guide_duration: Duration,
    #[serde(default = "default_tolerance_pct")]
    pub pulse_guide_tolerance_pct: f64,
    #[serde(default = "default_cross_axis_tolerance")]
    pub cross_axis_tolerance_arcsec: f64,
    /// Interface members that should not be exercised, e.g. "FindHome"
    #[serde(default)]
    pub skipped_tests: BTreeSet<String>,
}

impl TelescopeSettings {
    pub fn is_enabled(&self, member: &str) -> bool {
        !self.skipped_tests.contains(member)
    }
}

impl Default for TelescopeSettings {
    fn default() -> Self {
        Self {
            slew_tolerance_arcsec: default_slew_tolerance(),
            maximum_slew_time: default_maximum_slew_time(),
            slew_minimum_wait: default_slew_minimum_wait(),
            first_use_tests: true,
            side_of_pier_tests: true,
            park_at_end: true,
            move_axis_duration: default_move_axis_duration(),
            pulse_guide_duration: default_pulse_guide_duration(),
            pulse_guide_timeout: default_pulse_guide_timeout(),
            extended_rate_offset_tests: false,
            rate_offset_duration: default_rate_offset_duration(),
            ra_rate_offset: default_ra_rate_offset(),
            dec_rate_offset: default_dec_rate_offset(),
            rate_offset_tolerance_pct: default_tolerance_pct(),
            extended_pulse_guide_tests: false,
            extended_pulse_guide_duration: default_extended_pulse_guide_duration(),
            pulse_guide_tolerance_pct: default_tolerance_pct(),
            cross_axis_tolerance_arcsec: default_cross_axis_tolerance(),
            skipped_tests: BTreeSet::new(),
        }
    }
}

/// Filter wheel test thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterWheelSettings {
    #[serde(with = "humantime_serde", default = "default_filter_move_timeout")]
    pub move_timeout: Duration,
}

impl Default for FilterWheelSettings {
    fn default() -> Self {
        Self {
            move_timeout: default_filter_move_timeout(),
        }
    }
}

/// Devices served by `--simulate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_filter_names")]
    pub filter_names: Vec<String>,
    #[serde(default = "default_filter_offsets")]
    pub filter_offsets: Vec<i32>,
    #[serde(default = "default_site_latitude")]
    pub site_latitude: f64,
    #[serde(default = "default_site_longitude")]
    pub site_longitude: f64,
    #[serde(default = "default_site_elevation")]
    pub site_elevation: f64,
    /// How long a simulated slew keeps Slewing true
    #[serde(with = "humantime_serde", default = "default_simulated_slew_duration")]
    pub slew_duration: Duration,
    /// How long the simulated wheel reports position -1 after a move
    #[serde(with = "humantime_serde", default = "default_simulated_filter_move")]
    pub filter_move_duration: Duration,
    /// Report the physical pier side instead of the pointing state
    #[serde(default)]
    pub physical_pier_side: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            filter_names: default_filter_names(),
            filter_offsets: default_filter_offsets(),
            site_latitude: default_site_latitude(),
            site_longitude: default_site_longitude(),
            site_elevation: default_site_elevation(),
            slew_duration: default_simulated_slew_duration(),
            filter_move_duration: default_simulated_filter_move(),
            physical_pier_side: false,
        }
    }
}

/// Error numbers a particular driver uses in place of the standard ones.
///
/// `driver` is matched case-insensitively as a substring of the device's
/// `Name` or `DriverInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyErrorCodes {
    pub driver: String,
    #[serde(default)]
    pub not_implemented: Vec<i32>,
    #[serde(default)]
    pub invalid_value: Vec<i32>,
    #[serde(default)]
    pub value_not_set: Vec<i32>,
    #[serde(default)]
    pub invalid_operation: Vec<i32>,
}

fn default_device_type() -> DeviceType {
    DeviceType::Telescope
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_alpaca_port() -> u16 {
    11111
}

fn default_client_id() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_perf_loop_time() -> Duration {
    Duration::from_secs(5)
}

fn default_slew_tolerance() -> f64 {
    10.0
}

fn default_maximum_slew_time() -> Duration {
    Duration::from_secs(300)
}

fn default_slew_minimum_wait() -> Duration {
    Duration::from_secs(5)
}

fn default_move_axis_duration() -> Duration {
    Duration::from_secs(2)
}

fn default_pulse_guide_duration() -> Duration {
    Duration::from_secs(2)
}

fn default_pulse_guide_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_rate_offset_duration() -> Duration {
    Duration::from_secs(10)
}

fn default_ra_rate_offset() -> f64 {
    0.5
}

fn default_dec_rate_offset() -> f64 {
    5.0
}

fn default_tolerance_pct() -> f64 {
    5.0
}

fn default_extended_pulse_guide_duration() -> Duration {
    Duration::from_secs(5)
}

fn default_cross_axis_tolerance() -> f64 {
    10.0
}

fn default_filter_move_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_filter_names() -> Vec<String> {
    ["Red", "Green", "Blue", "Luminance", "H-Alpha"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_filter_offsets() -> Vec<i32> {
    vec![0, 10, 20, 30, 40]
}

fn default_site_latitude() -> f64 {
    51.07
}

fn default_site_longitude() -> f64 {
    -1.3
}

fn default_site_elevation() -> f64 {
    80.0
}

fn default_simulated_slew_duration() -> Duration {
    Duration::from_secs(2)
}

fn default_simulated_filter_move() -> Duration {
    Duration::from_millis(500)
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::ConformError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let config: Config = serde_json::from_str("{}").unwrap();

        assert_eq!(config.device.device_type, DeviceType::Telescope);
        assert_eq!(config.device.host, "localhost");
        assert_eq!(config.device.port, 11111);
        assert_eq!(config.general.poll_interval, Duration::from_millis(500));
        assert_eq!(config.general.perf_loop_time, Duration::from_secs(5));
        assert_eq!(config.telescope.slew_tolerance_arcsec, 10.0);
        assert_eq!(config.telescope.slew_minimum_wait, Duration::from_secs(5));
        assert!(config.telescope.first_use_tests);
        assert!(!config.telescope.extended_pulse_guide_tests);
        assert!(config.legacy_error_codes.is_empty());
    }

    #[test]
    fn parse_humantime_durations() {
        let json = r#"{
            "general": { "poll_interval": "50ms", "perf_loop_time": "2s" },
            "telescope": { "maximum_slew_time": "2m", "rate_offset_duration": "1s 500ms" }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.general.poll_interval, Duration::from_millis(50));
        assert_eq!(config.general.perf_loop_time, Duration::from_secs(2));
        assert_eq!(config.telescope.maximum_slew_time, Duration::from_secs(120));
        assert_eq!(
            config.telescope.rate_offset_duration,
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn parse_device_type_and_legacy_codes() {
        let json = r#"{
            "device": { "device_type": "filter_wheel", "port": 32323, "device_number": 2 },
            "legacy_error_codes": [
                {
                    "driver": "Gemini",
                    "invalid_value": [-2147221502],
                    "value_not_set": [-2147221501]
                }
            ]
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.device.device_type, DeviceType::FilterWheel);
        assert_eq!(config.device.port, 32323);
        assert_eq!(config.device.device_number, 2);
        assert_eq!(config.legacy_error_codes.len(), 1);
        assert_eq!(config.legacy_error_codes[0].driver, "Gemini");
        assert!(config.legacy_error_codes[0].not_implemented.is_empty());
    }

    #[test]
    fn skipped_tests_disable_members() {
        let json = r#"{ "telescope": { "skipped_tests": ["FindHome", "Park"] } }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert!(!config.telescope.is_enabled("FindHome"));
        assert!(!config.telescope.is_enabled("Park"));
        assert!(config.telescope.is_enabled("PulseGuide"));
    }

    #[test]
    fn load_config_missing_file() {
        let result = load_config(Path::new("/nonexistent/config.json"));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(
            &config_path,
            r#"{"device": {"device_type": "telescope", "simulate": true}}"#,
        )
        .unwrap();

        let config = load_config(&config_path).unwrap();
        assert!(config.device.simulate);
    }

    #[test]
    fn load_config_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, "not json").unwrap();

        assert!(load_config(&config_path).is_err());
    }
}
