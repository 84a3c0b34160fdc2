//! Configuration file management for the EFIS inputs.
//!
//! Reads/writes `~/.efis-hud/config.yaml`: one section per data source,
//! plus the serial port, traffic timeout, and aircraft registry path.

use std::path::{Path, PathBuf};

use crate::targets::{IDENTITY_RETENTION, TARGET_TIMEOUT};
use crate::types::EfisError;

/// Full configuration structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub skyview: SkyviewConfig,
    pub skyview_adsb: SkyviewAdsbConfig,
    pub stratux: StratuxConfig,
    pub serial: SerialConfig,
    pub traffic: TrafficConfig,
    pub registry: RegistryConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkyviewConfig {
    pub udp_port: u16,
    pub use_ahrs: bool,
    pub playback_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkyviewAdsbConfig {
    pub udp_port: u16,
    pub playback_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StratuxConfig {
    pub udp_port: u16,
    pub use_ahrs: bool,
    pub playback_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SerialConfig {
    pub port: String,
    pub baudrate: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrafficConfig {
    pub timeout_secs: f64,
    /// Identities are kept this many timeouts after an address goes quiet.
    pub identity_retention: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
    pub path: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            skyview: SkyviewConfig {
                udp_port: 49155,
                use_ahrs: true,
                playback_file: None,
            },
            skyview_adsb: SkyviewAdsbConfig {
                udp_port: 4000,
                playback_file: None,
            },
            stratux: StratuxConfig {
                udp_port: 4000,
                use_ahrs: true,
                playback_file: None,
            },
            serial: SerialConfig {
                port: "/dev/ttyS0".into(),
                baudrate: 115200,
            },
            traffic: TrafficConfig {
                timeout_secs: TARGET_TIMEOUT,
                identity_retention: IDENTITY_RETENTION,
            },
            registry: RegistryConfig {
                path: "data/registry.db".into(),
            },
        }
    }
}

/// Get the config directory path (`~/.efis-hud/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".efis-hud")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `~/.efis-hud/config.yaml`.
///
/// Returns default config if file doesn't exist.
pub fn load_config() -> Config {
    load_config_from(&config_file())
}

/// Load config from an explicit path, falling back to defaults.
pub fn load_config_from(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_config(&text),
        Err(_) => Config::default(),
    }
}

/// Save config to `~/.efis-hud/config.yaml`.
pub fn save_config(config: &Config) -> Result<PathBuf, EfisError> {
    let path = config_file();
    save_config_to(config, &path)?;
    Ok(path)
}

/// Save config to an explicit path, creating parent directories.
pub fn save_config_to(config: &Config, path: &Path) -> Result<(), EfisError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| EfisError::Config(e.to_string()))?;
    }
    std::fs::write(path, serialize_config(config)).map_err(|e| EfisError::Config(e.to_string()))
}

/// Parse simple YAML-like config text. Unknown keys and bad values keep the
/// default.
pub fn parse_config(text: &str) -> Config {
    let mut config = Config::default();
    let mut current_section: Option<&str> = None;

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');
        let Some((key, val)) = stripped.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let val = val.trim();

        if !is_indented {
            current_section = val.is_empty().then_some(key);
            continue;
        }

        match (current_section, key) {
            (Some("skyview"), "udp_port") => set(&mut config.skyview.udp_port, val),
            (Some("skyview"), "use_ahrs") => set_bool(&mut config.skyview.use_ahrs, val),
            (Some("skyview"), "playback_file") => {
                config.skyview.playback_file = parse_string_value(val)
            }
            (Some("skyview_adsb"), "udp_port") => set(&mut config.skyview_adsb.udp_port, val),
            (Some("skyview_adsb"), "playback_file") => {
                config.skyview_adsb.playback_file = parse_string_value(val)
            }
            (Some("stratux"), "udp_port") => set(&mut config.stratux.udp_port, val),
            (Some("stratux"), "use_ahrs") => set_bool(&mut config.stratux.use_ahrs, val),
            (Some("stratux"), "playback_file") => {
                config.stratux.playback_file = parse_string_value(val)
            }
            (Some("serial"), "port") => {
                if let Some(v) = parse_string_value(val) {
                    config.serial.port = v;
                }
            }
            (Some("serial"), "baudrate") => set(&mut config.serial.baudrate, val),
            (Some("traffic"), "timeout_secs") => set(&mut config.traffic.timeout_secs, val),
            (Some("traffic"), "identity_retention") => {
                set(&mut config.traffic.identity_retention, val)
            }
            (Some("registry"), "path") => {
                if let Some(v) = parse_string_value(val) {
                    config.registry.path = v;
                }
            }
            _ => {}
        }
    }

    config
}

fn set<T: std::str::FromStr>(slot: &mut T, val: &str) {
    if let Ok(v) = val.parse() {
        *slot = v;
    }
}

fn set_bool(slot: &mut bool, val: &str) {
    match val.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => *slot = true,
        "false" | "no" | "off" => *slot = false,
        _ => {}
    }
}

fn parse_string_value(val: &str) -> Option<String> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    // Strip quotes
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return Some(val[1..val.len() - 1].to_string());
    }
    Some(val.to_string())
}

fn string_or_null(val: &Option<String>) -> String {
    match val {
        Some(v) => format!("\"{v}\""),
        None => "null".into(),
    }
}

/// Serialize config to YAML-like text.
pub fn serialize_config(config: &Config) -> String {
    let mut lines = vec!["# efis-hud configuration".to_string(), String::new()];

    lines.push("skyview:".into());
    lines.push(format!("  udp_port: {}", config.skyview.udp_port));
    lines.push(format!("  use_ahrs: {}", config.skyview.use_ahrs));
    lines.push(format!(
        "  playback_file: {}",
        string_or_null(&config.skyview.playback_file)
    ));
    lines.push(String::new());

    lines.push("skyview_adsb:".into());
    lines.push(format!("  udp_port: {}", config.skyview_adsb.udp_port));
    lines.push(format!(
        "  playback_file: {}",
        string_or_null(&config.skyview_adsb.playback_file)
    ));
    lines.push(String::new());

    lines.push("stratux:".into());
    lines.push(format!("  udp_port: {}", config.stratux.udp_port));
    lines.push(format!("  use_ahrs: {}", config.stratux.use_ahrs));
    lines.push(format!(
        "  playback_file: {}",
        string_or_null(&config.stratux.playback_file)
    ));
    lines.push(String::new());

    lines.push("serial:".into());
    lines.push(format!("  port: \"{}\"", config.serial.port));
    lines.push(format!("  baudrate: {}", config.serial.baudrate));
    lines.push(String::new());

    lines.push("traffic:".into());
    lines.push(format!("  timeout_secs: {:?}", config.traffic.timeout_secs));
    lines.push(format!(
        "  identity_retention: {:?}",
        config.traffic.identity_retention
    ));
    lines.push(String::new());

    lines.push("registry:".into());
    lines.push(format!("  path: \"{}\"", config.registry.path));

    lines.join("\n") + "\n"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
