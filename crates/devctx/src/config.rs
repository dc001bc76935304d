//! Context configuration management

use crate::backend::BackendMode;
use crate::backend::usb::WatcherOptions;
use crate::profile::DeviceProfile;
use crate::recovery::is_recovery_id;
use anyhow::{Context, Result, anyhow};
use common::LogFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevctxConfig {
    pub context: ContextSettings,
    /// Standard device profiles, matched in order
    #[serde(default = "DevctxConfig::default_profiles")]
    pub profiles: Vec<ProfileSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSettings {
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub mode: BackendMode,
    /// Recording file for record/playback modes (`~` is expanded)
    #[serde(default)]
    pub file_path: Option<String>,
    /// Recording section; defaults to "default"
    #[serde(default)]
    pub section: Option<String>,
    /// Re-enumeration period when hot-plug events are unavailable
    #[serde(default = "ContextSettings::default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Quiet time after a hot-plug event before re-enumerating
    #[serde(default = "ContextSettings::default_debounce")]
    pub debounce_ms: u64,
}

impl ContextSettings {
    fn default_poll_interval() -> u64 {
        1000
    }

    fn default_debounce() -> u64 {
        100
    }

    /// Recording file with `~` expanded
    pub fn file_path(&self) -> Option<PathBuf> {
        self.file_path.as_deref().map(expand_path)
    }

    pub fn watcher_options(&self) -> WatcherOptions {
        WatcherOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            debounce: Duration::from_millis(self.debounce_ms),
        }
    }
}

/// Device profile as written in the config file
///
/// # Example Configuration
/// ```toml
/// [[profiles]]
/// name = "depth-camera"
/// vendor_id = "0x8086"
/// product_ids = ["0x0AD3", "0x0B07"]
/// required_interfaces = [0]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSettings {
    pub name: String,
    #[serde(default)]
    pub vendor_id: Option<String>,
    pub product_ids: Vec<String>,
    #[serde(default)]
    pub required_interfaces: Vec<u8>,
}

impl ProfileSettings {
    fn from_profile(profile: &DeviceProfile) -> Self {
        Self {
            name: profile.name.clone(),
            vendor_id: profile.vendor_id.map(format_hex_id),
            product_ids: profile.product_ids.iter().map(|pid| format_hex_id(*pid)).collect(),
            required_interfaces: profile.required_interfaces.clone(),
        }
    }

    /// Parse into a [`DeviceProfile`]
    pub fn to_profile(&self) -> Result<DeviceProfile> {
        let vendor_id = self
            .vendor_id
            .as_deref()
            .map(|vid| parse_hex_id(vid, "VID"))
            .transpose()?;
        let product_ids = self
            .product_ids
            .iter()
            .map(|pid| parse_hex_id(pid, "PID"))
            .collect::<Result<Vec<_>>>()?;

        Ok(DeviceProfile {
            name: self.name.clone(),
            vendor_id,
            product_ids,
            required_interfaces: self.required_interfaces.clone(),
        })
    }
}

impl Default for DevctxConfig {
    fn default() -> Self {
        Self {
            context: ContextSettings {
                log_level: "info".to_string(),
                log_format: LogFormat::default(),
                mode: BackendMode::Live,
                file_path: None,
                section: None,
                poll_interval_ms: ContextSettings::default_poll_interval(),
                debounce_ms: ContextSettings::default_debounce(),
            },
            profiles: Self::default_profiles(),
        }
    }
}

impl DevctxConfig {
    fn default_profiles() -> Vec<ProfileSettings> {
        DeviceProfile::defaults()
            .iter()
            .map(ProfileSettings::from_profile)
            .collect()
    }

    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            // Try standard locations in order
            let candidates = vec![Self::default_path(), PathBuf::from("/etc/devctx/devctx.toml")];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found, using defaults"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: DevctxConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("devctx").join("devctx.toml")
        } else {
            PathBuf::from(".config/devctx/devctx.toml")
        }
    }

    /// Parsed device profiles
    pub fn device_profiles(&self) -> Result<Vec<DeviceProfile>> {
        self.profiles
            .iter()
            .map(|p| {
                p.to_profile()
                    .with_context(|| format!("Invalid profile '{}'", p.name))
            })
            .collect()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.context.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.context.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.context.mode != BackendMode::Live && self.context.file_path.is_none() {
            return Err(anyhow!(
                "Mode '{}' requires context.file_path",
                self.context.mode
            ));
        }

        for profile in self.device_profiles()? {
            if profile.product_ids.is_empty() {
                return Err(anyhow!("Profile '{}' has no product ids", profile.name));
            }
            if let Some(pid) = profile.product_ids.iter().find(|pid| is_recovery_id(**pid)) {
                return Err(anyhow!(
                    "Profile '{}' claims recovery product id {}",
                    profile.name,
                    format_hex_id(*pid)
                ));
            }
        }

        Ok(())
    }
}

/// Expand `~` in a user-supplied path
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Parse a hex id (VID or PID) such as `"0x0AD3"`
fn parse_hex_id(id: &str, name: &str) -> Result<u16> {
    let hex_part = id
        .strip_prefix("0x")
        .or_else(|| id.strip_prefix("0X"))
        .ok_or_else(|| {
            anyhow!(
                "Invalid {} '{}', must start with '0x' (e.g., '0x1234')",
                name,
                id
            )
        })?;

    if hex_part.is_empty() || hex_part.len() > 4 {
        return Err(anyhow!(
            "Invalid {} '{}', hex part must be 1-4 digits",
            name,
            id
        ));
    }

    u16::from_str_radix(hex_part, 16)
        .map_err(|_| anyhow!("Invalid {} '{}', not a valid hex number", name, id))
}

fn format_hex_id(id: u16) -> String {
    format!("0x{:04X}", id)
}
