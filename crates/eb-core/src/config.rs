//! Bridge configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Smallest ring the reservation logic is sized for.
pub const MIN_RING_SLOTS: usize = 16;

/// Tunables for the GS bridge.
///
/// Loaded from TOML; every field has a default so partial files are fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GsConfig {
    /// Ring capacity in 128-bit slots. Must be a power of two.
    pub ring_slots: usize,
    /// Maximum vsync commands allowed in flight before the producer stalls.
    pub queued_frame_limit: u32,
    /// Busy-spin iterations before a stalled producer falls back to a
    /// timed condvar wait.
    pub spin_limit: u32,
    /// Wake the render thread once this many payload qwords accumulate.
    pub wake_qword_threshold: usize,
    /// Wake the render thread once this many commands accumulate.
    pub wake_command_threshold: u32,
}

impl Default for GsConfig {
    fn default() -> Self {
        Self {
            ring_slots: 0x4000,
            queued_frame_limit: 8,
            spin_limit: 1500,
            wake_qword_threshold: 256,
            wake_command_threshold: 16,
        }
    }
}

impl GsConfig {
    /// Check the invariants the ring construction relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.ring_slots.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "ring_slots must be a power of two, got {}",
                self.ring_slots
            )));
        }
        if self.ring_slots < MIN_RING_SLOTS {
            return Err(ConfigError::Invalid(format!(
                "ring_slots must be at least {MIN_RING_SLOTS}, got {}",
                self.ring_slots
            )));
        }
        if self.queued_frame_limit == 0 {
            return Err(ConfigError::Invalid(
                "queued_frame_limit must be non-zero".into(),
            ));
        }
        if self.wake_command_threshold == 0 || self.wake_qword_threshold == 0 {
            return Err(ConfigError::Invalid(
                "wake thresholds must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as TOML.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Default location of the config file under the platform config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("emotion-bridge").join("gs.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(GsConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        let config = GsConfig {
            ring_slots: 100,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_tiny_ring() {
        let config = GsConfig {
            ring_slots: 8,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gs.toml");

        let config = GsConfig {
            ring_slots: 1024,
            queued_frame_limit: 4,
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = GsConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: GsConfig = toml::from_str("ring_slots = 64\n").unwrap();
        assert_eq!(config.ring_slots, 64);
        assert_eq!(config.queued_frame_limit, 8);
    }
}
