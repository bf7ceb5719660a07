// SimWire - UART-over-TCP Bridge for Simulated Cores
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use simwire_core::timing;
use std::path::Path;

/// Default TCP port for the command channel (the console listens one
/// above it in the dual-channel setup).
pub const DEFAULT_PORT: u16 = 8845;

fn default_command_port() -> u16 {
    DEFAULT_PORT
}

fn default_char_ticks() -> u32 {
    timing::DEFAULT_CHAR_TICKS
}

fn default_buffer_capacity() -> usize {
    256
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("character time must be at least one tick")]
    ZeroCharTicks,
    #[error("buffer capacity must be non-zero")]
    ZeroCapacity,
    #[error("command and console ports must differ (both {0})")]
    PortClash(u16),
    #[error("clock_hz and baud must both be given, and non-zero")]
    BadRate,
}

/// Bridge configuration, loadable from YAML. Every field has a default,
/// so an empty file (or no file at all) yields the reference setup:
/// ports 8845/8846, 732-tick character time, 256-byte buffers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// TCP port for the command channel.
    #[serde(default = "default_command_port")]
    pub command_port: u16,

    /// TCP port for the console channel; defaults to `command_port + 1`.
    #[serde(default)]
    pub console_port: Option<u16>,

    /// Ticks per character; overridden when `clock_hz` and `baud` are both
    /// given.
    #[serde(default = "default_char_ticks")]
    pub char_ticks: u32,

    /// Simulated clock frequency, for deriving the character time.
    #[serde(default)]
    pub clock_hz: Option<u64>,

    /// Modeled line rate, for deriving the character time.
    #[serde(default)]
    pub baud: Option<u64>,

    /// Capacity of the read-ahead queue and the transmit assembly buffers.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Mirror flushed output to stdout.
    #[serde(default)]
    pub echo_stdout: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command_port: default_command_port(),
            console_port: None,
            char_ticks: default_char_ticks(),
            clock_hz: None,
            baud: None,
            buffer_capacity: default_buffer_capacity(),
            echo_stdout: false,
        }
    }
}

impl BridgeConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read bridge config {:?}", path))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse bridge config {:?}", path))?;
        config
            .validate()
            .with_context(|| format!("Invalid bridge config {:?}", path))?;
        Ok(config)
    }

    /// Console-channel port: explicit, or one above the command port.
    pub fn console_port(&self) -> u16 {
        self.console_port
            .unwrap_or_else(|| self.command_port.wrapping_add(1))
    }

    /// Character time in ticks: derived from `clock_hz`/`baud` when both
    /// are set, otherwise `char_ticks` as given.
    pub fn effective_char_ticks(&self) -> u32 {
        match (self.clock_hz, self.baud) {
            (Some(clock_hz), Some(baud)) if baud > 0 => timing::ticks_for(clock_hz, baud),
            _ => self.char_ticks,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        match (self.clock_hz, self.baud) {
            (None, None) => {
                if self.char_ticks == 0 {
                    return Err(ConfigError::ZeroCharTicks);
                }
            }
            (Some(clock_hz), Some(baud)) => {
                if clock_hz == 0 || baud == 0 {
                    return Err(ConfigError::BadRate);
                }
            }
            _ => return Err(ConfigError::BadRate),
        }
        if self.buffer_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        // Port 0 means "ephemeral" and never clashes.
        if self.command_port != 0 && self.command_port == self.console_port() {
            return Err(ConfigError::PortClash(self.command_port));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_setup() {
        let config: BridgeConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.command_port, 8845);
        assert_eq!(config.console_port(), 8846);
        assert_eq!(config.effective_char_ticks(), 732);
        assert_eq!(config.buffer_capacity, 256);
        assert!(!config.echo_stdout);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rate_overrides_char_ticks() {
        let yaml = "clock_hz: 100000000\nbaud: 115200\n";
        let config: BridgeConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_char_ticks(), 8681);
    }

    #[test]
    fn test_rate_requires_both_fields() {
        let config: BridgeConfig = serde_yaml::from_str("baud: 115200\n").unwrap();
        assert_eq!(config.validate(), Err(ConfigError::BadRate));
    }

    #[test]
    fn test_port_clash_rejected() {
        let yaml = "command_port: 9000\nconsole_port: 9000\n";
        let config: BridgeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.validate(), Err(ConfigError::PortClash(9000)));
    }

    #[test]
    fn test_zero_char_ticks_rejected() {
        let config: BridgeConfig = serde_yaml::from_str("char_ticks: 0\n").unwrap();
        assert_eq!(config.validate(), Err(ConfigError::ZeroCharTicks));
    }

    #[test]
    fn test_yaml_round_trip() {
        let mut config = BridgeConfig::default();
        config.command_port = 9100;
        config.echo_stdout = true;
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: BridgeConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.command_port, 9100);
        assert!(back.echo_stdout);
        assert_eq!(back.effective_char_ticks(), config.effective_char_ticks());
    }
}
