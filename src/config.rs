//! Engine configuration using Figment
//!
//! Configuration is loaded from:
//! 1. a TOML file (base configuration)
//! 2. environment variables (prefixed with `PROTOCOL_ENGINE_`)
//!
//! # Environment Variable Overrides
//!
//! ```text
//! PROTOCOL_ENGINE_ROBOT_TYPE=OT-3 Standard
//! PROTOCOL_ENGINE_USE_VIRTUAL_GRIPPER=true
//! PROTOCOL_ENGINE_IGNORE_PAUSE=true
//! ```
//!
//! # Example
//!
//! ```no_run
//! use protocol_engine::config::EngineConfig;
//!
//! let config = EngineConfig::load_from("engine.toml")?;
//! println!("Robot: {:?}", config.robot_type);
//! # Ok::<(), protocol_engine::config::ConfigError>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration load error: {0}")]
    LoadError(#[from] Box<figment::Error>),
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
    #[error("Configuration write error: {0}")]
    WriteError(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::LoadError(Box::new(err))
    }
}

/// Robot model the engine drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RobotType {
    /// OT-2: pipettes only, no gripper
    #[serde(rename = "OT-2 Standard")]
    Ot2,
    /// OT-3 (Flex): pipettes and an extension-mount gripper
    #[serde(rename = "OT-3 Standard")]
    Ot3,
}

/// Deck layout installed on the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeckType {
    #[serde(rename = "ot2_standard")]
    Ot2Standard,
    #[serde(rename = "ot2_short_trash")]
    Ot2ShortTrash,
    #[serde(rename = "ot3_standard")]
    Ot3Standard,
}

impl DeckType {
    /// Identifier used in deck and module definitions.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ot2Standard => "ot2_standard",
            Self::Ot2ShortTrash => "ot2_short_trash",
            Self::Ot3Standard => "ot3_standard",
        }
    }

    /// Robot type this deck belongs to.
    pub fn robot_type(&self) -> RobotType {
        match self {
            Self::Ot2Standard | Self::Ot2ShortTrash => RobotType::Ot2,
            Self::Ot3Standard => RobotType::Ot3,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Robot model
    pub robot_type: RobotType,
    /// Installed deck
    pub deck_type: DeckType,
    /// Simulate pipette motion instead of driving hardware
    #[serde(default)]
    pub use_virtual_pipettes: bool,
    /// Simulate gripper motion instead of driving hardware
    #[serde(default)]
    pub use_virtual_gripper: bool,
    /// Track module commands in state without driving module hardware
    #[serde(default)]
    pub use_virtual_modules: bool,
    /// Do not pause the queue on WaitForResume or manual labware moves
    #[serde(default)]
    pub ignore_pause: bool,
    /// Pause the run when the robot door opens
    #[serde(default = "default_block_on_door_open")]
    pub block_on_door_open: bool,
}

fn default_block_on_door_open() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            robot_type: RobotType::Ot2,
            deck_type: DeckType::Ot2Standard,
            use_virtual_pipettes: false,
            use_virtual_gripper: false,
            use_virtual_modules: false,
            ignore_pause: false,
            block_on_door_open: default_block_on_door_open(),
        }
    }
}

impl EngineConfig {
    /// Fully simulated configuration for the given robot.
    pub fn simulated(robot_type: RobotType) -> Self {
        let deck_type = match robot_type {
            RobotType::Ot2 => DeckType::Ot2Standard,
            RobotType::Ot3 => DeckType::Ot3Standard,
        };
        Self {
            robot_type,
            deck_type,
            use_virtual_pipettes: true,
            use_virtual_gripper: true,
            use_virtual_modules: true,
            ignore_pause: false,
            block_on_door_open: false,
        }
    }

    /// Load configuration from a TOML file with environment overrides.
    ///
    /// Defaults fill in any key the file and environment leave out.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("PROTOCOL_ENGINE_"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Write this configuration as TOML.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let text =
            toml::to_string_pretty(self).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        std::fs::write(path.as_ref(), text).map_err(|e| ConfigError::WriteError(e.to_string()))
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.deck_type.robot_type() != self.robot_type {
            return Err(ConfigError::ValidationError(format!(
                "Deck type {} cannot be used on robot type {:?}",
                self.deck_type.as_str(),
                self.robot_type
            )));
        }
        if self.robot_type == RobotType::Ot2 && !self.use_virtual_gripper {
            tracing::debug!("OT-2 has no gripper; gripper moves will fail unless virtual");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_load_from_toml_applies_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "engine.toml",
                r#"
                robot_type = "OT-3 Standard"
                deck_type = "ot3_standard"
                use_virtual_gripper = true
                "#,
            )?;

            let config = EngineConfig::load_from("engine.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.robot_type, RobotType::Ot3);
            assert!(config.use_virtual_gripper);
            assert!(!config.use_virtual_pipettes);
            assert!(config.block_on_door_open);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("engine.toml", "ignore_pause = false\n")?;
            jail.set_env("PROTOCOL_ENGINE_IGNORE_PAUSE", "true");

            let config = EngineConfig::load_from("engine.toml").map_err(|e| e.to_string())?;
            assert!(config.ignore_pause);
            assert_eq!(config.robot_type, RobotType::Ot2);
            Ok(())
        });
    }

    #[test]
    fn test_mismatched_deck_rejected() {
        let config = EngineConfig {
            robot_type: RobotType::Ot2,
            deck_type: DeckType::Ot3Standard,
            ..EngineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_save_and_reload() {
        Jail::expect_with(|jail| {
            let path = jail.directory().join("saved.toml");
            let config = EngineConfig::simulated(RobotType::Ot3);

            config.save_to(&path).map_err(|e| e.to_string())?;
            let loaded = EngineConfig::load_from(&path).map_err(|e| e.to_string())?;
            assert_eq!(loaded, config);
            Ok(())
        });
    }
}
