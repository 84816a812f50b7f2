use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::output::network_config::{NetworkConfig, OutputInterface};
use crate::output::sacn::{MAX_PRIORITY, MAX_UNIVERSE};
use crate::Settings;

/// Configuration manager for Prism settings
/// Provides a layered configuration system that separates schema, available options, and persisted
/// values. Configuration is stored in config.json in the working directory by default
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

/// Available configuration options with validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub render: RenderConfigSchema,
    pub output: OutputConfigSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfigSchema {
    pub tick_rate_hz: ConfigOption<f64>,
    pub show_file: ConfigOption<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfigSchema {
    pub sacn_enabled: ConfigOption<bool>,
    pub sacn_priority: ConfigOption<u8>,
    pub sacn_source_name: ConfigOption<String>,
    pub sacn_interface: ConfigOption<String>,
}

/// Configuration option with validation and available choices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption<T> {
    pub default: T,
    pub valid_range: Option<(T, T)>,
    pub valid_choices: Option<Vec<T>>,
    pub description: String,
    pub requires_restart: bool,
}

/// Persisted configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: Settings,
    pub created_at: String,
    pub modified_at: String,
}

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
    #[error("Failed to parse config file: {0}")]
    ParseError(String),
    #[error("Failed to serialize config: {0}")]
    SerializeError(String),
    #[error("Config validation errors: {}", .0.join(", "))]
    ValidationError(Vec<String>),
}

fn index_of(config: &mut NetworkConfig, address: Ipv4Addr) -> usize {
    match config.interfaces.iter().position(|i| i.address == address) {
        Some(idx) => idx,
        None => config.add_interface(OutputInterface::new(&address.to_string(), address)),
    }
}

impl ConfigManager {
    /// Create a new configuration manager
    /// If no path is provided, defaults to 'config.json' in the current working directory
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(|| PathBuf::from("config.json"));

        Self {
            config_path,
            settings: Settings::default(),
        }
    }

    /// Load settings from configuration file
    /// Writes and returns the defaults if the file doesn't exist yet
    pub fn load(&mut self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            log::info!(
                "No config at {}, writing defaults",
                self.config_path.display()
            );
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        // Validate version compatibility
        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Config file version {} doesn't match application version {}. Using defaults for new settings.",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        Self::validate_settings(&config_file.settings).map_err(ConfigError::ValidationError)?;

        self.settings = config_file.settings;
        Ok(self.settings.clone())
    }

    /// Save current settings to configuration file
    pub fn save(&self) -> Result<(), ConfigError> {
        // Ensure config directory exists (if config is in a subdirectory)
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
            }
        }

        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
            modified_at: chrono::Utc::now().to_rfc3339(),
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(&self.config_path, content)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Update settings and save to file
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        Self::validate_settings(&settings).map_err(ConfigError::ValidationError)?;
        self.settings = settings;
        self.save()
    }

    /// Get current settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get configuration schema with available options
    pub fn schema() -> ConfigSchema {
        ConfigSchema {
            render: RenderConfigSchema {
                tick_rate_hz: ConfigOption {
                    default: 40.0,
                    valid_range: Some((1.0, 120.0)),
                    valid_choices: None,
                    description: "Render and sACN refresh rate in ticks per second".to_string(),
                    requires_restart: false,
                },
                show_file: ConfigOption {
                    default: String::new(),
                    valid_range: None,
                    valid_choices: None,
                    description: "Show file loaded at startup".to_string(),
                    requires_restart: true,
                },
            },
            output: OutputConfigSchema {
                sacn_enabled: ConfigOption {
                    default: true,
                    valid_range: None,
                    valid_choices: None,
                    description: "Enable DMX output via sACN (E1.31)".to_string(),
                    requires_restart: true,
                },
                sacn_priority: ConfigOption {
                    default: 100,
                    valid_range: Some((0, MAX_PRIORITY)),
                    valid_choices: None,
                    description: "sACN source priority".to_string(),
                    requires_restart: false,
                },
                sacn_source_name: ConfigOption {
                    default: "Prism".to_string(),
                    valid_range: None,
                    valid_choices: None,
                    description: "Source name shown by sACN receivers (max 63 bytes)".to_string(),
                    requires_restart: true,
                },
                sacn_interface: ConfigOption {
                    default: "None".to_string(),
                    valid_range: None,
                    valid_choices: None, // Will be populated from system enumeration
                    description: "IPv4 address of the interface to send sACN from".to_string(),
                    requires_restart: false,
                },
            },
        }
    }

    /// False for NaN as well as for rates outside the schema range
    pub fn tick_rate_in_range(tick_rate: f64) -> bool {
        Self::schema()
            .render
            .tick_rate_hz
            .valid_range
            .map_or(tick_rate.is_finite() && tick_rate > 0.0, |(min, max)| {
                tick_rate >= min && tick_rate <= max
            })
    }

    /// Validate settings against schema
    pub fn validate_settings(settings: &Settings) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let schema = Self::schema();

        // Validate render settings
        if !Self::tick_rate_in_range(settings.tick_rate_hz) {
            if let Some((min, max)) = schema.render.tick_rate_hz.valid_range {
                errors.push(format!("tick_rate_hz must be between {} and {}", min, max));
            }
        }

        // Validate output settings
        if let Some((min, max)) = schema.output.sacn_priority.valid_range {
            if settings.sacn_priority < min || settings.sacn_priority > max {
                errors.push(format!("sacn_priority must be between {} and {}", min, max));
            }
        }

        if settings.sacn_source_name.len() > 63 {
            errors.push("sacn_source_name must be at most 63 bytes".to_string());
        }

        if let Some(interface) = &settings.sacn_interface {
            if interface.parse::<Ipv4Addr>().is_err() {
                errors.push(format!("sacn_interface {} is not an IPv4 address", interface));
            }
        }

        for (universe, interface) in &settings.universe_interfaces {
            if *universe == 0 || *universe > MAX_UNIVERSE {
                errors.push(format!(
                    "universe {} must be between 1 and {}",
                    universe, MAX_UNIVERSE
                ));
            }
            if interface.parse::<Ipv4Addr>().is_err() {
                errors.push(format!(
                    "interface {} for universe {} is not an IPv4 address",
                    interface, universe
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Build the sACN interface setup described by the settings
    pub fn network_config(settings: &Settings) -> Result<NetworkConfig, ConfigError> {
        Self::validate_settings(settings).map_err(ConfigError::ValidationError)?;

        let mut config = NetworkConfig::default();
        if !settings.sacn_enabled {
            return Ok(config);
        }

        let parse = |address: &str| {
            address
                .parse::<Ipv4Addr>()
                .map_err(|e| ConfigError::ParseError(format!("{}: {}", address, e)))
        };
        if let Some(interface) = &settings.sacn_interface {
            let idx = index_of(&mut config, parse(interface)?);
            config.set_default_interface(Some(idx));
        }

        let mut routes: Vec<_> = settings.universe_interfaces.iter().collect();
        routes.sort();
        for (universe, interface) in routes {
            let idx = index_of(&mut config, parse(interface)?);
            config.route_universe(*universe, idx);
        }

        Ok(config)
    }

    /// Reset settings to defaults
    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.settings = Settings::default();
        self.save()
    }
}
