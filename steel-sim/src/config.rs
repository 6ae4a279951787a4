use serde::Deserialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

const DEFAULT_CONFIG: &str = include_str!("../package-content/dynamic_sim.json5");

/// Where the binary looks for its configuration.
pub const CONFIG_PATH: &str = "config/dynamic_sim.json5";

/// Errors raised while loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("unable to access config file {}", path.display())]
    Io {
        /// The file that failed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
    /// The file is not valid JSON5 for this config.
    #[error("unable to parse config")]
    Parse(#[from] serde_json5::Error),
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Logging options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogConfig {
    /// Default filter directive, used when `RUST_LOG` is not set.
    pub level: String,
    /// Print the module path of each record.
    pub module_path: bool,
    /// Print a timestamp on each record.
    pub time: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            module_path: true,
            time: true,
        }
    }
}

/// Settings of the simulation driver.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimConfig {
    /// Edge length of the square grid of regions.
    pub regions: u32,
    /// Ticks to run before the binary exits.
    pub ticks: u64,
    /// Width of the window of due times executed in one pass.
    pub pulse_every: u64,
    /// Upper bound on updates executed in one tick.
    pub update_threshold: usize,
    /// Ticks between crop growth stages.
    pub crop_growth_delay: u64,
    /// Ticks between fire burn stages.
    pub fire_burn_delay: u64,
    /// Logging options.
    pub log: LogConfig,
}

impl SimConfig {
    /// Loads the config at `path`, writing the default there first if it is missing.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        let config_str = if path.exists() {
            fs::read_to_string(path).map_err(io_error)?
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(io_error)?;
            }
            fs::write(path, DEFAULT_CONFIG).map_err(io_error)?;
            log::info!("Wrote default config to {}", path.display());
            DEFAULT_CONFIG.to_string()
        };

        Self::from_json5(&config_str)
    }

    /// Parses and validates a config document.
    pub fn from_json5(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json5::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every value is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=8).contains(&self.regions) {
            return Err(ConfigError::Invalid("regions must be in range 1..=8"));
        }
        if self.pulse_every == 0 {
            return Err(ConfigError::Invalid("pulse_every must be at least 1"));
        }
        if self.update_threshold == 0 {
            return Err(ConfigError::Invalid("update_threshold must be at least 1"));
        }
        if self.crop_growth_delay == 0 || self.fire_burn_delay == 0 {
            return Err(ConfigError::Invalid("material delays must be at least 1"));
        }
        if self.log.level.is_empty() {
            return Err(ConfigError::Invalid("log level must not be empty"));
        }
        Ok(())
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            regions: 2,
            ticks: 400,
            pulse_every: 1,
            update_threshold: 10_000,
            crop_growth_delay: 20,
            fire_burn_delay: 8,
            log: LogConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{env, process};

    use super::*;

    #[test]
    fn test_default_file_matches_default() {
        let parsed = SimConfig::from_json5(DEFAULT_CONFIG).expect("default config should parse");
        assert_eq!(parsed, SimConfig::default());
    }

    #[test]
    fn test_validation_rejects_zero_pulse() {
        let config = SimConfig {
            pulse_every: 0,
            ..SimConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_parse_error_is_reported() {
        assert!(matches!(
            SimConfig::from_json5("{ regions: }"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_or_create_writes_default() {
        let dir = env::temp_dir().join(format!("steel-sim-config-{}", process::id()));
        let path = dir.join("dynamic_sim.json5");
        let _ = fs::remove_dir_all(&dir);

        let created = SimConfig::load_or_create(&path).expect("config should be created");
        assert!(path.exists());
        let loaded = SimConfig::load_or_create(&path).expect("config should load");
        assert_eq!(created, loaded);

        let _ = fs::remove_dir_all(&dir);
    }
}
