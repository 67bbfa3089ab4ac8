pub mod schema;

pub use schema::{
    CacheConfig, CompatibleProviderConfig, Config, GatewayConfig, PipelineConfig, ProviderConfig,
    ProvidersConfig,
};

use crate::error::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Default config location: `<platform config dir>/panelforge/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("io", "panelforge", "panelforge")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Config {
    /// Load from an explicit path, or from the default location. A missing
    /// file is not an error: the engine runs fine on env-var credentials
    /// and built-in pipelines.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path(),
        };

        let Some(config_path) = resolved else {
            tracing::warn!("no config directory available, using defaults");
            return Ok(Self::default());
        };

        if !config_path.exists() {
            if path.is_some() {
                return Err(ConfigError::Load(format!(
                    "config file not found: {}",
                    config_path.display()
                )));
            }
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            return Ok(Self {
                config_path,
                ..Self::default()
            });
        }

        Self::load(&config_path)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: Self =
            toml::from_str(&raw).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.config_path = path.to_path_buf();
        config.validate()?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Structural checks that do not need the registries: id uniqueness
    /// and value ranges. Reference validation (provider/filter ids) happens
    /// at pipeline registration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "cache.ttl_secs must be positive".into(),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Validation(
                "cache.max_entries must be positive".into(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for pipeline in &self.pipelines {
            if !seen.insert(pipeline.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate pipeline id: {}",
                    pipeline.id
                )));
            }
            if let Some(t) = pipeline.temperature {
                if !(0.0..=2.0).contains(&t) {
                    return Err(ConfigError::Validation(format!(
                        "pipeline {} temperature {t} outside [0, 2]",
                        pipeline.id
                    )));
                }
            }
        }
        Ok(())
    }
}
