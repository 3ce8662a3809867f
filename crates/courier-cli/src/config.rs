use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use courier_resolver::ResolverConfig;

/// Name of the configuration file searched for
pub const CONFIG_FILE: &str = "courier.toml";

/// The courier configuration file structure (courier.toml)
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    /// Resolver settings, same keys as the JSON configuration
    pub resolver: ResolverConfig,
}

impl CourierConfig {
    /// Load configuration from courier.toml, searching upward from the given directory
    pub fn load(start_dir: &Path) -> Result<Option<Self>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE);

            if config_path.exists() {
                let content = std::fs::read_to_string(&config_path)
                    .with_context(|| format!("Failed to read {}", config_path.display()))?;
                let config: CourierConfig = toml::from_str(&content)
                    .with_context(|| format!("Failed to parse {}", config_path.display()))?;
                config.resolver.validate()?;
                log::debug!("Loaded configuration from {}", config_path.display());
                return Ok(Some(config));
            }

            if !current.pop() {
                return Ok(None);
            }
        }
    }

    /// Load configuration by searching upward from the current working directory
    pub fn load_from_cwd() -> Result<Option<Self>> {
        let cwd = std::env::current_dir()?;
        Self::load(&cwd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_semver::Stability;
    use tempfile::TempDir;

    #[test]
    fn test_parse_empty_config() {
        let config: CourierConfig = toml::from_str("").unwrap();
        assert_eq!(config.resolver, ResolverConfig::default());
    }

    #[test]
    fn test_parse_resolver_table() {
        let toml = r#"
[resolver]
minimum-stability = "beta"
prefer-lowest = true
max-steps = 500
default-vendor = "wpackagist-plugin"

[resolver.platform]
php = "8.1.0"
ext-intl = "false"
"#;
        let config: CourierConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.resolver.minimum_stability().unwrap(), Stability::Beta);
        assert!(config.resolver.prefer_lowest);
        assert_eq!(config.resolver.max_steps, 500);
        assert_eq!(config.resolver.default_vendor.as_deref(), Some("wpackagist-plugin"));
        assert_eq!(config.resolver.platform.get("php").map(String::as_str), Some("8.1.0"));
    }

    #[test]
    fn test_load_searches_upward() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[resolver]\nprefer-stable = false\n").unwrap();
        let nested = dir.path().join("wp-content").join("plugins");
        std::fs::create_dir_all(&nested).unwrap();

        let config = CourierConfig::load(&nested).unwrap().unwrap();
        assert!(!config.resolver.prefer_stable);
    }

    #[test]
    fn test_load_without_file() {
        let dir = TempDir::new().unwrap();
        // The temp dir's ancestors are not expected to carry a courier.toml
        assert!(CourierConfig::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_rejects_unknown_stability() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[resolver]\nminimum-stability = \"nightly\"\n").unwrap();
        assert!(CourierConfig::load(dir.path()).is_err());
    }
}
