use std::{fs, path::Path};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment, Provider,
};

use crate::{config::WiringConfig, errors::ConfigError};

/// Prefix of the environment variables overriding the config files.
///
/// `WRAPP_PROFILES` and `WRAPP_FLAGS` take comma or whitespace separated lists,
/// `WRAPP_STRICT` takes `1`, `true`, `yes` or their negations.
pub const ENV_PREFIX: &str = "WRAPP_";

/// Builds a [`WiringConfig`] from layered sources.
///
/// Layers are applied in call order, later layers win:
/// built-in defaults, then config files, then environment variable overrides.
/// Lists and switches are replaced by later layers, property maps are merged key by key.
#[derive(Debug, Clone)]
pub struct ConfigProvider {
    figment: Figment,
}

impl Default for ConfigProvider {
    fn default() -> Self {
        Self::initialize()
    }
}

impl ConfigProvider {
    /// Initializes a provider holding only the built-in defaults
    pub fn initialize() -> Self {
        Self {
            figment: Figment::from(Serialized::defaults(WiringConfig::default())),
        }
    }

    /// Layer a TOML config file on top of the current values
    pub fn load_file(&mut self, path: &Path) -> Result<&mut Self, ConfigError> {
        fs::metadata(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        self.merge_layer(Toml::file(path), &path.display().to_string())
    }

    /// Layer a TOML document on top of the current values.
    ///
    /// `origin` is only used in error messages.
    pub fn load_str(&mut self, source: &str, origin: &str) -> Result<&mut Self, ConfigError> {
        self.merge_layer(Toml::string(source), origin)
    }

    /// Apply the `WRAPP_*` process environment variables
    pub fn apply_env_overrides(&mut self) -> Result<&mut Self, ConfigError> {
        self.merge_layer(env_overrides(), "environment")
    }

    /// The config all layers merged so far describe
    pub fn extract(&self) -> Result<WiringConfig, ConfigError> {
        Ok(self.figment.extract()?)
    }

    /// Rejects a broken layer right away, leaving the earlier layers in place
    fn merge_layer<P: Provider>(&mut self, layer: P, origin: &str) -> Result<&mut Self, ConfigError> {
        let staged = self.figment.clone().merge(layer);
        let merged: WiringConfig = staged.extract().map_err(|source| ConfigError::Layer {
            origin: origin.to_string(),
            source,
        })?;

        tracing::debug!(
            "Loaded config layer from {origin}: {} profiles, {} properties, {} flags",
            merged.environment.profiles.len(),
            merged.environment.properties.len(),
            merged.environment.flags.len()
        );

        self.figment = staged;
        Ok(self)
    }
}

/// `WRAPP_PROFILES`, `WRAPP_FLAGS` and `WRAPP_STRICT` mapped onto their config keys
fn env_overrides() -> Env {
    Env::prefixed(ENV_PREFIX)
        .only(&["profiles", "flags", "strict"])
        .map(|key| {
            if key == "profiles" {
                "environment.profiles".into()
            } else if key == "flags" {
                "environment.flags".into()
            } else if key == "strict" {
                "planner.strict".into()
            } else {
                key.as_str().into()
            }
        })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use figment::Jail;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::{EnvironmentConfig, PlannerOptions};

    const FILE: &str = r#"
        [planner]
        default_profiles = ["dev"]

        [environment]
        profiles = ["prod", "eu"]
        flags = ["tokio"]

        [environment.properties]
        "cache.enabled" = "true"
    "#;

    #[test]
    fn defaults_are_empty() {
        let config = ConfigProvider::initialize().extract().unwrap();
        assert_eq!(config, WiringConfig::default());
        assert!(!config.planner.strict);
    }

    #[test]
    fn file_layer_is_parsed() {
        let mut provider = ConfigProvider::initialize();
        provider.load_str(FILE, "inline").unwrap();

        assert_eq!(
            provider.extract().unwrap(),
            WiringConfig {
                planner: PlannerOptions {
                    strict: false,
                    default_profiles: vec!["dev".into()],
                },
                environment: EnvironmentConfig {
                    profiles: vec!["prod".into(), "eu".into()],
                    properties: BTreeMap::from([("cache.enabled".into(), "true".into())]),
                    flags: vec!["tokio".into()],
                },
            }
        );
    }

    #[test]
    fn later_file_merges_properties() {
        let mut provider = ConfigProvider::initialize();
        provider
            .load_str(FILE, "first")
            .unwrap()
            .load_str(
                "[environment.properties]\n\"cache.enabled\" = \"false\"\nregion = \"eu\"\n",
                "second",
            )
            .unwrap();

        let env = provider.extract().unwrap().environment;
        assert_eq!(env.profiles, vec!["prod".to_string(), "eu".to_string()]);
        assert_eq!(env.properties.get("cache.enabled").map(String::as_str), Some("false"));
        assert_eq!(env.properties.get("region").map(String::as_str), Some("eu"));
    }

    #[test]
    fn later_file_can_switch_strict_off() {
        let mut provider = ConfigProvider::initialize();
        provider
            .load_str("[planner]\nstrict = true\n", "first")
            .unwrap();
        assert!(provider.extract().unwrap().planner.strict);

        provider
            .load_str("[planner]\nstrict = false\n", "second")
            .unwrap();
        assert!(!provider.extract().unwrap().planner.strict);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut provider = ConfigProvider::initialize();
        let err = provider
            .load_str("[planner]\nstrictt = true\n", "typo")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Layer { ref origin, .. } if origin == "typo"));

        // the broken layer is not kept
        assert_eq!(provider.extract().unwrap(), WiringConfig::default());
    }

    #[test]
    fn env_overrides_win_over_file() {
        Jail::expect_with(|jail| {
            jail.set_env("WRAPP_PROFILES", "test, local");
            jail.set_env("WRAPP_STRICT", "yes");
            jail.set_env("WRAPP_FLAGS", "serde tokio");

            let mut provider = ConfigProvider::initialize();
            provider
                .load_str(FILE, "inline")
                .unwrap()
                .apply_env_overrides()
                .unwrap();

            let config = provider.extract().unwrap();
            assert_eq!(config.environment.profiles, vec!["test".to_string(), "local".to_string()]);
            assert_eq!(config.environment.flags, vec!["serde".to_string(), "tokio".to_string()]);
            assert_eq!(config.planner.default_profiles, vec!["dev".to_string()]);
            assert!(config.planner.strict);
            Ok(())
        });
    }

    #[test]
    fn invalid_switch_is_reported() {
        Jail::expect_with(|jail| {
            jail.set_env("WRAPP_STRICT", "maybe");

            let err = ConfigProvider::initialize()
                .apply_env_overrides()
                .unwrap_err();
            assert!(matches!(err, ConfigError::Layer { ref origin, .. } if origin == "environment"));
            assert!(err.to_string().contains("maybe"));
            Ok(())
        });
    }

    #[test]
    fn config_file_is_read_from_disk() {
        Jail::expect_with(|jail| {
            jail.create_file("wiring.toml", "[environment]\nprofiles = \"qa\"\n")?;

            let mut provider = ConfigProvider::initialize();
            provider.load_file(Path::new("wiring.toml")).unwrap();
            assert_eq!(
                provider.extract().unwrap().environment.profiles,
                vec!["qa".to_string()]
            );
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ConfigProvider::initialize()
            .load_file(Path::new("/definitely/not/here/wiring.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
