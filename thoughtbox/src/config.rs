use std::sync::OnceLock;

use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppEnv {
    Development,
    Production,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Secret for note field encryption. Mandatory outside of development.
    pub encryption_key: Option<String>,
    pub cors_origin: Option<String>,

    #[serde(default = "default_app_env")]
    pub app_env: AppEnv,
    #[serde(default)]
    pub log_json: bool,

    // build
    #[serde(default = "default_local")]
    pub source: String,
    #[serde(default = "default_local")]
    pub git_commit: String,
    #[serde(default = "default_local")]
    pub pipeline_id: String,
    #[serde(default = "default_local")]
    pub version: String,
}

/// Used only when `APP_ENV=development` and no `ENCRYPTION_KEY` is set.
const DEV_ENCRYPTION_KEY: &str = "thoughtbox-development-key-do-not-use";

fn default_port() -> u16 {
    4000
}

fn default_database_url() -> String {
    "thoughtbox.db".into()
}

fn default_app_env() -> AppEnv {
    AppEnv::Development
}

fn default_local() -> String {
    "local".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            database_url: default_database_url(),
            encryption_key: None,
            cors_origin: None,
            app_env: default_app_env(),
            log_json: false,
            source: default_local(),
            git_commit: default_local(),
            pipeline_id: default_local(),
            version: default_local(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env::<Self>()
    }

    pub fn is_development(&self) -> bool {
        self.app_env == AppEnv::Development
    }

    /// The configured encryption secret, or the development fallback.
    pub fn encryption_secret(&self) -> Option<&str> {
        match (&self.encryption_key, self.app_env) {
            (Some(key), _) if !key.is_empty() => Some(key),
            (_, AppEnv::Development) => {
                tracing::warn!("ENCRYPTION_KEY is not set, using the insecure development key");
                Some(DEV_ENCRYPTION_KEY)
            }
            _ => None,
        }
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Loads the configuration from the environment. Must run before the first `config()` call
/// for the environment to take effect.
pub fn init() -> Result<&'static Config, envy::Error> {
    let config = Config::from_env()?;
    Ok(CONFIG.get_or_init(|| config))
}

pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_in_production_is_rejected() {
        let config = Config {
            app_env: AppEnv::Production,
            ..Default::default()
        };
        assert_eq!(config.encryption_secret(), None);
    }

    #[test]
    fn development_falls_back_to_dev_key() {
        let config = Config::default();
        assert_eq!(config.encryption_secret(), Some(DEV_ENCRYPTION_KEY));

        let config = Config {
            encryption_key: Some("operator secret".into()),
            app_env: AppEnv::Production,
            ..Default::default()
        };
        assert_eq!(config.encryption_secret(), Some("operator secret"));
    }
}
