//! Terminal configuration
//!
//! Read from `plenario.toml`, either passed on the command line or found
//! in the platform config directory. A missing default file means the
//! built-in defaults.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use plenario_core::{ParticipantId, Role, UserContext};
use serde::Deserialize;

pub const CONFIG_FILE: &str = "plenario.toml";

/// Chambers created on first run
pub const DEFAULT_CITIES: &[&str] = &["Almenara", "Itagimirim", "Jequitinhonha", "Pedra Azul"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Could not determine config directory")]
    NoProjectDirs,
    #[error("Chamber '{0}' is not in the configured city list")]
    UnknownCity(String),
    #[error("tick_interval_ms must be greater than zero")]
    ZeroTickInterval,
}

/// Who is sitting at this terminal
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserConfig {
    pub role: Role,
    pub name: String,
    /// Seat record for councilmen and the president
    #[serde(default)]
    pub participant_id: Option<String>,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            role: Role::Clerk,
            name: "Mesa Diretora".to_string(),
            participant_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Chamber this terminal serves
    pub city: String,
    pub user: UserConfig,
    pub cities: Vec<String>,
    /// Overrides the platform data directory
    pub data_dir: Option<PathBuf>,
    /// Address reported to the chamber access check
    pub client_ip: Option<String>,
    pub tick_interval_ms: u64,
    /// Used when RUST_LOG is not set
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            city: DEFAULT_CITIES[0].to_string(),
            user: UserConfig::default(),
            cities: DEFAULT_CITIES.iter().map(|c| c.to_string()).collect(),
            data_dir: None,
            client_ip: None,
            tick_interval_ms: 1000,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from an explicit path, or from the platform config dir
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::project_dirs()?.config_dir().join(CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.cities.iter().any(|c| c == &self.city) {
            return Err(ConfigError::UnknownCity(self.city.clone()));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }
        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs, ConfigError> {
        ProjectDirs::from("dev", "onyx", "plenario").ok_or(ConfigError::NoProjectDirs)
    }

    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        let dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => Self::project_dirs()?.data_dir().to_path_buf(),
        };
        Ok(dir.join("plenario.db"))
    }

    pub fn user_context(&self) -> UserContext {
        let ctx = UserContext::new(self.user.role, self.city.clone(), self.user.name.clone());
        match &self.user.participant_id {
            Some(id) => ctx.with_participant(ParticipantId::new(id.clone())),
            None => ctx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.cities.len(), 4);
        config.validate().unwrap();
    }

    #[test]
    fn test_councilman_terminal() {
        let toml = r#"
city = "Pedra Azul"
client_ip = "200.1.1.9"
tick_interval_ms = 500

[user]
role = "councilman"
name = "Ana Souza"
participant_id = "pa-07"
"#;
        let config = AppConfig::from_toml(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.tick_interval_ms, 500);
        assert_eq!(config.client_ip.as_deref(), Some("200.1.1.9"));

        let ctx = config.user_context();
        assert_eq!(ctx.role, Role::Councilman);
        assert_eq!(ctx.city, "Pedra Azul");
        assert_eq!(ctx.participant_id, Some(ParticipantId::new("pa-07")));
    }

    #[test]
    fn test_clerk_alias() {
        let config = AppConfig::from_toml("[user]\nrole = \"mesario\"\nname = \"Mesa\"\n").unwrap();
        assert_eq!(config.user.role, Role::Clerk);
    }

    #[test]
    fn test_validation() {
        let config = AppConfig::from_toml("city = \"Salvador\"").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::UnknownCity(_))));

        let config = AppConfig::from_toml("tick_interval_ms = 0").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTickInterval)));

        assert!(matches!(
            AppConfig::from_toml("city = ["),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "city = \"Itagimirim\"").unwrap();
        writeln!(file, "data_dir = \"{}\"", dir.path().display()).unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.city, "Itagimirim");
        assert_eq!(config.database_path().unwrap(), dir.path().join("plenario.db"));

        let missing = dir.path().join("nope.toml");
        assert!(matches!(AppConfig::load(Some(&missing)), Err(ConfigError::Io { .. })));
    }
}
