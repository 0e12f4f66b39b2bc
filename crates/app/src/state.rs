//! Application state management

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use plenario_core::{ChamberConfig, ChamberRepository, Database, Result, UserContext};
use tracing::info;

use crate::config::AppConfig;

/// Shared state of one chamber terminal
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub config: AppConfig,
    pub user: UserContext,
}

impl AppState {
    pub fn open(config: AppConfig, db_path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(db_path)?;
        Self::with_database(db, config)
    }

    /// Wrap an already open database, seeding any missing chambers
    pub fn with_database(db: Database, config: AppConfig) -> Result<Self> {
        let seeded = seed_chambers(&db, &config.cities)?;
        if seeded > 0 {
            info!(seeded, "Created chamber configs");
        }
        let user = config.user_context();
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            config,
            user,
        })
    }

    /// Lock the database; a panicked holder leaves the rows intact
    pub fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn city(&self) -> &str {
        &self.config.city
    }
}

/// Create a config row for every city that has none yet
fn seed_chambers(db: &Database, cities: &[String]) -> Result<usize> {
    let mut created = 0;
    for city in cities {
        if db.find_chamber(city)?.is_none() {
            db.create_chamber(&ChamberConfig::new(city.clone()))?;
            created += 1;
        }
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeding_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let cities: Vec<String> = vec!["Almenara".into(), "Pedra Azul".into()];
        assert_eq!(seed_chambers(&db, &cities).unwrap(), 2);
        assert_eq!(seed_chambers(&db, &cities).unwrap(), 0);
        assert_eq!(db.list_chambers().unwrap().len(), 2);
    }

    #[test]
    fn test_file_backed_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_dir: Some(dir.path().join("data")),
            ..AppConfig::default()
        };
        let path = config.database_path().unwrap();
        let state = AppState::open(config, &path).unwrap();
        assert_eq!(state.city(), "Almenara");
        assert_eq!(state.db().list_chambers().unwrap().len(), 4);
        assert!(dir.path().join("data").join("plenario.db").exists());
    }
}
