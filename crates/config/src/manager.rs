//! Configuration manager - main API for config operations

use crate::persistence::ConfigPersistence;
use crate::{Config, ConfigError, ConfigResult};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.toml";

/// Main configuration manager
///
/// Owns the location of the config file and of the data directory the cache
/// database lives in by default.
pub struct ConfigManager {
    persistence: ConfigPersistence,
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl ConfigManager {
    /// Creates a manager using the platform directories
    ///
    /// - Linux: `~/.config/harbor/` and `~/.local/share/harbor/`
    /// - macOS: `~/Library/Application Support/harbor/`
    /// - Windows: `%APPDATA%\harbor\`
    pub fn new() -> ConfigResult<Self> {
        let dirs = ProjectDirs::from("", "", "harbor").ok_or_else(|| {
            ConfigError::PathResolutionError {
                reason: "Could not determine user config directory".to_string(),
            }
        })?;

        Ok(Self::with_directories(
            dirs.config_dir().to_path_buf(),
            dirs.data_dir().to_path_buf(),
        ))
    }

    /// Creates a manager keeping config and data in one custom directory
    pub fn with_directory(dir: PathBuf) -> ConfigResult<Self> {
        Ok(Self::with_directories(dir.clone(), dir))
    }

    fn with_directories(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        let persistence = ConfigPersistence::new(config_dir.join(CONFIG_FILE_NAME));
        Self {
            persistence,
            config_dir,
            data_dir,
        }
    }

    /// Returns the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Returns the directory relative database paths resolve against
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the full config file path
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// Absolute location of the cache database for `config`
    pub fn database_path(&self, config: &Config) -> PathBuf {
        let path = &config.app.database_path;
        if path.is_absolute() {
            path.clone()
        } else {
            self.data_dir.join(path)
        }
    }

    /// Loads the configuration from file
    pub fn load(&self) -> ConfigResult<Config> {
        self.persistence.load()
    }

    /// Loads the configuration, falling back to defaults on any error
    pub fn load_or_default(&self) -> Config {
        match self.load() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config: {}, using defaults", e);
                Config::default()
            }
        }
    }

    /// Loads the configuration and applies `HARBOR_*` environment overrides
    ///
    /// Falls back to defaults when the file cannot be read.
    pub fn load_with_env_overrides(&self) -> Config {
        let mut config = self.load_or_default();
        let applied = config.apply_overrides(|name| std::env::var(name).ok());
        if !applied.is_empty() {
            log::info!("Environment overrides applied: {}", applied.join(", "));
        }

        if let Err(errors) = config.validate() {
            log::warn!(
                "Config validation warnings after env overrides: {}",
                crate::error::join_errors(&errors)
            );
        }
        config
    }

    /// Validates and saves the configuration
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        self.persistence.save(config)
    }

    /// Loads, updates through `update_fn` and saves the configuration
    pub fn update<F>(&self, update_fn: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config) -> ConfigResult<()>,
    {
        let mut config = self.load()?;
        update_fn(&mut config)?;
        self.save(&config)
    }

    /// Writes a default config file if none exists
    ///
    /// Returns Ok(true) if a new file was created.
    pub fn initialize(&self) -> ConfigResult<bool> {
        if self.config_path().exists() {
            log::info!(
                "Config file already exists at {}",
                self.config_path().display()
            );
            return Ok(false);
        }

        self.save(&Config::default())?;
        Ok(true)
    }

    /// Overwrites the config file with defaults
    pub fn reset(&self) -> ConfigResult<()> {
        self.save(&Config::default())
    }

    /// Restores the previous config file from its backup
    pub fn restore_backup(&self) -> ConfigResult<bool> {
        self.persistence.restore_backup()
    }

    /// Validates the current config file, returning every problem found
    pub fn validate(&self) -> ConfigResult<Vec<String>> {
        let config = self.load()?;

        match config.validate() {
            Ok(()) => Ok(Vec::new()),
            Err(errors) => Ok(errors.iter().map(|e| e.to_string()).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_manager() -> (TempDir, ConfigManager) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let manager = ConfigManager::with_directory(temp_dir.path().to_path_buf())
            .expect("Failed to create manager");
        (temp_dir, manager)
    }

    #[test]
    fn test_load_or_default_with_missing_file() {
        let (_temp_dir, manager) = setup_test_manager();
        assert_eq!(manager.load_or_default(), Config::default());
    }

    #[test]
    fn test_load_or_default_with_corrupt_file() {
        let (_temp_dir, manager) = setup_test_manager();
        std::fs::write(manager.config_path(), "[remote\n").unwrap();

        assert!(manager.load().is_err());
        assert_eq!(manager.load_or_default(), Config::default());
    }

    #[test]
    fn test_update() {
        let (_temp_dir, manager) = setup_test_manager();
        manager.initialize().expect("Should initialize");

        manager
            .update(|config| config.set("remote.timeout_secs", "12"))
            .expect("Should update");

        assert_eq!(manager.load().unwrap().remote.timeout_secs, 12);
    }

    #[test]
    fn test_update_rejects_invalid_result() {
        let (_temp_dir, manager) = setup_test_manager();
        manager.initialize().expect("Should initialize");

        let result = manager.update(|config| config.set("retry.max_attempts", "0"));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
        assert_eq!(manager.load().unwrap().retry.max_attempts, 3);
    }

    #[test]
    fn test_initialize_only_once() {
        let (_temp_dir, manager) = setup_test_manager();

        assert!(manager.initialize().expect("Should initialize"));
        assert!(manager.config_path().exists());
        assert!(!manager.initialize().expect("Should initialize"));
    }

    #[test]
    fn test_reset_and_restore() {
        let (_temp_dir, manager) = setup_test_manager();

        let mut config = Config::default();
        config.sync.auto_sync_on_write = false;
        manager.save(&config).expect("Should save");

        manager.reset().expect("Should reset");
        assert_eq!(manager.load().unwrap(), Config::default());

        assert!(manager.restore_backup().unwrap());
        assert!(!manager.load().unwrap().sync.auto_sync_on_write);
    }

    #[test]
    fn test_database_path_resolution() {
        let (temp_dir, manager) = setup_test_manager();
        let mut config = Config::default();

        assert_eq!(
            manager.database_path(&config),
            temp_dir.path().join("harbor.db")
        );

        let absolute = temp_dir.path().join("elsewhere").join("cache.db");
        config.app.database_path = absolute.clone();
        assert_eq!(manager.database_path(&config), absolute);
    }

    #[test]
    fn test_validate_reports_file_problems() {
        let (_temp_dir, manager) = setup_test_manager();
        std::fs::write(manager.config_path(), "[remote]\nbase_url = \"nope\"\n").unwrap();

        let problems = manager.validate().expect("Should validate");
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("remote.base_url"));
    }

    #[test]
    fn test_config_file_path() {
        let (_temp_dir, manager) = setup_test_manager();
        assert!(manager.config_path().ends_with("config.toml"));
        assert_eq!(manager.config_dir(), manager.data_dir());
    }
}
