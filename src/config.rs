use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_ui_dir")]
    pub ui_dir: PathBuf,
    #[serde(default = "default_disk_mount")]
    pub disk_mount: PathBuf,
    #[serde(default = "default_processes")]
    pub processes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            ui_dir: default_ui_dir(),
            disk_mount: default_disk_mount(),
            processes: default_processes(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("не удалось прочитать файл конфигурации {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("не удалось разобрать YAML в {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("ошибка валидации конфигурации: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.trim().is_empty() {
            return Err(ConfigError::Validation(
                "поле listen обязательно".to_string(),
            ));
        }
        if SocketAddr::from_str(&self.listen).is_err() {
            return Err(ConfigError::Validation(
                "поле listen должно быть корректным адресом host:port".to_string(),
            ));
        }
        if self.ui_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "поле ui_dir не должно быть пустым".to_string(),
            ));
        }
        if !self.disk_mount.is_absolute() {
            return Err(ConfigError::Validation(format!(
                "disk_mount '{}' должен быть абсолютным путём",
                self.disk_mount.display()
            )));
        }

        Ok(())
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn default_listen() -> String {
    "0.0.0.0:6969".to_string()
}

fn default_ui_dir() -> PathBuf {
    PathBuf::from("./ui")
}

fn default_disk_mount() -> PathBuf {
    PathBuf::from("/")
}

const fn default_processes() -> bool {
    true
}
