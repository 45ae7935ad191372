use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub listen: String,
    #[serde(default = "default_preferences_path")]
    pub preferences_path: PathBuf,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub network_switch: NetworkSwitchConfig,
    #[serde(default)]
    pub keep_awake: KeepAwakeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SamplingConfig {
    #[serde(default = "default_interface_prefixes")]
    pub interface_prefixes: Vec<String>,
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkSwitchConfig {
    #[serde(default = "default_network_switch_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeepAwakeConfig {
    #[serde(default)]
    pub enabled_on_start: bool,
    #[serde(default = "default_keep_awake_command")]
    pub command: Vec<String>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interface_prefixes: default_interface_prefixes(),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

impl SamplingConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl Default for NetworkSwitchConfig {
    fn default() -> Self {
        Self {
            enabled: default_network_switch_enabled(),
        }
    }
}

impl Default for KeepAwakeConfig {
    fn default() -> Self {
        Self {
            enabled_on_start: false,
            command: default_keep_awake_command(),
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
        if self.preferences_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "поле preferences_path не должно быть пустым".to_string(),
            ));
        }

        validate_sampling(&self.sampling)?;
        validate_keep_awake(&self.keep_awake)?;

        Ok(())
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_sampling(cfg: &SamplingConfig) -> Result<(), ConfigError> {
    if cfg.interface_prefixes.is_empty() {
        return Err(ConfigError::Validation(
            "sampling.interface_prefixes не должен быть пустым".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for prefix in &cfg.interface_prefixes {
        if prefix.trim().is_empty() {
            return Err(ConfigError::Validation(
                "sampling.interface_prefixes[*] не должен быть пустым".to_string(),
            ));
        }
        if !seen.insert(prefix.as_str()) {
            return Err(ConfigError::Validation(format!(
                "префикс интерфейса '{prefix}' указан дважды"
            )));
        }
    }
    if cfg.command_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "sampling.command_timeout_ms должен быть > 0".to_string(),
        ));
    }
    Ok(())
}

fn validate_keep_awake(cfg: &KeepAwakeConfig) -> Result<(), ConfigError> {
    match cfg.command.first() {
        Some(program) if !program.trim().is_empty() => Ok(()),
        _ => Err(ConfigError::Validation(
            "keep_awake.command должен содержать имя программы".to_string(),
        )),
    }
}

fn default_preferences_path() -> PathBuf {
    PathBuf::from("./preferences.yaml")
}

fn default_interface_prefixes() -> Vec<String> {
    ["en", "wi", "eth"].iter().map(|p| p.to_string()).collect()
}

const fn default_command_timeout_ms() -> u64 {
    2000
}

const fn default_network_switch_enabled() -> bool {
    true
}

fn default_keep_awake_command() -> Vec<String> {
    vec!["caffeinate".to_string(), "-di".to_string()]
}
