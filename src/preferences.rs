use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info};

pub const UPDATE_INTERVAL_RANGE: RangeInclusive<f64> = 1.0..=10.0;
pub const BACKGROUND_ALPHA_RANGE: RangeInclusive<f64> = 0.3..=0.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: f64,
    #[serde(default)]
    pub enabled_metrics: EnabledMetrics,
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default = "default_window_always_on_top")]
    pub window_always_on_top: bool,
    #[serde(default)]
    pub appearance: Appearance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnabledMetrics {
    #[serde(default = "enabled")]
    pub network_speed: bool,
    #[serde(default = "enabled")]
    pub cpu_usage: bool,
    #[serde(default = "enabled")]
    pub memory_usage: bool,
    #[serde(default = "enabled")]
    pub battery_level: bool,
    #[serde(default = "enabled")]
    pub time_display: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appearance {
    #[serde(default = "default_background_alpha")]
    pub background_alpha: f64,
    #[serde(default)]
    pub color_theme: ColorTheme,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTheme {
    #[default]
    Blue,
    Green,
    Orange,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgba {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

impl ColorTheme {
    pub const ALL: [ColorTheme; 3] = [Self::Blue, Self::Green, Self::Orange];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Blue => "Синяя",
            Self::Green => "Зелёная",
            Self::Orange => "Оранжевая",
        }
    }

    pub fn primary_color(&self) -> Rgba {
        let (red, green, blue) = match self {
            Self::Blue => (0.2, 0.85, 1.0),
            Self::Green => (0.2, 1.0, 0.4),
            Self::Orange => (1.0, 0.6, 0.2),
        };
        Rgba {
            red,
            green,
            blue,
            alpha: 1.0,
        }
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval_secs(),
            enabled_metrics: EnabledMetrics::default(),
            auto_start: false,
            window_always_on_top: default_window_always_on_top(),
            appearance: Appearance::default(),
        }
    }
}

impl Default for EnabledMetrics {
    fn default() -> Self {
        Self {
            network_speed: true,
            cpu_usage: true,
            memory_usage: true,
            battery_level: true,
            time_display: true,
        }
    }
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            background_alpha: default_background_alpha(),
            color_theme: ColorTheme::default(),
        }
    }
}

impl Preferences {
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs_f64(self.update_interval_secs)
    }

    pub fn validate(&self) -> Result<(), PreferencesError> {
        validate_update_interval(self.update_interval_secs)?;
        validate_background_alpha(self.appearance.background_alpha)?;
        Ok(())
    }
}

pub fn validate_update_interval(secs: f64) -> Result<(), PreferencesError> {
    if !UPDATE_INTERVAL_RANGE.contains(&secs) {
        return Err(PreferencesError::Validation(format!(
            "update_interval_secs должно быть в диапазоне 1..10, получено {secs}"
        )));
    }
    Ok(())
}

pub fn validate_background_alpha(alpha: f64) -> Result<(), PreferencesError> {
    if !BACKGROUND_ALPHA_RANGE.contains(&alpha) {
        return Err(PreferencesError::Validation(format!(
            "background_alpha должно быть в диапазоне 0.3..0.8, получено {alpha}"
        )));
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("недопустимое значение настройки: {0}")]
    Validation(String),
    #[error("не удалось прочитать настройки {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("не удалось разобрать настройки {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("не удалось сохранить настройки {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

pub struct PreferencesStore {
    path: PathBuf,
    tx: watch::Sender<Preferences>,
    write_lock: Mutex<()>,
}

impl PreferencesStore {
    /// Never fails: a missing or broken file yields defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let prefs = match read_preferences(&path) {
            Ok(Some(prefs)) => {
                info!(path = %path.display(), "настройки загружены");
                prefs
            }
            Ok(None) => {
                info!(path = %path.display(), "файл настроек не найден, используются значения по умолчанию");
                Preferences::default()
            }
            Err(err) => {
                error!(error = %err, "настройки повреждены, используются значения по умолчанию");
                Preferences::default()
            }
        };
        let (tx, _rx) = watch::channel(prefs);
        Self {
            path,
            tx,
            write_lock: Mutex::new(()),
        }
    }

    pub fn current(&self) -> Preferences {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Preferences> {
        self.tx.subscribe()
    }

    pub fn save(&self, prefs: Preferences) -> Result<(), PreferencesError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.persist_and_publish(prefs)
    }

    pub fn update_interval(&self, secs: f64) -> Result<(), PreferencesError> {
        validate_update_interval(secs)?;
        self.modify(|p| p.update_interval_secs = secs)
    }

    pub fn update_background_alpha(&self, alpha: f64) -> Result<(), PreferencesError> {
        validate_background_alpha(alpha)?;
        self.modify(|p| p.appearance.background_alpha = alpha)
    }

    pub fn update_color_theme(&self, theme: ColorTheme) -> Result<(), PreferencesError> {
        self.modify(|p| p.appearance.color_theme = theme)
    }

    pub fn update_enabled_metrics(&self, metrics: EnabledMetrics) -> Result<(), PreferencesError> {
        self.modify(|p| p.enabled_metrics = metrics)
    }

    pub fn update_auto_start(&self, enabled: bool) -> Result<(), PreferencesError> {
        self.modify(|p| p.auto_start = enabled)
    }

    pub fn update_window_always_on_top(&self, enabled: bool) -> Result<(), PreferencesError> {
        self.modify(|p| p.window_always_on_top = enabled)
    }

    pub fn reset_to_defaults(&self) -> Result<(), PreferencesError> {
        info!("настройки сброшены к значениям по умолчанию");
        self.save(Preferences::default())
    }

    fn modify(&self, f: impl FnOnce(&mut Preferences)) -> Result<(), PreferencesError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = self.current();
        f(&mut next);
        self.persist_and_publish(next)
    }

    fn persist_and_publish(&self, prefs: Preferences) -> Result<(), PreferencesError> {
        prefs.validate()?;
        let path_display = self.path.display().to_string();
        let text = serde_yaml::to_string(&prefs).map_err(|source| PreferencesError::Parse {
            path: path_display.clone(),
            source,
        })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| PreferencesError::Write {
                path: path_display.clone(),
                source,
            })?;
        }
        fs::write(&self.path, text).map_err(|source| PreferencesError::Write {
            path: path_display,
            source,
        })?;
        self.tx.send_replace(prefs);
        Ok(())
    }
}

fn read_preferences(path: &Path) -> Result<Option<Preferences>, PreferencesError> {
    let path_display = path.display().to_string();
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PreferencesError::Read {
                path: path_display,
                source,
            })
        }
    };
    let prefs: Preferences =
        serde_yaml::from_str(&text).map_err(|source| PreferencesError::Parse {
            path: path_display,
            source,
        })?;
    prefs.validate()?;
    Ok(Some(prefs))
}

const fn default_update_interval_secs() -> f64 {
    3.0
}

const fn default_window_always_on_top() -> bool {
    true
}

const fn default_background_alpha() -> f64 {
    0.5
}

const fn enabled() -> bool {
    true
}
