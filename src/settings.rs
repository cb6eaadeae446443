//! Persisted user preferences.
//!
//! Only the theme is stored today. The file lives in the platform config
//! directory as a small JSON document; a missing file means defaults.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    /// Follow the terminal background.
    #[default]
    Auto,
    Dark,
    Light,
}

impl FromStr for ThemePreference {
    type Err = SettingsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            other => Err(SettingsError::UnknownTheme(other.to_string())),
        }
    }
}

impl fmt::Display for ThemePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Dark => "dark",
            Self::Light => "light",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub theme: ThemePreference,
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("could not determine a config directory for this platform")]
    NoConfigDir,
    #[error("failed to read settings from {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write settings to {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("unknown theme '{0}', expected auto, dark or light")]
    UnknownTheme(String),
}

/// Loaded preferences plus where to save them. `path` is `None` for an
/// in-memory instance, which never touches the filesystem.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    path: Option<PathBuf>,
    prefs: Preferences,
}

impl Settings {
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        let dirs = ProjectDirs::from("", "", "segscope").ok_or(SettingsError::NoConfigDir)?;
        Ok(dirs.config_dir().join(SETTINGS_FILE))
    }

    pub fn load_default() -> Result<Self, SettingsError> {
        Self::load(Self::default_path()?)
    }

    pub fn load(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let prefs = match fs::read_to_string(&path) {
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
                    path: path.clone(),
                    source,
                })?
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Preferences::default(),
            Err(source) => return Err(SettingsError::Read { path, source }),
        };
        tracing::debug!(path = %path.display(), theme = %prefs.theme, "settings_loaded");
        Ok(Self {
            path: Some(path),
            prefs,
        })
    }

    pub fn in_memory(prefs: Preferences) -> Self {
        Self { path: None, prefs }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn theme(&self) -> ThemePreference {
        self.prefs.theme
    }

    /// Update the theme and write the file. The in-memory value is updated
    /// even when saving fails.
    pub fn set_theme(&mut self, theme: ThemePreference) -> Result<(), SettingsError> {
        self.prefs.theme = theme;
        self.save()
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let write_err = |source| SettingsError::Write {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let contents = serde_json::to_string_pretty(&self.prefs).map_err(|source| {
            SettingsError::Parse {
                path: path.clone(),
                source,
            }
        })?;
        fs::write(path, contents).map_err(write_err)?;
        tracing::debug!(path = %path.display(), theme = %self.prefs.theme, "settings_saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(dir.path().join("settings.json")).unwrap();
        assert_eq!(settings.theme(), ThemePreference::Auto);
    }

    #[test]
    fn theme_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut settings = Settings::load(&path).unwrap();
        settings.set_theme(ThemePreference::Light).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"light\""));
        let reloaded = Settings::load(&path).unwrap();
        assert_eq!(reloaded.theme(), ThemePreference::Light);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(SettingsError::Parse { .. })
        ));
    }

    #[test]
    fn in_memory_settings_never_write() {
        let mut settings = Settings::in_memory(Preferences::default());
        settings.set_theme(ThemePreference::Dark).unwrap();
        assert_eq!(settings.theme(), ThemePreference::Dark);
        assert!(settings.path().is_none());
    }

    #[test]
    fn theme_preference_parses_case_insensitively() {
        assert_eq!("Light".parse::<ThemePreference>().unwrap(), ThemePreference::Light);
        assert!("solarized".parse::<ThemePreference>().is_err());
    }
}
