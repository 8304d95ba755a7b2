use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::constants;

/// User preferences persisted in `prefs.toml`.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
  pub theme_name: Option<String>,
  pub volume: Option<u8>,
  pub api_url: Option<String>,
  pub audio_only: Option<bool>,
}

/// Effective settings after merging CLI/env overrides, prefs and constants.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
  pub api_url: String,
  pub volume: u8,
  pub audio_only: bool,
  pub theme_name: Option<String>,
}

/// Values given on the command line or through the environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
  pub api_url: Option<String>,
  pub volume: Option<u8>,
  pub video: bool,
}

impl Config {
  fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "muse")
  }

  pub fn load() -> Self {
    if let Some(proj_dirs) = Self::project_dirs() {
      let config_file = proj_dirs.config_dir().join("prefs.toml");
      if let Ok(content) = std::fs::read_to_string(&config_file) {
        match toml::from_str(&content) {
          Ok(config) => return config,
          Err(e) => warn!(path = %config_file.display(), err = %e, "ignoring malformed prefs file"),
        }
      }
    }
    Self::default()
  }

  pub fn save(&self) {
    if let Some(proj_dirs) = Self::project_dirs() {
      let config_dir = proj_dirs.config_dir();
      if std::fs::create_dir_all(config_dir).is_ok() {
        let config_file = config_dir.join("prefs.toml");
        if let Ok(content) = toml::to_string(self) {
          let _ = std::fs::write(config_file, content);
        }
      }
    }
  }

  /// Merge with overrides; overrides win, then prefs, then constants.
  pub fn resolve(&self, overrides: &Overrides) -> Settings {
    let c = constants();
    Settings {
      api_url: overrides.api_url.clone().or_else(|| self.api_url.clone()).unwrap_or_else(|| c.default_api_url.clone()),
      volume: overrides.volume.or(self.volume).unwrap_or(c.default_volume).min(100),
      audio_only: if overrides.video { false } else { self.audio_only.unwrap_or(true) },
      theme_name: self.theme_name.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn prefs_round_trip_through_toml() {
    let config = Config {
      theme_name: Some("Dusk".into()),
      volume: Some(35),
      api_url: Some("http://muse.local".into()),
      audio_only: Some(false),
    };
    let text = toml::to_string(&config).unwrap();
    assert_eq!(toml::from_str::<Config>(&text).unwrap(), config);
  }

  #[test]
  fn missing_keys_are_none() {
    let config: Config = toml::from_str("volume = 10").unwrap();
    assert_eq!(config.volume, Some(10));
    assert!(config.api_url.is_none());
  }

  #[test]
  fn resolve_defaults_to_constants() {
    let s = Config::default().resolve(&Overrides::default());
    assert_eq!(s.api_url, constants().default_api_url);
    assert_eq!(s.volume, constants().default_volume);
    assert!(s.audio_only);
  }

  #[test]
  fn overrides_beat_prefs() {
    let config = Config { volume: Some(20), api_url: Some("http://a".into()), audio_only: Some(true), ..Config::default() };
    let s = config.resolve(&Overrides { api_url: Some("http://b".into()), volume: Some(90), video: true });
    assert_eq!(s.api_url, "http://b");
    assert_eq!(s.volume, 90);
    assert!(!s.audio_only);
  }

  #[test]
  fn prefs_volume_is_capped() {
    let s = Config { volume: Some(250), ..Config::default() }.resolve(&Overrides::default());
    assert_eq!(s.volume, 100);
  }
}
