//! Archive settings.
//!
//! Settings are plain serde data. They can be loaded from a JSON file and
//! overridden from the environment:
//!
//! ```ignore
//! let settings = Settings::load("cask.json")?.from_env();
//! let archive = Archive::open_with("scene.abc", settings)?;
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::util::{Error, Result};

/// Overrides `fps`.
pub const FPS_ENV: &str = "CASK_FPS";
/// Overrides `use_mmap` (`0`/`false` disables).
pub const USE_MMAP_ENV: &str = "CASK_USE_MMAP";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Frames per second used for frame/time conversion.
    pub fps: f64,
    /// Application string recorded in written archives.
    pub application: String,
    /// Memory-map archives when reading.
    pub use_mmap: bool,
    /// Default user description for written archives.
    pub description: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fps: 24.0,
            application: format!("cask {}", env!("CARGO_PKG_VERSION")),
            use_mmap: cfg!(feature = "mmap"),
            description: String::new(),
        }
    }
}

impl Settings {
    /// Read settings from a JSON file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Apply `CASK_FPS` and `CASK_USE_MMAP`. Unparsable values are ignored.
    pub fn from_env(mut self) -> Self {
        if let Ok(fps) = std::env::var(FPS_ENV) {
            match fps.trim().parse::<f64>() {
                Ok(v) if v > 0.0 => self.fps = v,
                _ => tracing::warn!(value = %fps, "ignoring {FPS_ENV}"),
            }
        }
        if let Ok(flag) = std::env::var(USE_MMAP_ENV) {
            self.use_mmap = !matches!(flag.trim(), "0" | "false" | "no" | "off");
        }
        self
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.fps, 24.0);
        assert!(s.application.starts_with("cask "));
    }

    #[test]
    fn test_partial_json() {
        let s: Settings = serde_json::from_str(r#"{"fps": 30}"#).unwrap();
        assert_eq!(s.fps, 30.0);
        assert_eq!(s.description, "");
    }

    #[test]
    fn test_load_missing_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cask.json");
        assert_eq!(Settings::load(&path).unwrap(), Settings::default());

        let s = Settings { fps: 25.0, ..Default::default() };
        s.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), s);
    }
}
