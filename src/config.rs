use std::{
    env,
    fmt::Display,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use tracing::debug;

use crate::utils::{
    dir::{create_application_default_path, home_dir},
    time::TimeFormatter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Backend {
    /// Plain text file, one activity per line.
    #[default]
    File,
    /// TimeWarrior data directory.
    Timewarrior,
}

impl Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::File => write!(f, "file"),
            Backend::Timewarrior => write!(f, "timewarrior"),
        }
    }
}

/// Where and how activities are stored. Built once at startup from command line flags, which win
/// over environment variables, which win over defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: Backend,
    /// Activity file for [Backend::File], data directory for [Backend::Timewarrior].
    pub path: PathBuf,
    pub notes_dir: PathBuf,
    pub time_format: TimeFormatter,
}

impl StorageConfig {
    pub fn from_env(backend: Option<Backend>, path: Option<PathBuf>) -> Result<Self> {
        let state_dir = create_application_default_path()?;
        Self::resolve(
            backend,
            path,
            |key| env::var(key).ok(),
            &home_dir()?,
            &state_dir,
        )
    }

    pub fn resolve(
        backend: Option<Backend>,
        path: Option<PathBuf>,
        env: impl Fn(&str) -> Option<String>,
        home: &Path,
        state_dir: &Path,
    ) -> Result<Self> {
        // Empty variables count as unset.
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let backend = match backend {
            Some(v) => v,
            None => match var("TOCK_BACKEND") {
                Some(v) => Backend::from_str(v.trim(), true)
                    .map_err(|_| anyhow!("Unknown backend {v:?} in TOCK_BACKEND"))?,
                None => Backend::default(),
            },
        };

        let path = path.unwrap_or_else(|| match backend {
            Backend::File => var("TOCK_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| home.join(".tock.txt")),
            Backend::Timewarrior => var("TIMEWARRIORDB")
                .map(PathBuf::from)
                .unwrap_or_else(|| home.join(".timewarrior").join("data")),
        });

        let notes_dir = var("TOCK_NOTES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| state_dir.join("notes"));

        let time_format = var("TOCK_TIME_FORMAT")
            .map(|v| TimeFormatter::from_setting(&v))
            .unwrap_or_default();

        let config = Self {
            backend,
            path,
            notes_dir,
            time_format,
        };
        debug!("Using storage {config:?}");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, path::PathBuf};

    use anyhow::Result;

    use crate::utils::time::{HourFormat, TimeFormatter};

    use super::{Backend, StorageConfig};

    fn resolve(
        backend: Option<Backend>,
        path: Option<PathBuf>,
        vars: &[(&str, &str)],
    ) -> Result<StorageConfig> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        StorageConfig::resolve(
            backend,
            path,
            |key| vars.get(key).cloned(),
            &PathBuf::from("/home/user"),
            &PathBuf::from("/state/tock"),
        )
    }

    #[test]
    fn test_defaults() -> Result<()> {
        assert_eq!(
            resolve(None, None, &[])?,
            StorageConfig {
                backend: Backend::File,
                path: PathBuf::from("/home/user/.tock.txt"),
                notes_dir: PathBuf::from("/state/tock/notes"),
                time_format: TimeFormatter::default(),
            }
        );
        Ok(())
    }

    #[test]
    fn test_environment() -> Result<()> {
        let config = resolve(
            None,
            None,
            &[
                ("TOCK_BACKEND", "timewarrior"),
                ("TIMEWARRIORDB", "/data/tw"),
                ("TOCK_FILE", "/ignored.txt"),
                ("TOCK_NOTES_DIR", "/data/notes"),
                ("TOCK_TIME_FORMAT", "12"),
            ],
        )?;
        assert_eq!(config.backend, Backend::Timewarrior);
        assert_eq!(config.path, PathBuf::from("/data/tw"));
        assert_eq!(config.notes_dir, PathBuf::from("/data/notes"));
        assert_eq!(config.time_format.format(), HourFormat::TwelveHour);

        let config = resolve(None, None, &[("TOCK_BACKEND", "timewarrior")])?;
        assert_eq!(config.path, PathBuf::from("/home/user/.timewarrior/data"));
        Ok(())
    }

    #[test]
    fn test_flags_win() -> Result<()> {
        let config = resolve(
            Some(Backend::File),
            Some(PathBuf::from("/tmp/log.txt")),
            &[("TOCK_BACKEND", "timewarrior"), ("TOCK_FILE", "/other.txt")],
        )?;
        assert_eq!(config.backend, Backend::File);
        assert_eq!(config.path, PathBuf::from("/tmp/log.txt"));
        Ok(())
    }

    #[test]
    fn test_unknown_backend() {
        assert!(resolve(None, None, &[("TOCK_BACKEND", "sqlite")]).is_err());
        assert_eq!(
            resolve(None, None, &[("TOCK_BACKEND", "")]).unwrap().backend,
            Backend::File
        );
    }
}
