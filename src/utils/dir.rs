use std::{env, io, path::PathBuf};

use anyhow::{anyhow, Result};

/// Directory for logs and side notes. `$XDG_STATE_HOME/tock` or `$HOME/.local/state/tock`.
pub fn create_application_default_path() -> Result<PathBuf> {
    let mut path = env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|_| home_dir().map(|home| home.join(".local/state")))?;
    path.push("tock");

    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v.into()),
    }
}

pub fn home_dir() -> Result<PathBuf> {
    #[cfg(windows)]
    let variable = "USERPROFILE";
    #[cfg(not(windows))]
    let variable = "HOME";

    env::var(variable)
        .map(PathBuf::from)
        .map_err(|_| anyhow!("Couldn't find home directory, {variable} is not set"))
}
