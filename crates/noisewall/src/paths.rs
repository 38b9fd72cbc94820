use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "NOISEWALL_CONFIG_DIR";
pub const CONFIG_FILE_NAME: &str = "noisewall.toml";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "Noisewall";
const APPLICATION: &str = "Noisewall";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        Self::resolve(env_override(ENV_CONFIG_DIR))
    }

    fn resolve(config_override: Option<PathBuf>) -> Result<Self> {
        if let Some(config_dir) = config_override {
            return Ok(Self { config_dir });
        }

        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(Self {
            config_dir: project_dirs.config_dir().to_path_buf(),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_dir_takes_precedence() {
        let root = tempfile::tempdir().unwrap();
        let paths = AppPaths::resolve(Some(root.path().to_path_buf())).unwrap();
        assert_eq!(paths.config_dir(), root.path());
        assert_eq!(paths.config_file(), root.path().join("noisewall.toml"));
    }

    #[test]
    fn project_dirs_hold_the_config_file() {
        // Hosts without a home directory have no project dirs.
        if let Ok(paths) = AppPaths::resolve(None) {
            assert!(paths.config_file().ends_with(CONFIG_FILE_NAME));
        }
    }
}
