use anyhow::Result;
use discovery_models::CurrentUser;
use std::path::{Path, PathBuf};

/// Get the container base path from environment variable, defaulting to "/app"
pub fn container_base_path() -> PathBuf {
    std::env::var("REELSWIPE_BASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/app"))
}

pub struct PathManager {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl PathManager {
    pub fn new() -> Result<Self> {
        let base_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("reelswipe");

        Ok(Self::with_base(base_dir))
    }

    pub fn from_docker_env() -> Self {
        // Config files at base level, data in a subdir
        Self::with_base(container_base_path())
    }

    /// Lay everything out below an explicit directory
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            config_dir: base.clone(),
            data_dir: base.join("data"),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.config_dir.join("credentials.toml")
    }

    pub fn watermarks_file(&self) -> PathBuf {
        self.cache_dir().join("watermarks.json")
    }

    /// Visited-item ledger, scoped per user when one is signed in
    pub fn ledger_file(&self, user: Option<&CurrentUser>) -> PathBuf {
        match user {
            Some(user) => self.data_dir.join(format!("visited-{}.bin", user.scope_key())),
            None => self.data_dir.join("visited.bin"),
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.cache_dir())?;
        Ok(())
    }
}

impl Default for PathManager {
    fn default() -> Self {
        // The container base directory only exists inside the image
        let base = container_base_path();
        if base.exists() {
            return Self::from_docker_env();
        }

        Self::new().unwrap_or_else(|_| Self::from_docker_env())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_below_base() {
        let paths = PathManager::with_base("/tmp/reelswipe-test");
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/reelswipe-test/config.toml"));
        assert_eq!(
            paths.watermarks_file(),
            PathBuf::from("/tmp/reelswipe-test/data/cache/watermarks.json")
        );
        assert_eq!(paths.ledger_file(None), PathBuf::from("/tmp/reelswipe-test/data/visited.bin"));
    }

    #[test]
    fn test_ledger_file_is_user_scoped() {
        let paths = PathManager::with_base("/tmp/reelswipe-test");
        let user = CurrentUser::new("user:42");
        assert_eq!(
            paths.ledger_file(Some(&user)),
            PathBuf::from("/tmp/reelswipe-test/data/visited-user_42.bin")
        );
    }

    #[test]
    fn test_ensure_directories() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathManager::with_base(dir.path());
        paths.ensure_directories().unwrap();
        assert!(paths.cache_dir().is_dir());
        assert!(paths.data_dir().is_dir());
    }
}
