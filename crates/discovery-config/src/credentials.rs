use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Default)]
struct CredentialsData {
    #[serde(flatten)]
    data: HashMap<String, String>,
}

pub struct CredentialStore {
    path: PathBuf,
    credentials: HashMap<String, String>,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            credentials: HashMap::new(),
        }
    }

    pub fn load(&mut self) -> Result<()> {
        if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)?;
            let creds_data: CredentialsData = toml::from_str(&content)?;
            self.credentials = creds_data.data;
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let creds_data = CredentialsData {
            data: self.credentials.clone(),
        };
        let content = toml::to_string_pretty(&creds_data)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.credentials.get(key)
    }

    pub fn set(&mut self, key: String, value: String) {
        self.credentials.insert(key, value);
    }

    pub fn remove(&mut self, key: &str) {
        self.credentials.remove(key);
    }

    pub fn get_tmdb_access_token(&self) -> Option<&String> {
        self.get("tmdb_access_token")
    }

    pub fn set_tmdb_access_token(&mut self, token: String) {
        self.set("tmdb_access_token".to_string(), token);
    }

    /// Uid of the last signed-in user, used to pick the per-user ledger
    pub fn get_current_user_id(&self) -> Option<&String> {
        self.get("current_user_id")
    }

    pub fn set_current_user_id(&mut self, uid: String) {
        self.set("current_user_id".to_string(), uid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_credential_store_load_and_save() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();

        let mut store = CredentialStore::new(path.clone());
        store.set_tmdb_access_token("test_token".to_string());
        store.set_current_user_id("uid-1".to_string());
        store.save().unwrap();

        let mut loaded_store = CredentialStore::new(path);
        loaded_store.load().unwrap();
        assert_eq!(loaded_store.get_tmdb_access_token(), Some(&"test_token".to_string()));
        assert_eq!(loaded_store.get_current_user_id(), Some(&"uid-1".to_string()));
    }

    #[test]
    fn test_credential_store_remove() {
        let mut store = CredentialStore::new(PathBuf::from("/tmp/test"));
        store.set("key1".to_string(), "value1".to_string());
        store.set("key2".to_string(), "value2".to_string());

        assert_eq!(store.get("key1"), Some(&"value1".to_string()));
        store.remove("key1");
        assert_eq!(store.get("key1"), None);
        assert_eq!(store.get("key2"), Some(&"value2".to_string()));
    }

    #[test]
    fn test_token_resolution_prefers_credentials_over_config() {
        let mut store = CredentialStore::new(PathBuf::from("/tmp/test"));
        let mut tmdb = crate::TmdbConfig::default();
        tmdb.access_token = Some("from_config".to_string());

        // The environment override is not set in tests
        if std::env::var(crate::TOKEN_ENV_VAR).is_err() {
            assert_eq!(tmdb.resolve_access_token(&store), Some("from_config".to_string()));
            store.set_tmdb_access_token("from_credentials".to_string());
            assert_eq!(tmdb.resolve_access_token(&store), Some("from_credentials".to_string()));
        }
    }
}
