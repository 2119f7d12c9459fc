// src/core/persistence/store.rs

//! Implements the Durable Store (§4.A): loading and atomically saving the
//! three named shards (`users`, `messages`, `settings`) for one replica id.

use crate::core::errors::ChatError;
use crate::core::model::{Messages, Settings, User};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Reads and writes the three JSON shards for one replica under a
/// `database/` directory, named `users_<id>.json`, `messages_<id>.json`,
/// and `settings_<id>.json`.
#[derive(Debug, Clone)]
pub struct DurableStore {
    dir: PathBuf,
    replica_id: usize,
}

impl DurableStore {
    pub fn new(dir: impl Into<PathBuf>, replica_id: usize) -> Self {
        Self {
            dir: dir.into(),
            replica_id,
        }
    }

    fn users_path(&self) -> PathBuf {
        self.dir.join(format!("users_{}.json", self.replica_id))
    }

    fn messages_path(&self) -> PathBuf {
        self.dir.join(format!("messages_{}.json", self.replica_id))
    }

    fn settings_path(&self) -> PathBuf {
        self.dir.join(format!("settings_{}.json", self.replica_id))
    }

    /// Loads the three shards. If a shard is absent or malformed, substitutes
    /// a typed empty default and rewrites the file. Every user's
    /// `logged_in`/`live_addr` are reset on load, since sessions do not
    /// survive a restart.
    pub async fn load(
        &self,
        self_endpoint: &str,
    ) -> Result<(HashMap<String, User>, Messages, Settings), ChatError> {
        fs::create_dir_all(&self.dir).await?;

        let mut users = self
            .read_json_securely(&self.users_path(), HashMap::<String, User>::new())
            .await?;
        for user in users.values_mut() {
            user.logged_in = false;
            user.live_addr = None;
        }

        let messages = self
            .read_json_securely(&self.messages_path(), Messages::default())
            .await?;

        let settings = self
            .read_json_securely(
                &self.settings_path(),
                Settings {
                    counter: 0,
                    self_endpoint: self_endpoint.to_string(),
                },
            )
            .await?;

        Ok((users, messages, settings))
    }

    /// Loads a single JSON shard, falling back to (and persisting) a typed
    /// default when the file is absent or fails to parse.
    async fn read_json_securely<T>(&self, path: &Path, default: T) -> Result<T, ChatError>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
    {
        match fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => Ok(value),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "shard file is malformed, substituting a fresh default"
                    );
                    Self::write_atomically(path, &default).await?;
                    Ok(default)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "shard file absent, starting with a fresh default");
                Self::write_atomically(path, &default).await?;
                Ok(default)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Writes all three shards. Each is written to a temporary file and then
    /// atomically renamed over the destination, so a crash mid-write leaves
    /// the previous (or no) file readable rather than a half-written one.
    pub async fn save(
        &self,
        users: &HashMap<String, User>,
        messages: &Messages,
        settings: &Settings,
    ) -> Result<(), ChatError> {
        Self::write_atomically(&self.users_path(), users).await?;
        Self::write_atomically(&self.messages_path(), messages).await?;
        Self::write_atomically(&self.settings_path(), settings).await?;
        Ok(())
    }

    async fn write_atomically<T: serde::Serialize>(
        path: &Path,
        value: &T,
    ) -> Result<(), ChatError> {
        let temp_path = PathBuf::from(format!("{}.tmp.{}", path.display(), rand::random::<u32>()));

        let bytes = serde_json::to_vec(value)?;
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_on_a_fresh_directory_yields_typed_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = DurableStore::new(dir.path(), 0);

        let (users, messages, settings) = store.load("127.0.0.1:50000").await.unwrap();
        assert!(users.is_empty());
        assert!(messages.delivered.is_empty());
        assert_eq!(settings.counter, 0);
        assert_eq!(settings.self_endpoint, "127.0.0.1:50000");

        assert!(dir.path().join("users_0.json").exists());
        assert!(dir.path().join("messages_0.json").exists());
        assert!(dir.path().join("settings_0.json").exists());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = DurableStore::new(dir.path(), 1);

        let mut users = HashMap::new();
        users.insert(
            "alice".to_string(),
            User::new("alice".to_string(), "deadbeef".to_string()),
        );
        let messages = Messages::default();
        let settings = Settings {
            counter: 7,
            self_endpoint: "127.0.0.1:50001".to_string(),
        };

        store.save(&users, &messages, &settings).await.unwrap();

        let (loaded_users, _loaded_messages, loaded_settings) =
            store.load("127.0.0.1:50001").await.unwrap();
        assert!(loaded_users.contains_key("alice"));
        assert_eq!(loaded_settings.counter, 7);
    }

    #[tokio::test]
    async fn load_resets_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let store = DurableStore::new(dir.path(), 2);

        let mut alice = User::new("alice".to_string(), "deadbeef".to_string());
        alice.logged_in = true;
        alice.live_addr = Some("127.0.0.1:12345".to_string());
        let mut users = HashMap::new();
        users.insert("alice".to_string(), alice);

        store
            .save(&users, &Messages::default(), &Settings { counter: 0, self_endpoint: "x".into() })
            .await
            .unwrap();

        let (loaded_users, _, _) = store.load("x").await.unwrap();
        let alice = loaded_users.get("alice").unwrap();
        assert!(!alice.logged_in);
        assert!(alice.live_addr.is_none());
    }

    #[tokio::test]
    async fn malformed_shard_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path()).await.unwrap();
        fs::write(dir.path().join("users_3.json"), b"not json")
            .await
            .unwrap();

        let store = DurableStore::new(dir.path(), 3);
        let (users, _, _) = store.load("x").await.unwrap();
        assert!(users.is_empty());
    }
}
