use crate::core::channels::{ChannelSettings, ChannelSettingsError, ChannelSettingsStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

/// Per-channel settings kept in one JSON file, cached in memory.
pub struct JsonChannelSettingsStore {
    path: PathBuf,
    cache: RwLock<HashMap<String, ChannelSettings>>,
}

impl JsonChannelSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ChannelSettingsError> {
        let path = path.into();
        let map = if path.exists() {
            let file = std::fs::File::open(&path)?;
            serde_json::from_reader(file)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            cache: RwLock::new(map),
        })
    }

    async fn persist(&self) -> Result<(), ChannelSettingsError> {
        let cache = self.cache.read().await;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(&self.path)?;
        serde_json::to_writer_pretty(file, &*cache)?;
        Ok(())
    }
}

#[async_trait]
impl ChannelSettingsStore for JsonChannelSettingsStore {
    async fn get(&self, channel: &str) -> Result<Option<ChannelSettings>, ChannelSettingsError> {
        let cache = self.cache.read().await;
        Ok(cache.get(channel).cloned())
    }

    async fn save(&self, settings: ChannelSettings) -> Result<(), ChannelSettingsError> {
        let mut cache = self.cache.write().await;
        cache.insert(settings.channel.clone(), settings);
        drop(cache);
        self.persist().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channels::{ChannelSettingsService, PrefixChange};

    #[tokio::test]
    async fn prefix_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonChannelSettingsStore::new(dir.path().join("channels.json")).unwrap();
        let service = ChannelSettingsService::new(store, "!");

        assert_eq!(service.prefix_for("general").await.unwrap(), "!");
        assert_eq!(
            service.set_prefix("general", "?").await.unwrap(),
            PrefixChange::Changed("?".into())
        );
        assert_eq!(service.prefix_for("general").await.unwrap(), "?");
        assert_eq!(service.prefix_for("other").await.unwrap(), "!");
        assert_eq!(
            service.set_prefix("general", "way too long").await.unwrap(),
            PrefixChange::Invalid
        );
        assert_eq!(service.prefix_for("general").await.unwrap(), "?");
    }

    #[tokio::test]
    async fn settings_are_reloaded_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("channels.json");

        let store = JsonChannelSettingsStore::new(&path).unwrap();
        store
            .save(ChannelSettings {
                channel: "general".into(),
                prefix: "$".into(),
            })
            .await
            .unwrap();

        let reopened = JsonChannelSettingsStore::new(&path).unwrap();
        assert_eq!(reopened.get("general").await.unwrap().unwrap().prefix, "$");
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channels.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            JsonChannelSettingsStore::new(&path),
            Err(ChannelSettingsError::Serialization(_))
        ));
    }
}
