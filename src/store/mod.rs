//! Whole-file snapshot persistence.
//!
//! Each registry serializes its complete map of records to a single JSON
//! file after every successful mutation; the chat server keeps one file
//! per room plus a room-name index. Writes go to a temp file and are
//! renamed into place, so a crash never leaves a half-written snapshot.
//!
//! Bootstrap never fails: a missing file is an empty registry, a corrupt
//! file is logged and treated as empty, and a legacy list-shaped snapshot
//! is converted into the canonical map keyed by each record's natural key.

use crate::model::{ChatMessage, Mentor, Project, Team};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const TEAMS_FILE: &str = "teams.json";
pub const PROJECTS_FILE: &str = "projects.json";
pub const MENTORS_FILE: &str = "mentors.json";
pub const CHAT_DIR: &str = "chat";
pub const CHAT_INDEX_FILE: &str = "index.json";

/// The key a legacy list entry is filed under when converting to a map.
pub trait NaturalKey {
    fn natural_key(&self) -> String;
}

impl NaturalKey for Team {
    fn natural_key(&self) -> String {
        self.name.clone()
    }
}

impl NaturalKey for Project {
    fn natural_key(&self) -> String {
        self.team_name.clone()
    }
}

impl NaturalKey for Mentor {
    fn natural_key(&self) -> String {
        self.id.clone()
    }
}

/// Per-file record counts, for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistInfo {
    pub teams: usize,
    pub projects: usize,
    pub mentors: usize,
    pub rooms: usize,
}

/// Snapshot directory handle. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    base: PathBuf,
}

impl SnapshotStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Write a registry map snapshot.
    pub async fn write_map<T: Serialize>(
        &self,
        file: &str,
        map: &HashMap<String, T>,
    ) -> io::Result<()> {
        let bytes = serde_json::to_vec_pretty(map)?;
        self.write_file(&self.base.join(file), bytes).await
    }

    /// Read a registry map snapshot.
    ///
    /// Accepts the canonical map form or a legacy list, converting the
    /// list into a map keyed by each entry's natural key. Missing or
    /// corrupt files yield an empty map.
    pub async fn read_map<T>(&self, file: &str) -> HashMap<String, T>
    where
        T: DeserializeOwned + NaturalKey,
    {
        let path = self.base.join(file);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return HashMap::new(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "snapshot read failed, starting empty");
                return HashMap::new();
            }
        };

        if let Ok(map) = serde_json::from_slice::<HashMap<String, T>>(&bytes) {
            return map;
        }

        // Legacy snapshots stored an ordered list of records.
        match serde_json::from_slice::<Vec<T>>(&bytes) {
            Ok(list) => {
                debug!(path = %path.display(), "converted legacy list snapshot");
                list.into_iter()
                    .map(|entry| (entry.natural_key(), entry))
                    .collect()
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "corrupt snapshot, starting empty");
                HashMap::new()
            }
        }
    }

    /// Write one room's newest-first message history.
    pub async fn write_room(&self, room: &str, messages: &[ChatMessage]) -> io::Result<()> {
        let bytes = serde_json::to_vec_pretty(messages)?;
        let path = self.room_path(room);
        self.write_file(&path, bytes).await
    }

    /// Read one room's newest-first message history.
    pub async fn read_room(&self, room: &str) -> Vec<ChatMessage> {
        let path = self.room_path(room);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "room read failed, starting empty");
                return Vec::new();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(messages) => messages,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "corrupt room snapshot, starting empty");
                Vec::new()
            }
        }
    }

    /// Write the ordered room-name index.
    pub async fn write_room_index(&self, rooms: &[String]) -> io::Result<()> {
        let bytes = serde_json::to_vec_pretty(rooms)?;
        let path = self.base.join(CHAT_DIR).join(CHAT_INDEX_FILE);
        self.write_file(&path, bytes).await
    }

    /// Read the room-name index.
    pub async fn read_room_index(&self) -> Vec<String> {
        let path = self.base.join(CHAT_DIR).join(CHAT_INDEX_FILE);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "room index read failed");
                return Vec::new();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(rooms) => rooms,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "corrupt room index");
                Vec::new()
            }
        }
    }

    /// Delete the chat directory (all room files and the index).
    /// Succeeds unconditionally; the next room write recreates it.
    pub async fn clear_chat(&self) {
        let dir = self.base.join(CHAT_DIR);
        if let Err(err) = tokio::fs::remove_dir_all(&dir).await {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(dir = %dir.display(), error = %err, "chat dir removal failed");
            }
        }
    }

    /// Delete the whole snapshot directory and recreate it empty.
    /// Succeeds unconditionally.
    pub async fn clear_all(&self) {
        if let Err(err) = tokio::fs::remove_dir_all(&self.base).await {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(base = %self.base.display(), error = %err, "snapshot dir removal failed");
            }
        }
        if let Err(err) = tokio::fs::create_dir_all(&self.base).await {
            warn!(base = %self.base.display(), error = %err, "snapshot dir recreation failed");
        }
        info!(base = %self.base.display(), "snapshot directory cleared");
    }

    /// Per-file record counts. Shape-agnostic: counts map entries or list
    /// entries, whichever form the file holds.
    pub async fn persist_info(&self) -> PersistInfo {
        PersistInfo {
            teams: self.count_entries(&self.base.join(TEAMS_FILE)).await,
            projects: self.count_entries(&self.base.join(PROJECTS_FILE)).await,
            mentors: self.count_entries(&self.base.join(MENTORS_FILE)).await,
            rooms: self.read_room_index().await.len(),
        }
    }

    async fn count_entries(&self, path: &Path) -> usize {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(_) => return 0,
        };
        match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(serde_json::Value::Object(map)) => map.len(),
            Ok(serde_json::Value::Array(list)) => list.len(),
            _ => 0,
        }
    }

    fn room_path(&self, room: &str) -> PathBuf {
        self.base
            .join(CHAT_DIR)
            .join(format!("{}.json", sanitize_room_name(room)))
    }

    async fn write_file(&self, path: &Path, bytes: Vec<u8>) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Atomic write: write to temp file, then rename.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

/// Restrict room file names to `[A-Za-z0-9_-]` so arbitrary room names
/// cannot escape the chat directory.
pub fn sanitize_room_name(room: &str) -> String {
    room.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProjectCategory, Team};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_map_round_trip() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        let mut teams = HashMap::new();
        teams.insert("Alpha".to_string(), Team::new("Alpha", "AI"));
        teams.insert("Beta".to_string(), Team::new("Beta", "IoT"));
        store.write_map(TEAMS_FILE, &teams).await.unwrap();

        let loaded: HashMap<String, Team> = store.read_map(TEAMS_FILE).await;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["Alpha"].topic, "AI");
    }

    #[tokio::test]
    async fn test_legacy_list_snapshot_is_converted() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        let legacy = vec![Team::new("Alpha", "AI"), Team::new("Beta", "IoT")];
        let bytes = serde_json::to_vec(&legacy).unwrap();
        std::fs::write(dir.path().join(TEAMS_FILE), bytes).unwrap();

        let loaded: HashMap<String, Team> = store.read_map(TEAMS_FILE).await;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["Beta"].topic, "IoT");
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_yields_empty() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        std::fs::write(dir.path().join(TEAMS_FILE), b"{not json").unwrap();

        let loaded: HashMap<String, Team> = store.read_map(TEAMS_FILE).await;
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_missing_snapshot_yields_empty() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let loaded: HashMap<String, Team> = store.read_map(TEAMS_FILE).await;
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_room_round_trip_and_index() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        let messages = vec![
            ChatMessage::new("general", "ana", "dos"),
            ChatMessage::new("general", "ana", "uno"),
        ];
        store.write_room("general", &messages).await.unwrap();
        store
            .write_room_index(&["general".to_string()])
            .await
            .unwrap();

        let loaded = store.read_room("general").await;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].content, "dos");
        assert_eq!(store.read_room_index().await, vec!["general".to_string()]);
    }

    #[tokio::test]
    async fn test_clear_all_recreates_empty_dir() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("snaps"));

        let mut projects = HashMap::new();
        projects.insert(
            "Alpha".to_string(),
            crate::model::Project::new("Alpha", "app", ProjectCategory::Social),
        );
        store.write_map(PROJECTS_FILE, &projects).await.unwrap();

        store.clear_all().await;
        assert!(store.base().exists());
        let info = store.persist_info().await;
        assert_eq!(info, PersistInfo::default());
    }

    #[tokio::test]
    async fn test_persist_info_counts() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        let mut teams = HashMap::new();
        teams.insert("Alpha".to_string(), Team::new("Alpha", "AI"));
        store.write_map(TEAMS_FILE, &teams).await.unwrap();
        store
            .write_room_index(&["general".to_string(), "dev".to_string()])
            .await
            .unwrap();

        let info = store.persist_info().await;
        assert_eq!(info.teams, 1);
        assert_eq!(info.projects, 0);
        assert_eq!(info.rooms, 2);
    }

    #[test]
    fn test_sanitize_room_name() {
        assert_eq!(sanitize_room_name("general"), "general");
        assert_eq!(sanitize_room_name("Room 1"), "Room_1");
        assert_eq!(sanitize_room_name("../evil"), "___evil");
    }
}
