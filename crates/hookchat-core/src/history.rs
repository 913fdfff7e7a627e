//! Local conversation history

use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;

/// Who wrote a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// One stored message. Stored entries may be incomplete, so every field
/// except the id tolerates being missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_role")]
    pub role: Option<Role>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub session_id: String,
}

impl HistoryEntry {
    /// A new entry stamped now
    pub fn new(text: impl Into<String>, role: Role, session_id: impl Into<String>) -> Self {
        Self::at(text, role, session_id, chrono::Utc::now())
    }

    /// A new entry with an explicit timestamp
    pub fn at(
        text: impl Into<String>,
        role: Role,
        session_id: impl Into<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            role: Some(role),
            timestamp: timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            session_id: session_id.into(),
        }
    }

    /// Entries without text, role or session are never shown
    pub fn is_valid(&self) -> bool {
        !self.text.is_empty() && self.role.is_some() && !self.session_id.is_empty()
    }
}

fn lenient_role<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Role>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value.as_ref().and_then(serde_json::Value::as_str) {
        Some("user") => Some(Role::User),
        Some("agent") => Some(Role::Agent),
        _ => None,
    })
}

/// The entries of one session that can be shown, oldest first
pub fn restore_view<'a>(entries: &'a [HistoryEntry], session_id: &str) -> Vec<&'a HistoryEntry> {
    entries
        .iter()
        .filter(|e| e.is_valid() && e.session_id == session_id)
        .collect()
}

/// Persistent storage for history entries
pub trait HistoryStore: Send {
    fn load_all(&self) -> Result<Vec<HistoryEntry>>;

    fn replace_all(&mut self, entries: Vec<HistoryEntry>) -> Result<()>;

    fn clear(&mut self) -> Result<()>;

    /// Record a message. Empty text is never stored.
    fn append(&mut self, text: &str, role: Role, session_id: &str) -> Result<Option<HistoryEntry>> {
        if text.is_empty() {
            tracing::debug!("not recording empty history entry");
            return Ok(None);
        }
        let entry = HistoryEntry::new(text, role, session_id);
        let mut all = self.load_all()?;
        all.push(entry.clone());
        self.replace_all(all)?;
        Ok(Some(entry))
    }

    /// Drop corrupt entries from the store. Returns how many were removed.
    fn prune_corrupt(&mut self) -> Result<usize> {
        let all = self.load_all()?;
        let before = all.len();
        let kept: Vec<HistoryEntry> = all.into_iter().filter(HistoryEntry::is_valid).collect();
        let removed = before - kept.len();
        if removed > 0 {
            tracing::warn!(removed, "removed invalid history entries");
            self.replace_all(kept)?;
        }
        Ok(removed)
    }
}

/// In-memory history. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    entries: Arc<Mutex<Vec<HistoryEntry>>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<HistoryEntry>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(entries)),
        }
    }

    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.lock().clone()
    }
}

impl HistoryStore for MemoryHistory {
    fn load_all(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.entries.lock().clone())
    }

    fn replace_all(&mut self, entries: Vec<HistoryEntry>) -> Result<()> {
        *self.entries.lock() = entries;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.lock().clear();
        Ok(())
    }
}

/// History kept as a JSON array on disk
#[derive(Debug, Clone)]
pub struct FileHistory {
    path: PathBuf,
}

impl FileHistory {
    /// Default location in the user's local data directory
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hookchat")
            .join("history.json")
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for FileHistory {
    fn load_all(&self) -> Result<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                tracing::warn!("Failed to parse history file {}: {}", self.path.display(), e);
                Ok(Vec::new())
            }
        }
    }

    fn replace_all(&mut self, entries: Vec<HistoryEntry>) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(&entries)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
