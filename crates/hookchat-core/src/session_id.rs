//! Conversation session identifiers

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Supplies the id the webhook uses to tell conversations apart
pub trait SessionIdProvider: Send {
    /// The current id, stable across runs
    fn current(&self) -> &str;

    /// Replace the id with a fresh one and return it
    fn rotate(&mut self) -> Result<String>;
}

fn fresh_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Session id persisted in a small file
#[derive(Debug, Clone)]
pub struct FileSessionId {
    path: PathBuf,
    id: String,
}

impl FileSessionId {
    /// Default location in the user's local data directory
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hookchat")
            .join("session-id")
    }

    /// Read the stored id, creating and storing one if there is none
    pub fn load_or_create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let stored = match fs::read_to_string(&path) {
            Ok(content) => Some(content.trim().to_string()).filter(|s| !s.is_empty()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        match stored {
            Some(id) => {
                tracing::debug!(%id, "using stored session id");
                Ok(Self { path, id })
            }
            None => {
                let id = fresh_id();
                write_id(&path, &id)?;
                tracing::debug!(%id, "generated new session id");
                Ok(Self { path, id })
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_id(path: &Path, id: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, id)?;
    Ok(())
}

impl SessionIdProvider for FileSessionId {
    fn current(&self) -> &str {
        &self.id
    }

    fn rotate(&mut self) -> Result<String> {
        let id = fresh_id();
        write_id(&self.path, &id)?;
        self.id = id.clone();
        Ok(id)
    }
}

/// In-memory session id, for tests and ephemeral runs
#[derive(Debug, Clone)]
pub struct FixedSessionId {
    id: String,
}

impl FixedSessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// A random id
    pub fn random() -> Self {
        Self::new(fresh_id())
    }
}

impl SessionIdProvider for FixedSessionId {
    fn current(&self) -> &str {
        &self.id
    }

    fn rotate(&mut self) -> Result<String> {
        self.id = fresh_id();
        Ok(self.id.clone())
    }
}
