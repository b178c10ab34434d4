use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Durable key-value collaborator in the shape of browser local storage.
///
/// Persistence through this trait is best-effort everywhere in this crate:
/// callers log write failures and carry on with their in-memory state.
pub trait KeyValueStorage {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&mut self, key: &str);
}

impl KeyValueStorage for Box<dyn KeyValueStorage> {
    fn get_item(&self, key: &str) -> Option<String> {
        self.as_ref().get_item(key)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.as_mut().set_item(key, value)
    }

    fn remove_item(&mut self, key: &str) {
        self.as_mut().remove_item(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    Write { key: String, message: String },
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Write { key, message } => {
                write!(f, "failed to write storage key {key}: {message}")
            }
        }
    }
}

impl std::error::Error for StorageError {}

/// In-memory storage for tests and sessions without durability.
///
/// Keys are held in a `BTreeMap` for stable traversal order.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    items: BTreeMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) {
        self.items.remove(key);
    }
}

/// One file per key under a root directory.
///
/// Writes go through a temp file and a rename so a crash mid-write never
/// leaves a torn value behind. Unreadable or missing keys read as absent.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are logical names, not paths; flatten anything unsafe.
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{file_name}.json"))
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Some(value),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read storage key, treating as absent");
                None
            }
        }
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let write_err = |message: String| StorageError::Write {
            key: key.to_string(),
            message,
        };

        fs::create_dir_all(&self.root).map_err(|e| write_err(e.to_string()))?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|e| write_err(e.to_string()))?;
        fs::rename(&tmp, &path).map_err(|e| write_err(e.to_string()))?;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) {
        if let Err(e) = fs::remove_file(self.path_for(key)) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(key, error = %e, "failed to remove storage key");
            }
        }
    }
}
