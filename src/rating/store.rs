use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Somewhere a serialized rating ledger can be kept between runs.
pub trait Store {
    /// Stored contents, `None` when nothing was saved yet.
    fn read(&self) -> Result<Option<String>>;

    /// Replace the stored contents as a whole.
    fn write(&self, contents: &str) -> Result<()>;

    fn location(&self) -> String;
}

/// Load a value, falling back to its default when the store is empty,
/// unreadable or holds something that doesn't parse.
pub fn load<T: DeserializeOwned + Default>(store: &dyn Store) -> T {
    let contents = match store.read() {
        Ok(Some(contents)) => contents,
        Ok(None) => return T::default(),
        Err(err) => {
            log::warn!("Could not read {}: {:#}. Starting fresh", store.location(), err);
            return T::default();
        }
    };

    match serde_json::from_str(&contents) {
        Ok(value) => value,
        Err(err) => {
            log::warn!("Malformed data in {}: {}. Starting fresh", store.location(), err);
            T::default()
        }
    }
}

pub fn save<T: Serialize>(store: &dyn Store, value: &T) -> Result<()> {
    let contents = serde_json::to_string_pretty(value)?;
    store.write(&contents)
}

/// Pretty printed JSON on disk. Writes go to a sibling temp file first and
/// then get renamed over the target.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Store for JsonFileStore {
    fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("reading {}", self.path.display())),
        }
    }

    fn write(&self, contents: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    contents: std::sync::Mutex<Option<String>>,
}

#[cfg(test)]
impl Store for MemoryStore {
    fn read(&self) -> Result<Option<String>> {
        let contents = self.contents.lock().map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(contents.clone())
    }

    fn write(&self, contents: &str) -> Result<()> {
        let mut slot = self.contents.lock().map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        *slot = Some(contents.to_string());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
