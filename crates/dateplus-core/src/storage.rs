use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub const PINNED_DAYS_KEY: &str = "pinnedDays";
pub const SLOT_DAY_INFOS_KEY: &str = "dayInfos";
pub const LEGACY_DAYS_TO_ADD_KEY: &str = "daysToAdd";
pub const LEGACY_INCLUDE_FIRST_DAY_KEY: &str = "includeFirstDay";

pub const APP_NAMESPACE: &str = "app";
pub const DEFAULT_GROUP_NAMESPACE: &str = "group.dateplus";

/// Synchronous key-value storage shared between surfaces.
///
/// Each write is atomic for its key. There is no transaction spanning
/// several keys.
pub trait SharedStorage {
    fn read(&self, key: &str) -> anyhow::Result<Option<Value>>;

    fn write(&self, key: &str, value: &Value) -> anyhow::Result<()>;

    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

impl<S: SharedStorage + ?Sized> SharedStorage for &S {
    fn read(&self, key: &str) -> anyhow::Result<Option<Value>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &Value) -> anyhow::Result<()> {
        (**self).write(key, value)
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        (**self).remove(key)
    }
}

/// One JSON document per key inside a namespace directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    #[tracing::instrument(skip(dir))]
    pub fn open(dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        debug!(dir = %dir.display(), "opened storage namespace");
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> anyhow::Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(anyhow!("invalid storage key: {key:?}"));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl SharedStorage for FileStorage {
    #[tracing::instrument(skip(self))]
    fn read(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let path = self.key_path(key)?;
        if !path.exists() {
            debug!(file = %path.display(), "storage key not present");
            return Ok(None);
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        if raw.trim().is_empty() {
            return Ok(None);
        }

        let value = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", path.display()))?;
        Ok(Some(value))
    }

    #[tracing::instrument(skip(self, value))]
    fn write(&self, key: &str, value: &Value) -> anyhow::Result<()> {
        let path = self.key_path(key)?;
        debug!(file = %path.display(), "writing storage key atomically");

        let serialized = serde_json::to_string(value)
            .with_context(|| format!("failed serializing {}", path.display()))?;
        let mut temp = NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("failed creating temp file for {}", path.display()))?;
        writeln!(temp, "{serialized}")
            .and_then(|()| temp.flush())
            .with_context(|| format!("failed writing {}", path.display()))?;

        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let path = self.key_path(key)?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("failed removing {}", path.display()))?;
        }
        Ok(())
    }
}

/// In-process storage for tests and previews.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<BTreeMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        Self {
            entries: RefCell::new(entries.into_iter().collect()),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }
}

impl SharedStorage for MemoryStorage {
    fn read(&self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn write(&self, key: &str, value: &Value) -> anyhow::Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// The two namespaces under a data directory: `app` for data only the
/// main surfaces read, and a group namespace the widget surfaces share.
#[derive(Debug)]
pub struct Namespaces {
    pub data_dir: PathBuf,
    pub app: FileStorage,
    pub group: FileStorage,
}

impl Namespaces {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path, group_name: &str) -> anyhow::Result<Self> {
        if group_name.is_empty() || group_name.contains(['/', '\\']) || group_name == APP_NAMESPACE
        {
            return Err(anyhow!("invalid storage group name: {group_name:?}"));
        }

        let data_dir = data_dir.to_path_buf();
        let app = FileStorage::open(&data_dir.join(APP_NAMESPACE))?;
        let group = FileStorage::open(&data_dir.join(group_name))?;

        info!(
            data_dir = %data_dir.display(),
            app = %app.dir().display(),
            group = %group.dir().display(),
            "opened storage namespaces"
        );

        Ok(Self {
            data_dir,
            app,
            group,
        })
    }
}
