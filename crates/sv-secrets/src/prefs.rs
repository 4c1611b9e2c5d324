//! Key-value namespace backing the credential store.
//!
//! Values are strings; booleans are stored as `"true"` / `"false"`.
//! `apply` takes a batch so related keys (a new password hash and the
//! cleared first-launch flag) land together where the backend allows it.

use anyhow::Context;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sv_core::{VaultError, VaultResult};

/// One change inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefEdit {
    Put(&'static str, String),
}

pub trait PrefsBackend: Send + Sync {
    fn get(&self, key: &str) -> VaultResult<Option<String>>;

    fn apply(&self, edits: &[PrefEdit]) -> VaultResult<()>;
}

fn apply_to_map(map: &mut BTreeMap<String, String>, edits: &[PrefEdit]) {
    for edit in edits {
        match edit {
            PrefEdit::Put(key, value) => {
                map.insert((*key).to_owned(), value.clone());
            }
        }
    }
}

fn poisoned() -> VaultError {
    VaultError::Credentials("preferences mutex poisoned".into())
}

/// In-memory namespace (tests, ephemeral sessions).
#[derive(Debug, Default)]
pub struct MemoryPrefs {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryPrefs {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrefsBackend for MemoryPrefs {
    fn get(&self, key: &str) -> VaultResult<Option<String>> {
        Ok(self.entries.lock().map_err(|_| poisoned())?.get(key).cloned())
    }

    fn apply(&self, edits: &[PrefEdit]) -> VaultResult<()> {
        apply_to_map(&mut *self.entries.lock().map_err(|_| poisoned())?, edits);
        Ok(())
    }
}

/// JSON-file namespace, loaded once and rewritten atomically on each batch.
///
/// At-rest protection of the file (disk encryption, platform-encrypted
/// preferences) is provided outside this crate.
#[derive(Debug)]
pub struct FilePrefs {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FilePrefs {
    /// Open the file, starting empty if it does not exist yet.
    pub fn open(path: &Path) -> VaultResult<Self> {
        let entries = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading preferences: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing preferences: {}", path.display()))?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> VaultResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating prefs dir: {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(entries).context("serializing preferences")?;

        // Atomic write: write to temp file, then rename
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, json)
            .with_context(|| format!("writing preferences temp: {}", tmp_path.display()))?;
        restrict_permissions(&tmp_path)?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("renaming preferences: {}", self.path.display()))?;
        Ok(())
    }
}

impl PrefsBackend for FilePrefs {
    fn get(&self, key: &str) -> VaultResult<Option<String>> {
        Ok(self.entries.lock().map_err(|_| poisoned())?.get(key).cloned())
    }

    fn apply(&self, edits: &[PrefEdit]) -> VaultResult<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        let mut next = entries.clone();
        apply_to_map(&mut next, edits);
        self.flush(&next)?;
        *entries = next;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> VaultResult<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .with_context(|| format!("chmod 600: {}", path.display()))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> VaultResult<()> {
    Ok(())
}
