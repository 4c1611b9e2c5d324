//! Create, edit, open and delete vault items.
//!
//! Titles are stored in clear so they can be listed and searched; content
//! is sealed with the master key before it reaches the record store.
//! Opened plaintext is handed to the caller in a zeroizing buffer and never
//! cached here.

use std::path::PathBuf;
use zeroize::Zeroizing;

use sv_core::{now_millis, Category, RecordId, VaultError, VaultRecord, VaultResult};
use sv_crypto::EncryptionEngine;
use sv_store::SharedRecordStore;

use crate::auth::UnlockedSession;

/// Shown in place of content that cannot be decrypted.
pub const DECRYPTION_FAILED_PLACEHOLDER: &str = "[Decryption failed]";

#[derive(Debug)]
pub enum ItemContent {
    Readable(Zeroizing<String>),
    /// Content that failed to decrypt; holds the reason for logs.
    Unreadable(String),
}

impl ItemContent {
    /// Text for display: the plaintext, or the failure placeholder.
    pub fn display_text(&self) -> &str {
        match self {
            ItemContent::Readable(text) => text.as_str(),
            ItemContent::Unreadable(_) => DECRYPTION_FAILED_PLACEHOLDER,
        }
    }

    pub fn is_readable(&self) -> bool {
        matches!(self, ItemContent::Readable(_))
    }
}

#[derive(Debug)]
pub struct OpenedItem {
    pub record: VaultRecord,
    pub content: ItemContent,
}

#[derive(Clone)]
pub struct VaultItemService {
    store: SharedRecordStore,
    engine: EncryptionEngine,
}

impl VaultItemService {
    pub fn new(store: SharedRecordStore, engine: EncryptionEngine) -> Self {
        Self { store, engine }
    }

    /// Seal `content` and insert a new record. Title and content are
    /// trimmed and must not be blank.
    pub async fn add_item(
        &self,
        _session: &UnlockedSession,
        title: &str,
        content: &str,
        category: Category,
        image_ref: Option<PathBuf>,
    ) -> VaultResult<RecordId> {
        let (title, content) = validate(title, content)?;
        let sealed = self.engine.encrypt_text(content).await?;

        let mut record = VaultRecord::new(title, sealed, category);
        record.attached_image_ref = image_ref;
        let id = self.store.insert(record).await?;
        tracing::debug!(%id, %category, "vault item added");
        Ok(id)
    }

    /// Re-seal an existing record under a fresh nonce and bump `updated_at`.
    /// `created_at` and the attached image are kept.
    pub async fn update_item(
        &self,
        _session: &UnlockedSession,
        record: &VaultRecord,
        title: &str,
        content: &str,
        category: Category,
    ) -> VaultResult<()> {
        let (title, content) = validate(title, content)?;
        let sealed = self.engine.encrypt_text(content).await?;

        let updated = VaultRecord {
            title: title.to_owned(),
            encrypted_content: sealed,
            category,
            updated_at: now_millis().max(record.updated_at),
            ..record.clone()
        };
        self.store.update(updated).await?;
        tracing::debug!(id = %record.id, "vault item updated");
        Ok(())
    }

    pub async fn delete_item(&self, _session: &UnlockedSession, id: RecordId) -> VaultResult<()> {
        self.store.delete(id).await?;
        tracing::debug!(%id, "vault item deleted");
        Ok(())
    }

    /// Fetch a record and decrypt its content. A record whose content
    /// cannot be decrypted still opens, with [`ItemContent::Unreadable`].
    pub async fn load_item(
        &self,
        _session: &UnlockedSession,
        id: RecordId,
    ) -> VaultResult<Option<OpenedItem>> {
        let Some(record) = self.store.get(id).await? else {
            return Ok(None);
        };

        let content = match self.engine.decrypt_text(&record.encrypted_content).await {
            Ok(text) => ItemContent::Readable(text),
            Err(e) if e.is_unreadable_content() => {
                tracing::warn!(%id, error = %e, "vault item content unreadable");
                ItemContent::Unreadable(e.to_string())
            }
            Err(e) => return Err(e),
        };
        Ok(Some(OpenedItem { record, content }))
    }
}

impl std::fmt::Debug for VaultItemService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultItemService").finish_non_exhaustive()
    }
}

fn validate<'a>(title: &'a str, content: &'a str) -> VaultResult<(&'a str, &'a str)> {
    let title = title.trim();
    let content = content.trim();
    if title.is_empty() {
        return Err(VaultError::EmptyField("title"));
    }
    if content.is_empty() {
        return Err(VaultError::EmptyField("content"));
    }
    Ok((title, content))
}
