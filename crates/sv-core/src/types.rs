use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Kind of item stored in the vault.
///
/// The persisted and user-facing form is the display string. Parsing is
/// lenient: anything unrecognized becomes [`Category::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    IdCard,
    Password,
    Note,
    Receipt,
    Photo,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::IdCard,
        Category::Password,
        Category::Note,
        Category::Receipt,
        Category::Photo,
        Category::Other,
    ];

    /// Stable display string for this category.
    pub fn display_name(self) -> &'static str {
        match self {
            Category::IdCard => "ID Card",
            Category::Password => "Password",
            Category::Note => "Secure Note",
            Category::Receipt => "Receipt",
            Category::Photo => "Photo",
            Category::Other => "Other",
        }
    }

    /// Parse a display string; unknown strings map to `Other`.
    pub fn from_display_name(name: &str) -> Category {
        Category::ALL
            .into_iter()
            .find(|c| c.display_name() == name)
            .unwrap_or(Category::Other)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.display_name())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Category::from_display_name(&name))
    }
}

/// Opaque record key assigned by the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Placeholder id for records not yet inserted.
    pub const UNASSIGNED: RecordId = RecordId(0);

    pub fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored vault item.
///
/// Only `encrypted_content` holds sensitive data (envelope text form);
/// `title` and `category` stay in clear so listings never need a decrypt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultRecord {
    pub id: RecordId,
    pub title: String,
    pub encrypted_content: String,
    pub category: Category,
    /// Added after the first schema version; absent in older data.
    #[serde(default)]
    pub attached_image_ref: Option<PathBuf>,
    /// Unix epoch milliseconds
    pub created_at: u64,
    /// Unix epoch milliseconds
    pub updated_at: u64,
}

impl VaultRecord {
    /// Build an unassigned record stamped with the current time.
    pub fn new(title: impl Into<String>, encrypted_content: String, category: Category) -> Self {
        let now = now_millis();
        Self {
            id: RecordId::UNASSIGNED,
            title: title.into(),
            encrypted_content,
            category,
            attached_image_ref: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Current wall-clock time as Unix epoch milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
