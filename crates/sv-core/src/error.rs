use thiserror::Error;

use crate::types::RecordId;

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    /// The secure key store is locked, missing, or holds an unusable key.
    #[error("master key unavailable: {0}")]
    KeyUnavailable(String),

    /// AEAD tag check failed: tampered data or wrong key.
    #[error("cannot decrypt: authentication failed")]
    AuthenticationFailed,

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("decrypted content is not valid UTF-8")]
    NonUtf8Content,

    #[error("password cannot be empty")]
    EmptyInput,

    /// A required item field (title or content) was blank.
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),

    #[error("password must be at least {min} characters")]
    TooShort { min: usize },

    #[error("authentication failed")]
    AuthFailed,

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("biometric authentication failed: {0}")]
    Biometric(String),

    #[error("operation not permitted in auth state {0}")]
    InvalidState(&'static str),

    #[error("record not found: {0}")]
    NotFound(RecordId),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("credential store error: {0}")]
    Credentials(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VaultError {
    /// Rejections the user can recover from by re-entering input.
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            VaultError::EmptyInput
                | VaultError::EmptyField(_)
                | VaultError::TooShort { .. }
                | VaultError::AuthFailed
                | VaultError::PasswordMismatch
                | VaultError::Biometric(_)
        )
    }

    /// Errors meaning a stored record cannot be shown as plaintext.
    pub fn is_unreadable_content(&self) -> bool {
        matches!(
            self,
            VaultError::AuthenticationFailed
                | VaultError::MalformedEnvelope(_)
                | VaultError::NonUtf8Content
        )
    }
}
