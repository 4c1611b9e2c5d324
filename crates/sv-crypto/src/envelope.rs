//! Envelope codec: the persisted form of one encryption result.
//!
//! Binary layout (then base64, standard alphabet, padded, no line breaks):
//! ```text
//! [4 bytes: IV length, big-endian u32][IV bytes][ciphertext || 16-byte GCM tag]
//! ```
//!
//! Stored records depend on this exact layout; changing it makes existing
//! vaults unreadable.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;

use sv_core::{VaultError, VaultResult};

const LEN_PREFIX: usize = 4;

/// IV plus ciphertext-with-tag produced by a single seal.
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    pub iv: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    pub fn new(iv: Vec<u8>, ciphertext: Vec<u8>) -> Self {
        Self { iv, ciphertext }
    }

    /// Serialize to `u32_be(len(iv)) || iv || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        // an IV over 4 GiB cannot be framed; saturate so decode rejects it
        let iv_len = u32::try_from(self.iv.len()).unwrap_or(u32::MAX);
        let mut out = Vec::with_capacity(LEN_PREFIX + self.iv.len() + self.ciphertext.len());
        out.extend_from_slice(&iv_len.to_be_bytes());
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Parse the binary layout. Everything after the IV is ciphertext,
    /// which may be empty.
    pub fn from_bytes(data: &[u8]) -> VaultResult<Self> {
        if data.len() < LEN_PREFIX {
            return Err(VaultError::MalformedEnvelope(format!(
                "{} bytes is too short for the IV length prefix",
                data.len()
            )));
        }

        let (prefix, rest) = data.split_at(LEN_PREFIX);
        let mut len_bytes = [0u8; LEN_PREFIX];
        len_bytes.copy_from_slice(prefix);
        let iv_len = u32::from_be_bytes(len_bytes) as usize;

        if iv_len > rest.len() {
            return Err(VaultError::MalformedEnvelope(format!(
                "IV length {iv_len} exceeds remaining {} bytes",
                rest.len()
            )));
        }

        let (iv, ciphertext) = rest.split_at(iv_len);
        Ok(Self {
            iv: iv.to_vec(),
            ciphertext: ciphertext.to_vec(),
        })
    }

    /// Text form stored in `VaultRecord::encrypted_content`.
    pub fn encode(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    pub fn decode(text: &str) -> VaultResult<Self> {
        let data = STANDARD
            .decode(text.trim())
            .map_err(|e| VaultError::MalformedEnvelope(format!("invalid base64: {e}")))?;
        Self::from_bytes(&data)
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("iv_len", &self.iv.len())
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}
