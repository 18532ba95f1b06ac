//! Field-level encryption for note titles and contents.
//!
//! Values are sealed with AES-256-CBC (PKCS#7 padding) under a fresh random IV and stored as
//! `enc:v1:<ivHex>:<cipherHex>`. Reads tolerate rows written before encryption existed, as well
//! as the older untagged `<ivHex>:<cipherHex>` form.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::{rngs::OsRng, RngCore};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::notes::{Note, NoteRow};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

pub const ENVELOPE_PREFIX: &str = "enc:v1:";

pub type Result<T> = std::result::Result<T, CryptoError>;

#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    #[error("random generator failure: {0}")]
    Rng(#[from] rand::Error),
    #[error("malformed envelope")]
    MalformedEnvelope,
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("decryption failed")]
    Decrypt,
    #[error("decrypted value is not utf-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("content serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct FieldCipher {
    key: [u8; KEY_LEN],
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher").field("key", &"[redacted]").finish()
    }
}

impl FieldCipher {
    /// A secret of exactly 32 bytes is used as the key, anything else is hashed with SHA-256.
    pub fn new(secret: &str) -> Self {
        let bytes = secret.as_bytes();
        let key: [u8; KEY_LEN] = match bytes.try_into() {
            Ok(key) => key,
            Err(_) => Sha256::digest(bytes).into(),
        };
        Self { key }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let mut iv = [0u8; IV_LEN];
        OsRng.try_fill_bytes(&mut iv)?;

        let ciphertext =
            Aes256CbcEnc::new(&self.key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        Ok(format!("{ENVELOPE_PREFIX}{}:{}", hex::encode(iv), hex::encode(ciphertext)))
    }

    /// Lenient decryption for read paths: values that are not envelopes are returned as-is, and
    /// envelopes that fail to decrypt are logged and returned unchanged.
    pub fn decrypt(&self, token: &str) -> String {
        if !is_sealed(token) && !looks_like_legacy_envelope(token) {
            return token.to_owned();
        }

        match self.try_decrypt(token) {
            Ok(plaintext) => plaintext,
            Err(error) => {
                tracing::warn!("unable to decrypt field, returning stored value: {error}");
                token.to_owned()
            }
        }
    }

    pub fn try_decrypt(&self, token: &str) -> Result<String> {
        let body = token.strip_prefix(ENVELOPE_PREFIX).unwrap_or(token);
        let (iv_hex, cipher_hex) = split_envelope(body).ok_or(CryptoError::MalformedEnvelope)?;

        let iv: [u8; IV_LEN] = hex::decode(iv_hex)?
            .try_into()
            .map_err(|_| CryptoError::MalformedEnvelope)?;
        let ciphertext = hex::decode(cipher_hex)?;

        let plaintext = Aes256CbcDec::new(&self.key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| CryptoError::Decrypt)?;

        Ok(String::from_utf8(plaintext)?)
    }

    pub fn encrypt_note(&self, note: &Note) -> Result<NoteRow> {
        Ok(NoteRow {
            id: note.id.clone(),
            user_id: note.user_id.clone(),
            kind: note.kind.clone(),
            title: self.encrypt(&note.title)?,
            content: self.encrypt_content(&note.content)?,
            color: note.color.clone(),
            created_at: note.created_at,
            updated_at: note.updated_at,
        })
    }

    pub fn decrypt_note(&self, row: NoteRow) -> Note {
        Note {
            title: self.decrypt(&row.title),
            content: self.decrypt_content(&row.content),
            id: row.id,
            user_id: row.user_id,
            kind: row.kind,
            color: row.color,
            created_at: row.created_at,
            updated_at: row.updated_at,
            sync_status: None,
        }
    }

    pub fn encrypt_notes(&self, notes: &[Note]) -> Result<Vec<NoteRow>> {
        notes.iter().map(|note| self.encrypt_note(note)).collect()
    }

    pub fn decrypt_notes(&self, rows: Vec<NoteRow>) -> Vec<Note> {
        rows.into_iter().map(|row| self.decrypt_note(row)).collect()
    }

    pub fn encrypt_content(&self, content: &Value) -> Result<String> {
        self.encrypt(&serde_json::to_string(content)?)
    }

    /// Content that does not parse as JSON after decryption is legacy plain text.
    pub fn decrypt_content(&self, stored: &str) -> Value {
        let plaintext = self.decrypt(stored);
        serde_json::from_str(&plaintext).unwrap_or(Value::String(plaintext))
    }
}

pub fn is_sealed(value: &str) -> bool {
    value.starts_with(ENVELOPE_PREFIX)
}

fn split_envelope(body: &str) -> Option<(&str, &str)> {
    let mut parts = body.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(iv), Some(cipher), None) if !iv.is_empty() && !cipher.is_empty() => Some((iv, cipher)),
        _ => None,
    }
}

/// Untagged `<ivHex>:<cipherHex>` values written before envelopes were versioned.
pub(crate) fn looks_like_legacy_envelope(value: &str) -> bool {
    let is_hex = |s: &str| s.bytes().all(|b| b.is_ascii_hexdigit());
    split_envelope(value).is_some_and(|(iv, cipher)| {
        iv.len() == IV_LEN * 2 && is_hex(iv) && cipher.len() % 32 == 0 && is_hex(cipher)
    })
}
