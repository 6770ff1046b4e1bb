//! Credential envelope encryption (spec.md §6, §9 "Credential encryption").
//!
//! Stored credential strings (the `webCredentials` map on [`crate::domain::Permissions`],
//! provider API keys) are wrapped in a stable `encwc.v1:<iv>:<tag>:<ciphertext>` envelope —
//! AES-256-GCM with a 12-byte IV and 16-byte tag, all three fields base64url-encoded, key
//! derived from `AGENT_CREDENTIALS_ENCRYPTION_KEY` via scrypt, simplified to a single
//! process-wide key since spec.md §6 fixes one literal prefix rather than a key-rotation
//! scheme.
//!
//! The stable prefix lets mixed plaintext (legacy rows) and encrypted data migrate lazily on
//! read: [`decrypt`] returns a string unchanged when it isn't a recognized envelope.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use scrypt::Params;
use thiserror::Error;

pub const ENVELOPE_PREFIX: &str = "encwc.v1:";

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;
/// Fixed, well-known salt: the KDF input is already a high-entropy process secret
/// (`AGENT_CREDENTIALS_ENCRYPTION_KEY`), so a per-value salt buys nothing and would have to be
/// persisted alongside the envelope; scrypt's cost factor is the thing doing the real work here.
const KDF_SALT: &str = "optimaizer-credential-envelope-v1";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),
    #[error("malformed envelope")]
    MalformedEnvelope,
    #[error("decryption failed")]
    DecryptionFailed,
}

/// Derives a 32-byte AES key from the process secret via scrypt.
fn derive_key(secret: &str) -> Result<[u8; 32], CryptoError> {
    let params = Params::new(15, 8, 1, 32).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let mut out = [0u8; 32];
    scrypt::scrypt(secret.as_bytes(), KDF_SALT.as_bytes(), &params, &mut out)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    Ok(out)
}

fn cipher_from_secret(secret: &str) -> Result<Aes256Gcm, CryptoError> {
    let key = derive_key(secret)?;
    Aes256Gcm::new_from_slice(&key).map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

/// Encrypts `plaintext` into an `encwc.v1:<iv>:<tag>:<ciphertext>` envelope, each segment
/// base64url (no padding) encoded.
pub fn encrypt(plaintext: &str, secret: &str) -> Result<String, CryptoError> {
    let cipher = cipher_from_secret(secret)?;

    let mut iv_bytes = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv_bytes);
    let nonce = Nonce::from_slice(&iv_bytes);

    let mut sealed = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| CryptoError::DecryptionFailed)?;
    // aes-gcm appends the 16-byte tag to the ciphertext; split it out so the envelope carries
    // the tag as its own segment per spec.md §6's literal four-colon-separated shape.
    let tag = sealed.split_off(sealed.len() - TAG_LEN);

    Ok(format!(
        "{ENVELOPE_PREFIX}{}:{}:{}",
        URL_SAFE_NO_PAD.encode(iv_bytes),
        URL_SAFE_NO_PAD.encode(tag),
        URL_SAFE_NO_PAD.encode(sealed),
    ))
}

/// Decrypts an `encwc.v1:...` envelope. A string that doesn't carry the envelope prefix is
/// returned unchanged — legacy plaintext rows round-trip through this function untouched
/// (spec.md §9 "round-trip a stable envelope prefix so mixed ... data can be migrated lazily").
pub fn decrypt(input: &str, secret: &str) -> Result<String, CryptoError> {
    let Some(rest) = input.strip_prefix(ENVELOPE_PREFIX) else {
        return Ok(input.to_string());
    };

    let mut parts = rest.splitn(3, ':');
    let (iv_b64, tag_b64, ct_b64) = match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), Some(c)) => (a, b, c),
        _ => return Err(CryptoError::MalformedEnvelope),
    };

    let iv = URL_SAFE_NO_PAD
        .decode(iv_b64)
        .map_err(|_| CryptoError::MalformedEnvelope)?;
    let tag = URL_SAFE_NO_PAD
        .decode(tag_b64)
        .map_err(|_| CryptoError::MalformedEnvelope)?;
    let ciphertext = URL_SAFE_NO_PAD
        .decode(ct_b64)
        .map_err(|_| CryptoError::MalformedEnvelope)?;

    if iv.len() != IV_LEN || tag.len() != TAG_LEN {
        return Err(CryptoError::MalformedEnvelope);
    }

    let mut sealed = ciphertext;
    sealed.extend_from_slice(&tag);

    let cipher = cipher_from_secret(secret)?;
    let nonce = Nonce::from_slice(&iv);
    let plaintext = cipher
        .decrypt(nonce, sealed.as_ref())
        .map_err(|_| CryptoError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
}

/// True if `input` carries the envelope prefix, without attempting to decrypt it.
pub fn is_envelope(input: &str) -> bool {
    input.starts_with(ENVELOPE_PREFIX)
}
