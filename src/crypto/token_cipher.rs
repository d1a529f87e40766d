// ABOUTME: AES-256-GCM sealing of provider OAuth tokens before they reach the datastore
// ABOUTME: Normalizes the configured secret to a 32-byte key and emits base64(nonce || ciphertext || tag)
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::digest::{digest, SHA256};
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;

use crate::errors::AppError;

/// AES-256 key length
pub const KEY_LEN: usize = 32;
/// GCM authentication tag length
pub const TAG_LEN: usize = 16;

/// Failures raised while sealing or opening a token
#[derive(Debug, Error)]
pub enum CipherError {
    /// The configured secret is empty
    #[error("encryption key is not configured")]
    MissingKey,
    /// Refusing to seal or open an empty string
    #[error("input must not be empty")]
    EmptyInput,
    /// Blob is not base64, too short, or does not decode to UTF-8
    #[error("malformed ciphertext: {0}")]
    Malformed(&'static str),
    /// Tag did not verify (tampered data or wrong key)
    #[error("ciphertext failed authentication")]
    Integrity,
    /// ring refused to seal
    #[error("encryption failed")]
    Encryption,
}

impl From<CipherError> for AppError {
    fn from(error: CipherError) -> Self {
        match error {
            CipherError::MissingKey => Self::config(error.to_string()),
            CipherError::EmptyInput => Self::invalid_input(error.to_string()),
            CipherError::Malformed(_) | CipherError::Integrity => Self::integrity(error.to_string()),
            CipherError::Encryption => Self::internal(error.to_string()),
        }
    }
}

/// Symmetric cipher for OAuth tokens at rest
#[derive(Clone)]
pub struct TokenCipher {
    key: [u8; KEY_LEN],
    rng: SystemRandom,
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher").finish_non_exhaustive()
    }
}

impl TokenCipher {
    /// Build a cipher from the configured secret
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::MissingKey`] if the secret is empty
    pub fn from_secret(secret: &str) -> Result<Self, CipherError> {
        Ok(Self {
            key: normalize_key(secret)?,
            rng: SystemRandom::new(),
        })
    }

    /// Seal `plaintext` under a fresh random nonce
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::EmptyInput`] for an empty string, or
    /// [`CipherError::Encryption`] if the nonce or seal operation fails
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        if plaintext.is_empty() {
            return Err(CipherError::EmptyInput);
        }

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| CipherError::Encryption)?;

        let key = self.sealing_key()?;
        let mut in_out = plaintext.as_bytes().to_vec();
        key.seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| CipherError::Encryption)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + in_out.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&in_out);
        Ok(STANDARD.encode(blob))
    }

    /// Open a blob produced by [`Self::encrypt`]
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Integrity`] when the tag does not verify and
    /// [`CipherError::Malformed`] for undecodable input
    pub fn decrypt(&self, blob: &str) -> Result<String, CipherError> {
        if blob.is_empty() {
            return Err(CipherError::EmptyInput);
        }

        let combined = STANDARD
            .decode(blob)
            .map_err(|_| CipherError::Malformed("not base64"))?;
        if combined.len() < NONCE_LEN + TAG_LEN {
            return Err(CipherError::Malformed("shorter than nonce and tag"));
        }

        let (nonce_bytes, sealed) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| CipherError::Malformed("bad nonce"))?;

        let key = self.sealing_key()?;
        let mut in_out = sealed.to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| CipherError::Integrity)?;

        String::from_utf8(plaintext.to_vec()).map_err(|_| CipherError::Malformed("not UTF-8"))
    }

    /// Seal an optional value, passing `None` through
    ///
    /// # Errors
    ///
    /// Same as [`Self::encrypt`]
    pub fn encrypt_optional(&self, value: Option<&str>) -> Result<Option<String>, CipherError> {
        value
            .filter(|v| !v.is_empty())
            .map(|v| self.encrypt(v))
            .transpose()
    }

    fn sealing_key(&self) -> Result<LessSafeKey, CipherError> {
        UnboundKey::new(&AES_256_GCM, &self.key)
            .map(LessSafeKey::new)
            .map_err(|_| CipherError::Encryption)
    }
}

/// Reduce an arbitrary secret to exactly 32 key bytes
///
/// The secret is base64-decoded when it is valid base64 and used as raw
/// bytes otherwise. Longer material is hashed with SHA-256; shorter material
/// is zero-padded so the same secret always yields the same key.
///
/// # Errors
///
/// Returns [`CipherError::MissingKey`] for an empty secret
pub fn normalize_key(secret: &str) -> Result<[u8; KEY_LEN], CipherError> {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return Err(CipherError::MissingKey);
    }

    let material = STANDARD
        .decode(trimmed)
        .ok()
        .filter(|bytes| !bytes.is_empty())
        .unwrap_or_else(|| trimmed.as_bytes().to_vec());

    let mut key = [0u8; KEY_LEN];
    if material.len() > KEY_LEN {
        key.copy_from_slice(digest(&SHA256, &material).as_ref());
    } else {
        key[..material.len()].copy_from_slice(&material);
    }
    Ok(key)
}
