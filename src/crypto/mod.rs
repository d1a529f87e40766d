// ABOUTME: Cryptographic helpers for credentials at rest
// ABOUTME: Exposes the AES-256-GCM token cipher
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

/// Token sealing with AES-256-GCM
pub mod token_cipher;

pub use token_cipher::{normalize_key, CipherError, TokenCipher};
