// ABOUTME: Security helpers shared by the HTTP layer
// ABOUTME: Cookie construction and parsing for the session and OAuth state cookies
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

/// Secure HTTP cookie utilities
pub mod cookies;
