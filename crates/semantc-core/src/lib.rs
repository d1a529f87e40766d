// ABOUTME: Shared building blocks for the Semantc gateway crates
// ABOUTME: Exposes canonical DTOs for connectors, credentials and chat plus the unified error type
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

#![deny(unsafe_code)]

//! # Semantc Core
//!
//! Models and errors shared between the HTTP server and any tooling that
//! reads the same datastore. Nothing in here performs I/O.

/// Unified error handling with standard error codes
pub mod errors;

/// Canonical data transfer objects
pub mod models;
