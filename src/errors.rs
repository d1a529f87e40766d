// ABOUTME: Error types for the gateway binary and library
// ABOUTME: Re-exports the shared taxonomy from semantc-core
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

pub use semantc_core::errors::{AppError, AppResult, ErrorCode, ErrorResponse};
