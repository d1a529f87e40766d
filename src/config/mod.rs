// ABOUTME: Configuration module root
// ABOUTME: Environment-driven server configuration lives in `environment`
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

/// Environment variable parsing into [`environment::ServerConfig`]
pub mod environment;
