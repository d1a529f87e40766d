// ABOUTME: Test helper modules shared by the integration tests
// ABOUTME: Request builder for driving axum routers without a socket
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

pub mod axum_test;
