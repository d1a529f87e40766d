// ABOUTME: HTTP middleware applied in front of the route handlers
// ABOUTME: Currently the per-IP POST rate limiter
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Semantc

/// Fixed-window POST rate limiting
pub mod rate_limit;

pub use rate_limit::{
    limit_post_requests, InMemoryRateLimitStore, RateLimitDecision, RateLimitStore, RateLimiter,
};
