//! Shared API constants

/// API path prefix for all upload routes
pub const API_PREFIX: &str = "/api/v0";
