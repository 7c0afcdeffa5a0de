//! Infrastructure layer module
//!
//! This module contains the shared machinery every provider repository
//! builds on:
//! - Bounded single-flight cache
//! - Retry policy with exponential backoff
//! - Per-provider remote error classification
//! - Repository support (memoized, retried, paginated listings)
//! - Configuration management
//! - Logging infrastructure

pub mod cache;
pub mod config;
pub mod logging;
pub mod provider;
pub mod repository;
pub mod retry;
