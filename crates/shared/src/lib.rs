//! Shared types and configuration for Aegle.
//!
//! This crate provides common types used across all other crates:
//! - Pagination types for list endpoints
//! - Configuration management

pub mod config;
pub mod types;

pub use config::AppConfig;
pub use types::{PageMeta, PageRequest, PageResponse};
