//! Object-storage gateway for file attachments using Apache OpenDAL.
//!
//! This module provides vendor-agnostic object storage with support for:
//! - S3-compatible: Cloudflare R2, Supabase Storage, AWS S3, DigitalOcean Spaces
//! - Azure Blob Storage
//! - Local filesystem (development only)
//!
//! The orchestrator never talks to the storage SDK directly; everything goes
//! through the five-operation [`StorageGateway`] interface:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       StorageGateway                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ put(key, mime, bytes)      │ presign_put(key, mime, size, ttl)  │
//! │ head(key)                  │ presign_get(key, filename, ttl)    │
//! │ delete(key)                │                                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod gateway;

pub use config::StorageProvider;
pub use error::StorageError;
pub use gateway::{ObjectStat, OpendalGateway, PresignedRequest, StorageGateway};
