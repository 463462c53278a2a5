//! Attachment pipeline for domain-record file uploads.
//!
//! This module provides the business logic for binary attachments:
//! - MIME/size policy and object-key derivation
//! - Presigned upload tickets and HEAD-confirmed finalize
//! - Server-mediated uploads
//! - Paged listing, download tickets, and soft deletion

mod error;
pub mod policy;
mod service;
mod store;
mod types;

pub use error::AttachmentError;
pub use policy::AttachmentConfig;
pub use service::AttachmentService;
pub use store::AttachmentStore;
pub use types::{
    AttachmentRecord, CreateRecord, DownloadTicket, FinalizeUpload, MediatedUpload, OwnerKind,
    TicketRequest, UploadMode, UploadTicket,
};
