//! Attachment types and data structures.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// The domain entity kind a file is attached to.
///
/// Owner existence is the caller's responsibility; the kind only scopes
/// record lookups and namespaces object keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    /// Patient document.
    Patient,
    /// Encounter scan.
    Encounter,
    /// Inventory transaction proof.
    InventoryTransaction,
    /// Inventory transfer proof.
    InventoryTransfer,
}

/// Upload protocol shape for an owner kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    /// Caller uploads directly to storage via a presigned URL, then finalizes.
    ClientDirect,
    /// Caller sends bytes to the API process, which writes them to storage.
    ServerMediated,
}

impl OwnerKind {
    /// Convert to database string value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Encounter => "encounter",
            Self::InventoryTransaction => "inventory-transaction",
            Self::InventoryTransfer => "inventory-transfer",
        }
    }

    /// Parse from database string value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "patient" => Some(Self::Patient),
            "encounter" => Some(Self::Encounter),
            "inventory-transaction" => Some(Self::InventoryTransaction),
            "inventory-transfer" => Some(Self::InventoryTransfer),
            _ => None,
        }
    }

    /// Object-key namespace prefix for this kind.
    #[must_use]
    pub fn key_prefix(&self) -> &'static str {
        self.as_str()
    }

    /// Which protocol shape this kind uses.
    ///
    /// Explicit table: patient documents and encounter scans are uploaded
    /// directly by clients against a presigned URL; inventory proofs pass
    /// through the API process.
    #[must_use]
    pub fn upload_mode(&self) -> UploadMode {
        match self {
            Self::Patient | Self::Encounter => UploadMode::ClientDirect,
            Self::InventoryTransaction | Self::InventoryTransfer => UploadMode::ServerMediated,
        }
    }
}

/// Attachment domain model, one row per stored object.
#[derive(Debug, Clone)]
pub struct AttachmentRecord {
    /// Unique identifier, assigned by the record store.
    pub id: Uuid,
    /// Owning entity kind.
    pub owner_kind: OwnerKind,
    /// Owning entity id.
    pub owner_id: i64,
    /// Storage key of the physical object.
    pub object_key: String,
    /// Sanitized original filename, display-only.
    pub filename: String,
    /// Confirmed MIME type.
    pub mime_type: String,
    /// Confirmed size in bytes.
    pub size_bytes: i64,
    /// Free-form classification, opaque to the core.
    pub attachment_type: Option<String>,
    /// Free-form details, opaque to the core.
    pub details: Option<String>,
    /// Free-form source tag, opaque to the core.
    pub source: Option<String>,
    /// Free-form source id, opaque to the core.
    pub source_id: Option<i64>,
    /// User who uploaded.
    pub created_by: Uuid,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Soft-deletion timestamp; non-null marks the record logically invisible.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl AttachmentRecord {
    /// Whether the record is soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Input for persisting a new attachment record.
#[derive(Debug, Clone)]
pub struct CreateRecord {
    /// Pre-allocated id (mediated path); the store assigns one when absent.
    pub id: Option<Uuid>,
    /// Owning entity id.
    pub owner_id: i64,
    /// Storage key of the confirmed object.
    pub object_key: String,
    /// Sanitized original filename.
    pub filename: String,
    /// Confirmed MIME type.
    pub mime_type: String,
    /// Confirmed size in bytes.
    pub size_bytes: i64,
    /// Free-form classification.
    pub attachment_type: Option<String>,
    /// Free-form details.
    pub details: Option<String>,
    /// Free-form source tag.
    pub source: Option<String>,
    /// Free-form source id.
    pub source_id: Option<i64>,
    /// User who uploaded.
    pub created_by: Uuid,
}

/// Input for requesting a presigned upload ticket.
#[derive(Debug, Clone)]
pub struct TicketRequest {
    /// Owning entity id.
    pub owner_id: i64,
    /// Original filename.
    pub filename: String,
    /// Caller-asserted MIME type.
    pub mime_type: String,
    /// Caller-asserted size in bytes.
    pub size_bytes: u64,
}

/// Upload ticket for the client-direct path.
///
/// Purely advisory: no record exists until finalize confirms the object.
#[derive(Debug, Clone)]
pub struct UploadTicket {
    /// Derived storage key the caller must finalize with.
    pub object_key: String,
    /// Presigned PUT URL.
    pub put_url: String,
    /// HTTP method to use (PUT).
    pub method: String,
    /// Required headers for the upload.
    pub headers: HashMap<String, String>,
    /// When the URL expires.
    pub expires_at: DateTime<Utc>,
}

/// Input for the server-mediated upload path.
#[derive(Debug, Clone)]
pub struct MediatedUpload {
    /// Owning entity id.
    pub owner_id: i64,
    /// Original filename.
    pub filename: String,
    /// MIME type of the payload.
    pub mime_type: String,
    /// Caller-declared size in bytes.
    pub size_bytes: u64,
    /// The file bytes.
    pub bytes: Bytes,
    /// User uploading.
    pub created_by: Uuid,
    /// Free-form classification.
    pub attachment_type: Option<String>,
    /// Free-form details.
    pub details: Option<String>,
    /// Free-form source tag.
    pub source: Option<String>,
    /// Free-form source id.
    pub source_id: Option<i64>,
}

/// Input for finalizing a client-direct upload.
#[derive(Debug, Clone)]
pub struct FinalizeUpload {
    /// Owning entity id.
    pub owner_id: i64,
    /// Object key from the upload ticket.
    pub object_key: String,
    /// User who uploaded.
    pub created_by: Uuid,
    /// Free-form classification.
    pub attachment_type: Option<String>,
    /// Free-form details.
    pub details: Option<String>,
    /// Free-form source tag.
    pub source: Option<String>,
    /// Free-form source id.
    pub source_id: Option<i64>,
}

/// Ticket for a direct download.
#[derive(Debug, Clone)]
pub struct DownloadTicket {
    /// Presigned GET URL.
    pub url: String,
    /// Validity window in seconds.
    pub ttl_seconds: u64,
    /// When the URL expires.
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_kind_roundtrip() {
        let kinds = [
            OwnerKind::Patient,
            OwnerKind::Encounter,
            OwnerKind::InventoryTransaction,
            OwnerKind::InventoryTransfer,
        ];

        for k in kinds {
            let s = k.as_str();
            assert_eq!(OwnerKind::parse(s), Some(k));
        }
    }

    #[test]
    fn test_owner_kind_unknown() {
        assert_eq!(OwnerKind::parse("practitioner"), None);
    }

    #[test]
    fn test_upload_mode_table() {
        assert_eq!(OwnerKind::Patient.upload_mode(), UploadMode::ClientDirect);
        assert_eq!(OwnerKind::Encounter.upload_mode(), UploadMode::ClientDirect);
        assert_eq!(
            OwnerKind::InventoryTransaction.upload_mode(),
            UploadMode::ServerMediated
        );
        assert_eq!(
            OwnerKind::InventoryTransfer.upload_mode(),
            UploadMode::ServerMediated
        );
    }
}
