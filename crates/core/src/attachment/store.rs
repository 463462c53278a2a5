//! Record-store interface for attachment metadata rows.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use aegle_shared::{PageRequest, PageResponse};

use super::error::AttachmentError;
use super::types::{AttachmentRecord, CreateRecord};

/// Persistence interface for attachment metadata, scoped to one owner kind.
///
/// Implemented by the db crate against the relational store; the engine
/// never sees the underlying ORM. Each instance serves exactly one
/// [`OwnerKind`](super::OwnerKind) — lookups are filtered to it.
pub trait AttachmentStore: Send + Sync {
    /// Persist a new record. Assigns the id when `input.id` is `None`.
    fn save(
        &self,
        input: CreateRecord,
    ) -> impl std::future::Future<Output = Result<AttachmentRecord, AttachmentError>> + Send;

    /// Find a record by id, including soft-deleted ones.
    fn find_by_id(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<AttachmentRecord>, AttachmentError>> + Send;

    /// Find a record for `(owner_id, object_key)` — the finalize
    /// idempotency lookup.
    fn find_by_owner_and_key(
        &self,
        owner_id: i64,
        object_key: &str,
    ) -> impl std::future::Future<Output = Result<Option<AttachmentRecord>, AttachmentError>> + Send;

    /// Page through non-deleted records for an owner, newest first.
    fn list_active_by_owner(
        &self,
        owner_id: i64,
        page: &PageRequest,
    ) -> impl std::future::Future<Output = Result<PageResponse<AttachmentRecord>, AttachmentError>> + Send;

    /// Set the soft-deletion marker on a record.
    fn mark_deleted(
        &self,
        id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<(), AttachmentError>> + Send;
}
