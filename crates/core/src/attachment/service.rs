//! Attachment service: upload orchestration, retrieval, and lifecycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use aegle_shared::{PageRequest, PageResponse};

use super::error::AttachmentError;
use super::policy::{self, AttachmentConfig};
use super::store::AttachmentStore;
use super::types::{
    AttachmentRecord, CreateRecord, DownloadTicket, FinalizeUpload, MediatedUpload, OwnerKind,
    TicketRequest, UploadTicket,
};
use crate::storage::StorageGateway;

/// Attachment engine for one owner kind.
///
/// One generic engine drives both protocol shapes for every kind of owning
/// entity; the kind tag scopes record lookups and namespaces object keys.
pub struct AttachmentService<G: StorageGateway, S: AttachmentStore> {
    kind: OwnerKind,
    gateway: Arc<G>,
    store: Arc<S>,
    config: AttachmentConfig,
}

impl<G: StorageGateway, S: AttachmentStore> AttachmentService<G, S> {
    /// Create a new attachment service.
    #[must_use]
    pub fn new(kind: OwnerKind, gateway: Arc<G>, store: Arc<S>, config: AttachmentConfig) -> Self {
        Self {
            kind,
            gateway,
            store,
            config,
        }
    }

    /// The owner kind this engine serves.
    #[must_use]
    pub fn kind(&self) -> OwnerKind {
        self.kind
    }

    /// The policy configuration in effect.
    #[must_use]
    pub fn config(&self) -> &AttachmentConfig {
        &self.config
    }

    /// Request a presigned upload ticket (client-direct path).
    ///
    /// No record is written at this stage: the ticket is purely advisory,
    /// and a caller who never uploads leaks nothing into metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - MIME type or size violates the policy
    /// - Presigning fails
    pub async fn request_upload_ticket(
        &self,
        input: TicketRequest,
    ) -> Result<UploadTicket, AttachmentError> {
        self.config.validate(&input.mime_type, input.size_bytes)?;

        let object_key = policy::derive_object_key(
            self.kind.key_prefix(),
            input.owner_id,
            Utc::now(),
            &policy::random_disambiguator(),
            &input.filename,
        );

        let presigned = self
            .gateway
            .presign_put(
                &object_key,
                &input.mime_type,
                input.size_bytes,
                self.upload_ttl(),
            )
            .await?;

        Ok(UploadTicket {
            object_key,
            put_url: presigned.url,
            method: presigned.method,
            headers: presigned.headers,
            expires_at: presigned.expires_at,
        })
    }

    /// Upload bytes through the API process (server-mediated path).
    ///
    /// The record write comes last: a crash after the storage write leaves
    /// an orphaned object, never dangling metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - MIME type or size violates the policy
    /// - The storage write fails (`UploadFailed`, no record created)
    /// - The record store fails
    pub async fn upload_mediated(
        &self,
        input: MediatedUpload,
    ) -> Result<AttachmentRecord, AttachmentError> {
        self.config.validate(&input.mime_type, input.size_bytes)?;

        // The streamed payload is authoritative for the persisted size.
        let actual_size = input.bytes.len() as u64;
        self.config.validate(&input.mime_type, actual_size)?;

        // The id exists before the key is needed, so it doubles as the
        // disambiguator on this path.
        let id = Uuid::new_v4();
        let object_key = policy::derive_object_key(
            self.kind.key_prefix(),
            input.owner_id,
            Utc::now(),
            &id.simple().to_string(),
            &input.filename,
        );

        self.gateway
            .put(&object_key, &input.mime_type, input.bytes)
            .await
            .map_err(AttachmentError::UploadFailed)?;

        self.store
            .save(CreateRecord {
                id: Some(id),
                owner_id: input.owner_id,
                object_key,
                filename: policy::sanitize_filename(&input.filename),
                mime_type: input.mime_type,
                size_bytes: i64::try_from(actual_size).unwrap_or(i64::MAX),
                attachment_type: input.attachment_type,
                details: input.details,
                source: input.source,
                source_id: input.source_id,
                created_by: input.created_by,
            })
            .await
    }

    /// Finalize a client-direct upload.
    ///
    /// Probes storage for the object and persists a record from the probed
    /// metadata. Metadata authority is never the upload ticket, always the
    /// post-hoc storage probe: the ticket parameters were caller-asserted
    /// and the object on the wire might not match them.
    ///
    /// Safe to retry: a record that already exists for
    /// `(owner_id, object_key)` is returned as-is.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Storage has no object at the key (`ObjectMissing`)
    /// - The probed MIME type or size violates the policy
    /// - The record store fails
    pub async fn finalize_upload(
        &self,
        input: FinalizeUpload,
    ) -> Result<AttachmentRecord, AttachmentError> {
        let stat = match self.gateway.head(&input.object_key).await {
            Ok(stat) => stat,
            Err(e) if e.is_not_found() => {
                return Err(AttachmentError::object_missing(&input.object_key));
            }
            Err(e) => return Err(e.into()),
        };

        // Backends that report no content type get the conservative
        // fallback, which the allow-list rejects unless permitted.
        let mime_type = stat
            .mime_type
            .unwrap_or_else(|| "application/octet-stream".to_string());
        self.config.validate(&mime_type, stat.size_bytes)?;

        if let Some(existing) = self
            .store
            .find_by_owner_and_key(input.owner_id, &input.object_key)
            .await?
        {
            return Ok(existing);
        }

        let filename = policy::display_filename(&input.object_key);

        self.store
            .save(CreateRecord {
                id: None,
                owner_id: input.owner_id,
                object_key: input.object_key,
                filename,
                mime_type,
                size_bytes: i64::try_from(stat.size_bytes).unwrap_or(i64::MAX),
                attachment_type: input.attachment_type,
                details: input.details,
                source: input.source,
                source_id: input.source_id,
                created_by: input.created_by,
            })
            .await
    }

    /// Page through an owner's active attachments, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the record store fails.
    pub async fn list(
        &self,
        owner_id: i64,
        page: &PageRequest,
    ) -> Result<PageResponse<AttachmentRecord>, AttachmentError> {
        self.store.list_active_by_owner(owner_id, page).await
    }

    /// Issue a presigned download ticket for an active attachment.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The attachment is unknown or soft-deleted (`NotFound`)
    /// - Presigning fails
    pub async fn request_download_ticket(
        &self,
        attachment_id: Uuid,
    ) -> Result<DownloadTicket, AttachmentError> {
        let record = self
            .store
            .find_by_id(attachment_id)
            .await?
            .filter(|r| !r.is_deleted())
            .ok_or_else(|| AttachmentError::not_found(attachment_id))?;

        let presigned = self
            .gateway
            .presign_get(&record.object_key, &record.filename, self.download_ttl())
            .await?;

        Ok(DownloadTicket {
            url: presigned.url,
            ttl_seconds: self.config.download_ttl_secs,
            expires_at: presigned.expires_at,
        })
    }

    /// Soft-delete an attachment, removing the stored object at most once.
    ///
    /// Already-deleted records are a no-op so retries never trigger a
    /// second physical deletion. The physical delete runs before the
    /// marker update: if it fails, the record stays active and a retry
    /// attempts the physical deletion again.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The attachment is unknown (`NotFound`)
    /// - The physical delete fails (record remains active, retryable)
    /// - The record store fails
    pub async fn soft_delete(&self, attachment_id: Uuid) -> Result<(), AttachmentError> {
        let record = self
            .store
            .find_by_id(attachment_id)
            .await?
            .ok_or_else(|| AttachmentError::not_found(attachment_id))?;

        if record.is_deleted() {
            return Ok(());
        }

        self.gateway.delete(&record.object_key).await?;

        self.store.mark_deleted(attachment_id, Utc::now()).await
    }

    fn upload_ttl(&self) -> Duration {
        Duration::from_secs(self.config.upload_ttl_secs)
    }

    fn download_ttl(&self) -> Duration {
        Duration::from_secs(self.config.download_ttl_secs)
    }
}
