//! Attachment routes.
//!
//! One route set serves every owner kind; the `{kind}` path segment picks
//! the engine instance. Which upload shape a kind accepts is decided by
//! [`OwnerKind::upload_mode`].

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::AppState;
use aegle_core::attachment::{
    AttachmentError, AttachmentRecord, AttachmentService, FinalizeUpload, MediatedUpload,
    OwnerKind, TicketRequest, UploadMode,
};
use aegle_core::storage::OpendalGateway;
use aegle_db::AttachmentRepository;
use aegle_shared::{PageRequest, PageResponse};

/// Creates the attachment routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/{kind}/{owner_id}/attachments/upload-ticket",
            post(request_upload_ticket),
        )
        .route(
            "/{kind}/{owner_id}/attachments/finalize",
            post(finalize_upload),
        )
        .route(
            "/{kind}/{owner_id}/attachments",
            post(upload_mediated).get(list_attachments),
        )
        .route(
            "/{kind}/{owner_id}/attachments/{attachment_id}/download",
            get(request_download_ticket),
        )
        .route(
            "/{kind}/{owner_id}/attachments/{attachment_id}",
            delete(soft_delete_attachment),
        )
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for an upload ticket.
#[derive(Debug, Deserialize)]
pub struct UploadTicketBody {
    /// Original filename.
    pub filename: String,
    /// MIME type of the file.
    pub mime_type: String,
    /// File size in bytes.
    pub size_bytes: u64,
}

/// Response for an upload ticket.
#[derive(Debug, Serialize)]
pub struct UploadTicketResponse {
    /// Storage key to finalize with.
    pub object_key: String,
    /// Presigned upload URL.
    pub put_url: String,
    /// HTTP method to use (PUT).
    pub method: String,
    /// Required headers for the upload.
    pub headers: std::collections::HashMap<String, String>,
    /// When the URL expires (ISO 8601).
    pub expires_at: String,
}

/// Request body for finalizing an upload.
#[derive(Debug, Deserialize)]
pub struct FinalizeBody {
    /// Object key from the upload ticket.
    pub object_key: String,
    /// Uploading user, resolved by the caller.
    pub created_by: Uuid,
    /// Free-form classification.
    #[serde(default)]
    pub attachment_type: Option<String>,
    /// Free-form details.
    #[serde(default)]
    pub details: Option<String>,
    /// Free-form source tag.
    #[serde(default)]
    pub source: Option<String>,
    /// Free-form source id.
    #[serde(default)]
    pub source_id: Option<i64>,
}

/// Response for an attachment record.
#[derive(Debug, Serialize)]
pub struct AttachmentResponse {
    /// Attachment ID.
    pub id: Uuid,
    /// Owning entity id.
    pub owner_id: i64,
    /// Sanitized display filename.
    pub filename: String,
    /// Confirmed MIME type.
    pub mime_type: String,
    /// Confirmed size in bytes.
    pub size_bytes: i64,
    /// Free-form classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_type: Option<String>,
    /// Free-form details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Free-form source tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Free-form source id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<i64>,
    /// Uploading user.
    pub created_by: Uuid,
    /// Created at timestamp (ISO 8601).
    pub created_at: String,
}

impl From<AttachmentRecord> for AttachmentResponse {
    fn from(record: AttachmentRecord) -> Self {
        Self {
            id: record.id,
            owner_id: record.owner_id,
            filename: record.filename,
            mime_type: record.mime_type,
            size_bytes: record.size_bytes,
            attachment_type: record.attachment_type,
            details: record.details,
            source: record.source,
            source_id: record.source_id,
            created_by: record.created_by,
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

/// Response for a download ticket.
#[derive(Debug, Serialize)]
pub struct DownloadTicketResponse {
    /// Presigned download URL.
    pub url: String,
    /// Validity window in seconds.
    pub ttl_seconds: u64,
    /// When the URL expires (ISO 8601).
    pub expires_at: String,
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Parse the `{kind}` route segment.
fn parse_kind(segment: &str) -> Option<OwnerKind> {
    match segment {
        "patients" => Some(OwnerKind::Patient),
        "encounters" => Some(OwnerKind::Encounter),
        "inventory-transactions" => Some(OwnerKind::InventoryTransaction),
        "inventory-transfers" => Some(OwnerKind::InventoryTransfer),
        _ => None,
    }
}

/// Build the engine instance for one owner kind.
fn service(
    state: &AppState,
    kind: OwnerKind,
) -> AttachmentService<OpendalGateway, AttachmentRepository> {
    let repo = AttachmentRepository::new((*state.db).clone(), kind);
    AttachmentService::new(
        kind,
        state.storage.clone(),
        Arc::new(repo),
        state.attachments.clone(),
    )
}

/// 404 for an unknown `{kind}` segment.
fn unknown_kind_response(segment: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "unknown_kind",
            "message": format!("Unknown attachment owner kind: {segment}")
        })),
    )
        .into_response()
}

/// 400 for a request against the wrong upload shape.
fn wrong_mode_response(wanted: UploadMode) -> Response {
    let message = match wanted {
        UploadMode::ClientDirect => "This kind does not use client-direct uploads",
        UploadMode::ServerMediated => "This kind does not use server-mediated uploads",
    };
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": "wrong_upload_mode",
            "message": message
        })),
    )
        .into_response()
}

/// Map an engine error to an HTTP response.
///
/// Policy violations are precise and user-actionable; backend failures are
/// wrapped without leaking raw errors to the caller.
fn attachment_error_response(err: &AttachmentError) -> Response {
    match err {
        AttachmentError::UnsupportedType { mime_type } => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "unsupported_type",
                "message": format!("MIME type '{mime_type}' is not allowed")
            })),
        )
            .into_response(),
        AttachmentError::TooLarge { size, max } => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "file_too_large",
                "message": format!("File size {size} bytes exceeds maximum {max} bytes")
            })),
        )
            .into_response(),
        AttachmentError::ObjectMissing { .. } => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "upload_not_completed",
                "message": "No object was uploaded for this key. Request a fresh ticket and retry."
            })),
        )
            .into_response(),
        AttachmentError::NotFound(_) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "not_found",
                "message": "Attachment not found"
            })),
        )
            .into_response(),
        AttachmentError::UploadFailed(_) => {
            error!(error = %err, "Mediated upload failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": "upload_failed",
                    "message": "Storage write failed. The upload may be retried."
                })),
            )
                .into_response()
        }
        AttachmentError::Storage(_) => {
            error!(error = %err, "Storage operation failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": "storage_error",
                    "message": "Storage operation failed. The request may be retried."
                })),
            )
                .into_response()
        }
        AttachmentError::Repository(_) => {
            error!(error = %err, "Repository operation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "internal_error",
                    "message": "An error occurred"
                })),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/{kind}/{owner_id}/attachments/upload-ticket`
/// Request a presigned upload ticket (client-direct kinds).
async fn request_upload_ticket(
    State(state): State<AppState>,
    Path((kind_segment, owner_id)): Path<(String, i64)>,
    Json(payload): Json<UploadTicketBody>,
) -> impl IntoResponse {
    let Some(kind) = parse_kind(&kind_segment) else {
        return unknown_kind_response(&kind_segment);
    };
    if kind.upload_mode() != UploadMode::ClientDirect {
        return wrong_mode_response(UploadMode::ClientDirect);
    }

    let svc = service(&state, kind);
    let input = TicketRequest {
        owner_id,
        filename: payload.filename,
        mime_type: payload.mime_type,
        size_bytes: payload.size_bytes,
    };

    match svc.request_upload_ticket(input).await {
        Ok(ticket) => {
            info!(
                kind = kind.as_str(),
                owner_id,
                object_key = %ticket.object_key,
                "Upload ticket issued"
            );

            let response = UploadTicketResponse {
                object_key: ticket.object_key,
                put_url: ticket.put_url,
                method: ticket.method,
                headers: ticket.headers,
                expires_at: ticket.expires_at.to_rfc3339(),
            };

            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => attachment_error_response(&e),
    }
}

/// POST `/{kind}/{owner_id}/attachments/finalize`
/// Confirm a client-direct upload and create the attachment record.
async fn finalize_upload(
    State(state): State<AppState>,
    Path((kind_segment, owner_id)): Path<(String, i64)>,
    Json(payload): Json<FinalizeBody>,
) -> impl IntoResponse {
    let Some(kind) = parse_kind(&kind_segment) else {
        return unknown_kind_response(&kind_segment);
    };
    if kind.upload_mode() != UploadMode::ClientDirect {
        return wrong_mode_response(UploadMode::ClientDirect);
    }

    let svc = service(&state, kind);
    let input = FinalizeUpload {
        owner_id,
        object_key: payload.object_key,
        created_by: payload.created_by,
        attachment_type: payload.attachment_type,
        details: payload.details,
        source: payload.source,
        source_id: payload.source_id,
    };

    match svc.finalize_upload(input).await {
        Ok(record) => {
            info!(
                kind = kind.as_str(),
                owner_id,
                attachment_id = %record.id,
                "Upload finalized"
            );

            (StatusCode::CREATED, Json(AttachmentResponse::from(record))).into_response()
        }
        Err(e) => attachment_error_response(&e),
    }
}

/// POST `/{kind}/{owner_id}/attachments`
/// Upload a file through the API process (server-mediated kinds).
///
/// Multipart form: a `file` part plus optional `created_by`, `type`,
/// `details`, `source`, and `source_id` text parts.
async fn upload_mediated(
    State(state): State<AppState>,
    Path((kind_segment, owner_id)): Path<(String, i64)>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let Some(kind) = parse_kind(&kind_segment) else {
        return unknown_kind_response(&kind_segment);
    };
    if kind.upload_mode() != UploadMode::ServerMediated {
        return wrong_mode_response(UploadMode::ServerMediated);
    }

    let mut file: Option<(String, String, bytes::Bytes)> = None;
    let mut created_by: Option<Uuid> = None;
    let mut attachment_type: Option<String> = None;
    let mut details: Option<String> = None;
    let mut source: Option<String> = None;
    let mut source_id: Option<i64> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": "invalid_multipart",
                        "message": e.to_string()
                    })),
                )
                    .into_response();
            }
        };

        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload.bin").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                match field.bytes().await {
                    Ok(data) => file = Some((filename, mime_type, data)),
                    Err(e) => {
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(json!({
                                "error": "invalid_multipart",
                                "message": e.to_string()
                            })),
                        )
                            .into_response();
                    }
                }
            }
            Some("created_by") => {
                created_by = field
                    .text()
                    .await
                    .ok()
                    .and_then(|t| Uuid::parse_str(t.trim()).ok());
            }
            Some("type") => attachment_type = field.text().await.ok(),
            Some("details") => details = field.text().await.ok(),
            Some("source") => source = field.text().await.ok(),
            Some("source_id") => {
                source_id = field.text().await.ok().and_then(|t| t.trim().parse().ok());
            }
            _ => {}
        }
    }

    let Some((filename, mime_type, data)) = file else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "missing_file",
                "message": "Multipart request must carry a 'file' part"
            })),
        )
            .into_response();
    };
    let Some(created_by) = created_by else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "missing_created_by",
                "message": "Multipart request must carry a 'created_by' part"
            })),
        )
            .into_response();
    };

    let svc = service(&state, kind);
    let input = MediatedUpload {
        owner_id,
        filename,
        mime_type,
        size_bytes: data.len() as u64,
        bytes: data,
        created_by,
        attachment_type,
        details,
        source,
        source_id,
    };

    match svc.upload_mediated(input).await {
        Ok(record) => {
            info!(
                kind = kind.as_str(),
                owner_id,
                attachment_id = %record.id,
                size_bytes = record.size_bytes,
                "Mediated upload stored"
            );

            (StatusCode::CREATED, Json(AttachmentResponse::from(record))).into_response()
        }
        Err(e) => attachment_error_response(&e),
    }
}

/// GET `/{kind}/{owner_id}/attachments`
/// Page through an owner's active attachments, newest first.
async fn list_attachments(
    State(state): State<AppState>,
    Path((kind_segment, owner_id)): Path<(String, i64)>,
    Query(page): Query<PageRequest>,
) -> impl IntoResponse {
    let Some(kind) = parse_kind(&kind_segment) else {
        return unknown_kind_response(&kind_segment);
    };

    let svc = service(&state, kind);

    match svc.list(owner_id, &page).await {
        Ok(records) => {
            let response: PageResponse<AttachmentResponse> = records.map(AttachmentResponse::from);
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => attachment_error_response(&e),
    }
}

/// GET `/{kind}/{owner_id}/attachments/{attachment_id}/download`
/// Issue a presigned download ticket for an active attachment.
async fn request_download_ticket(
    State(state): State<AppState>,
    Path((kind_segment, _owner_id, attachment_id)): Path<(String, i64, Uuid)>,
) -> impl IntoResponse {
    let Some(kind) = parse_kind(&kind_segment) else {
        return unknown_kind_response(&kind_segment);
    };

    let svc = service(&state, kind);

    match svc.request_download_ticket(attachment_id).await {
        Ok(ticket) => {
            let response = DownloadTicketResponse {
                url: ticket.url,
                ttl_seconds: ticket.ttl_seconds,
                expires_at: ticket.expires_at.to_rfc3339(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => attachment_error_response(&e),
    }
}

/// DELETE `/{kind}/{owner_id}/attachments/{attachment_id}`
/// Soft-delete an attachment; the stored object is removed at most once.
async fn soft_delete_attachment(
    State(state): State<AppState>,
    Path((kind_segment, _owner_id, attachment_id)): Path<(String, i64, Uuid)>,
) -> impl IntoResponse {
    let Some(kind) = parse_kind(&kind_segment) else {
        return unknown_kind_response(&kind_segment);
    };

    let svc = service(&state, kind);

    match svc.soft_delete(attachment_id).await {
        Ok(()) => {
            info!(
                kind = kind.as_str(),
                attachment_id = %attachment_id,
                "Attachment soft-deleted"
            );

            (StatusCode::NO_CONTENT, ()).into_response()
        }
        Err(e) => attachment_error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegle_core::storage::StorageError;

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("patients"), Some(OwnerKind::Patient));
        assert_eq!(parse_kind("encounters"), Some(OwnerKind::Encounter));
        assert_eq!(
            parse_kind("inventory-transactions"),
            Some(OwnerKind::InventoryTransaction)
        );
        assert_eq!(
            parse_kind("inventory-transfers"),
            Some(OwnerKind::InventoryTransfer)
        );
        assert_eq!(parse_kind("practitioners"), None);
        assert_eq!(parse_kind(""), None);
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (
                AttachmentError::unsupported_type("text/html"),
                StatusCode::BAD_REQUEST,
            ),
            (AttachmentError::too_large(2, 1), StatusCode::BAD_REQUEST),
            (
                AttachmentError::object_missing("a/b"),
                StatusCode::BAD_REQUEST,
            ),
            (
                AttachmentError::not_found(Uuid::new_v4()),
                StatusCode::NOT_FOUND,
            ),
            (
                AttachmentError::UploadFailed(StorageError::operation("down")),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AttachmentError::Storage(StorageError::operation("down")),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AttachmentError::repository("boom"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(attachment_error_response(&err).status(), expected, "{err}");
        }
    }

    #[test]
    fn test_wrong_mode_and_unknown_kind_statuses() {
        assert_eq!(
            wrong_mode_response(UploadMode::ClientDirect).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            unknown_kind_response("wards").status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_attachment_response_from_record() {
        let record = AttachmentRecord {
            id: Uuid::new_v4(),
            owner_kind: OwnerKind::Patient,
            owner_id: 42,
            object_key: "patient/42/2026/08/abc-scan.pdf".to_string(),
            filename: "scan.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            size_bytes: 10_000,
            attachment_type: Some("lab-report".to_string()),
            details: None,
            source: None,
            source_id: None,
            created_by: Uuid::new_v4(),
            created_at: chrono::Utc::now(),
            deleted_at: None,
        };

        let response = AttachmentResponse::from(record.clone());
        assert_eq!(response.id, record.id);
        assert_eq!(response.owner_id, 42);
        assert_eq!(response.filename, "scan.pdf");
        assert_eq!(response.attachment_type.as_deref(), Some("lab-report"));
    }
}
