//! Attachment repository for database operations.
//!
//! Implements the core record-store interface using SeaORM. One repository
//! instance serves exactly one owner kind; every query carries the kind
//! filter.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::attachments;
use aegle_core::attachment::{
    AttachmentError, AttachmentRecord, AttachmentStore, CreateRecord, OwnerKind,
};
use aegle_shared::{PageRequest, PageResponse};

/// Attachment repository scoped to one owner kind.
#[derive(Debug, Clone)]
pub struct AttachmentRepository {
    db: DatabaseConnection,
    kind: OwnerKind,
}

impl AttachmentRepository {
    /// Create a repository serving `kind`.
    #[must_use]
    pub fn new(db: DatabaseConnection, kind: OwnerKind) -> Self {
        Self { db, kind }
    }

    /// The owner kind this repository serves.
    #[must_use]
    pub fn kind(&self) -> OwnerKind {
        self.kind
    }
}

impl AttachmentStore for AttachmentRepository {
    async fn save(&self, input: CreateRecord) -> Result<AttachmentRecord, AttachmentError> {
        let active_model = attachments::ActiveModel {
            id: Set(input.id.unwrap_or_else(Uuid::new_v4)),
            owner_kind: Set(self.kind.as_str().to_string()),
            owner_id: Set(input.owner_id),
            object_key: Set(input.object_key.clone()),
            file_name: Set(input.filename.clone()),
            mime_type: Set(input.mime_type.clone()),
            size_bytes: Set(input.size_bytes),
            attachment_type: Set(input.attachment_type.clone()),
            details: Set(input.details.clone()),
            source: Set(input.source.clone()),
            source_id: Set(input.source_id),
            created_by: Set(input.created_by),
            created_at: Set(Utc::now().into()),
            deleted_at: Set(None),
        };

        let model = active_model
            .insert(&self.db)
            .await
            .map_err(|e| AttachmentError::repository(e.to_string()))?;

        to_domain(model)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AttachmentRecord>, AttachmentError> {
        let model = attachments::Entity::find_by_id(id)
            .filter(attachments::Column::OwnerKind.eq(self.kind.as_str()))
            .one(&self.db)
            .await
            .map_err(|e| AttachmentError::repository(e.to_string()))?;

        model.map(to_domain).transpose()
    }

    async fn find_by_owner_and_key(
        &self,
        owner_id: i64,
        object_key: &str,
    ) -> Result<Option<AttachmentRecord>, AttachmentError> {
        let model = attachments::Entity::find()
            .filter(attachments::Column::OwnerKind.eq(self.kind.as_str()))
            .filter(attachments::Column::OwnerId.eq(owner_id))
            .filter(attachments::Column::ObjectKey.eq(object_key))
            .one(&self.db)
            .await
            .map_err(|e| AttachmentError::repository(e.to_string()))?;

        model.map(to_domain).transpose()
    }

    async fn list_active_by_owner(
        &self,
        owner_id: i64,
        page: &PageRequest,
    ) -> Result<PageResponse<AttachmentRecord>, AttachmentError> {
        let paginator = attachments::Entity::find()
            .filter(attachments::Column::OwnerKind.eq(self.kind.as_str()))
            .filter(attachments::Column::OwnerId.eq(owner_id))
            .filter(attachments::Column::DeletedAt.is_null())
            .order_by_desc(attachments::Column::CreatedAt)
            .paginate(&self.db, page.limit());

        let total = paginator
            .num_items()
            .await
            .map_err(|e| AttachmentError::repository(e.to_string()))?;

        let models = paginator
            .fetch_page(page.zero_indexed())
            .await
            .map_err(|e| AttachmentError::repository(e.to_string()))?;

        let data = models
            .into_iter()
            .map(to_domain)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PageResponse::new(data, page.page, page.per_page, total))
    }

    async fn mark_deleted(
        &self,
        id: Uuid,
        deleted_at: DateTime<Utc>,
    ) -> Result<(), AttachmentError> {
        let result = attachments::Entity::update_many()
            .col_expr(attachments::Column::DeletedAt, Expr::value(deleted_at))
            .filter(attachments::Column::Id.eq(id))
            .filter(attachments::Column::OwnerKind.eq(self.kind.as_str()))
            .exec(&self.db)
            .await
            .map_err(|e| AttachmentError::repository(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AttachmentError::not_found(id));
        }

        Ok(())
    }
}

/// Convert database model to domain model.
fn to_domain(model: attachments::Model) -> Result<AttachmentRecord, AttachmentError> {
    let owner_kind = OwnerKind::parse(&model.owner_kind)
        .ok_or_else(|| AttachmentError::repository(format!("unknown owner kind: {}", model.owner_kind)))?;

    Ok(AttachmentRecord {
        id: model.id,
        owner_kind,
        owner_id: model.owner_id,
        object_key: model.object_key,
        filename: model.file_name,
        mime_type: model.mime_type,
        size_bytes: model.size_bytes,
        attachment_type: model.attachment_type,
        details: model.details,
        source: model.source,
        source_id: model.source_id,
        created_by: model.created_by,
        created_at: model.created_at.with_timezone(&chrono::Utc),
        deleted_at: model.deleted_at.map(|t| t.with_timezone(&chrono::Utc)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(owner_kind: &str) -> attachments::Model {
        attachments::Model {
            id: Uuid::new_v4(),
            owner_kind: owner_kind.to_string(),
            owner_id: 42,
            object_key: "patient/42/2026/08/abc-scan.pdf".to_string(),
            file_name: "scan.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            size_bytes: 10_000,
            attachment_type: None,
            details: None,
            source: None,
            source_id: None,
            created_by: Uuid::new_v4(),
            created_at: Utc::now().into(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_to_domain() {
        let record = to_domain(model("patient")).expect("should convert");
        assert_eq!(record.owner_kind, OwnerKind::Patient);
        assert_eq!(record.owner_id, 42);
        assert_eq!(record.filename, "scan.pdf");
        assert!(!record.is_deleted());
    }

    #[test]
    fn test_to_domain_unknown_kind() {
        let err = to_domain(model("ward")).unwrap_err();
        assert!(matches!(err, AttachmentError::Repository(_)));
    }
}
