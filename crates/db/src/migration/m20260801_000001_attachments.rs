//! Attachments migration.
//!
//! Creates the attachments table holding one metadata row per stored object.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(ATTACHMENTS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS attachments CASCADE;")
            .await?;
        Ok(())
    }
}

const ATTACHMENTS_SQL: &str = r"
-- Attachment metadata, one row per stored object.
-- Rows are soft-deleted (deleted_at) and kept for audit.
CREATE TABLE attachments (
    id UUID PRIMARY KEY,
    owner_kind VARCHAR(32) NOT NULL,
    owner_id BIGINT NOT NULL,
    object_key TEXT NOT NULL,
    file_name TEXT NOT NULL,
    mime_type VARCHAR(255) NOT NULL,
    size_bytes BIGINT NOT NULL,
    attachment_type VARCHAR(64),
    details TEXT,
    source VARCHAR(64),
    source_id BIGINT,
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    deleted_at TIMESTAMPTZ
);

-- One physical object per key, for the lifetime of the system
CREATE UNIQUE INDEX idx_attachments_object_key ON attachments(object_key);

-- Owner listing (most common read): active rows, newest first
CREATE INDEX idx_attachments_owner ON attachments(owner_kind, owner_id, created_at DESC)
    WHERE deleted_at IS NULL;

-- Finalize idempotency lookup
CREATE INDEX idx_attachments_owner_key ON attachments(owner_kind, owner_id, object_key);
";
