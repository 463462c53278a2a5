//! Attachment policy: MIME/size validation and object-key derivation.

use chrono::{DateTime, Datelike, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::error::AttachmentError;

/// Attachment policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentConfig {
    /// Allowed MIME types for upload.
    #[serde(default = "AttachmentConfig::default_mime_types")]
    pub allowed_mime_types: Vec<String>,
    /// Maximum object size in bytes.
    #[serde(default = "default_max_size")]
    pub max_size_bytes: u64,
    /// Presigned upload URL TTL in seconds.
    #[serde(default = "default_upload_ttl")]
    pub upload_ttl_secs: u64,
    /// Presigned download URL TTL in seconds.
    #[serde(default = "default_download_ttl")]
    pub download_ttl_secs: u64,
}

fn default_max_size() -> u64 {
    AttachmentConfig::DEFAULT_MAX_SIZE_BYTES
}

fn default_upload_ttl() -> u64 {
    AttachmentConfig::DEFAULT_UPLOAD_TTL
}

fn default_download_ttl() -> u64 {
    AttachmentConfig::DEFAULT_DOWNLOAD_TTL
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            allowed_mime_types: Self::default_mime_types(),
            max_size_bytes: Self::DEFAULT_MAX_SIZE_BYTES,
            upload_ttl_secs: Self::DEFAULT_UPLOAD_TTL,
            download_ttl_secs: Self::DEFAULT_DOWNLOAD_TTL,
        }
    }
}

impl AttachmentConfig {
    /// Default max object size: 25MB.
    pub const DEFAULT_MAX_SIZE_BYTES: u64 = 25 * 1024 * 1024;
    /// Default upload TTL: 15 minutes.
    pub const DEFAULT_UPLOAD_TTL: u64 = 900;
    /// Default download TTL: 1 hour.
    pub const DEFAULT_DOWNLOAD_TTL: u64 = 3600;

    /// Set maximum object size.
    #[must_use]
    pub fn with_max_size_bytes(mut self, size: u64) -> Self {
        self.max_size_bytes = size;
        self
    }

    /// Set presigned upload URL TTL.
    #[must_use]
    pub fn with_upload_ttl(mut self, secs: u64) -> Self {
        self.upload_ttl_secs = secs;
        self
    }

    /// Set presigned download URL TTL.
    #[must_use]
    pub fn with_download_ttl(mut self, secs: u64) -> Self {
        self.download_ttl_secs = secs;
        self
    }

    /// Set allowed MIME types.
    #[must_use]
    pub fn with_allowed_mime_types(mut self, types: Vec<String>) -> Self {
        self.allowed_mime_types = types;
        self
    }

    /// Default allowed MIME types for clinical attachments.
    #[must_use]
    pub fn default_mime_types() -> Vec<String> {
        vec![
            // Documents
            "application/pdf".to_string(),
            "application/msword".to_string(),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document".to_string(),
            // Images and scans
            "image/png".to_string(),
            "image/jpeg".to_string(),
            "image/tiff".to_string(),
            "image/webp".to_string(),
            "application/dicom".to_string(),
        ]
    }

    /// Check if a MIME type is allowed.
    #[must_use]
    pub fn is_mime_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_mime_types.iter().any(|t| t == mime_type)
    }

    /// Validate `(mime_type, size_bytes)` against the policy.
    ///
    /// Runs at every entry point that learns a size/type: before any
    /// presign, before any mediated put, and again after HEAD confirmation.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentError::UnsupportedType`] or
    /// [`AttachmentError::TooLarge`].
    pub fn validate(&self, mime_type: &str, size_bytes: u64) -> Result<(), AttachmentError> {
        if !self.is_mime_type_allowed(mime_type) {
            return Err(AttachmentError::unsupported_type(mime_type));
        }

        if size_bytes > self.max_size_bytes {
            return Err(AttachmentError::too_large(size_bytes, self.max_size_bytes));
        }

        Ok(())
    }
}

/// Sanitize a filename for use in a storage key.
///
/// Keeps word characters, dots, hyphens, and spaces; everything else
/// becomes `_`.
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Random disambiguator for the presigned path, where no record id exists
/// at ticket time.
#[must_use]
pub fn random_disambiguator() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Derive the object key for an attachment.
///
/// Format: `{kind_prefix}/{owner_id}/{year}/{month}/{disambiguator}-{sanitized_filename}`
/// with year/month taken from the upload time (UTC). The time partition
/// keeps the storage layout human-browsable; the disambiguator makes keys
/// unique without a coordination round-trip.
///
/// The disambiguator must not contain `-` so [`display_filename`] can
/// recover the filename; uuids are rendered in simple form.
#[must_use]
pub fn derive_object_key(
    kind_prefix: &str,
    owner_id: i64,
    uploaded_at: DateTime<Utc>,
    disambiguator: &str,
    filename: &str,
) -> String {
    format!(
        "{}/{}/{:04}/{:02}/{}-{}",
        kind_prefix,
        owner_id,
        uploaded_at.year(),
        uploaded_at.month(),
        disambiguator,
        sanitize_filename(filename)
    )
}

/// Recover the display filename from an object key's basename.
///
/// The basename is `{disambiguator}-{sanitized_filename}`; the part after
/// the first `-` is the sanitized original name.
#[must_use]
pub fn display_filename(object_key: &str) -> String {
    let basename = object_key.rsplit('/').next().unwrap_or(object_key);
    basename
        .split_once('-')
        .map_or(basename, |(_, name)| name)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn august() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap()
    }

    #[rstest::rstest]
    #[case("scan.pdf", "scan.pdf")]
    #[case("lab result 03.pdf", "lab result 03.pdf")]
    #[case("my/file(1).pdf", "my_file_1_.pdf")]
    #[case("test@#$%.doc", "test____.doc")]
    #[case("日本語.pdf", "___.pdf")]
    fn test_sanitize_filename(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_filename(input), expected);
    }

    #[test]
    fn test_derive_object_key_shape() {
        let key = derive_object_key("patient", 42, august(), "abc123", "scan.pdf");
        assert_eq!(key, "patient/42/2026/08/abc123-scan.pdf");
    }

    #[test]
    fn test_display_filename_roundtrip() {
        let key = derive_object_key("encounter", 7, august(), &random_disambiguator(), "x-ray.png");
        assert_eq!(display_filename(&key), "x-ray.png");
    }

    #[test]
    fn test_display_filename_plain_basename() {
        assert_eq!(display_filename("a/b/report.pdf"), "report.pdf");
    }

    #[test]
    fn test_key_uniqueness_same_owner_and_month() {
        // 10,000 presigned-path keys for the same (kind, owner, month).
        let mut keys = HashSet::new();
        for _ in 0..10_000 {
            let key =
                derive_object_key("patient", 42, august(), &random_disambiguator(), "scan.pdf");
            keys.insert(key);
        }
        assert_eq!(keys.len(), 10_000);
    }

    #[test]
    fn test_validate_size() {
        let config = AttachmentConfig::default().with_max_size_bytes(1024);

        assert!(config.validate("application/pdf", 512).is_ok());

        let err = config.validate("application/pdf", 2048).unwrap_err();
        assert!(matches!(err, AttachmentError::TooLarge { .. }));
    }

    #[test]
    fn test_validate_mime_type() {
        let config = AttachmentConfig::default();

        assert!(config.validate("application/pdf", 1024).is_ok());
        assert!(config.validate("image/png", 1024).is_ok());

        let err = config.validate("application/x-executable", 1024).unwrap_err();
        assert!(matches!(err, AttachmentError::UnsupportedType { .. }));
    }

    #[test]
    fn test_config_defaults() {
        let config = AttachmentConfig::default();
        assert_eq!(config.max_size_bytes, AttachmentConfig::DEFAULT_MAX_SIZE_BYTES);
        assert_eq!(config.upload_ttl_secs, AttachmentConfig::DEFAULT_UPLOAD_TTL);
        assert_eq!(config.download_ttl_secs, AttachmentConfig::DEFAULT_DOWNLOAD_TTL);
        assert!(!config.allowed_mime_types.is_empty());
    }
}
