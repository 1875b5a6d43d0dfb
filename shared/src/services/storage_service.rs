use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::{env_or_resource, PresignedUrl, StoredObject, Tenant, TransferError, TransferResult};

pub const DEFAULT_PRESIGN_EXPIRY_SECS: u64 = 900;

/// An object key confined to one tenant's prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantPath {
    relative: String,
    key: String,
}

impl TenantPath {
    /// Resolve a caller-supplied object path under `TENANT#{id}/`.
    /// Anything that could escape the prefix is rejected rather than cleaned up.
    pub fn resolve(tenant: &Tenant, relative: &str) -> TransferResult<Self> {
        Self::resolve_segments(tenant, relative, false)
    }

    fn resolve_segments(tenant: &Tenant, relative: &str, folder: bool) -> TransferResult<Self> {
        let invalid = |reason: &str| {
            TransferError::ValidationError(format!("Invalid path '{}': {}", relative, reason))
        };

        if relative.trim().is_empty() {
            return Err(invalid("path is empty"));
        }
        if relative.starts_with('/') {
            return Err(invalid("absolute paths are not allowed"));
        }
        if relative.contains('\\') {
            return Err(invalid("backslashes are not allowed"));
        }
        if relative.chars().any(char::is_control) {
            return Err(invalid("control characters are not allowed"));
        }
        for segment in relative.split('/') {
            match segment {
                ".." => return Err(invalid("parent segments are not allowed")),
                "." => return Err(invalid("dot segments are not allowed")),
                _ => {}
            }
        }
        if relative.split('/').rev().skip(1).any(str::is_empty) {
            return Err(invalid("empty segments are not allowed"));
        }
        if !folder && relative.ends_with('/') {
            return Err(invalid("path names a folder, not an object"));
        }

        Ok(Self {
            relative: relative.to_string(),
            key: format!("{}{}", tenant.storage_prefix(), relative),
        })
    }

    /// Listing prefix; an empty prefix means the tenant root
    pub fn resolve_prefix(tenant: &Tenant, prefix: Option<&str>) -> TransferResult<String> {
        match prefix.map(str::trim).filter(|p| !p.is_empty()) {
            None => Ok(tenant.storage_prefix()),
            Some(prefix) => Ok(Self::resolve_segments(tenant, prefix, true)?.key),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn relative(&self) -> &str {
        &self.relative
    }
}

pub fn strip_tenant_prefix<'a>(tenant: &Tenant, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(tenant.storage_prefix().as_str())
}

pub struct StorageService {
    client: S3Client,
    bucket: String,
    tenant: Tenant,
    expiry: Duration,
}

impl StorageService {
    pub fn new(client: S3Client, bucket: String, tenant: Tenant, expiry: Duration) -> Self {
        Self {
            client,
            bucket,
            tenant,
            expiry,
        }
    }

    pub fn from_env(client: S3Client) -> TransferResult<Self> {
        let bucket = env_or_resource("BUCKET_NAME", "documents")?;
        let expiry_secs = match std::env::var("PRESIGN_EXPIRY_SECS") {
            Ok(raw) => raw.parse().map_err(|_| {
                TransferError::ConfigurationError(format!("Invalid PRESIGN_EXPIRY_SECS: {}", raw))
            })?,
            Err(_) => DEFAULT_PRESIGN_EXPIRY_SECS,
        };

        tracing::info!("StorageService initialized with bucket: {}", bucket);
        Ok(Self::new(
            client,
            bucket,
            Tenant::current(),
            Duration::from_secs(expiry_secs),
        ))
    }

    fn presigning_config(&self) -> TransferResult<PresigningConfig> {
        PresigningConfig::expires_in(self.expiry)
            .map_err(|e| TransferError::InternalError(format!("Invalid presign expiry: {}", e)))
    }

    pub async fn upload_url(&self, path: &str, content_type: &str) -> TransferResult<PresignedUrl> {
        let path = TenantPath::resolve(&self.tenant, path)?;
        if content_type.trim().is_empty() {
            return Err(TransferError::ValidationError(
                "Content type is required".to_string(),
            ));
        }

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(path.key())
            .content_type(content_type.trim())
            .presigned(self.presigning_config()?)
            .await
            .map_err(|e| TransferError::S3Error(e.to_string()))?;

        tracing::info!("Issued upload URL for {}", path.key());
        Ok(PresignedUrl {
            path: path.relative().to_string(),
            url: request.uri().to_string(),
            expires_in_seconds: self.expiry.as_secs(),
        })
    }

    pub async fn download_url(&self, path: &str) -> TransferResult<PresignedUrl> {
        let path = TenantPath::resolve(&self.tenant, path)?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path.key())
            .presigned(self.presigning_config()?)
            .await
            .map_err(|e| TransferError::S3Error(e.to_string()))?;

        tracing::info!("Issued download URL for {}", path.key());
        Ok(PresignedUrl {
            path: path.relative().to_string(),
            url: request.uri().to_string(),
            expires_in_seconds: self.expiry.as_secs(),
        })
    }

    /// Objects under `prefix`, with paths relative to the tenant root
    pub async fn list_objects(&self, prefix: Option<&str>) -> TransferResult<Vec<StoredObject>> {
        let full_prefix = TenantPath::resolve_prefix(&self.tenant, prefix)?;
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&full_prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| TransferError::S3Error(e.to_string()))?;

            for object in output.contents() {
                let Some(path) = object.key().and_then(|k| strip_tenant_prefix(&self.tenant, k))
                else {
                    continue;
                };
                objects.push(StoredObject {
                    path: path.to_string(),
                    size_bytes: object.size().unwrap_or_default(),
                    last_modified: object
                        .last_modified()
                        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())),
                });
            }

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string())
                }
                _ => break,
            }
        }

        Ok(objects)
    }

    pub async fn delete_object(&self, path: &str) -> TransferResult<()> {
        let path = TenantPath::resolve(&self.tenant, path)?;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path.key())
            .send()
            .await
            .map_err(|e| TransferError::S3Error(e.to_string()))?;

        tracing::info!("Deleted {}", path.key());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::s3_client;

    #[test]
    fn test_resolve_prefixes_tenant() {
        let path = TenantPath::resolve(&Tenant::current(), "invoices/2026/inv-001.pdf").unwrap();
        assert_eq!(path.key(), "TENANT#001/invoices/2026/inv-001.pdf");
        assert_eq!(path.relative(), "invoices/2026/inv-001.pdf");
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let tenant = Tenant::current();
        for bad in [
            "",
            "   ",
            "/etc/passwd",
            "../TENANT#002/x.pdf",
            "invoices/../../x",
            "invoices\\x.pdf",
            "invoices/\u{0}x.pdf",
            "invoices//x.pdf",
            "./x.pdf",
            "invoices/",
            "invoices/2026/",
        ] {
            assert!(TenantPath::resolve(&tenant, bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_folder_prefix_may_end_with_slash() {
        let tenant = Tenant::current();
        assert_eq!(
            TenantPath::resolve_prefix(&tenant, Some("invoices/")).unwrap(),
            "TENANT#001/invoices/"
        );
        assert_eq!(TenantPath::resolve_prefix(&tenant, None).unwrap(), "TENANT#001/");
        assert_eq!(TenantPath::resolve_prefix(&tenant, Some("  ")).unwrap(), "TENANT#001/");
    }

    #[test]
    fn test_strip_tenant_prefix() {
        let tenant = Tenant::current();
        assert_eq!(
            strip_tenant_prefix(&tenant, "TENANT#001/drivers/licence.jpg"),
            Some("drivers/licence.jpg")
        );
        assert_eq!(strip_tenant_prefix(&tenant, "TENANT#002/drivers/licence.jpg"), None);
    }

    #[tokio::test]
    async fn test_upload_url_is_presigned_offline() {
        let service = StorageService::new(
            s3_client(),
            "transfers-test-documents".to_string(),
            Tenant::current(),
            Duration::from_secs(DEFAULT_PRESIGN_EXPIRY_SECS),
        );

        let presigned = service
            .upload_url("invoices/inv-001.pdf", "application/pdf")
            .await
            .unwrap();

        assert_eq!(presigned.path, "invoices/inv-001.pdf");
        assert_eq!(presigned.expires_in_seconds, 900);
        assert!(presigned.url.contains("X-Amz-Expires=900"));
        assert!(presigned.url.contains("invoices/inv-001.pdf"));
        assert!(service.upload_url("../x.pdf", "application/pdf").await.is_err());
        assert!(service.upload_url("x.pdf", " ").await.is_err());
    }
}
