use std::time::Duration;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use cortex_core::CortexError;
use uuid::Uuid;

/// Connection parameters for the blob store: a real AWS region/credentials
/// pair, or a MinIO/S3-compatible endpoint reached with path-style
/// addressing.
#[derive(Debug, Clone)]
pub struct ObjectStoreConfig {
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

#[derive(Clone)]
pub struct ObjectStore {
    client: S3Client,
}

fn upstream(e: impl std::fmt::Display) -> CortexError {
    CortexError::upstream(format!("object store error: {e}"))
}

impl ObjectStore {
    pub async fn connect(config: &ObjectStoreConfig) -> Result<Self, CortexError> {
        let base_loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

        let loader = if let (Some(access_key), Some(secret_key)) = (&config.access_key_id, &config.secret_access_key) {
            let credentials = aws_sdk_s3::config::Credentials::new(access_key, secret_key, None, None, "cortexdb");
            base_loader.credentials_provider(credentials)
        } else {
            base_loader
        };

        let shared_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(ObjectStore { client: S3Client::from_conf(builder.build()) })
    }

    /// Create `bucket` if it does not already exist. Idempotent: the
    /// "already owned by you" case from a concurrent or repeat call is not
    /// an error.
    pub async fn ensure_bucket(&self, bucket: &str) -> Result<(), CortexError> {
        match self.client.create_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(()),
            Err(SdkError::ServiceError(err)) => {
                let code = err.err().meta().code().unwrap_or("");
                if code == "BucketAlreadyOwnedByYou" || code == "BucketAlreadyExists" {
                    Ok(())
                } else {
                    Err(upstream(err.err()))
                }
            }
            Err(err) => Err(upstream(err)),
        }
    }

    pub async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>, content_type: Option<&str>) -> Result<(), CortexError> {
        let mut request = self.client.put_object().bucket(bucket).key(key).body(ByteStream::from(data));
        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }
        request.send().await.map_err(upstream)?;
        Ok(())
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), CortexError> {
        self.client.delete_object().bucket(bucket).key(key).send().await.map_err(upstream)?;
        Ok(())
    }

    pub async fn delete_bucket(&self, bucket: &str) -> Result<(), CortexError> {
        self.client.delete_bucket().bucket(bucket).send().await.map_err(upstream)?;
        Ok(())
    }

    /// Cheapest call that proves the client can reach and authenticate
    /// against the endpoint, for `/health/all`.
    pub async fn health_check(&self) -> Result<(), CortexError> {
        self.client.list_buckets().send().await.map_err(upstream)?;
        Ok(())
    }

    /// Generate a time-limited GET URL. Callers degrade to a `null` blob
    /// URL on error rather than failing the whole response — a transient
    /// presign failure should not take down an otherwise-successful read.
    pub async fn presigned_get_url(&self, bucket: &str, key: &str, ttl_seconds: u64) -> Result<String, CortexError> {
        let presigning_config = PresigningConfig::expires_in(Duration::from_secs(ttl_seconds))
            .map_err(|e| CortexError::validation(format!("invalid presign ttl: {e}")))?;

        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(upstream)?;

        Ok(presigned.uri().to_string())
    }
}

/// Deterministic object path for a file field's blob: `{collection}/{record_id}/{filename}`.
pub fn object_path(collection: &str, record_id: Uuid, filename: &str) -> String {
    format!("{collection}/{record_id}/{filename}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_path_follows_collection_record_filename_layout() {
        let record_id = Uuid::nil();
        let path = object_path("docs", record_id, "report.pdf");
        assert_eq!(path, format!("docs/{record_id}/report.pdf"));
    }
}
