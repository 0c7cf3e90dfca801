use crate::error::{Result, StorageError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use serde::Serialize;
use uuid::Uuid;

/// Where a payload landed after `uploadJson` (spec §4.8).
#[derive(Debug, Clone)]
pub struct UploadedArtifact {
    pub bucket: String,
    pub key: String,
    pub filename: String,
}

/// Writes verification reports to object storage under a random,
/// UUID-derived key (spec §4.8 "ArtifactSink.uploadJson").
pub struct ArtifactSink {
    client: S3Client,
    bucket: String,
}

impl ArtifactSink {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        ArtifactSink { client, bucket: bucket.into() }
    }

    pub async fn upload_json<T: Serialize>(&self, payload: &T) -> Result<UploadedArtifact> {
        let body = serde_json::to_vec_pretty(payload)?;
        let filename = format!("{}.json", Uuid::new_v4());
        let key = format!("reports/{filename}");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type("application/json")
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        Ok(UploadedArtifact { bucket: self.bucket.clone(), key, filename })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_and_unique() {
        let a = format!("reports/{}.json", Uuid::new_v4());
        let b = format!("reports/{}.json", Uuid::new_v4());
        assert_ne!(a, b);
        assert!(a.starts_with("reports/"));
    }
}
