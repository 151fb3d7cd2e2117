use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Copies every object under `prefix` into `destination`, keeping the key
    /// layout below the prefix. Returns the number of objects written.
    async fn download_prefix(&self, prefix: &str, destination: &Path) -> Result<usize, String>;

    async fn upload_file(&self, source: &Path, key: &str, public: bool) -> Result<(), String>;

    /// Public URL of an uploaded object. `key` must already be URL-safe.
    fn object_url(&self, key: &str) -> String;
}

#[derive(Clone)]
pub struct S3ObjectStore {
    bucket: String,
    region: Option<String>,
    s3_client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(sdk_config: &aws_config::SdkConfig, bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: sdk_config.region().map(|region| region.to_string()),
            s3_client: aws_sdk_s3::Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn download_prefix(&self, prefix: &str, destination: &Path) -> Result<usize, String> {
        let list_prefix = format!("{}/", prefix.trim_end_matches('/'));
        let mut pages = self
            .s3_client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&list_prefix)
            .into_paginator()
            .send();

        let mut written = 0usize;
        while let Some(page) = pages.next().await {
            let page = page.map_err(|error| format!("failed to list s3 objects: {error}"))?;
            for object in page.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                let Some(target) = local_path_for(destination, &list_prefix, key) else {
                    continue;
                };

                let response = self
                    .s3_client
                    .get_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .send()
                    .await
                    .map_err(|error| format!("failed to read s3 object {key}: {error}"))?;
                let body = response
                    .body
                    .collect()
                    .await
                    .map_err(|error| format!("failed to stream s3 object {key}: {error}"))?
                    .into_bytes();

                if let Some(parent) = target.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|error| format!("failed to create {}: {error}", parent.display()))?;
                }
                tokio::fs::write(&target, &body)
                    .await
                    .map_err(|error| format!("failed to write {}: {error}", target.display()))?;
                written += 1;
            }
        }

        Ok(written)
    }

    async fn upload_file(&self, source: &Path, key: &str, public: bool) -> Result<(), String> {
        let body = tokio::fs::read(source)
            .await
            .map_err(|error| format!("failed to read {}: {error}", source.display()))?;

        let mut request = self
            .s3_client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body));
        if public {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }

        request
            .send()
            .await
            .map(|_| ())
            .map_err(|error| format!("failed to write object to s3: {error}"))
    }

    fn object_url(&self, key: &str) -> String {
        match &self.region {
            Some(region) => format!("https://{}.s3.{region}.amazonaws.com/{key}", self.bucket),
            None => format!("https://{}.s3.amazonaws.com/{key}", self.bucket),
        }
    }
}

/// Maps an object key under `prefix` to a file below `destination`.
/// Folder markers and keys escaping the destination are skipped.
fn local_path_for(destination: &Path, prefix: &str, key: &str) -> Option<PathBuf> {
    let relative = key.strip_prefix(prefix)?;
    if relative.is_empty() || relative.ends_with('/') {
        return None;
    }

    let mut path = destination.to_path_buf();
    for segment in relative.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return None;
        }
        path.push(segment);
    }
    Some(path)
}
