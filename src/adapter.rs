// Copyright 2025 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.
//
// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

//! Bundled storage adapter over the `object_store` crate.
//!
//! One adapter covers the `local`, `memory`, `aws`, `azure`, and `gcs`
//! provider ids; the concrete backend is chosen once at build time. Tagging,
//! user metadata, and object-lock records live in adapter-local tables
//! because the underlying crate exposes no wire API for them; the contract
//! and failure semantics here are what real cloud adapters must reproduce.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{ClientOptions, GetOptions, GetRange, ObjectStore, PutPayload, WriteMultipart};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{BlobStoreConfig, CredentialsOverride};
use crate::error::{BlobError, ErrorKind, StoreError, StoreResult};
use crate::model::{
    BlobIdentifier, BlobInfo, BlobMetadata, CopyRequest, CopyResponse, DownloadRequest,
    DownloadResponse, DownloadStream, ListPageRequest, ListPageResponse, MultipartPart,
    MultipartUpload, ObjectLockInfo, PresignOperation, PresignedUrlRequest, RetentionMode,
    UploadPartResponse, UploadRequest, UploadResponse,
};
use crate::multipart::MultipartStateMachine;
use crate::store::{BlobStore, ByteStream};

const DEFAULT_PAGE_SIZE: usize = 1000;
const DEFAULT_PART_BUFFER_SIZE: usize = 10 * 1024 * 1024;
/// Concurrent in-flight parts per streamed upload.
const STREAM_UPLOAD_CONCURRENCY: usize = 8;

/// Storage adapter backed by an `object_store` client.
pub struct ObjectStoreAdapter {
    config: BlobStoreConfig,
    store: Arc<dyn ObjectStore>,
    signer: Option<Arc<dyn Signer>>,
    multipart: MultipartStateMachine,
    tags: Mutex<HashMap<String, HashMap<String, String>>>,
    user_metadata: Mutex<HashMap<String, HashMap<String, String>>>,
    locks: Mutex<HashMap<String, ObjectLockInfo>>,
}

impl std::fmt::Debug for ObjectStoreAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ObjectStoreAdapter(provider={}, bucket={})",
            self.config.provider_id, self.config.bucket
        )
    }
}

impl ObjectStoreAdapter {
    /// Builds the native client for the configured provider.
    ///
    /// Every configuration field is translated into native client options
    /// here, once; unset fields leave the native defaults untouched. When
    /// parallel downloads are enabled a high-throughput client option
    /// profile is selected instead of the standard one.
    pub fn try_new(config: BlobStoreConfig) -> crate::error::BlobResult<Self> {
        if let Some(CredentialsOverride::AssumeRole { role_arn, .. }) = &config.credentials {
            return Err(BlobError::invalid_argument(format!(
                "provider {} cannot assume role {}",
                config.provider_id, role_arn
            )));
        }

        let (store, signer) = build_store(&config)?;
        info!(
            provider = %config.provider_id,
            bucket = %config.bucket,
            parallel_downloads = config.parallel_downloads_enabled,
            "built storage adapter"
        );
        Ok(Self {
            config,
            store,
            signer,
            multipart: MultipartStateMachine::new(),
            tags: Mutex::new(HashMap::new()),
            user_metadata: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        })
    }

    fn part_buffer_size(&self) -> usize {
        self.config.part_buffer_size.unwrap_or(DEFAULT_PART_BUFFER_SIZE)
    }

    fn record_upload_side_tables(&self, request: &UploadRequest) {
        if !request.metadata.is_empty() {
            lock(&self.user_metadata).insert(request.key.clone(), request.metadata.clone());
        }
        if !request.tags.is_empty() {
            lock(&self.tags).insert(request.key.clone(), request.tags.clone());
        }
    }

    fn stored_metadata(&self, key: &str) -> HashMap<String, String> {
        lock(&self.user_metadata).get(key).cloned().unwrap_or_default()
    }

    async fn get_result(
        &self,
        request: &DownloadRequest,
    ) -> StoreResult<object_store::GetResult> {
        let options = GetOptions {
            range: request.range.map(|range| {
                GetRange::Bounded(range.start as usize..(range.end + 1) as usize)
            }),
            version: request.version_id.clone(),
            ..Default::default()
        };
        let path = ObjectPath::from(request.key.as_str());
        Ok(self.store.get_opts(&path, options).await?)
    }

    fn download_response(
        &self,
        request: &DownloadRequest,
        meta: &object_store::ObjectMeta,
    ) -> DownloadResponse {
        // A range-scoped download reports the range's length, not the
        // object's full size.
        let size = match request.range {
            Some(range) => range.len(),
            None => meta.size as u64,
        };
        DownloadResponse {
            key: request.key.clone(),
            version_id: meta.version.clone(),
            e_tag: meta.e_tag.clone(),
            size,
            last_modified: Some(meta.last_modified),
            metadata: self.stored_metadata(&request.key),
        }
    }

    /// Requires the object to exist; used by the tag and lock operations so
    /// a missing key surfaces as the backend's not-found error.
    async fn require_object(&self, key: &str) -> StoreResult<()> {
        let path = ObjectPath::from(key);
        self.store.head(&path).await?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn seed_object_lock(&self, key: &str, lock_info: ObjectLockInfo) {
        lock(&self.locks).insert(key.to_string(), lock_info);
    }
}

#[async_trait]
impl BlobStore for ObjectStoreAdapter {
    fn bucket(&self) -> &str {
        &self.config.bucket
    }

    async fn upload_bytes(
        &self,
        request: &UploadRequest,
        content: Bytes,
    ) -> StoreResult<UploadResponse> {
        let path = ObjectPath::from(request.key.as_str());
        let result = self.store.put(&path, PutPayload::from(content)).await?;
        self.record_upload_side_tables(request);
        Ok(UploadResponse {
            key: request.key.clone(),
            version_id: result.version,
            e_tag: result.e_tag,
        })
    }

    async fn upload_stream(
        &self,
        request: &UploadRequest,
        mut stream: ByteStream,
    ) -> StoreResult<UploadResponse> {
        let path = ObjectPath::from(request.key.as_str());
        let upload = self.store.put_multipart(&path).await?;
        let mut writer = WriteMultipart::new_with_chunk_size(upload, self.part_buffer_size());
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return Err(abandon_upload(writer, &request.key, e.into()).await),
            };
            if let Err(e) = writer.wait_for_capacity(STREAM_UPLOAD_CONCURRENCY).await {
                return Err(abandon_upload(writer, &request.key, e.into()).await);
            }
            writer.write(&chunk);
        }
        let result = writer.finish().await?;
        self.record_upload_side_tables(request);
        Ok(UploadResponse {
            key: request.key.clone(),
            version_id: result.version,
            e_tag: result.e_tag,
        })
    }

    async fn upload_file(
        &self,
        request: &UploadRequest,
        path: &Path,
    ) -> StoreResult<UploadResponse> {
        let content = tokio::fs::read(path).await.map_err(|e| {
            StoreError::from(BlobError::with_source(
                ErrorKind::InvalidArgument,
                format!("cannot read upload source {}", path.display()),
                e,
            ))
        })?;
        self.upload_bytes(request, Bytes::from(content)).await
    }

    async fn download_bytes(
        &self,
        request: &DownloadRequest,
    ) -> StoreResult<(DownloadResponse, Bytes)> {
        let result = self.get_result(request).await?;
        let response = self.download_response(request, &result.meta);
        let content = result.bytes().await?;
        Ok((response, content))
    }

    async fn download_to_writer(
        &self,
        request: &DownloadRequest,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> StoreResult<DownloadResponse> {
        let result = self.get_result(request).await?;
        let response = self.download_response(request, &result.meta);
        let mut stream = result.into_stream();
        while let Some(chunk) = stream.next().await {
            writer.write_all(&chunk?).await?;
        }
        writer.flush().await?;
        Ok(response)
    }

    async fn download_to_file(
        &self,
        request: &DownloadRequest,
        path: &Path,
    ) -> StoreResult<DownloadResponse> {
        // Collision check happens before any backend call.
        if tokio::fs::try_exists(path).await? {
            return Err(BlobError::failed_precondition(format!(
                "destination file already exists: {}",
                path.display()
            ))
            .into());
        }
        let mut file = tokio::fs::File::create(path).await?;
        let transfer = match self.download_to_writer(request, &mut file).await {
            Ok(response) => file.sync_all().await.map(|()| response).map_err(StoreError::from),
            Err(e) => Err(e),
        };
        match transfer {
            Ok(response) => Ok(response),
            Err(e) => {
                // Remove the partial file so a retry does not hit the
                // collision check.
                drop(file);
                if let Err(remove_error) = tokio::fs::remove_file(path).await {
                    warn!(
                        path = %path.display(),
                        error = %remove_error,
                        "failed to remove partial download"
                    );
                }
                Err(e)
            }
        }
    }

    async fn download_stream(&self, request: &DownloadRequest) -> StoreResult<DownloadStream> {
        let result = self.get_result(request).await?;
        let info = self.download_response(request, &result.meta);
        let provider_id = self.config.provider_id.clone();
        let stream = result
            .into_stream()
            .map(move |chunk| {
                chunk.map_err(|e| {
                    let store_error = StoreError::from(e);
                    let kind = classify_error(&provider_id, &store_error);
                    BlobError::with_source(kind, "download stream failed", store_error)
                })
            })
            .boxed();
        Ok(DownloadStream { info, stream })
    }

    async fn delete(&self, key: &str, version_id: Option<&str>) -> StoreResult<()> {
        if version_id.is_some() {
            return Err(BlobError::invalid_argument(
                "this provider does not support version-scoped deletes",
            )
            .into());
        }
        let path = ObjectPath::from(key);
        match self.store.delete(&path).await {
            Ok(()) => {}
            // Deleting a non-existent key is success.
            Err(object_store::Error::NotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }
        lock(&self.tags).remove(key);
        lock(&self.user_metadata).remove(key);
        lock(&self.locks).remove(key);
        Ok(())
    }

    async fn delete_batch(&self, identifiers: &[BlobIdentifier]) -> StoreResult<()> {
        let mut first_error = None;
        for identifier in identifiers {
            if let Err(e) = self
                .delete(&identifier.key, identifier.version_id.as_deref())
                .await
            {
                warn!(key = %identifier.key, error = %e, "delete failed in batch");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn copy(&self, request: &CopyRequest) -> StoreResult<CopyResponse> {
        if let Some(src_bucket) = &request.src_bucket {
            if src_bucket != &self.config.bucket {
                return Err(BlobError::invalid_argument(format!(
                    "this provider cannot copy across buckets (source bucket {})",
                    src_bucket
                ))
                .into());
            }
        }
        if request.src_version_id.is_some() {
            return Err(BlobError::invalid_argument(
                "this provider does not support version-scoped copies",
            )
            .into());
        }
        let src = ObjectPath::from(request.src_key.as_str());
        let dest = ObjectPath::from(request.dest_key.as_str());
        self.store.copy(&src, &dest).await?;
        let meta = self.store.head(&dest).await?;

        let src_tags = lock(&self.tags).get(&request.src_key).cloned();
        if let Some(src_tags) = src_tags {
            lock(&self.tags).insert(request.dest_key.clone(), src_tags);
        }
        let src_metadata = lock(&self.user_metadata).get(&request.src_key).cloned();
        if let Some(src_metadata) = src_metadata {
            lock(&self.user_metadata).insert(request.dest_key.clone(), src_metadata);
        }

        Ok(CopyResponse {
            key: request.dest_key.clone(),
            version_id: meta.version,
            e_tag: meta.e_tag,
            last_modified: Some(meta.last_modified),
        })
    }

    async fn get_metadata(&self, key: &str, version_id: Option<&str>) -> StoreResult<BlobMetadata> {
        let options = GetOptions {
            head: true,
            version: version_id.map(str::to_string),
            ..Default::default()
        };
        let path = ObjectPath::from(key);
        let result = self.store.get_opts(&path, options).await?;
        let meta = result.meta;
        Ok(BlobMetadata {
            key: key.to_string(),
            version_id: meta.version.clone(),
            e_tag: meta.e_tag.clone(),
            size: meta.size as u64,
            metadata: self.stored_metadata(key),
            last_modified: Some(meta.last_modified),
            content_md5: meta.e_tag.as_deref().and_then(content_md5_from_etag),
        })
    }

    async fn list_page(&self, request: &ListPageRequest) -> StoreResult<ListPageResponse> {
        // A zero-sized page could never carry a continuation token and
        // would stall any caller that pages to exhaustion.
        if request.max_results == Some(0) {
            return Err(BlobError::invalid_argument("max_results must be at least 1").into());
        }
        let prefix = request
            .prefix
            .as_deref()
            .map(|p| ObjectPath::from(p.trim_end_matches('/')));

        // Delimiter-scoped listings are served by the native grouped list,
        // which is never truncated.
        if request.delimiter.is_some() {
            let listing = self.store.list_with_delimiter(prefix.as_ref()).await?;
            let blobs = listing
                .objects
                .into_iter()
                .map(|meta| BlobInfo {
                    key: meta.location.to_string(),
                    size: meta.size as u64,
                    last_modified: Some(meta.last_modified),
                })
                .collect();
            return Ok(ListPageResponse {
                blobs,
                truncated: false,
                next_token: None,
            });
        }

        let limit = request.max_results.unwrap_or(DEFAULT_PAGE_SIZE);
        let mut stream = match request.pagination_token.as_deref() {
            Some(token) => {
                let offset = ObjectPath::from(token);
                self.store.list_with_offset(prefix.as_ref(), &offset)
            }
            None => self.store.list(prefix.as_ref()),
        };

        let mut blobs = Vec::with_capacity(limit.min(DEFAULT_PAGE_SIZE));
        let mut truncated = false;
        while let Some(meta) = stream.next().await {
            let meta = meta?;
            if blobs.len() == limit {
                // One extra entry proves the page is truncated.
                truncated = true;
                break;
            }
            blobs.push(BlobInfo {
                key: meta.location.to_string(),
                size: meta.size as u64,
                last_modified: Some(meta.last_modified),
            });
        }
        let next_token = if truncated {
            blobs.last().map(|blob| blob.key.clone())
        } else {
            None
        };
        Ok(ListPageResponse {
            blobs,
            truncated,
            next_token,
        })
    }

    async fn initiate_multipart_upload(
        &self,
        request: &UploadRequest,
    ) -> StoreResult<MultipartUpload> {
        let mpu = self.multipart.initiate(&self.config.bucket, request);
        debug!(key = %request.key, id = %mpu.id, "initiated multipart upload");
        Ok(mpu)
    }

    async fn upload_part(
        &self,
        mpu: &MultipartUpload,
        part: MultipartPart,
    ) -> StoreResult<UploadPartResponse> {
        self.multipart
            .insert_part(&mpu.id, part.part_number, part.content)
    }

    async fn complete_multipart_upload(
        &self,
        mpu: &MultipartUpload,
        parts: &[UploadPartResponse],
    ) -> StoreResult<UploadResponse> {
        let completed = self.multipart.take_completed(&mpu.id, parts)?;
        let path = ObjectPath::from(completed.key.as_str());
        // Compose server-side with a single native put.
        let result = self.store.put(&path, PutPayload::from(completed.content)).await;
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                // The upload was consumed; the caller can only retry from
                // initiate, matching an aborted native upload.
                warn!(key = %completed.key, error = %e, "composed put failed");
                return Err(e.into());
            }
        };
        if !completed.metadata.is_empty() {
            lock(&self.user_metadata).insert(completed.key.clone(), completed.metadata);
        }
        if !completed.tags.is_empty() {
            lock(&self.tags).insert(completed.key.clone(), completed.tags);
        }
        debug!(key = %completed.key, id = %mpu.id, "completed multipart upload");
        Ok(UploadResponse {
            key: completed.key,
            version_id: result.version,
            e_tag: Some(completed.e_tag),
        })
    }

    async fn list_multipart_upload(
        &self,
        mpu: &MultipartUpload,
    ) -> StoreResult<Vec<UploadPartResponse>> {
        self.multipart.list_parts(&mpu.id)
    }

    async fn abort_multipart_upload(&self, mpu: &MultipartUpload) -> StoreResult<()> {
        self.multipart.abort(&mpu.id);
        Ok(())
    }

    async fn get_tags(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.require_object(key).await?;
        Ok(lock(&self.tags).get(key).cloned().unwrap_or_default())
    }

    async fn set_tags(&self, key: &str, tags: HashMap<String, String>) -> StoreResult<()> {
        self.require_object(key).await?;
        // Full replace, not a merge.
        lock(&self.tags).insert(key.to_string(), tags);
        Ok(())
    }

    async fn generate_presigned_url(&self, request: &PresignedUrlRequest) -> StoreResult<Url> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            StoreError::from(BlobError::invalid_argument(format!(
                "provider {} does not support presigned URLs",
                self.config.provider_id
            )))
        })?;
        let method = match request.operation {
            PresignOperation::Upload => reqwest::Method::PUT,
            PresignOperation::Download => reqwest::Method::GET,
        };
        let path = ObjectPath::from(request.key.as_str());
        let url = signer.signed_url(method, &path, request.duration).await?;
        Ok(url)
    }

    async fn does_object_exist(&self, key: &str, version_id: Option<&str>) -> StoreResult<bool> {
        let options = GetOptions {
            head: true,
            version: version_id.map(str::to_string),
            ..Default::default()
        };
        let path = ObjectPath::from(key);
        match self.store.get_opts(&path, options).await {
            Ok(_) => Ok(true),
            // 404-as-false; every other backend error propagates.
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn does_bucket_exist(&self) -> StoreResult<bool> {
        let mut stream = self.store.list(None);
        match stream.next().await {
            None | Some(Ok(_)) => Ok(true),
            Some(Err(object_store::Error::NotFound { .. })) => Ok(false),
            Some(Err(e)) => Err(e.into()),
        }
    }

    async fn get_object_lock(
        &self,
        key: &str,
        _version_id: Option<&str>,
    ) -> StoreResult<ObjectLockInfo> {
        self.require_object(key).await?;
        Ok(lock(&self.locks).get(key).cloned().unwrap_or_default())
    }

    async fn update_object_retention(
        &self,
        key: &str,
        version_id: Option<&str>,
        retain_until: DateTime<Utc>,
    ) -> StoreResult<()> {
        // Current retention is read first; the mutating call is never issued
        // when the precondition fails.
        let current = self.get_object_lock(key, version_id).await?;
        match current.retention_mode {
            None => {
                return Err(BlobError::failed_precondition(format!(
                    "no retention is configured on {}",
                    key
                ))
                .into());
            }
            Some(RetentionMode::Compliance) => {
                return Err(BlobError::failed_precondition(format!(
                    "retention on {} is in COMPLIANCE mode and cannot be changed",
                    key
                ))
                .into());
            }
            Some(RetentionMode::Governance) => {}
        }
        let mut locks = lock(&self.locks);
        if let Some(lock_info) = locks.get_mut(key) {
            lock_info.retain_until = Some(retain_until);
        }
        Ok(())
    }

    async fn update_legal_hold(
        &self,
        key: &str,
        version_id: Option<&str>,
        enabled: bool,
    ) -> StoreResult<()> {
        let _ = self.get_object_lock(key, version_id).await?;
        lock(&self.locks)
            .entry(key.to_string())
            .or_default()
            .legal_hold = enabled;
        Ok(())
    }

    fn exception_kind(&self, error: &StoreError) -> ErrorKind {
        classify_error(&self.config.provider_id, error)
    }
}

/// Aborts the native upload so already-written parts are released, then
/// hands back the error that interrupted the stream.
async fn abandon_upload(writer: WriteMultipart, key: &str, error: StoreError) -> StoreError {
    if let Err(abort_error) = writer.abort().await {
        warn!(key = %key, error = %abort_error, "failed to abort interrupted multipart upload");
    }
    error
}

/// Pure classification of a native error into the normalized taxonomy.
fn classify_error(provider_id: &str, error: &StoreError) -> ErrorKind {
    // Errors this layer produced client-side keep their own kind.
    if let Some(blob) = error.downcast_ref::<BlobError>() {
        return blob.kind();
    }
    if let Some(native) = error.downcast_ref::<object_store::Error>() {
        return classify_native(provider_id, native);
    }
    if let Some(io) = error.downcast_ref::<std::io::Error>() {
        return classify_io(io);
    }
    ErrorKind::Unknown
}

fn classify_native(provider_id: &str, error: &object_store::Error) -> ErrorKind {
    match error {
        object_store::Error::NotFound { .. } => ErrorKind::ResourceNotFound,
        object_store::Error::Unauthenticated { .. }
        | object_store::Error::PermissionDenied { .. } => ErrorKind::UnAuthorized,
        object_store::Error::InvalidPath { .. }
        | object_store::Error::NotSupported { .. }
        | object_store::Error::NotImplemented
        | object_store::Error::UnknownConfigurationKey { .. } => ErrorKind::InvalidArgument,
        object_store::Error::AlreadyExists { .. }
        | object_store::Error::Precondition { .. }
        | object_store::Error::NotModified { .. } => ErrorKind::FailedPrecondition,
        object_store::Error::Generic { .. } if provider_id == "aws" => {
            // S3 can answer an auth failure as a bare 403 carrying no
            // request id; treat that shape as UnAuthorized. This rule is
            // local to the aws provider.
            let message = error.to_string();
            if message.contains("403") && !message.to_lowercase().contains("request id") {
                ErrorKind::UnAuthorized
            } else {
                ErrorKind::Unknown
            }
        }
        _ => ErrorKind::Unknown,
    }
}

fn classify_io(error: &std::io::Error) -> ErrorKind {
    match error.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::ResourceNotFound,
        std::io::ErrorKind::PermissionDenied => ErrorKind::UnAuthorized,
        std::io::ErrorKind::InvalidInput => ErrorKind::InvalidArgument,
        std::io::ErrorKind::AlreadyExists => ErrorKind::FailedPrecondition,
        _ => ErrorKind::Unknown,
    }
}

/// A strong single-part etag is the hex MD5 of the content.
fn content_md5_from_etag(e_tag: &str) -> Option<String> {
    let trimmed = e_tag.trim_matches('"');
    let is_md5 = trimmed.len() == 32 && trimmed.chars().all(|c| c.is_ascii_hexdigit());
    is_md5.then(|| trimmed.to_string())
}

fn build_store(
    config: &BlobStoreConfig,
) -> crate::error::BlobResult<(Arc<dyn ObjectStore>, Option<Arc<dyn Signer>>)> {
    match config.provider_id.as_str() {
        "local" => {
            let path = config.get_option("path").ok_or_else(|| {
                BlobError::invalid_argument("local provider requires the 'path' option")
            })?;
            let store = LocalFileSystem::new_with_prefix(path).map_err(|e| {
                BlobError::with_source(
                    ErrorKind::InvalidArgument,
                    format!("cannot open local store at {}", path),
                    e,
                )
            })?;
            Ok((Arc::new(store), None))
        }
        "memory" => Ok((Arc::new(InMemory::new()), None)),
        "aws" => {
            let mut builder = AmazonS3Builder::from_env()
                .with_bucket_name(&config.bucket)
                .with_client_options(build_client_options(config)?)
                .with_retry(build_retry_options(config));
            if let Some(region) = &config.region {
                builder = builder.with_region(region);
            }
            if let Some(endpoint) = &config.endpoint {
                builder = builder.with_endpoint(endpoint.as_str());
            }
            if let Some(CredentialsOverride::Session {
                access_key_id,
                secret_access_key,
                session_token,
            }) = &config.credentials
            {
                builder = builder
                    .with_access_key_id(access_key_id)
                    .with_secret_access_key(secret_access_key);
                if let Some(token) = session_token {
                    builder = builder.with_token(token);
                }
            }
            for (key, value) in &config.options {
                match key.parse() {
                    Ok(config_key) => builder = builder.with_config(config_key, value),
                    Err(_) => warn!(option = %key, "unknown aws option"),
                }
            }
            let store = Arc::new(builder.build().map_err(build_failure)?);
            Ok((store.clone(), Some(store)))
        }
        "azure" => {
            if matches!(&config.credentials, Some(CredentialsOverride::Session { .. })) {
                return Err(BlobError::invalid_argument(
                    "azure does not accept session credentials",
                ));
            }
            let mut builder = MicrosoftAzureBuilder::from_env()
                .with_container_name(&config.bucket)
                .with_client_options(build_client_options(config)?)
                .with_retry(build_retry_options(config));
            if let Some(endpoint) = &config.endpoint {
                builder = builder.with_endpoint(endpoint.to_string());
            }
            for (key, value) in &config.options {
                match key.parse() {
                    Ok(config_key) => builder = builder.with_config(config_key, value),
                    Err(_) => warn!(option = %key, "unknown azure option"),
                }
            }
            let store = Arc::new(builder.build().map_err(build_failure)?);
            Ok((store.clone(), Some(store)))
        }
        "gcs" => {
            if matches!(&config.credentials, Some(CredentialsOverride::Session { .. })) {
                return Err(BlobError::invalid_argument(
                    "gcs does not accept session credentials",
                ));
            }
            let mut builder = GoogleCloudStorageBuilder::from_env()
                .with_bucket_name(&config.bucket)
                .with_client_options(build_client_options(config)?)
                .with_retry(build_retry_options(config));
            for (key, value) in &config.options {
                match key.parse() {
                    Ok(config_key) => builder = builder.with_config(config_key, value),
                    Err(_) => warn!(option = %key, "unknown gcs option"),
                }
            }
            let store = Arc::new(builder.build().map_err(build_failure)?);
            Ok((store.clone(), Some(store)))
        }
        other => Err(BlobError::invalid_argument(format!(
            "unsupported provider: {}",
            other
        ))),
    }
}

fn build_failure(e: object_store::Error) -> BlobError {
    BlobError::with_source(
        ErrorKind::InvalidArgument,
        "native client construction failed",
        e,
    )
}

/// Connection options shared by the cloud backends.
///
/// With parallel downloads enabled the profile trades idle-connection reuse
/// for a larger warm pool; the choice is made once here and never revisited
/// per call.
fn build_client_options(config: &BlobStoreConfig) -> crate::error::BlobResult<ClientOptions> {
    let mut options = ClientOptions::default();

    match config.socket_timeout {
        Some(Duration::ZERO) => options = options.with_timeout_disabled(),
        Some(timeout) => options = options.with_timeout(timeout),
        None => {}
    }
    if let Some(retry) = &config.retry {
        if let Some(attempt_timeout) = retry.attempt_timeout {
            options = options.with_timeout(attempt_timeout);
        }
    }
    if let Some(idle) = config.idle_connection_timeout {
        options = options.with_pool_idle_timeout(idle);
    }
    if let Some(max_connections) = config.max_connections {
        options = options.with_pool_max_idle_per_host(max_connections as usize);
    }
    if config.parallel_downloads_enabled {
        let pool = config
            .max_concurrency
            .or(config.max_connections.map(|c| c as usize))
            .unwrap_or(64);
        options = options
            .with_pool_max_idle_per_host(pool)
            .with_pool_idle_timeout(Duration::from_secs(60));
    }

    if let Some(proxy) = resolve_proxy(config) {
        options = options.with_proxy_url(proxy);
    }
    if config.use_environment_proxy {
        if let Ok(no_proxy) = std::env::var("NO_PROXY") {
            options = options.with_proxy_excludes(no_proxy);
        }
    }
    if config
        .get_option("allow_http")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
    {
        options = options.with_allow_http(true);
    }
    Ok(options)
}

/// An explicit proxy endpoint wins; otherwise the opted-in conventions are
/// consulted, lowercase first.
fn resolve_proxy(config: &BlobStoreConfig) -> Option<String> {
    if let Some(endpoint) = &config.proxy_endpoint {
        return Some(endpoint.to_string());
    }
    if config.use_system_proxy {
        for var in ["https_proxy", "http_proxy"] {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }
    }
    if config.use_environment_proxy {
        for var in ["HTTPS_PROXY", "HTTP_PROXY"] {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }
    }
    None
}

fn build_retry_options(config: &BlobStoreConfig) -> object_store::RetryConfig {
    match &config.retry {
        Some(retry) => retry.to_native(),
        None => object_store::RetryConfig::default(),
    }
}


fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
