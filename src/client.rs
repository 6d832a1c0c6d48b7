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

//! Client facades.
//!
//! [`AsyncBucketClient`] is the primary surface: one client per bucket,
//! wrapping an adapter resolved from the provider registry. Every adapter
//! error crossing the facade is classified through the adapter's own
//! `exception_kind` and re-raised as a [`BlobError`], so callers never see
//! a provider-native error type.
//!
//! [`BucketClient`] is the blocking mirror for synchronous callers. All
//! blocking clients in the process share one multi-threaded runtime that is
//! created lazily on first use.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWrite;
use tokio::runtime::Runtime;
use tracing::debug;
use url::Url;

use crate::config::BlobStoreConfig;
use crate::directory::DirectoryTransfer;
use crate::error::{BlobError, BlobResult, StoreError};
use crate::model::{
    BlobIdentifier, BlobMetadata, CopyRequest, CopyResponse, DirectoryDownloadRequest,
    DirectoryDownloadResponse, DirectoryUploadRequest, DirectoryUploadResponse, DownloadRequest,
    DownloadResponse, DownloadStream, ListBlobsBatch, ListBlobsRequest, ListPageRequest,
    ListPageResponse, MultipartPart, MultipartUpload, ObjectLockInfo, PresignedUrlRequest,
    UploadPartResponse, UploadRequest, UploadResponse,
};
use crate::registry;
use crate::store::{BlobStore, ByteStream};

static BLOCKING_RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Runtime shared by every blocking client in the process.
fn blocking_runtime() -> &'static Runtime {
    BLOCKING_RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("multiblob-io")
            .build()
            .expect("failed to start the shared blob I/O runtime")
    })
}

/// Asynchronous per-bucket client.
///
/// Cheap to clone; clones share the underlying adapter.
#[derive(Clone, Debug)]
pub struct AsyncBucketClient {
    store: Arc<dyn BlobStore>,
    directory_concurrency: Option<usize>,
}

impl AsyncBucketClient {
    /// Resolves the configured provider from the asynchronous registry table
    /// and builds a client over it.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` when the provider id is not registered,
    /// or with whatever the adapter factory reports for a bad configuration.
    pub fn new(config: BlobStoreConfig) -> BlobResult<Self> {
        let directory_concurrency = config.directory_concurrency;
        let store = registry::resolve_async_blob_store(config)?;
        debug!(bucket = store.bucket(), "built async bucket client");
        Ok(Self {
            store,
            directory_concurrency,
        })
    }

    /// Wraps an already-built adapter. Mostly useful for custom providers
    /// that bypass the registry.
    pub fn from_store(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            directory_concurrency: None,
        }
    }

    pub fn bucket(&self) -> &str {
        self.store.bucket()
    }

    fn classify(&self, error: StoreError) -> BlobError {
        raise(self.store.as_ref(), error)
    }

    fn directory_transfer(&self) -> DirectoryTransfer {
        let transfer = DirectoryTransfer::new(Arc::clone(&self.store));
        match self.directory_concurrency {
            Some(concurrency) => transfer.with_concurrency(concurrency),
            None => transfer,
        }
    }

    /// Uploads an in-memory payload.
    pub async fn upload(
        &self,
        request: &UploadRequest,
        content: Bytes,
    ) -> BlobResult<UploadResponse> {
        self.store
            .upload_bytes(request, content)
            .await
            .map_err(|e| self.classify(e))
    }

    /// Uploads from a byte stream without buffering the whole payload.
    pub async fn upload_stream(
        &self,
        request: &UploadRequest,
        stream: ByteStream,
    ) -> BlobResult<UploadResponse> {
        self.store
            .upload_stream(request, stream)
            .await
            .map_err(|e| self.classify(e))
    }

    /// Uploads the contents of a local file.
    pub async fn upload_file(
        &self,
        request: &UploadRequest,
        path: &Path,
    ) -> BlobResult<UploadResponse> {
        self.store
            .upload_file(request, path)
            .await
            .map_err(|e| self.classify(e))
    }

    /// Downloads the object into memory.
    pub async fn download(
        &self,
        request: &DownloadRequest,
    ) -> BlobResult<(DownloadResponse, Bytes)> {
        self.store
            .download_bytes(request)
            .await
            .map_err(|e| self.classify(e))
    }

    pub async fn download_to_writer(
        &self,
        request: &DownloadRequest,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> BlobResult<DownloadResponse> {
        self.store
            .download_to_writer(request, writer)
            .await
            .map_err(|e| self.classify(e))
    }

    /// Downloads into a fresh local file. Fails with `FailedPrecondition`
    /// when the destination already exists.
    pub async fn download_to_file(
        &self,
        request: &DownloadRequest,
        path: &Path,
    ) -> BlobResult<DownloadResponse> {
        self.store
            .download_to_file(request, path)
            .await
            .map_err(|e| self.classify(e))
    }

    /// Opens a streaming download and hands the stream to the caller.
    pub async fn download_stream(&self, request: &DownloadRequest) -> BlobResult<DownloadStream> {
        self.store
            .download_stream(request)
            .await
            .map_err(|e| self.classify(e))
    }

    /// Deletes one object. Deleting an absent key is success.
    pub async fn delete(&self, key: &str, version_id: Option<&str>) -> BlobResult<()> {
        self.store
            .delete(key, version_id)
            .await
            .map_err(|e| self.classify(e))
    }

    pub async fn delete_batch(&self, identifiers: &[BlobIdentifier]) -> BlobResult<()> {
        self.store
            .delete_batch(identifiers)
            .await
            .map_err(|e| self.classify(e))
    }

    /// Server-side copy within the bucket.
    pub async fn copy(&self, request: &CopyRequest) -> BlobResult<CopyResponse> {
        self.store.copy(request).await.map_err(|e| self.classify(e))
    }

    /// Fetches object metadata. Never cached.
    pub async fn get_metadata(
        &self,
        key: &str,
        version_id: Option<&str>,
    ) -> BlobResult<BlobMetadata> {
        self.store
            .get_metadata(key, version_id)
            .await
            .map_err(|e| self.classify(e))
    }

    /// Fetches one explicit page of listing results.
    pub async fn list_page(&self, request: &ListPageRequest) -> BlobResult<ListPageResponse> {
        self.store
            .list_page(request)
            .await
            .map_err(|e| self.classify(e))
    }

    /// Streams the full listing to the consumer, one batch per backend page.
    pub async fn list(
        &self,
        request: &ListBlobsRequest,
        consumer: &mut (dyn FnMut(ListBlobsBatch) + Send),
    ) -> BlobResult<()> {
        self.store
            .list(request, consumer)
            .await
            .map_err(|e| self.classify(e))
    }

    pub async fn initiate_multipart_upload(
        &self,
        request: &UploadRequest,
    ) -> BlobResult<MultipartUpload> {
        self.store
            .initiate_multipart_upload(request)
            .await
            .map_err(|e| self.classify(e))
    }

    pub async fn upload_part(
        &self,
        mpu: &MultipartUpload,
        part: MultipartPart,
    ) -> BlobResult<UploadPartResponse> {
        self.store
            .upload_part(mpu, part)
            .await
            .map_err(|e| self.classify(e))
    }

    pub async fn complete_multipart_upload(
        &self,
        mpu: &MultipartUpload,
        parts: &[UploadPartResponse],
    ) -> BlobResult<UploadResponse> {
        self.store
            .complete_multipart_upload(mpu, parts)
            .await
            .map_err(|e| self.classify(e))
    }

    pub async fn list_multipart_upload(
        &self,
        mpu: &MultipartUpload,
    ) -> BlobResult<Vec<UploadPartResponse>> {
        self.store
            .list_multipart_upload(mpu)
            .await
            .map_err(|e| self.classify(e))
    }

    /// Abandons the upload and discards its parts. Aborting an unknown or
    /// already-finished upload is success.
    pub async fn abort_multipart_upload(&self, mpu: &MultipartUpload) -> BlobResult<()> {
        self.store
            .abort_multipart_upload(mpu)
            .await
            .map_err(|e| self.classify(e))
    }

    pub async fn get_tags(&self, key: &str) -> BlobResult<HashMap<String, String>> {
        self.store.get_tags(key).await.map_err(|e| self.classify(e))
    }

    /// Replaces the full tag set on the object.
    pub async fn set_tags(&self, key: &str, tags: HashMap<String, String>) -> BlobResult<()> {
        self.store
            .set_tags(key, tags)
            .await
            .map_err(|e| self.classify(e))
    }

    pub async fn generate_presigned_url(&self, request: &PresignedUrlRequest) -> BlobResult<Url> {
        self.store
            .generate_presigned_url(request)
            .await
            .map_err(|e| self.classify(e))
    }

    /// Existence probe. A missing object answers `false`; any other backend
    /// failure is raised as an error.
    pub async fn does_object_exist(
        &self,
        key: &str,
        version_id: Option<&str>,
    ) -> BlobResult<bool> {
        self.store
            .does_object_exist(key, version_id)
            .await
            .map_err(|e| self.classify(e))
    }

    pub async fn does_bucket_exist(&self) -> BlobResult<bool> {
        self.store
            .does_bucket_exist()
            .await
            .map_err(|e| self.classify(e))
    }

    pub async fn get_object_lock(
        &self,
        key: &str,
        version_id: Option<&str>,
    ) -> BlobResult<ObjectLockInfo> {
        self.store
            .get_object_lock(key, version_id)
            .await
            .map_err(|e| self.classify(e))
    }

    /// Moves the retention deadline on a GOVERNANCE-mode lock.
    pub async fn update_object_retention(
        &self,
        key: &str,
        version_id: Option<&str>,
        retain_until: DateTime<Utc>,
    ) -> BlobResult<()> {
        self.store
            .update_object_retention(key, version_id, retain_until)
            .await
            .map_err(|e| self.classify(e))
    }

    pub async fn update_legal_hold(
        &self,
        key: &str,
        version_id: Option<&str>,
        enabled: bool,
    ) -> BlobResult<()> {
        self.store
            .update_legal_hold(key, version_id, enabled)
            .await
            .map_err(|e| self.classify(e))
    }

    /// Uploads a local directory tree under a remote prefix. Per-file
    /// failures are reported in the response, not raised.
    pub async fn upload_directory(
        &self,
        request: &DirectoryUploadRequest,
    ) -> BlobResult<DirectoryUploadResponse> {
        self.directory_transfer()
            .upload_directory(request)
            .await
            .map_err(|e| self.classify(e))
    }

    /// Downloads every object under a remote prefix into a local directory.
    pub async fn download_directory(
        &self,
        request: &DirectoryDownloadRequest,
    ) -> BlobResult<DirectoryDownloadResponse> {
        self.directory_transfer()
            .download_directory(request)
            .await
            .map_err(|e| self.classify(e))
    }

    /// Deletes every object under the prefix, in bulk-delete batches.
    pub async fn delete_directory(&self, prefix: &str) -> BlobResult<()> {
        self.directory_transfer()
            .delete_directory(prefix)
            .await
            .map_err(|e| self.classify(e))
    }
}

/// Blocking per-bucket client.
///
/// Delegates every call to an inner [`AsyncBucketClient`] on the shared
/// process-wide runtime. Must not be called from inside an async context.
#[derive(Clone, Debug)]
pub struct BucketClient {
    inner: AsyncBucketClient,
}

impl BucketClient {
    /// Resolves the configured provider from the blocking registry table.
    pub fn new(config: BlobStoreConfig) -> BlobResult<Self> {
        let directory_concurrency = config.directory_concurrency;
        let store = registry::resolve_blob_store(config)?;
        debug!(bucket = store.bucket(), "built blocking bucket client");
        Ok(Self {
            inner: AsyncBucketClient {
                store,
                directory_concurrency,
            },
        })
    }

    pub fn from_store(store: Arc<dyn BlobStore>) -> Self {
        Self {
            inner: AsyncBucketClient::from_store(store),
        }
    }

    pub fn bucket(&self) -> &str {
        self.inner.bucket()
    }

    pub fn upload(&self, request: &UploadRequest, content: Bytes) -> BlobResult<UploadResponse> {
        blocking_runtime().block_on(self.inner.upload(request, content))
    }

    pub fn upload_stream(
        &self,
        request: &UploadRequest,
        stream: ByteStream,
    ) -> BlobResult<UploadResponse> {
        blocking_runtime().block_on(self.inner.upload_stream(request, stream))
    }

    pub fn upload_file(&self, request: &UploadRequest, path: &Path) -> BlobResult<UploadResponse> {
        blocking_runtime().block_on(self.inner.upload_file(request, path))
    }

    pub fn download(&self, request: &DownloadRequest) -> BlobResult<(DownloadResponse, Bytes)> {
        blocking_runtime().block_on(self.inner.download(request))
    }

    pub fn download_to_writer(
        &self,
        request: &DownloadRequest,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> BlobResult<DownloadResponse> {
        blocking_runtime().block_on(self.inner.download_to_writer(request, writer))
    }

    pub fn download_to_file(
        &self,
        request: &DownloadRequest,
        path: &Path,
    ) -> BlobResult<DownloadResponse> {
        blocking_runtime().block_on(self.inner.download_to_file(request, path))
    }

    pub fn delete(&self, key: &str, version_id: Option<&str>) -> BlobResult<()> {
        blocking_runtime().block_on(self.inner.delete(key, version_id))
    }

    pub fn delete_batch(&self, identifiers: &[BlobIdentifier]) -> BlobResult<()> {
        blocking_runtime().block_on(self.inner.delete_batch(identifiers))
    }

    pub fn copy(&self, request: &CopyRequest) -> BlobResult<CopyResponse> {
        blocking_runtime().block_on(self.inner.copy(request))
    }

    pub fn get_metadata(&self, key: &str, version_id: Option<&str>) -> BlobResult<BlobMetadata> {
        blocking_runtime().block_on(self.inner.get_metadata(key, version_id))
    }

    pub fn list_page(&self, request: &ListPageRequest) -> BlobResult<ListPageResponse> {
        blocking_runtime().block_on(self.inner.list_page(request))
    }

    pub fn list(
        &self,
        request: &ListBlobsRequest,
        consumer: &mut (dyn FnMut(ListBlobsBatch) + Send),
    ) -> BlobResult<()> {
        blocking_runtime().block_on(self.inner.list(request, consumer))
    }

    pub fn initiate_multipart_upload(
        &self,
        request: &UploadRequest,
    ) -> BlobResult<MultipartUpload> {
        blocking_runtime().block_on(self.inner.initiate_multipart_upload(request))
    }

    pub fn upload_part(
        &self,
        mpu: &MultipartUpload,
        part: MultipartPart,
    ) -> BlobResult<UploadPartResponse> {
        blocking_runtime().block_on(self.inner.upload_part(mpu, part))
    }

    pub fn complete_multipart_upload(
        &self,
        mpu: &MultipartUpload,
        parts: &[UploadPartResponse],
    ) -> BlobResult<UploadResponse> {
        blocking_runtime().block_on(self.inner.complete_multipart_upload(mpu, parts))
    }

    pub fn list_multipart_upload(
        &self,
        mpu: &MultipartUpload,
    ) -> BlobResult<Vec<UploadPartResponse>> {
        blocking_runtime().block_on(self.inner.list_multipart_upload(mpu))
    }

    pub fn abort_multipart_upload(&self, mpu: &MultipartUpload) -> BlobResult<()> {
        blocking_runtime().block_on(self.inner.abort_multipart_upload(mpu))
    }

    pub fn get_tags(&self, key: &str) -> BlobResult<HashMap<String, String>> {
        blocking_runtime().block_on(self.inner.get_tags(key))
    }

    pub fn set_tags(&self, key: &str, tags: HashMap<String, String>) -> BlobResult<()> {
        blocking_runtime().block_on(self.inner.set_tags(key, tags))
    }

    pub fn generate_presigned_url(&self, request: &PresignedUrlRequest) -> BlobResult<Url> {
        blocking_runtime().block_on(self.inner.generate_presigned_url(request))
    }

    pub fn does_object_exist(&self, key: &str, version_id: Option<&str>) -> BlobResult<bool> {
        blocking_runtime().block_on(self.inner.does_object_exist(key, version_id))
    }

    pub fn does_bucket_exist(&self) -> BlobResult<bool> {
        blocking_runtime().block_on(self.inner.does_bucket_exist())
    }

    pub fn get_object_lock(
        &self,
        key: &str,
        version_id: Option<&str>,
    ) -> BlobResult<ObjectLockInfo> {
        blocking_runtime().block_on(self.inner.get_object_lock(key, version_id))
    }

    pub fn update_object_retention(
        &self,
        key: &str,
        version_id: Option<&str>,
        retain_until: DateTime<Utc>,
    ) -> BlobResult<()> {
        blocking_runtime().block_on(self.inner.update_object_retention(key, version_id, retain_until))
    }

    pub fn update_legal_hold(
        &self,
        key: &str,
        version_id: Option<&str>,
        enabled: bool,
    ) -> BlobResult<()> {
        blocking_runtime().block_on(self.inner.update_legal_hold(key, version_id, enabled))
    }

    pub fn upload_directory(
        &self,
        request: &DirectoryUploadRequest,
    ) -> BlobResult<DirectoryUploadResponse> {
        blocking_runtime().block_on(self.inner.upload_directory(request))
    }

    pub fn download_directory(
        &self,
        request: &DirectoryDownloadRequest,
    ) -> BlobResult<DirectoryDownloadResponse> {
        blocking_runtime().block_on(self.inner.download_directory(request))
    }

    pub fn delete_directory(&self, prefix: &str) -> BlobResult<()> {
        blocking_runtime().block_on(self.inner.delete_directory(prefix))
    }
}

/// Classifies an adapter error and re-raises it as a [`BlobError`].
///
/// An error the adapter itself produced client-side is already a
/// `BlobError`; it is returned as-is so its kind and message survive.
fn raise(store: &dyn BlobStore, error: StoreError) -> BlobError {
    let kind = store.exception_kind(&error);
    match error.into_inner().downcast::<BlobError>() {
        Ok(inner) => *inner,
        Err(native) => {
            let message = native.to_string();
            BlobError::with_source(kind, message, native)
        }
    }
}
