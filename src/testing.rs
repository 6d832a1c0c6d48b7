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

//! Scripted in-memory adapter used by unit tests.
//!
//! Behaves deterministically where backends are random: upload etags count up
//! from `eTag-1`, the first multipart id is `mpu-id`, and any operation can
//! be scripted to fail with a chosen native error via [`ScriptedStore::fail_next`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use url::Url;

use crate::error::{BlobError, ErrorKind, StoreError, StoreResult};
use crate::model::{
    BlobIdentifier, BlobMetadata, CopyRequest, CopyResponse, DownloadRequest, DownloadResponse,
    DownloadStream, ListPageRequest, ListPageResponse, MultipartPart, MultipartUpload,
    ObjectLockInfo, PresignedUrlRequest, RetentionMode, UploadPartResponse, UploadRequest,
    UploadResponse,
};
use crate::model::BlobInfo;
use crate::store::{BlobStore, ByteStream};

/// Installs the test subscriber once so `RUST_LOG` filtering works under
/// `cargo test`.
pub(crate) fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A native-looking error the scripted adapter can be told to raise.
#[derive(Debug)]
pub(crate) struct ScriptedError {
    pub kind: ErrorKind,
}

impl fmt::Display for ScriptedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scripted backend failure ({})", self.kind)
    }
}

impl std::error::Error for ScriptedError {}

pub(crate) struct ScriptedStore {
    bucket: String,
    page_size: usize,
    objects: Mutex<BTreeMap<String, Bytes>>,
    tags: Mutex<HashMap<String, HashMap<String, String>>>,
    locks: Mutex<HashMap<String, ObjectLockInfo>>,
    parts: Mutex<HashMap<String, BTreeMap<u32, (String, Bytes)>>>,
    upload_counter: AtomicU64,
    mpu_counter: AtomicU64,
    delete_batch_sizes: Mutex<Vec<usize>>,
    fail_next: Mutex<Option<ErrorKind>>,
}

impl ScriptedStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            page_size: 1000,
            objects: Mutex::new(BTreeMap::new()),
            tags: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            parts: Mutex::new(HashMap::new()),
            upload_counter: AtomicU64::new(0),
            mpu_counter: AtomicU64::new(0),
            delete_batch_sizes: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Scripts the next backend call to fail with the given kind.
    pub fn fail_next(&self, kind: ErrorKind) {
        *self.fail_next.lock().unwrap() = Some(kind);
    }

    /// Seeds an object without going through upload (no etag counter tick).
    pub fn seed(&self, key: &str, content: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), Bytes::copy_from_slice(content));
    }

    /// Seeds an object-lock record.
    pub fn seed_lock(&self, key: &str, lock: ObjectLockInfo) {
        self.locks.lock().unwrap().insert(key.to_string(), lock);
    }

    /// Sizes of every bulk-delete call issued so far, in order.
    pub fn delete_batch_sizes(&self) -> Vec<usize> {
        self.delete_batch_sizes.lock().unwrap().clone()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    fn check_scripted_failure(&self) -> StoreResult<()> {
        if let Some(kind) = self.fail_next.lock().unwrap().take() {
            return Err(StoreError::new(ScriptedError { kind }));
        }
        Ok(())
    }

    fn fetch(&self, key: &str) -> StoreResult<Bytes> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| {
                StoreError::new(ScriptedError {
                    kind: ErrorKind::ResourceNotFound,
                })
            })
    }

    fn store(&self, key: &str, content: Bytes) -> UploadResponse {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), content);
        let n = self.upload_counter.fetch_add(1, Ordering::SeqCst) + 1;
        UploadResponse {
            key: key.to_string(),
            version_id: None,
            e_tag: Some(format!("eTag-{}", n)),
        }
    }
}

#[async_trait]
impl BlobStore for ScriptedStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn upload_bytes(
        &self,
        request: &UploadRequest,
        content: Bytes,
    ) -> StoreResult<UploadResponse> {
        self.check_scripted_failure()?;
        Ok(self.store(&request.key, content))
    }

    async fn upload_stream(
        &self,
        request: &UploadRequest,
        mut stream: ByteStream,
    ) -> StoreResult<UploadResponse> {
        self.check_scripted_failure()?;
        let mut content = Vec::new();
        while let Some(chunk) = stream.next().await {
            content.extend_from_slice(&chunk?);
        }
        Ok(self.store(&request.key, Bytes::from(content)))
    }

    async fn upload_file(
        &self,
        request: &UploadRequest,
        path: &Path,
    ) -> StoreResult<UploadResponse> {
        self.check_scripted_failure()?;
        let content = tokio::fs::read(path).await?;
        Ok(self.store(&request.key, Bytes::from(content)))
    }

    async fn download_bytes(
        &self,
        request: &DownloadRequest,
    ) -> StoreResult<(DownloadResponse, Bytes)> {
        self.check_scripted_failure()?;
        let content = self.fetch(&request.key)?;
        let content = match request.range {
            Some(range) => content.slice(range.start as usize..=range.end as usize),
            None => content,
        };
        let response = DownloadResponse {
            key: request.key.clone(),
            version_id: None,
            e_tag: None,
            size: content.len() as u64,
            last_modified: None,
            metadata: HashMap::new(),
        };
        Ok((response, content))
    }

    async fn download_to_writer(
        &self,
        request: &DownloadRequest,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> StoreResult<DownloadResponse> {
        let (response, content) = self.download_bytes(request).await?;
        writer.write_all(&content).await?;
        Ok(response)
    }

    async fn download_to_file(
        &self,
        request: &DownloadRequest,
        path: &Path,
    ) -> StoreResult<DownloadResponse> {
        if tokio::fs::try_exists(path).await? {
            return Err(BlobError::failed_precondition(format!(
                "file already exists: {}",
                path.display()
            ))
            .into());
        }
        let (response, content) = self.download_bytes(request).await?;
        tokio::fs::write(path, &content).await?;
        Ok(response)
    }

    async fn download_stream(&self, request: &DownloadRequest) -> StoreResult<DownloadStream> {
        let (info, content) = self.download_bytes(request).await?;
        Ok(DownloadStream {
            info,
            stream: futures::stream::once(async move { Ok(content) }).boxed(),
        })
    }

    async fn delete(&self, key: &str, _version_id: Option<&str>) -> StoreResult<()> {
        self.check_scripted_failure()?;
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn delete_batch(&self, identifiers: &[BlobIdentifier]) -> StoreResult<()> {
        self.check_scripted_failure()?;
        self.delete_batch_sizes
            .lock()
            .unwrap()
            .push(identifiers.len());
        let mut objects = self.objects.lock().unwrap();
        for identifier in identifiers {
            objects.remove(&identifier.key);
        }
        Ok(())
    }

    async fn copy(&self, request: &CopyRequest) -> StoreResult<CopyResponse> {
        self.check_scripted_failure()?;
        let content = self.fetch(&request.src_key)?;
        let response = self.store(&request.dest_key, content);
        Ok(CopyResponse {
            key: response.key,
            version_id: None,
            e_tag: response.e_tag,
            last_modified: None,
        })
    }

    async fn get_metadata(&self, key: &str, version_id: Option<&str>) -> StoreResult<BlobMetadata> {
        self.check_scripted_failure()?;
        let content = self.fetch(key)?;
        Ok(BlobMetadata {
            key: key.to_string(),
            version_id: version_id.map(str::to_string),
            e_tag: None,
            size: content.len() as u64,
            metadata: HashMap::new(),
            last_modified: None,
            content_md5: None,
        })
    }

    async fn list_page(&self, request: &ListPageRequest) -> StoreResult<ListPageResponse> {
        self.check_scripted_failure()?;
        if request.max_results == Some(0) {
            return Err(BlobError::invalid_argument("max_results must be at least 1").into());
        }
        let limit = request.max_results.unwrap_or(self.page_size);
        let objects = self.objects.lock().unwrap();
        let mut blobs: Vec<BlobInfo> = objects
            .iter()
            .filter(|(key, _)| {
                request
                    .prefix
                    .as_deref()
                    .map(|p| key.starts_with(p))
                    .unwrap_or(true)
            })
            .filter(|(key, _)| {
                request
                    .pagination_token
                    .as_deref()
                    .map(|t| key.as_str() > t)
                    .unwrap_or(true)
            })
            .take(limit + 1)
            .map(|(key, content)| BlobInfo {
                key: key.clone(),
                size: content.len() as u64,
                last_modified: None,
            })
            .collect();
        let truncated = blobs.len() > limit;
        if truncated {
            blobs.truncate(limit);
        }
        let next_token = truncated.then(|| blobs.last().map(|b| b.key.clone())).flatten();
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
        self.check_scripted_failure()?;
        let n = self.mpu_counter.fetch_add(1, Ordering::SeqCst);
        let id = if n == 0 {
            "mpu-id".to_string()
        } else {
            format!("mpu-id-{}", n)
        };
        self.parts
            .lock()
            .unwrap()
            .insert(id.clone(), BTreeMap::new());
        Ok(MultipartUpload {
            bucket: self.bucket.clone(),
            key: request.key.clone(),
            id,
            metadata: request.metadata.clone(),
            tags: request.tags.clone(),
            kms_key_id: request.kms_key_id.clone(),
        })
    }

    async fn upload_part(
        &self,
        mpu: &MultipartUpload,
        part: MultipartPart,
    ) -> StoreResult<UploadPartResponse> {
        self.check_scripted_failure()?;
        let mut parts = self.parts.lock().unwrap();
        let upload = parts.get_mut(&mpu.id).ok_or_else(|| {
            StoreError::new(ScriptedError {
                kind: ErrorKind::ResourceNotFound,
            })
        })?;
        let size = part.content.len() as u64;
        upload.insert(part.part_number, ("etag".to_string(), part.content));
        Ok(UploadPartResponse {
            part_number: part.part_number,
            e_tag: "etag".to_string(),
            size_in_bytes: size,
        })
    }

    async fn complete_multipart_upload(
        &self,
        mpu: &MultipartUpload,
        parts: &[UploadPartResponse],
    ) -> StoreResult<UploadResponse> {
        self.check_scripted_failure()?;
        let recorded = self.parts.lock().unwrap().remove(&mpu.id).ok_or_else(|| {
            StoreError::new(ScriptedError {
                kind: ErrorKind::ResourceNotFound,
            })
        })?;
        let mut content = Vec::new();
        let mut numbers: Vec<u32> = parts.iter().map(|p| p.part_number).collect();
        numbers.sort_unstable();
        for number in &numbers {
            let (_, bytes) = recorded.get(number).ok_or_else(|| {
                StoreError::from(BlobError::invalid_argument(format!(
                    "part {} was never uploaded",
                    number
                )))
            })?;
            content.extend_from_slice(bytes);
        }
        self.objects
            .lock()
            .unwrap()
            .insert(mpu.key.clone(), Bytes::from(content));
        Ok(UploadResponse {
            key: mpu.key.clone(),
            version_id: None,
            e_tag: Some(format!("composed-etag-{}", numbers.len())),
        })
    }

    async fn list_multipart_upload(
        &self,
        mpu: &MultipartUpload,
    ) -> StoreResult<Vec<UploadPartResponse>> {
        let parts = self.parts.lock().unwrap();
        let upload = parts.get(&mpu.id).ok_or_else(|| {
            StoreError::new(ScriptedError {
                kind: ErrorKind::ResourceNotFound,
            })
        })?;
        Ok(upload
            .iter()
            .map(|(&part_number, (e_tag, content))| UploadPartResponse {
                part_number,
                e_tag: e_tag.clone(),
                size_in_bytes: content.len() as u64,
            })
            .collect())
    }

    async fn abort_multipart_upload(&self, mpu: &MultipartUpload) -> StoreResult<()> {
        self.parts.lock().unwrap().remove(&mpu.id);
        Ok(())
    }

    async fn get_tags(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.check_scripted_failure()?;
        Ok(self.tags.lock().unwrap().get(key).cloned().unwrap_or_default())
    }

    async fn set_tags(&self, key: &str, tags: HashMap<String, String>) -> StoreResult<()> {
        self.check_scripted_failure()?;
        self.tags.lock().unwrap().insert(key.to_string(), tags);
        Ok(())
    }

    async fn generate_presigned_url(&self, request: &PresignedUrlRequest) -> StoreResult<Url> {
        self.check_scripted_failure()?;
        let url = Url::parse(&format!(
            "https://test.invalid/{}/{}?expires={}",
            self.bucket,
            request.key,
            request.duration.as_secs()
        ))?;
        Ok(url)
    }

    async fn does_object_exist(&self, key: &str, _version_id: Option<&str>) -> StoreResult<bool> {
        self.check_scripted_failure()?;
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    async fn does_bucket_exist(&self) -> StoreResult<bool> {
        self.check_scripted_failure()?;
        Ok(true)
    }

    async fn get_object_lock(
        &self,
        key: &str,
        _version_id: Option<&str>,
    ) -> StoreResult<ObjectLockInfo> {
        self.check_scripted_failure()?;
        Ok(self.locks.lock().unwrap().get(key).cloned().unwrap_or_default())
    }

    async fn update_object_retention(
        &self,
        key: &str,
        version_id: Option<&str>,
        retain_until: DateTime<Utc>,
    ) -> StoreResult<()> {
        let current = self.get_object_lock(key, version_id).await?;
        match current.retention_mode {
            None => {
                return Err(BlobError::failed_precondition(format!(
                    "no retention configured for {}",
                    key
                ))
                .into());
            }
            Some(RetentionMode::Compliance) => {
                return Err(BlobError::failed_precondition(format!(
                    "COMPLIANCE retention on {} cannot be changed",
                    key
                ))
                .into());
            }
            Some(RetentionMode::Governance) => {}
        }
        self.check_scripted_failure()?;
        let mut locks = self.locks.lock().unwrap();
        if let Some(lock) = locks.get_mut(key) {
            lock.retain_until = Some(retain_until);
        }
        Ok(())
    }

    async fn update_legal_hold(
        &self,
        key: &str,
        _version_id: Option<&str>,
        enabled: bool,
    ) -> StoreResult<()> {
        self.check_scripted_failure()?;
        self.locks
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .legal_hold = enabled;
        Ok(())
    }

    fn exception_kind(&self, error: &StoreError) -> ErrorKind {
        if let Some(blob) = error.downcast_ref::<BlobError>() {
            return blob.kind();
        }
        if let Some(scripted) = error.downcast_ref::<ScriptedError>() {
            return scripted.kind;
        }
        ErrorKind::Unknown
    }
}
