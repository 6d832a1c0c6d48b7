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

use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use tokio::io::AsyncWrite;
use url::Url;

use crate::error::{ErrorKind, StoreError, StoreResult};
use crate::model::{
    BlobIdentifier, BlobMetadata, CopyRequest, CopyResponse, DownloadRequest, DownloadResponse,
    DownloadStream, ListBlobsBatch, ListBlobsRequest, ListPageRequest, ListPageResponse,
    MultipartPart, MultipartUpload, ObjectLockInfo, PresignedUrlRequest, UploadPartResponse,
    UploadRequest, UploadResponse,
};

/// Byte stream accepted as an upload source.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Unified contract every backend adapter implements.
///
/// One implementation exists per storage provider; an instance is bound to a
/// single bucket at construction. All operations return [`StoreResult`], the
/// unclassified error channel. The client facades call [`BlobStore::exception_kind`]
/// on every failure and raise a normalized [`crate::error::BlobError`], so no
/// adapter-native error type ever reaches a caller.
///
/// Adapters are `Send + Sync` and safe to share behind an `Arc` once built.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// The bucket (or container) this adapter is bound to.
    fn bucket(&self) -> &str;

    /// Upload an in-memory buffer.
    ///
    /// # Returns
    ///
    /// The stored key with the provider-assigned version and etag.
    async fn upload_bytes(
        &self,
        request: &UploadRequest,
        content: Bytes,
    ) -> StoreResult<UploadResponse>;

    /// Upload from a byte stream.
    ///
    /// When `request.content_length` is set the adapter must use it instead
    /// of buffering the whole stream; without it the adapter may buffer or
    /// chunk at its discretion.
    async fn upload_stream(
        &self,
        request: &UploadRequest,
        stream: ByteStream,
    ) -> StoreResult<UploadResponse>;

    /// Upload the contents of a local file.
    ///
    /// # Errors
    ///
    /// Fails with an InvalidArgument-classified error when the file cannot
    /// be read.
    async fn upload_file(&self, request: &UploadRequest, path: &Path)
        -> StoreResult<UploadResponse>;

    /// Download into an in-memory buffer.
    ///
    /// When `request.range` is set, the returned metadata `size` is the
    /// range's length, not the whole object's size.
    async fn download_bytes(
        &self,
        request: &DownloadRequest,
    ) -> StoreResult<(DownloadResponse, Bytes)>;

    /// Download into a writable sink.
    async fn download_to_writer(
        &self,
        request: &DownloadRequest,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> StoreResult<DownloadResponse>;

    /// Download to a fresh local file.
    ///
    /// # Errors
    ///
    /// Fails with a FailedPrecondition-classified error, before any backend
    /// call, when a file already exists at `path`.
    async fn download_to_file(
        &self,
        request: &DownloadRequest,
        path: &Path,
    ) -> StoreResult<DownloadResponse>;

    /// Download as a live stream owned by the caller.
    async fn download_stream(&self, request: &DownloadRequest) -> StoreResult<DownloadStream>;

    /// Delete one object. Deleting a non-existent key is success.
    async fn delete(&self, key: &str, version_id: Option<&str>) -> StoreResult<()>;

    /// Delete a batch of objects in one backend call.
    async fn delete_batch(&self, identifiers: &[BlobIdentifier]) -> StoreResult<()>;

    /// Server-side copy within or across buckets.
    async fn copy(&self, request: &CopyRequest) -> StoreResult<CopyResponse>;

    /// Query object metadata.
    ///
    /// # Errors
    ///
    /// Fails with a ResourceNotFound-classified error when the object does
    /// not exist.
    async fn get_metadata(&self, key: &str, version_id: Option<&str>) -> StoreResult<BlobMetadata>;

    /// Fetch one page of listing results with an explicit continuation token.
    async fn list_page(&self, request: &ListPageRequest) -> StoreResult<ListPageResponse>;

    /// Stream all listing results to a consumer, one page at a time.
    async fn list(
        &self,
        request: &ListBlobsRequest,
        consumer: &mut (dyn FnMut(ListBlobsBatch) + Send),
    ) -> StoreResult<()> {
        let mut page_request = ListPageRequest {
            prefix: request.prefix.clone(),
            delimiter: request.delimiter.clone(),
            pagination_token: None,
            max_results: None,
        };
        loop {
            let page = self.list_page(&page_request).await?;
            consumer(ListBlobsBatch { blobs: page.blobs });
            // A truncated page without a token cannot be advanced; stop
            // rather than re-issue the same request.
            if !page.truncated || page.next_token.is_none() {
                return Ok(());
            }
            page_request.pagination_token = page.next_token;
        }
    }

    /// Start a multipart upload and return its token.
    async fn initiate_multipart_upload(
        &self,
        request: &UploadRequest,
    ) -> StoreResult<MultipartUpload>;

    /// Upload one part. Parts may be uploaded concurrently and in any order;
    /// re-uploading a part number replaces the previous content.
    async fn upload_part(
        &self,
        mpu: &MultipartUpload,
        part: MultipartPart,
    ) -> StoreResult<UploadPartResponse>;

    /// Compose the uploaded parts into the final object.
    ///
    /// The caller supplies every part's number and etag; the adapter submits
    /// them to the backend ordered ascending by part number regardless of the
    /// order they were collected in.
    async fn complete_multipart_upload(
        &self,
        mpu: &MultipartUpload,
        parts: &[UploadPartResponse],
    ) -> StoreResult<UploadResponse>;

    /// List the parts uploaded so far, sorted ascending by part number.
    async fn list_multipart_upload(
        &self,
        mpu: &MultipartUpload,
    ) -> StoreResult<Vec<UploadPartResponse>>;

    /// Abort a multipart upload and discard its parts. Idempotent.
    async fn abort_multipart_upload(&self, mpu: &MultipartUpload) -> StoreResult<()>;

    async fn get_tags(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    /// Replace the full tag set of an object. Not a merge.
    async fn set_tags(&self, key: &str, tags: HashMap<String, String>) -> StoreResult<()>;

    /// Generate a time-limited URL granting the requested operation.
    async fn generate_presigned_url(&self, request: &PresignedUrlRequest) -> StoreResult<Url>;

    /// Object existence check: a backend "not found" maps to `Ok(false)`;
    /// any other backend error propagates.
    async fn does_object_exist(&self, key: &str, version_id: Option<&str>) -> StoreResult<bool>;

    /// Bucket existence check with the same 404-as-false contract.
    async fn does_bucket_exist(&self) -> StoreResult<bool>;

    async fn get_object_lock(
        &self,
        key: &str,
        version_id: Option<&str>,
    ) -> StoreResult<ObjectLockInfo>;

    /// Update the retention timestamp on an object lock.
    ///
    /// Reads the current retention first; missing retention, or COMPLIANCE
    /// mode, fails with a FailedPrecondition-classified error and no mutating
    /// backend call is issued.
    async fn update_object_retention(
        &self,
        key: &str,
        version_id: Option<&str>,
        retain_until: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn update_legal_hold(
        &self,
        key: &str,
        version_id: Option<&str>,
        enabled: bool,
    ) -> StoreResult<()>;

    /// Classify a native error into the normalized taxonomy.
    ///
    /// Pure and side-effect free: no I/O, no retries, never fails. This is
    /// the seam the client facades depend on for error normalization.
    fn exception_kind(&self, error: &StoreError) -> ErrorKind;
}

impl Debug for dyn BlobStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "BlobStore(bucket={})", self.bucket())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BlobInfo;

    // Pages out `total` keys in pages of `page_size` to exercise the default
    // streaming list implementation. `omit_token` simulates a store that
    // claims truncation but returns no continuation token.
    struct PagedStore {
        total: usize,
        page_size: usize,
        omit_token: bool,
    }

    #[async_trait]
    impl BlobStore for PagedStore {
        fn bucket(&self) -> &str {
            "b1"
        }

        async fn upload_bytes(
            &self,
            _request: &UploadRequest,
            _content: Bytes,
        ) -> StoreResult<UploadResponse> {
            unimplemented!()
        }

        async fn upload_stream(
            &self,
            _request: &UploadRequest,
            _stream: ByteStream,
        ) -> StoreResult<UploadResponse> {
            unimplemented!()
        }

        async fn upload_file(
            &self,
            _request: &UploadRequest,
            _path: &Path,
        ) -> StoreResult<UploadResponse> {
            unimplemented!()
        }

        async fn download_bytes(
            &self,
            _request: &DownloadRequest,
        ) -> StoreResult<(DownloadResponse, Bytes)> {
            unimplemented!()
        }

        async fn download_to_writer(
            &self,
            _request: &DownloadRequest,
            _writer: &mut (dyn AsyncWrite + Send + Unpin),
        ) -> StoreResult<DownloadResponse> {
            unimplemented!()
        }

        async fn download_to_file(
            &self,
            _request: &DownloadRequest,
            _path: &Path,
        ) -> StoreResult<DownloadResponse> {
            unimplemented!()
        }

        async fn download_stream(
            &self,
            _request: &DownloadRequest,
        ) -> StoreResult<DownloadStream> {
            unimplemented!()
        }

        async fn delete(&self, _key: &str, _version_id: Option<&str>) -> StoreResult<()> {
            unimplemented!()
        }

        async fn delete_batch(&self, _identifiers: &[BlobIdentifier]) -> StoreResult<()> {
            unimplemented!()
        }

        async fn copy(&self, _request: &CopyRequest) -> StoreResult<CopyResponse> {
            unimplemented!()
        }

        async fn get_metadata(
            &self,
            _key: &str,
            _version_id: Option<&str>,
        ) -> StoreResult<BlobMetadata> {
            unimplemented!()
        }

        async fn list_page(&self, request: &ListPageRequest) -> StoreResult<ListPageResponse> {
            let start: usize = request
                .pagination_token
                .as_deref()
                .map(|t| t.parse().unwrap())
                .unwrap_or(0);
            let end = (start + self.page_size).min(self.total);
            let blobs = (start..end)
                .map(|i| BlobInfo {
                    key: format!("k{:04}", i),
                    size: 1,
                    last_modified: None,
                })
                .collect();
            Ok(ListPageResponse {
                blobs,
                truncated: end < self.total,
                next_token: (!self.omit_token && end < self.total).then(|| end.to_string()),
            })
        }

        async fn initiate_multipart_upload(
            &self,
            _request: &UploadRequest,
        ) -> StoreResult<MultipartUpload> {
            unimplemented!()
        }

        async fn upload_part(
            &self,
            _mpu: &MultipartUpload,
            _part: MultipartPart,
        ) -> StoreResult<UploadPartResponse> {
            unimplemented!()
        }

        async fn complete_multipart_upload(
            &self,
            _mpu: &MultipartUpload,
            _parts: &[UploadPartResponse],
        ) -> StoreResult<UploadResponse> {
            unimplemented!()
        }

        async fn list_multipart_upload(
            &self,
            _mpu: &MultipartUpload,
        ) -> StoreResult<Vec<UploadPartResponse>> {
            unimplemented!()
        }

        async fn abort_multipart_upload(&self, _mpu: &MultipartUpload) -> StoreResult<()> {
            unimplemented!()
        }

        async fn get_tags(&self, _key: &str) -> StoreResult<HashMap<String, String>> {
            unimplemented!()
        }

        async fn set_tags(
            &self,
            _key: &str,
            _tags: HashMap<String, String>,
        ) -> StoreResult<()> {
            unimplemented!()
        }

        async fn generate_presigned_url(
            &self,
            _request: &PresignedUrlRequest,
        ) -> StoreResult<Url> {
            unimplemented!()
        }

        async fn does_object_exist(
            &self,
            _key: &str,
            _version_id: Option<&str>,
        ) -> StoreResult<bool> {
            unimplemented!()
        }

        async fn does_bucket_exist(&self) -> StoreResult<bool> {
            unimplemented!()
        }

        async fn get_object_lock(
            &self,
            _key: &str,
            _version_id: Option<&str>,
        ) -> StoreResult<ObjectLockInfo> {
            unimplemented!()
        }

        async fn update_object_retention(
            &self,
            _key: &str,
            _version_id: Option<&str>,
            _retain_until: DateTime<Utc>,
        ) -> StoreResult<()> {
            unimplemented!()
        }

        async fn update_legal_hold(
            &self,
            _key: &str,
            _version_id: Option<&str>,
            _enabled: bool,
        ) -> StoreResult<()> {
            unimplemented!()
        }

        fn exception_kind(&self, _error: &StoreError) -> ErrorKind {
            ErrorKind::Unknown
        }
    }

    #[tokio::test]
    async fn test_streaming_list_visits_every_page() {
        let store = PagedStore {
            total: 25,
            page_size: 10,
            omit_token: false,
        };
        let mut batches = Vec::new();
        store
            .list(&ListBlobsRequest::default(), &mut |batch| {
                batches.push(batch.blobs.len())
            })
            .await
            .unwrap();

        assert_eq!(batches, vec![10, 10, 5]);
    }

    #[tokio::test]
    async fn test_streaming_list_single_page() {
        let store = PagedStore {
            total: 3,
            page_size: 10,
            omit_token: false,
        };
        let mut keys = Vec::new();
        store
            .list(&ListBlobsRequest::default(), &mut |batch| {
                keys.extend(batch.blobs.into_iter().map(|b| b.key))
            })
            .await
            .unwrap();

        assert_eq!(keys, vec!["k0000", "k0001", "k0002"]);
    }

    #[tokio::test]
    async fn test_streaming_list_stops_on_truncated_page_without_token() {
        let store = PagedStore {
            total: 25,
            page_size: 10,
            omit_token: true,
        };
        let mut batches = Vec::new();
        store
            .list(&ListBlobsRequest::default(), &mut |batch| {
                batches.push(batch.blobs.len())
            })
            .await
            .unwrap();

        // The page cannot be advanced, so only the first one is delivered.
        assert_eq!(batches, vec![10]);
    }

    #[test]
    fn test_blob_store_debug() {
        let store: &dyn BlobStore = &PagedStore {
            total: 0,
            page_size: 1,
            omit_token: false,
        };
        assert_eq!(format!("{:?}", store), "BlobStore(bucket=b1)");
    }
}
