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

//! Request and response value objects.
//!
//! All types here are immutable owned values: adapters never retain a
//! reference to them beyond the call that received them.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::{BlobError, BlobResult};

/// Identifies one object, or one specific version of an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobIdentifier {
    pub key: String,
    pub version_id: Option<String>,
}

impl BlobIdentifier {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version_id: None,
        }
    }

    pub fn with_version(key: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version_id: Some(version_id.into()),
        }
    }
}

/// An inclusive, zero-based byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Creates a range; `end < start` is rejected with InvalidArgument.
    pub fn new(start: u64, end: u64) -> BlobResult<Self> {
        if end < start {
            return Err(BlobError::invalid_argument(format!(
                "byte range end {} precedes start {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Renders the HTTP Range header value for this range.
    pub fn to_header(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Parameters for a single-object upload.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub key: String,
    pub metadata: HashMap<String, String>,
    pub tags: HashMap<String, String>,
    /// Caller-supplied content length; when present for a streamed source the
    /// adapter uses it instead of buffering the whole stream.
    pub content_length: Option<u64>,
    pub kms_key_id: Option<String>,
    pub checksum: Option<String>,
}

impl UploadRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_content_length(mut self, length: u64) -> Self {
        self.content_length = Some(length);
        self
    }

    pub fn with_kms_key_id(mut self, kms_key_id: impl Into<String>) -> Self {
        self.kms_key_id = Some(kms_key_id.into());
        self
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }
}

/// Parameters for a single-object download.
#[derive(Debug, Clone, Default)]
pub struct DownloadRequest {
    pub key: String,
    pub version_id: Option<String>,
    pub range: Option<ByteRange>,
}

impl DownloadRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn with_version_id(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    pub fn with_range(mut self, range: ByteRange) -> Self {
        self.range = Some(range);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    pub key: String,
    pub version_id: Option<String>,
    pub e_tag: Option<String>,
}

/// Metadata returned alongside downloaded content.
///
/// When the download was range-scoped, `size` is the range's length, not the
/// whole object's size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResponse {
    pub key: String,
    pub version_id: Option<String>,
    pub e_tag: Option<String>,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, String>,
}

/// A live streaming download.
///
/// Ownership of the stream transfers to the caller; the adapter keeps no
/// reference after returning it. Dropping the stream releases the transfer.
pub struct DownloadStream {
    pub info: DownloadResponse,
    pub stream: BoxStream<'static, BlobResult<Bytes>>,
}

impl std::fmt::Debug for DownloadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadStream")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Result of a metadata query. Never cached; every call re-queries the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMetadata {
    pub key: String,
    pub version_id: Option<String>,
    pub e_tag: Option<String>,
    pub size: u64,
    pub metadata: HashMap<String, String>,
    pub last_modified: Option<DateTime<Utc>>,
    /// Present only when the provider etag is a strong single-part MD5.
    pub content_md5: Option<String>,
}

/// Token for an in-progress multipart upload.
///
/// A pure identifier, not a live resource handle: any caller holding a copy
/// may upload parts, complete, or abort against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartUpload {
    pub bucket: String,
    pub key: String,
    pub id: String,
    pub metadata: HashMap<String, String>,
    pub tags: HashMap<String, String>,
    pub kms_key_id: Option<String>,
}

/// One part of a multipart upload. Part numbers are 1-based and must be
/// unique within an upload; upload order is unconstrained.
#[derive(Debug, Clone)]
pub struct MultipartPart {
    pub part_number: u32,
    pub content: Bytes,
}

impl MultipartPart {
    pub fn new(part_number: u32, content: impl Into<Bytes>) -> Self {
        Self {
            part_number,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPartResponse {
    pub part_number: u32,
    pub e_tag: String,
    pub size_in_bytes: u64,
}

/// Parameters for a server-side copy. `src_bucket` of `None` means
/// same-bucket copy.
#[derive(Debug, Clone, Default)]
pub struct CopyRequest {
    pub src_key: String,
    pub src_version_id: Option<String>,
    pub src_bucket: Option<String>,
    pub dest_key: String,
}

impl CopyRequest {
    pub fn new(src_key: impl Into<String>, dest_key: impl Into<String>) -> Self {
        Self {
            src_key: src_key.into(),
            dest_key: dest_key.into(),
            ..Default::default()
        }
    }

    pub fn with_src_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.src_bucket = Some(bucket.into());
        self
    }

    pub fn with_src_version_id(mut self, version_id: impl Into<String>) -> Self {
        self.src_version_id = Some(version_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyResponse {
    pub key: String,
    pub version_id: Option<String>,
    pub e_tag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Listing summary for one blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Filters for a streaming list.
#[derive(Debug, Clone, Default)]
pub struct ListBlobsRequest {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
}

impl ListBlobsRequest {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }
}

/// One page of listing results handed to a streaming-list consumer.
#[derive(Debug, Clone, Default)]
pub struct ListBlobsBatch {
    pub blobs: Vec<BlobInfo>,
}

/// Filters for an explicit single-page list.
#[derive(Debug, Clone, Default)]
pub struct ListPageRequest {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    /// Continuation token from a previous truncated page.
    pub pagination_token: Option<String>,
    pub max_results: Option<usize>,
}

impl ListPageRequest {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Groups results at the delimiter. Delimiter-scoped listings are served
    /// as a single untruncated page; `max_results` and `pagination_token`
    /// are ignored for them.
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn with_pagination_token(mut self, token: impl Into<String>) -> Self {
        self.pagination_token = Some(token.into());
        self
    }

    /// Page size for token-based listings. Stores reject a value of 0 with
    /// an InvalidArgument-classified error.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListPageResponse {
    pub blobs: Vec<BlobInfo>,
    pub truncated: bool,
    /// Token for the next page; present iff `truncated`.
    pub next_token: Option<String>,
}

/// Parameters for a recursive directory upload.
#[derive(Debug, Clone)]
pub struct DirectoryUploadRequest {
    pub local_root: PathBuf,
    pub remote_prefix: String,
    pub recursive: bool,
    /// Tags applied uniformly to every transferred file.
    pub tags: HashMap<String, String>,
}

impl DirectoryUploadRequest {
    pub fn new(local_root: impl Into<PathBuf>, remote_prefix: impl Into<String>) -> Self {
        Self {
            local_root: local_root.into(),
            remote_prefix: remote_prefix.into(),
            recursive: true,
            tags: HashMap::new(),
        }
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags = tags;
        self
    }
}

/// One file that failed during a directory upload. A non-empty failure list
/// does not mean the whole operation failed.
#[derive(Debug, Clone)]
pub struct FailedBlobUpload {
    pub path: PathBuf,
    pub cause: String,
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryUploadResponse {
    pub failed: Vec<FailedBlobUpload>,
}

/// Parameters for a recursive directory download.
#[derive(Debug, Clone)]
pub struct DirectoryDownloadRequest {
    pub remote_prefix: String,
    pub local_root: PathBuf,
    /// Remote prefixes to skip.
    pub prefix_exclusions: Vec<String>,
}

impl DirectoryDownloadRequest {
    pub fn new(remote_prefix: impl Into<String>, local_root: impl Into<PathBuf>) -> Self {
        Self {
            remote_prefix: remote_prefix.into(),
            local_root: local_root.into(),
            prefix_exclusions: Vec::new(),
        }
    }

    pub fn with_prefix_exclusions(mut self, exclusions: Vec<String>) -> Self {
        self.prefix_exclusions = exclusions;
        self
    }
}

#[derive(Debug, Clone)]
pub struct FailedBlobDownload {
    pub destination: PathBuf,
    pub cause: String,
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryDownloadResponse {
    pub failed: Vec<FailedBlobDownload>,
}

/// Retention mode on an object lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RetentionMode {
    Governance,
    /// Immutable once set; shortening or extending it is always rejected.
    Compliance,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectLockInfo {
    pub retention_mode: Option<RetentionMode>,
    pub retain_until: Option<DateTime<Utc>>,
    pub legal_hold: bool,
}

/// Operation a presigned URL grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresignOperation {
    Upload,
    Download,
}

#[derive(Debug, Clone)]
pub struct PresignedUrlRequest {
    pub operation: PresignOperation,
    pub key: String,
    pub duration: Duration,
}

impl PresignedUrlRequest {
    pub fn new(operation: PresignOperation, key: impl Into<String>, duration: Duration) -> Self {
        Self {
            operation,
            key: key.into(),
            duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_byte_range_len_and_header() {
        let range = ByteRange::new(0, 8).unwrap();
        assert_eq!(range.len(), 9);
        assert_eq!(range.to_header(), "bytes=0-8");

        let single = ByteRange::new(5, 5).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single.to_header(), "bytes=5-5");
    }

    #[test]
    fn test_byte_range_inverted_rejected() {
        let err = ByteRange::new(10, 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_blob_identifier() {
        let plain = BlobIdentifier::new("dir/o1");
        assert_eq!(plain.key, "dir/o1");
        assert!(plain.version_id.is_none());

        let versioned = BlobIdentifier::with_version("o1", "v2");
        assert_eq!(versioned.version_id.as_deref(), Some("v2"));
    }

    #[test]
    fn test_upload_request_builder() {
        let mut metadata = HashMap::new();
        metadata.insert("owner".to_string(), "pipeline".to_string());

        let request = UploadRequest::new("o1")
            .with_metadata(metadata)
            .with_content_length(9)
            .with_kms_key_id("kms-1");

        assert_eq!(request.key, "o1");
        assert_eq!(request.content_length, Some(9));
        assert_eq!(request.kms_key_id.as_deref(), Some("kms-1"));
        assert_eq!(request.metadata.get("owner").unwrap(), "pipeline");
        assert!(request.tags.is_empty());
    }

    #[test]
    fn test_download_request_builder() {
        let request = DownloadRequest::new("o1")
            .with_version_id("v1")
            .with_range(ByteRange::new(2, 4).unwrap());

        assert_eq!(request.version_id.as_deref(), Some("v1"));
        assert_eq!(request.range.unwrap().len(), 3);
    }

    #[test]
    fn test_copy_request_defaults_same_bucket() {
        let request = CopyRequest::new("a", "b");
        assert!(request.src_bucket.is_none());

        let cross = CopyRequest::new("a", "b").with_src_bucket("other");
        assert_eq!(cross.src_bucket.as_deref(), Some("other"));
    }

    #[test]
    fn test_retention_mode_serde() {
        assert_eq!(
            serde_json::to_string(&RetentionMode::Compliance).unwrap(),
            "\"COMPLIANCE\""
        );
        let mode: RetentionMode = serde_json::from_str("\"GOVERNANCE\"").unwrap();
        assert_eq!(mode, RetentionMode::Governance);
    }

    #[test]
    fn test_list_page_request_builder() {
        let request = ListPageRequest::default()
            .with_prefix("files/")
            .with_max_results(100)
            .with_pagination_token("files/0099");

        assert_eq!(request.prefix.as_deref(), Some("files/"));
        assert_eq!(request.max_results, Some(100));
        assert_eq!(request.pagination_token.as_deref(), Some("files/0099"));
    }
}
