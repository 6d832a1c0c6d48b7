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

//! Multipart upload bookkeeping.
//!
//! Generic in-progress upload state shared by adapters whose native service
//! has no raw part protocol: parts are tracked here and composed into one
//! object at completion. The [`crate::model::MultipartUpload`] token is a
//! capability, not a handle: any holder of the id may upload parts, list,
//! complete, or abort, concurrently.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use bytes::{Bytes, BytesMut};
use uuid::Uuid;

use crate::error::{BlobError, StoreResult};
use crate::model::{MultipartUpload, UploadPartResponse, UploadRequest};

struct PartRecord {
    e_tag: String,
    content: Bytes,
}

struct UploadState {
    key: String,
    metadata: HashMap<String, String>,
    tags: HashMap<String, String>,
    kms_key_id: Option<String>,
    parts: BTreeMap<u32, PartRecord>,
}

/// Everything needed to materialize the composed object after completion.
#[derive(Debug)]
pub struct CompletedUpload {
    pub key: String,
    pub metadata: HashMap<String, String>,
    pub tags: HashMap<String, String>,
    pub kms_key_id: Option<String>,
    /// Parts concatenated in ascending part-number order.
    pub content: Bytes,
    /// S3-style composed etag: md5 of the part digests, dash, part count.
    pub e_tag: String,
}

/// Tracks every in-progress multipart upload for one adapter instance.
pub struct MultipartStateMachine {
    uploads: Mutex<HashMap<String, UploadState>>,
}

impl MultipartStateMachine {
    pub fn new() -> Self {
        Self {
            uploads: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a new upload and returns its token. The request's metadata,
    /// tags, and KMS key are snapshotted; the token is immutable afterward.
    pub fn initiate(&self, bucket: &str, request: &UploadRequest) -> MultipartUpload {
        let id = Uuid::new_v4().to_string();
        let mut uploads = self.lock();
        uploads.insert(
            id.clone(),
            UploadState {
                key: request.key.clone(),
                metadata: request.metadata.clone(),
                tags: request.tags.clone(),
                kms_key_id: request.kms_key_id.clone(),
                parts: BTreeMap::new(),
            },
        );
        MultipartUpload {
            bucket: bucket.to_string(),
            key: request.key.clone(),
            id,
            metadata: request.metadata.clone(),
            tags: request.tags.clone(),
            kms_key_id: request.kms_key_id.clone(),
        }
    }

    /// Records one part. Re-inserting a part number replaces the previous
    /// content (last writer wins).
    pub fn insert_part(
        &self,
        upload_id: &str,
        part_number: u32,
        content: Bytes,
    ) -> StoreResult<UploadPartResponse> {
        if part_number == 0 {
            return Err(BlobError::invalid_argument("part numbers are 1-based").into());
        }
        let e_tag = format!("{:x}", md5::compute(&content));
        let size_in_bytes = content.len() as u64;

        let mut uploads = self.lock();
        let state = uploads
            .get_mut(upload_id)
            .ok_or_else(|| unknown_upload(upload_id))?;
        state.parts.insert(
            part_number,
            PartRecord {
                e_tag: e_tag.clone(),
                content,
            },
        );
        Ok(UploadPartResponse {
            part_number,
            e_tag,
            size_in_bytes,
        })
    }

    /// Parts recorded so far, ascending by part number.
    pub fn list_parts(&self, upload_id: &str) -> StoreResult<Vec<UploadPartResponse>> {
        let uploads = self.lock();
        let state = uploads
            .get(upload_id)
            .ok_or_else(|| unknown_upload(upload_id))?;
        Ok(state
            .parts
            .iter()
            .map(|(&part_number, record)| UploadPartResponse {
                part_number,
                e_tag: record.e_tag.clone(),
                size_in_bytes: record.content.len() as u64,
            })
            .collect())
    }

    /// Verifies the supplied part list against recorded state, removes the
    /// upload, and returns the composed content.
    ///
    /// Every supplied (part number, etag) pair must match a recorded part;
    /// a mismatch, duplicate, or unrecorded part number fails with
    /// InvalidArgument and the upload stays intact. Supplied order is
    /// irrelevant; composition is always ascending by part number.
    pub fn take_completed(
        &self,
        upload_id: &str,
        parts: &[UploadPartResponse],
    ) -> StoreResult<CompletedUpload> {
        let mut uploads = self.lock();
        let state = uploads
            .get(upload_id)
            .ok_or_else(|| unknown_upload(upload_id))?;

        if parts.is_empty() {
            return Err(
                BlobError::invalid_argument("completing an upload requires at least one part")
                    .into(),
            );
        }

        let mut requested: BTreeMap<u32, &str> = BTreeMap::new();
        for part in parts {
            if requested.insert(part.part_number, &part.e_tag).is_some() {
                return Err(BlobError::invalid_argument(format!(
                    "part {} supplied more than once",
                    part.part_number
                ))
                .into());
            }
        }
        for (&part_number, &e_tag) in &requested {
            match state.parts.get(&part_number) {
                None => {
                    return Err(BlobError::invalid_argument(format!(
                        "part {} was never uploaded",
                        part_number
                    ))
                    .into());
                }
                Some(record) if record.e_tag != e_tag => {
                    return Err(BlobError::invalid_argument(format!(
                        "etag mismatch for part {}",
                        part_number
                    ))
                    .into());
                }
                Some(_) => {}
            }
        }

        // Validation passed; consume the upload.
        let state = uploads
            .remove(upload_id)
            .ok_or_else(|| unknown_upload(upload_id))?;

        let mut content = BytesMut::new();
        let mut digests = Vec::with_capacity(requested.len());
        for &part_number in requested.keys() {
            let record = &state.parts[&part_number];
            content.extend_from_slice(&record.content);
            digests.extend_from_slice(md5::compute(&record.content).as_ref());
        }
        let e_tag = format!("{:x}-{}", md5::compute(&digests), requested.len());

        Ok(CompletedUpload {
            key: state.key,
            metadata: state.metadata,
            tags: state.tags,
            kms_key_id: state.kms_key_id,
            content: content.freeze(),
            e_tag,
        })
    }

    /// Discards an upload and its parts. Aborting an unknown or already
    /// aborted id is success.
    pub fn abort(&self, upload_id: &str) {
        self.lock().remove(upload_id);
    }

    pub fn contains(&self, upload_id: &str) -> bool {
        self.lock().contains_key(upload_id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, UploadState>> {
        match self.uploads.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for MultipartStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn unknown_upload(upload_id: &str) -> crate::error::StoreError {
    BlobError::not_found(format!("no multipart upload with id {}", upload_id)).into()
}
