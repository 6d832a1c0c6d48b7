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

//! Directory transfer orchestration.
//!
//! Recursive upload/download of a local directory tree and prefix-scoped
//! bulk delete. Per-file failures are aggregated into the response instead
//! of aborting the remaining transfers; only failures that prevent the
//! operation from enumerating its work (an unreadable root, a failed
//! listing) are raised.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::StreamExt;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{BlobError, StoreResult};
use crate::model::{
    BlobIdentifier, DirectoryDownloadRequest, DirectoryDownloadResponse, DirectoryUploadRequest,
    DirectoryUploadResponse, DownloadRequest, FailedBlobDownload, FailedBlobUpload,
    ListPageRequest, UploadRequest,
};
use crate::store::BlobStore;

/// Concurrent per-file transfers when the configuration does not say.
const DEFAULT_CONCURRENCY: usize = 8;

/// Most backends cap bulk deletes at 1000 objects per call.
pub const DEFAULT_MAX_OBJECTS_PER_DELETE: usize = 1000;

/// Fans out per-file transfers over one adapter.
pub struct DirectoryTransfer {
    store: Arc<dyn BlobStore>,
    concurrency: usize,
    max_objects_per_delete: usize,
}

impl DirectoryTransfer {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            concurrency: DEFAULT_CONCURRENCY,
            max_objects_per_delete: DEFAULT_MAX_OBJECTS_PER_DELETE,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_max_objects_per_delete(mut self, limit: usize) -> Self {
        self.max_objects_per_delete = limit.max(1);
        self
    }

    /// Walks the local tree and uploads every file under the remote prefix.
    ///
    /// Relative paths are joined to the prefix with `/` separators. Files
    /// that fail to transfer are reported in the response; the rest of the
    /// tree is still attempted.
    pub async fn upload_directory(
        &self,
        request: &DirectoryUploadRequest,
    ) -> StoreResult<DirectoryUploadResponse> {
        let mut files = Vec::new();
        let mut failed = Vec::new();

        let mut walker = WalkDir::new(&request.local_root);
        if !request.recursive {
            walker = walker.max_depth(1);
        }
        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    match remote_key(&request.local_root, entry.path(), &request.remote_prefix) {
                        Ok(key) => files.push((entry.into_path(), key)),
                        Err(e) => failed.push(FailedBlobUpload {
                            path: entry.into_path(),
                            cause: e.to_string(),
                        }),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    let path = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| request.local_root.clone());
                    failed.push(FailedBlobUpload {
                        path,
                        cause: e.to_string(),
                    });
                }
            }
        }
        debug!(
            files = files.len(),
            prefix = %request.remote_prefix,
            "uploading directory"
        );

        let results = futures::stream::iter(files)
            .map(|(path, key)| {
                let store = Arc::clone(&self.store);
                let tags = request.tags.clone();
                async move {
                    let upload = UploadRequest::new(key).with_tags(tags);
                    let result = store.upload_file(&upload, &path).await;
                    (path, result)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        for (path, result) in results {
            if let Err(e) = result {
                warn!(path = %path.display(), error = %e, "file upload failed");
                failed.push(FailedBlobUpload {
                    path,
                    cause: e.to_string(),
                });
            }
        }
        Ok(DirectoryUploadResponse { failed })
    }

    /// Downloads every object under the remote prefix into the local root.
    ///
    /// Objects matching a prefix exclusion are skipped. Parent directories
    /// are created as needed; per-file failures are aggregated.
    pub async fn download_directory(
        &self,
        request: &DirectoryDownloadRequest,
    ) -> StoreResult<DirectoryDownloadResponse> {
        let keys = self.list_all_keys(&request.remote_prefix).await?;
        let transfers: Vec<(String, PathBuf)> = keys
            .into_iter()
            .filter(|key| {
                !request
                    .prefix_exclusions
                    .iter()
                    .any(|excluded| key.starts_with(excluded.as_str()))
            })
            .map(|key| {
                let relative = key
                    .strip_prefix(&request.remote_prefix)
                    .unwrap_or(&key)
                    .trim_start_matches('/');
                let destination = request.local_root.join(relative);
                (key, destination)
            })
            .collect();
        debug!(
            files = transfers.len(),
            prefix = %request.remote_prefix,
            "downloading directory"
        );

        let results = futures::stream::iter(transfers)
            .map(|(key, destination)| {
                let store = Arc::clone(&self.store);
                async move {
                    let result = download_one(store.as_ref(), &key, &destination).await;
                    (destination, result)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        let mut failed = Vec::new();
        for (destination, result) in results {
            if let Err(e) = result {
                warn!(path = %destination.display(), error = %e, "file download failed");
                failed.push(FailedBlobDownload {
                    destination,
                    cause: e.to_string(),
                });
            }
        }
        Ok(DirectoryDownloadResponse { failed })
    }

    /// Deletes every object under the prefix.
    ///
    /// Identifiers are partitioned into batches of at most
    /// `max_objects_per_delete` and one bulk delete is issued per batch. All
    /// batches are awaited; a failed batch does not stop the others, and the
    /// first batch error is returned once everything has been attempted.
    pub async fn delete_directory(&self, prefix: &str) -> StoreResult<()> {
        let keys = self.list_all_keys(prefix).await?;
        let batches: Vec<Vec<BlobIdentifier>> = keys
            .chunks(self.max_objects_per_delete)
            .map(|chunk| chunk.iter().map(|key| BlobIdentifier::new(key)).collect())
            .collect();
        debug!(objects = keys.len(), batches = batches.len(), prefix, "deleting directory");

        let results = futures::stream::iter(batches)
            .map(|batch| {
                let store = Arc::clone(&self.store);
                async move { store.delete_batch(&batch).await }
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        let mut first_error = None;
        for result in results {
            if let Err(e) = result {
                warn!(error = %e, "bulk delete batch failed");
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

    async fn list_all_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut request = ListPageRequest::default().with_prefix(prefix);
        loop {
            let page = self.store.list_page(&request).await?;
            keys.extend(page.blobs.into_iter().map(|blob| blob.key));
            // A truncated page without a token cannot be advanced; stop
            // rather than re-issue the same request.
            if !page.truncated || page.next_token.is_none() {
                return Ok(keys);
            }
            request.pagination_token = page.next_token;
        }
    }
}

async fn download_one(store: &dyn BlobStore, key: &str, destination: &Path) -> StoreResult<()> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    store
        .download_to_file(&DownloadRequest::new(key), destination)
        .await?;
    Ok(())
}

fn remote_key(root: &Path, file: &Path, prefix: &str) -> StoreResult<String> {
    let relative = file.strip_prefix(root).map_err(|_| {
        BlobError::invalid_argument(format!(
            "{} is outside the upload root {}",
            file.display(),
            root.display()
        ))
    })?;
    let mut segments = Vec::new();
    for component in relative.components() {
        segments.push(component.as_os_str().to_string_lossy().into_owned());
    }
    let joined = segments.join("/");
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        Ok(joined)
    } else {
        Ok(format!("{}/{}", prefix, joined))
    }
}
