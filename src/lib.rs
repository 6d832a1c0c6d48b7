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

//! # Multiblob
//!
//! A provider-agnostic blob storage client with pluggable backend adapters.
//!
//! Multiblob exposes one client surface over AWS S3, Azure Blob Storage,
//! Google Cloud Storage, the local filesystem, and an in-memory store. A
//! client is scoped to a single bucket; backends are selected by provider id
//! through a process-wide registry, so new providers can be plugged in
//! without touching callers.
//!
//! ## Features
//!
//! - **Single-object transfers**: bytes, files, and streams, with byte-range
//!   downloads and collision-safe download-to-file
//! - **Multipart uploads**: initiate / upload-part / complete / abort with
//!   out-of-order and concurrent part uploads
//! - **Directory operations**: recursive upload, download with prefix
//!   exclusions, and batched bulk delete
//! - **Listings**: explicit pagination or streaming batch delivery
//! - **Object governance**: tags, object-lock retention, and legal holds
//! - **Normalized errors**: every provider failure is classified into one
//!   closed set of error kinds
//!
//! ## Quick Start
//!
//! ### Local Filesystem Example
//!
//! ```rust,no_run
//! use multiblob::{AsyncBucketClient, BlobStoreConfig, UploadRequest, DownloadRequest};
//! use bytes::Bytes;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let config = BlobStoreConfig::builder("local", "my-bucket")
//!     .with_option("path", "./data")
//!     .into_config();
//!
//! let client = AsyncBucketClient::new(config)?;
//!
//! client
//!     .upload(&UploadRequest::new("reports/today.csv"), Bytes::from("a,b,c"))
//!     .await?;
//!
//! let (info, content) = client
//!     .download(&DownloadRequest::new("reports/today.csv"))
//!     .await?;
//! println!("downloaded {} bytes", info.size);
//! # let _ = content;
//! # Ok(())
//! # }
//! ```
//!
//! ### AWS S3 Example
//!
//! ```rust,no_run
//! use multiblob::{AsyncBucketClient, BlobStoreConfig, RetryConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let config = BlobStoreConfig::builder("aws", "my-bucket")
//!     .with_region("us-east-1")
//!     .with_max_connections(64)?
//!     .with_retry(RetryConfig::exponential(
//!         5,
//!         Duration::from_millis(100),
//!         Duration::from_secs(10),
//!         2.0,
//!     )?)
//!     .into_config();
//!
//! let client = AsyncBucketClient::new(config)?;
//! let exists = client.does_object_exist("reports/today.csv", None).await?;
//! println!("exists: {exists}");
//! # Ok(())
//! # }
//! ```
//!
//! ### Blocking Example
//!
//! ```rust,no_run
//! use multiblob::{BucketClient, BlobStoreConfig, UploadRequest};
//! use bytes::Bytes;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let config = BlobStoreConfig::builder("local", "my-bucket")
//!     .with_option("path", "./data")
//!     .into_config();
//!
//! let client = BucketClient::new(config)?;
//! client.upload(&UploadRequest::new("o1"), Bytes::from("payload"))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`client`] - Asynchronous and blocking per-bucket facades
//! - [`store`] - The backend adapter trait every provider implements
//! - [`registry`] - Provider id to adapter factory registration
//! - [`config`] - Client configuration and its validating builder
//! - [`model`] - Request and response value objects
//! - [`error`] - The normalized error taxonomy
//! - [`directory`] - Directory transfer orchestration
//! - [`multipart`] - Multipart upload bookkeeping for adapters without a
//!   native multipart API
//! - [`adapter`] - The bundled adapter over the `object_store` crate

pub mod adapter;
pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod model;
pub mod multipart;
pub mod registry;
pub mod retry;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use client::{AsyncBucketClient, BucketClient};
pub use config::{BlobStoreBuilder, BlobStoreConfig, CredentialsOverride};
pub use error::{BlobError, BlobResult, ErrorKind, StoreError, StoreResult};
pub use model::{
    BlobIdentifier, BlobInfo, BlobMetadata, ByteRange, CopyRequest, CopyResponse,
    DirectoryDownloadRequest, DirectoryDownloadResponse, DirectoryUploadRequest,
    DirectoryUploadResponse, DownloadRequest, DownloadResponse, DownloadStream, ListBlobsBatch,
    ListBlobsRequest, ListPageRequest, ListPageResponse, MultipartPart, MultipartUpload,
    ObjectLockInfo, PresignOperation, PresignedUrlRequest, RetentionMode, UploadPartResponse,
    UploadRequest, UploadResponse,
};
pub use adapter::ObjectStoreAdapter;
pub use registry::{
    init_default_providers, register_async_blob_store, register_blob_store, BlobStoreFactory,
};
pub use retry::{RetryConfig, RetryMode};
pub use store::{BlobStore, ByteStream};
