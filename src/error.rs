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

use std::error::Error;
use std::fmt;

use thiserror::Error as ThisError;

/// Closed set of normalized error kinds.
///
/// Every backend adapter must map its native errors into exactly one of
/// these kinds via [`crate::store::BlobStore::exception_kind`]. The client
/// facades never surface an adapter-native error type; callers only ever
/// see a [`BlobError`] carrying one of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Authentication or authorization failure.
    UnAuthorized,
    /// Malformed request, client-side validation failure, or unsupported value.
    InvalidArgument,
    /// Object or bucket absent where existence was required.
    ResourceNotFound,
    /// Required prior state is missing or forbids the operation
    /// (e.g. mutating COMPLIANCE-mode retention).
    FailedPrecondition,
    /// The default fallback for anything not otherwise classified.
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::UnAuthorized => "UnAuthorized",
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::ResourceNotFound => "ResourceNotFound",
            ErrorKind::FailedPrecondition => "FailedPrecondition",
            ErrorKind::Unknown => "Unknown",
        };
        write!(f, "{}", name)
    }
}

/// The error type raised by the client facades.
#[derive(Debug, ThisError)]
#[error("{kind}: {message}")]
pub struct BlobError {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl BlobError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FailedPrecondition, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceNotFound, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Carrier for an adapter-native error as it crosses from the adapter back
/// to the facade.
///
/// Adapters return `StoreError` from every operation; the facade asks the
/// adapter to classify it (`exception_kind`) and re-raises a [`BlobError`]
/// with the normalized kind. Errors the adapter itself produced client-side
/// (validation, precondition checks) are carried as an inner [`BlobError`]
/// and keep their kind through classification.
#[derive(Debug)]
pub struct StoreError(Box<dyn Error + Send + Sync>);

impl StoreError {
    pub fn new(source: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self(source.into())
    }

    /// Attempt to view the inner error as a concrete type.
    pub fn downcast_ref<T: Error + 'static>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn into_inner(self) -> Box<dyn Error + Send + Sync> {
        self.0
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.0.source()
    }
}

impl From<BlobError> for StoreError {
    fn from(e: BlobError) -> Self {
        Self(Box::new(e))
    }
}

impl From<object_store::Error> for StoreError {
    fn from(e: object_store::Error) -> Self {
        Self(Box::new(e))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self(Box::new(e))
    }
}

impl From<url::ParseError> for StoreError {
    fn from(e: url::ParseError) -> Self {
        Self(Box::new(e))
    }
}

/// Result type for adapter operations (error not yet classified).
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for facade operations (error classified into the taxonomy).
pub type BlobResult<T> = Result<T, BlobError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::UnAuthorized.to_string(), "UnAuthorized");
        assert_eq!(ErrorKind::InvalidArgument.to_string(), "InvalidArgument");
        assert_eq!(ErrorKind::ResourceNotFound.to_string(), "ResourceNotFound");
        assert_eq!(
            ErrorKind::FailedPrecondition.to_string(),
            "FailedPrecondition"
        );
        assert_eq!(ErrorKind::Unknown.to_string(), "Unknown");
    }

    #[test]
    fn test_blob_error_display() {
        let error = BlobError::invalid_argument("endpoint must be http or https");
        assert_eq!(
            error.to_string(),
            "InvalidArgument: endpoint must be http or https"
        );
        assert_eq!(error.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_blob_error_with_source() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "missing");
        let error = BlobError::with_source(ErrorKind::ResourceNotFound, "blob absent", io_error);

        assert_eq!(error.kind(), ErrorKind::ResourceNotFound);
        assert!(error.source().is_some());
    }

    #[test]
    fn test_store_error_downcast_blob_error() {
        let store_error: StoreError = BlobError::failed_precondition("file exists").into();

        let inner = store_error.downcast_ref::<BlobError>();
        assert!(inner.is_some());
        assert_eq!(inner.unwrap().kind(), ErrorKind::FailedPrecondition);
    }

    #[test]
    fn test_store_error_downcast_io_error() {
        let store_error: StoreError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();

        assert!(store_error.downcast_ref::<io::Error>().is_some());
        assert!(store_error.downcast_ref::<BlobError>().is_none());
    }

    #[test]
    fn test_store_error_display_passthrough() {
        let store_error: StoreError = BlobError::not_found("no such key").into();
        assert!(store_error.to_string().contains("no such key"));
    }
}
