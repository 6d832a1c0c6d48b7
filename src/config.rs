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
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BlobError, BlobResult};
use crate::retry::RetryConfig;

/// Credential selection for an adapter.
///
/// `None` in [`BlobStoreConfig::credentials`] means "use ambient/default
/// credentials"; the adapter must not override the native client's default
/// credential chain with an empty value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialsOverride {
    /// Static session credentials.
    Session {
        access_key_id: String,
        secret_access_key: String,
        session_token: Option<String>,
    },
    /// Assume an IAM role before issuing calls. Adapters whose native client
    /// cannot assume roles reject this at build time with InvalidArgument.
    AssumeRole {
        role_arn: String,
        session_name: String,
    },
    /// Explicitly request the provider's default credential chain.
    DefaultChain,
}

/// Immutable configuration handed to an adapter factory at build time.
///
/// Produced by [`BlobStoreBuilder`]; every field other than `provider_id` and
/// `bucket` is optional, and an unset field must never override a native
/// client default.
///
/// # Examples
///
/// ```
/// use multiblob::config::BlobStoreConfig;
///
/// let builder = BlobStoreConfig::builder("aws", "my-bucket")
///     .with_region("us-east-1")
///     .with_endpoint("https://s3.us-east-1.amazonaws.com")
///     .unwrap()
///     .with_max_connections(64)
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStoreConfig {
    pub provider_id: String,
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint: Option<Url>,
    pub proxy_endpoint: Option<Url>,
    /// Honor the lowercase `http_proxy` / `https_proxy` convention.
    pub use_system_proxy: bool,
    /// Honor the uppercase `HTTP_PROXY` / `HTTPS_PROXY` / `NO_PROXY` convention.
    pub use_environment_proxy: bool,
    pub max_connections: Option<u32>,
    pub socket_timeout: Option<Duration>,
    pub idle_connection_timeout: Option<Duration>,
    pub credentials: Option<CredentialsOverride>,
    /// Uploads at or above this size may be split into a multipart transfer.
    pub multipart_threshold: Option<u64>,
    /// Buffer size per in-flight part for streamed uploads.
    pub part_buffer_size: Option<usize>,
    pub parallel_uploads_enabled: bool,
    pub parallel_downloads_enabled: bool,
    /// Target aggregate throughput in gigabits per second, for adapters whose
    /// native client accepts a throughput goal.
    pub target_throughput_gbps: Option<f64>,
    /// Cap on concurrent native transfers within one operation.
    pub max_concurrency: Option<usize>,
    /// Cap on concurrent per-file transfers during directory operations.
    pub directory_concurrency: Option<usize>,
    pub read_buffer_size: Option<usize>,
    pub retry: Option<RetryConfig>,
    /// Provider-specific options passed through to the native client builder.
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl BlobStoreConfig {
    /// Starts a builder for the given provider and bucket.
    pub fn builder(provider_id: impl Into<String>, bucket: impl Into<String>) -> BlobStoreBuilder {
        BlobStoreBuilder {
            config: BlobStoreConfig {
                provider_id: provider_id.into(),
                bucket: bucket.into(),
                region: None,
                endpoint: None,
                proxy_endpoint: None,
                use_system_proxy: false,
                use_environment_proxy: false,
                max_connections: None,
                socket_timeout: None,
                idle_connection_timeout: None,
                credentials: None,
                multipart_threshold: None,
                part_buffer_size: None,
                parallel_uploads_enabled: false,
                parallel_downloads_enabled: false,
                target_throughput_gbps: None,
                max_concurrency: None,
                directory_concurrency: None,
                read_buffer_size: None,
                retry: None,
                options: HashMap::new(),
            },
        }
    }

    pub fn get_option(&self, key: &str) -> Option<&String> {
        self.options.get(key)
    }
}

/// Accumulates configuration and validates eagerly.
///
/// Setters with universally-checkable constraints fail immediately with
/// `ErrorKind::InvalidArgument` instead of deferring to build time. The
/// builder is consumed by value when the client is built, so a builder
/// instance can be built at most once.
///
/// Builders are not thread-safe for concurrent mutation; confine one builder
/// to one thread until it is consumed.
#[derive(Debug, Clone)]
pub struct BlobStoreBuilder {
    config: BlobStoreConfig,
}

impl BlobStoreBuilder {
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.config.region = Some(region.into());
        self
    }

    /// Overrides the service endpoint. Must be an absolute http/https URL.
    pub fn with_endpoint(mut self, endpoint: &str) -> BlobResult<Self> {
        self.config.endpoint = Some(parse_http_url("endpoint", endpoint)?);
        Ok(self)
    }

    /// Routes traffic through the given proxy. Must be an absolute http/https URL.
    pub fn with_proxy_endpoint(mut self, endpoint: &str) -> BlobResult<Self> {
        self.config.proxy_endpoint = Some(parse_http_url("proxy endpoint", endpoint)?);
        Ok(self)
    }

    /// Opts in to the lowercase `http_proxy` / `https_proxy` convention.
    pub fn with_system_proxy(mut self, enabled: bool) -> Self {
        self.config.use_system_proxy = enabled;
        self
    }

    /// Opts in to the uppercase `HTTP_PROXY` / `HTTPS_PROXY` / `NO_PROXY` convention.
    pub fn with_environment_proxy(mut self, enabled: bool) -> Self {
        self.config.use_environment_proxy = enabled;
        self
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> BlobResult<Self> {
        if max_connections == 0 {
            return Err(BlobError::invalid_argument(
                "max connections must be >= 1",
            ));
        }
        self.config.max_connections = Some(max_connections);
        Ok(self)
    }

    /// Per-request socket timeout. Zero means no timeout.
    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.config.socket_timeout = Some(timeout);
        self
    }

    pub fn with_idle_connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_connection_timeout = Some(timeout);
        self
    }

    pub fn with_credentials(mut self, credentials: CredentialsOverride) -> Self {
        self.config.credentials = Some(credentials);
        self
    }

    pub fn with_multipart_threshold(mut self, threshold: u64) -> Self {
        self.config.multipart_threshold = Some(threshold);
        self
    }

    pub fn with_part_buffer_size(mut self, size: usize) -> Self {
        self.config.part_buffer_size = Some(size);
        self
    }

    pub fn with_parallel_uploads(mut self, enabled: bool) -> Self {
        self.config.parallel_uploads_enabled = enabled;
        self
    }

    pub fn with_parallel_downloads(mut self, enabled: bool) -> Self {
        self.config.parallel_downloads_enabled = enabled;
        self
    }

    pub fn with_target_throughput_gbps(mut self, gbps: f64) -> BlobResult<Self> {
        if !gbps.is_finite() || gbps <= 0.0 {
            return Err(BlobError::invalid_argument(format!(
                "target throughput must be a positive number, got {}",
                gbps
            )));
        }
        self.config.target_throughput_gbps = Some(gbps);
        Ok(self)
    }

    pub fn with_max_concurrency(mut self, concurrency: usize) -> BlobResult<Self> {
        if concurrency == 0 {
            return Err(BlobError::invalid_argument(
                "max concurrency must be >= 1",
            ));
        }
        self.config.max_concurrency = Some(concurrency);
        Ok(self)
    }

    pub fn with_directory_concurrency(mut self, concurrency: usize) -> BlobResult<Self> {
        if concurrency == 0 {
            return Err(BlobError::invalid_argument(
                "directory concurrency must be >= 1",
            ));
        }
        self.config.directory_concurrency = Some(concurrency);
        Ok(self)
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = Some(size);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = Some(retry);
        self
    }

    /// Adds a provider-specific option passed through to the native client.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.options.insert(key.into(), value.into());
        self
    }

    /// Finalizes the accumulated configuration without building a client.
    pub fn into_config(self) -> BlobStoreConfig {
        self.config
    }

    /// Builds a blocking client over the configured provider.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidArgument` when the provider id is not registered,
    /// or with whatever the adapter factory reports for a bad configuration.
    pub fn build(self) -> BlobResult<crate::client::BucketClient> {
        crate::client::BucketClient::new(self.config)
    }

    /// Builds an asynchronous client over the configured provider.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`BlobStoreBuilder::build`].
    pub fn build_async(self) -> BlobResult<crate::client::AsyncBucketClient> {
        crate::client::AsyncBucketClient::new(self.config)
    }
}

fn parse_http_url(what: &str, value: &str) -> BlobResult<Url> {
    let url = Url::parse(value).map_err(|e| {
        BlobError::with_source(
            crate::error::ErrorKind::InvalidArgument,
            format!("{} is not a valid absolute URL: {}", what, value),
            e,
        )
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(BlobError::invalid_argument(format!(
            "{} scheme must be http or https, got {}",
            what, other
        ))),
    }
}
