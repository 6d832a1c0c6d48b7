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

//! Retry configuration.
//!
//! This layer does not run its own retry loop. A [`RetryConfig`] is a pure
//! configuration value that each adapter translates into its native client's
//! retry primitives at build time; for the bundled adapter that translation
//! targets `object_store::RetryConfig`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BlobError, BlobResult};

/// Backoff strategy between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryMode {
    /// The same delay between every attempt.
    Fixed,
    /// Delay grows by the configured multiplier up to the maximum delay.
    Exponential,
}

/// Retry tuning translated by each adapter into native client options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub mode: RetryMode,
    /// Total number of attempts, including the initial one. Must be >= 1.
    pub max_attempts: u32,
    /// Fixed delay (FIXED mode) or initial delay (EXPONENTIAL mode).
    pub initial_delay: Duration,
    /// Upper bound on the delay in EXPONENTIAL mode.
    pub max_delay: Duration,
    /// Backoff multiplier in EXPONENTIAL mode. Must be >= 1.0.
    pub multiplier: f64,
    /// Timeout applied to each individual attempt.
    pub attempt_timeout: Option<Duration>,
    /// Timeout applied across all attempts of one operation.
    pub total_timeout: Option<Duration>,
}

impl RetryConfig {
    /// Creates a fixed-delay retry configuration.
    pub fn fixed(max_attempts: u32, delay: Duration) -> BlobResult<Self> {
        validate_max_attempts(max_attempts)?;
        Ok(Self {
            mode: RetryMode::Fixed,
            max_attempts,
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            attempt_timeout: None,
            total_timeout: None,
        })
    }

    /// Creates an exponential-backoff retry configuration.
    pub fn exponential(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    ) -> BlobResult<Self> {
        validate_max_attempts(max_attempts)?;
        if multiplier < 1.0 {
            return Err(BlobError::invalid_argument(format!(
                "retry multiplier must be >= 1.0, got {}",
                multiplier
            )));
        }
        if max_delay < initial_delay {
            return Err(BlobError::invalid_argument(
                "retry max delay must be >= initial delay",
            ));
        }
        Ok(Self {
            mode: RetryMode::Exponential,
            max_attempts,
            initial_delay,
            max_delay,
            multiplier,
            attempt_timeout: None,
            total_timeout: None,
        })
    }

    /// Sets the per-attempt timeout.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Sets the timeout across all attempts of one operation.
    pub fn with_total_timeout(mut self, timeout: Duration) -> Self {
        self.total_timeout = Some(timeout);
        self
    }

    /// Translates this configuration into `object_store` retry options.
    pub(crate) fn to_native(&self) -> object_store::RetryConfig {
        let defaults = object_store::RetryConfig::default();
        let backoff = match self.mode {
            RetryMode::Fixed => object_store::BackoffConfig {
                init_backoff: self.initial_delay,
                max_backoff: self.initial_delay,
                base: 1.0,
            },
            RetryMode::Exponential => object_store::BackoffConfig {
                init_backoff: self.initial_delay,
                max_backoff: self.max_delay,
                base: self.multiplier,
            },
        };
        object_store::RetryConfig {
            backoff,
            // max_retries counts retries after the initial attempt.
            max_retries: self.max_attempts.saturating_sub(1) as usize,
            retry_timeout: self.total_timeout.unwrap_or(defaults.retry_timeout),
        }
    }
}

fn validate_max_attempts(max_attempts: u32) -> BlobResult<()> {
    if max_attempts == 0 {
        return Err(BlobError::invalid_argument(
            "retry max attempts must be >= 1",
        ));
    }
    Ok(())
}
