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

//! Process-wide provider registry.
//!
//! Two independent tables map a provider id to an adapter factory: one
//! consulted by the blocking facade, one by the asynchronous facade. A
//! provider may register in either or both. The tables are append-only:
//! registration happens at process start (explicitly, or through the
//! `Once`-guarded default init) and there is no removal API; after init the
//! tables are only read, so concurrent lookups take a read lock that is
//! never contended by writers in steady state.

use std::collections::HashMap;
use std::sync::{Arc, Once, OnceLock, RwLock};

use tracing::debug;

use crate::config::BlobStoreConfig;
use crate::error::{BlobError, BlobResult};
use crate::adapter::ObjectStoreAdapter;
use crate::store::BlobStore;

/// Builds an adapter instance from a finalized configuration.
pub type BlobStoreFactory =
    Arc<dyn Fn(BlobStoreConfig) -> BlobResult<Arc<dyn BlobStore>> + Send + Sync>;

type FactoryTable = RwLock<HashMap<String, BlobStoreFactory>>;

static SYNC_PROVIDERS: OnceLock<FactoryTable> = OnceLock::new();
static ASYNC_PROVIDERS: OnceLock<FactoryTable> = OnceLock::new();
static DEFAULT_INIT: Once = Once::new();

fn sync_table() -> &'static FactoryTable {
    SYNC_PROVIDERS.get_or_init(|| RwLock::new(HashMap::new()))
}

fn async_table() -> &'static FactoryTable {
    ASYNC_PROVIDERS.get_or_init(|| RwLock::new(HashMap::new()))
}

fn insert(table: &'static FactoryTable, provider_id: &str, factory: BlobStoreFactory) {
    let mut guard = match table.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard.insert(provider_id.to_string(), factory);
}

fn lookup(table: &'static FactoryTable, provider_id: &str) -> Option<BlobStoreFactory> {
    let guard = match table.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    guard.get(provider_id).cloned()
}

/// Registers a factory in the blocking-facade table.
pub fn register_blob_store(provider_id: &str, factory: BlobStoreFactory) {
    debug!(provider_id, "registering blob store provider");
    insert(sync_table(), provider_id, factory);
}

/// Registers a factory in the asynchronous-facade table.
pub fn register_async_blob_store(provider_id: &str, factory: BlobStoreFactory) {
    debug!(provider_id, "registering async blob store provider");
    insert(async_table(), provider_id, factory);
}

/// Installs the bundled adapter for the built-in provider ids, in both
/// tables. Safe to call any number of times; only the first call registers.
pub fn init_default_providers() {
    DEFAULT_INIT.call_once(|| {
        let factory: BlobStoreFactory = Arc::new(|config| {
            let adapter = ObjectStoreAdapter::try_new(config)?;
            Ok(Arc::new(adapter) as Arc<dyn BlobStore>)
        });
        for provider_id in ["local", "memory", "aws", "azure", "gcs"] {
            register_blob_store(provider_id, factory.clone());
            register_async_blob_store(provider_id, factory.clone());
        }
    });
}

/// Resolves a provider id from the blocking-facade table and builds an
/// adapter. Unknown ids fail with InvalidArgument.
pub fn resolve_blob_store(config: BlobStoreConfig) -> BlobResult<Arc<dyn BlobStore>> {
    init_default_providers();
    let factory = lookup(sync_table(), &config.provider_id).ok_or_else(|| {
        BlobError::invalid_argument(format!("unknown provider: {}", config.provider_id))
    })?;
    factory(config)
}

/// Resolves a provider id from the asynchronous-facade table and builds an
/// adapter. Unknown ids fail with InvalidArgument.
pub fn resolve_async_blob_store(config: BlobStoreConfig) -> BlobResult<Arc<dyn BlobStore>> {
    init_default_providers();
    let factory = lookup(async_table(), &config.provider_id).ok_or_else(|| {
        BlobError::invalid_argument(format!("unknown provider: {}", config.provider_id))
    })?;
    factory(config)
}
