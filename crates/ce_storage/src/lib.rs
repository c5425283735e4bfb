use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use ce_core::{ArticleStore, Error, Result};

pub mod backends;

pub use backends::*;

/// Request timeout for the storage API. The API is local and small, so this
/// only guards against a hung server.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a store by backend name. `http` talks to the articles API at `url`;
/// `memory` is seeded from the JSON file at `seed` and never writes back.
pub fn create_storage(kind: &str, url: Option<&str>, seed: Option<&Path>) -> Result<Arc<dyn ArticleStore>> {
    match kind {
        "http" => {
            let url = url.ok_or_else(|| {
                Error::Config("the http storage backend needs a base URL".to_string())
            })?;
            Ok(Arc::new(HttpStorage::new(url, DEFAULT_TIMEOUT)?))
        }
        "memory" => {
            let seed = seed.ok_or_else(|| {
                Error::Config("the memory storage backend needs a seed file of articles".to_string())
            })?;
            Ok(Arc::new(MemoryStorage::from_json_file(seed)?))
        }
        other => Err(Error::Config(format!(
            "Unknown storage backend: {} (expected http or memory)",
            other
        ))),
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::create_storage;
    pub use ce_core::ArticleStore;
}
