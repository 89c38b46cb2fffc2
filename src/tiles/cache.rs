use crate::tiles::capabilities::{Capabilities, CapabilitiesError};
use futures::future::{BoxFuture, FutureExt, Shared};
use fxhash::FxHashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

type CapabilitiesResult = Result<Arc<Capabilities>, CapabilitiesError>;
type SharedLoad = Shared<BoxFuture<'static, CapabilitiesResult>>;

/// Per-URL memo of capabilities loads.
///
/// Concurrent callers for the same URL await one shared future, so only one
/// fetch happens per URL. Successful results stay cached for the lifetime of
/// the cache; failed loads are evicted so the next caller retries.
#[derive(Clone, Default)]
pub struct CapabilitiesCache {
    entries: Arc<Mutex<FxHashMap<String, SharedLoad>>>,
}

impl CapabilitiesCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached or in-flight load for `url`, starting `load` if
    /// there is none.
    pub async fn get_or_load<F, Fut>(&self, url: &str, load: F) -> CapabilitiesResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CapabilitiesResult> + Send + 'static,
    {
        let shared = {
            let mut entries = match self.entries.lock() {
                Ok(entries) => entries,
                Err(poisoned) => poisoned.into_inner(),
            };
            entries
                .entry(url.to_string())
                .or_insert_with(|| {
                    log::debug!("starting capabilities load for {}", url);
                    load().boxed().shared()
                })
                .clone()
        };

        let result = shared.clone().await;
        if result.is_err() {
            self.evict_failed(url, &shared);
        }
        result
    }

    /// Removes the entry only if it is still the failed load, a retry may
    /// already have replaced it.
    fn evict_failed(&self, url: &str, failed: &SharedLoad) {
        if let Ok(mut entries) = self.entries.lock() {
            let same = entries
                .get(url)
                .map(|current| current.ptr_eq(failed))
                .unwrap_or(false);
            if same {
                entries.remove(url);
            }
        }
    }

    /// Completed and successful capabilities for `url`, if any
    pub fn get(&self, url: &str) -> Option<Arc<Capabilities>> {
        let entries = self.entries.lock().ok()?;
        match entries.get(url)?.peek() {
            Some(Ok(caps)) => Some(caps.clone()),
            _ => None,
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(url))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}
