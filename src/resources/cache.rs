//! Resource Cache
//!
//! Deduplicates resource loads by logical name and manages shared ownership.
//! The cache holds `Weak` references: consumers own the `Arc`s, and an entry
//! disappears once the last holder releases it. Dead entries are pruned on
//! insert, lookup, and [`ResourceCache::purge`].
//!
//! # Background loads
//!
//! Decoding raw pixels is parallelizable; creating the GPU resource is not.
//! [`ResourceCache::load_image_async`] runs an injected decode closure on a
//! worker thread and ships the finished CPU image over a channel;
//! [`ResourceCache::drain_loaded`] runs on the device-owning thread and is
//! the only place completed loads become visible. A load either completes
//! fully or is logged and dropped — a partially decoded image is never
//! observable.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::errors::CinderError;
use crate::resources::{Image, Material, Mesh, Resource};

type DecodeResult = std::result::Result<Image, String>;

struct LoadedImage {
    name: String,
    result: DecodeResult,
}

/// Name-keyed deduplicating resource cache.
pub struct ResourceCache {
    // Single lock serializes insertion so two threads can never cache the
    // same logical name twice.
    entries: Mutex<FxHashMap<String, Weak<Resource>>>,
    loaded_tx: flume::Sender<LoadedImage>,
    loaded_rx: flume::Receiver<LoadedImage>,
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceCache {
    #[must_use]
    pub fn new() -> Self {
        let (loaded_tx, loaded_rx) = flume::unbounded();
        Self {
            entries: Mutex::new(FxHashMap::default()),
            loaded_tx,
            loaded_rx,
        }
    }

    /// Registers a resource, deduplicating by name.
    ///
    /// If a live resource with the same logical name already exists, the
    /// existing shared handle is returned and `resource` is discarded —
    /// its allocation is never referenced again.
    pub fn cache(&self, resource: Arc<Resource>) -> Arc<Resource> {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&resource.name).and_then(Weak::upgrade) {
            log::debug!(
                "[resources] '{}' already cached, discarding duplicate",
                resource.name
            );
            return existing;
        }
        log::debug!(
            "[resources] cached {} '{}'",
            resource.kind_name(),
            resource.name
        );
        entries.insert(resource.name.clone(), Arc::downgrade(&resource));
        resource
    }

    /// Looks up a live resource by name. `None` means the caller must
    /// load-and-cache.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Resource>> {
        let mut entries = self.entries.lock();
        match entries.get(name).map(Weak::upgrade) {
            Some(Some(resource)) => Some(resource),
            Some(None) => {
                // Last holder released; drop the stale entry.
                entries.remove(name);
                None
            }
            None => None,
        }
    }

    #[must_use]
    pub fn get_image(&self, name: &str) -> Option<Arc<Resource>> {
        self.get(name).filter(|r| r.as_image().is_some())
    }

    #[must_use]
    pub fn get_mesh(&self, name: &str) -> Option<Arc<Resource>> {
        self.get(name).filter(|r| r.as_mesh().is_some())
    }

    #[must_use]
    pub fn get_material(&self, name: &str) -> Option<Arc<Resource>> {
        self.get(name).filter(|r| r.as_material().is_some())
    }

    /// Convenience: cache freshly built payloads.
    pub fn cache_image(&self, name: &str, image: Image) -> Arc<Resource> {
        self.cache(Arc::new(Resource::image(name, image)))
    }

    pub fn cache_mesh(&self, name: &str, mesh: Mesh) -> Arc<Resource> {
        self.cache(Arc::new(Resource::mesh(name, mesh)))
    }

    pub fn cache_material(&self, name: &str, material: Material) -> Arc<Resource> {
        self.cache(Arc::new(Resource::material(name, material)))
    }

    /// Number of live cached entries.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Drops bookkeeping for resources whose last holder has released.
    pub fn purge(&self) {
        self.entries
            .lock()
            .retain(|_, weak| weak.strong_count() > 0);
    }

    // ========================================================================
    // Background loading
    // ========================================================================

    /// Schedules an image decode on a worker thread.
    ///
    /// `decode` runs off-thread; the result is queued for
    /// [`ResourceCache::drain_loaded`] on the device-owning thread. If the
    /// name is already cached, the load is skipped.
    pub fn load_image_async<F>(&self, name: &str, decode: F)
    where
        F: FnOnce() -> DecodeResult + Send + 'static,
    {
        if self.get(name).is_some() {
            return;
        }
        let tx = self.loaded_tx.clone();
        let name = name.to_string();
        std::thread::spawn(move || {
            let result = decode();
            // Receiver dropped means the cache is gone; nothing to do.
            let _ = tx.send(LoadedImage { name, result });
        });
    }

    /// Marshals completed background loads into the cache.
    ///
    /// Must be called on the thread that owns the device context — this is
    /// the serialization point between parallel decode and GPU-resource
    /// creation. Returns the newly cached resources; failures are logged
    /// and yield no cache entry.
    pub fn drain_loaded(&self) -> Vec<Arc<Resource>> {
        let mut completed = Vec::new();
        for loaded in self.loaded_rx.try_iter() {
            match loaded.result {
                Ok(image) => {
                    let resource = self.cache(Arc::new(Resource::image(&loaded.name, image)));
                    completed.push(resource);
                }
                Err(reason) => {
                    let err = CinderError::LoadFailed {
                        name: loaded.name,
                        reason,
                    };
                    log::error!("[resources] {err}");
                }
            }
        }
        completed
    }
}

