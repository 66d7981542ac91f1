//! Flyweight cache mapping native handles to their single live proxy.

use std::sync::{Arc, Weak};

use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::dsp::{DspConnection, DspNode};
use crate::engine::EngineShared;
use crate::error::{Error, Result};
use crate::handle::NativeHandle;
use crate::proxy::{Materialize, Proxy, ProxyCore, ProxyKind};

type Factory = fn(ProxyCore) -> Arc<dyn Proxy>;

fn build<T: Materialize>(core: ProxyCore) -> Arc<dyn Proxy> {
    Arc::new(T::materialize(core))
}

#[derive(Default)]
struct Entries {
    map: Mutex<HashMap<NativeHandle, Arc<dyn Proxy>>>,
}

impl Entries {
    /// Remove `handle` only while it still maps to `proxy`. A late disposal
    /// notice from an old proxy must not evict a newer one.
    fn evict_if(&self, handle: NativeHandle, proxy: &Weak<dyn Proxy>) {
        let mut map = self.map.lock();
        let same = map
            .get(&handle)
            .map(|cached| Arc::as_ptr(cached) as *const () == proxy.as_ptr() as *const ())
            .unwrap_or(false);
        if same {
            map.remove(&handle);
            debug!(%handle, "evicted disposed proxy");
        }
    }
}

/// Guarantees at most one live proxy per native handle.
///
/// Owned by an [`Engine`](crate::Engine); every query that yields a native
/// handle is routed through here. The map is shared between threads behind
/// a mutex.
///
/// # Handle reuse
///
/// If the native allocator hands out a released handle value again before
/// the old proxy has been disposed, [`resolve`](Self::resolve) returns the
/// stale proxy. The registry cannot detect this on its own; dispose proxies
/// promptly after their native object is released.
pub struct HandleRegistry {
    entries: Arc<Entries>,
    factories: HashMap<ProxyKind, Factory>,
    engine: Weak<EngineShared>,
}

impl HandleRegistry {
    pub(crate) fn new(engine: Weak<EngineShared>) -> Self {
        let mut factories: HashMap<ProxyKind, Factory> = HashMap::new();
        factories.insert(DspNode::KIND, build::<DspNode>);
        factories.insert(DspConnection::KIND, build::<DspConnection>);

        Self {
            entries: Arc::new(Entries::default()),
            factories,
            engine,
        }
    }

    /// The live proxy for `handle`, materializing a `T` if there is none.
    ///
    /// Returns `Ok(None)` for the null handle. Asking for a different kind
    /// than the one already cached is a caller error and yields
    /// [`Error::KindMismatch`].
    pub fn resolve<T: Materialize>(&self, handle: NativeHandle) -> Result<Option<Arc<T>>> {
        if handle.is_null() {
            return Ok(None);
        }

        let mut map = self.entries.map.lock();
        if let Some(cached) = Self::live_entry(&mut map, handle) {
            if cached.kind() != T::KIND {
                return Err(Error::KindMismatch {
                    handle,
                    cached: cached.kind(),
                    requested: T::KIND,
                });
            }
            trace!(%handle, "proxy cache hit");
            let cached_kind = cached.kind();
            return cached
                .as_any_arc()
                .downcast::<T>()
                .map(Some)
                .map_err(|_| Error::KindMismatch {
                    handle,
                    cached: cached_kind,
                    requested: T::KIND,
                });
        }

        let proxy = Arc::new(T::materialize(ProxyCore::new(handle, self.engine.clone())));
        let erased: Arc<dyn Proxy> = proxy.clone();
        self.subscribe(handle, &erased);
        map.insert(handle, erased);
        debug!(%handle, kind = ?T::KIND, "materialized proxy");

        Ok(Some(proxy))
    }

    /// Like [`resolve`](Self::resolve), but asks the native side what kind of
    /// object `handle` is and builds the proxy from the factory table.
    pub fn resolve_dyn(&self, handle: NativeHandle) -> Result<Option<Arc<dyn Proxy>>> {
        if handle.is_null() {
            return Ok(None);
        }

        if let Some(cached) = Self::live_entry(&mut self.entries.map.lock(), handle) {
            trace!(%handle, "proxy cache hit");
            return Ok(Some(cached));
        }

        // Query outside the lock; the foreign call may be slow.
        let engine = self.engine.upgrade().ok_or(Error::EngineClosed)?;
        let kind = engine
            .api()
            .object_kind(handle)
            .map_err(Error::native("object_kind"))?;
        let factory = self
            .factories
            .get(&kind)
            .ok_or_else(|| Error::Layout(format!("no proxy factory for {:?}", kind)))?;

        let mut map = self.entries.map.lock();
        // Another thread may have materialized it while we were asking.
        if let Some(cached) = Self::live_entry(&mut map, handle) {
            return Ok(Some(cached));
        }
        let proxy = factory(ProxyCore::new(handle, self.engine.clone()));
        self.subscribe(handle, &proxy);
        map.insert(handle, proxy.clone());
        debug!(%handle, ?kind, "materialized proxy from factory");

        Ok(Some(proxy))
    }

    /// Add an externally built proxy. Fails if `handle` already has a live proxy.
    pub fn register(&self, handle: NativeHandle, proxy: Arc<dyn Proxy>) -> Result<()> {
        if proxy.is_disposed() {
            return Err(Error::Disposed);
        }
        debug_assert_eq!(proxy.handle(), handle);
        if self.contains_live(handle) {
            return Err(Error::AlreadyRegistered(handle));
        }
        // Subscribe before taking the lock: a listener on a proxy disposed in
        // the meantime runs immediately and needs the map itself.
        self.subscribe(handle, &proxy);

        let mut map = self.entries.map.lock();
        if Self::live_entry(&mut map, handle).is_some() {
            return Err(Error::AlreadyRegistered(handle));
        }
        map.insert(handle, proxy);
        Ok(())
    }

    /// Drop the mapping for `handle`, if any. Idempotent.
    pub fn evict(&self, handle: NativeHandle) -> bool {
        self.entries.map.lock().remove(&handle).is_some()
    }

    pub fn contains(&self, handle: NativeHandle) -> bool {
        self.entries.map.lock().contains_key(&handle)
    }

    fn contains_live(&self, handle: NativeHandle) -> bool {
        Self::live_entry(&mut self.entries.map.lock(), handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return every cached proxy.
    pub(crate) fn drain(&self) -> Vec<Arc<dyn Proxy>> {
        self.entries.map.lock().drain().map(|(_, proxy)| proxy).collect()
    }

    fn live_entry(
        map: &mut HashMap<NativeHandle, Arc<dyn Proxy>>,
        handle: NativeHandle,
    ) -> Option<Arc<dyn Proxy>> {
        let cached = map.get(&handle)?;
        if cached.is_disposed() {
            warn!(%handle, "evicting stale proxy left behind by disposal");
            map.remove(&handle);
            return None;
        }
        Some(cached.clone())
    }

    fn subscribe(&self, handle: NativeHandle, proxy: &Arc<dyn Proxy>) {
        let entries = Arc::downgrade(&self.entries);
        let target = Arc::downgrade(proxy);
        proxy.core().on_dispose(move |released| {
            debug_assert_eq!(released, handle);
            if let Some(entries) = entries.upgrade() {
                entries.evict_if(handle, &target);
            }
        });
    }
}
