//! Managed proxies for native objects and their lifecycle.
//!
//! A proxy is bound to exactly one [`NativeHandle`] and owns that native
//! object's lifetime. Its state only moves forward:
//!
//! ```text
//! Live --dispose()--> Disposed
//! ```
//!
//! Disposal calls the native destructor for the proxy's concrete kind exactly
//! once, clears the handle to [`NativeHandle::NULL`] and notifies listeners.
//! The [`HandleRegistry`](crate::HandleRegistry) listens so it can evict the
//! entry immediately.

use core::any::Any;
use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::engine::EngineShared;
use crate::error::{Error, Result};
use crate::handle::NativeHandle;
use crate::sys::NativeApi;

/// The concrete kind of a native object, as reported by the native side.
#[repr(i32)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ProxyKind {
    Dsp = 1,
    DspConnection = 2,
}

pub(crate) type DisposeListener = Box<dyn FnOnce(NativeHandle) + Send>;

const LIVE: u8 = 0;
const RELEASING: u8 = 1;
const DISPOSED: u8 = 2;

/// Shared lifecycle state embedded in every proxy.
pub struct ProxyCore {
    // the handle this proxy was built for; never cleared
    bound: NativeHandle,
    handle: AtomicUsize,
    state: AtomicU8,
    listeners: Mutex<Vec<DisposeListener>>,
    engine: Weak<EngineShared>,
}

impl ProxyCore {
    pub(crate) fn new(handle: NativeHandle, engine: Weak<EngineShared>) -> Self {
        Self {
            bound: handle,
            handle: AtomicUsize::new(handle.as_raw()),
            state: AtomicU8::new(LIVE),
            listeners: Mutex::new(Vec::new()),
            engine,
        }
    }

    /// The bound handle, or `NULL` once disposed.
    #[inline]
    pub fn handle(&self) -> NativeHandle {
        NativeHandle::from_raw(self.handle.load(Ordering::Acquire))
    }

    /// The handle the proxy was created for. Unlike [`handle`](Self::handle)
    /// it survives disposal, so it is what equality and hashing use.
    #[inline]
    pub fn bound_handle(&self) -> NativeHandle {
        self.bound
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.state.load(Ordering::Acquire) == DISPOSED
    }

    /// Register a callback for disposal. It receives the handle the proxy
    /// was bound to. On an already disposed proxy it runs immediately with `NULL`.
    pub fn on_dispose(&self, listener: impl FnOnce(NativeHandle) + Send + 'static) {
        let mut listeners = self.listeners.lock();
        if self.is_disposed() {
            drop(listeners);
            listener(NativeHandle::NULL);
        } else {
            listeners.push(Box::new(listener));
        }
    }

    /// The handle if still live, for issuing native calls.
    pub(crate) fn live_handle(&self) -> Result<NativeHandle> {
        let handle = self.handle();
        if handle.is_null() || self.is_disposed() {
            return Err(Error::Disposed);
        }
        Ok(handle)
    }

    /// The owning engine plus the live handle. A closed engine takes
    /// precedence over disposal, since closing disposes everything.
    pub(crate) fn bind(&self) -> Result<(Arc<EngineShared>, NativeHandle)> {
        let engine = self.engine.upgrade().ok_or(Error::EngineClosed)?;
        let handle = self.live_handle()?;
        Ok((engine, handle))
    }

    pub(crate) fn engine_weak(&self) -> &Weak<EngineShared> {
        &self.engine
    }

    fn dispose_with(&self, release: impl FnOnce(NativeHandle) -> Result<()>) -> Result<()> {
        if self
            .state
            .compare_exchange(LIVE, RELEASING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Disposed already, or another thread is releasing right now.
            return Ok(());
        }

        let handle = self.handle();
        if let Err(e) = release(handle) {
            self.state.store(LIVE, Ordering::Release);
            return Err(e);
        }

        self.handle.store(NativeHandle::NULL.as_raw(), Ordering::Release);
        self.state.store(DISPOSED, Ordering::Release);

        let listeners = core::mem::take(&mut *self.listeners.lock());
        for listener in listeners {
            listener(handle);
        }
        Ok(())
    }
}

/// Upcast helper so cached `Arc<dyn Proxy>` values can be downcast to their
/// concrete type.
pub trait AsAnyArc: Any + Send + Sync {
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> AsAnyArc for T {
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A managed object bound to one native handle.
pub trait Proxy: AsAnyArc {
    fn core(&self) -> &ProxyCore;

    fn kind(&self) -> ProxyKind;

    /// Issue the one native destructor appropriate to this kind.
    fn release_native(&self, api: &dyn NativeApi, handle: NativeHandle) -> Result<()>;

    fn handle(&self) -> NativeHandle {
        self.core().handle()
    }

    fn is_disposed(&self) -> bool {
        self.core().is_disposed()
    }

    /// Release the native object. Idempotent: later calls do nothing.
    ///
    /// If the native destructor fails the error is returned and the proxy
    /// stays live.
    fn dispose(&self) -> Result<()> {
        let core = self.core();
        let kind = self.kind();
        core.dispose_with(|handle| {
            let engine = core.engine_weak().upgrade().ok_or(Error::EngineClosed)?;
            self.release_native(engine.api(), handle)?;
            debug!(%handle, ?kind, "disposed proxy");
            Ok(())
        })
    }
}

/// Proxies the registry knows how to build for a given handle.
pub trait Materialize: Proxy + Sized {
    const KIND: ProxyKind;

    fn materialize(core: ProxyCore) -> Self;
}
