//! The owning engine: native init and close, plus the DSP lock.

use core::cell::Cell;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use tracing::{debug, trace, warn};

use crate::dsp::{DspNode, DspType};
use crate::error::{Error, Result};
use crate::format::SpeakerMode;
use crate::handle::NativeHandle;
use crate::proxy::{Materialize, Proxy, ProxyKind};
use crate::registry::HandleRegistry;
use crate::reverb::ReverbProperties;
use crate::sim::{SimConfig, SimEngine};
use crate::sys::{NativeApi, ResultCode, SystemSettings};

/// Number of global reverb instances the engine exposes.
pub const REVERB_INSTANCES: i32 = 4;

/// Engine settings, applied at [`Engine::new`].
///
/// ```
/// # use mixbind::{EngineConfig, SpeakerMode};
/// let config = EngineConfig::default()
///     .with_speaker_mode(SpeakerMode::FivePointOne)
///     .with_command_queue_size(256);
/// assert_eq!(config.command_queue_size, 256);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub max_channels: u32,
    pub sample_rate: u32,
    pub speaker_mode: SpeakerMode,
    /// Samples per mix block
    pub dsp_block_len: usize,
    /// Capacity of the native command queue
    pub command_queue_size: usize,
    /// How many times [`Engine::poll_ready`] tries before giving up
    pub not_ready_poll_attempts: usize,
    pub not_ready_poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_channels: 64,
            sample_rate: 48_000,
            speaker_mode: SpeakerMode::Stereo,
            dsp_block_len: dasp_graph::Buffer::LEN,
            command_queue_size: 64,
            not_ready_poll_attempts: 16,
            not_ready_poll_interval: Duration::from_millis(1),
        }
    }
}

impl EngineConfig {
    pub fn with_max_channels(mut self, max_channels: u32) -> Self {
        self.max_channels = max_channels;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_speaker_mode(mut self, speaker_mode: SpeakerMode) -> Self {
        self.speaker_mode = speaker_mode;
        self
    }

    pub fn with_command_queue_size(mut self, size: usize) -> Self {
        self.command_queue_size = size.max(1);
        self
    }

    /// Set the not-ready retry budget.
    pub fn with_not_ready_polling(mut self, attempts: usize, interval: Duration) -> Self {
        self.not_ready_poll_attempts = attempts.max(1);
        self.not_ready_poll_interval = interval;
        self
    }

    pub(crate) fn settings(&self) -> SystemSettings {
        SystemSettings {
            max_channels: self.max_channels,
            sample_rate: self.sample_rate,
            speaker_mode: self.speaker_mode,
            dsp_block_len: self.dsp_block_len,
            command_queue_size: self.command_queue_size,
        }
    }
}

/// State every proxy reaches through its weak engine reference.
pub(crate) struct EngineShared {
    api: Arc<dyn NativeApi>,
    registry: HandleRegistry,
    dsp_lock: ReentrantMutex<Cell<u32>>,
}

impl EngineShared {
    #[inline]
    pub(crate) fn api(&self) -> &dyn NativeApi {
        &*self.api
    }

    #[inline]
    pub(crate) fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    pub(crate) fn lock_dsp(&self) -> Result<DspLock<'_>> {
        let depth = self.dsp_lock.lock();
        if depth.get() == 0 {
            self.api.system_lock_dsp().map_err(Error::native("System::lockDSP"))?;
            trace!("native DSP lock acquired");
        }
        depth.set(depth.get() + 1);
        Ok(DspLock { engine: self, depth })
    }

    /// Resolve a handle a native call promised would name an object.
    pub(crate) fn expect_object<T: Materialize>(
        &self,
        op: &'static str,
        handle: NativeHandle,
    ) -> Result<Arc<T>> {
        self.registry
            .resolve::<T>(handle)?
            .ok_or(Error::Native { op, code: ResultCode::Internal })
    }
}

/// Scoped hold on the engine-wide DSP lock.
///
/// While any guard is alive the mixer thread cannot observe the graph, so
/// several edits can be applied as one. Guards nest on the same thread; the
/// native lock is taken by the outermost guard and released when it drops,
/// on every exit path.
pub struct DspLock<'a> {
    engine: &'a EngineShared,
    depth: ReentrantMutexGuard<'a, Cell<u32>>,
}

impl Drop for DspLock<'_> {
    fn drop(&mut self) {
        let depth = self.depth.get() - 1;
        self.depth.set(depth);
        if depth == 0 {
            if let Err(code) = self.engine.api.system_unlock_dsp() {
                warn!(%code, "System::unlockDSP failed");
            } else {
                trace!("native DSP lock released");
            }
        }
    }
}

/// A native engine instance and the proxies materialized from it.
///
/// Every handle the native side hands back is routed through this engine's
/// [`HandleRegistry`], so each native object has exactly one live proxy.
/// Several engines can coexist in one process; their registries are
/// independent.
///
/// # Example
///
/// ```
/// # use mixbind::{ConnectionType, DspType, Engine, EngineConfig};
/// # fn main() -> mixbind::Result<()> {
/// let engine = Engine::simulated(EngineConfig::default())?;
/// let master = engine.master_dsp()?;
/// let osc = engine.create_dsp(DspType::Oscillator)?;
///
/// let connection = master.add_input(&osc, ConnectionType::Standard)?;
/// let input = engine.poll_ready(|| connection.input())?;
/// assert_eq!(input.as_deref(), Some(&*osc));
/// # Ok(())
/// # }
/// ```
pub struct Engine {
    shared: Arc<EngineShared>,
    config: EngineConfig,
    closed: bool,
}

impl Engine {
    /// Initialise the native engine behind `api`.
    pub fn new(api: Arc<dyn NativeApi>, config: EngineConfig) -> Result<Self> {
        api.system_init(&config.settings()).map_err(Error::native("System::init"))?;

        let shared = Arc::new_cyclic(|weak| EngineShared {
            api,
            registry: HandleRegistry::new(weak.clone()),
            dsp_lock: ReentrantMutex::new(Cell::new(0)),
        });
        debug!(
            sample_rate = config.sample_rate,
            speaker_mode = ?config.speaker_mode,
            queue = config.command_queue_size,
            "engine initialised"
        );

        Ok(Self { shared, closed: false, config })
    }

    /// An engine backed by a fresh in-process [`SimEngine`].
    pub fn simulated(config: EngineConfig) -> Result<Self> {
        Self::new(Arc::new(SimEngine::new(SimConfig::default())), config)
    }

    /// An engine over a caller-held stand-in, so tests can inspect it.
    pub fn with_sim(sim: Arc<SimEngine>, config: EngineConfig) -> Result<Self> {
        Self::new(sim, config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.shared.registry
    }

    pub fn create_dsp(&self, dsp_type: DspType) -> Result<Arc<DspNode>> {
        let handle = self
            .shared
            .api()
            .system_create_dsp_by_type(dsp_type)
            .map_err(Error::native("System::createDSPByType"))?;
        debug!(%handle, ?dsp_type, "created DSP");
        self.shared.expect_object("System::createDSPByType", handle)
    }

    /// The node at the root of the mix; everything audible feeds into it.
    pub fn master_dsp(&self) -> Result<Arc<DspNode>> {
        let handle = self
            .shared
            .api()
            .system_get_master_dsp()
            .map_err(Error::native("System::getMasterDSP"))?;
        self.shared.expect_object("System::getMasterDSP", handle)
    }

    /// The proxy for `handle`, materializing a `T` if needed.
    pub fn resolve<T: Materialize>(&self, handle: NativeHandle) -> Result<Option<Arc<T>>> {
        self.shared.registry.resolve(handle)
    }

    /// The proxy for `handle`, asking the native side for its kind.
    pub fn resolve_dyn(&self, handle: NativeHandle) -> Result<Option<Arc<dyn Proxy>>> {
        self.shared.registry.resolve_dyn(handle)
    }

    /// Hold the engine-wide DSP lock until the guard drops.
    pub fn lock_dsp(&self) -> Result<DspLock<'_>> {
        self.shared.lock_dsp()
    }

    /// Let the native engine apply queued commands.
    pub fn update(&self) -> Result<()> {
        self.shared.api().system_update().map_err(Error::native("System::update"))
    }

    /// Run `op` until it stops reporting not-ready.
    ///
    /// Between attempts the engine is updated and the thread sleeps for the
    /// configured interval. Any other error is returned straight away. If
    /// the attempts run out, the last not-ready error is returned.
    pub fn poll_ready<T>(&self, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let attempts = self.config.not_ready_poll_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Err(e) if e.is_not_ready() && attempt < attempts => {
                    trace!(attempt, "native engine not ready, polling");
                    self.update()?;
                    std::thread::sleep(self.config.not_ready_poll_interval);
                    attempt += 1;
                }
                Err(e) if e.is_not_ready() => {
                    warn!(attempts, "native engine still not ready, giving up");
                    return Err(e);
                }
                other => return other,
            }
        }
    }

    pub fn speaker_mode(&self) -> Result<SpeakerMode> {
        self.shared
            .api()
            .system_get_speaker_mode()
            .map_err(Error::native("System::getSoftwareFormat"))
    }

    pub fn set_reverb_properties(&self, instance: i32, props: &ReverbProperties) -> Result<()> {
        self.shared
            .api()
            .system_set_reverb_properties(instance, &props.to_raw())
            .map_err(Error::native("System::setReverbProperties"))
    }

    pub fn reverb_properties(&self, instance: i32) -> Result<ReverbProperties> {
        let raw = self
            .shared
            .api()
            .system_get_reverb_properties(instance)
            .map_err(Error::native("System::getReverbProperties"))?;
        Ok(ReverbProperties::from_raw(&raw))
    }

    /// Dispose every live proxy, then close the native engine.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut proxies = self.shared.registry.drain();
        // Connections first; their endpoints are still valid at that point.
        proxies.sort_by_key(|p| match p.kind() {
            ProxyKind::DspConnection => 0,
            ProxyKind::Dsp => 1,
        });

        let mut first_error = None;
        for proxy in &proxies {
            if let Err(e) = proxy.dispose() {
                warn!(handle = %proxy.handle(), error = %e, "failed to dispose proxy during close");
                first_error.get_or_insert(e);
            }
        }
        debug!(disposed = proxies.len(), "closing engine");

        self.shared.api().system_close().map_err(Error::native("System::close"))?;
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "engine close failed during drop");
        }
    }
}
