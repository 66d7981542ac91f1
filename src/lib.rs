//! mixbind - managed proxies and DSP routing over a native real-time audio engine
//!
//! Design principles:
//! - One live proxy per native handle, cached per engine
//! - Proxies release their native object exactly once and then read as `NULL`
//! - The routing graph lives natively; proxies query it, never mirror it
//! - Every native failure is an error; only not-ready is worth retrying
//! - Graph edits run under a scoped, nestable DSP lock
//!
//! The native library is reached through [`sys::NativeApi`]. [`sim::SimEngine`]
//! implements it in-process for tests and demos.

mod engine;
mod error;
mod format;
mod handle;
mod proxy;
mod registry;

pub mod dsp;
pub mod reverb;
pub mod sim;
pub mod sys;

pub use dsp::{
    ConnectionType, DspConnection, DspNode, DspType, MeteringFlags, MixMatrix, ParameterChange,
    ParameterDesc, ParameterKind, ParameterShape, ParameterValue,
};
pub use engine::{DspLock, Engine, EngineConfig, REVERB_INSTANCES};
pub use error::{Error, Result};
pub use format::{ChannelFormat, ChannelMask, SpeakerMode};
pub use handle::NativeHandle;
pub use proxy::{AsAnyArc, Materialize, Proxy, ProxyCore, ProxyKind};
pub use registry::HandleRegistry;
pub use reverb::ReverbProperties;
