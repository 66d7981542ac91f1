//! In-process stand-in for the native engine.
//!
//! [`SimEngine`] implements [`NativeApi`] on top of a petgraph routing graph
//! and a handful of simple processors. It exists so the binding layer can be
//! driven end to end without the native library: handles, connection
//! semantics, command queue latency and mix matrix validation behave like the
//! real thing. It does not try to sound like it.
//!
//! ```
//! use std::sync::Arc;
//! use mixbind::sim::{SimConfig, SimEngine};
//! use mixbind::{DspType, Engine, EngineConfig};
//!
//! # fn main() -> mixbind::Result<()> {
//! let sim = Arc::new(SimEngine::new(SimConfig::default()));
//! let engine = Engine::with_sim(sim.clone(), EngineConfig::default())?;
//! let osc = engine.create_dsp(DspType::Oscillator)?;
//! assert_eq!(sim.execution_count(osc.handle()), Some(0));
//! # Ok(())
//! # }
//! ```

mod processor;
mod state;

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use petgraph::Direction::{Incoming, Outgoing};
use tracing::debug;

use crate::dsp::{ConnectionType, DspType, ParameterKind, ParameterValue};
use crate::format::{ChannelFormat, SpeakerMode};
use crate::handle::NativeHandle;
use crate::proxy::ProxyKind;
use crate::sys::{
    NativeApi, NativeResult, RawParameterDesc, RawReverbProperties, ResultCode, SystemSettings,
};

use state::SimState;

pub use processor::{
    CHANNEL_MIX_GROUPING, FADER_GAIN, FADER_MUTE, FADER_OVERALL_GAIN, OSCILLATOR_RATE,
    OSCILLATOR_TYPE,
};

/// Behaviour switches of the stand-in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimConfig {
    /// Queue new connections for the mixer instead of applying them at once.
    /// Endpoint queries report not-ready until the next mix tick.
    pub deferred_connections: bool,
    /// Hand out released handle values again, most recent first.
    pub recycle_handles: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            deferred_connections: true,
            recycle_handles: false,
        }
    }
}

impl SimConfig {
    pub fn with_deferred_connections(mut self, deferred: bool) -> Self {
        self.deferred_connections = deferred;
        self
    }

    pub fn with_recycle_handles(mut self, recycle: bool) -> Self {
        self.recycle_handles = recycle;
        self
    }
}

pub struct SimEngine {
    state: Arc<Mutex<SimState>>,
}

impl SimEngine {
    pub fn new(config: SimConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new(config))),
        }
    }

    /// Run one mix block now, as [`NativeApi::system_update`] does.
    pub fn mix(&self) {
        self.state.lock().mix();
    }

    /// Mix every `interval` on a background thread until the returned
    /// handle is dropped.
    pub fn spawn_mixer(&self, interval: Duration) -> MixerThread {
        let state = Arc::clone(&self.state);
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = std::thread::spawn(move || {
            while !flag.load(Ordering::Acquire) {
                state.lock().mix();
                std::thread::sleep(interval);
            }
        });
        debug!(?interval, "stand-in mixer thread started");
        MixerThread { stop, thread: Some(thread) }
    }

    /// Mix blocks run so far.
    pub fn tick(&self) -> u64 {
        self.state.lock().tick()
    }

    /// How many times `dsp` has executed, `None` if it is not a live node.
    pub fn execution_count(&self, dsp: NativeHandle) -> Option<u64> {
        self.state.lock().node(dsp).ok().map(|n| n.executions)
    }

    /// How many native release calls `handle` has received.
    pub fn release_count(&self, handle: NativeHandle) -> u32 {
        self.state.lock().release_count(handle)
    }

    /// Largest absolute sample in the audible output of `dsp`'s last block.
    pub fn output_peak(&self, dsp: NativeHandle) -> Option<f32> {
        self.state.lock().node(dsp).ok().map(|n| peak(&n.output))
    }

    /// Largest absolute sample `dsp` received on its sidechain last block.
    pub fn sidechain_peak(&self, dsp: NativeHandle) -> Option<f32> {
        self.state.lock().node(dsp).ok().map(|n| peak(&n.sidechain))
    }

    pub fn is_dsp_locked(&self) -> bool {
        self.state.lock().is_locked()
    }
}

fn peak(buffers: &[dasp_graph::Buffer]) -> f32 {
    buffers
        .iter()
        .flat_map(|b| b.iter())
        .fold(0.0f32, |acc, s| acc.max(s.abs()))
}

/// Background mixer started by [`SimEngine::spawn_mixer`]. Stops on drop.
pub struct MixerThread {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for MixerThread {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl NativeApi for SimEngine {
    fn system_init(&self, settings: &SystemSettings) -> NativeResult<()> {
        self.state.lock().init(settings)
    }

    fn system_close(&self) -> NativeResult<()> {
        self.state.lock().close()
    }

    fn system_update(&self) -> NativeResult<()> {
        let mut state = self.state.lock();
        state.settings()?;
        state.mix();
        Ok(())
    }

    fn system_lock_dsp(&self) -> NativeResult<()> {
        self.state.lock().lock()
    }

    fn system_unlock_dsp(&self) -> NativeResult<()> {
        self.state.lock().unlock()
    }

    fn system_create_dsp_by_type(&self, dsp_type: DspType) -> NativeResult<NativeHandle> {
        self.state.lock().create_dsp(dsp_type)
    }

    fn system_get_master_dsp(&self) -> NativeResult<NativeHandle> {
        self.state.lock().master()
    }

    fn system_get_speaker_mode(&self) -> NativeResult<SpeakerMode> {
        self.state.lock().speaker_mode()
    }

    fn system_get_string(&self, token: u32) -> NativeResult<String> {
        self.state.lock().string(token)
    }

    fn system_set_reverb_properties(
        &self,
        instance: i32,
        props: &RawReverbProperties,
    ) -> NativeResult<()> {
        self.state.lock().set_reverb(instance, props)
    }

    fn system_get_reverb_properties(&self, instance: i32) -> NativeResult<RawReverbProperties> {
        self.state.lock().reverb(instance)
    }

    fn object_kind(&self, handle: NativeHandle) -> NativeResult<ProxyKind> {
        self.state.lock().object_kind(handle)
    }

    fn dsp_release(&self, dsp: NativeHandle) -> NativeResult<()> {
        self.state.lock().release_dsp(dsp)
    }

    fn dsp_get_type(&self, dsp: NativeHandle) -> NativeResult<DspType> {
        Ok(self.state.lock().node(dsp)?.dsp_type)
    }

    fn dsp_add_input(
        &self,
        dsp: NativeHandle,
        input: NativeHandle,
        kind: ConnectionType,
    ) -> NativeResult<NativeHandle> {
        self.state.lock().add_input(dsp, input, kind)
    }

    fn dsp_disconnect_from(
        &self,
        dsp: NativeHandle,
        target: NativeHandle,
        connection: NativeHandle,
    ) -> NativeResult<()> {
        self.state.lock().disconnect_from(dsp, target, connection)
    }

    fn dsp_disconnect_all(
        &self,
        dsp: NativeHandle,
        inputs: bool,
        outputs: bool,
    ) -> NativeResult<()> {
        self.state.lock().disconnect_all(dsp, inputs, outputs)
    }

    fn dsp_get_num_inputs(&self, dsp: NativeHandle) -> NativeResult<usize> {
        self.state.lock().edge_count(dsp, Incoming)
    }

    fn dsp_get_num_outputs(&self, dsp: NativeHandle) -> NativeResult<usize> {
        self.state.lock().edge_count(dsp, Outgoing)
    }

    fn dsp_get_input(
        &self,
        dsp: NativeHandle,
        index: usize,
    ) -> NativeResult<(NativeHandle, NativeHandle)> {
        self.state.lock().edge_at(dsp, Incoming, index)
    }

    fn dsp_get_output(
        &self,
        dsp: NativeHandle,
        index: usize,
    ) -> NativeResult<(NativeHandle, NativeHandle)> {
        self.state.lock().edge_at(dsp, Outgoing, index)
    }

    fn dsp_get_num_parameters(&self, dsp: NativeHandle) -> NativeResult<usize> {
        self.state.lock().parameter_count(dsp)
    }

    fn dsp_get_parameter_info(
        &self,
        dsp: NativeHandle,
        index: usize,
    ) -> NativeResult<RawParameterDesc> {
        self.state.lock().parameter_info(dsp, index)
    }

    fn dsp_get_parameter_float(&self, dsp: NativeHandle, index: usize) -> NativeResult<f32> {
        match self.state.lock().parameter(dsp, index, ParameterKind::Float)? {
            ParameterValue::Float(v) => Ok(v),
            _ => Err(ResultCode::Internal),
        }
    }

    fn dsp_set_parameter_float(
        &self,
        dsp: NativeHandle,
        index: usize,
        value: f32,
    ) -> NativeResult<()> {
        self.state.lock().set_parameter(dsp, index, ParameterValue::Float(value))
    }

    fn dsp_get_parameter_int(&self, dsp: NativeHandle, index: usize) -> NativeResult<i32> {
        match self.state.lock().parameter(dsp, index, ParameterKind::Int)? {
            ParameterValue::Int(v) => Ok(v),
            _ => Err(ResultCode::Internal),
        }
    }

    fn dsp_set_parameter_int(
        &self,
        dsp: NativeHandle,
        index: usize,
        value: i32,
    ) -> NativeResult<()> {
        self.state.lock().set_parameter(dsp, index, ParameterValue::Int(value))
    }

    fn dsp_get_parameter_bool(&self, dsp: NativeHandle, index: usize) -> NativeResult<bool> {
        match self.state.lock().parameter(dsp, index, ParameterKind::Bool)? {
            ParameterValue::Bool(v) => Ok(v),
            _ => Err(ResultCode::Internal),
        }
    }

    fn dsp_set_parameter_bool(
        &self,
        dsp: NativeHandle,
        index: usize,
        value: bool,
    ) -> NativeResult<()> {
        self.state.lock().set_parameter(dsp, index, ParameterValue::Bool(value))
    }

    fn dsp_get_parameter_data(&self, dsp: NativeHandle, index: usize) -> NativeResult<Vec<u8>> {
        match self.state.lock().parameter(dsp, index, ParameterKind::Data)? {
            ParameterValue::Data(v) => Ok(v),
            _ => Err(ResultCode::Internal),
        }
    }

    fn dsp_set_parameter_data(
        &self,
        dsp: NativeHandle,
        index: usize,
        value: &[u8],
    ) -> NativeResult<()> {
        self.state.lock().set_parameter(dsp, index, ParameterValue::Data(value.to_vec()))
    }

    fn dsp_get_channel_format(&self, dsp: NativeHandle) -> NativeResult<ChannelFormat> {
        Ok(self.state.lock().node(dsp)?.format)
    }

    fn dsp_set_channel_format(
        &self,
        dsp: NativeHandle,
        format: &ChannelFormat,
    ) -> NativeResult<()> {
        self.state.lock().set_channel_format(dsp, format)
    }

    fn dsp_get_output_channel_format(
        &self,
        dsp: NativeHandle,
        input: &ChannelFormat,
    ) -> NativeResult<ChannelFormat> {
        self.state.lock().output_channel_format(dsp, input)
    }

    fn dsp_get_metering_enabled(&self, dsp: NativeHandle) -> NativeResult<(bool, bool)> {
        Ok(self.state.lock().node(dsp)?.metering)
    }

    fn dsp_set_metering_enabled(
        &self,
        dsp: NativeHandle,
        input: bool,
        output: bool,
    ) -> NativeResult<()> {
        self.state.lock().node_mut(dsp)?.metering = (input, output);
        Ok(())
    }

    fn dsp_get_active(&self, dsp: NativeHandle) -> NativeResult<bool> {
        Ok(self.state.lock().node(dsp)?.active)
    }

    fn dsp_set_active(&self, dsp: NativeHandle, active: bool) -> NativeResult<()> {
        self.state.lock().node_mut(dsp)?.active = active;
        Ok(())
    }

    fn dsp_get_bypass(&self, dsp: NativeHandle) -> NativeResult<bool> {
        Ok(self.state.lock().node(dsp)?.bypass)
    }

    fn dsp_set_bypass(&self, dsp: NativeHandle, bypass: bool) -> NativeResult<()> {
        self.state.lock().node_mut(dsp)?.bypass = bypass;
        Ok(())
    }

    fn dsp_get_idle(&self, dsp: NativeHandle) -> NativeResult<bool> {
        self.state.lock().idle(dsp)
    }

    fn connection_release(&self, connection: NativeHandle) -> NativeResult<()> {
        self.state.lock().release_connection(connection)
    }

    fn connection_get_input(&self, connection: NativeHandle) -> NativeResult<NativeHandle> {
        self.state.lock().connection_endpoint(connection, Incoming)
    }

    fn connection_get_output(&self, connection: NativeHandle) -> NativeResult<NativeHandle> {
        self.state.lock().connection_endpoint(connection, Outgoing)
    }

    fn connection_get_type(&self, connection: NativeHandle) -> NativeResult<ConnectionType> {
        Ok(self.state.lock().connection(connection)?.kind)
    }

    fn connection_get_mix(&self, connection: NativeHandle) -> NativeResult<f32> {
        Ok(self.state.lock().connection(connection)?.mix)
    }

    fn connection_set_mix(&self, connection: NativeHandle, volume: f32) -> NativeResult<()> {
        self.state.lock().set_mix(connection, volume)
    }

    fn connection_get_mix_matrix(
        &self,
        connection: NativeHandle,
        matrix: Option<&mut [f32]>,
        in_channel_hop: usize,
    ) -> NativeResult<(usize, usize)> {
        self.state.lock().mix_matrix(connection, matrix, in_channel_hop)
    }

    fn connection_set_mix_matrix(
        &self,
        connection: NativeHandle,
        matrix: Option<&[f32]>,
        out_channels: usize,
        in_channels: usize,
        in_channel_hop: usize,
    ) -> NativeResult<()> {
        self.state
            .lock()
            .set_mix_matrix(connection, matrix, out_channels, in_channels, in_channel_hop)
    }
}
