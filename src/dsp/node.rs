use core::fmt;
use core::hash::{Hash, Hasher};
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use delegate::delegate;
use itertools::Itertools;
use parking_lot::Mutex;
use tracing::debug;

use crate::engine::EngineShared;
use crate::error::{Error, Result};
use crate::format::ChannelFormat;
use crate::handle::NativeHandle;
use crate::proxy::{Materialize, Proxy, ProxyCore, ProxyKind};
use crate::sys::NativeApi;

use super::connection::{ConnectionType, DspConnection};
use super::parameter::{
    ParameterChange, ParameterDesc, ParameterKind, ParameterShape, ParameterValue,
};
use super::DspType;

type ParameterListener = Arc<dyn Fn(&ParameterChange) + Send + Sync>;

/// The node at the far end of an edge, and the edge itself.
pub type Edge = (Option<Arc<DspNode>>, Option<Arc<DspConnection>>);

/// Returned by [`DspNode::on_parameter_changed`]; pass it back to unsubscribe.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ListenerId(u64);

static NEXT_LISTENER: AtomicU64 = AtomicU64::new(1);

/// Input and output metering switches of a node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct MeteringFlags {
    pub input: bool,
    pub output: bool,
}

/// A processing node in the native routing graph.
///
/// Topology is never cached here: every query goes to the native side, so
/// what you see is the graph as the engine currently has it. Mutations take
/// the engine's DSP lock for their duration.
pub struct DspNode {
    core: ProxyCore,
    param_listeners: Mutex<Vec<(ListenerId, ParameterListener)>>,
    // one proxy per handle, so this serialises every metering read-modify-write
    metering: Mutex<()>,
}

impl Proxy for DspNode {
    fn core(&self) -> &ProxyCore {
        &self.core
    }

    fn kind(&self) -> ProxyKind {
        ProxyKind::Dsp
    }

    fn release_native(&self, api: &dyn NativeApi, handle: NativeHandle) -> Result<()> {
        api.dsp_release(handle).map_err(Error::native("DSP::release"))
    }
}

impl Materialize for DspNode {
    const KIND: ProxyKind = ProxyKind::Dsp;

    fn materialize(core: ProxyCore) -> Self {
        Self {
            core,
            param_listeners: Mutex::new(Vec::new()),
            metering: Mutex::new(()),
        }
    }
}

impl DspNode {
    delegate! {
        to self.core {
            /// The bound handle, `NULL` once disposed.
            pub fn handle(&self) -> NativeHandle;
            pub fn is_disposed(&self) -> bool;
            /// Observe disposal; see [`ProxyCore::on_dispose`].
            pub fn on_dispose(&self, listener: impl FnOnce(NativeHandle) + Send + 'static);
        }
    }

    /// Release the native node. Idempotent.
    pub fn dispose(&self) -> Result<()> {
        Proxy::dispose(self)
    }

    pub fn dsp_type(&self) -> Result<DspType> {
        let (engine, h) = self.core.bind()?;
        engine.api().dsp_get_type(h).map_err(Error::native("DSP::getType"))
    }

    // --- parameters ---

    pub fn parameter_count(&self) -> Result<usize> {
        let (engine, h) = self.core.bind()?;
        engine.api().dsp_get_num_parameters(h).map_err(Error::native("DSP::getNumParameters"))
    }

    pub fn parameter_info(&self, index: usize) -> Result<ParameterDesc> {
        let (engine, h) = self.core.bind()?;
        let raw = self.raw_parameter_info(&engine, h, index)?;
        let description = match raw.description {
            0 => String::new(),
            token => engine
                .api()
                .system_get_string(token)
                .map_err(Error::native("System::getString"))?,
        };
        ParameterDesc::decode(&raw, description)
    }

    /// Read parameter `index`, which must be of kind `kind`.
    pub fn parameter(&self, index: usize, kind: ParameterKind) -> Result<ParameterValue> {
        let (engine, h) = self.core.bind()?;
        let shape = self.parameter_shape(&engine, h, index)?;
        if shape.kind() != kind {
            return Err(Error::ParameterKind { index, declared: shape.kind(), requested: kind });
        }

        let api = engine.api();
        Ok(match kind {
            ParameterKind::Float => ParameterValue::Float(
                api.dsp_get_parameter_float(h, index)
                    .map_err(Error::native("DSP::getParameterFloat"))?,
            ),
            ParameterKind::Int => ParameterValue::Int(
                api.dsp_get_parameter_int(h, index)
                    .map_err(Error::native("DSP::getParameterInt"))?,
            ),
            ParameterKind::Bool => ParameterValue::Bool(
                api.dsp_get_parameter_bool(h, index)
                    .map_err(Error::native("DSP::getParameterBool"))?,
            ),
            ParameterKind::Data => ParameterValue::Data(
                api.dsp_get_parameter_data(h, index)
                    .map_err(Error::native("DSP::getParameterData"))?,
            ),
        })
    }

    /// Write parameter `index`.
    ///
    /// Float and int values are clamped into the declared range first.
    /// Listeners run after the native write succeeds and see the clamped
    /// value, which is also what this returns.
    pub fn set_parameter(&self, index: usize, value: ParameterValue) -> Result<ParameterValue> {
        let (engine, h) = self.core.bind()?;
        let shape = self.parameter_shape(&engine, h, index)?;
        let value = shape.clamp(index, value)?;

        let api = engine.api();
        match &value {
            ParameterValue::Float(v) => api
                .dsp_set_parameter_float(h, index, *v)
                .map_err(Error::native("DSP::setParameterFloat")),
            ParameterValue::Int(v) => api
                .dsp_set_parameter_int(h, index, *v)
                .map_err(Error::native("DSP::setParameterInt")),
            ParameterValue::Bool(v) => api
                .dsp_set_parameter_bool(h, index, *v)
                .map_err(Error::native("DSP::setParameterBool")),
            ParameterValue::Data(v) => api
                .dsp_set_parameter_data(h, index, v)
                .map_err(Error::native("DSP::setParameterData")),
        }?;

        let change = ParameterChange { index, value };
        let listeners: Vec<ParameterListener> =
            self.param_listeners.lock().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(&change);
        }
        Ok(change.value)
    }

    pub fn float_parameter(&self, index: usize) -> Result<f32> {
        self.parameter(index, ParameterKind::Float)
            .map(|v| v.as_float().unwrap_or_default())
    }

    /// Returns the value actually applied.
    pub fn set_float_parameter(&self, index: usize, value: f32) -> Result<f32> {
        self.set_parameter(index, ParameterValue::Float(value))
            .map(|v| v.as_float().unwrap_or(value))
    }

    pub fn int_parameter(&self, index: usize) -> Result<i32> {
        self.parameter(index, ParameterKind::Int)
            .map(|v| v.as_int().unwrap_or_default())
    }

    /// Returns the value actually applied.
    pub fn set_int_parameter(&self, index: usize, value: i32) -> Result<i32> {
        self.set_parameter(index, ParameterValue::Int(value))
            .map(|v| v.as_int().unwrap_or(value))
    }

    pub fn bool_parameter(&self, index: usize) -> Result<bool> {
        self.parameter(index, ParameterKind::Bool)
            .map(|v| v.as_bool().unwrap_or_default())
    }

    pub fn set_bool_parameter(&self, index: usize, value: bool) -> Result<()> {
        self.set_parameter(index, ParameterValue::Bool(value)).map(drop)
    }

    pub fn data_parameter(&self, index: usize) -> Result<Vec<u8>> {
        match self.parameter(index, ParameterKind::Data)? {
            ParameterValue::Data(bytes) => Ok(bytes),
            _ => Ok(Vec::new()),
        }
    }

    pub fn set_data_parameter(&self, index: usize, value: &[u8]) -> Result<()> {
        self.set_parameter(index, ParameterValue::Data(value.to_vec())).map(drop)
    }

    /// Call `listener` after every successful [`set_parameter`](Self::set_parameter).
    pub fn on_parameter_changed(
        &self,
        listener: impl Fn(&ParameterChange) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = ListenerId(NEXT_LISTENER.fetch_add(1, Ordering::Relaxed));
        self.param_listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Returns whether a listener was removed.
    pub fn remove_parameter_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.param_listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    fn raw_parameter_info(
        &self,
        engine: &EngineShared,
        h: NativeHandle,
        index: usize,
    ) -> Result<crate::sys::RawParameterDesc> {
        let count = engine
            .api()
            .dsp_get_num_parameters(h)
            .map_err(Error::native("DSP::getNumParameters"))?;
        if index >= count {
            return Err(Error::ParameterIndex { index, count });
        }
        engine
            .api()
            .dsp_get_parameter_info(h, index)
            .map_err(Error::native("DSP::getParameterInfo"))
    }

    fn parameter_shape(
        &self,
        engine: &EngineShared,
        h: NativeHandle,
        index: usize,
    ) -> Result<ParameterShape> {
        let raw = self.raw_parameter_info(engine, h, index)?;
        Ok(ParameterDesc::decode(&raw, String::new())?.shape)
    }

    // --- topology ---

    /// Connect `input` so that it feeds this node, returning the new edge.
    ///
    /// The endpoints of the returned connection may report not-ready until
    /// the engine has applied the change; see [`Engine::poll_ready`](crate::Engine::poll_ready).
    pub fn add_input(&self, input: &DspNode, kind: ConnectionType) -> Result<Arc<DspConnection>> {
        let (engine, h) = self.core.bind()?;
        let input_handle = self.same_engine("DSP::addInput", input)?;

        let _lock = engine.lock_dsp()?;
        let connection = engine
            .api()
            .dsp_add_input(h, input_handle, kind)
            .map_err(Error::native("DSP::addInput"))?;
        debug!(dsp = %h, input = %input_handle, %connection, ?kind, "added input");
        engine.expect_object("DSP::addInput", connection)
    }

    /// Remove the edges between this node and `target`, in either direction.
    ///
    /// With `connection` only that one edge goes. Nothing happens when the
    /// two nodes are not connected.
    pub fn disconnect_from(
        &self,
        target: &DspNode,
        connection: Option<&DspConnection>,
    ) -> Result<()> {
        let (engine, h) = self.core.bind()?;
        let target_handle = self.same_engine("DSP::disconnectFrom", target)?;
        let connection_handle = match connection {
            Some(c) => c.core().live_handle()?,
            None => NativeHandle::NULL,
        };

        let _lock = engine.lock_dsp()?;
        engine
            .api()
            .dsp_disconnect_from(h, target_handle, connection_handle)
            .map_err(Error::native("DSP::disconnectFrom"))?;
        debug!(dsp = %h, target = %target_handle, "disconnected");
        Ok(())
    }

    /// Drop all input and/or output edges of this node.
    pub fn disconnect_all(&self, inputs: bool, outputs: bool) -> Result<()> {
        let (engine, h) = self.core.bind()?;
        let _lock = engine.lock_dsp()?;
        engine
            .api()
            .dsp_disconnect_all(h, inputs, outputs)
            .map_err(Error::native("DSP::disconnectAll"))?;
        debug!(dsp = %h, inputs, outputs, "disconnected all");
        Ok(())
    }

    pub fn num_inputs(&self) -> Result<usize> {
        let (engine, h) = self.core.bind()?;
        engine.api().dsp_get_num_inputs(h).map_err(Error::native("DSP::getNumInputs"))
    }

    pub fn num_outputs(&self) -> Result<usize> {
        let (engine, h) = self.core.bind()?;
        engine.api().dsp_get_num_outputs(h).map_err(Error::native("DSP::getNumOutputs"))
    }

    /// The node feeding input `index` together with the edge that carries it.
    pub fn input(&self, index: usize) -> Result<Edge> {
        let (engine, h) = self.core.bind()?;
        let (node, connection) = engine
            .api()
            .dsp_get_input(h, index)
            .map_err(Error::native("DSP::getInput"))?;
        let registry = engine.registry();
        Ok((registry.resolve(node)?, registry.resolve(connection)?))
    }

    /// The node fed by output `index` together with the edge that carries it.
    pub fn output(&self, index: usize) -> Result<Edge> {
        let (engine, h) = self.core.bind()?;
        let (node, connection) = engine
            .api()
            .dsp_get_output(h, index)
            .map_err(Error::native("DSP::getOutput"))?;
        let registry = engine.registry();
        Ok((registry.resolve(node)?, registry.resolve(connection)?))
    }

    pub fn input_connection(&self, index: usize) -> Result<Option<Arc<DspConnection>>> {
        self.input(index).map(|(_, connection)| connection)
    }

    pub fn output_connection(&self, index: usize) -> Result<Option<Arc<DspConnection>>> {
        self.output(index).map(|(_, connection)| connection)
    }

    /// Every input edge, in the order the engine reports them.
    pub fn input_connections(&self) -> Result<Vec<Arc<DspConnection>>> {
        (0..self.num_inputs()?)
            .map(|i| self.input_connection(i))
            .filter_map_ok(|connection| connection)
            .collect()
    }

    // --- format and state ---

    pub fn channel_format(&self) -> Result<ChannelFormat> {
        let (engine, h) = self.core.bind()?;
        engine.api().dsp_get_channel_format(h).map_err(Error::native("DSP::getChannelFormat"))
    }

    pub fn set_channel_format(&self, format: &ChannelFormat) -> Result<()> {
        let (engine, h) = self.core.bind()?;
        engine
            .api()
            .dsp_set_channel_format(h, format)
            .map_err(Error::native("DSP::setChannelFormat"))
    }

    /// What this node would output for `input`. Changes nothing.
    pub fn output_channel_format(&self, input: &ChannelFormat) -> Result<ChannelFormat> {
        let (engine, h) = self.core.bind()?;
        engine
            .api()
            .dsp_get_output_channel_format(h, input)
            .map_err(Error::native("DSP::getOutputChannelFormat"))
    }

    pub fn metering(&self) -> Result<MeteringFlags> {
        let (engine, h) = self.core.bind()?;
        let (input, output) = engine
            .api()
            .dsp_get_metering_enabled(h)
            .map_err(Error::native("DSP::getMeteringEnabled"))?;
        Ok(MeteringFlags { input, output })
    }

    /// Set both metering switches in one native call.
    pub fn set_metering(&self, flags: MeteringFlags) -> Result<()> {
        let (engine, h) = self.core.bind()?;
        engine
            .api()
            .dsp_set_metering_enabled(h, flags.input, flags.output)
            .map_err(Error::native("DSP::setMeteringEnabled"))
    }

    pub fn set_input_metering_enabled(&self, enabled: bool) -> Result<()> {
        self.update_metering(|flags| flags.input = enabled)
    }

    pub fn set_output_metering_enabled(&self, enabled: bool) -> Result<()> {
        self.update_metering(|flags| flags.output = enabled)
    }

    fn update_metering(&self, change: impl FnOnce(&mut MeteringFlags)) -> Result<()> {
        let _guard = self.metering.lock();
        let mut flags = self.metering()?;
        change(&mut flags);
        self.set_metering(flags)
    }

    pub fn active(&self) -> Result<bool> {
        let (engine, h) = self.core.bind()?;
        engine.api().dsp_get_active(h).map_err(Error::native("DSP::getActive"))
    }

    pub fn set_active(&self, active: bool) -> Result<()> {
        let (engine, h) = self.core.bind()?;
        engine.api().dsp_set_active(h, active).map_err(Error::native("DSP::setActive"))
    }

    pub fn bypass(&self) -> Result<bool> {
        let (engine, h) = self.core.bind()?;
        engine.api().dsp_get_bypass(h).map_err(Error::native("DSP::getBypass"))
    }

    pub fn set_bypass(&self, bypass: bool) -> Result<()> {
        let (engine, h) = self.core.bind()?;
        engine.api().dsp_set_bypass(h, bypass).map_err(Error::native("DSP::setBypass"))
    }

    /// `true` if the node did not run in the last mix tick.
    pub fn idle(&self) -> Result<bool> {
        let (engine, h) = self.core.bind()?;
        engine.api().dsp_get_idle(h).map_err(Error::native("DSP::getIdle"))
    }

    /// Handle of `other`, which must belong to the same engine as `self`.
    fn same_engine(&self, op: &'static str, other: &DspNode) -> Result<NativeHandle> {
        if !Weak::ptr_eq(self.core.engine_weak(), other.core.engine_weak()) {
            return Err(Error::ForeignEngine { op });
        }
        other.core.live_handle()
    }
}

/// Compares the handle the proxy was bound to, which disposal leaves intact.
impl PartialEq for DspNode {
    fn eq(&self, other: &Self) -> bool {
        self.core.bound_handle() == other.core.bound_handle()
    }
}

impl Eq for DspNode {}

impl Hash for DspNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.core.bound_handle().hash(state)
    }
}

impl fmt::Debug for DspNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DspNode").field("handle", &self.handle()).finish()
    }
}
