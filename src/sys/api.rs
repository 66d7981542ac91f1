use crate::dsp::{ConnectionType, DspType};
use crate::format::{ChannelFormat, SpeakerMode};
use crate::handle::NativeHandle;
use crate::proxy::ProxyKind;

use super::layout::{RawParameterDesc, RawReverbProperties};
use super::result::NativeResult;

/// Settings handed to the native engine at init.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SystemSettings {
    pub max_channels: u32,
    pub sample_rate: u32,
    pub speaker_mode: SpeakerMode,
    /// Samples per mix block.
    pub dsp_block_len: usize,
    /// Capacity of the native command queue.
    pub command_queue_size: usize,
}

/// The foreign ABI of the native engine: one method per entry point.
///
/// Implementations forward to the native library (or stand in for it, see
/// [`crate::sim::SimEngine`]). Every call is a synchronous client call; graph
/// mutations may be queued for the mixer thread and report
/// [`ResultCode::NotReady`](super::ResultCode::NotReady) from follow-up
/// queries until they are applied.
pub trait NativeApi: Send + Sync {
    fn system_init(&self, settings: &SystemSettings) -> NativeResult<()>;
    fn system_close(&self) -> NativeResult<()>;
    /// Give the engine a chance to apply queued commands.
    fn system_update(&self) -> NativeResult<()>;
    fn system_lock_dsp(&self) -> NativeResult<()>;
    fn system_unlock_dsp(&self) -> NativeResult<()>;
    fn system_create_dsp_by_type(&self, dsp_type: DspType) -> NativeResult<NativeHandle>;
    fn system_get_master_dsp(&self) -> NativeResult<NativeHandle>;
    fn system_get_speaker_mode(&self) -> NativeResult<SpeakerMode>;
    fn system_get_string(&self, token: u32) -> NativeResult<String>;
    fn system_set_reverb_properties(
        &self,
        instance: i32,
        props: &RawReverbProperties,
    ) -> NativeResult<()>;
    fn system_get_reverb_properties(&self, instance: i32) -> NativeResult<RawReverbProperties>;

    /// Which kind of object a handle names.
    fn object_kind(&self, handle: NativeHandle) -> NativeResult<ProxyKind>;

    fn dsp_release(&self, dsp: NativeHandle) -> NativeResult<()>;
    fn dsp_get_type(&self, dsp: NativeHandle) -> NativeResult<DspType>;
    /// Create the edge `input -> dsp`, returning the new connection.
    fn dsp_add_input(
        &self,
        dsp: NativeHandle,
        input: NativeHandle,
        kind: ConnectionType,
    ) -> NativeResult<NativeHandle>;
    /// Remove edges between `dsp` and `target` in either direction.
    ///
    /// With a non-null `connection` only that edge is removed.
    fn dsp_disconnect_from(
        &self,
        dsp: NativeHandle,
        target: NativeHandle,
        connection: NativeHandle,
    ) -> NativeResult<()>;
    fn dsp_disconnect_all(
        &self,
        dsp: NativeHandle,
        inputs: bool,
        outputs: bool,
    ) -> NativeResult<()>;
    fn dsp_get_num_inputs(&self, dsp: NativeHandle) -> NativeResult<usize>;
    fn dsp_get_num_outputs(&self, dsp: NativeHandle) -> NativeResult<usize>;
    /// `(input node, connection)` at `index`.
    fn dsp_get_input(
        &self,
        dsp: NativeHandle,
        index: usize,
    ) -> NativeResult<(NativeHandle, NativeHandle)>;
    /// `(output node, connection)` at `index`.
    fn dsp_get_output(
        &self,
        dsp: NativeHandle,
        index: usize,
    ) -> NativeResult<(NativeHandle, NativeHandle)>;

    fn dsp_get_num_parameters(&self, dsp: NativeHandle) -> NativeResult<usize>;
    fn dsp_get_parameter_info(
        &self,
        dsp: NativeHandle,
        index: usize,
    ) -> NativeResult<RawParameterDesc>;
    fn dsp_get_parameter_float(&self, dsp: NativeHandle, index: usize) -> NativeResult<f32>;
    fn dsp_set_parameter_float(
        &self,
        dsp: NativeHandle,
        index: usize,
        value: f32,
    ) -> NativeResult<()>;
    fn dsp_get_parameter_int(&self, dsp: NativeHandle, index: usize) -> NativeResult<i32>;
    fn dsp_set_parameter_int(
        &self,
        dsp: NativeHandle,
        index: usize,
        value: i32,
    ) -> NativeResult<()>;
    fn dsp_get_parameter_bool(&self, dsp: NativeHandle, index: usize) -> NativeResult<bool>;
    fn dsp_set_parameter_bool(
        &self,
        dsp: NativeHandle,
        index: usize,
        value: bool,
    ) -> NativeResult<()>;
    fn dsp_get_parameter_data(&self, dsp: NativeHandle, index: usize) -> NativeResult<Vec<u8>>;
    fn dsp_set_parameter_data(
        &self,
        dsp: NativeHandle,
        index: usize,
        value: &[u8],
    ) -> NativeResult<()>;

    fn dsp_get_channel_format(&self, dsp: NativeHandle) -> NativeResult<ChannelFormat>;
    fn dsp_set_channel_format(&self, dsp: NativeHandle, format: &ChannelFormat) -> NativeResult<()>;
    fn dsp_get_output_channel_format(
        &self,
        dsp: NativeHandle,
        input: &ChannelFormat,
    ) -> NativeResult<ChannelFormat>;
    /// `(input metering, output metering)`.
    fn dsp_get_metering_enabled(&self, dsp: NativeHandle) -> NativeResult<(bool, bool)>;
    fn dsp_set_metering_enabled(
        &self,
        dsp: NativeHandle,
        input: bool,
        output: bool,
    ) -> NativeResult<()>;
    fn dsp_get_active(&self, dsp: NativeHandle) -> NativeResult<bool>;
    fn dsp_set_active(&self, dsp: NativeHandle, active: bool) -> NativeResult<()>;
    fn dsp_get_bypass(&self, dsp: NativeHandle) -> NativeResult<bool>;
    fn dsp_set_bypass(&self, dsp: NativeHandle, bypass: bool) -> NativeResult<()>;
    fn dsp_get_idle(&self, dsp: NativeHandle) -> NativeResult<bool>;

    /// Drop the binding's reference to a connection. The edge itself stays
    /// in the graph until disconnected.
    fn connection_release(&self, connection: NativeHandle) -> NativeResult<()>;
    fn connection_get_input(&self, connection: NativeHandle) -> NativeResult<NativeHandle>;
    fn connection_get_output(&self, connection: NativeHandle) -> NativeResult<NativeHandle>;
    fn connection_get_type(&self, connection: NativeHandle) -> NativeResult<ConnectionType>;
    fn connection_get_mix(&self, connection: NativeHandle) -> NativeResult<f32>;
    fn connection_set_mix(&self, connection: NativeHandle, volume: f32) -> NativeResult<()>;
    /// Copy the matrix into `matrix` (rows stepped by `in_channel_hop`) and
    /// return `(out_channels, in_channels)`. `None` only queries the size.
    fn connection_get_mix_matrix(
        &self,
        connection: NativeHandle,
        matrix: Option<&mut [f32]>,
        in_channel_hop: usize,
    ) -> NativeResult<(usize, usize)>;
    /// Replace the matrix. `None` restores the default mapping.
    fn connection_set_mix_matrix(
        &self,
        connection: NativeHandle,
        matrix: Option<&[f32]>,
        out_channels: usize,
        in_channels: usize,
        in_channel_hop: usize,
    ) -> NativeResult<()>;
}
