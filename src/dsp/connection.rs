use core::fmt;
use core::hash::{Hash, Hasher};
use std::sync::Arc;

use delegate::delegate;
use tracing::debug;

use crate::error::{Error, Result};
use crate::handle::NativeHandle;
use crate::proxy::{Materialize, Proxy, ProxyCore, ProxyKind};
use crate::sys::NativeApi;

use super::node::DspNode;

/// How an edge feeds its output node.
///
/// | type            | lands in          | pulls the input? |
/// |-----------------|-------------------|------------------|
/// | `Standard`      | audible mix       | yes              |
/// | `SideChain`     | sidechain buffer  | yes              |
/// | `Send`          | audible mix       | no               |
/// | `SendSideChain` | sidechain buffer  | no               |
///
/// A send only carries whatever its input produced because something else
/// pulled it; on its own it never makes the input run.
#[repr(i32)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum ConnectionType {
    #[default]
    Standard = 0,
    SideChain = 1,
    Send = 2,
    SendSideChain = 3,
}

impl ConnectionType {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(ConnectionType::Standard),
            1 => Some(ConnectionType::SideChain),
            2 => Some(ConnectionType::Send),
            3 => Some(ConnectionType::SendSideChain),
            _ => None,
        }
    }

    /// Whether mixing the output node makes the input node execute.
    #[inline]
    pub fn forces_execution(self) -> bool {
        matches!(self, ConnectionType::Standard | ConnectionType::SideChain)
    }

    /// Whether the signal goes to the sidechain buffer instead of the audible mix.
    #[inline]
    pub fn is_sidechain(self) -> bool {
        matches!(self, ConnectionType::SideChain | ConnectionType::SendSideChain)
    }
}

/// A directed edge `input -> output` in the native routing graph.
pub struct DspConnection {
    core: ProxyCore,
}

impl Proxy for DspConnection {
    fn core(&self) -> &ProxyCore {
        &self.core
    }

    fn kind(&self) -> ProxyKind {
        ProxyKind::DspConnection
    }

    fn release_native(&self, api: &dyn NativeApi, handle: NativeHandle) -> Result<()> {
        api.connection_release(handle).map_err(Error::native("DSPConnection::release"))
    }
}

impl Materialize for DspConnection {
    const KIND: ProxyKind = ProxyKind::DspConnection;

    fn materialize(core: ProxyCore) -> Self {
        Self { core }
    }
}

impl DspConnection {
    delegate! {
        to self.core {
            pub fn handle(&self) -> NativeHandle;
            pub fn is_disposed(&self) -> bool;
            pub fn on_dispose(&self, listener: impl FnOnce(NativeHandle) + Send + 'static);
        }
    }

    /// Release the connection. Idempotent. The edge stays in the graph.
    pub fn dispose(&self) -> Result<()> {
        Proxy::dispose(self)
    }

    /// The node feeding this edge.
    ///
    /// Right after [`DspNode::add_input`] this may fail with a not-ready
    /// error until the engine has applied the connection. `Ok(None)` means
    /// the edge has since been disconnected.
    pub fn input(&self) -> Result<Option<Arc<DspNode>>> {
        let (engine, h) = self.core.bind()?;
        let node = engine
            .api()
            .connection_get_input(h)
            .map_err(Error::native("DSPConnection::getInput"))?;
        engine.registry().resolve(node)
    }

    /// The node this edge feeds. Same readiness rules as [`input`](Self::input).
    pub fn output(&self) -> Result<Option<Arc<DspNode>>> {
        let (engine, h) = self.core.bind()?;
        let node = engine
            .api()
            .connection_get_output(h)
            .map_err(Error::native("DSPConnection::getOutput"))?;
        engine.registry().resolve(node)
    }

    pub fn connection_type(&self) -> Result<ConnectionType> {
        let (engine, h) = self.core.bind()?;
        engine.api().connection_get_type(h).map_err(Error::native("DSPConnection::getType"))
    }

    pub fn mix(&self) -> Result<f32> {
        let (engine, h) = self.core.bind()?;
        engine.api().connection_get_mix(h).map_err(Error::native("DSPConnection::getMix"))
    }

    /// Set the edge volume, clamped to `0.0..=1.0`. Returns the applied value.
    pub fn set_mix(&self, volume: f32) -> Result<f32> {
        let (engine, h) = self.core.bind()?;
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        engine
            .api()
            .connection_set_mix(h, volume)
            .map_err(Error::native("DSPConnection::setMix"))?;
        Ok(volume)
    }

    /// The current mix matrix, packed with no row padding.
    pub fn mix_matrix(&self) -> Result<MixMatrix> {
        let (engine, h) = self.core.bind()?;
        let (rows, cols) = engine
            .api()
            .connection_get_mix_matrix(h, None, 0)
            .map_err(Error::native("DSPConnection::getMixMatrix"))?;

        let mut data = vec![0.0; rows * cols];
        if !data.is_empty() {
            engine
                .api()
                .connection_get_mix_matrix(h, Some(&mut data), cols)
                .map_err(Error::native("DSPConnection::getMixMatrix"))?;
        }
        Ok(MixMatrix { rows, cols, data })
    }

    /// Copy the matrix into `buf`, starting each row `in_channel_hop` values
    /// after the previous one. Returns `(out_channels, in_channels)`.
    ///
    /// A hop of 0 means rows are packed.
    pub fn mix_matrix_into(
        &self,
        buf: &mut [f32],
        in_channel_hop: usize,
    ) -> Result<(usize, usize)> {
        let (engine, h) = self.core.bind()?;
        let (rows, cols) = engine
            .api()
            .connection_get_mix_matrix(h, None, 0)
            .map_err(Error::native("DSPConnection::getMixMatrix"))?;
        let hop = if in_channel_hop == 0 { cols } else { in_channel_hop };
        let needed = MixMatrix::strided_len(rows, cols, hop)?;
        if buf.len() < needed {
            return Err(Error::MatrixBuffer { len: buf.len(), needed });
        }
        engine
            .api()
            .connection_get_mix_matrix(h, Some(buf), hop)
            .map_err(Error::native("DSPConnection::getMixMatrix"))
    }

    /// Replace the mix matrix, or reset it to the default with `None`.
    ///
    /// Row `r` of `matrix` starts at `r * in_channel_hop` (0 means packed).
    /// The engine rejects dimensions that do not match the endpoints'
    /// channel counts and keeps the old matrix in that case.
    pub fn set_mix_matrix(
        &self,
        matrix: Option<&[f32]>,
        out_channels: usize,
        in_channels: usize,
        in_channel_hop: usize,
    ) -> Result<()> {
        let (engine, h) = self.core.bind()?;
        let hop = if in_channel_hop == 0 { in_channels } else { in_channel_hop };
        if let Some(values) = matrix {
            let needed = MixMatrix::strided_len(out_channels, in_channels, hop)?;
            if values.len() < needed {
                return Err(Error::MatrixBuffer { len: values.len(), needed });
            }
        }
        engine
            .api()
            .connection_set_mix_matrix(h, matrix, out_channels, in_channels, hop)
            .map_err(Error::native("DSPConnection::setMixMatrix"))?;
        debug!(
            connection = %h,
            out_channels,
            in_channels,
            reset = matrix.is_none(),
            "set mix matrix"
        );
        Ok(())
    }

    pub fn set_mix_matrix_from(&self, matrix: &MixMatrix) -> Result<()> {
        self.set_mix_matrix(Some(&matrix.data), matrix.rows, matrix.cols, matrix.cols)
    }
}

/// Compares the handle the proxy was bound to, which disposal leaves intact.
impl PartialEq for DspConnection {
    fn eq(&self, other: &Self) -> bool {
        self.core.bound_handle() == other.core.bound_handle()
    }
}

impl Eq for DspConnection {}

impl Hash for DspConnection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.core.bound_handle().hash(state)
    }
}

impl fmt::Debug for DspConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DspConnection").field("handle", &self.handle()).finish()
    }
}

/// A packed `rows x cols` gain matrix: output channels by input channels.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct MixMatrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

impl MixMatrix {
    /// Unity gain from input channel `i` to output channel `i`.
    pub fn identity(rows: usize, cols: usize) -> Self {
        let mut data = vec![0.0; rows * cols];
        for i in 0..rows.min(cols) {
            data[i * cols + i] = 1.0;
        }
        Self { rows, cols, data }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self { rows, cols, data: vec![0.0; rows * cols] }
    }

    /// Gather from a buffer whose rows are `hop` values apart.
    pub fn from_strided(values: &[f32], rows: usize, cols: usize, hop: usize) -> Result<Self> {
        let needed = Self::strided_len(rows, cols, hop)?;
        if values.len() < needed {
            return Err(Error::MatrixBuffer { len: values.len(), needed });
        }
        let data = (0..rows)
            .flat_map(|r| values[r * hop..r * hop + cols].iter().copied())
            .collect();
        Ok(Self { rows, cols, data })
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        (row < self.rows && col < self.cols).then(|| self.data[row * self.cols + col])
    }

    /// Returns `false` if the position is out of range.
    pub fn set(&mut self, row: usize, col: usize, gain: f32) -> bool {
        if row < self.rows && col < self.cols {
            self.data[row * self.cols + col] = gain;
            true
        } else {
            false
        }
    }

    /// Values a strided buffer must hold: the last row need not be padded.
    ///
    /// Fails when rows would overlap (`hop < cols`) or the length does not
    /// fit in `usize`.
    pub fn strided_len(rows: usize, cols: usize, hop: usize) -> Result<usize> {
        if rows == 0 || cols == 0 {
            return Ok(0);
        }
        if hop < cols {
            return Err(Error::MatrixStride { cols, hop });
        }
        (rows - 1)
            .checked_mul(hop)
            .and_then(|n| n.checked_add(cols))
            .ok_or(Error::MatrixStride { cols, hop })
    }
}
