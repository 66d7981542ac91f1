//! The DSP routing graph as seen from the managed side.
//!
//! Nodes ([`DspNode`]) are connected by typed directed edges
//! ([`DspConnection`]). The graph itself lives in the native engine; these
//! proxies only issue queries and mutations against it.

mod connection;
mod node;
mod parameter;

pub use connection::{ConnectionType, DspConnection, MixMatrix};
pub use node::{DspNode, Edge, ListenerId, MeteringFlags};
pub use parameter::{
    data_type, ParameterChange, ParameterDesc, ParameterKind, ParameterShape, ParameterValue,
};

/// Built-in processor types the engine can instantiate.
///
/// Discriminants match the native ABI.
#[repr(i32)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DspType {
    Unknown = 0,
    /// Sums its inputs; the master node is one.
    Mixer,
    /// Tone generator.
    Oscillator,
    /// Gain stage with a mute switch.
    Fader,
    /// Regroups input channels into a different speaker layout.
    ChannelMix,
}

impl DspType {
    pub const ALL: [DspType; 5] = [
        DspType::Unknown,
        DspType::Mixer,
        DspType::Oscillator,
        DspType::Fader,
        DspType::ChannelMix,
    ];

    pub fn from_raw(raw: i32) -> Option<Self> {
        usize::try_from(raw).ok().and_then(|i| Self::ALL.get(i).copied())
    }
}
