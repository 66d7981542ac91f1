//! Fixed byte layouts shared bit-for-bit with the native side.
//!
//! The structs here are never interpreted directly by user code. They are
//! decoded into tagged Rust types by [`crate::dsp::ParameterDesc`] and
//! [`crate::reverb::ReverbProperties`].

use core::mem::{offset_of, size_of};

/// Width of the fixed name and label buffers, including the NUL terminator.
pub const PARAMETER_NAME_LEN: usize = 16;
/// Byte offset of the union region inside [`RawParameterDesc`].
pub const PARAMETER_UNION_OFFSET: usize = 40;
/// Size of the union region: the largest sub-layout (int range).
pub const PARAMETER_UNION_LEN: usize = 16;

/// Parameter descriptor as the native side writes it.
///
/// The leading tag selects which sub-layout lives in `payload`; exactly one
/// of [`RawFloatRange`], [`RawIntRange`], [`RawBoolDesc`] or [`RawDataDesc`]
/// is valid at a time.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RawParameterDesc {
    pub kind: i32,
    pub name: [u8; PARAMETER_NAME_LEN],
    pub label: [u8; PARAMETER_NAME_LEN],
    /// Token into the native string table; 0 means "no description".
    pub description: u32,
    pub payload: [u8; PARAMETER_UNION_LEN],
}

const _: () = assert!(offset_of!(RawParameterDesc, kind) == 0);
const _: () = assert!(offset_of!(RawParameterDesc, name) == 4);
const _: () = assert!(offset_of!(RawParameterDesc, label) == 20);
const _: () = assert!(offset_of!(RawParameterDesc, description) == 36);
const _: () = assert!(offset_of!(RawParameterDesc, payload) == PARAMETER_UNION_OFFSET);
const _: () = assert!(size_of::<RawParameterDesc>() == 56);

impl Default for RawParameterDesc {
    fn default() -> Self {
        Self {
            kind: 0,
            name: [0; PARAMETER_NAME_LEN],
            label: [0; PARAMETER_NAME_LEN],
            description: 0,
            payload: [0; PARAMETER_UNION_LEN],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct RawFloatRange {
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct RawIntRange {
    pub min: i32,
    pub max: i32,
    pub default: i32,
    /// Non-zero when the top of the range means "infinite".
    pub goes_to_infinity: i32,
}

#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct RawBoolDesc {
    pub default: i32,
}

#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct RawDataDesc {
    pub data_type: i32,
}

const _: () = assert!(size_of::<RawFloatRange>() <= PARAMETER_UNION_LEN);
const _: () = assert!(size_of::<RawIntRange>() == PARAMETER_UNION_LEN);
const _: () = assert!(size_of::<RawBoolDesc>() <= PARAMETER_UNION_LEN);
const _: () = assert!(size_of::<RawDataDesc>() <= PARAMETER_UNION_LEN);

#[inline]
pub(crate) fn read_i32(bytes: &[u8], at: usize) -> i32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[at..at + 4]);
    i32::from_ne_bytes(word)
}

#[inline]
pub(crate) fn read_f32(bytes: &[u8], at: usize) -> f32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[at..at + 4]);
    f32::from_ne_bytes(word)
}

#[inline]
pub(crate) fn write_i32(bytes: &mut [u8], at: usize, value: i32) {
    bytes[at..at + 4].copy_from_slice(&value.to_ne_bytes());
}

#[inline]
pub(crate) fn write_f32(bytes: &mut [u8], at: usize, value: f32) {
    bytes[at..at + 4].copy_from_slice(&value.to_ne_bytes());
}

impl RawFloatRange {
    pub fn read(payload: &[u8; PARAMETER_UNION_LEN]) -> Self {
        Self {
            min: read_f32(payload, offset_of!(RawFloatRange, min)),
            max: read_f32(payload, offset_of!(RawFloatRange, max)),
            default: read_f32(payload, offset_of!(RawFloatRange, default)),
        }
    }

    pub fn write(&self, payload: &mut [u8; PARAMETER_UNION_LEN]) {
        write_f32(payload, offset_of!(RawFloatRange, min), self.min);
        write_f32(payload, offset_of!(RawFloatRange, max), self.max);
        write_f32(payload, offset_of!(RawFloatRange, default), self.default);
    }
}

impl RawIntRange {
    pub fn read(payload: &[u8; PARAMETER_UNION_LEN]) -> Self {
        Self {
            min: read_i32(payload, offset_of!(RawIntRange, min)),
            max: read_i32(payload, offset_of!(RawIntRange, max)),
            default: read_i32(payload, offset_of!(RawIntRange, default)),
            goes_to_infinity: read_i32(payload, offset_of!(RawIntRange, goes_to_infinity)),
        }
    }

    pub fn write(&self, payload: &mut [u8; PARAMETER_UNION_LEN]) {
        write_i32(payload, offset_of!(RawIntRange, min), self.min);
        write_i32(payload, offset_of!(RawIntRange, max), self.max);
        write_i32(payload, offset_of!(RawIntRange, default), self.default);
        write_i32(payload, offset_of!(RawIntRange, goes_to_infinity), self.goes_to_infinity);
    }
}

impl RawBoolDesc {
    pub fn read(payload: &[u8; PARAMETER_UNION_LEN]) -> Self {
        Self { default: read_i32(payload, offset_of!(RawBoolDesc, default)) }
    }

    pub fn write(&self, payload: &mut [u8; PARAMETER_UNION_LEN]) {
        write_i32(payload, offset_of!(RawBoolDesc, default), self.default);
    }
}

impl RawDataDesc {
    pub fn read(payload: &[u8; PARAMETER_UNION_LEN]) -> Self {
        Self { data_type: read_i32(payload, offset_of!(RawDataDesc, data_type)) }
    }

    pub fn write(&self, payload: &mut [u8; PARAMETER_UNION_LEN]) {
        write_i32(payload, offset_of!(RawDataDesc, data_type), self.data_type);
    }
}

/// Copy `text` into a NUL-padded fixed buffer, truncating to leave room for the terminator.
pub fn encode_fixed_str(text: &str) -> [u8; PARAMETER_NAME_LEN] {
    let mut out = [0u8; PARAMETER_NAME_LEN];
    let mut len = text.len().min(PARAMETER_NAME_LEN - 1);
    while !text.is_char_boundary(len) {
        len -= 1;
    }
    out[..len].copy_from_slice(&text.as_bytes()[..len]);
    out
}

/// Read a NUL-padded fixed buffer. A buffer with no NUL is taken in full.
pub fn decode_fixed_str(buf: &[u8; PARAMETER_NAME_LEN]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// Size of the raw reverb environment block.
pub const REVERB_PROPERTIES_LEN: usize = 48;

/// Reverb environment as the native side lays it out.
///
/// Field placement is given by [`crate::reverb::OFFSETS`], not by any Rust
/// struct order.
#[repr(C, align(4))]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RawReverbProperties(pub [u8; REVERB_PROPERTIES_LEN]);

impl Default for RawReverbProperties {
    fn default() -> Self {
        Self([0; REVERB_PROPERTIES_LEN])
    }
}
