use crate::error::{Error, Result};
use crate::sys::layout::{
    decode_fixed_str, encode_fixed_str, RawBoolDesc, RawDataDesc, RawFloatRange, RawIntRange,
    PARAMETER_UNION_LEN,
};
use crate::sys::RawParameterDesc;

/// Well-known values of [`ParameterShape::Data::data_type`].
pub mod data_type {
    /// Opaque bytes owned by the processor.
    pub const USER: i32 = 0;
    /// Read-only overall gain: two `f32`s, linear gain and additive gain.
    pub const OVERALL_GAIN: i32 = -1;
}

/// Type tag of a DSP parameter. Discriminants match the native ABI.
#[repr(i32)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ParameterKind {
    Float = 0,
    Int = 1,
    Bool = 2,
    Data = 3,
}

impl ParameterKind {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(ParameterKind::Float),
            1 => Some(ParameterKind::Int),
            2 => Some(ParameterKind::Bool),
            3 => Some(ParameterKind::Data),
            _ => None,
        }
    }
}

/// The kind-specific half of a parameter descriptor.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum ParameterShape {
    Float { min: f32, max: f32, default: f32 },
    Int { min: i32, max: i32, default: i32, goes_to_infinity: bool },
    Bool { default: bool },
    Data { data_type: i32 },
}

impl ParameterShape {
    pub fn kind(&self) -> ParameterKind {
        match self {
            ParameterShape::Float { .. } => ParameterKind::Float,
            ParameterShape::Int { .. } => ParameterKind::Int,
            ParameterShape::Bool { .. } => ParameterKind::Bool,
            ParameterShape::Data { .. } => ParameterKind::Data,
        }
    }

    /// Pull `value` into the declared range. Bool and data values pass through.
    ///
    /// Fails if `value` is of a different kind than this shape.
    pub fn clamp(&self, index: usize, value: ParameterValue) -> Result<ParameterValue> {
        match (self, value) {
            (ParameterShape::Float { min, max, .. }, ParameterValue::Float(v)) => {
                // NaN has no place in any range; settle it on the minimum
                let v = if v.is_nan() { *min } else { v.clamp(*min, *max) };
                Ok(ParameterValue::Float(v))
            }
            (ParameterShape::Int { min, max, .. }, ParameterValue::Int(v)) => {
                Ok(ParameterValue::Int(v.clamp(*min, *max)))
            }
            (ParameterShape::Bool { .. }, v @ ParameterValue::Bool(_)) => Ok(v),
            (ParameterShape::Data { .. }, v @ ParameterValue::Data(_)) => Ok(v),
            (shape, v) => Err(Error::ParameterKind {
                index,
                declared: shape.kind(),
                requested: v.kind(),
            }),
        }
    }

    fn read(kind: ParameterKind, payload: &[u8; PARAMETER_UNION_LEN]) -> Self {
        match kind {
            ParameterKind::Float => {
                let r = RawFloatRange::read(payload);
                ParameterShape::Float { min: r.min, max: r.max, default: r.default }
            }
            ParameterKind::Int => {
                let r = RawIntRange::read(payload);
                ParameterShape::Int {
                    min: r.min,
                    max: r.max,
                    default: r.default,
                    goes_to_infinity: r.goes_to_infinity != 0,
                }
            }
            ParameterKind::Bool => {
                ParameterShape::Bool { default: RawBoolDesc::read(payload).default != 0 }
            }
            ParameterKind::Data => {
                ParameterShape::Data { data_type: RawDataDesc::read(payload).data_type }
            }
        }
    }

    fn write(&self, payload: &mut [u8; PARAMETER_UNION_LEN]) {
        match *self {
            ParameterShape::Float { min, max, default } => {
                RawFloatRange { min, max, default }.write(payload)
            }
            ParameterShape::Int { min, max, default, goes_to_infinity } => RawIntRange {
                min,
                max,
                default,
                goes_to_infinity: goes_to_infinity as i32,
            }
            .write(payload),
            ParameterShape::Bool { default } => {
                RawBoolDesc { default: default as i32 }.write(payload)
            }
            ParameterShape::Data { data_type } => RawDataDesc { data_type }.write(payload),
        }
    }
}

/// Decoded description of one DSP parameter.
#[derive(Clone, PartialEq, Debug)]
pub struct ParameterDesc {
    pub name: String,
    /// Unit label, e.g. "dB" or "Hz".
    pub label: String,
    pub description: String,
    pub shape: ParameterShape,
}

impl ParameterDesc {
    pub fn kind(&self) -> ParameterKind {
        self.shape.kind()
    }

    /// Decode a raw descriptor. The tag is read first and only the matching
    /// payload bytes are looked at.
    pub fn decode(raw: &RawParameterDesc, description: String) -> Result<Self> {
        let kind = ParameterKind::from_raw(raw.kind)
            .ok_or_else(|| Error::Layout(format!("unknown parameter type tag {}", raw.kind)))?;
        Ok(Self {
            name: decode_fixed_str(&raw.name),
            label: decode_fixed_str(&raw.label),
            description,
            shape: ParameterShape::read(kind, &raw.payload),
        })
    }

    /// Encode into the raw layout, writing exactly one payload variant.
    /// `description_token` is the string table reference for `description`.
    pub fn encode(&self, description_token: u32) -> RawParameterDesc {
        let mut raw = RawParameterDesc {
            kind: self.kind() as i32,
            name: encode_fixed_str(&self.name),
            label: encode_fixed_str(&self.label),
            description: description_token,
            ..RawParameterDesc::default()
        };
        self.shape.write(&mut raw.payload);
        raw
    }
}

/// A parameter value of any kind.
#[derive(Clone, PartialEq, Debug)]
pub enum ParameterValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Data(Vec<u8>),
}

impl ParameterValue {
    pub fn kind(&self) -> ParameterKind {
        match self {
            ParameterValue::Float(_) => ParameterKind::Float,
            ParameterValue::Int(_) => ParameterKind::Int,
            ParameterValue::Bool(_) => ParameterKind::Bool,
            ParameterValue::Data(_) => ParameterKind::Data,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// Delivered to parameter listeners after a successful write.
#[derive(Clone, PartialEq, Debug)]
pub struct ParameterChange {
    pub index: usize,
    /// The value as applied, after clamping.
    pub value: ParameterValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_reads_only_the_tagged_payload() {
        let desc = ParameterDesc {
            name: "Rate".into(),
            label: "Hz".into(),
            description: String::new(),
            shape: ParameterShape::Float { min: 0.0, max: 22000.0, default: 220.0 },
        };
        let mut raw = desc.encode(0);
        // garbage past the float sub-layout must not matter
        raw.payload[12..].copy_from_slice(&[0xFF; 4]);

        let back = ParameterDesc::decode(&raw, String::new()).unwrap();
        assert_eq!(back, desc);
    }

    #[test]
    fn unknown_tag_is_a_layout_error() {
        let raw = RawParameterDesc { kind: 7, ..RawParameterDesc::default() };
        assert!(matches!(ParameterDesc::decode(&raw, String::new()), Err(Error::Layout(_))));
    }

    #[test]
    fn int_infinity_flag_survives_encoding() {
        let shape = ParameterShape::Int { min: 0, max: 8, default: 0, goes_to_infinity: true };
        let desc = ParameterDesc {
            name: "Grouping".into(),
            label: String::new(),
            description: String::new(),
            shape,
        };
        let raw = desc.encode(3);
        assert_eq!(raw.kind, ParameterKind::Int as i32);
        assert_eq!(raw.description, 3);
        assert_eq!(ParameterDesc::decode(&raw, String::new()).unwrap().shape, shape);
    }

    #[test]
    fn clamp_respects_declared_ranges() {
        let float = ParameterShape::Float { min: -80.0, max: 10.0, default: 0.0 };
        let clamp = |v| float.clamp(0, ParameterValue::Float(v)).unwrap();
        assert_eq!(clamp(25.0), ParameterValue::Float(10.0));
        assert_eq!(clamp(f32::NAN), ParameterValue::Float(-80.0));

        let int = ParameterShape::Int { min: 0, max: 5, default: 0, goes_to_infinity: false };
        assert_eq!(int.clamp(1, ParameterValue::Int(-3)).unwrap(), ParameterValue::Int(0));

        let err = int.clamp(1, ParameterValue::Bool(true)).unwrap_err();
        assert_eq!(
            err,
            Error::ParameterKind {
                index: 1,
                declared: ParameterKind::Int,
                requested: ParameterKind::Bool,
            }
        );
    }
}
