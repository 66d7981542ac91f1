//! Built-in processors of the stand-in engine.
//!
//! Inputs arrive already summed into the node's channel layout, so every
//! processor maps `input[ch]` to `output[ch]` one block at a time.

use dasp_graph::Buffer;

use crate::dsp::{data_type, DspType, ParameterShape, ParameterValue};
use crate::format::{ChannelFormat, SpeakerMode};
use crate::sys::{NativeResult, ResultCode};

#[derive(Clone, Copy, Debug)]
pub(crate) struct ProcessContext {
    pub sample_rate: u32,
}

/// Static description of one processor parameter.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ParameterSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub shape: ParameterShape,
}

pub(crate) trait Processor {
    fn process(&mut self, ctx: &ProcessContext, input: &[Buffer], output: &mut [Buffer]);
    fn parameters(&self) -> &'static [ParameterSpec];
    fn parameter(&self, index: usize) -> ParameterValue;
    fn set_parameter(&mut self, index: usize, value: &ParameterValue) -> NativeResult<()>;
    /// Layout this processor would produce for `input`, given its own.
    fn output_format(&self, own: &ChannelFormat, input: &ChannelFormat) -> ChannelFormat;
}

#[enum_delegate::implement(Processor, pub(crate) trait Processor {
    fn process(&mut self, ctx: &ProcessContext, input: &[Buffer], output: &mut [Buffer]);
    fn parameters(&self) -> &'static [ParameterSpec];
    fn parameter(&self, index: usize) -> ParameterValue;
    fn set_parameter(&mut self, index: usize, value: &ParameterValue) -> NativeResult<()>;
    fn output_format(&self, own: &ChannelFormat, input: &ChannelFormat) -> ChannelFormat;
})]
pub(crate) enum SimProcessor {
    Mixer(Mixer),
    Oscillator(Oscillator),
    Fader(Fader),
    ChannelMix(ChannelMix),
}

impl SimProcessor {
    pub fn for_type(dsp_type: DspType) -> Option<Self> {
        match dsp_type {
            DspType::Unknown => None,
            DspType::Mixer => Some(Mixer.into()),
            DspType::Oscillator => Some(Oscillator::default().into()),
            DspType::Fader => Some(Fader::default().into()),
            DspType::ChannelMix => Some(ChannelMix::default().into()),
        }
    }
}

fn copy_through(input: &[Buffer], output: &mut [Buffer]) {
    for (ch, out) in output.iter_mut().enumerate() {
        match input.get(ch) {
            Some(buf) => out.copy_from_slice(buf),
            None => out.iter_mut().for_each(|s| *s = 0.0),
        }
    }
}

// --- mixer ---

/// Passes the summed inputs through.
pub(crate) struct Mixer;

impl Processor for Mixer {
    fn process(&mut self, _ctx: &ProcessContext, input: &[Buffer], output: &mut [Buffer]) {
        copy_through(input, output);
    }

    fn parameters(&self) -> &'static [ParameterSpec] {
        &[]
    }

    fn parameter(&self, _index: usize) -> ParameterValue {
        ParameterValue::Data(Vec::new())
    }

    fn set_parameter(&mut self, _index: usize, _value: &ParameterValue) -> NativeResult<()> {
        Err(ResultCode::InvalidParam)
    }

    fn output_format(&self, own: &ChannelFormat, _input: &ChannelFormat) -> ChannelFormat {
        *own
    }
}

// --- oscillator ---

pub const OSCILLATOR_TYPE: usize = 0;
pub const OSCILLATOR_RATE: usize = 1;

static OSCILLATOR_PARAMS: [ParameterSpec; 2] = [
    ParameterSpec {
        name: "Type",
        label: "",
        description: "Waveform: 0 sine, 1 square, 2 saw up, 3 saw down, 4 triangle, 5 noise.",
        shape: ParameterShape::Int { min: 0, max: 5, default: 0, goes_to_infinity: false },
    },
    ParameterSpec {
        name: "Rate",
        label: "Hz",
        description: "Frequency of the tone.",
        shape: ParameterShape::Float { min: 0.0, max: 22000.0, default: 220.0 },
    },
];

/// Tone generator, mono.
pub(crate) struct Oscillator {
    waveform: i32,
    rate: f32,
    phase: f32,
    noise: u32,
}

impl Default for Oscillator {
    fn default() -> Self {
        Self { waveform: 0, rate: 220.0, phase: 0.0, noise: 0x1234_5678 }
    }
}

impl Oscillator {
    fn sample(&mut self) -> f32 {
        let p = self.phase;
        match self.waveform {
            1 => if p < 0.5 { 1.0 } else { -1.0 },
            2 => 2.0 * p - 1.0,
            3 => 1.0 - 2.0 * p,
            4 => 1.0 - 4.0 * (p - 0.5).abs(),
            5 => {
                // xorshift32
                let mut x = self.noise;
                x ^= x << 13;
                x ^= x >> 17;
                x ^= x << 5;
                self.noise = x;
                (x as f32 / u32::MAX as f32) * 2.0 - 1.0
            }
            _ => (p * core::f32::consts::TAU).sin(),
        }
    }
}

impl Processor for Oscillator {
    fn process(&mut self, ctx: &ProcessContext, _input: &[Buffer], output: &mut [Buffer]) {
        let Some((first, rest)) = output.split_first_mut() else {
            return;
        };

        let phase_inc = self.rate / ctx.sample_rate as f32;
        for i in 0..first.len() {
            first[i] = self.sample();
            self.phase += phase_inc;
            self.phase -= self.phase.floor();
        }

        for buffer in rest.iter_mut() {
            buffer.copy_from_slice(first);
        }
    }

    fn parameters(&self) -> &'static [ParameterSpec] {
        &OSCILLATOR_PARAMS
    }

    fn parameter(&self, index: usize) -> ParameterValue {
        match index {
            OSCILLATOR_TYPE => ParameterValue::Int(self.waveform),
            _ => ParameterValue::Float(self.rate),
        }
    }

    fn set_parameter(&mut self, index: usize, value: &ParameterValue) -> NativeResult<()> {
        match (index, value) {
            (OSCILLATOR_TYPE, ParameterValue::Int(v)) => self.waveform = *v,
            (OSCILLATOR_RATE, ParameterValue::Float(v)) => self.rate = *v,
            _ => return Err(ResultCode::InvalidParam),
        }
        Ok(())
    }

    fn output_format(&self, own: &ChannelFormat, _input: &ChannelFormat) -> ChannelFormat {
        *own
    }
}

// --- fader ---

pub const FADER_GAIN: usize = 0;
pub const FADER_MUTE: usize = 1;
pub const FADER_OVERALL_GAIN: usize = 2;

static FADER_PARAMS: [ParameterSpec; 3] = [
    ParameterSpec {
        name: "Gain",
        label: "dB",
        description: "Gain applied to the signal. -80 dB is silence.",
        shape: ParameterShape::Float { min: -80.0, max: 10.0, default: 0.0 },
    },
    ParameterSpec {
        name: "Mute",
        label: "",
        description: "Silence the output.",
        shape: ParameterShape::Bool { default: false },
    },
    ParameterSpec {
        name: "Overall Gain",
        label: "",
        description: "Linear and additive gain as applied; read only.",
        shape: ParameterShape::Data { data_type: data_type::OVERALL_GAIN },
    },
];

/// Gain stage with a mute switch.
#[derive(Default)]
pub(crate) struct Fader {
    gain_db: f32,
    mute: bool,
}

impl Fader {
    fn linear_gain(&self) -> f32 {
        if self.mute || self.gain_db <= -80.0 {
            0.0
        } else {
            10f32.powf(self.gain_db / 20.0)
        }
    }
}

impl Processor for Fader {
    fn process(&mut self, _ctx: &ProcessContext, input: &[Buffer], output: &mut [Buffer]) {
        copy_through(input, output);
        let gain = self.linear_gain();
        for buffer in output.iter_mut() {
            buffer.iter_mut().for_each(|s| *s *= gain);
        }
    }

    fn parameters(&self) -> &'static [ParameterSpec] {
        &FADER_PARAMS
    }

    fn parameter(&self, index: usize) -> ParameterValue {
        match index {
            FADER_GAIN => ParameterValue::Float(self.gain_db),
            FADER_MUTE => ParameterValue::Bool(self.mute),
            _ => {
                let mut bytes = Vec::with_capacity(8);
                bytes.extend_from_slice(&self.linear_gain().to_ne_bytes());
                bytes.extend_from_slice(&0f32.to_ne_bytes());
                ParameterValue::Data(bytes)
            }
        }
    }

    fn set_parameter(&mut self, index: usize, value: &ParameterValue) -> NativeResult<()> {
        match (index, value) {
            (FADER_GAIN, ParameterValue::Float(v)) => self.gain_db = *v,
            (FADER_MUTE, ParameterValue::Bool(v)) => self.mute = *v,
            _ => return Err(ResultCode::InvalidParam),
        }
        Ok(())
    }

    fn output_format(&self, _own: &ChannelFormat, input: &ChannelFormat) -> ChannelFormat {
        *input
    }
}

// --- channel mix ---

pub const CHANNEL_MIX_GROUPING: usize = 0;

static CHANNEL_MIX_PARAMS: [ParameterSpec; 1] = [ParameterSpec {
    name: "Output Grouping",
    label: "",
    description: "Output layout: 0 same as input, then mono up to 7.1.4.",
    shape: ParameterShape::Int { min: 0, max: 7, default: 0, goes_to_infinity: false },
}];

/// Regroups channels into another speaker layout.
#[derive(Default)]
pub(crate) struct ChannelMix {
    grouping: i32,
}

impl ChannelMix {
    /// The layout picked by the grouping parameter, `None` to follow the input.
    pub fn grouping_mode(&self) -> Option<SpeakerMode> {
        match self.grouping {
            1 => Some(SpeakerMode::Mono),
            2 => Some(SpeakerMode::Stereo),
            3 => Some(SpeakerMode::Quad),
            4 => Some(SpeakerMode::Surround),
            5 => Some(SpeakerMode::FivePointOne),
            6 => Some(SpeakerMode::SevenPointOne),
            7 => Some(SpeakerMode::SevenPointOneFour),
            _ => None,
        }
    }
}

impl Processor for ChannelMix {
    fn process(&mut self, _ctx: &ProcessContext, input: &[Buffer], output: &mut [Buffer]) {
        copy_through(input, output);
    }

    fn parameters(&self) -> &'static [ParameterSpec] {
        &CHANNEL_MIX_PARAMS
    }

    fn parameter(&self, _index: usize) -> ParameterValue {
        ParameterValue::Int(self.grouping)
    }

    fn set_parameter(&mut self, index: usize, value: &ParameterValue) -> NativeResult<()> {
        match (index, value) {
            (CHANNEL_MIX_GROUPING, ParameterValue::Int(v)) => self.grouping = *v,
            _ => return Err(ResultCode::InvalidParam),
        }
        Ok(())
    }

    fn output_format(&self, _own: &ChannelFormat, input: &ChannelFormat) -> ChannelFormat {
        self.grouping_mode().map_or(*input, ChannelFormat::for_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const CTX: ProcessContext = ProcessContext { sample_rate: 48_000 };

    #[test]
    fn fader_applies_gain_in_decibels() {
        let mut fader = Fader::default();
        fader.set_parameter(FADER_GAIN, &ParameterValue::Float(-6.0)).unwrap();

        let mut input = Buffer::SILENT;
        input.iter_mut().for_each(|s| *s = 1.0);
        let mut output = [Buffer::SILENT];
        fader.process(&CTX, core::slice::from_ref(&input), &mut output);
        assert_relative_eq!(output[0][10], 0.501_187, epsilon = 1e-5);

        fader.set_parameter(FADER_MUTE, &ParameterValue::Bool(true)).unwrap();
        fader.process(&CTX, core::slice::from_ref(&input), &mut output);
        assert_eq!(output[0][10], 0.0);
    }

    #[test]
    fn overall_gain_is_read_only() {
        let mut fader = Fader::default();
        assert_eq!(
            fader.set_parameter(FADER_OVERALL_GAIN, &ParameterValue::Data(vec![0; 8])),
            Err(ResultCode::InvalidParam)
        );
        let ParameterValue::Data(bytes) = fader.parameter(FADER_OVERALL_GAIN) else {
            panic!("overall gain should be data");
        };
        assert_eq!(bytes.len(), 8);
        assert_relative_eq!(f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]), 1.0);
    }

    #[test]
    fn oscillator_fills_every_output_channel() {
        let mut osc: SimProcessor = Oscillator::default().into();
        let mut output = [Buffer::SILENT, Buffer::SILENT];
        osc.process(&CTX, &[], &mut output);
        assert!(output[0].iter().any(|s| *s != 0.0));
        assert_eq!(&output[0][..], &output[1][..]);
    }

    #[test]
    fn channel_mix_grouping_picks_the_output_layout() {
        let mut mix = ChannelMix::default();
        let stereo = ChannelFormat::stereo();
        assert_eq!(mix.output_format(&stereo, &stereo), stereo);

        mix.set_parameter(CHANNEL_MIX_GROUPING, &ParameterValue::Int(5)).unwrap();
        let out = mix.output_format(&stereo, &stereo);
        assert_eq!(out.speaker_mode, SpeakerMode::FivePointOne);
        assert_eq!(out.channels, 6);
    }
}
