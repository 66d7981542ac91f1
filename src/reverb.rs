//! Global reverb environment settings.
//!
//! The native block is 48 bytes of `f32`s, but the fields are not stored in
//! declaration order. [`OFFSETS`] is the authoritative placement; encoding
//! and decoding go through it and never through struct layout.

use crate::sys::layout::{read_f32, write_f32, REVERB_PROPERTIES_LEN};
use crate::sys::RawReverbProperties;

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ReverbProperties {
    /// Reverberation decay time, ms.
    pub decay_time: f32,
    /// Initial reflection delay, ms.
    pub early_delay: f32,
    /// Late reverberation delay relative to the initial reflection, ms.
    pub late_delay: f32,
    /// Reference high frequency, Hz.
    pub hf_reference: f32,
    /// High-frequency to mid-frequency decay time ratio, percent.
    pub hf_decay_ratio: f32,
    /// Echo density, percent.
    pub diffusion: f32,
    /// Modal density, percent.
    pub density: f32,
    /// Reference low frequency, Hz.
    pub low_shelf_frequency: f32,
    /// Relative room effect level at low frequencies, dB.
    pub low_shelf_gain: f32,
    /// Relative room effect level at high frequencies, Hz.
    pub high_cut: f32,
    /// Early reflections level relative to room effect, percent.
    pub early_late_mix: f32,
    /// Room effect level at mid frequencies, dB.
    pub wet_level: f32,
}

/// Byte offset of each field inside the raw block, in declaration order.
pub const OFFSETS: [usize; 12] = [0, 8, 12, 4, 16, 24, 20, 28, 36, 32, 40, 44];

const _: () = {
    // every offset is a distinct aligned slot inside the block
    let mut seen = 0u16;
    let mut i = 0;
    while i < OFFSETS.len() {
        assert!(OFFSETS[i] % 4 == 0 && OFFSETS[i] + 4 <= REVERB_PROPERTIES_LEN);
        let bit = 1u16 << (OFFSETS[i] / 4);
        assert!(seen & bit == 0);
        seen |= bit;
        i += 1;
    }
};

impl ReverbProperties {
    pub const OFF: Self = Self::new([
        1000.0, 7.0, 11.0, 5000.0, 100.0, 100.0,
        100.0, 250.0, 0.0, 20.0, 96.0, -80.0,
    ]);
    pub const GENERIC: Self = Self::new([
        1500.0, 7.0, 11.0, 5000.0, 83.0, 100.0,
        100.0, 250.0, 0.0, 14500.0, 96.0, -8.0,
    ]);
    pub const ROOM: Self = Self::new([
        400.0, 2.0, 3.0, 5000.0, 83.0, 100.0,
        100.0, 250.0, 0.0, 6050.0, 88.0, -9.4,
    ]);
    pub const HALLWAY: Self = Self::new([
        1500.0, 7.0, 11.0, 5000.0, 59.0, 100.0,
        100.0, 250.0, 0.0, 7800.0, 87.0, -5.5,
    ]);
    pub const CAVE: Self = Self::new([
        2900.0, 15.0, 22.0, 5000.0, 100.0, 100.0,
        100.0, 250.0, 0.0, 20000.0, 59.0, -11.3,
    ]);

    /// Build from values in declaration order.
    pub const fn new(v: [f32; 12]) -> Self {
        Self {
            decay_time: v[0],
            early_delay: v[1],
            late_delay: v[2],
            hf_reference: v[3],
            hf_decay_ratio: v[4],
            diffusion: v[5],
            density: v[6],
            low_shelf_frequency: v[7],
            low_shelf_gain: v[8],
            high_cut: v[9],
            early_late_mix: v[10],
            wet_level: v[11],
        }
    }

    /// Values in declaration order.
    pub fn values(&self) -> [f32; 12] {
        [
            self.decay_time,
            self.early_delay,
            self.late_delay,
            self.hf_reference,
            self.hf_decay_ratio,
            self.diffusion,
            self.density,
            self.low_shelf_frequency,
            self.low_shelf_gain,
            self.high_cut,
            self.early_late_mix,
            self.wet_level,
        ]
    }

    pub fn to_raw(&self) -> RawReverbProperties {
        let mut raw = RawReverbProperties::default();
        for (value, &at) in self.values().iter().zip(OFFSETS.iter()) {
            write_f32(&mut raw.0, at, *value);
        }
        raw
    }

    pub fn from_raw(raw: &RawReverbProperties) -> Self {
        let mut values = [0.0; 12];
        for (value, &at) in values.iter_mut().zip(OFFSETS.iter()) {
            *value = read_f32(&raw.0, at);
        }
        Self::new(values)
    }
}

impl Default for ReverbProperties {
    fn default() -> Self {
        Self::OFF
    }
}
