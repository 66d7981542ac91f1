//! Channel formats exchanged with the native engine during format negotiation.

/// Speaker layout of a signal.
///
/// Discriminants match the native ABI.
#[repr(i32)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SpeakerMode {
    /// Whatever the engine's output is configured for.
    Default = 0,
    /// Untagged channels; the channel count is carried separately.
    Raw,
    Mono,
    Stereo,
    Quad,
    Surround,
    FivePointOne,
    SevenPointOne,
    SevenPointOneFour,
}

impl SpeakerMode {
    pub const ALL: [SpeakerMode; 9] = [
        SpeakerMode::Default,
        SpeakerMode::Raw,
        SpeakerMode::Mono,
        SpeakerMode::Stereo,
        SpeakerMode::Quad,
        SpeakerMode::Surround,
        SpeakerMode::FivePointOne,
        SpeakerMode::SevenPointOne,
        SpeakerMode::SevenPointOneFour,
    ];

    pub fn from_raw(raw: i32) -> Option<Self> {
        usize::try_from(raw).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    /// Channel count implied by the layout, `None` for `Default` and `Raw`.
    pub fn channels(self) -> Option<u32> {
        match self {
            SpeakerMode::Default | SpeakerMode::Raw => None,
            SpeakerMode::Mono => Some(1),
            SpeakerMode::Stereo => Some(2),
            SpeakerMode::Quad => Some(4),
            SpeakerMode::Surround => Some(5),
            SpeakerMode::FivePointOne => Some(6),
            SpeakerMode::SevenPointOne => Some(8),
            SpeakerMode::SevenPointOneFour => Some(12),
        }
    }

    /// Standard channel mask for the layout.
    pub fn mask(self) -> ChannelMask {
        match self {
            SpeakerMode::Default | SpeakerMode::Raw => ChannelMask::EMPTY,
            SpeakerMode::Mono => ChannelMask::MONO,
            SpeakerMode::Stereo => ChannelMask::STEREO,
            SpeakerMode::Quad => ChannelMask::QUAD,
            SpeakerMode::Surround => ChannelMask::SURROUND,
            SpeakerMode::FivePointOne => ChannelMask::FIVE_POINT_ONE,
            SpeakerMode::SevenPointOne => ChannelMask::SEVEN_POINT_ONE,
            SpeakerMode::SevenPointOneFour => ChannelMask::SEVEN_POINT_ONE_FOUR,
        }
    }
}

/// Bitmask of speaker positions present in a signal.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct ChannelMask(pub u32);

impl ChannelMask {
    pub const EMPTY: ChannelMask = ChannelMask(0);
    pub const FRONT_LEFT: ChannelMask = ChannelMask(0x0000_0001);
    pub const FRONT_RIGHT: ChannelMask = ChannelMask(0x0000_0002);
    pub const FRONT_CENTER: ChannelMask = ChannelMask(0x0000_0004);
    pub const LOW_FREQUENCY: ChannelMask = ChannelMask(0x0000_0008);
    pub const SURROUND_LEFT: ChannelMask = ChannelMask(0x0000_0010);
    pub const SURROUND_RIGHT: ChannelMask = ChannelMask(0x0000_0020);
    pub const BACK_LEFT: ChannelMask = ChannelMask(0x0000_0040);
    pub const BACK_RIGHT: ChannelMask = ChannelMask(0x0000_0080);
    pub const BACK_CENTER: ChannelMask = ChannelMask(0x0000_0100);
    pub const TOP_FRONT_LEFT: ChannelMask = ChannelMask(0x0000_0200);
    pub const TOP_FRONT_RIGHT: ChannelMask = ChannelMask(0x0000_0400);
    pub const TOP_BACK_LEFT: ChannelMask = ChannelMask(0x0000_0800);
    pub const TOP_BACK_RIGHT: ChannelMask = ChannelMask(0x0000_1000);

    pub const MONO: ChannelMask = Self::FRONT_LEFT;
    pub const STEREO: ChannelMask = Self::FRONT_LEFT.union(Self::FRONT_RIGHT);
    pub const QUAD: ChannelMask =
        Self::STEREO.union(Self::SURROUND_LEFT).union(Self::SURROUND_RIGHT);
    pub const SURROUND: ChannelMask = Self::QUAD.union(Self::FRONT_CENTER);
    pub const FIVE_POINT_ONE: ChannelMask = Self::SURROUND.union(Self::LOW_FREQUENCY);
    pub const SEVEN_POINT_ONE: ChannelMask =
        Self::FIVE_POINT_ONE.union(Self::BACK_LEFT).union(Self::BACK_RIGHT);
    pub const SEVEN_POINT_ONE_FOUR: ChannelMask = Self::SEVEN_POINT_ONE
        .union(Self::TOP_FRONT_LEFT)
        .union(Self::TOP_FRONT_RIGHT)
        .union(Self::TOP_BACK_LEFT)
        .union(Self::TOP_BACK_RIGHT);

    #[inline]
    pub const fn union(self, other: ChannelMask) -> ChannelMask {
        ChannelMask(self.0 | other.0)
    }

    #[inline]
    pub const fn contains(self, other: ChannelMask) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }
}

/// A complete description of a signal's channel layout.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ChannelFormat {
    pub mask: ChannelMask,
    pub channels: u32,
    pub speaker_mode: SpeakerMode,
}

impl ChannelFormat {
    /// The canonical format for a speaker layout.
    ///
    /// `Default` and `Raw` carry no channel count of their own and come out
    /// with zero channels; use [`ChannelFormat::raw`] for those.
    pub fn for_mode(speaker_mode: SpeakerMode) -> Self {
        Self {
            mask: speaker_mode.mask(),
            channels: speaker_mode.channels().unwrap_or(0),
            speaker_mode,
        }
    }

    /// Untagged format with an explicit channel count.
    pub fn raw(channels: u32) -> Self {
        Self {
            mask: ChannelMask::EMPTY,
            channels,
            speaker_mode: SpeakerMode::Raw,
        }
    }

    pub fn mono() -> Self {
        Self::for_mode(SpeakerMode::Mono)
    }

    pub fn stereo() -> Self {
        Self::for_mode(SpeakerMode::Stereo)
    }
}

impl From<SpeakerMode> for ChannelFormat {
    fn from(mode: SpeakerMode) -> Self {
        ChannelFormat::for_mode(mode)
    }
}
