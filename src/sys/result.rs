//! Result codes returned by every native entry point.

use core::fmt;

/// Outcome of a native call.
///
/// Native entry points return `Err(code)` for every code except [`ResultCode::Ok`].
pub type NativeResult<T> = Result<T, ResultCode>;

/// The closed set of codes a native entry point can report.
///
/// Discriminants match the native ABI and must not be reordered.
#[repr(i32)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ResultCode {
    Ok = 0,
    BadCommand,
    ChannelAlloc,
    ChannelStolen,
    Dma,
    DspConnection,
    DspDontProcess,
    DspFormat,
    DspInUse,
    DspNotFound,
    DspReserved,
    DspSilence,
    DspType,
    FileBad,
    FileCouldNotSeek,
    FileDiskEjected,
    FileEof,
    FileEndOfData,
    FileNotFound,
    Format,
    HeaderMismatch,
    Http,
    HttpAccess,
    HttpProxyAuth,
    HttpServerError,
    HttpTimeout,
    Initialization,
    Initialized,
    Internal,
    InvalidFloat,
    InvalidHandle,
    InvalidParam,
    InvalidPosition,
    InvalidSpeaker,
    InvalidSyncPoint,
    InvalidThread,
    InvalidVector,
    MaxAudible,
    Memory,
    MemoryCantPoint,
    Needs3d,
    NeedsHardware,
    NetConnect,
    NetSocketError,
    NetUrl,
    NetWouldBlock,
    NotReady,
    OutputAllocated,
    OutputCreateBuffer,
    OutputDriverCall,
    OutputFormat,
    OutputInit,
    OutputNoDrivers,
    Plugin,
    PluginMissing,
    PluginResource,
    PluginVersion,
    Record,
    ReverbChannelGroup,
    ReverbInstance,
    Subsounds,
    SubsoundAllocated,
    SubsoundCantMove,
    TagNotFound,
    TooManyChannels,
    Truncated,
    Unimplemented,
    Uninitialized,
    Unsupported,
    Version,
    EventAlreadyLoaded,
    EventLiveUpdateBusy,
    EventLiveUpdateMismatch,
    EventLiveUpdateTimeout,
    EventNotFound,
    StudioUninitialized,
    StudioNotLoaded,
    InvalidString,
    AlreadyLocked,
    NotLocked,
    RecordDisconnected,
    TooManySamples,
}

/// Coarse grouping of [`ResultCode`]s.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ResultCategory {
    Success,
    /// The object or engine is in the wrong state for the command.
    BadState,
    /// Allocation or other resource exhaustion.
    Resource,
    /// Format, layout or version mismatch.
    Format,
    /// Queued on the mixer thread; retry later.
    NotReady,
    Io,
    Network,
    /// Not supported for this object kind.
    Unsupported,
    Internal,
}

impl ResultCode {
    /// Every code, in discriminant order.
    pub const ALL: [ResultCode; 82] = {
        use ResultCode::*;
        [
            Ok, BadCommand, ChannelAlloc, ChannelStolen, Dma, DspConnection, DspDontProcess,
            DspFormat, DspInUse, DspNotFound, DspReserved, DspSilence, DspType, FileBad,
            FileCouldNotSeek, FileDiskEjected, FileEof, FileEndOfData, FileNotFound, Format,
            HeaderMismatch, Http, HttpAccess, HttpProxyAuth, HttpServerError, HttpTimeout,
            Initialization, Initialized, Internal, InvalidFloat, InvalidHandle, InvalidParam,
            InvalidPosition, InvalidSpeaker, InvalidSyncPoint, InvalidThread, InvalidVector,
            MaxAudible, Memory, MemoryCantPoint, Needs3d, NeedsHardware, NetConnect,
            NetSocketError, NetUrl, NetWouldBlock, NotReady, OutputAllocated, OutputCreateBuffer,
            OutputDriverCall, OutputFormat, OutputInit, OutputNoDrivers, Plugin, PluginMissing,
            PluginResource, PluginVersion, Record, ReverbChannelGroup, ReverbInstance, Subsounds,
            SubsoundAllocated, SubsoundCantMove, TagNotFound, TooManyChannels, Truncated,
            Unimplemented, Uninitialized, Unsupported, Version, EventAlreadyLoaded,
            EventLiveUpdateBusy, EventLiveUpdateMismatch, EventLiveUpdateTimeout, EventNotFound,
            StudioUninitialized, StudioNotLoaded, InvalidString, AlreadyLocked, NotLocked,
            RecordDisconnected, TooManySamples,
        ]
    };

    /// Decode a raw code coming back across the ABI.
    pub fn from_raw(raw: i32) -> Option<Self> {
        usize::try_from(raw).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    #[inline]
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    #[inline]
    pub fn is_ok(self) -> bool {
        self == ResultCode::Ok
    }

    /// Turn a bare status into a [`NativeResult`]. Fails on every code but `Ok`.
    #[inline]
    pub fn into_result(self) -> NativeResult<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn category(self) -> ResultCategory {
        use ResultCode::*;
        match self {
            Ok => ResultCategory::Success,
            NotReady | NetWouldBlock | EventLiveUpdateBusy => ResultCategory::NotReady,
            BadCommand | ChannelStolen | DspInUse | DspNotFound | DspReserved | DspDontProcess
            | DspSilence | Initialization | Initialized | Uninitialized | InvalidHandle
            | InvalidParam | InvalidPosition | InvalidSpeaker | InvalidSyncPoint
            | InvalidThread | InvalidVector | InvalidFloat | InvalidString | AlreadyLocked
            | NotLocked | DspConnection | StudioUninitialized | StudioNotLoaded
            | EventAlreadyLoaded | EventNotFound | ReverbChannelGroup | ReverbInstance
            | SubsoundAllocated | SubsoundCantMove | TagNotFound => ResultCategory::BadState,
            ChannelAlloc | Memory | MemoryCantPoint | MaxAudible | TooManyChannels
            | TooManySamples | OutputAllocated | OutputCreateBuffer | Dma | Subsounds => {
                ResultCategory::Resource
            }
            DspFormat | Format | HeaderMismatch | OutputFormat | PluginVersion | Version
            | EventLiveUpdateMismatch | Truncated => ResultCategory::Format,
            FileBad | FileCouldNotSeek | FileDiskEjected | FileEof | FileEndOfData
            | FileNotFound | Record | RecordDisconnected | OutputDriverCall | OutputInit
            | OutputNoDrivers => ResultCategory::Io,
            Http | HttpAccess | HttpProxyAuth | HttpServerError | HttpTimeout | NetConnect
            | NetSocketError | NetUrl | EventLiveUpdateTimeout => ResultCategory::Network,
            DspType | Needs3d | NeedsHardware | Plugin | PluginMissing | PluginResource
            | Unimplemented | Unsupported => ResultCategory::Unsupported,
            Internal => ResultCategory::Internal,
        }
    }

    /// Short human-readable description.
    pub fn message(self) -> &'static str {
        use ResultCode::*;
        match self {
            Ok => "no errors",
            BadCommand => "command issued was not supported by this object",
            ChannelAlloc => "error trying to allocate a channel",
            ChannelStolen => "the specified channel has been reused to play another sound",
            Dma => "DMA failure",
            DspConnection => "DSP connection error; possibly a cyclic dependency",
            DspDontProcess => "DSP asked not to be processed",
            DspFormat => "DSP format error",
            DspInUse => "DSP is already in the mixer's DSP network",
            DspNotFound => "DSP connection error; could not find the DSP unit specified",
            DspReserved => "DSP operation cannot be performed on a reserved unit",
            DspSilence => "DSP returned silence",
            DspType => "DSP operation cannot be performed on a DSP of this type",
            FileBad => "error loading file",
            FileCouldNotSeek => "could not seek in the file",
            FileDiskEjected => "media was ejected while reading",
            FileEof => "end of file unexpectedly reached",
            FileEndOfData => "end of current chunk reached",
            FileNotFound => "file not found",
            Format => "unsupported file or audio format",
            HeaderMismatch => "version mismatch between native headers and library",
            Http => "an HTTP error occurred",
            HttpAccess => "the requested resource requires authentication",
            HttpProxyAuth => "proxy authentication is required",
            HttpServerError => "an HTTP server error occurred",
            HttpTimeout => "the HTTP request timed out",
            Initialization => "engine was not initialized correctly for this command",
            Initialized => "cannot call this command after init",
            Internal => "internal error in the native engine",
            InvalidFloat => "value passed in was NaN, Inf or denormalized",
            InvalidHandle => "an invalid object handle was used",
            InvalidParam => "an invalid parameter was passed",
            InvalidPosition => "an invalid seek position was passed",
            InvalidSpeaker => "an invalid speaker was passed for the current speaker mode",
            InvalidSyncPoint => "the sync point did not come from this sound",
            InvalidThread => "called from an invalid thread",
            InvalidVector => "vectors passed in are not unit length or not perpendicular",
            MaxAudible => "reached maximum audible playback count",
            Memory => "not enough memory or resources",
            MemoryCantPoint => "cannot use open-memory-point on a non-PCM source",
            Needs3d => "tried to call a command on a 2D object that requires 3D",
            NeedsHardware => "tried to use a feature that requires hardware support",
            NetConnect => "couldn't connect to the specified host",
            NetSocketError => "a socket error occurred",
            NetUrl => "the specified URL couldn't be resolved",
            NetWouldBlock => "operation on a non-blocking socket could not complete immediately",
            NotReady => "operation could not be performed because the target isn't ready yet",
            OutputAllocated => "the output device is already in use",
            OutputCreateBuffer => "error creating hardware sound buffer",
            OutputDriverCall => "a call to a standard soundcard driver failed",
            OutputFormat => "soundcard does not support the specified format",
            OutputInit => "error initializing output device",
            OutputNoDrivers => "the output device has no drivers installed",
            Plugin => "an unspecified error has been returned from a plugin",
            PluginMissing => "a requested output, DSP unit type or codec was not available",
            PluginResource => "a resource the plugin requires cannot be allocated or found",
            PluginVersion => "a plugin was built with an unsupported SDK version",
            Record => "an error occurred trying to initialize the recording device",
            ReverbChannelGroup => "reverb properties cannot be set on this channel",
            ReverbInstance => "specified reverb instance is out of range or not created",
            Subsounds => "the error occurred because the sound referenced contains subsounds",
            SubsoundAllocated => "this subsound is already being used by another sound",
            SubsoundCantMove => "shared subsounds cannot be replaced or moved",
            TagNotFound => "the specified tag could not be found",
            TooManyChannels => "the sound created exceeds the allowable input channel count",
            Truncated => "the retrieved string is too long to fit in the supplied buffer",
            Unimplemented => "something in the native engine hasn't been implemented",
            Uninitialized => "this command failed because init was not called",
            Unsupported => "a command issued was not supported by this object",
            Version => "the version number of this file format is not supported",
            EventAlreadyLoaded => "the specified bank has already been loaded",
            EventLiveUpdateBusy => {
                "the live update connection failed due to the game already being connected"
            }
            EventLiveUpdateMismatch => "the live update connection failed due to mismatched data",
            EventLiveUpdateTimeout => "the live update connection timed out",
            EventNotFound => "the requested event, parameter or bus could not be found",
            StudioUninitialized => "the studio system object is not yet initialized",
            StudioNotLoaded => "the specified resource is not loaded",
            InvalidString => "an invalid string was passed",
            AlreadyLocked => "the specified resource is already locked",
            NotLocked => "the specified resource is not locked",
            RecordDisconnected => "the specified recording driver has been disconnected",
            TooManySamples => "the length provided exceeds the allowable limit",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.message())
    }
}
