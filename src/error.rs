//! Error types for the binding layer.

use thiserror::Error;

use crate::dsp::ParameterKind;
use crate::handle::NativeHandle;
use crate::proxy::ProxyKind;
use crate::sys::ResultCode;

/// Result type alias for binding operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A native call reported anything other than success.
    #[error("{op} failed: {code}")]
    Native { op: &'static str, code: ResultCode },

    #[error("handle {handle} is already cached as a {cached:?}, not a {requested:?}")]
    KindMismatch {
        handle: NativeHandle,
        cached: ProxyKind,
        requested: ProxyKind,
    },

    #[error("handle {0} already has a live proxy")]
    AlreadyRegistered(NativeHandle),

    #[error("proxy has been disposed")]
    Disposed,

    #[error("engine has been closed")]
    EngineClosed,

    #[error("parameter index {index} out of range (node has {count})")]
    ParameterIndex { index: usize, count: usize },

    #[error("parameter {index} holds {declared:?} values, not {requested:?}")]
    ParameterKind {
        index: usize,
        declared: ParameterKind,
        requested: ParameterKind,
    },

    #[error("mix matrix buffer holds {len} values, {needed} needed")]
    MatrixBuffer { len: usize, needed: usize },

    #[error("row hop {hop} cannot stride rows of {cols} values")]
    MatrixStride { cols: usize, hop: usize },

    /// A proxy from another engine was passed where this engine's is needed.
    #[error("{op}: proxy belongs to a different engine")]
    ForeignEngine { op: &'static str },

    #[error("malformed native data: {0}")]
    Layout(String),
}

impl Error {
    pub(crate) fn native(op: &'static str) -> impl FnOnce(ResultCode) -> Error {
        move |code| Error::Native { op, code }
    }

    /// The native result code behind this error, if there is one.
    pub fn code(&self) -> Option<ResultCode> {
        match self {
            Error::Native { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// `true` for the one recoverable case: a queued command the mixer has
    /// not applied yet. Poll and retry.
    pub fn is_not_ready(&self) -> bool {
        self.code() == Some(ResultCode::NotReady)
    }
}
