//! Native object identity.

use core::fmt;

/// Opaque, pointer-width identifier naming an object owned by the native engine.
///
/// Two handles are the same object exactly when their values are equal.
/// [`NativeHandle::NULL`] is the "no object" sentinel that native queries
/// return when there is nothing to report.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NativeHandle(usize);

impl NativeHandle {
    /// The "no object" sentinel.
    pub const NULL: NativeHandle = NativeHandle(0);

    #[inline]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn as_raw(self) -> usize {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("NativeHandle(NULL)")
        } else {
            write!(f, "NativeHandle({:#x})", self.0)
        }
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
