//! The native boundary: entry points, result codes and raw struct layouts.

mod api;
pub mod layout;
mod result;

pub use api::{NativeApi, SystemSettings};
pub use layout::{RawParameterDesc, RawReverbProperties};
pub use result::{NativeResult, ResultCategory, ResultCode};
