//! Checked calls into the native layer.
//!
//! [`invoke`] is the single place where a native call is issued. It trims
//! the optional argument tail, clears the last-error slot, calls the native
//! function and turns its failure sentinel into [`SybaseError::NativeCallFailed`].

use crate::{
    domain::{
        call_spec::CallSpec,
        native_value::{NativeFunction, NativeValue, Sentinel},
    },
    errors::{Result, SybaseError, UNKNOWN_NATIVE_ERROR},
    last_error::LastErrorSource,
};
use log::{debug, warn};

/// The native extension being wrapped.
pub trait NativeExtension {
    /// Calls `function` with exactly `args`. Omitted trailing parameters take
    /// their native defaults.
    fn call(&mut self, function: NativeFunction, args: &[NativeValue]) -> NativeValue;
}

impl<T: NativeExtension + ?Sized> NativeExtension for &mut T {
    fn call(&mut self, function: NativeFunction, args: &[NativeValue]) -> NativeValue {
        (**self).call(function, args)
    }
}

impl<T: NativeExtension + ?Sized> NativeExtension for Box<T> {
    fn call(&mut self, function: NativeFunction, args: &[NativeValue]) -> NativeValue {
        (**self).call(function, args)
    }
}

pub fn invoke<const N: usize>(
    native: &mut impl NativeExtension,
    errors: &impl LastErrorSource,
    function: NativeFunction,
    spec: CallSpec<N>,
    sentinel: &Sentinel,
) -> Result<NativeValue> {
    let args = spec
        .into_args()
        .map_err(|gap| SybaseError::ArgumentGap {
            function,
            index: gap.index,
        })?;

    debug!("{} called with {} of {} arguments", function, args.len(), N);
    errors.clear();
    let value = native.call(function, &args);

    if sentinel.matches(&value) {
        let message = errors
            .last_message()
            .unwrap_or_else(|| UNKNOWN_NATIVE_ERROR.to_string());
        warn!("{} failed: {}", function, message);
        return Err(SybaseError::NativeCallFailed { function, message });
    }
    Ok(value)
}
