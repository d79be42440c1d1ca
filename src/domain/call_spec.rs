//! Positional argument lists with an optional trailing tail.
//!
//! A native function with optional parameters is called with fewer arguments
//! when the caller omits the trailing ones. [`CallSpec`] holds one slot per
//! parameter and trims unset trailing slots to find the arity to issue.

use super::native_value::NativeValue;

/// One positional parameter of a native call.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Required(NativeValue),
    Optional(Option<NativeValue>),
}

impl Slot {
    pub fn required(value: impl Into<NativeValue>) -> Self {
        Slot::Required(value.into())
    }

    pub fn optional<T: Into<NativeValue>>(value: Option<T>) -> Self {
        Slot::Optional(value.map(Into::into))
    }

    pub fn is_set(&self) -> bool {
        match self {
            Slot::Required(_) => true,
            Slot::Optional(value) => value.is_some(),
        }
    }

    fn into_value(self) -> Option<NativeValue> {
        match self {
            Slot::Required(value) => Some(value),
            Slot::Optional(value) => value,
        }
    }
}

/// The full parameter list of an `N`-ary native function.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSpec<const N: usize> {
    slots: [Slot; N],
}

/// A set argument follows an unset optional one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgumentGap {
    /// Zero-based position of the first unset slot.
    pub index: usize,
}

impl<const N: usize> CallSpec<N> {
    pub fn new(slots: [Slot; N]) -> Self {
        CallSpec { slots }
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Number of arguments that will actually be passed.
    pub fn arity(&self) -> usize {
        self.slots
            .iter()
            .rposition(Slot::is_set)
            .map_or(0, |last| last + 1)
    }

    /// Drops the unset trailing slots and returns the arguments to pass.
    pub fn into_args(self) -> Result<Vec<NativeValue>, ArgumentGap> {
        let arity = self.arity();
        if let Some(index) = self.slots[..arity].iter().position(|slot| !slot.is_set()) {
            return Err(ArgumentGap { index });
        }
        Ok(self
            .slots
            .into_iter()
            .take(arity)
            .filter_map(Slot::into_value)
            .collect())
    }
}
