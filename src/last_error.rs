//! Access to the native layer's most recent error text.

use std::sync::{Mutex, PoisonError};

/// Readable and clearable "last error" slot of the native layer.
pub trait LastErrorSource {
    fn clear(&self);
    fn last_message(&self) -> Option<String>;
}

impl<T: LastErrorSource + ?Sized> LastErrorSource for &T {
    fn clear(&self) {
        (**self).clear()
    }

    fn last_message(&self) -> Option<String> {
        (**self).last_message()
    }
}

static LAST_ERROR: Mutex<Option<String>> = Mutex::new(None);

// Held by every unit test that reads or writes the process-wide slot.
#[cfg(test)]
pub(crate) static SLOT_LOCK: Mutex<()> = Mutex::new(());

/// Records `message` in the process-wide slot, replacing any previous one.
pub fn record(message: impl Into<String>) {
    *LAST_ERROR.lock().unwrap_or_else(PoisonError::into_inner) = Some(message.into());
}

/// The process-wide slot written by native callbacks through [`record`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLastError;

impl LastErrorSource for ProcessLastError {
    fn clear(&self) {
        LAST_ERROR.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    fn last_message(&self) -> Option<String> {
        LAST_ERROR
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
