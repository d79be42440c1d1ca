use crate::domain::native_value::NativeFunction;
use thiserror::Error;

/// Message used when the native layer failed without recording anything.
pub const UNKNOWN_NATIVE_ERROR: &str = "An error occurred";

#[derive(Debug, Error)]
pub enum SybaseError {
    /// The native function returned its failure sentinel.
    #[error("{message}")]
    NativeCallFailed {
        function: NativeFunction,
        message: String,
    },
    /// An optional argument was left unset while a later one was supplied.
    #[error("{function}: argument {index} is unset but a later argument is set")]
    ArgumentGap {
        function: NativeFunction,
        index: usize,
    },
    #[error("Invalid value for {key}: {value:?}")]
    Config { key: &'static str, value: String },
    #[error("Failed to initialize DB-Library")]
    InitFailed,
}

impl SybaseError {
    /// Text captured from the native layer, if this is a native failure.
    pub fn message(&self) -> Option<&str> {
        match self {
            SybaseError::NativeCallFailed { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn function(&self) -> Option<NativeFunction> {
        match self {
            SybaseError::NativeCallFailed { function, .. }
            | SybaseError::ArgumentGap { function, .. } => Some(*function),
            SybaseError::Config { .. } | SybaseError::InitFailed => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SybaseError>;
