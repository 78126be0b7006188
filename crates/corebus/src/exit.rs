use std::fmt;

use corebus_core::ControlError;

// Exit codes follow common sysexits/timeout conventions.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn control_error(context: &str, err: ControlError) -> CliError {
    let code = match &err {
        ControlError::Reply { .. } | ControlError::EventTimeout { .. } => TIMEOUT,
        ControlError::Backpressure(_) => FAILURE,
        ControlError::UnknownCore(_) => USAGE,
        ControlError::CoreGone(_) => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}
