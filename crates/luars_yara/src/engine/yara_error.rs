use thiserror::Error;

use super::error_code::{
    ERROR_CALLBACK_ERROR, ERROR_CORRUPT_FILE, ERROR_INTERNAL_FATAL_ERROR, ERROR_SCAN_TIMEOUT,
    ERROR_SYNTAX_ERROR,
};

/// Failures reported by the scanning engine.
///
/// The message is kept for logging; Lua callers only ever see [`YaraError::code`].
#[derive(Debug, Error)]
pub enum YaraError {
    #[error("rule compilation failed: {0}")]
    Compile(String),

    #[error("cannot load compiled rules: {0}")]
    Load(String),

    #[error("cannot serialize compiled rules: {0}")]
    Serialize(String),

    #[error("scan timed out")]
    Timeout,

    #[error("scan failed: {0}")]
    Scan(String),
}

impl YaraError {
    pub fn code(&self) -> i64 {
        match self {
            YaraError::Compile(_) => ERROR_SYNTAX_ERROR,
            YaraError::Load(_) => ERROR_CORRUPT_FILE,
            YaraError::Serialize(_) => ERROR_INTERNAL_FATAL_ERROR,
            YaraError::Timeout => ERROR_SCAN_TIMEOUT,
            YaraError::Scan(_) => ERROR_INTERNAL_FATAL_ERROR,
        }
    }
}

/// Why a scan stopped before reporting every match.
///
/// `E` is whatever the match callback fails with; the engine never looks inside it.
#[derive(Debug)]
pub enum ScanFailure<E> {
    Engine(YaraError),
    Callback(E),
}

impl<E> ScanFailure<E> {
    pub fn code(&self) -> i64 {
        match self {
            ScanFailure::Engine(err) => err.code(),
            ScanFailure::Callback(_) => ERROR_CALLBACK_ERROR,
        }
    }
}

impl<E> From<YaraError> for ScanFailure<E> {
    fn from(err: YaraError) -> Self {
        ScanFailure::Engine(err)
    }
}
