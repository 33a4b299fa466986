// Engine status codes
// Numbering follows libyara's error.h so scripts written against the C engine
// keep comparing against the same integers.

pub const ERROR_SUCCESS: i64 = 0;
pub const ERROR_CORRUPT_FILE: i64 = 7;
pub const ERROR_SYNTAX_ERROR: i64 = 11;
pub const ERROR_SCAN_TIMEOUT: i64 = 26;
pub const ERROR_CALLBACK_ERROR: i64 = 28;
pub const ERROR_INTERNAL_FATAL_ERROR: i64 = 31;
