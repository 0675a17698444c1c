//! Conditional logging macros gated on a module-level `ENABLE_LOGS` flag.
//!
//! Hot-path modules (the capture loop runs several times a second) declare
//! `const ENABLE_LOGS: bool = ...;` and use these instead of calling `log`
//! directly, so per-frame chatter can be silenced per module.
//!
//! The macros are exported at the crate root:
//! ```text
//! const ENABLE_LOGS: bool = true;
//! use crate::{log_info, log_warn, log_error};
//! ```

/// Info-level logging, gated on the calling module's `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Warn-level logging, gated on the calling module's `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Error-level logging, gated on the calling module's `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
