// src/macros.rs

//
// Logging macros
//
// logging feature enabled  → tracing, under the `mom_queue` target
// logging feature disabled → errors and warnings go to stderr, the rest is
//                            type-checked and dropped
//
// Nothing here writes to stdout: stdout carries the console contract lines
// (see `console.rs`) and must stay byte-exact.
//

#![allow(unused_macros)]

// --------------------
// tracing backed
// --------------------

#[cfg(feature = "logging")]
macro_rules! log_error {
    ($($arg:tt)*) => { tracing::error!(target: "mom_queue", $($arg)*) };
}

#[cfg(feature = "logging")]
macro_rules! log_warn {
    ($($arg:tt)*) => { tracing::warn!(target: "mom_queue", $($arg)*) };
}

#[cfg(feature = "logging")]
macro_rules! log_info {
    ($($arg:tt)*) => { tracing::info!(target: "mom_queue", $($arg)*) };
}

#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { tracing::debug!(target: "mom_queue", $($arg)*) };
}

#[cfg(feature = "logging")]
macro_rules! log_trace {
    ($($arg:tt)*) => { tracing::trace!(target: "mom_queue", $($arg)*) };
}

// --------------------
// stderr fallback
// --------------------

#[cfg(not(feature = "logging"))]
macro_rules! log_error {
    ($($arg:tt)*) => { eprintln!("error: {}", format_args!($($arg)*)) };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_warn {
    ($($arg:tt)*) => { eprintln!("warning: {}", format_args!($($arg)*)) };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_info {
    ($($arg:tt)*) => {{ let _ = format_args!($($arg)*); }};
}

#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {{ let _ = format_args!($($arg)*); }};
}

#[cfg(not(feature = "logging"))]
macro_rules! log_trace {
    ($($arg:tt)*) => {{ let _ = format_args!($($arg)*); }};
}

pub(crate) use log_debug;
pub(crate) use log_error;
pub(crate) use log_info;
pub(crate) use log_trace;
pub(crate) use log_warn;
