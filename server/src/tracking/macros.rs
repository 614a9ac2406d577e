//! log macro's for tracking logging

/// Writes a debug! message to the app::tracking logger
#[macro_export]
macro_rules! tracking_debug {
    ($($arg:tt)+) => {
        log::debug!(target: "app::tracking", $($arg)+)
    };
}

/// Writes an info! message to the app::tracking logger
#[macro_export]
macro_rules! tracking_info {
    ($($arg:tt)+) => {
        log::info!(target: "app::tracking", $($arg)+)
    };
}

/// Writes an warn! message to the app::tracking logger
#[macro_export]
macro_rules! tracking_warn {
    ($($arg:tt)+) => {
        log::warn!(target: "app::tracking", $($arg)+)
    };
}

/// Writes an error! message to the app::tracking logger
#[macro_export]
macro_rules! tracking_error {
    ($($arg:tt)+) => {
        log::error!(target: "app::tracking", $($arg)+)
    };
}
