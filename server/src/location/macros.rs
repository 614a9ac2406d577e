//! log macro's for location logging

/// Writes a debug! message to the app::location logger
#[macro_export]
macro_rules! location_debug {
    ($($arg:tt)+) => {
        log::debug!(target: "app::location", $($arg)+)
    };
}

/// Writes an info! message to the app::location logger
#[macro_export]
macro_rules! location_info {
    ($($arg:tt)+) => {
        log::info!(target: "app::location", $($arg)+)
    };
}

/// Writes an warn! message to the app::location logger
#[macro_export]
macro_rules! location_warn {
    ($($arg:tt)+) => {
        log::warn!(target: "app::location", $($arg)+)
    };
}

/// Writes an error! message to the app::location logger
#[macro_export]
macro_rules! location_error {
    ($($arg:tt)+) => {
        log::error!(target: "app::location", $($arg)+)
    };
}
