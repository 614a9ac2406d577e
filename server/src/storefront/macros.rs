//! log macro's for storefront logging

/// Writes a debug! message to the app::storefront logger
#[macro_export]
macro_rules! storefront_debug {
    ($($arg:tt)+) => {
        log::debug!(target: "app::storefront", $($arg)+)
    };
}

/// Writes an info! message to the app::storefront logger
#[macro_export]
macro_rules! storefront_info {
    ($($arg:tt)+) => {
        log::info!(target: "app::storefront", $($arg)+)
    };
}

/// Writes an warn! message to the app::storefront logger
#[macro_export]
macro_rules! storefront_warn {
    ($($arg:tt)+) => {
        log::warn!(target: "app::storefront", $($arg)+)
    };
}

/// Writes an error! message to the app::storefront logger
#[macro_export]
macro_rules! storefront_error {
    ($($arg:tt)+) => {
        log::error!(target: "app::storefront", $($arg)+)
    };
}
