#![doc = include_str!("../README.md")]

use tokio::sync::OnceCell;

#[cfg(test)]
#[macro_use]
pub mod test_util;

pub mod config;
#[macro_use]
pub mod location;
#[macro_use]
pub mod tracking;
#[macro_use]
pub mod storefront;
pub mod view;

pub use crate::config::Config;

/// Initialized log4rs handle
pub static LOG_HANDLE: OnceCell<Option<log4rs::Handle>> = OnceCell::const_new();
pub(crate) async fn get_log_handle() -> Option<log4rs::Handle> {
    LOG_HANDLE
        .get_or_init(|| async move {
            // Set up basic logger to make sure we can write to stdout
            let stdout = log4rs::append::console::ConsoleAppender::builder()
                .encoder(Box::new(log4rs::encode::pattern::PatternEncoder::new(
                    "{d(%Y-%m-%d %H:%M:%S)} | {I} | {h({l}):5.5} | {f}:{L} | {m}{n}",
                )))
                .build();
            match log4rs::config::Config::builder()
                .appender(log4rs::config::Appender::builder().build("stdout", Box::new(stdout)))
                .build(
                    log4rs::config::Root::builder()
                        .appender("stdout")
                        .build(log::LevelFilter::Debug),
                ) {
                Ok(config) => log4rs::init_config(config).ok(),
                Err(_) => None,
            }
        })
        .await
        .to_owned()
}

/// Initialize a log4rs logger with provided configuration file path
pub async fn load_logger_config_from_file(config_file: &str) -> Result<(), String> {
    let log_handle = get_log_handle()
        .await
        .ok_or("(load_logger_config_from_file) Could not get the log handle.")?;
    match log4rs::config::load_config_file(config_file, Default::default()) {
        Ok(config) => {
            log_handle.set_config(config);
            Ok(())
        }
        Err(e) => Err(format!(
            "(logger) Could not parse log config file [{}]: {}.",
            config_file, e,
        )),
    }
}

/// Tokio signal handler that will wait for a user to press CTRL+C, or
/// for the provided channel to fire.
///
/// # Examples
///
/// ## stop following a delivery
/// ```
/// use svc_delivery_tracker::shutdown_signal;
/// pub async fn follow(mut updates: tokio::sync::watch::Receiver<u8>) {
///     let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
///     let shutdown = shutdown_signal("tracking", Some(shutdown_rx));
///     tokio::pin!(shutdown);
///
///     shutdown_tx.send(()).ok();
///     loop {
///         tokio::select! {
///             _ = &mut shutdown => break,
///             changed = updates.changed() => if changed.is_err() { break },
///         }
///     }
/// }
/// ```
pub async fn shutdown_signal(
    reason: &str,
    shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
) {
    let result = match shutdown_rx {
        Some(receiver) => receiver.await.map_err(|e| e.to_string()),
        None => tokio::signal::ctrl_c().await.map_err(|e| e.to_string()),
    };

    if let Err(e) = result {
        log::error!("(shutdown_signal) signal for [{}] failed: {}", reason, e);
    }

    log::warn!("(shutdown_signal) shutdown requested for [{}].", reason);
}
