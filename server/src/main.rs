//! Storefront delivery tracker
//!
//! Places one order from the configured cart and follows the drone until
//! it arrives or the user presses CTRL+C.

use anyhow::{anyhow, Context};
use log::info;
use svc_delivery_tracker::storefront::{Cart, CartAction, Catalog, Storefront};
use svc_delivery_tracker::view::Screen;
use svc_delivery_tracker::*;

#[tokio::main]
#[cfg(not(tarpaulin_include))]
async fn main() -> anyhow::Result<()> {
    // Will use default config settings if no environment vars are found.
    let config = Config::try_from_env()
        .map_err(|e| anyhow!("Failed to load configuration from environment: {}", e))?;

    info!("(main) Loading config.");

    // Try to load log configuration from the provided log file.
    // Will default to stdout debug logging if the file can not be loaded.
    if let Err(e) = load_logger_config_from_file(config.log_config.as_str()).await {
        log::error!("(main) {}", e);
    }

    let catalog = match &config.catalog_path {
        Some(path) => Catalog::load(path).await?,
        None => Catalog::builtin(),
    };

    let mut cart = Cart::new();
    for id in config
        .order_item_ids()
        .context("ORDER_ITEMS must be a comma separated list of product ids")?
    {
        cart.apply(CartAction::Add(id), &catalog)?;
    }

    info!("(main) Storefront startup.");
    let mut storefront = Storefront::new(config, catalog)?;
    let mut order = storefront.checkout(&cart).await?;
    info!(
        "(main) order placed: session {}, {} items, total {:.2}.",
        order.session_id,
        cart.item_count(),
        order.total
    );

    let shutdown = shutdown_signal("delivery", None);
    tokio::pin!(shutdown);

    loop {
        let state = order.updates.borrow_and_update().clone();
        info!("(main) {}", Screen::from_state(&state));
        if state.status.is_terminal() {
            break;
        }

        tokio::select! {
            _ = &mut shutdown => break,
            changed = order.updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    storefront.cancel().await;
    info!("(main) delivery tracker shutdown.");

    // Make sure all log message are written/ displayed before shutdown
    log::logger().flush();

    Ok(())
}
