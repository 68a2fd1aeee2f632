pub mod mqtt;
pub mod panel;
pub mod ui;

use crate::mqtt::config::LinkConfig;
use crate::mqtt::link::{LinkEvent, LinkHandle};
use crate::panel::PanelController;
use crate::ui::PanelUi;
use color_eyre::{eyre::eyre, Result};
use tokio::sync::mpsc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    info!("Initializing semaphore panel");
    let config = LinkConfig::default();

    let (command_tx, command_rx) = mpsc::channel(16);
    let (event_tx, event_rx) = mpsc::channel(64);

    // A rejected endpoint leaves the panel in local-only mode: commands still
    // update the display, they just never transmit.
    if let Err(e) = LinkHandle::spawn(config, command_rx, event_tx.clone()) {
        error!(error = %e, "mqtt link unavailable, running in local-only mode");
        let _ = event_tx.send(LinkEvent::ConnectFailed(e.to_string())).await;
    }

    info!("Starting panel UI");
    let native_options = eframe::NativeOptions::default();
    eframe::run_native(
        "Semaphore Panel",
        native_options,
        Box::new(|cc| {
            Ok(Box::new(PanelUi::new(
                cc,
                PanelController::new(command_tx),
                event_rx,
            )))
        }),
    )
    .map_err(|e| eyre!("panel ui terminated: {e}"))?;

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
