//! Panel controller - command relay and status listener
//!
//! Owns all panel-side state (lamp display, mirrored connection state) and
//! reacts to the two event sources: operator button clicks and link events
//! from the MQTT actor. Every operation is non-blocking so the UI thread can
//! call straight into it from the frame loop.

use std::fmt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::display::LightDisplay;
use crate::mqtt::link::LinkEvent;
use crate::mqtt::message::{Command, CommandMessage, StatusReport};

/// Connection state as shown in the banner. Mutated only by link events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected(Option<String>),
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "Connecting…"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Disconnected(None) => write!(f, "Disconnected"),
            ConnectionState::Disconnected(Some(reason)) => {
                write!(f, "Disconnected: {reason}")
            }
        }
    }
}

pub struct PanelController {
    display: LightDisplay,
    connection: ConnectionState,
    commands: mpsc::Sender<CommandMessage>,
}

impl PanelController {
    pub fn new(commands: mpsc::Sender<CommandMessage>) -> Self {
        PanelController {
            display: LightDisplay::default(),
            connection: ConnectionState::Connecting,
            commands,
        }
    }

    pub fn display(&self) -> &LightDisplay {
        &self.display
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    /// Relays an operator command: the local display update always happens
    /// first and unconditionally, transmission is best-effort on top of it.
    pub fn send_command(&mut self, command: Command) {
        self.display.apply_command(command);

        if self.connection != ConnectionState::Connected {
            warn!(?command, "not connected, updating local display only");
            return;
        }

        let message = CommandMessage::new(command);
        match self.commands.try_send(message) {
            Ok(()) => debug!(?command, "command handed to mqtt link"),
            // The display already shows the intent; losing the transmission
            // is logged, never rolled back.
            Err(e) => warn!(error = %e, ?command, "failed to hand command to mqtt link"),
        }
    }

    pub fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Connecting => {
                self.connection = ConnectionState::Connecting;
            }
            LinkEvent::Connected => {
                info!("link established");
                self.connection = ConnectionState::Connected;
            }
            LinkEvent::ConnectFailed(reason) => {
                self.connection = ConnectionState::Disconnected(Some(reason));
            }
            LinkEvent::ConnectionLost(reason) => {
                warn!(%reason, "link dropped");
                self.connection = ConnectionState::Disconnected(None);
            }
            LinkEvent::Status(payload) => self.handle_status(&payload),
        }
    }

    /// Applies a status report from the device; a payload that does not parse
    /// is logged and discarded without touching the display.
    fn handle_status(&mut self, payload: &[u8]) {
        let report: StatusReport = match serde_json::from_slice(payload) {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "discarding unparsable status payload");
                return;
            }
        };

        if let Some(status) = report.status {
            self.display.apply_status(&status);
            debug!(?status, "display updated from device status");
        }
    }
}
