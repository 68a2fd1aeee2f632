use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin tag stamped on every command envelope so the device can tell panel
/// commands apart from other publishers on the topic.
pub const COMMAND_SOURCE: &str = "web";

/// Operator intent, one per button on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Red,
    Yellow,
    Green,
    Automatic,
    Off,
}

impl Command {
    pub const ALL: [Command; 5] = [
        Command::Red,
        Command::Yellow,
        Command::Green,
        Command::Automatic,
        Command::Off,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Command::Red => "Red",
            Command::Yellow => "Yellow",
            Command::Green => "Green",
            Command::Automatic => "Automatic",
            Command::Off => "Off",
        }
    }
}

/// Envelope published on the command topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub command: Command,
    pub timestamp: DateTime<Utc>,
    pub source: String,
}

impl CommandMessage {
    pub fn new(command: Command) -> Self {
        CommandMessage {
            command,
            timestamp: Utc::now(),
            source: COMMAND_SOURCE.to_string(),
        }
    }
}

/// Report published by the device on the status topic.
///
/// A payload without a `status` field parses fine and means "nothing to
/// apply"; inside `status` the three lamps are independent booleans, absent
/// fields read as off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StatusReport {
    #[serde(default)]
    pub status: Option<LampStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct LampStatus {
    #[serde(default)]
    pub red: bool,
    #[serde(default)]
    pub yellow: bool,
    #[serde(default)]
    pub green: bool,
}
