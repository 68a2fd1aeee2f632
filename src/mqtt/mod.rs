//! # MQTT Integration Module
//!
//! Connects the panel to the traffic-light device through a public broker
//! over MQTT-on-WebSocket. The panel publishes operator commands on one fixed
//! topic and mirrors the device's reported lamp state from another.
//!
//! ## Module Architecture
//!
//! ```text
//! mqtt/
//! ├── config.rs  - broker endpoint, topics, and timing constants
//! ├── message.rs - command envelope and status report wire types
//! └── link.rs    - connection actor, retry policy, Messaging capability
//! ```
//!
//! ## Connection Lifecycle
//!
//! The link actor owns the whole session lifecycle: connect with a clean
//! session and a per-process random client id, subscribe to the status topic
//! once per established session, pump commands out and status payloads in,
//! and retry exactly once per ended attempt after a fixed delay. Everything
//! the panel sees arrives as a [`link::LinkEvent`] on a channel, so the UI
//! never touches the client directly and tests can drive the actor with a
//! fake [`link::Messaging`] adapter.

pub mod config;
pub mod link;
pub mod message;
