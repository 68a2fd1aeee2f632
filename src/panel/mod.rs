//! Panel-side state: lamp display plus the controller that wires operator
//! intent and link events together.

pub mod controller;
pub mod display;

pub use controller::{ConnectionState, PanelController};
pub use display::Lamp;
