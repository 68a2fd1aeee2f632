use crate::mqtt::message::{Command, LampStatus};

/// Idle glow of a lamp that is off; mirrors the physical device, which keeps
/// its lamps faintly visible instead of fully dark.
pub const DIM: f32 = 0.3;
pub const FULL: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lamp {
    Red,
    Yellow,
    Green,
}

/// Visual intensity of the three lamps.
///
/// Each lamp is either [`DIM`] or [`FULL`]; the display always holds exactly
/// the set of currently-on lamps and nothing else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightDisplay {
    red: f32,
    yellow: f32,
    green: f32,
}

impl Default for LightDisplay {
    fn default() -> Self {
        LightDisplay {
            red: DIM,
            yellow: DIM,
            green: DIM,
        }
    }
}

impl LightDisplay {
    pub fn intensity(&self, lamp: Lamp) -> f32 {
        match lamp {
            Lamp::Red => self.red,
            Lamp::Yellow => self.yellow,
            Lamp::Green => self.green,
        }
    }

    fn reset(&mut self) {
        *self = LightDisplay::default();
    }

    /// Optimistic local rendering of an operator command.
    ///
    /// Off keeps every lamp dim; Automatic does too, because the device will
    /// report its actual cycling state over the status topic.
    pub fn apply_command(&mut self, command: Command) {
        self.reset();
        match command {
            Command::Red => self.red = FULL,
            Command::Yellow => self.yellow = FULL,
            Command::Green => self.green = FULL,
            Command::Automatic | Command::Off => {}
        }
    }

    /// Overwrites the display with what the device reports. The three fields
    /// are independent; the device may assert several lamps at once.
    pub fn apply_status(&mut self, status: &LampStatus) {
        self.reset();
        if status.red {
            self.red = FULL;
        }
        if status.yellow {
            self.yellow = FULL;
        }
        if status.green {
            self.green = FULL;
        }
    }
}
