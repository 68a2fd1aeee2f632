//! # Panel User Interface
//!
//! Immediate-mode UI for the traffic light panel. Each frame drains pending
//! link events into the controller, renders the connection banner at the top,
//! the three lamps in their housing, and one button per operator command.
//!
//! The UI holds no domain state of its own: the lamp intensities and the
//! banner text are read straight from the [`PanelController`], which is also
//! where button clicks are delivered. Backend communication stays entirely
//! channel-based and non-blocking, so a frame never waits on the network.

use egui::{Button, Color32, Frame, Sense, Stroke, Vec2};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::mqtt::link::LinkEvent;
use crate::mqtt::message::Command;
use crate::panel::{ConnectionState, Lamp, PanelController};

const LAMP_DIAMETER: f32 = 72.0;
const BUTTON_HEIGHT: f32 = 28.0;

/// Centralized dark-theme palette for the panel.
pub struct PanelColors;

impl PanelColors {
    /// Lamp housing fill (RGB: 20, 20, 20)
    pub const HOUSING: Color32 = Color32::from_rgb(20, 20, 20);

    /// Border color for the housing frame (RGB: 60, 60, 60)
    pub const BORDER: Color32 = Color32::from_rgb(60, 60, 60);

    /// Connected indicator - green
    pub const ACTIVE: Color32 = Color32::from_rgb(50, 200, 20);

    /// Disconnected indicator - red
    pub const INACTIVE: Color32 = Color32::from_rgb(200, 50, 20);

    /// Connecting indicator - amber
    pub const PENDING: Color32 = Color32::from_rgb(220, 180, 40);

    pub const RED_LAMP: Color32 = Color32::from_rgb(230, 40, 30);
    pub const YELLOW_LAMP: Color32 = Color32::from_rgb(240, 200, 30);
    pub const GREEN_LAMP: Color32 = Color32::from_rgb(40, 200, 60);
}

pub struct PanelUi {
    controller: PanelController,
    link_events: mpsc::Receiver<LinkEvent>,
}

impl PanelUi {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        controller: PanelController,
        link_events: mpsc::Receiver<LinkEvent>,
    ) -> Self {
        cc.egui_ctx.set_theme(egui::Theme::Dark);
        PanelUi {
            controller,
            link_events,
        }
    }

    /// Applies pending link events without blocking the frame.
    fn drain_link_events(&mut self) {
        while let Ok(event) = self.link_events.try_recv() {
            self.controller.handle_link_event(event);
        }
    }

    fn banner(&self, ui: &mut egui::Ui) {
        let dot = match self.controller.connection() {
            ConnectionState::Connected => PanelColors::ACTIVE,
            ConnectionState::Connecting => PanelColors::PENDING,
            ConnectionState::Disconnected(_) => PanelColors::INACTIVE,
        };
        ui.horizontal(|ui| {
            ui.colored_label(dot, "●");
            ui.label(self.controller.connection().to_string());
        });
    }

    fn lamp_color(lamp: Lamp) -> Color32 {
        match lamp {
            Lamp::Red => PanelColors::RED_LAMP,
            Lamp::Yellow => PanelColors::YELLOW_LAMP,
            Lamp::Green => PanelColors::GREEN_LAMP,
        }
    }

    fn lamp(ui: &mut egui::Ui, color: Color32, intensity: f32) {
        let (rect, _response) =
            ui.allocate_exact_size(Vec2::splat(LAMP_DIAMETER), Sense::hover());
        ui.painter().circle_filled(
            rect.center(),
            LAMP_DIAMETER / 2.0 - 4.0,
            color.gamma_multiply(intensity),
        );
    }
}

impl eframe::App for PanelUi {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_link_events();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.ctx().request_repaint_after(Duration::from_millis(33));

            egui::TopBottomPanel::top("connection_banner")
                .show_separator_line(false)
                .show_inside(ui, |ui| self.banner(ui));

            ui.vertical_centered(|ui| {
                Frame::new()
                    .stroke(Stroke::new(1.0, PanelColors::BORDER))
                    .fill(PanelColors::HOUSING)
                    .inner_margin(12)
                    .outer_margin(8)
                    .show(ui, |ui| {
                        for lamp in [Lamp::Red, Lamp::Yellow, Lamp::Green] {
                            Self::lamp(
                                ui,
                                Self::lamp_color(lamp),
                                self.controller.display().intensity(lamp),
                            );
                        }
                    });

                ui.add_space(12.0);

                let width = (ui.available_width() - 60.0) / Command::ALL.len() as f32;
                ui.horizontal(|ui| {
                    for command in Command::ALL {
                        let button = Button::new(command.label()).min_size(Vec2 {
                            x: width,
                            y: BUTTON_HEIGHT,
                        });
                        if ui.add(button).clicked() {
                            self.controller.send_command(command);
                        }
                    }
                });
            });
        });
    }
}
