//! Color constants for the terminal user interface.

use ratatui::style::Color;

use crate::fields::Quadrant;

/// Set in Motion
pub const AMBER: Color = Color::Rgb(255, 170, 0);
/// Marinate
pub const DARK_PURPLE: Color = Color::Rgb(86, 60, 92);
/// Deep Work
pub const NAVY: Color = Color::Rgb(30, 60, 140);
/// Quick Wins
pub const DARK_GREEN: Color = Color::Rgb(0, 80, 0);

/// A grabbed card, wherever it is drawn.
pub const GRABBED: Color = Color::Rgb(255, 215, 0);

pub fn quadrant_color(quadrant: Quadrant) -> Color {
    match quadrant {
        Quadrant::Triggers => AMBER,
        Quadrant::Marinate => DARK_PURPLE,
        Quadrant::Deepwork => NAVY,
        Quadrant::Quickwins => DARK_GREEN,
    }
}

/// Readable text on top of a quadrant's color.
pub fn text_on(color: Color) -> Color {
    match color {
        AMBER | GRABBED => Color::Rgb(20, 20, 20),
        _ => Color::White,
    }
}
