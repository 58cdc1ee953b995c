//! Floating button panel for the drawing layer.
//!
//! A static vertical column on the left edge of the output: three colour
//! swatches, a visual separator, then undo / redo / clear. Geometry is in
//! logical pixels; [`paint_ops`] scales to physical pixels for the
//! renderer. Everything here is plain rectangle math so it can be tested
//! without a backend.

use smithay::utils::{Physical, Rectangle};

use super::{Color, DrawingLayer, PALETTE};

pub const PANEL_X: i32 = 20;
pub const BUTTON_WIDTH: i32 = 50;
pub const BUTTON_HEIGHT: i32 = 50;
pub const BUTTON_SPACING: i32 = 10;
pub const PANEL_PADDING: i32 = 10;
pub const SEPARATOR_HEIGHT: i32 = 20;

const BG_COLOR: [f32; 4] = [0.15, 0.15, 0.15, 0.9];
const BUTTON_NORMAL: [f32; 4] = [0.25, 0.25, 0.25, 1.0];
const BUTTON_HOVER: [f32; 4] = [0.35, 0.35, 0.35, 1.0];
const BUTTON_SELECTED: [f32; 4] = [0.45, 0.45, 0.45, 1.0];
const ICON_COLOR: [f32; 4] = [0.9, 0.9, 0.9, 1.0];

/// The six panel buttons, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    ColorRed,
    ColorGreen,
    ColorBlue,
    Undo,
    Redo,
    Clear,
}

const BUTTONS: [Button; 6] = [
    Button::ColorRed,
    Button::ColorGreen,
    Button::ColorBlue,
    Button::Undo,
    Button::Redo,
    Button::Clear,
];

/// Panel placement plus hover/press state.
#[derive(Debug)]
pub struct Panel {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub hovered: Option<Button>,
    pub pressed: Option<Button>,
}

impl Default for Panel {
    fn default() -> Self {
        Self::new()
    }
}

impl Panel {
    pub fn new() -> Self {
        let height = PANEL_PADDING * 2
            + BUTTON_HEIGHT * BUTTONS.len() as i32
            + BUTTON_SPACING * (BUTTONS.len() as i32 - 1)
            + SEPARATOR_HEIGHT;
        Self {
            x: PANEL_X,
            y: 0,
            width: BUTTON_WIDTH + 2 * PANEL_PADDING,
            height,
            hovered: None,
            pressed: None,
        }
    }

    /// Centres the panel vertically for the given output height (logical).
    pub fn reposition(&mut self, output_height: i32) {
        self.y = (output_height - self.height) / 2;
    }

    /// Logical y of the button at `index`, accounting for the separator
    /// between the colour swatches and the action buttons.
    fn button_y(&self, index: usize) -> i32 {
        let mut y = self.y + PANEL_PADDING;
        if index < 3 {
            y += index as i32 * (BUTTON_HEIGHT + BUTTON_SPACING);
        } else {
            y += 3 * (BUTTON_HEIGHT + BUTTON_SPACING);
            y += SEPARATOR_HEIGHT;
            y += (index as i32 - 3) * (BUTTON_HEIGHT + BUTTON_SPACING);
        }
        y
    }

    /// Resolves a logical cursor position to a button.
    pub fn button_at(&self, x: f64, y: f64) -> Option<Button> {
        if x < self.x as f64
            || x >= (self.x + self.width) as f64
            || y < self.y as f64
            || y >= (self.y + self.height) as f64
        {
            return None;
        }

        let button_x = self.x + PANEL_PADDING;
        let relative_x = x as i32 - button_x;
        if relative_x < 0 || relative_x >= BUTTON_WIDTH {
            return None;
        }

        for (index, button) in BUTTONS.iter().enumerate() {
            let button_y = self.button_y(index);
            if (y as i32) >= button_y && (y as i32) < button_y + BUTTON_HEIGHT {
                return Some(*button);
            }
        }
        None
    }

    pub fn update_hover(&mut self, x: f64, y: f64) {
        self.hovered = self.button_at(x, y);
    }
}

/// A filled rectangle in physical pixels, ready for the render pass.
#[derive(Debug, Clone, Copy)]
pub struct PaintRect {
    pub rect: Rectangle<i32, Physical>,
    pub color: [f32; 4],
}

fn rect(x: i32, y: i32, w: i32, h: i32) -> Rectangle<i32, Physical> {
    Rectangle::new((x, y).into(), (w, h).into())
}

fn scaled(v: i32, scale: f64) -> i32 {
    (v as f64 * scale) as i32
}

/// Generates the panel's paint list for one frame, scaled to physical
/// pixels. Ordering is back to front.
pub fn paint_ops(drawing: &DrawingLayer, output_scale: f64) -> Vec<PaintRect> {
    let panel = &drawing.panel;
    let s = output_scale;
    let mut ops = Vec::new();

    ops.push(PaintRect {
        rect: rect(
            scaled(panel.x, s),
            scaled(panel.y, s),
            scaled(panel.width, s),
            scaled(panel.height, s),
        ),
        color: BG_COLOR,
    });

    let button_x = scaled(panel.x + PANEL_PADDING, s);
    let button_w = scaled(BUTTON_WIDTH, s);
    let button_h = scaled(BUTTON_HEIGHT, s);

    for (index, button) in BUTTONS.iter().enumerate() {
        let y = scaled(panel.button_y(index), s);
        let hovered = panel.hovered == Some(*button);
        let pressed = panel.pressed == Some(*button);

        match *button {
            Button::ColorRed | Button::ColorGreen | Button::ColorBlue => {
                let color = PALETTE[index];
                let selected = drawing.current_color.approx_eq(color);
                ops.push(PaintRect {
                    rect: rect(button_x, y, button_w, button_h),
                    color: button_background(selected, hovered, pressed),
                });
                ops.push(swatch(button_x, y, button_w, button_h, color, s));
            }
            Button::Undo => {
                ops.push(PaintRect {
                    rect: rect(button_x, y, button_w, button_h),
                    color: button_background(false, hovered, pressed),
                });
                undo_icon(&mut ops, button_x, y, s);
            }
            Button::Redo => {
                ops.push(PaintRect {
                    rect: rect(button_x, y, button_w, button_h),
                    color: button_background(false, hovered, pressed),
                });
                redo_icon(&mut ops, button_x, y, s);
            }
            Button::Clear => {
                ops.push(PaintRect {
                    rect: rect(button_x, y, button_w, button_h),
                    color: button_background(false, hovered, pressed),
                });
                clear_icon(&mut ops, button_x, y, s);
            }
        }
    }

    ops
}

fn button_background(selected: bool, hovered: bool, pressed: bool) -> [f32; 4] {
    if pressed {
        [0.15, 0.15, 0.15, 1.0]
    } else if selected {
        BUTTON_SELECTED
    } else if hovered {
        BUTTON_HOVER
    } else {
        BUTTON_NORMAL
    }
}

/// Colour swatch centred inside a button.
fn swatch(x: i32, y: i32, w: i32, h: i32, color: Color, scale: f64) -> PaintRect {
    let inset = scaled(8, scale);
    let size = w - 2 * inset;
    PaintRect {
        rect: rect(x + (w - size) / 2, y + (h - size) / 2, size, size),
        color: [color.r, color.g, color.b, 1.0],
    }
}

/// Left-pointing triangle built from vertical slivers.
fn undo_icon(ops: &mut Vec<PaintRect>, x: i32, y: i32, scale: f64) {
    let center_x = x + scaled(BUTTON_WIDTH, scale) / 2;
    let center_y = y + scaled(BUTTON_HEIGHT, scale) / 2;
    let size = scaled(12, scale).max(2);
    let line_w = scaled(2, scale).max(1);

    for i in 0..size {
        ops.push(PaintRect {
            rect: rect(
                center_x - scaled(6, scale) + i,
                center_y - i,
                line_w,
                i * 2 + 1,
            ),
            color: ICON_COLOR,
        });
    }
}

/// Right-pointing triangle.
fn redo_icon(ops: &mut Vec<PaintRect>, x: i32, y: i32, scale: f64) {
    let center_x = x + scaled(BUTTON_WIDTH, scale) / 2;
    let center_y = y + scaled(BUTTON_HEIGHT, scale) / 2;
    let size = scaled(12, scale).max(2);
    let line_w = scaled(2, scale).max(1);

    for i in 0..size {
        ops.push(PaintRect {
            rect: rect(center_x + scaled(6, scale) - i, center_y - i, line_w, i * 2 + 1),
            color: ICON_COLOR,
        });
    }
}

/// X shape from two dotted diagonals.
fn clear_icon(ops: &mut Vec<PaintRect>, x: i32, y: i32, scale: f64) {
    let center_x = x + scaled(BUTTON_WIDTH, scale) / 2;
    let center_y = y + scaled(BUTTON_HEIGHT, scale) / 2;
    let size = scaled(16, scale).max(2);
    let dot = scaled(3, scale).max(1);

    for i in 0..size {
        ops.push(PaintRect {
            rect: rect(center_x - size / 2 + i, center_y - size / 2 + i, dot, dot),
            color: ICON_COLOR,
        });
        ops.push(PaintRect {
            rect: rect(center_x + size / 2 - i, center_y - size / 2 + i, dot, dot),
            color: ICON_COLOR,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing::{BLUE, RED};

    fn panel() -> Panel {
        let mut panel = Panel::new();
        panel.reposition(1000);
        panel
    }

    #[test]
    fn panel_is_centred_vertically() {
        let panel = panel();
        assert_eq!(panel.height, 390);
        assert_eq!(panel.y, (1000 - 390) / 2);
        assert_eq!(panel.width, 70);
    }

    #[test]
    fn button_at_hits_each_button() {
        let panel = panel();
        let x = (panel.x + PANEL_PADDING + BUTTON_WIDTH / 2) as f64;

        let expected = [
            Button::ColorRed,
            Button::ColorGreen,
            Button::ColorBlue,
            Button::Undo,
            Button::Redo,
            Button::Clear,
        ];
        for (index, button) in expected.iter().enumerate() {
            let y = (panel.button_y(index) + BUTTON_HEIGHT / 2) as f64;
            assert_eq!(panel.button_at(x, y), Some(*button));
        }
    }

    #[test]
    fn button_at_misses_padding_and_separator() {
        let panel = panel();
        let x = (panel.x + PANEL_PADDING + 10) as f64;

        // Inside the panel but left of the button column.
        assert_eq!(panel.button_at((panel.x + 2) as f64, (panel.y + 20) as f64), None);
        // In the separator between swatches and actions.
        let separator_y = panel.button_y(2) + BUTTON_HEIGHT + BUTTON_SPACING + 2;
        assert_eq!(panel.button_at(x, separator_y as f64), None);
        // Outside the panel entirely.
        assert_eq!(panel.button_at(500.0, 500.0), None);
    }

    #[test]
    fn paint_ops_mark_selected_swatch() {
        let mut drawing = DrawingLayer::new();
        drawing.panel.reposition(1000);

        let ops_red = paint_ops(&drawing, 1.0);
        drawing.current_color = BLUE;
        let ops_blue = paint_ops(&drawing, 1.0);

        // Same op count, but the highlighted button background moved.
        assert_eq!(ops_red.len(), ops_blue.len());
        assert!(drawing.current_color.approx_eq(BLUE));
        assert!(!drawing.current_color.approx_eq(RED));
        assert_ne!(ops_red[1].color, ops_blue[1].color);
    }

    #[test]
    fn paint_ops_scale_to_physical() {
        let mut drawing = DrawingLayer::new();
        drawing.panel.reposition(1000);

        let ops = paint_ops(&drawing, 2.0);
        assert_eq!(ops[0].rect.loc.x, PANEL_X * 2);
        assert_eq!(ops[0].rect.size.w, (BUTTON_WIDTH + 2 * PANEL_PADDING) * 2);
    }
}
