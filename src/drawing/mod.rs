//! Free-hand drawing layer on top of the canvas.
//!
//! Strokes are polylines of canvas-space points with an RGB colour; they
//! pan and zoom with the canvas. Committed strokes live oldest-first in
//! [`DrawingLayer::strokes`]; undone strokes are pushed onto the tail of
//! [`DrawingLayer::redo_stack`] so undo/redo is LIFO.

pub mod ui;

use log::{debug, info};

/// Minimum distance between consecutive points, in canvas units. Keeps
/// the point count bounded irrespective of the input device sample rate.
pub const MIN_POINT_DISTANCE: f64 = 2.0;

/// Stroke line width in canvas units.
pub const STROKE_WIDTH: f64 = 4.0;

/// Stroke colour. Equality is approximate (`|delta| < 0.01` per channel)
/// so palette comparisons survive float round-trips.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

pub const RED: Color = Color { r: 1.0, g: 0.2, b: 0.2 };
pub const GREEN: Color = Color { r: 0.2, g: 1.0, b: 0.2 };
pub const BLUE: Color = Color { r: 0.2, g: 0.5, b: 1.0 };

/// The fixed palette, in panel order.
pub const PALETTE: [Color; 3] = [RED, GREEN, BLUE];

impl Color {
    pub fn approx_eq(self, other: Color) -> bool {
        (self.r - other.r).abs() < 0.01
            && (self.g - other.g).abs() < 0.01
            && (self.b - other.b).abs() < 0.01
    }
}

/// An ordered sequence of canvas-space points with a colour. Committed
/// strokes always have at least two points.
#[derive(Debug, Clone)]
pub struct Stroke {
    pub points: Vec<(f64, f64)>,
    pub color: Color,
}

/// State of the drawing layer.
#[derive(Debug)]
pub struct DrawingLayer {
    /// Whether drawing mode is active (toggled by keybind).
    pub drawing_mode: bool,
    current: Option<Stroke>,
    last_point: (f64, f64),
    /// Committed strokes, oldest first.
    pub strokes: Vec<Stroke>,
    /// Undone strokes; the tail is the most recently undone.
    pub redo_stack: Vec<Stroke>,
    pub current_color: Color,
    pub panel: ui::Panel,
}

impl Default for DrawingLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawingLayer {
    pub fn new() -> Self {
        Self {
            drawing_mode: false,
            current: None,
            last_point: (0.0, 0.0),
            strokes: Vec::new(),
            redo_stack: Vec::new(),
            current_color: RED,
            panel: ui::Panel::new(),
        }
    }

    pub fn toggle_mode(&mut self) {
        self.drawing_mode = !self.drawing_mode;

        // Disabling mid-stroke force-ends the stroke.
        if !self.drawing_mode && self.is_drawing() {
            self.stroke_end();
        }

        info!(
            "drawing mode {}",
            if self.drawing_mode { "enabled" } else { "disabled" }
        );
    }

    pub fn is_drawing(&self) -> bool {
        self.current.is_some()
    }

    /// The stroke currently being drawn, if any.
    pub fn current_stroke(&self) -> Option<&Stroke> {
        self.current.as_ref()
    }

    pub fn stroke_begin(&mut self, canvas_x: f64, canvas_y: f64) {
        if !self.drawing_mode {
            return;
        }

        self.current = Some(Stroke {
            points: vec![(canvas_x, canvas_y)],
            color: self.current_color,
        });
        self.last_point = (canvas_x, canvas_y);
        debug!("started stroke at ({canvas_x:.2}, {canvas_y:.2})");
    }

    pub fn stroke_add_point(&mut self, canvas_x: f64, canvas_y: f64) {
        let Some(stroke) = self.current.as_mut() else {
            return;
        };

        let dx = canvas_x - self.last_point.0;
        let dy = canvas_y - self.last_point.1;
        if (dx * dx + dy * dy).sqrt() < MIN_POINT_DISTANCE {
            return;
        }

        stroke.points.push((canvas_x, canvas_y));
        self.last_point = (canvas_x, canvas_y);
    }

    /// Commits the in-progress stroke, discarding it if it never grew past
    /// a single point. Committing clears the redo stack.
    pub fn stroke_end(&mut self) {
        let Some(stroke) = self.current.take() else {
            return;
        };

        if stroke.points.len() < 2 {
            debug!("stroke too short, discarding");
            return;
        }

        debug!("finished stroke with {} points", stroke.points.len());
        self.strokes.push(stroke);
        self.redo_stack.clear();
    }

    /// Undoes the in-progress stroke if one exists (discarded outright),
    /// otherwise moves the newest committed stroke onto the redo stack.
    pub fn undo_last(&mut self) {
        if self.current.take().is_some() {
            info!("undid current stroke");
            return;
        }

        match self.strokes.pop() {
            Some(stroke) => {
                self.redo_stack.push(stroke);
                info!("undid last stroke");
            }
            None => debug!("no strokes to undo"),
        }
    }

    pub fn redo_last(&mut self) {
        match self.redo_stack.pop() {
            Some(stroke) => {
                self.strokes.push(stroke);
                info!("redid stroke");
            }
            None => debug!("no strokes to redo"),
        }
    }

    pub fn clear_all(&mut self) {
        self.strokes.clear();
        self.redo_stack.clear();
        self.current = None;
        info!("all drawings cleared");
    }

    /// Dispatches a click on one of the panel buttons.
    pub fn handle_panel_click(&mut self, button: ui::Button) {
        match button {
            ui::Button::ColorRed => self.current_color = RED,
            ui::Button::ColorGreen => self.current_color = GREEN,
            ui::Button::ColorBlue => self.current_color = BLUE,
            ui::Button::Undo => self.undo_last(),
            ui::Button::Redo => self.redo_last(),
            ui::Button::Clear => self.clear_all(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer() -> DrawingLayer {
        let mut layer = DrawingLayer::new();
        layer.drawing_mode = true;
        layer
    }

    fn commit_line(layer: &mut DrawingLayer, y: f64) {
        layer.stroke_begin(0.0, y);
        layer.stroke_add_point(10.0, y);
        layer.stroke_end();
    }

    #[test]
    fn begin_is_noop_outside_drawing_mode() {
        let mut layer = DrawingLayer::new();
        layer.stroke_begin(0.0, 0.0);
        assert!(!layer.is_drawing());
    }

    #[test]
    fn distance_filter_drops_close_points() {
        let mut layer = layer();
        layer.stroke_begin(0.0, 0.0);
        layer.stroke_add_point(1.0, 0.0); // < 2.0 from (0,0): filtered
        layer.stroke_add_point(3.0, 0.0); // >= 2.0 from (0,0): kept
        layer.stroke_end();

        assert_eq!(layer.strokes.len(), 1);
        assert_eq!(layer.strokes[0].points, vec![(0.0, 0.0), (3.0, 0.0)]);
    }

    #[test]
    fn short_stroke_is_discarded() {
        let mut layer = layer();
        layer.stroke_begin(0.0, 0.0);
        layer.stroke_add_point(1.0, 1.0); // filtered, stroke stays at 1 point
        layer.stroke_end();

        assert!(layer.strokes.is_empty());
        assert!(layer.redo_stack.is_empty());
    }

    #[test]
    fn undo_redo_round_trip() {
        let mut layer = layer();
        commit_line(&mut layer, 0.0); // A
        commit_line(&mut layer, 1.0); // B
        commit_line(&mut layer, 2.0); // C

        layer.undo_last();
        layer.undo_last();
        layer.redo_last();

        assert_eq!(layer.strokes.len(), 2);
        assert_eq!(layer.strokes[0].points[0].1, 0.0);
        assert_eq!(layer.strokes[1].points[0].1, 1.0);
        assert_eq!(layer.redo_stack.len(), 1);
        assert_eq!(layer.redo_stack[0].points[0].1, 2.0);

        // A new commit clears the redo stack.
        commit_line(&mut layer, 3.0); // D
        assert!(layer.redo_stack.is_empty());
        let order: Vec<f64> = layer.strokes.iter().map(|s| s.points[0].1).collect();
        assert_eq!(order, vec![0.0, 1.0, 3.0]);
    }

    #[test]
    fn undo_discards_in_progress_stroke_without_redo() {
        let mut layer = layer();
        layer.stroke_begin(0.0, 0.0);
        layer.stroke_add_point(5.0, 0.0);
        layer.undo_last();

        assert!(!layer.is_drawing());
        assert!(layer.strokes.is_empty());
        assert!(layer.redo_stack.is_empty());
    }

    #[test]
    fn redo_stack_is_lifo() {
        let mut layer = layer();
        commit_line(&mut layer, 0.0);
        commit_line(&mut layer, 1.0);

        layer.undo_last(); // pushes stroke B
        layer.undo_last(); // pushes stroke A
        assert_eq!(layer.redo_stack[0].points[0].1, 1.0);
        assert_eq!(layer.redo_stack[1].points[0].1, 0.0);

        layer.redo_last(); // pops A back first
        assert_eq!(layer.strokes[0].points[0].1, 0.0);
    }

    #[test]
    fn toggle_off_commits_in_progress_stroke() {
        let mut layer = layer();
        layer.stroke_begin(0.0, 0.0);
        layer.stroke_add_point(10.0, 0.0);
        layer.toggle_mode();

        assert!(!layer.drawing_mode);
        assert!(!layer.is_drawing());
        assert_eq!(layer.strokes.len(), 1);
    }

    #[test]
    fn clear_drops_everything() {
        let mut layer = layer();
        commit_line(&mut layer, 0.0);
        layer.undo_last();
        layer.clear_all();
        assert!(layer.strokes.is_empty());
        assert!(layer.redo_stack.is_empty());
    }

    #[test]
    fn stroke_uses_selected_color() {
        let mut layer = layer();
        layer.handle_panel_click(ui::Button::ColorBlue);
        commit_line(&mut layer, 0.0);
        assert!(layer.strokes[0].color.approx_eq(BLUE));
    }
}
