//! Infinite canvas coordinate system and viewport management.
//!
//! Windows live at positions on an unbounded plane; the viewport is the
//! rectangular region of that plane currently visible on the output. Two
//! coordinate spaces are involved:
//!
//! - *canvas* coordinates: real-valued positions on the plane,
//! - *screen* coordinates: logical pixels on the output.
//!
//! The mapping is `screen = (canvas - viewport) * scale` and its inverse
//! `canvas = screen / scale + viewport`.

use log::debug;

use crate::util::{ease_out_cubic, lerp};

/// Minimum zoom level.
pub const ZOOM_MIN: f64 = 0.1;
/// Maximum zoom level.
pub const ZOOM_MAX: f64 = 4.0;

/// Duration of the viewport snap animation.
pub const SNAP_DURATION_MS: u32 = 800;

#[derive(Debug, Clone, Copy)]
struct PanGrab {
    start_cursor: (f64, f64),
    start_viewport: (f64, f64),
}

#[derive(Debug, Clone, Copy)]
struct Snap {
    start_ms: u32,
    from: (f64, f64),
    to: (f64, f64),
}

/// Pan/zoom state of the infinite canvas.
#[derive(Debug)]
pub struct Canvas {
    /// Canvas-space position of the viewport's top-left corner.
    pub viewport_x: f64,
    pub viewport_y: f64,
    scale: f64,
    pan: Option<PanGrab>,
    snap: Option<Snap>,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            viewport_x: 0.0,
            viewport_y: 0.0,
            scale: 1.0,
            pan: None,
            snap: None,
        }
    }

    /// Current zoom level, always within `[ZOOM_MIN, ZOOM_MAX]`.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn canvas_to_screen(&self, canvas_x: f64, canvas_y: f64) -> (f64, f64) {
        (
            (canvas_x - self.viewport_x) * self.scale,
            (canvas_y - self.viewport_y) * self.scale,
        )
    }

    pub fn screen_to_canvas(&self, screen_x: f64, screen_y: f64) -> (f64, f64) {
        (
            screen_x / self.scale + self.viewport_x,
            screen_y / self.scale + self.viewport_y,
        )
    }

    /// Begins a continuous drag pan at the given cursor position (screen px).
    pub fn pan_begin(&mut self, cursor_x: f64, cursor_y: f64) {
        self.pan = Some(PanGrab {
            start_cursor: (cursor_x, cursor_y),
            start_viewport: (self.viewport_x, self.viewport_y),
        });
        debug!(
            "pan started at cursor ({cursor_x:.1}, {cursor_y:.1}), viewport ({:.1}, {:.1})",
            self.viewport_x, self.viewport_y
        );
    }

    /// Updates an active drag pan. Dragging moves the canvas with the
    /// cursor, so the viewport moves in the opposite direction.
    pub fn pan_update(&mut self, cursor_x: f64, cursor_y: f64) {
        let Some(grab) = self.pan else {
            return;
        };

        let delta_x = cursor_x - grab.start_cursor.0;
        let delta_y = cursor_y - grab.start_cursor.1;

        self.viewport_x = grab.start_viewport.0 - delta_x / self.scale;
        self.viewport_y = grab.start_viewport.1 - delta_y / self.scale;
    }

    pub fn pan_end(&mut self) {
        if self.pan.take().is_some() {
            debug!(
                "pan ended at viewport ({:.1}, {:.1})",
                self.viewport_x, self.viewport_y
            );
        }
    }

    pub fn is_panning(&self) -> bool {
        self.pan.is_some()
    }

    /// Discrete pan by a screen-space delta (scroll-wheel gesture).
    pub fn pan_delta(&mut self, delta_x: f64, delta_y: f64) {
        self.viewport_x -= delta_x / self.scale;
        self.viewport_y -= delta_y / self.scale;
    }

    /// Zooms by `factor` while keeping the canvas point under
    /// `(focus_x, focus_y)` (screen px) fixed on screen.
    pub fn zoom(&mut self, factor: f64, focus_x: f64, focus_y: f64) {
        let new_scale = (self.scale * factor).clamp(ZOOM_MIN, ZOOM_MAX);
        if new_scale == self.scale {
            return;
        }

        // Canvas position under the focus point before the scale change.
        let (canvas_focus_x, canvas_focus_y) = self.screen_to_canvas(focus_x, focus_y);

        self.scale = new_scale;

        // After the change: focus = (canvas_focus - viewport) * scale,
        // so viewport = canvas_focus - focus / scale keeps it fixed.
        self.viewport_x = canvas_focus_x - focus_x / self.scale;
        self.viewport_y = canvas_focus_y - focus_y / self.scale;

        debug!(
            "zoomed to scale {:.2}, viewport ({:.1}, {:.1})",
            self.scale, self.viewport_x, self.viewport_y
        );
    }

    /// Sets an absolute scale, expressed through the zoom-around-focus law.
    pub fn set_scale(&mut self, scale: f64, focus_x: f64, focus_y: f64) {
        let factor = scale / self.scale;
        self.zoom(factor, focus_x, focus_y);
    }

    /// Canvas-space point at the centre of the viewport for an output of
    /// the given logical resolution. Used when positioning new windows.
    pub fn viewport_centre(&self, output_width: i32, output_height: i32) -> (f64, f64) {
        self.screen_to_canvas(output_width as f64 / 2.0, output_height as f64 / 2.0)
    }

    /// Starts (or retargets) the viewport snap animation.
    pub fn snap_begin(&mut self, target_x: f64, target_y: f64, now_ms: u32) {
        self.snap = Some(Snap {
            start_ms: now_ms,
            from: (self.viewport_x, self.viewport_y),
            to: (target_x, target_y),
        });
    }

    pub fn snap_active(&self) -> bool {
        self.snap.is_some()
    }

    /// Advances the snap animation. Eases out over [`SNAP_DURATION_MS`];
    /// the final tick lands exactly on the target and clears the state.
    pub fn snap_tick(&mut self, now_ms: u32) {
        let Some(snap) = self.snap else {
            return;
        };

        let elapsed = now_ms.wrapping_sub(snap.start_ms);
        let t = (elapsed as f64 / SNAP_DURATION_MS as f64).clamp(0.0, 1.0);
        let eased = ease_out_cubic(t);

        self.viewport_x = lerp(snap.from.0, snap.to.0, eased);
        self.viewport_y = lerp(snap.from.1, snap.to.1, eased);

        if t >= 1.0 {
            self.snap = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) {
        let tol = 1e-9 * a.abs().max(1.0);
        assert!((a - b).abs() <= tol, "{a} != {b}");
    }

    #[test]
    fn coordinate_round_trip() {
        let mut canvas = Canvas::new();
        canvas.viewport_x = -123.5;
        canvas.viewport_y = 77.25;
        canvas.zoom(2.5, 10.0, 20.0);

        for &(x, y) in &[(0.0, 0.0), (400.0, 300.0), (-1e6, 1e6), (0.125, -0.5)] {
            let (cx, cy) = canvas.screen_to_canvas(x, y);
            let (sx, sy) = canvas.canvas_to_screen(cx, cy);
            approx(sx, x);
            approx(sy, y);
        }
    }

    #[test]
    fn zoom_keeps_focus_fixed() {
        let mut canvas = Canvas::new();
        canvas.zoom(2.0, 400.0, 300.0);

        assert_eq!(canvas.scale(), 2.0);
        approx(canvas.viewport_x, 200.0);
        approx(canvas.viewport_y, 150.0);

        // The canvas point that was under (400, 300) is still there.
        let (sx, sy) = canvas.canvas_to_screen(400.0, 300.0);
        approx(sx, 400.0);
        approx(sy, 300.0);
        // And the viewport origin maps back to screen (0, 0).
        let (ox, oy) = canvas.canvas_to_screen(200.0, 150.0);
        approx(ox, 0.0);
        approx(oy, 0.0);
    }

    #[test]
    fn zoom_clamps_without_breaking_focus() {
        let mut canvas = Canvas::new();
        let (focus_x, focus_y) = (100.0, 50.0);
        let (before_x, before_y) = canvas.screen_to_canvas(focus_x, focus_y);

        canvas.zoom(100.0, focus_x, focus_y);
        assert_eq!(canvas.scale(), ZOOM_MAX);
        let (sx, sy) = canvas.canvas_to_screen(before_x, before_y);
        approx(sx, focus_x);
        approx(sy, focus_y);

        canvas.zoom(1e-6, focus_x, focus_y);
        assert_eq!(canvas.scale(), ZOOM_MIN);
        let (sx, sy) = canvas.canvas_to_screen(before_x, before_y);
        approx(sx, focus_x);
        approx(sy, focus_y);
    }

    #[test]
    fn zoom_at_limit_is_noop() {
        let mut canvas = Canvas::new();
        canvas.zoom(100.0, 0.0, 0.0);
        let viewport = (canvas.viewport_x, canvas.viewport_y);
        canvas.zoom(2.0, 640.0, 480.0);
        assert_eq!((canvas.viewport_x, canvas.viewport_y), viewport);
    }

    #[test]
    fn set_scale_goes_through_the_focus_law() {
        let mut canvas = Canvas::new();
        canvas.set_scale(2.0, 400.0, 300.0);
        assert_eq!(canvas.scale(), 2.0);
        approx(canvas.viewport_x, 200.0);
        approx(canvas.viewport_y, 150.0);
    }

    #[test]
    fn viewport_centre_tracks_pan_and_zoom() {
        let mut canvas = Canvas::new();
        assert_eq!(canvas.viewport_centre(1000, 1000), (500.0, 500.0));

        canvas.pan_delta(-100.0, 0.0);
        let (cx, cy) = canvas.viewport_centre(1000, 1000);
        approx(cx, 600.0);
        approx(cy, 500.0);
    }

    #[test]
    fn drag_pan_moves_viewport_opposite() {
        let mut canvas = Canvas::new();
        canvas.pan_begin(100.0, 100.0);
        canvas.pan_update(150.0, 120.0);
        approx(canvas.viewport_x, -50.0);
        approx(canvas.viewport_y, -20.0);
        canvas.pan_end();
        assert!(!canvas.is_panning());
    }

    #[test]
    fn pan_update_without_grab_is_noop() {
        let mut canvas = Canvas::new();
        canvas.pan_update(500.0, 500.0);
        assert_eq!(canvas.viewport_x, 0.0);
        assert_eq!(canvas.viewport_y, 0.0);
    }

    #[test]
    fn pan_at_min_zoom_amplifies_delta() {
        let mut canvas = Canvas::new();
        canvas.zoom(0.0, 0.0, 0.0); // clamps to ZOOM_MIN
        assert_eq!(canvas.scale(), ZOOM_MIN);
        canvas.pan_delta(10.0, 0.0);
        approx(canvas.viewport_x, -100.0);
    }

    #[test]
    fn snap_reaches_target_and_deactivates() {
        let mut canvas = Canvas::new();
        canvas.snap_begin(640.0, -480.0, 1000);
        assert!(canvas.snap_active());

        canvas.snap_tick(1400);
        // Ease-out: more than half the distance after half the time.
        assert!(canvas.viewport_x > 320.0);
        assert!(canvas.snap_active());

        canvas.snap_tick(1000 + SNAP_DURATION_MS);
        approx(canvas.viewport_x, 640.0);
        approx(canvas.viewport_y, -480.0);
        assert!(!canvas.snap_active());
    }

    #[test]
    fn snap_restart_replaces_target() {
        let mut canvas = Canvas::new();
        canvas.snap_begin(100.0, 0.0, 0);
        canvas.snap_tick(400);
        canvas.snap_begin(-100.0, 50.0, 400);
        canvas.snap_tick(400 + SNAP_DURATION_MS);
        approx(canvas.viewport_x, -100.0);
        approx(canvas.viewport_y, 50.0);
    }
}
