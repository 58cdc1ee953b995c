//! Per-window state: canvas position, grabs, focus and map animations.
//!
//! Views are owned by the server in a front-to-back list (index 0 is the
//! topmost). Everything that needs to reference a view across events (the
//! switcher selection, the pointer grab) holds a [`ViewId`] and must cope
//! with the view disappearing.

pub mod gather;

use bitflags::bitflags;
use smithay::desktop::utils::bbox_from_surface_tree;
use smithay::utils::{Logical, Rectangle};
use smithay::wayland::compositor::with_states;
use smithay::wayland::shell::xdg::{SurfaceCachedState, ToplevelSurface};

use crate::canvas::Canvas;
use crate::util::{ease_out_cubic, lerp};

/// Focus ring fade duration.
pub const FOCUS_ANIM_DURATION_MS: u32 = 200;
/// Map (entrance) animation duration.
pub const MAP_ANIM_DURATION_MS: u32 = 200;

/// Window chrome, in canvas units (scaled at render time).
pub const BORDER_WIDTH: f64 = 3.0;
pub const CORNER_RADIUS: f64 = 10.0;

pub const BORDER_FOCUSED: [f32; 4] = [0.4, 0.6, 0.9, 1.0];
pub const BORDER_UNFOCUSED: [f32; 4] = [0.3, 0.3, 0.35, 1.0];

/// Dense, monotonically unique view identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(pub u32);

bitflags! {
    /// Edges of a view, used for resize-cursor detection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ResizeEdges: u8 {
        const TOP = 1;
        const BOTTOM = 2;
        const LEFT = 4;
        const RIGHT = 8;
    }
}

#[derive(Debug, Clone, Copy)]
struct MoveGrab {
    /// Cursor position at grab time, in canvas space.
    cursor: (f64, f64),
    /// View position at grab time.
    origin: (f64, f64),
}

// The grab is parked until drag-resize is driven; both fields feed that.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
struct ResizeGrab {
    edges: ResizeEdges,
    start_geometry: Rectangle<i32, Logical>,
}

/// One toplevel window on the canvas.
pub struct View {
    pub id: ViewId,
    pub toplevel: ToplevelSurface,

    /// Canvas position of the window's content top-left corner.
    pub x: f64,
    pub y: f64,
    /// Last-seen geometry: content origin within the buffer plus size.
    pub geometry: Rectangle<i32, Logical>,

    pub mapped: bool,
    pub app_id: String,
    pub title: String,

    move_grab: Option<MoveGrab>,
    resize_grab: Option<ResizeGrab>,

    pub focused: bool,
    pub focus_animation: f64,
    pub focus_anim_active: bool,
    focus_anim_start_ms: u32,

    pub map_animation: f64,
    map_anim_start_ms: u32,
    pub is_animating_out: bool,
}

impl View {
    pub fn new(id: ViewId, toplevel: ToplevelSurface) -> Self {
        Self {
            id,
            toplevel,
            x: 0.0,
            y: 0.0,
            geometry: Rectangle::default(),
            mapped: false,
            app_id: String::new(),
            title: String::new(),
            move_grab: None,
            resize_grab: None,
            focused: false,
            focus_animation: 0.0,
            focus_anim_active: false,
            focus_anim_start_ms: 0,
            map_animation: 0.0,
            map_anim_start_ms: 0,
            is_animating_out: false,
        }
    }

    /// Refreshes the cached geometry from the client's last commit. CSD
    /// clients may report their shadow offset only after the initial
    /// commit, so this runs on every commit.
    pub fn update_geometry(&mut self) {
        let surface = self.toplevel.wl_surface();
        let explicit = with_states(surface, |states| {
            let mut guard = states.cached_state.get::<SurfaceCachedState>();
            guard.current().geometry
        });
        self.geometry = explicit.unwrap_or_else(|| bbox_from_surface_tree(surface, (0, 0)));
    }

    /// Canvas-space centre of the window content.
    pub fn centre(&self) -> (f64, f64) {
        (
            self.x + self.geometry.size.w as f64 / 2.0,
            self.y + self.geometry.size.h as f64 / 2.0,
        )
    }

    pub fn set_position(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    pub fn move_begin(&mut self, cursor_x: f64, cursor_y: f64) {
        self.move_grab = Some(MoveGrab {
            cursor: (cursor_x, cursor_y),
            origin: (self.x, self.y),
        });
    }

    pub fn move_update(&mut self, cursor_x: f64, cursor_y: f64) {
        let Some(grab) = self.move_grab else {
            return;
        };
        self.x = grab.origin.0 + (cursor_x - grab.cursor.0);
        self.y = grab.origin.1 + (cursor_y - grab.cursor.1);
    }

    pub fn move_end(&mut self) {
        self.move_grab = None;
    }

    pub fn is_moving(&self) -> bool {
        self.move_grab.is_some()
    }

    /// Records a resize grab. The drag itself is not driven yet; the grab
    /// only parks the edge mask and start geometry.
    pub fn resize_begin(&mut self, edges: ResizeEdges) {
        self.resize_grab = Some(ResizeGrab {
            edges,
            start_geometry: self.geometry,
        });
    }

    pub fn resize_update(&mut self, _cursor_x: f64, _cursor_y: f64) {
        // Drag-resize is not driven yet.
    }

    pub fn resize_end(&mut self) {
        self.resize_grab = None;
    }

    /// Restarts the focus fade towards the current `focused` value.
    pub fn restart_focus_animation(&mut self, now_ms: u32) {
        self.focus_anim_start_ms = now_ms;
        self.focus_anim_active = true;
    }

    /// Starts the entrance animation from zero.
    pub fn start_map_animation(&mut self, now_ms: u32) {
        self.map_animation = 0.0;
        self.map_anim_start_ms = now_ms;
        self.is_animating_out = false;
    }

    /// Asks the client to close. The view itself goes away when the
    /// protocol destruction arrives.
    pub fn close(&self) {
        self.toplevel.send_close();
    }
}

/// A view's placement in logical screen space: the effective scale
/// (canvas zoom times the entrance shrink) and the content rectangle.
#[derive(Debug, Clone, Copy)]
pub struct ContentLayout {
    pub scale: f64,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

/// Computes the layout shared by rendering and hit testing. Both sides
/// must go through this or clicks land next to the pixels they target
/// while the entrance animation plays.
pub fn content_layout(view: &View, canvas: &Canvas) -> Option<ContentLayout> {
    let geo = view.geometry;
    if geo.size.w <= 0 || geo.size.h <= 0 {
        return None;
    }
    let origin = canvas.canvas_to_screen(view.x, view.y);
    Some(content_box(
        origin,
        (geo.size.w, geo.size.h),
        canvas.scale(),
        view.map_animation,
    ))
}

/// The entrance animation scales the content from 0.9 to 1.0 around the
/// centre of the un-animated rectangle.
fn content_box(
    origin: (f64, f64),
    size: (i32, i32),
    canvas_scale: f64,
    map_animation: f64,
) -> ContentLayout {
    let scale = canvas_scale * lerp(0.9, 1.0, map_animation);
    let base_w = size.0 as f64 * canvas_scale;
    let base_h = size.1 as f64 * canvas_scale;
    let w = size.0 as f64 * scale;
    let h = size.1 as f64 * scale;
    ContentLayout {
        scale,
        x: origin.0 + (base_w - w) / 2.0,
        y: origin.1 + (base_h - h) / 2.0,
        w,
        h,
    }
}

/// Advances focus and map animation clocks for every view. Called once
/// per frame with a single monotonic sample.
pub fn tick_animations(views: &mut [View], now_ms: u32) {
    for view in views {
        if view.focus_anim_active {
            let (value, active) = focus_anim_value(
                view.focused,
                now_ms.wrapping_sub(view.focus_anim_start_ms),
            );
            view.focus_animation = value;
            view.focus_anim_active = active;
        }

        if view.mapped && view.map_animation < 1.0 && !view.is_animating_out {
            view.map_animation =
                map_anim_value(now_ms.wrapping_sub(view.map_anim_start_ms));
        }
    }
}

/// Focus fade value after `elapsed` ms, plus whether the fade is still
/// running. Eases towards 1 when focused and towards 0 otherwise; the
/// final frame snaps exactly.
fn focus_anim_value(focused: bool, elapsed: u32) -> (f64, bool) {
    let progress = elapsed as f64 / FOCUS_ANIM_DURATION_MS as f64;
    if progress >= 1.0 {
        return (if focused { 1.0 } else { 0.0 }, false);
    }
    let eased = ease_out_cubic(progress);
    let value = if focused { eased } else { 1.0 - eased };
    (value, true)
}

/// Entrance animation value after `elapsed` ms, capped at 1.
fn map_anim_value(elapsed: u32) -> f64 {
    let progress = elapsed as f64 / MAP_ANIM_DURATION_MS as f64;
    if progress >= 1.0 {
        1.0
    } else {
        ease_out_cubic(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn focus_anim_eases_up_and_completes() {
        let (mid, active) = focus_anim_value(true, FOCUS_ANIM_DURATION_MS / 2);
        assert!(active);
        assert!(mid > 0.5 && mid < 1.0);

        let (end, active) = focus_anim_value(true, FOCUS_ANIM_DURATION_MS);
        assert!(!active);
        assert_eq!(end, 1.0);
    }

    #[test]
    fn unfocus_anim_runs_downwards() {
        let (mid, _) = focus_anim_value(false, FOCUS_ANIM_DURATION_MS / 2);
        assert!(mid < 0.5);

        let (end, active) = focus_anim_value(false, FOCUS_ANIM_DURATION_MS * 2);
        assert!(!active);
        assert_eq!(end, 0.0);
    }

    #[test]
    fn map_anim_caps_at_one() {
        assert_eq!(map_anim_value(0), 0.0);
        assert!(map_anim_value(MAP_ANIM_DURATION_MS / 2) > 0.5);
        assert_eq!(map_anim_value(MAP_ANIM_DURATION_MS * 3), 1.0);
    }

    #[test]
    fn entrance_scale_shrinks_around_the_centre() {
        let start = content_box((100.0, 100.0), (200, 100), 1.0, 0.0);
        assert_eq!(start.scale, 0.9);
        assert_eq!(start.w, 180.0);
        assert_eq!(start.h, 90.0);
        // Centred: half the shrink on each side.
        assert_eq!(start.x, 110.0);
        assert_eq!(start.y, 105.0);

        let done = content_box((100.0, 100.0), (200, 100), 1.0, 1.0);
        assert_eq!(done.scale, 1.0);
        assert_eq!(done.x, 100.0);
        assert_eq!(done.y, 100.0);
        assert_eq!(done.w, 200.0);
    }

    #[test]
    fn content_box_combines_canvas_and_entrance_scale() {
        let layout = content_box((0.0, 0.0), (100, 100), 2.0, 0.5);
        // Entrance scale at the halfway value 0.5 is 0.95.
        assert_eq!(layout.scale, 2.0 * 0.95);
        assert_eq!(layout.w, 190.0);
        assert_eq!(layout.x, (200.0 - 190.0) / 2.0);
    }

    #[test]
    fn move_grab_math() {
        // Exercised through a bare grab to keep protocol objects out of
        // unit tests.
        let grab = MoveGrab {
            cursor: (10.0, 20.0),
            origin: (100.0, 200.0),
        };
        let (x, y) = (
            grab.origin.0 + (25.0 - grab.cursor.0),
            grab.origin.1 + (10.0 - grab.cursor.1),
        );
        assert_eq!((x, y), (115.0, 190.0));
    }
}
