//! Cursor routing: button presses drive the mode machine, motion is
//! dispatched on the current mode, and scroll events are split between
//! zooming, the scroll-pan gesture and client delivery.

use std::time::Duration;

use calloop::timer::{TimeoutAction, Timer};
use log::warn;
use smithay::backend::input::{Axis, AxisSource, ButtonState};
use smithay::input::pointer::{AxisFrame, ButtonEvent, CursorIcon, CursorImageStatus, MotionEvent};
use smithay::reexports::wayland_server::protocol::wl_surface::WlSurface;
use smithay::utils::{Logical, Point, SERIAL_COUNTER};

use super::{Mode, SCROLL_PAN_TIMEOUT_MS, ScrollRoute, ZOOM_SCROLL_FACTOR, route_scroll};
use crate::state::Infinidesk;
use crate::view::ResizeEdges;

const BTN_LEFT: u32 = 0x110;
const BTN_RIGHT: u32 = 0x111;

impl Infinidesk {
    pub fn on_pointer_motion(&mut self, position: Point<f64, Logical>, time: u32) {
        self.pointer_location = position;

        match self.mode {
            Mode::Move { view } => {
                let (cx, cy) = self.canvas.screen_to_canvas(position.x, position.y);
                if let Some(view) = self.view_mut(view) {
                    view.move_update(cx, cy);
                }
            }
            Mode::Pan => {
                self.canvas.pan_update(position.x, position.y);
            }
            Mode::Draw => {
                let (cx, cy) = self.canvas.screen_to_canvas(position.x, position.y);
                self.drawing.stroke_add_point(cx, cy);
            }
            Mode::Resize { view, .. } => {
                if let Some(view) = self.view_mut(view) {
                    view.resize_update(position.x, position.y);
                }
            }
            Mode::Passthrough => self.passthrough_motion(time),
        }
    }

    /// Passthrough motion: hover the drawing panel, pick resize cursors
    /// on window edges, deliver motion to the surface under the cursor
    /// and apply focus-follows-mouse.
    fn passthrough_motion(&mut self, time: u32) {
        let (lx, ly) = (self.pointer_location.x, self.pointer_location.y);
        let Some(pointer) = self.seat.get_pointer() else {
            return;
        };
        let serial = SERIAL_COUNTER.next_serial();

        if self.drawing.drawing_mode {
            self.drawing.panel.update_hover(lx, ly);
        }

        // A window edge takes priority over surface delivery so the
        // resize cursor can show.
        if let Some((_, edges)) = self.edge_at(lx, ly) {
            self.cursor_status = CursorImageStatus::Named(resize_cursor_icon(edges));
            pointer.motion(
                self,
                None,
                &MotionEvent {
                    location: self.pointer_location,
                    serial,
                    time,
                },
            );
            pointer.frame(self);
            return;
        }

        let mut hovered_view = None;
        let under = self.pointer_target(lx, ly, &mut hovered_view);
        if under.is_none() {
            self.cursor_status = CursorImageStatus::default_named();
        }

        pointer.motion(
            self,
            under,
            &MotionEvent {
                location: self.pointer_location,
                serial,
                time,
            },
        );
        pointer.frame(self);

        // Focus-follows-mouse, suppressed while a scroll-pan gesture is
        // navigating the canvas.
        if let Some(id) = hovered_view
            && !self.scroll_panning
        {
            self.focus_view(id);
        }
    }

    /// The surface under the cursor and its screen-space origin, in the
    /// same z-order the renderer draws: overlay/top layer surfaces, then
    /// views, then bottom/background layer surfaces.
    fn pointer_target(
        &self,
        lx: f64,
        ly: f64,
        hovered_view: &mut Option<crate::view::ViewId>,
    ) -> Option<(WlSurface, Point<f64, Logical>)> {
        if let Some(entry) = self.primary_output() {
            if let Some((surface, local)) = entry.layer_surface_at_layers(&[3, 2], lx, ly) {
                return Some((surface, Point::from((lx - local.x, ly - local.y))));
            }
        }

        if let Some((id, surface, local)) = self.view_at(lx, ly) {
            *hovered_view = Some(id);
            return Some((surface, Point::from((lx - local.x, ly - local.y))));
        }

        if let Some(entry) = self.primary_output() {
            if let Some((surface, local)) = entry.layer_surface_at_layers(&[1, 0], lx, ly) {
                return Some((surface, Point::from((lx - local.x, ly - local.y))));
            }
        }

        None
    }

    pub fn on_pointer_button(&mut self, button: u32, button_state: ButtonState, time: u32) {
        let Some(pointer) = self.seat.get_pointer() else {
            return;
        };
        let serial = SERIAL_COUNTER.next_serial();
        pointer.button(
            self,
            &ButtonEvent {
                button,
                state: button_state,
                serial,
                time,
            },
        );
        pointer.frame(self);

        match button_state {
            ButtonState::Pressed => self.handle_button_press(button),
            ButtonState::Released => self.handle_button_release(),
            _ => {}
        }
    }

    fn handle_button_press(&mut self, button: u32) {
        let (lx, ly) = (self.pointer_location.x, self.pointer_location.y);
        let under = self.view_at(lx, ly);

        if self.drawing.drawing_mode {
            if button == BTN_LEFT
                && let Some(panel_button) = self.drawing.panel.button_at(lx, ly)
            {
                self.drawing.panel.pressed = Some(panel_button);
                self.drawing.handle_panel_click(panel_button);
                return;
            }

            if button == BTN_LEFT {
                self.mode = Mode::Draw;
                let (cx, cy) = self.canvas.screen_to_canvas(lx, ly);
                self.drawing.stroke_begin(cx, cy);
                return;
            }
        }

        if self.modifier_pressed {
            if button == BTN_LEFT
                && let Some((id, _, _)) = under
            {
                self.mode = Mode::Move { view: id };
                let (cx, cy) = self.canvas.screen_to_canvas(lx, ly);
                if let Some(view) = self.view_mut(id) {
                    view.move_begin(cx, cy);
                }
                self.focus_view(id);
                self.raise_view(id);
                return;
            }
            if button == BTN_RIGHT {
                self.mode = Mode::Pan;
                self.canvas.pan_begin(lx, ly);
                return;
            }
        }

        // Plain click: focus and raise.
        if let Some((id, _, _)) = under {
            self.focus_view(id);
            self.raise_view(id);
        }
    }

    /// A release always returns to passthrough, ending whatever grab the
    /// paired press started.
    fn handle_button_release(&mut self) {
        match self.mode {
            Mode::Move { view } => {
                if let Some(view) = self.view_mut(view) {
                    view.move_end();
                }
            }
            Mode::Pan => self.canvas.pan_end(),
            Mode::Draw => self.drawing.stroke_end(),
            Mode::Resize { view, .. } => {
                if let Some(view) = self.view_mut(view) {
                    view.resize_end();
                }
            }
            Mode::Passthrough => {}
        }
        self.mode = Mode::Passthrough;
        self.drawing.panel.pressed = None;
    }

    pub fn on_pointer_axis(
        &mut self,
        horizontal: f64,
        vertical: f64,
        source: AxisSource,
        time: u32,
    ) {
        let (lx, ly) = (self.pointer_location.x, self.pointer_location.y);
        let over_view = self.view_at(lx, ly).is_some();

        match route_scroll(self.modifier_pressed, self.scroll_panning, over_view) {
            ScrollRoute::Zoom => {
                // Vertical wheel only; horizontal is ignored while zooming.
                if vertical != 0.0 {
                    let factor = if vertical < 0.0 {
                        ZOOM_SCROLL_FACTOR
                    } else {
                        1.0 / ZOOM_SCROLL_FACTOR
                    };
                    self.canvas.zoom(factor, lx, ly);
                }
            }
            ScrollRoute::ContinuePan => self.scroll_pan(horizontal, vertical),
            ScrollRoute::BeginPan => {
                self.scroll_panning = true;
                self.scroll_pan(horizontal, vertical);
            }
            ScrollRoute::ForwardToClient => self.forward_axis(horizontal, vertical, source, time),
        }
    }

    /// Applies one scroll-pan step and re-arms the idle timer that ends
    /// the gesture.
    fn scroll_pan(&mut self, horizontal: f64, vertical: f64) {
        if vertical != 0.0 {
            self.canvas.pan_delta(0.0, vertical);
        } else {
            self.canvas.pan_delta(horizontal, 0.0);
        }
        self.arm_scroll_pan_timer();
    }

    fn arm_scroll_pan_timer(&mut self) {
        if let Some(token) = self.scroll_pan_timer.take() {
            self.loop_handle.remove(token);
        }

        let timer = Timer::from_duration(Duration::from_millis(SCROLL_PAN_TIMEOUT_MS));
        match self.loop_handle.insert_source(timer, |_, _, state| {
            state.scroll_panning = false;
            state.scroll_pan_timer = None;
            TimeoutAction::Drop
        }) {
            Ok(token) => self.scroll_pan_timer = Some(token),
            Err(err) => warn!("failed to arm scroll-pan timer: {err}"),
        }
    }

    fn forward_axis(&mut self, horizontal: f64, vertical: f64, source: AxisSource, time: u32) {
        let Some(pointer) = self.seat.get_pointer() else {
            return;
        };

        let mut frame = AxisFrame::new(time).source(source);
        if horizontal != 0.0 {
            frame = frame.value(Axis::Horizontal, horizontal);
        }
        if vertical != 0.0 {
            frame = frame.value(Axis::Vertical, vertical);
        }
        pointer.axis(self, frame);
        pointer.frame(self);
    }
}

fn resize_cursor_icon(edges: ResizeEdges) -> CursorIcon {
    if edges == ResizeEdges::TOP | ResizeEdges::LEFT {
        CursorIcon::NwResize
    } else if edges == ResizeEdges::TOP | ResizeEdges::RIGHT {
        CursorIcon::NeResize
    } else if edges == ResizeEdges::BOTTOM | ResizeEdges::LEFT {
        CursorIcon::SwResize
    } else if edges == ResizeEdges::BOTTOM | ResizeEdges::RIGHT {
        CursorIcon::SeResize
    } else if edges == ResizeEdges::TOP {
        CursorIcon::NResize
    } else if edges == ResizeEdges::BOTTOM {
        CursorIcon::SResize
    } else if edges == ResizeEdges::LEFT {
        CursorIcon::WResize
    } else if edges == ResizeEdges::RIGHT {
        CursorIcon::EResize
    } else {
        CursorIcon::Default
    }
}
