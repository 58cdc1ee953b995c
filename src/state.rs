//! Core server state: wires the canvas, views, drawing layer, switcher,
//! layer shell and input routing together, and owns all protocol
//! globals. Everything runs on one calloop event loop; each frame
//! samples the monotonic clock once and advances every animation from
//! that sample.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use calloop::{LoopHandle, RegistrationToken};
use log::{debug, info};
use smithay::backend::renderer::utils::with_renderer_surface_state;
use smithay::desktop::utils::{send_frames_surface_tree, under_from_surface_tree};
use smithay::desktop::{PopupKind, PopupManager, WindowSurfaceType};
use smithay::input::pointer::CursorImageStatus;
use smithay::input::{Seat, SeatState};
use smithay::output::Output;
use smithay::reexports::wayland_protocols::xdg::shell::server::xdg_toplevel;
use smithay::reexports::wayland_server::DisplayHandle;
use smithay::reexports::wayland_server::backend::{ClientData, ClientId, DisconnectReason};
use smithay::reexports::wayland_server::protocol::wl_surface::WlSurface;
use smithay::utils::{Clock, Logical, Monotonic, Point, SERIAL_COUNTER};
use smithay::wayland::compositor::{CompositorClientState, CompositorState, with_states};
use smithay::wayland::fractional_scale::FractionalScaleManagerState;
use smithay::wayland::output::OutputManagerState;
use smithay::wayland::selection::data_device::DataDeviceState;
use smithay::wayland::shell::wlr_layer::WlrLayerShellState;
use smithay::wayland::shell::xdg::decoration::XdgDecorationState;
use smithay::wayland::shell::xdg::{
    ToplevelSurface, XdgPopupSurfaceData, XdgShellState, XdgToplevelSurfaceData,
};
use smithay::wayland::shm::ShmState;
use smithay::wayland::viewporter::ViewporterState;
use xkbcommon::xkb;

use crate::canvas::Canvas;
use crate::config::keybindings::Keybind;
use crate::config::{Config, ModMask};
use crate::drawing::DrawingLayer;
use crate::input::{GATHER_GAP, Mode};
use crate::layers::OutputEntry;
use crate::switcher::Switcher;
use crate::view::gather::gather_positions;
use crate::view::{self, BORDER_WIDTH, ResizeEdges, View, ViewId};

/// Per-client protocol state.
#[derive(Default)]
pub struct ClientState {
    pub compositor_state: CompositorClientState,
}

impl ClientData for ClientState {
    fn initialized(&self, client_id: ClientId) {
        debug!("client {client_id:?} connected");
    }

    fn disconnected(&self, client_id: ClientId, reason: DisconnectReason) {
        debug!("client {client_id:?} disconnected: {reason:?}");
    }
}

pub struct Infinidesk {
    pub display_handle: DisplayHandle,
    pub loop_handle: LoopHandle<'static, Infinidesk>,
    pub clock: Clock<Monotonic>,
    pub running: bool,
    stop: Arc<AtomicBool>,
    pub socket_name: String,

    // Protocol globals.
    pub compositor_state: CompositorState,
    pub xdg_shell_state: XdgShellState,
    pub shm_state: ShmState,
    pub output_manager_state: OutputManagerState,
    pub data_device_state: DataDeviceState,
    pub layer_shell_state: WlrLayerShellState,
    pub viewporter_state: ViewporterState,
    pub fractional_scale_state: FractionalScaleManagerState,
    pub decoration_state: XdgDecorationState,
    pub seat_state: SeatState<Infinidesk>,
    pub seat: Seat<Infinidesk>,
    pub popups: PopupManager,

    pub config: Config,
    pub keybinds: Vec<Keybind>,

    pub canvas: Canvas,
    /// Views front-to-back; index 0 is the topmost.
    pub views: Vec<View>,
    next_view_id: u32,
    pub drawing: DrawingLayer,
    pub switcher: Switcher,
    /// Modifiers of the chord that opened the switcher; releasing one of
    /// them confirms.
    pub switcher_chord: Option<ModMask>,
    pub outputs: Vec<OutputEntry>,

    pub mode: Mode,
    /// Whether the configured canvas-gesture modifier is held.
    pub modifier_pressed: bool,
    pub scroll_panning: bool,
    pub scroll_pan_timer: Option<RegistrationToken>,
    pub pointer_location: Point<f64, Logical>,
    pub cursor_status: CursorImageStatus,
}

impl Infinidesk {
    pub fn new(
        display_handle: DisplayHandle,
        loop_handle: LoopHandle<'static, Infinidesk>,
        config: Config,
        stop: Arc<AtomicBool>,
    ) -> Self {
        let clock = Clock::new();

        let compositor_state = CompositorState::new::<Self>(&display_handle);
        let xdg_shell_state = XdgShellState::new::<Self>(&display_handle);
        let shm_state = ShmState::new::<Self>(&display_handle, Vec::new());
        let output_manager_state = OutputManagerState::new_with_xdg_output::<Self>(&display_handle);
        let data_device_state = DataDeviceState::new::<Self>(&display_handle);
        let layer_shell_state = WlrLayerShellState::new::<Self>(&display_handle);
        let viewporter_state = ViewporterState::new::<Self>(&display_handle);
        let fractional_scale_state = FractionalScaleManagerState::new::<Self>(&display_handle);
        let decoration_state = XdgDecorationState::new::<Self>(&display_handle);

        let mut seat_state = SeatState::new();
        let mut seat = seat_state.new_wl_seat(&display_handle, "seat0");
        seat.add_pointer();
        seat.add_keyboard(Default::default(), 600, 25)
            .expect("keyboard with the default keymap");

        let keybinds = config.resolved_binds();
        info!("{} keybind(s) active", keybinds.len());
        for bind in &keybinds {
            debug!(
                "bind {} + {} -> {:?}",
                bind.modifiers,
                xkb::keysym_get_name(bind.keysym),
                bind.action
            );
        }

        Self {
            display_handle,
            loop_handle,
            clock,
            running: true,
            stop,
            socket_name: String::new(),
            compositor_state,
            xdg_shell_state,
            shm_state,
            output_manager_state,
            data_device_state,
            layer_shell_state,
            viewporter_state,
            fractional_scale_state,
            decoration_state,
            seat_state,
            seat,
            popups: PopupManager::default(),
            config,
            keybinds,
            canvas: Canvas::new(),
            views: Vec::new(),
            next_view_id: 0,
            drawing: DrawingLayer::new(),
            switcher: Switcher::new(),
            switcher_chord: None,
            outputs: Vec::new(),
            mode: Mode::Passthrough,
            modifier_pressed: false,
            scroll_panning: false,
            scroll_pan_timer: None,
            pointer_location: Point::default(),
            cursor_status: CursorImageStatus::default_named(),
        }
    }

    /// One monotonic sample, in milliseconds, driving all animations.
    pub fn now_ms(&self) -> u32 {
        Duration::from(self.clock.now()).as_millis() as u32
    }

    pub fn should_stop(&self) -> bool {
        !self.running || self.stop.load(Ordering::Relaxed)
    }

    pub fn primary_output(&self) -> Option<&OutputEntry> {
        self.outputs.first()
    }

    pub fn output_entry_mut(&mut self, output: &Output) -> Option<&mut OutputEntry> {
        self.outputs.iter_mut().find(|entry| &entry.output == output)
    }

    // ---- view list management -------------------------------------------------

    pub fn view_index(&self, id: ViewId) -> Option<usize> {
        self.views.iter().position(|view| view.id == id)
    }

    pub fn view(&self, id: ViewId) -> Option<&View> {
        self.views.iter().find(|view| view.id == id)
    }

    pub fn view_mut(&mut self, id: ViewId) -> Option<&mut View> {
        self.views.iter_mut().find(|view| view.id == id)
    }

    /// Ids of mapped views, front to back.
    pub fn mapped_ids(&self) -> Vec<ViewId> {
        self.views
            .iter()
            .filter(|view| view.mapped)
            .map(|view| view.id)
            .collect()
    }

    pub fn topmost_mapped(&self) -> Option<ViewId> {
        self.views.iter().find(|view| view.mapped).map(|view| view.id)
    }

    pub fn add_view(&mut self, toplevel: ToplevelSurface) -> ViewId {
        let id = ViewId(self.next_view_id);
        self.next_view_id += 1;
        self.views.insert(0, View::new(id, toplevel));
        debug!("created view {id:?}");
        id
    }

    /// Removes the view owning `toplevel` and scrubs every weak
    /// reference to it (grab, switcher selection).
    pub fn remove_view(&mut self, toplevel: &ToplevelSurface) {
        let Some(index) = self
            .views
            .iter()
            .position(|view| &view.toplevel == toplevel)
        else {
            return;
        };
        let id = self.views[index].id;
        self.views.remove(index);
        debug!("destroyed view {id:?}");

        if self.mode.grabbed_view() == Some(id) {
            self.mode = Mode::Passthrough;
        }
        let remaining = self.mapped_ids();
        self.switcher.forget_view(id, &remaining);
        if self.switcher.active {
            self.switcher.dirty = true;
        }
    }

    /// Moves the view to the front of the list.
    pub fn raise_view(&mut self, id: ViewId) {
        if let Some(index) = self.view_index(id)
            && index != 0
        {
            let view = self.views.remove(index);
            self.views.insert(0, view);
        }
    }

    /// Transfers keyboard focus, restarting the focus fade on both the
    /// previously focused view and the new one. Does not raise.
    pub fn focus_view(&mut self, id: ViewId) {
        let Some(keyboard) = self.seat.get_keyboard() else {
            return;
        };
        let Some(index) = self.view_index(id) else {
            return;
        };

        let surface = self.views[index].toplevel.wl_surface().clone();
        if keyboard.current_focus().as_ref() == Some(&surface) {
            return;
        }

        let now = self.now_ms();
        for view in &mut self.views {
            if view.focused {
                view.focused = false;
                view.restart_focus_animation(now);
                view.toplevel.with_pending_state(|state| {
                    state.states.unset(xdg_toplevel::State::Activated);
                });
                let _ = view.toplevel.send_pending_configure();
            }
        }

        let view = &mut self.views[index];
        view.focused = true;
        view.restart_focus_animation(now);
        view.toplevel.with_pending_state(|state| {
            state.states.set(xdg_toplevel::State::Activated);
        });
        let _ = view.toplevel.send_pending_configure();

        keyboard.set_focus(self, Some(surface), SERIAL_COUNTER.next_serial());
        debug!("focused view {id:?}");
    }

    /// Asks the topmost mapped view's client to close.
    pub fn close_topmost(&mut self) {
        if let Some(id) = self.topmost_mapped()
            && let Some(view) = self.view(id)
        {
            view.close();
        }
    }

    /// Starts a viewport snap that centres the view on screen, then
    /// focuses and raises it.
    pub fn snap_to_view(&mut self, id: ViewId) {
        let Some(size) = self.primary_output().map(|o| o.logical_size()) else {
            return;
        };
        let Some(view) = self.view(id) else {
            return;
        };

        let centre = view.centre();
        let scale = self.canvas.scale();
        let target_x = centre.0 - (size.w as f64 / 2.0) / scale;
        let target_y = centre.1 - (size.h as f64 / 2.0) / scale;

        let now = self.now_ms();
        self.canvas.snap_begin(target_x, target_y, now);
        self.focus_view(id);
        self.raise_view(id);
    }

    /// Contracts all mapped windows toward their centroid and snaps the
    /// viewport onto the result.
    pub fn gather_windows(&mut self) {
        let ids: Vec<ViewId> = self.mapped_ids();
        let mut rects: Vec<(f64, f64, f64, f64)> = ids
            .iter()
            .filter_map(|&id| self.view(id))
            .map(|view| {
                (
                    view.x,
                    view.y,
                    view.geometry.size.w as f64,
                    view.geometry.size.h as f64,
                )
            })
            .collect();

        let Some(centroid) = gather_positions(&mut rects, GATHER_GAP) else {
            return;
        };

        for (&id, rect) in ids.iter().zip(rects.iter()) {
            if let Some(view) = self.view_mut(id) {
                view.set_position(rect.0, rect.1);
            }
        }

        if let Some(size) = self.primary_output().map(|o| o.logical_size()) {
            let scale = self.canvas.scale();
            let target_x = centroid.0 - (size.w as f64 / 2.0) / scale;
            let target_y = centroid.1 - (size.h as f64 / 2.0) / scale;
            let now = self.now_ms();
            self.canvas.snap_begin(target_x, target_y, now);
        }
        info!("gathered {} window(s)", ids.len());
    }

    // ---- switcher -------------------------------------------------------------

    pub fn switcher_start(&mut self, chord: ModMask) {
        let ids = self.mapped_ids();
        self.switcher.start(&ids);
        if self.switcher.active {
            self.switcher_chord = Some(chord);
        }
    }

    pub fn switcher_confirm(&mut self) {
        self.switcher_chord = None;
        if let Some(id) = self.switcher.finish() {
            self.snap_to_view(id);
        }
    }

    pub fn switcher_cancel(&mut self) {
        self.switcher_chord = None;
        self.switcher.cancel();
    }

    // ---- commit plumbing ------------------------------------------------------

    /// Runs the per-surface commit logic: initial configures, geometry
    /// refresh, map/unmap detection and layer re-arrangement.
    pub fn handle_commit(&mut self, surface: &WlSurface) {
        if let Some(index) = self
            .views
            .iter()
            .position(|view| view.toplevel.wl_surface() == surface)
        {
            self.handle_toplevel_commit(index, surface);
            return;
        }

        if let Some(popup) = self.popups.find_popup(surface) {
            if let PopupKind::Xdg(ref popup) = popup {
                let initial_sent = with_states(surface, |states| {
                    states
                        .data_map
                        .get::<XdgPopupSurfaceData>()
                        .unwrap()
                        .lock()
                        .unwrap()
                        .initial_configure_sent
                });
                if !initial_sent {
                    let _ = popup.send_configure();
                }
            }
            return;
        }

        for index in 0..self.outputs.len() {
            let entry = &mut self.outputs[index];
            if let Some(layer) = entry.entry_for_surface_mut(surface) {
                layer.committed = true;
                layer.refresh_mapped();
                entry.refresh_layer(surface);
                entry.arrange();
                return;
            }
        }
    }

    fn handle_toplevel_commit(&mut self, index: usize, surface: &WlSurface) {
        let initial_sent = with_states(surface, |states| {
            states
                .data_map
                .get::<XdgToplevelSurfaceData>()
                .unwrap()
                .lock()
                .unwrap()
                .initial_configure_sent
        });
        if !initial_sent {
            // First configure with no size: the client picks its own.
            self.views[index].toplevel.send_configure();
            return;
        }

        // CSD clients may report their shadow offset after the initial
        // commit, so the cached geometry is refreshed every time.
        self.views[index].update_geometry();
        self.refresh_view_meta(index, surface);

        let has_buffer =
            with_renderer_surface_state(surface, |state| state.buffer().is_some())
                .unwrap_or(false);
        let id = self.views[index].id;
        if has_buffer && !self.views[index].mapped {
            self.map_view(id);
        } else if !has_buffer && self.views[index].mapped {
            self.unmap_view(id);
        }
    }

    fn refresh_view_meta(&mut self, index: usize, surface: &WlSurface) {
        let (app_id, title) = with_states(surface, |states| {
            let data = states
                .data_map
                .get::<XdgToplevelSurfaceData>()
                .unwrap()
                .lock()
                .unwrap();
            (
                data.app_id.clone().unwrap_or_default(),
                data.title.clone().unwrap_or_default(),
            )
        });

        let view = &mut self.views[index];
        if view.app_id != app_id || view.title != title {
            view.app_id = app_id;
            view.title = title;
            if self.switcher.active {
                self.switcher.dirty = true;
            }
        }
    }

    /// First commit with a buffer: centre the window inside the usable
    /// area, play the entrance animation, focus and raise.
    fn map_view(&mut self, id: ViewId) {
        let centre = self
            .primary_output()
            .map(|output| {
                let usable = output.usable_area;
                self.canvas.screen_to_canvas(
                    usable.loc.x as f64 + usable.size.w as f64 / 2.0,
                    usable.loc.y as f64 + usable.size.h as f64 / 2.0,
                )
            })
            .unwrap_or((0.0, 0.0));

        let now = self.now_ms();
        let Some(view) = self.view_mut(id) else {
            return;
        };
        view.x = centre.0 - view.geometry.size.w as f64 / 2.0;
        view.y = centre.1 - view.geometry.size.h as f64 / 2.0;
        view.mapped = true;
        view.start_map_animation(now);
        debug!("mapped view {id:?} at ({:.1}, {:.1})", view.x, view.y);

        self.focus_view(id);
        self.raise_view(id);
        if self.switcher.active {
            self.switcher.dirty = true;
        }
    }

    fn unmap_view(&mut self, id: ViewId) {
        if self.mode.grabbed_view() == Some(id) {
            self.mode = Mode::Passthrough;
        }
        let Some(view) = self.view_mut(id) else {
            return;
        };
        if view.is_moving() {
            view.move_end();
        }
        view.mapped = false;
        view.map_animation = 0.0;
        debug!("unmapped view {id:?}");
    }

    // ---- hit testing ----------------------------------------------------------

    /// Resolves a screen-logical point to the view, surface and
    /// surface-local coordinates under it. Placement goes through the
    /// same [`view::content_layout`] the renderer uses, so the result
    /// stays consistent with the drawn pixels even mid-entrance.
    /// Popups are checked before the window content.
    pub fn view_at(
        &self,
        lx: f64,
        ly: f64,
    ) -> Option<(ViewId, WlSurface, Point<f64, Logical>)> {
        for view in &self.views {
            if !view.mapped {
                continue;
            }
            let Some(layout) = view::content_layout(view, &self.canvas) else {
                continue;
            };
            let scale = layout.scale;
            let geo = view.geometry;

            // Popups float above the content and extend beyond it.
            for (popup, offset) in PopupManager::popups_for_surface(view.toplevel.wl_surface())
            {
                let popup_geo = popup.geometry();
                let root_x = layout.x + (offset.x - popup_geo.loc.x) as f64 * scale;
                let root_y = layout.y + (offset.y - popup_geo.loc.y) as f64 * scale;
                let local = Point::<f64, Logical>::from((
                    (lx - root_x) / scale,
                    (ly - root_y) / scale,
                ));
                if let Some((surface, loc)) = under_from_surface_tree(
                    popup.wl_surface(),
                    local,
                    (0, 0),
                    WindowSurfaceType::ALL,
                ) {
                    return Some((view.id, surface, local - loc.to_f64()));
                }
            }

            if lx < layout.x
                || lx >= layout.x + layout.w
                || ly < layout.y
                || ly >= layout.y + layout.h
            {
                continue;
            }

            let content = Point::<f64, Logical>::from((
                (lx - layout.x) / scale,
                (ly - layout.y) / scale,
            ));
            let in_tree = content + geo.loc.to_f64();
            if let Some((surface, loc)) = under_from_surface_tree(
                view.toplevel.wl_surface(),
                in_tree,
                (0, 0),
                WindowSurfaceType::ALL,
            ) {
                return Some((view.id, surface, in_tree - loc.to_f64()));
            }

            // Transparent border region of the buffer: fall back to the
            // main surface with content-local coordinates.
            return Some((view.id, view.toplevel.wl_surface().clone(), content));
        }

        None
    }

    /// Non-empty edge mask when the point lies in the border band around
    /// a mapped view; used to pick the resize cursor image. Shares the
    /// renderer's [`view::content_layout`] placement.
    pub fn edge_at(&self, lx: f64, ly: f64) -> Option<(ViewId, ResizeEdges)> {
        for view in &self.views {
            if !view.mapped {
                continue;
            }
            let Some(layout) = view::content_layout(view, &self.canvas) else {
                continue;
            };
            let border = (BORDER_WIDTH * layout.scale).max(1.0);

            let (sx, sy) = (layout.x, layout.y);
            let (w, h) = (layout.w, layout.h);
            let in_outer = lx >= sx - border
                && lx < sx + w + border
                && ly >= sy - border
                && ly < sy + h + border;
            let in_content = lx >= sx && lx < sx + w && ly >= sy && ly < sy + h;
            if !in_outer || in_content {
                continue;
            }

            let mut edges = ResizeEdges::empty();
            if lx < sx {
                edges |= ResizeEdges::LEFT;
            }
            if lx >= sx + w {
                edges |= ResizeEdges::RIGHT;
            }
            if ly < sy {
                edges |= ResizeEdges::TOP;
            }
            if ly >= sy + h {
                edges |= ResizeEdges::BOTTOM;
            }
            if !edges.is_empty() {
                return Some((view.id, edges));
            }
        }

        None
    }

    // ---- per-frame upkeep -----------------------------------------------------

    /// Advances every animation clock from a single time sample.
    pub fn advance_animations(&mut self) {
        let now = self.now_ms();
        self.canvas.snap_tick(now);
        view::tick_animations(&mut self.views, now);
    }

    /// Sends `frame_done` to every mapped surface (views, their popups,
    /// layer surfaces) after a submitted frame.
    pub fn send_frame_callbacks(&self) {
        let Some(entry) = self.primary_output() else {
            return;
        };
        let output = &entry.output;
        let time = self.clock.now();

        for view in &self.views {
            if !view.mapped {
                continue;
            }
            let surface = view.toplevel.wl_surface();
            send_frames_surface_tree(surface, output, time, None, |_, _| Some(output.clone()));
            for (popup, _) in PopupManager::popups_for_surface(surface) {
                send_frames_surface_tree(popup.wl_surface(), output, time, None, |_, _| {
                    Some(output.clone())
                });
            }
        }

        for layer in entry.layers.iter().flatten() {
            if layer.mapped {
                send_frames_surface_tree(layer.surface.wl_surface(), output, time, None, |_, _| {
                    Some(output.clone())
                });
            }
        }
    }
}
