//! Protocol handler implementations wiring smithay's state machinery to
//! the compositor core.

use log::{debug, warn};
use smithay::backend::renderer::utils::on_commit_buffer_handler;
use smithay::input::pointer::CursorImageStatus;
use smithay::input::{Seat, SeatHandler, SeatState};
use smithay::output::Output;
use smithay::reexports::wayland_protocols::xdg::decoration::zv1::server::zxdg_toplevel_decoration_v1;
use smithay::reexports::wayland_protocols::xdg::shell::server::xdg_toplevel;
use smithay::reexports::wayland_server::{Client, Resource};
use smithay::reexports::wayland_server::protocol::wl_buffer::WlBuffer;
use smithay::reexports::wayland_server::protocol::wl_output::WlOutput;
use smithay::reexports::wayland_server::protocol::wl_seat::WlSeat;
use smithay::reexports::wayland_server::protocol::wl_surface::WlSurface;
use smithay::utils::Serial;
use smithay::wayland::buffer::BufferHandler;
use smithay::wayland::compositor::{
    CompositorClientState, CompositorHandler, CompositorState, get_parent, with_states,
};
use smithay::wayland::fractional_scale::{FractionalScaleHandler, with_fractional_scale};
use smithay::wayland::output::OutputHandler;
use smithay::wayland::selection::SelectionHandler;
use smithay::wayland::selection::data_device::{
    ClientDndGrabHandler, DataDeviceHandler, DataDeviceState, ServerDndGrabHandler,
    set_data_device_focus,
};
use smithay::wayland::shell::wlr_layer::{
    Layer, LayerSurface, WlrLayerShellHandler, WlrLayerShellState,
};
use smithay::wayland::shell::xdg::decoration::XdgDecorationHandler;
use smithay::wayland::shell::xdg::{
    PopupSurface, PositionerState, ToplevelSurface, XdgShellHandler, XdgShellState,
    XdgToplevelSurfaceData,
};
use smithay::wayland::shm::{ShmHandler, ShmState};
use smithay::{
    delegate_compositor, delegate_data_device, delegate_fractional_scale, delegate_layer_shell,
    delegate_output, delegate_seat, delegate_shm, delegate_viewporter, delegate_xdg_decoration,
    delegate_xdg_shell,
};

use crate::input::Mode;
use crate::layers::LayerEntry;
use crate::state::{ClientState, Infinidesk};
use crate::view::ResizeEdges;

impl CompositorHandler for Infinidesk {
    fn compositor_state(&mut self) -> &mut CompositorState {
        &mut self.compositor_state
    }

    fn client_compositor_state<'a>(&self, client: &'a Client) -> &'a CompositorClientState {
        &client.get_data::<ClientState>().unwrap().compositor_state
    }

    fn commit(&mut self, surface: &WlSurface) {
        on_commit_buffer_handler::<Self>(surface);
        self.popups.commit(surface);

        // Route the commit through the root so subsurface commits update
        // the owning view.
        let mut root = surface.clone();
        while let Some(parent) = get_parent(&root) {
            root = parent;
        }
        self.handle_commit(&root);
    }
}

impl BufferHandler for Infinidesk {
    fn buffer_destroyed(&mut self, _buffer: &WlBuffer) {}
}

impl ShmHandler for Infinidesk {
    fn shm_state(&self) -> &ShmState {
        &self.shm_state
    }
}

impl SeatHandler for Infinidesk {
    type KeyboardFocus = WlSurface;
    type PointerFocus = WlSurface;
    type TouchFocus = WlSurface;

    fn seat_state(&mut self) -> &mut SeatState<Self> {
        &mut self.seat_state
    }

    fn focus_changed(&mut self, seat: &Seat<Self>, focused: Option<&WlSurface>) {
        let dh = &self.display_handle;
        let client = focused.and_then(|surface| dh.get_client(surface.id()).ok());
        set_data_device_focus(dh, seat, client);
    }

    fn cursor_image(&mut self, _seat: &Seat<Self>, image: CursorImageStatus) {
        self.cursor_status = image;
    }
}

impl SelectionHandler for Infinidesk {
    type SelectionUserData = ();
}

impl DataDeviceHandler for Infinidesk {
    fn data_device_state(&self) -> &DataDeviceState {
        &self.data_device_state
    }
}

impl ClientDndGrabHandler for Infinidesk {}
impl ServerDndGrabHandler for Infinidesk {}

impl OutputHandler for Infinidesk {}

impl XdgShellHandler for Infinidesk {
    fn xdg_shell_state(&mut self) -> &mut XdgShellState {
        &mut self.xdg_shell_state
    }

    fn new_toplevel(&mut self, surface: ToplevelSurface) {
        // The view stays unmapped until its first commit with a buffer;
        // positioning happens then, against the usable area.
        self.add_view(surface);
    }

    fn toplevel_destroyed(&mut self, surface: ToplevelSurface) {
        self.remove_view(&surface);
    }

    fn new_popup(&mut self, surface: PopupSurface, positioner: PositionerState) {
        surface.with_pending_state(|state| {
            state.geometry = positioner.get_geometry();
        });
        if let Err(err) = self
            .popups
            .track_popup(smithay::desktop::PopupKind::Xdg(surface))
        {
            warn!("failed to track popup: {err}");
        }
    }

    fn reposition_request(
        &mut self,
        surface: PopupSurface,
        positioner: PositionerState,
        token: u32,
    ) {
        surface.with_pending_state(|state| {
            state.geometry = positioner.get_geometry();
        });
        surface.send_repositioned(token);
    }

    fn grab(&mut self, _surface: PopupSurface, _seat: WlSeat, _serial: Serial) {
        // Popup grabs (menus closing on outside click) are not driven.
        debug!("popup grab requested");
    }

    fn move_request(&mut self, _surface: ToplevelSurface, _seat: WlSeat, _serial: Serial) {
        // Interactive move is compositor-driven via modifier+drag.
        debug!("client requested interactive move (use the canvas modifier + drag)");
    }

    fn resize_request(
        &mut self,
        surface: ToplevelSurface,
        _seat: WlSeat,
        _serial: Serial,
        edges: xdg_toplevel::ResizeEdge,
    ) {
        // The grab is recorded but drag-resize is not driven yet.
        let Some(view) = self.views.iter().position(|view| view.toplevel == surface) else {
            return;
        };
        let id = self.views[view].id;
        let edges = resize_edges_from_protocol(edges);
        if edges.is_empty() {
            return;
        }
        self.views[view].resize_begin(edges);
        self.mode = Mode::Resize { view: id, edges };
        debug!("view {id:?} resize grab ({edges:?})");
    }

    fn maximize_request(&mut self, surface: ToplevelSurface) {
        // Maximising has no meaning on an infinite canvas; just answer.
        debug!("maximize requested (ignored)");
        surface.send_configure();
    }

    fn unmaximize_request(&mut self, surface: ToplevelSurface) {
        surface.send_configure();
    }

    fn fullscreen_request(&mut self, surface: ToplevelSurface, _output: Option<WlOutput>) {
        debug!("fullscreen requested (ignored)");
        surface.send_configure();
    }

    fn unfullscreen_request(&mut self, surface: ToplevelSurface) {
        surface.send_configure();
    }
}

fn resize_edges_from_protocol(edges: xdg_toplevel::ResizeEdge) -> ResizeEdges {
    use xdg_toplevel::ResizeEdge;
    match edges {
        ResizeEdge::Top => ResizeEdges::TOP,
        ResizeEdge::Bottom => ResizeEdges::BOTTOM,
        ResizeEdge::Left => ResizeEdges::LEFT,
        ResizeEdge::Right => ResizeEdges::RIGHT,
        ResizeEdge::TopLeft => ResizeEdges::TOP | ResizeEdges::LEFT,
        ResizeEdge::TopRight => ResizeEdges::TOP | ResizeEdges::RIGHT,
        ResizeEdge::BottomLeft => ResizeEdges::BOTTOM | ResizeEdges::LEFT,
        ResizeEdge::BottomRight => ResizeEdges::BOTTOM | ResizeEdges::RIGHT,
        _ => ResizeEdges::empty(),
    }
}

impl XdgDecorationHandler for Infinidesk {
    fn new_decoration(&mut self, toplevel: ToplevelSurface) {
        // Server-side mode is forced: the chrome is ours.
        toplevel.with_pending_state(|state| {
            state.decoration_mode = Some(zxdg_toplevel_decoration_v1::Mode::ServerSide);
        });
        send_decoration_configure(&toplevel);
    }

    fn request_mode(
        &mut self,
        toplevel: ToplevelSurface,
        _mode: zxdg_toplevel_decoration_v1::Mode,
    ) {
        toplevel.with_pending_state(|state| {
            state.decoration_mode = Some(zxdg_toplevel_decoration_v1::Mode::ServerSide);
        });
        send_decoration_configure(&toplevel);
    }

    fn unset_mode(&mut self, toplevel: ToplevelSurface) {
        toplevel.with_pending_state(|state| {
            state.decoration_mode = Some(zxdg_toplevel_decoration_v1::Mode::ServerSide);
        });
        send_decoration_configure(&toplevel);
    }
}

/// Configure for a decoration-mode change, deferred until after the
/// initial configure.
fn send_decoration_configure(toplevel: &ToplevelSurface) {
    let initial_sent = with_states(toplevel.wl_surface(), |states| {
        states
            .data_map
            .get::<XdgToplevelSurfaceData>()
            .unwrap()
            .lock()
            .unwrap()
            .initial_configure_sent
    });
    if initial_sent {
        let _ = toplevel.send_pending_configure();
    }
}

impl WlrLayerShellHandler for Infinidesk {
    fn shell_state(&mut self) -> &mut WlrLayerShellState {
        &mut self.layer_shell_state
    }

    fn new_layer_surface(
        &mut self,
        surface: LayerSurface,
        wl_output: Option<WlOutput>,
        layer: Layer,
        namespace: String,
    ) {
        debug!("new layer surface: namespace={namespace:?}, layer={layer:?}");

        // Unspecified output: the protocol lets us pick; use the primary.
        let output = wl_output.as_ref().and_then(Output::from_resource);
        let entry = match output {
            Some(ref output) => self.output_entry_mut(output),
            None => self.outputs.first_mut(),
        };
        let Some(entry) = entry else {
            // Protocol-object allocation failure policy: log and drop
            // the request rather than aborting.
            warn!("no output available for layer surface, dropping it");
            return;
        };

        // The first arrange (and with it the initial configure) runs in
        // response to the surface's initial commit.
        entry.layers[crate::layers::layer_index(layer)].push(LayerEntry::new(surface, layer));
    }

    fn new_popup(&mut self, _parent: LayerSurface, popup: PopupSurface) {
        if let Err(err) = self
            .popups
            .track_popup(smithay::desktop::PopupKind::Xdg(popup))
        {
            warn!("failed to track layer-surface popup: {err}");
        }
    }

    fn layer_destroyed(&mut self, surface: LayerSurface) {
        for entry in &mut self.outputs {
            if entry.remove_surface(surface.wl_surface()) {
                entry.arrange();
                break;
            }
        }
    }
}

impl FractionalScaleHandler for Infinidesk {
    fn new_fractional_scale(&mut self, surface: WlSurface) {
        let scale = self
            .primary_output()
            .map(|entry| entry.output.current_scale().fractional_scale())
            .unwrap_or(1.0);
        with_states(&surface, |states| {
            with_fractional_scale(states, |fractional| {
                fractional.set_preferred_scale(scale);
            });
        });
    }
}

delegate_compositor!(Infinidesk);
delegate_shm!(Infinidesk);
delegate_seat!(Infinidesk);
delegate_data_device!(Infinidesk);
delegate_output!(Infinidesk);
delegate_xdg_shell!(Infinidesk);
delegate_xdg_decoration!(Infinidesk);
delegate_layer_shell!(Infinidesk);
delegate_viewporter!(Infinidesk);
delegate_fractional_scale!(Infinidesk);
