//! Layer-shell surface arrangement and the per-output usable area.
//!
//! Panels, bars and wallpapers are anchored to the screen edges rather
//! than living on the canvas. Arranging walks the four shell layers in
//! z-order, positions every surface from its anchors and margins within
//! the full output box, and shrinks the usable area by each positive
//! exclusive zone. New windows are centred inside the resulting usable
//! area.

use log::debug;
use smithay::backend::renderer::utils::with_renderer_surface_state;
use smithay::desktop::WindowSurfaceType;
use smithay::desktop::utils::under_from_surface_tree;
use smithay::output::Output;
use smithay::reexports::wayland_server::protocol::wl_surface::WlSurface;
use smithay::utils::{Logical, Point, Rectangle, Size};
use smithay::wayland::compositor::with_states;
use smithay::wayland::shell::wlr_layer::{
    Anchor, ExclusiveZone, Layer, LayerSurface, LayerSurfaceCachedState,
};

/// The four shell layers in back-to-front order.
pub const LAYER_COUNT: usize = 4;

pub fn layer_index(layer: Layer) -> usize {
    match layer {
        Layer::Background => 0,
        Layer::Bottom => 1,
        Layer::Top => 2,
        Layer::Overlay => 3,
    }
}

/// One layer-shell surface bound to an output.
pub struct LayerEntry {
    pub surface: LayerSurface,
    pub layer: Layer,
    /// Output-local position computed by the arranger.
    pub position: Point<i32, Logical>,
    pub mapped: bool,
    /// Whether the surface has had its initial commit; configures are
    /// only valid after that.
    pub committed: bool,
}

impl LayerEntry {
    pub fn new(surface: LayerSurface, layer: Layer) -> Self {
        Self {
            surface,
            layer,
            position: Point::default(),
            mapped: false,
            committed: false,
        }
    }

    /// A layer surface counts as mapped once it has committed a buffer.
    pub fn refresh_mapped(&mut self) {
        self.mapped = with_renderer_surface_state(self.surface.wl_surface(), |state| {
            state.buffer().is_some()
        })
        .unwrap_or(false);
    }
}

/// An output plus the layer surfaces and usable area attached to it.
pub struct OutputEntry {
    pub output: Output,
    pub usable_area: Rectangle<i32, Logical>,
    pub layers: [Vec<LayerEntry>; LAYER_COUNT],
}

impl OutputEntry {
    pub fn new(output: Output) -> Self {
        let mut entry = Self {
            output,
            usable_area: Rectangle::default(),
            layers: Default::default(),
        };
        entry.usable_area = Rectangle::from_size(entry.logical_size());
        entry
    }

    /// Effective resolution in logical pixels (mode divided by scale).
    pub fn logical_size(&self) -> Size<i32, Logical> {
        let scale = self.output.current_scale().fractional_scale();
        self.output
            .current_mode()
            .map(|mode| mode.size.to_f64().to_logical(scale).to_i32_round())
            .unwrap_or_default()
    }

    /// Finds the entry owning `surface`, across all layers.
    pub fn entry_for_surface_mut(&mut self, surface: &WlSurface) -> Option<&mut LayerEntry> {
        self.layers
            .iter_mut()
            .flatten()
            .find(|entry| entry.surface.wl_surface() == surface)
    }

    /// Moves the entry owning `surface` to the list matching the layer
    /// the client last committed. Clients may re-assign their layer at
    /// runtime.
    pub fn refresh_layer(&mut self, surface: &WlSurface) {
        let committed_layer = with_states(surface, |states| {
            let mut guard = states.cached_state.get::<LayerSurfaceCachedState>();
            guard.current().layer
        });

        let target = layer_index(committed_layer);
        for index in 0..LAYER_COUNT {
            if index == target {
                continue;
            }
            if let Some(position) = self.layers[index]
                .iter()
                .position(|entry| entry.surface.wl_surface() == surface)
            {
                let mut entry = self.layers[index].remove(position);
                entry.layer = committed_layer;
                self.layers[target].push(entry);
                debug!("layer surface moved to {committed_layer:?}");
                return;
            }
        }
    }

    /// Removes the entry owning `surface`, returning whether one existed.
    pub fn remove_surface(&mut self, surface: &WlSurface) -> bool {
        let mut removed = false;
        for list in &mut self.layers {
            list.retain(|entry| {
                let matches = entry.surface.wl_surface() == surface;
                removed |= matches;
                !matches
            });
        }
        removed
    }

    /// Re-arranges every layer surface and recomputes the usable area.
    /// Runs whenever a layer surface is created, mapped, unmapped or
    /// committed, and when the output changes.
    pub fn arrange(&mut self) {
        let full = Rectangle::from_size(self.logical_size());
        let mut usable = full;

        for list in &mut self.layers {
            for entry in list.iter_mut() {
                if !entry.committed {
                    continue;
                }
                let attrs = read_attrs(&entry.surface);
                let (position, size) = arrange_surface(full, &mut usable, &attrs);
                entry.position = position;

                entry.surface.with_pending_state(|state| {
                    state.size = Some(size);
                });
                let _ = entry.surface.send_pending_configure();
            }
        }

        self.usable_area = usable;
        debug!(
            "output {} usable area: ({}, {}) {}x{}",
            self.output.name(),
            usable.loc.x,
            usable.loc.y,
            usable.size.w,
            usable.size.h
        );
    }

    /// Topmost mapped layer surface containing the output-local point,
    /// searched overlay to background, with surface-local coordinates.
    pub fn layer_surface_at(
        &self,
        ox: f64,
        oy: f64,
    ) -> Option<(WlSurface, Point<f64, Logical>)> {
        self.layer_surface_at_layers(&[3, 2, 1, 0], ox, oy)
    }

    /// Same lookup restricted to the given layer indices, in order. The
    /// pointer router uses this to interleave views between the bottom
    /// and top layer pairs.
    pub fn layer_surface_at_layers(
        &self,
        indices: &[usize],
        ox: f64,
        oy: f64,
    ) -> Option<(WlSurface, Point<f64, Logical>)> {
        for &index in indices {
            for entry in &self.layers[index] {
                if !entry.mapped {
                    continue;
                }
                let local = Point::<f64, Logical>::from((
                    ox - entry.position.x as f64,
                    oy - entry.position.y as f64,
                ));
                if let Some((surface, loc)) = under_from_surface_tree(
                    entry.surface.wl_surface(),
                    local,
                    (0, 0),
                    WindowSurfaceType::ALL,
                ) {
                    return Some((surface, local - loc.to_f64()));
                }
            }
        }
        None
    }
}

/// Anchor/margin/exclusive-zone attributes of one layer surface, pulled
/// out of the protocol state so the arranging math stays testable.
#[derive(Debug, Clone, Copy)]
pub struct LayerAttrs {
    pub anchor: Anchor,
    /// Margins in top, right, bottom, left order.
    pub margin: (i32, i32, i32, i32),
    pub desired: Size<i32, Logical>,
    pub exclusive: ExclusiveZone,
}

fn read_attrs(surface: &LayerSurface) -> LayerAttrs {
    with_states(surface.wl_surface(), |states| {
        let mut guard = states.cached_state.get::<LayerSurfaceCachedState>();
        let state = guard.current();
        LayerAttrs {
            anchor: state.anchor,
            margin: (
                state.margin.top,
                state.margin.right,
                state.margin.bottom,
                state.margin.left,
            ),
            desired: state.size,
            exclusive: state.exclusive_zone,
        }
    })
}

/// Positions one surface inside `full` per its anchors and margins, then
/// shrinks `usable` by its exclusive zone. Returns the position and the
/// size to configure the client with.
pub fn arrange_surface(
    full: Rectangle<i32, Logical>,
    usable: &mut Rectangle<i32, Logical>,
    attrs: &LayerAttrs,
) -> (Point<i32, Logical>, Size<i32, Logical>) {
    let (mt, mr, mb, ml) = attrs.margin;
    let anchor = attrs.anchor;

    // A zero desired dimension stretches between the opposing anchors.
    let width = if attrs.desired.w > 0 {
        attrs.desired.w
    } else {
        (full.size.w - ml - mr).max(1)
    };
    let height = if attrs.desired.h > 0 {
        attrs.desired.h
    } else {
        (full.size.h - mt - mb).max(1)
    };

    let x = match (anchor.contains(Anchor::LEFT), anchor.contains(Anchor::RIGHT)) {
        (true, true) => full.loc.x + ml + (full.size.w - ml - mr - width) / 2,
        (true, false) => full.loc.x + ml,
        (false, true) => full.loc.x + full.size.w - width - mr,
        (false, false) => full.loc.x + (full.size.w - width) / 2,
    };
    let y = match (anchor.contains(Anchor::TOP), anchor.contains(Anchor::BOTTOM)) {
        (true, true) => full.loc.y + mt + (full.size.h - mt - mb - height) / 2,
        (true, false) => full.loc.y + mt,
        (false, true) => full.loc.y + full.size.h - height - mb,
        (false, false) => full.loc.y + (full.size.h - height) / 2,
    };

    if let ExclusiveZone::Exclusive(zone) = attrs.exclusive {
        let zone = zone as i32;
        if zone > 0 {
            match exclusive_edge(anchor) {
                Some(Anchor::TOP) => {
                    let reserve = zone + mt;
                    usable.loc.y += reserve;
                    usable.size.h = (usable.size.h - reserve).max(0);
                }
                Some(Anchor::BOTTOM) => {
                    usable.size.h = (usable.size.h - zone - mb).max(0);
                }
                Some(Anchor::LEFT) => {
                    let reserve = zone + ml;
                    usable.loc.x += reserve;
                    usable.size.w = (usable.size.w - reserve).max(0);
                }
                Some(Anchor::RIGHT) => {
                    usable.size.w = (usable.size.w - zone - mr).max(0);
                }
                _ => {}
            }
        }
    }

    (Point::from((x, y)), Size::from((width, height)))
}

/// The edge an exclusive zone reserves from: the surface must be anchored
/// to exactly that edge, alone or stretched along it.
fn exclusive_edge(anchor: Anchor) -> Option<Anchor> {
    let horizontal = Anchor::LEFT | Anchor::RIGHT;
    let vertical = Anchor::TOP | Anchor::BOTTOM;

    for edge in [Anchor::TOP, Anchor::BOTTOM] {
        if anchor.contains(edge)
            && !anchor.contains(vertical - edge)
            && (anchor & horizontal == Anchor::empty() || anchor.contains(horizontal))
        {
            return Some(edge);
        }
    }
    for edge in [Anchor::LEFT, Anchor::RIGHT] {
        if anchor.contains(edge)
            && !anchor.contains(horizontal - edge)
            && (anchor & vertical == Anchor::empty() || anchor.contains(vertical))
        {
            return Some(edge);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> Rectangle<i32, Logical> {
        Rectangle::from_size(Size::from((1920, 1080)))
    }

    fn attrs(anchor: Anchor, size: (i32, i32), exclusive: ExclusiveZone) -> LayerAttrs {
        LayerAttrs {
            anchor,
            margin: (0, 0, 0, 0),
            desired: Size::from(size),
            exclusive,
        }
    }

    #[test]
    fn top_bar_reserves_top() {
        let full = full();
        let mut usable = full;
        let bar = attrs(
            Anchor::TOP | Anchor::LEFT | Anchor::RIGHT,
            (0, 30),
            ExclusiveZone::Exclusive(30),
        );

        let (pos, size) = arrange_surface(full, &mut usable, &bar);
        assert_eq!(pos, Point::from((0, 0)));
        assert_eq!(size, Size::from((1920, 30)));
        assert_eq!(usable.loc.y, 30);
        assert_eq!(usable.size.h, 1050);
        assert_eq!(usable.size.w, 1920);
    }

    #[test]
    fn bottom_dock_with_margin() {
        let full = full();
        let mut usable = full;
        let dock = LayerAttrs {
            anchor: Anchor::BOTTOM,
            margin: (0, 0, 10, 0),
            desired: Size::from((600, 48)),
            exclusive: ExclusiveZone::Exclusive(48),
        };

        let (pos, size) = arrange_surface(full, &mut usable, &dock);
        assert_eq!(size, Size::from((600, 48)));
        // Centred horizontally, pinned above the bottom margin.
        assert_eq!(pos, Point::from(((1920 - 600) / 2, 1080 - 48 - 10)));
        // Zone plus the bottom margin is reserved.
        assert_eq!(usable.size.h, 1080 - 58);
        assert_eq!(usable.loc.y, 0);
    }

    #[test]
    fn left_panel_reserves_left() {
        let full = full();
        let mut usable = full;
        let panel = attrs(
            Anchor::LEFT | Anchor::TOP | Anchor::BOTTOM,
            (64, 0),
            ExclusiveZone::Exclusive(64),
        );

        let (pos, size) = arrange_surface(full, &mut usable, &panel);
        assert_eq!(pos, Point::from((0, 0)));
        assert_eq!(size, Size::from((64, 1080)));
        assert_eq!(usable.loc.x, 64);
        assert_eq!(usable.size.w, 1920 - 64);
    }

    #[test]
    fn neutral_and_negative_zones_reserve_nothing() {
        let full = full();
        let mut usable = full;

        arrange_surface(
            full,
            &mut usable,
            &attrs(Anchor::TOP, (200, 30), ExclusiveZone::Neutral),
        );
        arrange_surface(
            full,
            &mut usable,
            &attrs(Anchor::BOTTOM, (200, 30), ExclusiveZone::DontCare),
        );
        assert_eq!(usable, full);
    }

    #[test]
    fn corner_anchor_reserves_nothing() {
        let full = full();
        let mut usable = full;
        arrange_surface(
            full,
            &mut usable,
            &attrs(
                Anchor::TOP | Anchor::LEFT,
                (100, 100),
                ExclusiveZone::Exclusive(100),
            ),
        );
        assert_eq!(usable, full);
    }

    #[test]
    fn wallpaper_fills_output() {
        let full = full();
        let mut usable = full;
        let wallpaper = attrs(
            Anchor::TOP | Anchor::BOTTOM | Anchor::LEFT | Anchor::RIGHT,
            (0, 0),
            ExclusiveZone::Neutral,
        );

        let (pos, size) = arrange_surface(full, &mut usable, &wallpaper);
        assert_eq!(pos, Point::from((0, 0)));
        assert_eq!(size, Size::from((1920, 1080)));
        assert_eq!(usable, full);
    }

    #[test]
    fn unanchored_surface_is_centred() {
        let full = full();
        let mut usable = full;
        let (pos, _) = arrange_surface(
            full,
            &mut usable,
            &attrs(Anchor::empty(), (400, 200), ExclusiveZone::Neutral),
        );
        assert_eq!(pos, Point::from(((1920 - 400) / 2, (1080 - 200) / 2)));
    }

    #[test]
    fn stacked_bars_reserve_in_order() {
        let full = full();
        let mut usable = full;
        let bar = attrs(
            Anchor::TOP | Anchor::LEFT | Anchor::RIGHT,
            (0, 30),
            ExclusiveZone::Exclusive(30),
        );
        arrange_surface(full, &mut usable, &bar);
        arrange_surface(full, &mut usable, &bar);
        assert_eq!(usable.loc.y, 60);
        assert_eq!(usable.size.h, 1020);
    }
}
