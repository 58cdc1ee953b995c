//! Per-frame rendering.
//!
//! Each frame is assembled into a flat, back-to-front list of draw
//! operations and then executed against a GLES frame. Only two
//! primitives are used: solid rectangles and textures. All chrome
//! (borders, rounded corners, strokes, the panel) reduces to rectangle
//! spans from [`chrome`]; client content goes through smithay's surface
//! tree elements, which honour viewport crops and buffer scale.
//!
//! Draw order: background fill, background/bottom layer surfaces, views
//! back to front (content, corner masks, border), popups, top/overlay
//! layer surfaces, strokes, the drawing panel, the switcher overlay.

pub mod chrome;

use smithay::backend::renderer::element::surface::{
    WaylandSurfaceRenderElement, render_elements_from_surface_tree,
};
use smithay::backend::renderer::element::{Element, Kind, RenderElement};
use smithay::backend::renderer::gles::{GlesError, GlesFrame, GlesRenderer, GlesTexture};
use smithay::backend::renderer::{Color32F, Frame, Texture};
use smithay::desktop::PopupManager;
use smithay::utils::{Physical, Point, Rectangle, Scale, Size, Transform};

use crate::drawing::{STROKE_WIDTH, ui};
use crate::state::Infinidesk;
use crate::switcher::SwitcherRow;
use crate::util::lerp_color;
use crate::view::{self, BORDER_FOCUSED, BORDER_UNFOCUSED, BORDER_WIDTH, CORNER_RADIUS, View};

/// Background fill, also used to mask content corners.
pub const BACKGROUND_COLOR: [f32; 4] = [0.18, 0.18, 0.18, 1.0];

/// One deferred draw call.
pub enum DrawOp {
    Rect {
        rect: Rectangle<i32, Physical>,
        color: Color32F,
    },
    Surface {
        element: WaylandSurfaceRenderElement<GlesRenderer>,
        scale: Scale<f64>,
    },
    Texture {
        texture: GlesTexture,
        dst: Rectangle<i32, Physical>,
    },
}

/// Premultiplies a straight-alpha colour for the blend mode the frame
/// uses.
fn solid(color: [f32; 4]) -> Color32F {
    let [r, g, b, a] = color;
    Color32F::new(r * a, g * a, b * a, a)
}

/// Per-view render placement shared by the content, chrome and popup
/// passes. The logical-space box comes from [`view::content_layout`],
/// the same computation hit testing uses, so the entrance animation
/// never puts clicks and pixels out of agreement.
struct ViewLayout {
    combined: f64,
    opacity: f32,
    content: Rectangle<i32, Physical>,
    /// Surface-tree root position: content origin shifted back by the
    /// scaled geometry offset.
    location: Point<i32, Physical>,
}

fn layout_view(state: &Infinidesk, view: &View, output_scale: f64) -> Option<ViewLayout> {
    let layout = view::content_layout(view, &state.canvas)?;
    let combined = layout.scale * output_scale;

    let content_x = (layout.x * output_scale).round() as i32;
    let content_y = (layout.y * output_scale).round() as i32;
    let content = Rectangle::new(
        (content_x, content_y).into(),
        (
            (layout.w * output_scale).round() as i32,
            (layout.h * output_scale).round() as i32,
        )
            .into(),
    );
    if content.size.w <= 0 || content.size.h <= 0 {
        return None;
    }

    let geo = view.geometry;
    let location = Point::from((
        content_x - (geo.loc.x as f64 * combined).round() as i32,
        content_y - (geo.loc.y as f64 * combined).round() as i32,
    ));

    Some(ViewLayout {
        combined,
        opacity: view.map_animation as f32,
        content,
        location,
    })
}

/// Builds the frame's draw list. Needs the renderer to resolve surface
/// textures and (lazily) the switcher overlay.
pub fn assemble_frame(
    state: &mut Infinidesk,
    renderer: &mut GlesRenderer,
    output_size: Size<i32, Physical>,
    output_scale: f64,
) -> Vec<DrawOp> {
    let mut ops = Vec::new();

    // Background and bottom layer surfaces.
    push_layer_ops(state, renderer, &mut ops, &[0, 1], output_scale);

    // Views, back to front.
    for index in (0..state.views.len()).rev() {
        let view = &state.views[index];
        if !view.mapped {
            continue;
        }
        let Some(layout) = layout_view(state, view, output_scale) else {
            continue;
        };

        let elements: Vec<WaylandSurfaceRenderElement<GlesRenderer>> =
            render_elements_from_surface_tree(
                renderer,
                view.toplevel.wl_surface(),
                layout.location,
                layout.combined,
                layout.opacity,
                Kind::Unspecified,
            );
        ops.extend(elements.into_iter().map(|element| DrawOp::Surface {
            element,
            scale: layout.combined.into(),
        }));

        push_view_chrome(&mut ops, view, &layout);
    }

    // Popups sit above every view.
    for index in (0..state.views.len()).rev() {
        let view = &state.views[index];
        if !view.mapped {
            continue;
        }
        let Some(layout) = layout_view(state, view, output_scale) else {
            continue;
        };

        for (popup, offset) in PopupManager::popups_for_surface(view.toplevel.wl_surface()) {
            let popup_geo = popup.geometry();
            let position = Point::from((
                layout.content.loc.x
                    + ((offset.x - popup_geo.loc.x) as f64 * layout.combined).round() as i32,
                layout.content.loc.y
                    + ((offset.y - popup_geo.loc.y) as f64 * layout.combined).round() as i32,
            ));
            let elements: Vec<WaylandSurfaceRenderElement<GlesRenderer>> =
                render_elements_from_surface_tree(
                    renderer,
                    popup.wl_surface(),
                    position,
                    layout.combined,
                    layout.opacity,
                    Kind::Unspecified,
                );
            ops.extend(elements.into_iter().map(|element| DrawOp::Surface {
                element,
                scale: layout.combined.into(),
            }));
        }
    }

    // Top and overlay layer surfaces.
    push_layer_ops(state, renderer, &mut ops, &[2, 3], output_scale);

    // Drawing layer: committed strokes then the one in flight.
    push_stroke_ops(state, &mut ops, output_scale);

    if state.drawing.drawing_mode {
        ops.extend(
            ui::paint_ops(&state.drawing, output_scale)
                .into_iter()
                .map(|paint| DrawOp::Rect {
                    rect: paint.rect,
                    color: solid(paint.color),
                }),
        );
    }

    // Switcher overlay, centred, drawn 1:1 in physical pixels.
    if state.switcher.active {
        let rows: Vec<SwitcherRow> = state
            .views
            .iter()
            .filter(|view| view.mapped)
            .map(|view| SwitcherRow {
                app_id: view.app_id.clone(),
                title: view.title.clone(),
                selected: state.switcher.selected == Some(view.id),
            })
            .collect();
        if let Some((texture, size)) = state.switcher.texture(renderer, &rows, output_scale) {
            let dst = Rectangle::new(
                (
                    (output_size.w - size.w) / 2,
                    (output_size.h - size.h) / 2,
                )
                    .into(),
                size,
            );
            ops.push(DrawOp::Texture { texture, dst });
        }
    }

    ops
}

fn push_layer_ops(
    state: &Infinidesk,
    renderer: &mut GlesRenderer,
    ops: &mut Vec<DrawOp>,
    indices: &[usize],
    output_scale: f64,
) {
    let Some(entry) = state.primary_output() else {
        return;
    };
    for &index in indices {
        for layer in &entry.layers[index] {
            if !layer.mapped {
                continue;
            }
            let position = layer
                .position
                .to_f64()
                .to_physical(output_scale)
                .to_i32_round();
            let elements: Vec<WaylandSurfaceRenderElement<GlesRenderer>> =
                render_elements_from_surface_tree(
                    renderer,
                    layer.surface.wl_surface(),
                    position,
                    output_scale,
                    1.0,
                    Kind::Unspecified,
                );
            ops.extend(elements.into_iter().map(|element| DrawOp::Surface {
                element,
                scale: output_scale.into(),
            }));
        }
    }
}

/// Corner masks then the border ring, so the border always frames the
/// window even though the texture underneath is rectangular.
fn push_view_chrome(ops: &mut Vec<DrawOp>, view: &View, layout: &ViewLayout) {
    let content = layout.content;
    let radius = (CORNER_RADIUS * layout.combined).round() as i32;
    let border = ((BORDER_WIDTH * layout.combined).round() as i32).max(1);

    for rect in chrome::corner_mask_spans(
        content.loc.x,
        content.loc.y,
        content.size.w,
        content.size.h,
        radius,
    ) {
        ops.push(DrawOp::Rect {
            rect,
            color: solid(BACKGROUND_COLOR),
        });
    }

    let mut color = lerp_color(BORDER_UNFOCUSED, BORDER_FOCUSED, view.focus_animation);
    color[3] *= layout.opacity;
    for rect in chrome::border_spans(
        content.loc.x - border,
        content.loc.y - border,
        content.size.w + 2 * border,
        content.size.h + 2 * border,
        border,
        radius + border,
    ) {
        ops.push(DrawOp::Rect {
            rect,
            color: solid(color),
        });
    }
}

fn push_stroke_ops(state: &Infinidesk, ops: &mut Vec<DrawOp>, output_scale: f64) {
    let tile = STROKE_WIDTH * state.canvas.scale() * output_scale;
    let strokes = state
        .drawing
        .strokes
        .iter()
        .chain(state.drawing.current_stroke());

    for stroke in strokes {
        let color = solid([stroke.color.r, stroke.color.g, stroke.color.b, 1.0]);
        for pair in stroke.points.windows(2) {
            let (x1, y1) = state.canvas.canvas_to_screen(pair[0].0, pair[0].1);
            let (x2, y2) = state.canvas.canvas_to_screen(pair[1].0, pair[1].1);
            for rect in chrome::stroke_tiles(
                x1 * output_scale,
                y1 * output_scale,
                x2 * output_scale,
                y2 * output_scale,
                tile,
            ) {
                ops.push(DrawOp::Rect { rect, color });
            }
        }
    }
}

/// Executes the draw list into a begun frame. A failing op aborts the
/// frame; the caller logs and carries on, the next frame will retry.
pub fn execute_frame(
    frame: &mut GlesFrame<'_, '_>,
    output_size: Size<i32, Physical>,
    ops: &[DrawOp],
) -> Result<(), GlesError> {
    frame.clear(solid(BACKGROUND_COLOR), &[Rectangle::from_size(output_size)])?;

    for op in ops {
        match op {
            DrawOp::Rect { rect, color } => {
                frame.draw_solid(*rect, &[Rectangle::from_size(rect.size)], *color)?;
            }
            DrawOp::Surface { element, scale } => {
                let dst = element.geometry(*scale);
                let damage = [Rectangle::from_size(dst.size)];
                RenderElement::<GlesRenderer>::draw(element, frame, element.src(), dst, &damage, &[])?;
            }
            DrawOp::Texture { texture, dst } => {
                let src = Rectangle::from_size(texture.size()).to_f64();
                frame.render_texture_from_to(
                    texture,
                    src,
                    *dst,
                    &[Rectangle::from_size(dst.size)],
                    &[],
                    Transform::Normal,
                    1.0,
                )?;
            }
        }
    }

    Ok(())
}
