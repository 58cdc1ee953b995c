//! Alt-Tab window switcher overlay.
//!
//! The overlay lists every view as an `app_id - title` row and snaps the
//! viewport onto the confirmed one. Rows are rendered with cairo/pango
//! into an ARGB surface at physical resolution, uploaded once as a
//! texture and drawn 1:1 centred on the output; the texture is
//! regenerated lazily when marked dirty and freed on confirm/cancel.

use anyhow::Context as _;
use log::{debug, warn};
use smithay::backend::allocator::Fourcc;
use smithay::backend::renderer::ImportMem;
use smithay::backend::renderer::gles::{GlesRenderer, GlesTexture};
use smithay::utils::{Physical, Size};

use crate::view::ViewId;

const PADDING: i32 = 20;
const ITEM_HEIGHT: i32 = 40;
const ITEM_PADDING: i32 = 10;
const FONT: &str = "Sans 14";
const MIN_WIDTH: i32 = 300;

const BG: (f64, f64, f64, f64) = (0.15, 0.15, 0.15, 0.95);
const TEXT: (f64, f64, f64) = (1.0, 1.0, 1.0);
const HIGHLIGHT: (f64, f64, f64, f64) = (0.3, 0.5, 0.8, 0.8);

/// One row of the overlay.
pub struct SwitcherRow {
    pub app_id: String,
    pub title: String,
    pub selected: bool,
}

/// Switcher state: inactive until started, then cycling a selection over
/// the view list until confirmed or cancelled.
#[derive(Default)]
pub struct Switcher {
    pub active: bool,
    pub selected: Option<ViewId>,
    pub dirty: bool,
    texture: Option<(GlesTexture, Size<i32, Physical>)>,
}

impl Switcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activates the switcher over the given front-to-back id list.
    /// No-ops when there is nothing to switch to. The initial selection
    /// is the second view when there are at least two, so a single
    /// Tab-and-release lands on the most recent other window.
    pub fn start(&mut self, ids: &[ViewId]) {
        let Some(selected) = initial_selection(ids) else {
            return;
        };
        self.active = true;
        self.selected = Some(selected);
        self.dirty = true;
        debug!("switcher started, selected {:?}", selected);
    }

    pub fn next(&mut self, ids: &[ViewId]) {
        if !self.active {
            return;
        }
        self.selected = cycle(ids, self.selected, 1);
        self.dirty = true;
    }

    pub fn prev(&mut self, ids: &[ViewId]) {
        if !self.active {
            return;
        }
        self.selected = cycle(ids, self.selected, -1);
        self.dirty = true;
    }

    /// Deactivates and drops the cached texture. The selected id is
    /// returned so the caller can snap the viewport onto it; `cancel`
    /// goes through here with the result ignored.
    pub fn finish(&mut self) -> Option<ViewId> {
        let selected = self.selected.take();
        self.active = false;
        self.texture = None;
        selected
    }

    pub fn cancel(&mut self) {
        self.finish();
        debug!("switcher cancelled");
    }

    /// Scrubs a destroyed view from the selection, moving it to the
    /// front-most remaining view (or deactivating when none remain).
    pub fn forget_view(&mut self, id: ViewId, remaining: &[ViewId]) {
        if self.selected == Some(id) {
            self.selected = remaining.first().copied();
            self.dirty = true;
            if self.selected.is_none() {
                self.active = false;
                self.texture = None;
            }
        }
    }

    /// The texture to draw this frame, regenerating it first if needed.
    pub fn texture(
        &mut self,
        renderer: &mut GlesRenderer,
        rows: &[SwitcherRow],
        output_scale: f64,
    ) -> Option<(GlesTexture, Size<i32, Physical>)> {
        if !self.active {
            return None;
        }
        if self.dirty || self.texture.is_none() {
            match render_rows(renderer, rows, output_scale) {
                Ok(texture) => {
                    self.texture = Some(texture);
                    self.dirty = false;
                }
                Err(err) => {
                    warn!("failed to render switcher overlay: {err:#}");
                    return None;
                }
            }
        }
        self.texture.clone()
    }
}

/// Second view when possible, else the only one.
fn initial_selection(ids: &[ViewId]) -> Option<ViewId> {
    match ids {
        [] => None,
        [only] => Some(*only),
        [_, second, ..] => Some(*second),
    }
}

/// Moves the selection by `step`, wrapping at either end. A selection
/// that no longer exists restarts from the front.
fn cycle(ids: &[ViewId], current: Option<ViewId>, step: i32) -> Option<ViewId> {
    if ids.is_empty() {
        return None;
    }
    let len = ids.len() as i32;
    let index = current
        .and_then(|id| ids.iter().position(|&v| v == id))
        .map(|i| i as i32)
        .unwrap_or(0);
    let next = (index + step).rem_euclid(len);
    Some(ids[next as usize])
}

/// Draws the row list with cairo/pango at physical resolution and
/// uploads it as a GLES texture.
fn render_rows(
    renderer: &mut GlesRenderer,
    rows: &[SwitcherRow],
    output_scale: f64,
) -> anyhow::Result<(GlesTexture, Size<i32, Physical>)> {
    anyhow::ensure!(!rows.is_empty(), "no views to render");

    let width = MIN_WIDTH;
    let height = PADDING * 2 + rows.len() as i32 * ITEM_HEIGHT;
    let physical_width = (width as f64 * output_scale) as i32;
    let physical_height = (height as f64 * output_scale) as i32;

    let surface =
        cairo::ImageSurface::create(cairo::Format::ARgb32, physical_width, physical_height)
            .context("allocating overlay surface")?;
    {
        let cr = cairo::Context::new(&surface).context("creating cairo context")?;
        // Draw in logical coordinates, rasterize at physical resolution.
        cr.scale(output_scale, output_scale);

        rounded_rect(&cr, 0.0, 0.0, width as f64, height as f64, 10.0);
        cr.set_source_rgba(BG.0, BG.1, BG.2, BG.3);
        cr.fill()?;

        let layout = pangocairo::functions::create_layout(&cr);
        let font = pango::FontDescription::from_string(FONT);
        layout.set_font_description(Some(&font));
        layout.set_width((width - PADDING * 2) * pango::SCALE);
        layout.set_ellipsize(pango::EllipsizeMode::End);

        let mut item_y = PADDING as f64;
        for row in rows {
            if row.selected {
                cr.set_source_rgba(HIGHLIGHT.0, HIGHLIGHT.1, HIGHLIGHT.2, HIGHLIGHT.3);
                rounded_rect(
                    &cr,
                    ITEM_PADDING as f64,
                    item_y,
                    (width - ITEM_PADDING * 2) as f64,
                    (ITEM_HEIGHT - 4) as f64,
                    5.0,
                );
                cr.fill()?;
            }

            cr.set_source_rgb(TEXT.0, TEXT.1, TEXT.2);
            let app_id = if row.app_id.is_empty() { "unknown" } else { &row.app_id };
            let title = if row.title.is_empty() { "(untitled)" } else { &row.title };
            layout.set_text(&format!("{app_id} - {title}"));
            cr.move_to(PADDING as f64, item_y + (ITEM_HEIGHT as f64 - 20.0) / 2.0);
            pangocairo::functions::show_layout(&cr, &layout);

            item_y += ITEM_HEIGHT as f64;
        }
    }

    surface.flush();
    let data = surface.data().context("reading overlay pixels")?;
    let size = Size::<i32, smithay::utils::Buffer>::from((physical_width, physical_height));
    let texture = renderer
        .import_memory(&data, Fourcc::Argb8888, size, false)
        .context("uploading overlay texture")?;

    Ok((texture, Size::from((physical_width, physical_height))))
}

fn rounded_rect(cr: &cairo::Context, x: f64, y: f64, w: f64, h: f64, r: f64) {
    use std::f64::consts::PI;
    cr.new_sub_path();
    cr.arc(x + w - r, y + r, r, -PI / 2.0, 0.0);
    cr.arc(x + w - r, y + h - r, r, 0.0, PI / 2.0);
    cr.arc(x + r, y + h - r, r, PI / 2.0, PI);
    cr.arc(x + r, y + r, r, PI, 3.0 * PI / 2.0);
    cr.close_path();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> Vec<ViewId> {
        raw.iter().map(|&n| ViewId(n)).collect()
    }

    #[test]
    fn start_selects_most_recent_other() {
        assert_eq!(initial_selection(&ids(&[])), None);
        assert_eq!(initial_selection(&ids(&[7])), Some(ViewId(7)));
        assert_eq!(initial_selection(&ids(&[7, 8, 9])), Some(ViewId(8)));
    }

    #[test]
    fn cycle_wraps_both_ways() {
        let list = ids(&[1, 2, 3]);
        assert_eq!(cycle(&list, Some(ViewId(3)), 1), Some(ViewId(1)));
        assert_eq!(cycle(&list, Some(ViewId(1)), -1), Some(ViewId(3)));
        assert_eq!(cycle(&list, Some(ViewId(2)), 1), Some(ViewId(3)));
    }

    #[test]
    fn cycle_recovers_from_stale_selection() {
        let list = ids(&[1, 2, 3]);
        assert_eq!(cycle(&list, Some(ViewId(42)), 1), Some(ViewId(2)));
        assert_eq!(cycle(&[], Some(ViewId(1)), 1), None);
    }

    #[test]
    fn inactive_switcher_ignores_navigation() {
        let mut switcher = Switcher::new();
        let list = ids(&[1, 2]);
        switcher.next(&list);
        switcher.prev(&list);
        assert_eq!(switcher.selected, None);
        assert!(!switcher.active);
    }

    #[test]
    fn start_next_finish_sequence() {
        let mut switcher = Switcher::new();
        let list = ids(&[10, 20, 30]);

        switcher.start(&list);
        assert!(switcher.active);
        assert_eq!(switcher.selected, Some(ViewId(20)));

        switcher.next(&list);
        assert_eq!(switcher.selected, Some(ViewId(30)));

        assert_eq!(switcher.finish(), Some(ViewId(30)));
        assert!(!switcher.active);
        assert_eq!(switcher.selected, None);
    }

    #[test]
    fn start_with_empty_list_is_noop() {
        let mut switcher = Switcher::new();
        switcher.start(&[]);
        assert!(!switcher.active);
    }

    #[test]
    fn destroyed_selection_moves_to_front() {
        let mut switcher = Switcher::new();
        let list = ids(&[1, 2, 3]);
        switcher.start(&list);
        assert_eq!(switcher.selected, Some(ViewId(2)));

        switcher.forget_view(ViewId(2), &ids(&[1, 3]));
        assert_eq!(switcher.selected, Some(ViewId(1)));
        assert!(switcher.active);

        switcher.forget_view(ViewId(1), &[]);
        assert!(!switcher.active);
        assert_eq!(switcher.selected, None);
    }
}
