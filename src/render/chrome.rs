//! Window chrome and stroke geometry, built entirely from filled
//! rectangles.
//!
//! Rounded borders and corner masks are approximated with one-pixel
//! horizontal spans per row: each span covers the ring between the inner
//! and outer corner circles. Strokes become runs of small square tiles
//! along each segment. Keeping this as plain rect-list generation means
//! the render pass needs nothing beyond a solid-fill primitive, and the
//! math is testable without a GPU.

use smithay::utils::{Physical, Rectangle};

fn rect(x: i32, y: i32, w: i32, h: i32) -> Rectangle<i32, Physical> {
    Rectangle::new((x, y).into(), (w, h).into())
}

/// Spans for a border ring drawn inside the outer box
/// `(x, y, width, height)`, `border_width` thick, with `corner_radius`
/// as the outer corner radius.
pub fn border_spans(
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    border_width: i32,
    corner_radius: i32,
) -> Vec<Rectangle<i32, Physical>> {
    let mut spans = Vec::new();
    if width <= 0 || height <= 0 || border_width <= 0 {
        return spans;
    }

    let max_radius = width.min(height) / 2;
    let corner_radius = corner_radius.clamp(0, max_radius);

    if corner_radius == 0 {
        spans.push(rect(x, y, width, border_width));
        spans.push(rect(x, y + height - border_width, width, border_width));
        spans.push(rect(x, y + border_width, border_width, height - 2 * border_width));
        spans.push(rect(
            x + width - border_width,
            y + border_width,
            border_width,
            height - 2 * border_width,
        ));
        return spans;
    }

    // Straight edges between the corner arcs.
    if width > 2 * corner_radius {
        spans.push(rect(x + corner_radius, y, width - 2 * corner_radius, border_width));
        spans.push(rect(
            x + corner_radius,
            y + height - border_width,
            width - 2 * corner_radius,
            border_width,
        ));
    }
    if height > 2 * corner_radius {
        spans.push(rect(x, y + corner_radius, border_width, height - 2 * corner_radius));
        spans.push(rect(
            x + width - border_width,
            y + corner_radius,
            border_width,
            height - 2 * corner_radius,
        ));
    }

    // Rounded corners: per row, one span covering the ring between the
    // outer and inner circles.
    let outer_r = corner_radius as f64;
    let inner_r = ((corner_radius - border_width).max(0)) as f64;

    for row in 0..corner_radius {
        let dy = corner_radius as f64 - row as f64 - 0.5;

        let outer_extent = if dy <= outer_r {
            (outer_r * outer_r - dy * dy).sqrt()
        } else {
            0.0
        };
        let inner_extent = if dy <= inner_r {
            (inner_r * inner_r - dy * dy).sqrt()
        } else {
            0.0
        };

        let seg_start = ((corner_radius as f64 - outer_extent).floor() as i32).max(0);
        let seg_end = ((corner_radius as f64 - inner_extent).ceil() as i32)
            .min(corner_radius)
            .max(seg_start);
        let seg_width = seg_end - seg_start;
        if seg_width <= 0 {
            continue;
        }

        let mirrored_x = x + width - corner_radius + (corner_radius - seg_end);

        spans.push(rect(x + seg_start, y + row, seg_width, 1));
        spans.push(rect(mirrored_x, y + row, seg_width, 1));
        spans.push(rect(x + seg_start, y + height - 1 - row, seg_width, 1));
        spans.push(rect(mirrored_x, y + height - 1 - row, seg_width, 1));
    }

    spans
}

/// Background-coloured slivers over the four corners of the content
/// rectangle, rounding it off without any path primitive.
pub fn corner_mask_spans(
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    corner_radius: i32,
) -> Vec<Rectangle<i32, Physical>> {
    let mut spans = Vec::new();
    if width <= 0 || height <= 0 || corner_radius <= 0 {
        return spans;
    }

    let max_radius = width.min(height) / 2;
    let corner_radius = corner_radius.min(max_radius);
    let r = corner_radius as f64;

    for row in 0..corner_radius {
        let dy = r - row as f64 - 0.5;
        let dx = if dy <= r { (r * r - dy * dy).sqrt() } else { 0.0 };
        let fill_width = (r - dx).floor() as i32;
        if fill_width <= 0 {
            continue;
        }

        spans.push(rect(x, y + row, fill_width, 1));
        spans.push(rect(x + width - fill_width, y + row, fill_width, 1));
        spans.push(rect(x, y + height - 1 - row, fill_width, 1));
        spans.push(rect(x + width - fill_width, y + height - 1 - row, fill_width, 1));
    }

    spans
}

/// Square tiles approximating one stroke segment. `tile` is the tile
/// edge length in physical pixels; the segment is subdivided every two
/// pixels, giving `ceil(len / 2) + 1` tiles so consecutive tiles
/// overlap into a solid line.
pub fn stroke_tiles(
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    tile: f64,
) -> Vec<Rectangle<i32, Physical>> {
    let mut tiles = Vec::new();

    let dx = x2 - x1;
    let dy = y2 - y1;
    let length = (dx * dx + dy * dy).sqrt();
    if length <= 0.1 {
        return tiles;
    }

    let segments = (length / 2.0).ceil() as i32;
    for i in 0..=segments {
        let t = i as f64 / segments as f64;
        let cx = x1 + dx * t;
        let cy = y1 + dy * t;
        tiles.push(rect(
            (cx - tile / 2.0) as i32,
            (cy - tile / 2.0) as i32,
            tile as i32 + 1,
            tile as i32 + 1,
        ));
    }

    tiles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(spans: &[Rectangle<i32, Physical>]) -> Rectangle<i32, Physical> {
        let mut it = spans.iter();
        let mut acc = *it.next().unwrap();
        for r in it {
            acc = acc.merge(*r);
        }
        acc
    }

    #[test]
    fn square_border_has_four_sides() {
        let spans = border_spans(10, 10, 100, 80, 3, 0);
        assert_eq!(spans.len(), 4);
        assert_eq!(bounds(&spans), Rectangle::new((10, 10).into(), (100, 80).into()));
    }

    #[test]
    fn rounded_border_stays_inside_its_box() {
        let outer = Rectangle::new((0, 0).into(), (200, 150).into());
        let spans = border_spans(0, 0, 200, 150, 3, 13);
        assert!(!spans.is_empty());
        for span in &spans {
            assert!(
                outer.contains_rect(*span),
                "span {span:?} escapes the border box"
            );
        }
        // Straight edges leave room for the corner arcs.
        assert!(spans[0].loc.x == 13);
    }

    #[test]
    fn corner_rows_cover_the_radius() {
        let spans = border_spans(0, 0, 100, 100, 3, 10);
        // Four straight edges plus up to four spans per corner row.
        let corner_spans = spans.len() - 4;
        assert!(corner_spans > 0);
        assert!(corner_spans <= 4 * 10);
    }

    #[test]
    fn degenerate_border_is_empty() {
        assert!(border_spans(0, 0, 0, 50, 3, 10).is_empty());
        assert!(border_spans(0, 0, 50, 50, 0, 10).is_empty());
    }

    #[test]
    fn corner_masks_shrink_towards_the_middle() {
        let spans = corner_mask_spans(0, 0, 400, 300, 10);
        assert!(!spans.is_empty());

        // The widest fill is at the outermost row and is below the radius.
        let top_left: Vec<_> = spans
            .iter()
            .filter(|r| r.loc.x == 0 && r.loc.y < 10)
            .collect();
        let mut last_width = i32::MAX;
        for row in 0..10 {
            if let Some(span) = top_left.iter().find(|r| r.loc.y == row) {
                assert!(span.size.w <= last_width);
                last_width = span.size.w;
            }
        }
        assert!(top_left[0].size.w < 10);
    }

    #[test]
    fn corner_masks_empty_without_radius() {
        assert!(corner_mask_spans(0, 0, 100, 100, 0).is_empty());
    }

    #[test]
    fn stroke_tiles_follow_the_segment() {
        let tiles = stroke_tiles(0.0, 0.0, 100.0, 0.0, 4.0);
        // length 100 -> 50 subdivisions, 51 tiles.
        assert_eq!(tiles.len(), 51);
        assert_eq!(tiles[0].loc, (-2, -2).into());
        let last = tiles.last().unwrap();
        assert_eq!(last.loc, (98, -2).into());
        for tile in &tiles {
            assert_eq!(tile.size.w, 5);
            assert_eq!(tile.size.h, 5);
        }
    }

    #[test]
    fn tiny_segments_draw_nothing() {
        assert!(stroke_tiles(5.0, 5.0, 5.05, 5.0, 4.0).is_empty());
    }
}
