//! Window gathering: contracts scattered windows toward their shared
//! centroid, clamped so no window's bounding box reaches closer to the
//! centroid than `minimum_gap`.

/// Position and size of one window, `(x, y, w, h)` in canvas units.
pub type GatherRect = (f64, f64, f64, f64);

/// Halves every window's centre distance to the centroid, subject to the
/// per-window minimum-distance clamp, and returns the centroid of the
/// final positions (the viewport snap target). Returns `None` when there
/// is nothing to gather.
///
/// Windows already at the centroid (distance below 1e-3) stay put.
pub fn gather_positions(rects: &mut [GatherRect], minimum_gap: f64) -> Option<(f64, f64)> {
    if rects.is_empty() {
        return None;
    }

    let centroid = centroid_of(rects);

    for rect in rects.iter_mut() {
        let (x, y, w, h) = *rect;
        let centre = (x + w / 2.0, y + h / 2.0);
        let vx = centre.0 - centroid.0;
        let vy = centre.1 - centroid.1;
        let d = (vx * vx + vy * vy).sqrt();
        if d < 1e-3 {
            continue;
        }

        let ux = vx / d;
        let uy = vy / d;

        // Distance from the window centre to its bounding-box edge along
        // the direction of travel.
        let edge_x = if ux.abs() > f64::EPSILON {
            (w / 2.0) / ux.abs()
        } else {
            f64::INFINITY
        };
        let edge_y = if uy.abs() > f64::EPSILON {
            (h / 2.0) / uy.abs()
        } else {
            f64::INFINITY
        };
        let edge = edge_x.min(edge_y);

        let min_distance = edge + minimum_gap;
        let new_d = (d * 0.5).max(min_distance);

        let new_centre = (centroid.0 + ux * new_d, centroid.1 + uy * new_d);
        rect.0 = new_centre.0 - w / 2.0;
        rect.1 = new_centre.1 - h / 2.0;
    }

    // Clamped windows may have shifted the balance point; snap the
    // viewport onto the centroid of where everything actually landed.
    Some(centroid_of(rects))
}

fn centroid_of(rects: &[GatherRect]) -> (f64, f64) {
    let mut sum = (0.0, 0.0);
    for &(x, y, w, h) in rects {
        sum.0 += x + w / 2.0;
        sum.1 += y + h / 2.0;
    }
    let n = rects.len() as f64;
    (sum.0 / n, sum.1 / n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_has_no_target() {
        assert_eq!(gather_positions(&mut [], 20.0), None);
    }

    #[test]
    fn single_view_keeps_position() {
        let mut rects = [(40.0, 60.0, 100.0, 80.0)];
        let target = gather_positions(&mut rects, 20.0).unwrap();
        assert_eq!(rects[0], (40.0, 60.0, 100.0, 80.0));
        // The animation target is that view's centre.
        assert_eq!(target, (90.0, 100.0));
    }

    #[test]
    fn two_views_halve_their_distance() {
        let mut rects = [(0.0, 0.0, 100.0, 100.0), (300.0, 0.0, 100.0, 100.0)];
        let target = gather_positions(&mut rects, 20.0).unwrap();

        // Centroid (200, 50); centre distance 150 halves to 75, which is
        // above the minimum clamp of 50 + 20.
        assert_eq!(rects[0].0, 75.0);
        assert_eq!(rects[0].1, 0.0);
        assert_eq!(rects[1].0, 225.0);
        assert_eq!(target, (200.0, 50.0));
    }

    #[test]
    fn close_views_stop_at_the_clamp() {
        // Centre distance 80; halving would give 40, below the clamp of
        // 50 + 20 = 70, so both stop exactly at 70 from the centroid.
        let mut rects = [(0.0, 0.0, 100.0, 100.0), (160.0, 0.0, 100.0, 100.0)];
        gather_positions(&mut rects, 20.0).unwrap();

        let centroid_x = 130.0;
        let c0 = rects[0].0 + 50.0;
        let c1 = rects[1].0 + 50.0;
        assert_eq!((centroid_x - c0).abs(), 70.0);
        assert_eq!((c1 - centroid_x).abs(), 70.0);
    }

    #[test]
    fn repeated_gather_converges_to_clamp() {
        let mut rects = [(0.0, 0.0, 100.0, 100.0), (2000.0, 0.0, 100.0, 100.0)];
        for _ in 0..32 {
            gather_positions(&mut rects, 20.0);
        }
        let again = rects;
        let mut once_more = rects;
        gather_positions(&mut once_more, 20.0);

        // Fixed point: every view sits at its minimum-distance clamp.
        for (a, b) in again.iter().zip(once_more.iter()) {
            assert!((a.0 - b.0).abs() < 1e-6);
            assert!((a.1 - b.1).abs() < 1e-6);
        }
    }

    #[test]
    fn view_on_centroid_is_not_moved() {
        let mut rects = [
            (-50.0, -50.0, 100.0, 100.0), // centre exactly on centroid
            (-500.0, 0.0, 100.0, 100.0),
            (500.0, 0.0, 100.0, 100.0),
            (0.0, -500.0, 100.0, 100.0),
            (0.0, 500.0, 100.0, 100.0),
        ];
        gather_positions(&mut rects, 20.0).unwrap();
        assert_eq!(rects[0], (-50.0, -50.0, 100.0, 100.0));
    }

    #[test]
    fn diagonal_travel_uses_nearest_edge() {
        // A wide flat window approaching diagonally is limited by its
        // short side.
        let mut rects = [
            (-1000.0, -1000.0, 400.0, 40.0),
            (1000.0, 1000.0, 400.0, 40.0),
        ];
        gather_positions(&mut rects, 10.0).unwrap();
        // Both moved inward.
        assert!(rects[0].0 > -1000.0);
        assert!(rects[1].0 < 1000.0);
    }
}
