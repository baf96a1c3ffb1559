//! Pointer → tile resolution.

use crate::command::Vec2;

/// Map a surface-local pointer position to a tile index.
///
/// The surface is split evenly into `columns × rows` cells; the pointer's
/// cell is `col + row * columns`.  Positions outside the surface (negative,
/// or past an edge) are pulled onto the nearest boundary cell, and the
/// result is clamped to the last tile, so any input resolves to a valid
/// index.
///
/// Returns `None` only when there are no tiles.
pub fn hit_test(
    local: Vec2,
    surface: Vec2,
    columns: usize,
    rows: usize,
    tile_count: usize,
) -> Option<usize> {
    if tile_count == 0 || columns == 0 || rows == 0 {
        return None;
    }

    let col = cell_along(local.x, surface.x, columns);
    let row = cell_along(local.y, surface.y, rows);

    Some((col + row * columns).min(tile_count - 1))
}

/// `floor(pos / extent * cells)` clamped to `[0, cells - 1]`.
fn cell_along(pos: f64, extent: f64, cells: usize) -> usize {
    if !(extent > 0.0) || !pos.is_finite() {
        return 0;
    }
    let cell = (pos / extent * cells as f64).floor();
    if cell <= 0.0 {
        0
    } else {
        (cell as usize).min(cells - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SURFACE: Vec2 = Vec2::new(300.0, 200.0);

    #[test]
    fn center_of_three_by_two() {
        assert_eq!(hit_test(Vec2::new(150.0, 100.0), SURFACE, 3, 2, 6), Some(4));
        assert_eq!(hit_test(Vec2::new(150.0, 100.0), SURFACE, 3, 2, 5), Some(4));
    }

    #[test]
    fn corners() {
        assert_eq!(hit_test(Vec2::new(0.0, 0.0), SURFACE, 3, 2, 6), Some(0));
        assert_eq!(hit_test(Vec2::new(299.0, 0.0), SURFACE, 3, 2, 6), Some(2));
        assert_eq!(hit_test(Vec2::new(0.0, 199.0), SURFACE, 3, 2, 6), Some(3));
        assert_eq!(hit_test(Vec2::new(299.0, 199.0), SURFACE, 3, 2, 6), Some(5));
    }

    #[test]
    fn trailing_missing_cell_clamps_to_last_tile() {
        // 5 tiles, the bottom-right cell (index 5) does not exist.
        assert_eq!(hit_test(Vec2::new(299.0, 199.0), SURFACE, 3, 2, 5), Some(4));
    }

    #[test]
    fn outside_surface_resolves_to_boundary_tile() {
        assert_eq!(hit_test(Vec2::new(-50.0, -50.0), SURFACE, 3, 2, 6), Some(0));
        assert_eq!(hit_test(Vec2::new(900.0, 10.0), SURFACE, 3, 2, 6), Some(2));
        assert_eq!(hit_test(Vec2::new(10.0, 900.0), SURFACE, 3, 2, 6), Some(3));
        assert_eq!(hit_test(Vec2::new(1e9, 1e9), SURFACE, 3, 2, 6), Some(5));
        assert_eq!(hit_test(Vec2::new(f64::NAN, 150.0), SURFACE, 3, 2, 6), Some(3));
    }

    #[test]
    fn empty_grid_has_no_hit() {
        assert_eq!(hit_test(Vec2::new(10.0, 10.0), SURFACE, 3, 0, 0), None);
    }

    #[test]
    fn total_and_idempotent_over_a_sweep() {
        for count in 1..12 {
            let columns = 3;
            let rows = (count + columns - 1) / columns;
            for xi in -4..16 {
                for yi in -4..16 {
                    let p = Vec2::new(xi as f64 * 25.0, yi as f64 * 17.0);
                    let a = hit_test(p, SURFACE, columns, rows, count);
                    let b = hit_test(p, SURFACE, columns, rows, count);
                    assert_eq!(a, b);
                    let idx = a.unwrap();
                    assert!(idx < count, "index {} out of range for {} tiles", idx, count);
                }
            }
        }
    }
}
