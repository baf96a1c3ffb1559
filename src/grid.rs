//! Grid layout for overview tiles.
//!
//! Tiles fill a `columns × rows` grid row by row: tile `i` sits in slot
//! `(i % columns, i / columns)`.  The number of rows follows from the tile
//! count, so trailing cells of the last row are simply absent.
//!
//! Tiles are sized by the *larger* grid dimension so they stay square-ish
//! and the whole grid fits the surface whatever its aspect ratio.  Gap
//! pixels are taken out before dividing, which keeps gaps visually constant
//! whatever the grid size.
//!
//! Everything here is a pure function of its inputs.  A [`GridGeometry`] is
//! recomputed whenever it is needed and never cached beyond one frame.

use crate::command::{Rect, Vec2};
use std::num::NonZeroUsize;

/// Position of a tile in the grid as `(column, row)`.
pub type GridSlot = (usize, usize);

/// Derived grid layout for one tile count and surface size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    /// Configured column count.
    pub columns: usize,
    /// `ceil(tile_count / columns)`; `0` for an empty grid.
    pub rows: usize,
    /// Number of tiles laid out.
    pub tile_count: usize,
    /// Gap between tiles after scaling by the transition percent.
    pub gap: f64,
    /// Surface size divided by the larger grid dimension.
    pub tile_size: Vec2,
    /// Tile size with the gaps taken out.
    pub tile_render_size: Vec2,
}

/// Slot of tile `index` in a grid with `columns` columns.
pub fn slot_of(index: usize, columns: NonZeroUsize) -> GridSlot {
    (index % columns.get(), index / columns.get())
}

/// Lay out `tile_count` tiles on a surface of size `surface`.
///
/// `gap` is the configured gap in logical pixels; it is multiplied by
/// `anim_percent` so gaps open up as the grid zooms out.  Pass `1.0` for the
/// settled grid.
pub fn compute_geometry(
    tile_count: usize,
    columns: NonZeroUsize,
    gap: f64,
    surface: Vec2,
    anim_percent: f64,
) -> GridGeometry {
    let columns = columns.get();
    let rows = tile_count.div_ceil(columns);
    let divisor = columns.max(rows) as f64;
    let gap = gap * anim_percent;

    GridGeometry {
        columns,
        rows,
        tile_count,
        gap,
        tile_size: surface / divisor,
        tile_render_size: (surface - Vec2::splat(gap) * (divisor - 1.0)) / divisor,
    }
}

impl GridGeometry {
    /// The larger grid dimension; the grid is `divisor` tiles across at its
    /// widest.  Never `0`.
    pub fn divisor(&self) -> usize {
        self.columns.max(self.rows)
    }

    /// Slot of tile `index`.
    pub fn slot(&self, index: usize) -> GridSlot {
        (index % self.columns, index / self.columns)
    }

    /// On-screen rectangle of tile `index`, relative to the grid origin.
    pub fn tile_rect(&self, index: usize) -> Rect {
        let (col, row) = self.slot(index);
        let (col, row) = (col as f64, row as f64);
        Rect::new(
            col * self.tile_render_size.x + col * self.gap,
            row * self.tile_render_size.y + row * self.gap,
            self.tile_render_size.x,
            self.tile_render_size.y,
        )
    }

    /// Rectangles of every tile, in tile order.
    pub fn tile_rects(&self) -> impl Iterator<Item = Rect> + '_ {
        (0..self.tile_count).map(|i| self.tile_rect(i))
    }

    /// Animated `size` at which one tile exactly covers `surface`.
    pub fn focused_size(&self, surface: Vec2) -> Vec2 {
        surface * self.divisor() as f64
    }

    /// Animated `position` that puts tile `index` at the surface origin when
    /// the grid is drawn at [`focused_size`](Self::focused_size).
    ///
    /// `scale` is the monitor scale; positions are in pixel space.
    pub fn focused_position(&self, index: usize, scale: f64) -> Vec2 {
        let (col, row) = self.slot(index);
        -(self.tile_size * Vec2::new(col as f64, row as f64)) * scale * self.divisor() as f64
    }
}

//  Tests
