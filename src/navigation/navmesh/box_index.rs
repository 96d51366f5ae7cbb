use bevy::prelude::*;
use smallvec::SmallVec;

use crate::navigation::math::NavBox;

/// Cap on grid cells, so a few huge boxes cannot blow up memory.
const MAX_CELLS: usize = 1 << 20;

/// Uniform grid over a set of boxes for overlap and point queries.
///
/// Each box is registered in every cell it overlaps. Queries gather the
/// cells covering the query area and deduplicate the ids found there.
#[derive(Clone, Debug, Default)]
pub(crate) struct BoxIndex {
    origin: Vec2,
    cell_size: f32,
    cols: usize,
    rows: usize,
    cells: Vec<SmallVec<[u32; 4]>>,
}

impl BoxIndex {
    pub fn build(boxes: &[NavBox], cell_size: f32) -> Self {
        if boxes.is_empty() {
            return Self::default();
        }

        let mut bounds = NavBox::EMPTY;
        let mut extent_sum = 0.0;
        for b in boxes {
            bounds.absorb(b.min);
            bounds.absorb(b.max);
            extent_sum += b.width().max(b.height());
        }

        let mut cell_size = if cell_size > 0.0 {
            cell_size
        } else {
            (extent_sum / boxes.len() as f32).max(f32::EPSILON)
        };

        let (cols, rows) = loop {
            if let Some(dims) = grid_dims(&bounds, cell_size) {
                break dims;
            }
            let wider = cell_size * 2.0;
            if !wider.is_finite() {
                warn!("[NAVMESH] Box index over {:?} collapsed to a single cell", bounds);
                cell_size = f32::MAX;
                break (1, 1);
            }
            cell_size = wider;
        };

        let mut index = Self {
            origin: bounds.min,
            cell_size,
            cols,
            rows,
            cells: vec![SmallVec::new(); cols * rows],
        };

        for (id, b) in boxes.iter().enumerate() {
            let (x0, x1, y0, y1) = index.cell_range(b);
            for y in y0..=y1 {
                for x in x0..=x1 {
                    index.cells[y * index.cols + x].push(id as u32);
                }
            }
        }

        index
    }

    fn cell_coord(&self, value: f32, origin: f32, count: usize) -> usize {
        let cell = ((value - origin) / self.cell_size).floor();
        if cell <= 0.0 {
            0
        } else {
            (cell as usize).min(count - 1)
        }
    }

    fn cell_range(&self, area: &NavBox) -> (usize, usize, usize, usize) {
        (
            self.cell_coord(area.min.x, self.origin.x, self.cols),
            self.cell_coord(area.max.x, self.origin.x, self.cols),
            self.cell_coord(area.min.y, self.origin.y, self.rows),
            self.cell_coord(area.max.y, self.origin.y, self.rows),
        )
    }

    /// Ids of boxes registered in cells overlapping `area`, sorted and unique.
    pub fn query_box(&self, area: &NavBox, out: &mut Vec<usize>) {
        out.clear();
        if self.cells.is_empty() {
            return;
        }
        let (x0, x1, y0, y1) = self.cell_range(area);
        for y in y0..=y1 {
            for x in x0..=x1 {
                out.extend(self.cells[y * self.cols + x].iter().map(|&id| id as usize));
            }
        }
        out.sort_unstable();
        out.dedup();
    }

    /// Ids of boxes registered in the cell holding `point`.
    ///
    /// Points outside the indexed area clamp to the border cells, so callers
    /// must still check containment.
    pub fn query_point(&self, point: Vec2) -> impl Iterator<Item = usize> + '_ {
        let cell = if self.cells.is_empty() {
            None
        } else {
            let x = self.cell_coord(point.x, self.origin.x, self.cols);
            let y = self.cell_coord(point.y, self.origin.y, self.rows);
            self.cells.get(y * self.cols + x)
        };
        cell.into_iter().flat_map(|ids| ids.iter().map(|&id| id as usize))
    }
}

/// Columns and rows covering `bounds`, or `None` past [`MAX_CELLS`].
fn grid_dims(bounds: &NavBox, cell_size: f32) -> Option<(usize, usize)> {
    let along = |span: f32| {
        let cells = (span / cell_size).floor();
        if !cells.is_finite() || cells >= MAX_CELLS as f32 {
            return None;
        }
        (cells.max(0.0) as usize).checked_add(1)
    };
    let cols = along(bounds.width())?;
    let rows = along(bounds.height())?;
    (cols.checked_mul(rows)? <= MAX_CELLS).then_some((cols, rows))
}
