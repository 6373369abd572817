use image::{RgbaImage, imageops};
use tracing::{info, warn};

use crate::core::params::CollageSettings;
use crate::core::raster::canvas_fits;

/// Grid geometry for a collage of `count` tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollageLayout {
    pub columns: u32,
    pub rows: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    pub spacing: u32,
}

impl CollageLayout {
    pub fn compute(count: usize, max_w: u32, max_h: u32, settings: &CollageSettings) -> Self {
        let n = count.max(1) as u32;
        let columns = if settings.columns > 0 {
            settings.columns.min(n)
        } else {
            (n as f64).sqrt().ceil() as u32
        };
        let rows = n.div_ceil(columns);
        let spacing = (max_w.max(max_h) as f64 * settings.spacing_percent.max(0.0) / 100.0).round() as u32;
        Self {
            columns,
            rows,
            cell_width: max_w,
            cell_height: max_h,
            spacing,
        }
    }

    /// Full canvas extent; `None` when it overflows or exceeds the canvas limit.
    pub fn canvas_size(&self) -> Option<(u32, u32)> {
        let extent = |cells: u32, cell: u32| -> Option<u32> {
            cells
                .checked_mul(cell)?
                .checked_add(cells.checked_add(1)?.checked_mul(self.spacing)?)
        };
        let size = (
            extent(self.columns, self.cell_width)?,
            extent(self.rows, self.cell_height)?,
        );
        canvas_fits(size.0, size.1).then_some(size)
    }

    /// Top-left of cell `index`, filled row by row. Only meaningful once
    /// [`canvas_size`](Self::canvas_size) has succeeded.
    pub fn cell_origin(&self, index: usize) -> (u32, u32) {
        let i = index as u32;
        let (col, row) = (i % self.columns, i / self.columns);
        (
            self.spacing + col * (self.cell_width + self.spacing),
            self.spacing + row * (self.cell_height + self.spacing),
        )
    }
}

/// Lay tiles out on a transparent grid, each centered in its cell.
/// `None` when there is nothing to place or the grid is too large to allocate.
pub fn assemble_collage(tiles: &[RgbaImage], settings: &CollageSettings) -> Option<RgbaImage> {
    let tiles: Vec<&RgbaImage> = tiles.iter().filter(|t| t.width() > 0 && t.height() > 0).collect();
    if tiles.is_empty() {
        warn!("Collage skipped: no usable images");
        return None;
    }
    let max_w = tiles.iter().map(|t| t.width()).max().unwrap_or(0);
    let max_h = tiles.iter().map(|t| t.height()).max().unwrap_or(0);
    let layout = CollageLayout::compute(tiles.len(), max_w, max_h, settings);
    let Some((cw, ch)) = layout.canvas_size() else {
        warn!(
            "Collage skipped: {}x{} grid of {}x{} cells with {}px spacing exceeds the canvas limit",
            layout.columns, layout.rows, max_w, max_h, layout.spacing
        );
        return None;
    };
    info!(
        "Collage grid {}x{} of {}x{} cells, spacing {}px, canvas {}x{}",
        layout.columns, layout.rows, max_w, max_h, layout.spacing, cw, ch
    );

    let mut canvas = RgbaImage::new(cw, ch);
    for (i, tile) in tiles.iter().enumerate() {
        let (ox, oy) = layout.cell_origin(i);
        let x = ox + (max_w - tile.width()) / 2;
        let y = oy + (max_h - tile.height()) / 2;
        imageops::overlay(&mut canvas, *tile, x as i64, y as i64);
    }
    Some(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn auto_columns_use_square_root() {
        let l = CollageLayout::compute(5, 10, 20, &CollageSettings::default());
        assert_eq!((l.columns, l.rows), (3, 2));
        let l = CollageLayout::compute(4, 10, 20, &CollageSettings::default());
        assert_eq!((l.columns, l.rows), (2, 2));
    }

    #[test]
    fn spacing_surrounds_every_cell() {
        let s = CollageSettings {
            columns: 2,
            spacing_percent: 10.0,
        };
        let l = CollageLayout::compute(3, 40, 20, &s);
        assert_eq!(l.spacing, 4);
        assert_eq!(l.canvas_size(), Some((2 * 40 + 3 * 4, 2 * 20 + 3 * 4)));
        assert_eq!(l.cell_origin(2), (4, 4 + 20 + 4));
    }

    #[test]
    fn tiles_are_centered_in_cells() {
        let big = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        let small = RgbaImage::from_pixel(2, 2, Rgba([0, 255, 0, 255]));
        let s = CollageSettings {
            columns: 2,
            spacing_percent: 0.0,
        };
        let out = assemble_collage(&[big, small], &s).unwrap();
        assert_eq!(out.dimensions(), (8, 4));
        assert_eq!(out.get_pixel(4, 0)[3], 0);
        assert_eq!(out.get_pixel(5, 1).0, [0, 255, 0, 255]);
    }

    #[test]
    fn oversized_spacing_gives_nothing() {
        let tile = RgbaImage::from_pixel(4, 4, Rgba([1, 1, 1, 255]));
        let s = CollageSettings {
            columns: 0,
            spacing_percent: 1e12,
        };
        let l = CollageLayout::compute(1, 4, 4, &s);
        assert_eq!(l.canvas_size(), None);
        assert!(assemble_collage(&[tile], &s).is_none());
    }

    #[test]
    fn empty_input_gives_nothing() {
        assert!(assemble_collage(&[], &CollageSettings::default()).is_none());
    }
}
