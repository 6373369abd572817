//! Near-white background punch-through.
//!
//! `Full` clears every near-white pixel. `Edges` clears only near-white pixels
//! reachable from the border through other near-white pixels, using an explicit
//! queue over a tri-state grid so large images never grow the call stack.
use std::collections::VecDeque;

use image::{Rgba, RgbaImage};
use ndarray::Array2;
use tracing::{debug, info};

use crate::core::raster::{RasterImage, Staged};
use crate::types::RemovalMode;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Visit {
    Unvisited,
    Removable,
    Boundary,
}

#[inline]
fn is_near_white(px: &Rgba<u8>, cutoff: u8) -> bool {
    px[0] >= cutoff && px[1] >= cutoff && px[2] >= cutoff
}

/// Clear every pixel with alpha > 0 whose RGB are all >= `255 - tolerance`.
/// Returns the number of cleared pixels.
pub fn remove_full(img: &mut RgbaImage, tolerance: u8) -> usize {
    let cutoff = 255 - tolerance;
    let mut cleared = 0;
    for px in img.pixels_mut() {
        if px[3] > 0 && is_near_white(px, cutoff) {
            px[3] = 0;
            cleared += 1;
        }
    }
    cleared
}

/// Multi-source 4-connected flood fill from every border pixel.
///
/// Already transparent pixels count as background and keep the fill going.
/// A pixel failing the white test is marked `Boundary` the moment it is reached
/// and walls off whatever lies behind it.
pub fn remove_edges(img: &mut RgbaImage, tolerance: u8) -> usize {
    let cutoff = 255 - tolerance;
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return 0;
    }
    let (w, h) = (w as usize, h as usize);
    let mut grid = Array2::from_elem((h, w), Visit::Unvisited);
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();

    let passable = |img: &RgbaImage, y: usize, x: usize| {
        let px = img.get_pixel(x as u32, y as u32);
        px[3] == 0 || is_near_white(px, cutoff)
    };

    let visit = |img: &RgbaImage,
                 grid: &mut Array2<Visit>,
                 queue: &mut VecDeque<(usize, usize)>,
                 y: usize,
                 x: usize| {
        if grid[[y, x]] != Visit::Unvisited {
            return;
        }
        if passable(img, y, x) {
            grid[[y, x]] = Visit::Removable;
            queue.push_back((y, x));
        } else {
            grid[[y, x]] = Visit::Boundary;
        }
    };

    let view: &RgbaImage = img;
    for x in 0..w {
        visit(view, &mut grid, &mut queue, 0, x);
        visit(view, &mut grid, &mut queue, h - 1, x);
    }
    for y in 0..h {
        visit(view, &mut grid, &mut queue, y, 0);
        visit(view, &mut grid, &mut queue, y, w - 1);
    }

    while let Some((y, x)) = queue.pop_front() {
        if y > 0 {
            visit(view, &mut grid, &mut queue, y - 1, x);
        }
        if y + 1 < h {
            visit(view, &mut grid, &mut queue, y + 1, x);
        }
        if x > 0 {
            visit(view, &mut grid, &mut queue, y, x - 1);
        }
        if x + 1 < w {
            visit(view, &mut grid, &mut queue, y, x + 1);
        }
    }

    let mut cleared = 0;
    for ((y, x), state) in grid.indexed_iter() {
        if *state == Visit::Removable {
            let px = img.get_pixel_mut(x as u32, y as u32);
            if px[3] != 0 {
                px[3] = 0;
                cleared += 1;
            }
        }
    }
    cleared
}

/// Background removal stage. The result is always RGBA, even when removal is
/// skipped because `tolerance` is `None`.
pub fn remove_white_background(
    image: RasterImage,
    tolerance: Option<u8>,
    mode: RemovalMode,
) -> Staged {
    let mut rgba = image.into_rgba();
    let Some(tolerance) = tolerance else {
        debug!("Background removal skipped: no tolerance");
        return Staged::unchanged(rgba);
    };

    let cleared = match mode {
        RemovalMode::Full => remove_full(&mut rgba, tolerance),
        RemovalMode::Edges => remove_edges(&mut rgba, tolerance),
    };
    info!(
        "Background removal ({}, tolerance {}): {} pixels cleared",
        mode, tolerance, cleared
    );
    if cleared > 0 {
        Staged::applied(rgba)
    } else {
        Staged::unchanged(rgba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    /// White ring, black ring, then a white core with one dark pixel inside.
    fn ringed() -> RgbaImage {
        RgbaImage::from_fn(7, 7, |x, y| {
            let d = x.min(y).min(6 - x).min(6 - y);
            match (d, x, y) {
                (0, _, _) => WHITE,
                (1, _, _) => BLACK,
                (_, 3, 3) => Rgba([10, 10, 10, 255]),
                _ => WHITE,
            }
        })
    }

    #[test]
    fn full_mode_is_content_blind() {
        let mut img = ringed();
        let cleared = remove_full(&mut img, 0);
        assert_eq!(cleared, 24 + 8);
        assert_eq!(img.get_pixel(2, 2)[3], 0);
        assert_eq!(img.get_pixel(3, 3)[3], 255);
    }

    #[test]
    fn edges_mode_keeps_enclosed_white() {
        let mut img = ringed();
        let cleared = remove_edges(&mut img, 0);
        assert_eq!(cleared, 24);
        assert_eq!(img.get_pixel(0, 0)[3], 0);
        assert_eq!(img.get_pixel(1, 1)[3], 255);
        assert_eq!(img.get_pixel(2, 2)[3], 255);
    }

    #[test]
    fn edges_mode_follows_white_corridors() {
        let mut img = ringed();
        // open a gap in the black ring
        img.put_pixel(3, 1, WHITE);
        remove_edges(&mut img, 0);
        assert_eq!(img.get_pixel(2, 2)[3], 0);
        assert_eq!(img.get_pixel(3, 3)[3], 255);
    }

    #[test]
    fn tolerance_widens_cutoff() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([245, 250, 255, 255]));
        img.put_pixel(1, 0, Rgba([244, 250, 255, 255]));
        assert_eq!(remove_full(&mut img, 10), 1);
        assert_eq!(img.get_pixel(0, 0)[3], 0);
        assert_eq!(img.get_pixel(1, 0)[3], 255);
    }

    #[test]
    fn missing_tolerance_still_yields_rgba() {
        let rgb = RgbImage::from_pixel(3, 3, Rgb([255, 255, 255]));
        let out = remove_white_background(rgb.into(), None, RemovalMode::Full);
        assert!(!out.applied);
        match out.image {
            RasterImage::Rgba(img) => assert!(img.pixels().all(|p| p[3] == 255)),
            other => panic!("expected RGBA, got {}", other.color_model()),
        }
    }
}
