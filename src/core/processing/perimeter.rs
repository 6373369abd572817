use image::RgbaImage;
use tracing::{debug, warn};

use crate::core::raster::RasterImage;

/// Channel value of `c` composited over white with the given alpha.
#[inline]
fn over_white(c: u8, a: u8) -> u8 {
    let (c, a) = (c as u32, a as u32);
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

/// Effective (horizontal, vertical) band widths for a requested margin.
///
/// Each is clamped to half the matching dimension and raised to 1px when a
/// margin was requested and the dimension is non-zero.
pub fn effective_margins(width: u32, height: u32, margin: u32) -> (u32, u32) {
    if margin == 0 {
        return (0, 0);
    }
    let fit = |dim: u32| {
        let m = margin.min(dim / 2);
        if m == 0 && dim > 0 { 1 } else { m }
    };
    (fit(width), fit(height))
}

fn rgba_perimeter_is_white(img: &RgbaImage, cutoff: u8, mw: u32, mh: u32) -> bool {
    let (w, h) = img.dimensions();
    let white = |x: u32, y: u32| {
        let p = img.get_pixel(x, y);
        (0..3).all(|i| over_white(p[i], p[3]) >= cutoff)
    };

    let rows = (0..mh).chain(h - mh..h);
    for y in rows {
        if !(0..w).all(|x| white(x, y)) {
            debug!("Non-white pixel in horizontal band at row {}", y);
            return false;
        }
    }
    let cols = (0..mw).chain(w - mw..w);
    for x in cols {
        if !(mh..h - mh).all(|y| white(x, y)) {
            debug!("Non-white pixel in vertical band at column {}", x);
            return false;
        }
    }
    true
}

/// Whether every pixel within `margin` of the border is within `tolerance` of
/// white, reading transparent areas as white.
pub fn check_perimeter_is_white(image: &RasterImage, tolerance: u8, margin: u32) -> bool {
    let (w, h) = image.dimensions();
    let (mw, mh) = effective_margins(w, h, margin);
    if mw == 0 || mh == 0 {
        warn!(
            "Cannot check perimeter with margin {}px on {}x{} image",
            margin, w, h
        );
        return false;
    }

    let cutoff = 255 - tolerance;
    let is_white = match image {
        RasterImage::Rgba(img) => rgba_perimeter_is_white(img, cutoff, mw, mh),
        other => rgba_perimeter_is_white(&other.to_rgba(), cutoff, mw, mh),
    };
    debug!(
        "Perimeter white check (tolerance {}, margin {}): {}",
        tolerance, margin, is_white
    );
    is_white
}
