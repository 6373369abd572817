use image::{RgbaImage, imageops};
use tracing::{debug, info, warn};

use crate::core::raster::{RasterImage, Staged, canvas_fits};

/// Border width for expanding by `percent` (> 0) of the longer side.
pub fn padding_pixels(width: u32, height: u32, percent: f64) -> u32 {
    let long = width.max(height) as f64;
    (long * percent.abs() / 100.0).round() as u32
}

/// Per-side inset for shrinking by `percent` (< 0).
///
/// Chosen as the `m` with `m == round((long - 2m) * q)`, the border that
/// expanding the shrunk image by the same percentage would add back, so a
/// positive then negative call restores the original canvas.
pub fn inset_pixels(width: u32, height: u32, percent: f64) -> u32 {
    let long = width.max(height) as f64;
    let q = percent.abs() / 100.0;
    let estimate = long * q / (1.0 + 2.0 * q);
    let lo = (estimate.floor() as i64 - 1).max(0);
    let hi = estimate.ceil() as i64 + 1;
    (lo..=hi)
        .find(|&m| {
            let rest = long - 2.0 * m as f64;
            rest > 0.0 && (rest * percent.abs() / 100.0).round() as i64 == m
        })
        .unwrap_or(estimate.round() as i64)
        .max(0) as u32
}

/// Copy the centered `new_w` x `new_h` window row by row.
fn inset(img: &RgbaImage, left: u32, top: u32, new_w: u32, new_h: u32) -> Option<RgbaImage> {
    let (w, _) = img.dimensions();
    let src = img.as_raw();
    let row_bytes = new_w as usize * 4;
    let mut out = vec![0u8; row_bytes * new_h as usize];
    for row in 0..new_h as usize {
        let src_offset = ((row + top as usize) * w as usize + left as usize) * 4;
        let dst_offset = row * row_bytes;
        out[dst_offset..dst_offset + row_bytes]
            .copy_from_slice(&src[src_offset..src_offset + row_bytes]);
    }
    RgbaImage::from_raw(new_w, new_h, out)
}

/// Padding stage. Positive `percent` adds a transparent border (only with
/// `allow_expansion`); negative insets symmetrically. Output is RGBA.
///
/// A negative `percent` insets each side by the `m` satisfying
/// `m == round((long - 2m) * |percent| / 100)`, so padding by `p` and then
/// by `-p` gives back the original size (-10% turns 100x100 into 84x84).
/// A border that would not fit in a canvas leaves the image unchanged.
pub fn add_padding(image: RasterImage, percent: f64, allow_expansion: bool) -> Staged {
    let rgba = image.into_rgba();
    let (w, h) = rgba.dimensions();
    if w == 0 || h == 0 || percent == 0.0 || !percent.is_finite() {
        return Staged::unchanged(rgba);
    }

    if percent > 0.0 {
        let pad = padding_pixels(w, h, percent);
        if pad == 0 {
            debug!("Padding of {}% rounds to 0px, skipped", percent);
            return Staged::unchanged(rgba);
        }
        if !allow_expansion {
            debug!("Padding skipped: expansion by {}px not allowed", pad);
            return Staged::unchanged(rgba);
        }
        let grown = pad
            .checked_mul(2)
            .and_then(|d| Some((w.checked_add(d)?, h.checked_add(d)?)))
            .filter(|&(gw, gh)| canvas_fits(gw, gh));
        let Some((new_w, new_h)) = grown else {
            warn!(
                "Padding of {}% ({}px) on {}x{} exceeds the canvas limit, skipped",
                percent, pad, w, h
            );
            return Staged::unchanged(rgba);
        };
        let mut canvas = RgbaImage::new(new_w, new_h);
        imageops::overlay(&mut canvas, &rgba, pad as i64, pad as i64);
        info!("Padding added: {}px, {}x{} -> {}x{}", pad, w, h, new_w, new_h);
        return Staged::applied(canvas);
    }

    let m = inset_pixels(w, h, percent);
    if m == 0 {
        debug!("Inset of {}% rounds to 0px, skipped", percent);
        return Staged::unchanged(rgba);
    }
    let new_w = w.saturating_sub(2 * m).max(1);
    let new_h = h.saturating_sub(2 * m).max(1);
    let left = (w - new_w) / 2;
    let top = (h - new_h) / 2;
    match inset(&rgba, left, top, new_w, new_h) {
        Some(out) => {
            info!("Inset by {}px: {}x{} -> {}x{}", m, w, h, new_w, new_h);
            Staged::applied(out)
        }
        None => Staged::unchanged(rgba),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn padding_magnitude_uses_long_side() {
        assert_eq!(padding_pixels(200, 100, 10.0), 20);
        assert_eq!(padding_pixels(100, 200, -2.5), 5);
        assert_eq!(padding_pixels(3, 3, 10.0), 0);
    }

    #[test]
    fn inset_undoes_padding() {
        for p in [1.0, 7.5, 10.0, 33.3, 50.0, 99.0] {
            let pad = padding_pixels(137, 90, p);
            assert_eq!(inset_pixels(137 + 2 * pad, 90 + 2 * pad, -p), pad, "p={p}");
        }
    }

    #[test]
    fn expansion_requires_permission() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([1, 2, 3, 255]));
        let out = add_padding(img.clone().into(), 20.0, false);
        assert!(!out.applied);
        assert_eq!(out.image.dimensions(), (10, 10));

        let out = add_padding(img.into(), 20.0, true);
        assert!(out.applied);
        let padded = out.image.into_rgba();
        assert_eq!(padded.dimensions(), (14, 14));
        assert_eq!(padded.get_pixel(0, 0)[3], 0);
        assert_eq!(padded.get_pixel(2, 2).0, [1, 2, 3, 255]);
    }

    #[test]
    fn negative_padding_keeps_center() {
        let img = RgbaImage::from_fn(10, 6, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let out = add_padding(img.into(), -10.0, false);
        assert!(out.applied);
        let cropped = out.image.into_rgba();
        // m == round((10 - 2m) * 0.1) -> m = 1
        assert_eq!(cropped.dimensions(), (8, 4));
        assert_eq!(cropped.get_pixel(0, 0).0, [1, 1, 0, 255]);
    }

    #[test]
    fn oversized_padding_is_skipped() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([5, 5, 5, 255]));
        let out = add_padding(img.clone().into(), 1e12, true);
        assert!(!out.applied);
        assert_eq!(out.image.into_rgba(), img);

        // fits u32 but not the canvas limit
        let out = add_padding(RgbaImage::new(100, 100).into(), 20_000.0, true);
        assert!(!out.applied);
        assert_eq!(out.image.dimensions(), (100, 100));
    }

    #[test]
    fn ten_percent_inset_of_square() {
        let out = add_padding(RgbaImage::new(100, 100).into(), -10.0, false);
        assert_eq!(out.image.dimensions(), (84, 84));
    }

    #[test]
    fn inset_clamps_to_one_pixel() {
        let img = RgbaImage::from_pixel(20, 2, Rgba([9, 9, 9, 255]));
        // no exact inverse exists here, the estimate of 4px per side is used
        let out = add_padding(img.into(), -40.0, false);
        assert_eq!(out.image.dimensions(), (12, 1));
    }
}
