//! Perimeter-referenced white balance.
//!
//! The darkest pixel on the 1px border is taken as "should have been white" and
//! each RGB channel is stretched with a 256-entry lookup table so that pixel
//! maps to pure white. Alpha is never touched.
use image::{ImageBuffer, Pixel};
use tracing::{debug, info};

use crate::core::raster::{RasterImage, Staged};

/// Largest possible R+G+B sum.
pub const MAX_CHANNEL_SUM: u32 = 765;

/// Darkest perimeter pixel by R+G+B sum.
///
/// Scan order (first minimum wins): top row left to right, bottom row, left
/// column top to bottom without corners, right column without corners.
/// `None` when either side is 1px or less.
pub fn darkest_perimeter_pixel<P>(img: &ImageBuffer<P, Vec<u8>>) -> Option<[u8; 3]>
where
    P: Pixel<Subpixel = u8>,
{
    let (w, h) = img.dimensions();
    if w <= 1 || h <= 1 {
        return None;
    }

    let top = (0..w).map(|x| (x, 0));
    let bottom = (0..w).map(|x| (x, h - 1));
    let left = (1..h - 1).map(|y| (0, y));
    let right = (1..h - 1).map(|y| (w - 1, y));

    let mut darkest: Option<([u8; 3], u32)> = None;
    for (x, y) in top.chain(bottom).chain(left).chain(right) {
        let c = img.get_pixel(x, y).channels();
        let rgb = if c.len() >= 3 {
            [c[0], c[1], c[2]]
        } else {
            [c[0], c[0], c[0]]
        };
        let sum = rgb.iter().map(|&v| v as u32).sum::<u32>();
        if darkest.is_none_or(|(_, best)| sum < best) {
            darkest = Some((rgb, sum));
        }
    }
    darkest.map(|(rgb, _)| rgb)
}

/// Whether the darkest perimeter sum passes the cancel threshold.
///
/// The threshold reads as "how dark a perimeter may be and still get whitened":
/// 765 admits every perimeter, 0 admits only one that is already pure white.
pub fn should_whiten(darkest_sum: u32, cancel_threshold_sum: u32) -> bool {
    let threshold = cancel_threshold_sum.min(MAX_CHANNEL_SUM);
    darkest_sum >= MAX_CHANNEL_SUM - threshold
}

/// `lut[i] = clamp(round(i * 255 / max(1, reference)))`
pub fn build_lut(reference: u8) -> [u8; 256] {
    let scale = 255.0 / f64::from(reference.max(1));
    let mut lut = [0u8; 256];
    for (i, slot) in lut.iter_mut().enumerate() {
        *slot = (i as f64 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

fn apply_luts<P>(img: &mut ImageBuffer<P, Vec<u8>>, luts: &[[u8; 256]; 3])
where
    P: Pixel<Subpixel = u8>,
{
    for px in img.pixels_mut() {
        let channels = px.channels_mut();
        for (c, lut) in channels.iter_mut().take(3).zip(luts) {
            *c = lut[*c as usize];
        }
    }
}

/// Whitening stage. Never fails: anything it cannot handle is returned unchanged.
pub fn whiten_by_darkest_perimeter(image: RasterImage, cancel_threshold_sum: u32) -> Staged {
    let image = image.normalize();
    let darkest = match &image {
        RasterImage::Rgb(img) => darkest_perimeter_pixel(img),
        RasterImage::Rgba(img) => darkest_perimeter_pixel(img),
        RasterImage::Gray(img) => darkest_perimeter_pixel(img),
    };
    let Some(reference) = darkest else {
        debug!(
            "Whitening skipped: {}x{} is too small for perimeter analysis",
            image.width(),
            image.height()
        );
        return Staged::unchanged(image);
    };

    let sum = reference.iter().map(|&v| v as u32).sum::<u32>();
    debug!(
        "Darkest perimeter pixel RGB={:?} sum={} threshold={}",
        reference, sum, cancel_threshold_sum
    );
    if !should_whiten(sum, cancel_threshold_sum) {
        info!(
            "Whitening cancelled: perimeter sum {} below admission for threshold {}",
            sum, cancel_threshold_sum
        );
        return Staged::unchanged(image);
    }

    let luts = [build_lut(reference[0]), build_lut(reference[1]), build_lut(reference[2])];
    info!("Whitening applied with reference RGB={:?}", reference);
    match image {
        RasterImage::Rgb(mut img) => {
            apply_luts(&mut img, &luts);
            Staged::applied(img)
        }
        RasterImage::Rgba(mut img) => {
            apply_luts(&mut img, &luts);
            Staged::applied(img)
        }
        // normalize() already turned grayscale into RGB
        gray @ RasterImage::Gray(_) => Staged::unchanged(gray),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn framed(border: [u8; 3], inner: [u8; 3]) -> RgbImage {
        RgbImage::from_fn(5, 4, |x, y| {
            if x == 0 || y == 0 || x == 4 || y == 3 {
                Rgb(border)
            } else {
                Rgb(inner)
            }
        })
    }

    #[test]
    fn lut_maps_reference_to_white() {
        let lut = build_lut(200);
        assert_eq!(lut[200], 255);
        assert_eq!(lut[0], 0);
        assert_eq!(lut[100], 128);
        assert_eq!(lut[255], 255);
        assert_eq!(build_lut(0)[1], 255);
    }

    #[test]
    fn first_darkest_in_scan_order_wins() {
        let mut img = RgbImage::from_pixel(4, 4, Rgb([250, 250, 250]));
        // Same sum, left column is scanned before the right one.
        img.put_pixel(0, 2, Rgb([100, 110, 120]));
        img.put_pixel(3, 1, Rgb([120, 110, 100]));
        assert_eq!(darkest_perimeter_pixel(&img), Some([100, 110, 120]));
        // Bottom row precedes both columns.
        img.put_pixel(2, 3, Rgb([110, 120, 100]));
        assert_eq!(darkest_perimeter_pixel(&img), Some([110, 120, 100]));
    }

    #[test]
    fn tiny_images_are_untouched() {
        let img = RgbImage::from_pixel(1, 8, Rgb([10, 10, 10]));
        let out = whiten_by_darkest_perimeter(img.clone().into(), 765);
        assert!(!out.applied);
        assert_eq!(out.image, RasterImage::Rgb(img));
    }

    #[test]
    fn black_perimeter_with_max_threshold_applies() {
        let img = framed([0, 0, 0], [40, 80, 120]);
        let out = whiten_by_darkest_perimeter(img.into(), 765);
        assert!(out.applied);
        match out.image {
            // reference 0 clamps to 1, so every non-zero channel saturates
            RasterImage::Rgb(img) => assert_eq!(img.get_pixel(2, 2), &Rgb([255, 255, 255])),
            other => panic!("unexpected {:?}", other.color_model()),
        }
    }

    #[test]
    fn zero_threshold_needs_pure_white_perimeter() {
        let grey = framed([254, 255, 255], [40, 80, 120]);
        assert!(!whiten_by_darkest_perimeter(grey.into(), 0).applied);
        let white = framed([255, 255, 255], [40, 80, 120]);
        assert!(whiten_by_darkest_perimeter(white.into(), 0).applied);
    }

    #[test]
    fn alpha_is_preserved() {
        let img = RgbaImage::from_fn(4, 4, |x, _| Rgba([200, 200, 200, (x * 60) as u8]));
        let out = whiten_by_darkest_perimeter(img.into(), 765);
        assert!(out.applied);
        let rgba = out.image.into_rgba();
        for (x, _, px) in rgba.enumerate_pixels() {
            assert_eq!(px.0, [255, 255, 255, (x * 60) as u8]);
        }
    }
}
