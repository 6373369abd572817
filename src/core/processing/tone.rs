//! Alpha-preserving brightness and contrast.
//!
//! Brightness scales each RGB value toward black; contrast scales each value
//! around the rounded mean luma of the brightness-adjusted image. Brightness
//! always runs first.
use image::{ImageBuffer, Pixel};
use tracing::{debug, info};

use crate::core::raster::{RasterImage, Staged};

#[inline]
fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Rounded mean of ITU-R 601 luma (`L = (299 R + 587 G + 114 B) / 1000`) over
/// all pixels, alpha ignored.
pub fn mean_luma<P>(img: &ImageBuffer<P, Vec<u8>>) -> u8
where
    P: Pixel<Subpixel = u8>,
{
    let count = img.width() as u64 * img.height() as u64;
    if count == 0 {
        return 0;
    }
    let total: u64 = img
        .pixels()
        .map(|p| {
            let c = p.channels();
            (c[0] as u64 * 299 + c[1] as u64 * 587 + c[2] as u64 * 114) / 1000
        })
        .sum();
    ((total as f64 / count as f64) + 0.5) as u8
}

fn map_rgb<P, F>(img: &mut ImageBuffer<P, Vec<u8>>, f: F)
where
    P: Pixel<Subpixel = u8>,
    F: Fn(u8) -> u8,
{
    for px in img.pixels_mut() {
        for c in px.channels_mut().iter_mut().take(3) {
            *c = f(*c);
        }
    }
}

fn adjust<P>(img: &mut ImageBuffer<P, Vec<u8>>, brightness: f32, contrast: f32)
where
    P: Pixel<Subpixel = u8>,
{
    if brightness != 1.0 {
        map_rgb(img, |v| to_u8(v as f32 * brightness));
    }
    if contrast != 1.0 {
        let mean = mean_luma(img) as f32;
        debug!("Contrast pivot (mean luma): {}", mean);
        map_rgb(img, |v| to_u8(mean + (v as f32 - mean) * contrast));
    }
}

/// Brightness/contrast stage. Both factors at exactly 1.0 is a no-op.
pub fn apply_brightness_contrast(
    image: RasterImage,
    brightness_factor: f32,
    contrast_factor: f32,
) -> Staged {
    if brightness_factor == 1.0 && contrast_factor == 1.0 {
        return Staged::unchanged(image);
    }
    if !brightness_factor.is_finite() || !contrast_factor.is_finite() {
        debug!(
            "Brightness/contrast skipped: non-finite factors {} / {}",
            brightness_factor, contrast_factor
        );
        return Staged::unchanged(image);
    }

    let image = image.normalize();
    info!(
        "Brightness {:.2}, contrast {:.2}",
        brightness_factor, contrast_factor
    );
    match image {
        RasterImage::Rgb(mut img) => {
            adjust(&mut img, brightness_factor, contrast_factor);
            Staged::applied(img)
        }
        RasterImage::Rgba(mut img) => {
            adjust(&mut img, brightness_factor, contrast_factor);
            Staged::applied(img)
        }
        gray @ RasterImage::Gray(_) => Staged::unchanged(gray),
    }
}
