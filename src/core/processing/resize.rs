use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer, images::Image};
use image::{ImageBuffer, Pixel};
use tracing::{debug, info, warn};

use crate::core::raster::{RasterImage, Staged};

/// Largest size with the same aspect ratio that fits inside `max_w` x `max_h`.
/// A zero bound leaves that axis unconstrained; never upscales.
pub fn calculate_fit_dimensions(cols: u32, rows: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    let sx = if max_w == 0 { 1.0 } else { max_w as f64 / cols as f64 };
    let sy = if max_h == 0 { 1.0 } else { max_h as f64 / rows as f64 };
    let scale = sx.min(sy);
    if scale >= 1.0 {
        return (cols, rows);
    }
    let new_cols = ((cols as f64 * scale).round() as u32).max(1);
    let new_rows = ((rows as f64 * scale).round() as u32).max(1);
    (new_cols, new_rows)
}

/// Lanczos3 resample of an 8-bit RGB or RGBA buffer.
pub fn resize_buffer<P>(
    img: &ImageBuffer<P, Vec<u8>>,
    target_cols: u32,
    target_rows: u32,
) -> Result<ImageBuffer<P, Vec<u8>>, Box<dyn std::error::Error>>
where
    P: Pixel<Subpixel = u8>,
{
    let pixel_type = match P::CHANNEL_COUNT {
        3 => PixelType::U8x3,
        4 => PixelType::U8x4,
        1 => PixelType::U8,
        n => return Err(format!("unsupported channel count {}", n).into()),
    };
    let resize_options =
        ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3));
    let mut resizer = Resizer::new();

    let src_image = Image::from_vec_u8(img.width(), img.height(), img.as_raw().to_vec(), pixel_type)?;
    let mut dst_image = Image::new(target_cols, target_rows, pixel_type);
    resizer.resize(&src_image, &mut dst_image, &resize_options)?;

    ImageBuffer::from_raw(target_cols, target_rows, dst_image.into_vec())
        .ok_or_else(|| "resized buffer has unexpected length".into())
}

/// Resize any raster to exact dimensions, `None` on resampler failure.
pub fn resize_raster(image: &RasterImage, cols: u32, rows: u32) -> Option<RasterImage> {
    let resized = match image {
        RasterImage::Rgb(img) => resize_buffer(img, cols, rows).map(RasterImage::Rgb),
        RasterImage::Rgba(img) => resize_buffer(img, cols, rows).map(RasterImage::Rgba),
        RasterImage::Gray(img) => resize_buffer(img, cols, rows).map(RasterImage::Gray),
    };
    match resized {
        Ok(img) => Some(img),
        Err(e) => {
            warn!("Resize to {}x{} failed: {}", cols, rows, e);
            None
        }
    }
}

/// Pre-resize stage: downscale to fit the configured box.
pub fn fit_within(image: RasterImage, max_width: u32, max_height: u32) -> Staged {
    let (cols, rows) = image.dimensions();
    if cols == 0 || rows == 0 || (max_width == 0 && max_height == 0) {
        return Staged::unchanged(image);
    }
    let (new_cols, new_rows) = calculate_fit_dimensions(cols, rows, max_width, max_height);
    if (new_cols, new_rows) == (cols, rows) {
        debug!(
            "Pre-resize skipped: {}x{} already fits {}x{}",
            cols, rows, max_width, max_height
        );
        return Staged::unchanged(image);
    }

    info!(
        "Original size: {}x{}, New size: {}x{}",
        cols, rows, new_cols, new_rows
    );
    match resize_raster(&image, new_cols, new_rows) {
        Some(resized) => Staged::applied(resized),
        None => Staged::unchanged(image),
    }
}
