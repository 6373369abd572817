use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};

use crate::error::{Error, Result};

fn encoder<W: Write>(writer: W) -> PngEncoder<W> {
    PngEncoder::new_with_quality(writer, CompressionType::Default, FilterType::Adaptive)
}

/// Lossless RGBA PNG bytes, used as the collage intermediate.
pub fn encode_rgba_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encoder(&mut buf)
        .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgba8)
        .map_err(Error::encode)?;
    Ok(buf)
}

pub fn write_rgba_png(output: &Path, img: &RgbaImage) -> Result<()> {
    let mut writer = BufWriter::new(File::create(output)?);
    encoder(&mut writer)
        .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgba8)
        .map_err(Error::encode)?;
    writer.flush()?;
    Ok(())
}

pub fn write_rgb_png(output: &Path, img: &RgbImage) -> Result<()> {
    let mut writer = BufWriter::new(File::create(output)?);
    encoder(&mut writer)
        .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgb8)
        .map_err(Error::encode)?;
    writer.flush()?;
    Ok(())
}
