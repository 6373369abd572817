use jpeg_encoder::{ColorType, Encoder};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::RgbImage;

use crate::error::{Error, Result};

fn encode_rgb<W: Write>(writer: W, img: &RgbImage, quality: u8) -> Result<()> {
    let (cols, rows) = img.dimensions();
    let (Ok(cols), Ok(rows)) = (u16::try_from(cols), u16::try_from(rows)) else {
        return Err(Error::Encode(format!(
            "{}x{} exceeds the JPEG size limit",
            cols, rows
        )));
    };
    let mut encoder = Encoder::new(writer, quality.clamp(1, 100));
    encoder.set_progressive(true);
    encoder
        .encode(img.as_raw(), cols, rows, ColorType::Rgb)
        .map_err(Error::encode)
}

/// Progressive baseline-compatible JPEG of an RGB buffer.
pub fn write_rgb_jpeg(output: &Path, img: &RgbImage, quality: u8) -> Result<()> {
    let file = File::create(output)?;
    let mut writer = BufWriter::new(file);
    encode_rgb(&mut writer, img, quality)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn encodes_decodable_jpeg() {
        let img = RgbImage::from_pixel(16, 8, Rgb([200, 100, 50]));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.jpg");
        write_rgb_jpeg(&path, &img, 90).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let back = image::load_from_memory(&bytes).unwrap();
        assert_eq!((back.width(), back.height()), (16, 8));
    }

    #[test]
    fn oversized_jpeg_is_an_encode_error() {
        let img = RgbImage::new(70_000, 1);
        let mut sink = Vec::new();
        assert!(matches!(
            encode_rgb(&mut sink, &img, 90),
            Err(Error::Encode(_))
        ));
        assert!(sink.is_empty());
    }
}
