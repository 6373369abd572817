//! Source discovery and decoding under explicit limits.
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageBuffer, ImageError, ImageFormat, ImageReader, Limits};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::raster::{MAX_CANVAS_PIXELS, RasterImage};
use crate::error::{Error, Result};

/// Maximum pixel count a worker will decode.
pub const DEFAULT_MAX_PIXELS: u64 = MAX_CANVAS_PIXELS;

/// Extensions accepted as batch inputs.
pub const SUPPORTED_EXTENSIONS: &[&str] =
    &["png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "webp"];

/// Per-process decode configuration. Workers build their own instead of
/// inheriting anything from the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeLimits {
    pub max_pixels: u64,
    /// Decoder allocation cap; `None` leaves only the pixel ceiling.
    pub max_alloc_bytes: Option<u64>,
    /// Keep the rows a cut-off PNG still holds instead of failing; missing
    /// rows are zero filled.
    pub allow_truncated: bool,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_pixels: DEFAULT_MAX_PIXELS,
            max_alloc_bytes: None,
            allow_truncated: true,
        }
    }
}

impl DecodeLimits {
    fn decoder_limits(&self) -> Limits {
        let mut limits = Limits::no_limits();
        limits.max_alloc = self.max_alloc_bytes;
        limits
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub fn is_supported_input(path: &Path) -> bool {
    extension_of(path).is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
}

/// Decode `path` into a normalized raster, enforcing `limits`.
pub fn decode_image(path: &Path, limits: &DecodeLimits) -> Result<RasterImage> {
    if extension_of(path).as_deref() == Some("psd") {
        return Err(Error::UnsupportedFormat(format!(
            "PSD decoding is not supported: {}",
            path.display()
        )));
    }
    let decode_err = |source: image::ImageError| Error::Decode {
        path: path.to_path_buf(),
        source,
    };

    let (width, height) = image::image_dimensions(path).map_err(decode_err)?;
    if width as u64 * height as u64 > limits.max_pixels {
        return Err(Error::ImageTooLarge {
            path: path.to_path_buf(),
            width,
            height,
            max_pixels: limits.max_pixels,
        });
    }

    let mut reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| decode_err(image::ImageError::IoError(e)))?;
    reader.limits(limits.decoder_limits());
    let format = reader.format();
    let decoded = match reader.decode() {
        Ok(decoded) => decoded,
        Err(e)
            if limits.allow_truncated
                && format == Some(ImageFormat::Png)
                && is_truncation(&e) =>
        {
            match decode_truncated_png(path) {
                Some(recovered) => recovered,
                None => return Err(decode_err(e)),
            }
        }
        Err(e) => return Err(decode_err(e)),
    };
    debug!(
        "Decoded {:?}: {}x{} {:?}",
        path,
        width,
        height,
        decoded.color()
    );
    Ok(RasterImage::from_dynamic(decoded).normalize())
}

fn is_truncation(err: &ImageError) -> bool {
    match err {
        ImageError::IoError(e) => e.kind() == ErrorKind::UnexpectedEof,
        other => {
            let msg = other.to_string().to_ascii_lowercase();
            msg.contains("eof") || msg.contains("end of file") || msg.contains("unexpected end")
        }
    }
}

/// Row by row decode of a PNG whose data stops early. Rows past the cut stay
/// zero. `None` when not even the first row can be read or the image is
/// interlaced.
fn decode_truncated_png(path: &Path) -> Option<DynamicImage> {
    let file = File::open(path).ok()?;
    let mut decoder = png::Decoder::new(BufReader::new(file));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info().ok()?;
    let (width, height, interlaced) = {
        let info = reader.info();
        (info.width, info.height, info.interlaced)
    };
    if interlaced {
        debug!("Truncated {:?} is interlaced, no partial decode", path);
        return None;
    }
    let (color, _) = reader.output_color_type();
    let stride = width as usize * color.samples();
    let mut buf = vec![0u8; stride * height as usize];

    let mut rows = 0usize;
    while rows < height as usize {
        match reader.next_row() {
            Ok(Some(row)) => {
                let data = row.data();
                let n = data.len().min(stride);
                buf[rows * stride..rows * stride + n].copy_from_slice(&data[..n]);
                rows += 1;
            }
            Ok(None) => break,
            Err(e) => {
                debug!("Truncated {:?} stops after row {}: {}", path, rows, e);
                break;
            }
        }
    }
    if rows == 0 {
        return None;
    }
    warn!(
        "{:?} is truncated: recovered {} of {} rows, the rest left blank",
        path, rows, height
    );

    match color {
        png::ColorType::Grayscale => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageLuma8)
        }
        png::ColorType::GrayscaleAlpha => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageLumaA8)
        }
        png::ColorType::Rgb => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageRgb8)
        }
        png::ColorType::Rgba => {
            ImageBuffer::from_raw(width, height, buf).map(DynamicImage::ImageRgba8)
        }
        // expanded away by EXPAND
        png::ColorType::Indexed => None,
    }
}

/// Supported image files directly inside `dir`, in natural file name order.
pub fn discover_inputs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_supported_input(&path) {
            inputs.push(path);
        } else if path.is_file() {
            debug!("Skipping unsupported file: {:?}", path);
        }
    }
    inputs.sort_by(|a, b| {
        let a = a.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let b = b.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        natord::compare_ignore_case(&a, &b)
    });
    if inputs.is_empty() {
        warn!("No supported images found in {:?}", dir);
    }
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn natural_order_and_filtering() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["img10.png", "img2.PNG", "img1.jpg", "notes.txt", "IMG3.webp"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let names: Vec<String> = discover_inputs(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["img1.jpg", "img2.PNG", "IMG3.webp", "img10.png"]);
    }

    #[test]
    fn psd_is_rejected() {
        let err = decode_image(Path::new("layout.psd"), &DecodeLimits::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)), "{err}");
    }

    #[test]
    fn pixel_ceiling_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        RgbImage::from_pixel(10, 10, Rgb([1, 2, 3])).save(&path).unwrap();
        let tight = DecodeLimits {
            max_pixels: 99,
            ..DecodeLimits::default()
        };
        assert!(matches!(
            decode_image(&path, &tight),
            Err(Error::ImageTooLarge { width: 10, height: 10, .. })
        ));
        let img = decode_image(&path, &DecodeLimits::default()).unwrap();
        assert_eq!(img.dimensions(), (10, 10));
    }

    /// 64x64 PNG with noisy content, cut to two thirds of its length.
    fn write_cut_png(path: &Path) -> RgbImage {
        let img = RgbImage::from_fn(64, 64, |x, y| {
            let v = (x * 7919 + y * 104_729) ^ (x * y * 31);
            Rgb([v as u8, (v >> 8) as u8, (v >> 3) as u8])
        });
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        fs::write(path, &bytes[..bytes.len() * 2 / 3]).unwrap();
        img
    }

    #[test]
    fn truncated_png_keeps_decoded_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.png");
        let original = write_cut_png(&path);

        let img = decode_image(&path, &DecodeLimits::default()).unwrap();
        assert_eq!(img.dimensions(), (64, 64));
        let RasterImage::Rgb(rgb) = img else {
            panic!("expected RGB");
        };
        assert_eq!(rgb.get_pixel(5, 0), original.get_pixel(5, 0));
        assert_eq!(rgb.get_pixel(40, 63).0, [0, 0, 0]);
    }

    #[test]
    fn truncated_png_fails_when_not_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.png");
        write_cut_png(&path);
        let strict = DecodeLimits {
            allow_truncated: false,
            ..DecodeLimits::default()
        };
        assert!(matches!(
            decode_image(&path, &strict),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn corrupt_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        fs::write(&path, b"definitely not a png").unwrap();
        assert!(matches!(
            decode_image(&path, &DecodeLimits::default()),
            Err(Error::Decode { .. })
        ));
    }
}
