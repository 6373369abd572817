//! Owned raster value passed from stage to stage, plus the image normalizer.
//!
//! Stages consume a `RasterImage` and hand back a [`Staged`] result: either the
//! same image untouched or a new one, with the old value consumed. Color model
//! conversions in the `image` crate are total, so normalization never fails.
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

/// Largest canvas any stage may allocate, matching the default decode ceiling.
pub const MAX_CANVAS_PIXELS: u64 = 500_000_000;

/// Whether a `width` x `height` canvas stays under [`MAX_CANVAS_PIXELS`].
pub fn canvas_fits(width: u32, height: u32) -> bool {
    width as u64 * height as u64 <= MAX_CANVAS_PIXELS
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ColorModel {
    Rgb,
    Rgba,
    Gray,
}

impl std::fmt::Display for ColorModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColorModel::Rgb => write!(f, "RGB"),
            ColorModel::Rgba => write!(f, "RGBA"),
            ColorModel::Gray => write!(f, "L"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RasterImage {
    Rgb(RgbImage),
    Rgba(RgbaImage),
    Gray(GrayImage),
}

impl RasterImage {
    /// Canonicalize any decoded image: alpha-carrying sources become RGBA,
    /// everything else RGB. 16-bit and float sources are narrowed to 8 bits.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        match image {
            DynamicImage::ImageRgb8(img) => RasterImage::Rgb(img),
            DynamicImage::ImageRgba8(img) => RasterImage::Rgba(img),
            other if other.color().has_alpha() => RasterImage::Rgba(other.into_rgba8()),
            other => RasterImage::Rgb(other.into_rgb8()),
        }
    }

    /// Image normalizer: grayscale becomes RGB, RGB and RGBA pass through.
    pub fn normalize(self) -> Self {
        match self {
            RasterImage::Gray(img) => RasterImage::Rgb(DynamicImage::ImageLuma8(img).into_rgb8()),
            other => other,
        }
    }

    pub fn color_model(&self) -> ColorModel {
        match self {
            RasterImage::Rgb(_) => ColorModel::Rgb,
            RasterImage::Rgba(_) => ColorModel::Rgba,
            RasterImage::Gray(_) => ColorModel::Gray,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            RasterImage::Rgb(img) => img.dimensions(),
            RasterImage::Rgba(img) => img.dimensions(),
            RasterImage::Gray(img) => img.dimensions(),
        }
    }

    pub fn width(&self) -> u32 {
        self.dimensions().0
    }

    pub fn height(&self) -> u32 {
        self.dimensions().1
    }

    /// Consume into RGBA; a no-op move when already RGBA.
    pub fn into_rgba(self) -> RgbaImage {
        match self {
            RasterImage::Rgba(img) => img,
            RasterImage::Rgb(img) => DynamicImage::ImageRgb8(img).into_rgba8(),
            RasterImage::Gray(img) => DynamicImage::ImageLuma8(img).into_rgba8(),
        }
    }

    pub fn to_rgba(&self) -> RgbaImage {
        self.clone().into_rgba()
    }
}

impl From<RgbImage> for RasterImage {
    fn from(img: RgbImage) -> Self {
        RasterImage::Rgb(img)
    }
}

impl From<RgbaImage> for RasterImage {
    fn from(img: RgbaImage) -> Self {
        RasterImage::Rgba(img)
    }
}

impl From<GrayImage> for RasterImage {
    fn from(img: GrayImage) -> Self {
        RasterImage::Gray(img)
    }
}

/// Outcome of one stage: the image to continue with and whether it changed.
#[derive(Debug)]
pub struct Staged {
    pub image: RasterImage,
    pub applied: bool,
}

impl Staged {
    pub fn unchanged(image: impl Into<RasterImage>) -> Self {
        Self {
            image: image.into(),
            applied: false,
        }
    }

    pub fn applied(image: impl Into<RasterImage>) -> Self {
        Self {
            image: image.into(),
            applied: true,
        }
    }
}
