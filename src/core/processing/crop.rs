//! Content bounding-box crop with symmetry policies and a secondary trim.
use image::{RgbaImage, imageops};
use tracing::{debug, info, warn};

use crate::core::raster::{RasterImage, Staged};

/// Half-open pixel rectangle: `left..right` by `top..bottom`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct CropBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropBox {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width,
            bottom: height,
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn is_degenerate(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum Symmetry {
    /// Bounding box as-is.
    #[default]
    Standard,
    /// Equal left/right and equal top/bottom margins.
    Axes,
    /// One margin on all four sides.
    Absolute,
}

impl Symmetry {
    /// Absolute wins when both flags are set.
    pub fn from_flags(axes: bool, absolute: bool) -> Self {
        match (axes, absolute) {
            (_, true) => Symmetry::Absolute,
            (true, false) => Symmetry::Axes,
            _ => Symmetry::Standard,
        }
    }
}

/// Bounding box of pixels with alpha > 0, `None` when fully transparent.
pub fn content_bbox(img: &RgbaImage) -> Option<CropBox> {
    let mut bbox: Option<CropBox> = None;
    for (x, y, px) in img.enumerate_pixels() {
        if px[3] == 0 {
            continue;
        }
        let b = bbox.get_or_insert(CropBox {
            left: x,
            top: y,
            right: x + 1,
            bottom: y + 1,
        });
        b.left = b.left.min(x);
        b.top = b.top.min(y);
        b.right = b.right.max(x + 1);
        b.bottom = b.bottom.max(y + 1);
    }
    bbox
}

/// Final crop box for a content `bbox` on a `width` x `height` canvas.
/// Symmetric policies fall back to the plain bbox when they degenerate.
pub fn compute_crop_box(width: u32, height: u32, bbox: CropBox, symmetry: Symmetry) -> CropBox {
    let left = bbox.left;
    let top = bbox.top;
    let right = width.saturating_sub(bbox.right);
    let bottom = height.saturating_sub(bbox.bottom);

    let candidate = match symmetry {
        Symmetry::Standard => return bbox,
        Symmetry::Axes => {
            let mx = left.min(right);
            let my = top.min(bottom);
            CropBox {
                left: mx,
                top: my,
                right: width - mx,
                bottom: height - my,
            }
        }
        Symmetry::Absolute => {
            let m = left.min(top).min(right).min(bottom);
            CropBox {
                left: m,
                top: m,
                right: width - m,
                bottom: height - m,
            }
        }
    };

    if candidate.is_degenerate() {
        warn!("Symmetric crop box {:?} is degenerate, using bbox", candidate);
        bbox
    } else {
        candidate
    }
}

/// Shrink `b` by `percent` of its width and height, half from each side.
/// `None` when the trim is zero or would leave nothing.
pub fn extra_trim(b: CropBox, percent: f64) -> Option<CropBox> {
    if percent <= 0.0 {
        return None;
    }
    let percent = percent.min(100.0);
    let dx = (b.width() as f64 * percent / 100.0 / 2.0).round() as u32;
    let dy = (b.height() as f64 * percent / 100.0 / 2.0).round() as u32;
    if dx == 0 && dy == 0 {
        return None;
    }
    if 2 * dx >= b.width() || 2 * dy >= b.height() {
        return None;
    }
    Some(CropBox {
        left: b.left + dx,
        top: b.top + dy,
        right: b.right - dx,
        bottom: b.bottom - dy,
    })
}

/// Crop stage: crops to the non-transparent content, then applies the
/// optional percentage trim. Output is always RGBA.
pub fn crop_to_content(image: RasterImage, symmetry: Symmetry, extra_crop_percent: f64) -> Staged {
    let rgba = image.into_rgba();
    let (w, h) = rgba.dimensions();
    let Some(bbox) = content_bbox(&rgba) else {
        debug!("Crop skipped: image has no visible content");
        return Staged::unchanged(rgba);
    };

    let primary = compute_crop_box(w, h, bbox, symmetry);
    let target = match extra_trim(primary, extra_crop_percent) {
        Some(trimmed) => trimmed,
        None => {
            if extra_crop_percent > 0.0 {
                debug!("Extra crop of {}% skipped for {:?}", extra_crop_percent, primary);
            }
            primary
        }
    };

    if target == CropBox::full(w, h) {
        debug!("Crop box covers the whole {}x{} image, nothing to do", w, h);
        return Staged::unchanged(rgba);
    }

    let cropped =
        imageops::crop_imm(&rgba, target.left, target.top, target.width(), target.height())
            .to_image();
    info!(
        "Cropped ({:?}) {}x{} -> {}x{}",
        symmetry,
        w,
        h,
        cropped.width(),
        cropped.height()
    );
    Staged::applied(cropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn with_content(w: u32, h: u32, b: CropBox) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            if x >= b.left && x < b.right && y >= b.top && y < b.bottom {
                Rgba([x as u8, y as u8, 0, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        })
    }

    #[test]
    fn bbox_tracks_visible_pixels() {
        let b = CropBox {
            left: 2,
            top: 1,
            right: 5,
            bottom: 4,
        };
        assert_eq!(content_bbox(&with_content(8, 6, b)), Some(b));
        assert_eq!(content_bbox(&RgbaImage::new(3, 3)), None);
    }

    #[test]
    fn axes_symmetry_is_per_axis() {
        let bbox = CropBox {
            left: 10,
            top: 5,
            right: 50,
            bottom: 20,
        };
        // margins: left 10, top 5, right 50, bottom 80
        let b = compute_crop_box(100, 100, bbox, Symmetry::Axes);
        assert_eq!(
            b,
            CropBox {
                left: 10,
                top: 5,
                right: 90,
                bottom: 95
            }
        );
    }

    #[test]
    fn standard_returns_bbox() {
        let bbox = CropBox {
            left: 3,
            top: 4,
            right: 7,
            bottom: 9,
        };
        assert_eq!(compute_crop_box(10, 10, bbox, Symmetry::Standard), bbox);
    }

    #[test]
    fn absolute_wins_over_axes() {
        assert_eq!(Symmetry::from_flags(true, true), Symmetry::Absolute);
        assert_eq!(Symmetry::from_flags(true, false), Symmetry::Axes);
        assert_eq!(Symmetry::from_flags(false, false), Symmetry::Standard);
    }

    #[test]
    fn extra_trim_splits_evenly() {
        let b = CropBox::full(40, 20);
        assert_eq!(
            extra_trim(b, 10.0),
            Some(CropBox {
                left: 2,
                top: 1,
                right: 38,
                bottom: 19
            })
        );
        assert_eq!(extra_trim(b, 0.0), None);
        assert_eq!(extra_trim(CropBox::full(3, 3), 100.0), None);
    }

    #[test]
    fn crop_extracts_content() {
        let b = CropBox {
            left: 2,
            top: 1,
            right: 5,
            bottom: 4,
        };
        let out = crop_to_content(with_content(8, 6, b).into(), Symmetry::Standard, 0.0);
        assert!(out.applied);
        let img = out.image.into_rgba();
        assert_eq!(img.dimensions(), (3, 3));
        assert_eq!(img.get_pixel(0, 0).0, [2, 1, 0, 255]);
    }

    #[test]
    fn transparent_image_is_left_alone() {
        let out = crop_to_content(RgbaImage::new(4, 4).into(), Symmetry::Absolute, 20.0);
        assert!(!out.applied);
        assert_eq!(out.image.dimensions(), (4, 4));
    }
}
