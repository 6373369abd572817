//! Template compositing.
//!
//! The processed photo is scaled to fit `size_ratio` of the template, rotated
//! on an expanded canvas, faded by `opacity`, positioned, then layered with the
//! template according to `overlay_order`.
use image::{Rgba, RgbaImage, imageops};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use tracing::{debug, info, warn};

use crate::core::params::MergeSettings;
use crate::core::processing::resize::resize_buffer;
use crate::core::raster::canvas_fits;
use crate::types::{MergePosition, OverlayOrder};

/// Size of `(w, h)` scaled to fit inside `(box_w, box_h)`, up or down.
pub fn fit_into(w: u32, h: u32, box_w: f64, box_h: f64) -> (u32, u32) {
    if w == 0 || h == 0 {
        return (w, h);
    }
    let scale = (box_w / w as f64).min(box_h / h as f64);
    let nw = ((w as f64 * scale).round() as u32).max(1);
    let nh = ((h as f64 * scale).round() as u32).max(1);
    (nw, nh)
}

/// Top-left corner placing `(pw, ph)` inside `(tw, th)`.
pub fn place(tw: u32, th: u32, pw: u32, ph: u32, position: MergePosition) -> (i64, i64) {
    let cx = (tw as i64 - pw as i64) / 2;
    let cy = (th as i64 - ph as i64) / 2;
    match position {
        MergePosition::Center => (cx, cy),
        MergePosition::Top => (cx, 0),
        MergePosition::Bottom => (cx, th as i64 - ph as i64),
        MergePosition::Left => (0, cy),
        MergePosition::Right => (tw as i64 - pw as i64, cy),
    }
}

/// Counter-clockwise rotation by `degrees`, growing the canvas so no corner
/// is clipped. Uncovered area is transparent.
pub fn rotate_expand(img: &RgbaImage, degrees: f32) -> RgbaImage {
    let normalized = degrees.rem_euclid(360.0);
    if normalized == 0.0 {
        return img.clone();
    }
    let theta = normalized.to_radians();
    let (w, h) = (img.width() as f32, img.height() as f32);
    let (sin, cos) = theta.sin_cos();
    // shave float noise so right angles do not gain a pixel
    let nw = (w * cos.abs() + h * sin.abs() - 1e-3).ceil() as u32;
    let nh = (w * sin.abs() + h * cos.abs() - 1e-3).ceil() as u32;

    let mut canvas = RgbaImage::new(nw.max(1), nh.max(1));
    let x = (nw as i64 - img.width() as i64) / 2;
    let y = (nh as i64 - img.height() as i64) / 2;
    imageops::replace(&mut canvas, img, x, y);
    // imageproc rotates clockwise for positive angles
    rotate_about_center(&canvas, -theta, Interpolation::Bilinear, Rgba([0, 0, 0, 0]))
}

fn scale_alpha(img: &mut RgbaImage, opacity: f32) {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity >= 1.0 {
        return;
    }
    for px in img.pixels_mut() {
        px[3] = (px[3] as f32 * opacity).round() as u8;
    }
}

fn paste(canvas: &mut RgbaImage, top: &RgbaImage, x: i64, y: i64, use_mask: bool) {
    if use_mask {
        imageops::overlay(canvas, top, x, y);
    } else {
        imageops::replace(canvas, top, x, y);
    }
}

/// Composite `photo` with `template`. The result has the template's size.
pub fn merge_with_template(photo: &RgbaImage, template: &RgbaImage, params: &MergeSettings) -> RgbaImage {
    let (tw, th) = template.dimensions();
    let ratio = if params.size_ratio.is_finite() && params.size_ratio > 0.0 {
        params.size_ratio as f64
    } else {
        1.0
    };
    let (pw, ph) = fit_into(photo.width(), photo.height(), tw as f64 * ratio, th as f64 * ratio);
    let mut fitted = if (pw, ph) == photo.dimensions() {
        photo.clone()
    } else if !canvas_fits(pw, ph) {
        warn!("Merge fit {}x{} exceeds the canvas limit, using photo as-is", pw, ph);
        photo.clone()
    } else {
        match resize_buffer(photo, pw, ph) {
            Ok(resized) => resized,
            Err(e) => {
                debug!("Merge resize failed ({}), using photo as-is", e);
                photo.clone()
            }
        }
    };

    if params.rotation_degrees.is_finite() && params.rotation_degrees != 0.0 {
        fitted = rotate_expand(&fitted, params.rotation_degrees);
    }
    scale_alpha(&mut fitted, params.opacity);

    let (x, y) = place(tw, th, fitted.width(), fitted.height(), params.position);
    info!(
        "Merging {}x{} photo at ({}, {}) into {}x{} template ({})",
        fitted.width(),
        fitted.height(),
        x,
        y,
        tw,
        th,
        params.overlay_order
    );

    match params.overlay_order {
        OverlayOrder::PhotoOverTemplate => {
            let mut canvas = template.clone();
            paste(&mut canvas, &fitted, x, y, params.use_mask);
            canvas
        }
        OverlayOrder::TemplateOverPhoto => {
            let mut canvas = RgbaImage::new(tw, th);
            paste(&mut canvas, &fitted, x, y, params.use_mask);
            imageops::overlay(&mut canvas, template, 0, 0);
            canvas
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn settings() -> MergeSettings {
        MergeSettings {
            enable_merge: true,
            ..Default::default()
        }
    }

    #[test]
    fn fit_preserves_aspect() {
        assert_eq!(fit_into(200, 100, 50.0, 50.0), (50, 25));
        assert_eq!(fit_into(10, 20, 100.0, 100.0), (50, 100));
    }

    #[test]
    fn placement_by_position() {
        assert_eq!(place(100, 80, 20, 10, MergePosition::Center), (40, 35));
        assert_eq!(place(100, 80, 20, 10, MergePosition::Top), (40, 0));
        assert_eq!(place(100, 80, 20, 10, MergePosition::Bottom), (40, 70));
        assert_eq!(place(100, 80, 20, 10, MergePosition::Left), (0, 35));
        assert_eq!(place(100, 80, 20, 10, MergePosition::Right), (80, 35));
    }

    #[test]
    fn quarter_turn_swaps_dimensions() {
        let img = RgbaImage::from_pixel(8, 4, RED);
        let rotated = rotate_expand(&img, 90.0);
        assert_eq!(rotated.dimensions(), (4, 8));
    }

    #[test]
    fn photo_lands_on_template() {
        let template = RgbaImage::from_pixel(20, 20, BLUE);
        let photo = RgbaImage::from_pixel(10, 10, RED);
        let mut p = settings();
        p.size_ratio = 0.5;
        p.position = MergePosition::Top;
        let out = merge_with_template(&photo, &template, &p);
        assert_eq!(out.dimensions(), (20, 20));
        assert_eq!(out.get_pixel(10, 2), &RED);
        assert_eq!(out.get_pixel(10, 15), &BLUE);
    }

    #[test]
    fn template_over_photo_hides_photo_under_opaque_template() {
        let template = RgbaImage::from_pixel(10, 10, BLUE);
        let photo = RgbaImage::from_pixel(10, 10, RED);
        let mut p = settings();
        p.overlay_order = OverlayOrder::TemplateOverPhoto;
        let out = merge_with_template(&photo, &template, &p);
        assert_eq!(out.get_pixel(5, 5), &BLUE);
    }

    #[test]
    fn mask_controls_transparent_photo_pixels() {
        let template = RgbaImage::from_pixel(4, 4, BLUE);
        let photo = RgbaImage::new(4, 4);
        let mut p = settings();
        let masked = merge_with_template(&photo, &template, &p);
        assert_eq!(masked.get_pixel(1, 1), &BLUE);
        p.use_mask = false;
        let raw = merge_with_template(&photo, &template, &p);
        assert_eq!(raw.get_pixel(1, 1)[3], 0);
    }

    #[test]
    fn oversized_ratio_keeps_photo_size() {
        let template = RgbaImage::from_pixel(10, 10, BLUE);
        let photo = RgbaImage::from_pixel(4, 4, RED);
        let mut p = settings();
        p.size_ratio = 1e9;
        let out = merge_with_template(&photo, &template, &p);
        assert_eq!(out.dimensions(), (10, 10));
        assert_eq!(out.get_pixel(5, 5), &RED);
        assert_eq!(out.get_pixel(0, 0), &BLUE);
    }

    #[test]
    fn zero_opacity_leaves_template() {
        let template = RgbaImage::from_pixel(6, 6, BLUE);
        let photo = RgbaImage::from_pixel(6, 6, RED);
        let mut p = settings();
        p.opacity = 0.0;
        assert_eq!(merge_with_template(&photo, &template, &p), template);
    }
}
