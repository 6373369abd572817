//! Per-image orchestrator.
//!
//! Fixed order: normalize, pre-resize, whitening, background removal + crop,
//! padding, brightness/contrast. One [`PipelineMetadata`] value is threaded
//! through the stages and handed to the caller with the final RGBA image.
use image::RgbaImage;
use serde::Serialize;
use tracing::{debug, info};

use crate::core::params::ProcessingSettings;
use crate::core::processing::background::remove_white_background;
use crate::core::processing::crop::{Symmetry, crop_to_content};
use crate::core::processing::padding::add_padding;
use crate::core::processing::perimeter::check_perimeter_is_white;
use crate::core::processing::resize::fit_within;
use crate::core::processing::tone::apply_brightness_contrast;
use crate::core::processing::whitening::whiten_by_darkest_perimeter;
use crate::core::raster::{RasterImage, Staged};
use crate::types::PaddingMode;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreprocessingInfo {
    pub resized: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WhiteningInfo {
    pub applied: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BackgroundCropInfo {
    /// Answer of the gating check, when it ran.
    pub perimeter_is_white: Option<bool>,
    pub removed: bool,
    pub cropped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PaddingInfo {
    pub perimeter_is_white: Option<bool>,
    pub applied: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToneInfo {
    pub applied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PerimeterCheck {
    tolerance: u8,
    margin: u32,
    is_white: bool,
}

/// Per-image scratch state. Created fresh for every image, never shared.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineMetadata {
    pub source_size: (u32, u32),
    pub final_size: (u32, u32),
    pub preprocessing: PreprocessingInfo,
    pub whitening: WhiteningInfo,
    pub background_crop: BackgroundCropInfo,
    pub padding: PaddingInfo,
    pub brightness_contrast: ToneInfo,
    #[serde(skip)]
    perimeter_cache: Option<PerimeterCheck>,
    #[serde(skip)]
    perimeter_evaluations: usize,
}

impl PipelineMetadata {
    pub fn new(source_size: (u32, u32)) -> Self {
        Self {
            source_size,
            ..Default::default()
        }
    }

    /// Perimeter-white answer for the current image, computed at most once per
    /// (tolerance, margin) until a stage changes the pixels.
    pub fn perimeter_is_white(&mut self, image: &RasterImage, tolerance: u8, margin: u32) -> bool {
        if let Some(c) = self.perimeter_cache {
            if c.tolerance == tolerance && c.margin == margin {
                debug!("Perimeter check served from cache: {}", c.is_white);
                return c.is_white;
            }
        }
        let is_white = check_perimeter_is_white(image, tolerance, margin);
        self.perimeter_evaluations += 1;
        self.perimeter_cache = Some(PerimeterCheck {
            tolerance,
            margin,
            is_white,
        });
        is_white
    }

    /// How many times the perimeter check actually scanned pixels.
    pub fn perimeter_evaluations(&self) -> usize {
        self.perimeter_evaluations
    }

    /// Record a stage outcome; any change to the pixels drops cached answers.
    fn record(&mut self, staged: Staged) -> (RasterImage, bool) {
        if staged.applied {
            self.perimeter_cache = None;
        }
        (staged.image, staged.applied)
    }
}

/// Final pipeline output for downstream merge, collage or save steps.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub image: RgbaImage,
    pub metadata: PipelineMetadata,
}

/// Run every enabled stage over one image. Never fails; stages that cannot
/// do their work leave the image as they received it.
pub fn process_image(image: RasterImage, settings: &ProcessingSettings) -> ProcessedImage {
    let mut meta = PipelineMetadata::new(image.dimensions());
    let mut image = image.normalize();

    let prep = &settings.preprocessing;
    if prep.enabled {
        let (img, applied) = meta.record(fit_within(image, prep.max_width, prep.max_height));
        image = img;
        meta.preprocessing.resized = applied;
    }

    let white = &settings.whitening;
    if white.enabled {
        let (img, applied) =
            meta.record(whiten_by_darkest_perimeter(image, white.cancel_threshold_sum));
        image = img;
        meta.whitening.applied = applied;
    }

    let bg = &settings.background_crop;
    if bg.enabled {
        let mut remove = true;
        if bg.check_perimeter {
            let is_white = meta.perimeter_is_white(&image, bg.perimeter_tolerance, 1);
            meta.background_crop.perimeter_is_white = Some(is_white);
            remove = bg.perimeter_mode.admits(is_white);
            if !remove {
                info!(
                    "Background removal skipped: perimeter white={} with mode {}",
                    is_white, bg.perimeter_mode
                );
            }
        }
        if remove {
            let (img, applied) =
                meta.record(remove_white_background(image, bg.removal_tolerance(), bg.mode));
            image = img;
            meta.background_crop.removed = applied;
        }
        let symmetry = Symmetry::from_flags(bg.symmetric_axes, bg.symmetric_absolute);
        let (img, applied) = meta.record(crop_to_content(image, symmetry, bg.extra_crop_percent));
        image = img;
        meta.background_crop.cropped = applied;
    }

    let pad = &settings.padding;
    let apply_padding = match pad.mode {
        PaddingMode::Never => false,
        PaddingMode::Always => true,
        PaddingMode::IfWhite | PaddingMode::IfNotWhite => {
            let is_white =
                meta.perimeter_is_white(&image, pad.perimeter_tolerance, pad.perimeter_margin);
            meta.padding.perimeter_is_white = Some(is_white);
            (pad.mode == PaddingMode::IfWhite) == is_white
        }
    };
    if apply_padding {
        let (img, applied) = meta.record(add_padding(image, pad.percent, pad.allow_expansion));
        image = img;
        meta.padding.applied = applied;
    } else if pad.mode != PaddingMode::Never {
        debug!("Padding skipped: perimeter condition for {} not met", pad.mode);
    }

    let tone = &settings.brightness_contrast;
    if tone.enabled {
        let (img, applied) = meta.record(apply_brightness_contrast(
            image,
            tone.brightness_factor,
            tone.contrast_factor,
        ));
        image = img;
        meta.brightness_contrast.applied = applied;
    }

    let image = image.into_rgba();
    meta.final_size = image.dimensions();
    debug!(
        "Pipeline finished: {:?} -> {:?}",
        meta.source_size, meta.final_size
    );
    ProcessedImage {
        image,
        metadata: meta,
    }
}
