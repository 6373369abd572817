use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{
    MergePosition, OutputFormat, OverlayOrder, PaddingMode, PerimeterMode, RemovalMode,
    RenameRule,
};

/// Processing settings snapshot shared read-only by every worker of a batch.
///
/// Every group falls back to its defaults, so partial JSON files are accepted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    pub preprocessing: PreprocessingSettings,
    pub whitening: WhiteningSettings,
    pub background_crop: BackgroundCropSettings,
    pub padding: PaddingSettings,
    pub brightness_contrast: BrightnessContrastSettings,
    pub output: OutputSettings,
    pub merge: MergeSettings,
    pub collage: CollageSettings,
}

impl ProcessingSettings {
    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write settings as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Downscale-to-fit applied before any other stage. Zero means unbounded.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingSettings {
    pub enabled: bool,
    pub max_width: u32,
    pub max_height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhiteningSettings {
    pub enabled: bool,
    /// 0..=765. 765 always whitens; 0 whitens only an already pure white perimeter.
    pub cancel_threshold_sum: u32,
}

impl Default for WhiteningSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            cancel_threshold_sum: 765,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundCropSettings {
    pub enabled: bool,
    /// Distance from white; negative disables removal while still normalizing to RGBA.
    pub tolerance: i32,
    pub mode: RemovalMode,
    pub check_perimeter: bool,
    pub perimeter_mode: PerimeterMode,
    pub perimeter_tolerance: u8,
    pub symmetric_axes: bool,
    pub symmetric_absolute: bool,
    pub extra_crop_percent: f64,
}

impl BackgroundCropSettings {
    /// Tolerance usable by the removal stage, `None` when removal is disabled.
    pub fn removal_tolerance(&self) -> Option<u8> {
        if self.tolerance < 0 {
            None
        } else {
            Some(self.tolerance.min(255) as u8)
        }
    }
}

impl Default for BackgroundCropSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            tolerance: 10,
            mode: RemovalMode::Full,
            check_perimeter: true,
            perimeter_mode: PerimeterMode::IfWhite,
            perimeter_tolerance: 10,
            symmetric_axes: false,
            symmetric_absolute: false,
            extra_crop_percent: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaddingSettings {
    pub mode: PaddingMode,
    /// Signed: positive adds a transparent border, negative insets.
    pub percent: f64,
    pub allow_expansion: bool,
    pub perimeter_tolerance: u8,
    pub perimeter_margin: u32,
}

impl Default for PaddingSettings {
    fn default() -> Self {
        Self {
            mode: PaddingMode::Never,
            percent: 0.0,
            allow_expansion: false,
            perimeter_tolerance: 10,
            perimeter_margin: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrightnessContrastSettings {
    pub enabled: bool,
    pub brightness_factor: f32,
    pub contrast_factor: f32,
}

impl Default for BrightnessContrastSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            brightness_factor: 1.0,
            contrast_factor: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub format: OutputFormat,
    /// JPEG quality, 1..=100
    pub quality: u8,
    pub background_color: [u8; 3],
    /// PNG only: keep transparency instead of flattening onto `background_color`.
    pub transparent: bool,
    /// Decoded rasters carry no source metadata, so outputs are always clean.
    pub remove_metadata: bool,
    pub rename_rule: RenameRule,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpg,
            quality: 95,
            background_color: [255, 255, 255],
            transparent: false,
            remove_metadata: true,
            rename_rule: RenameRule::Keep,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeSettings {
    pub enable_merge: bool,
    pub template_path: Option<PathBuf>,
    /// Photo box as a fraction of the template size.
    pub size_ratio: f32,
    pub position: MergePosition,
    /// 0.0..=1.0
    pub opacity: f32,
    pub rotation_degrees: f32,
    pub use_mask: bool,
    pub overlay_order: OverlayOrder,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            enable_merge: false,
            template_path: None,
            size_ratio: 1.0,
            position: MergePosition::Center,
            opacity: 1.0,
            rotation_degrees: 0.0,
            use_mask: true,
            overlay_order: OverlayOrder::PhotoOverTemplate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollageSettings {
    /// Zero picks `ceil(sqrt(n))` columns.
    pub columns: u32,
    /// Gap between cells as a percentage of the largest tile side.
    pub spacing_percent: f64,
}
