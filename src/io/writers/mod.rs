//! Output naming, flattening and final encode-to-disk.
pub mod jpeg;
pub mod png;

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage, RgbaImage};
use tracing::{info, warn};

use crate::core::params::OutputSettings;
use crate::error::{Error, Result};
use crate::types::{OutputFormat, RenameRule};

/// File name for item `index` under the configured rename rule.
pub fn output_file_name(input: &Path, index: usize, rule: &RenameRule, format: OutputFormat) -> String {
    let ext = format.extension();
    match rule {
        RenameRule::Article { name } if !name.trim().is_empty() => {
            let name = name.trim();
            if index == 0 {
                format!("{}.{}", name, ext)
            } else {
                format!("{}_{}.{}", name, index, ext)
            }
        }
        _ => {
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("image_{}", index));
            format!("{}.{}", stem, ext)
        }
    }
}

/// Composite RGBA over an opaque background color.
pub fn flatten(img: &RgbaImage, background: [u8; 3]) -> RgbImage {
    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        let p = img.get_pixel(x, y);
        let a = p[3] as u32;
        let mix = |c: u8, bg: u8| ((c as u32 * a + bg as u32 * (255 - a) + 127) / 255) as u8;
        Rgb([
            mix(p[0], background[0]),
            mix(p[1], background[1]),
            mix(p[2], background[2]),
        ])
    })
}

/// Create `dir` if needed; failures are reported as an unavailable location.
pub fn ensure_output_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| Error::Resource {
        path: dir.to_path_buf(),
        source,
    })
}

fn write_output(path: &Path, img: &RgbaImage, output: &OutputSettings) -> Result<()> {
    match output.format {
        OutputFormat::Jpg => jpeg::write_rgb_jpeg(path, &flatten(img, output.background_color), output.quality),
        OutputFormat::Png if output.transparent => png::write_rgba_png(path, img),
        OutputFormat::Png => png::write_rgb_png(path, &flatten(img, output.background_color)),
    }
}

/// Encode `img` into `dir/file_name`. A partially written file is removed
/// when encoding fails.
pub fn save_output(img: &RgbaImage, dir: &Path, file_name: &str, output: &OutputSettings) -> Result<PathBuf> {
    ensure_output_dir(dir)?;
    let path = dir.join(file_name);
    if let Err(e) = write_output(&path, img, output) {
        if path.exists() {
            if let Err(rm) = fs::remove_file(&path) {
                warn!("Could not remove partial output {:?}: {}", path, rm);
            }
        }
        return Err(e);
    }
    info!(
        "Saved {:?} ({}x{}, {})",
        path,
        img.width(),
        img.height(),
        output.format
    );
    Ok(path)
}
