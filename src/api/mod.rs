//! High-level library API: process one file in memory or to disk, run a
//! parallel batch into an output directory, or build a collage. Prefer these
//! entry points over the stage modules when integrating prodshot.
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbaImage};
use tracing::{info, warn};

use crate::batch::{BatchExecutor, BatchJob, BatchResult, TaskOutput, WorkerFactory};
use crate::core::params::{OutputSettings, ProcessingSettings};
use crate::core::processing::collage::assemble_collage;
use crate::core::processing::merge::merge_with_template;
use crate::core::processing::pipeline::{ProcessedImage, process_image};
use crate::error::{Error, Result};
use crate::io::decode::{DecodeLimits, decode_image};
use crate::io::writers::{output_file_name, save_output};
use crate::types::BatchMode;

pub use crate::io::decode::discover_inputs;

/// Decode `input` and run the pipeline on it (no disk output).
pub fn process_file(input: &Path, settings: &ProcessingSettings) -> Result<ProcessedImage> {
    let raster = decode_image(input, &DecodeLimits::default())?;
    Ok(process_image(raster, settings))
}

/// Process one file in the calling thread and save it into `output_dir`,
/// merging with the configured template when enabled. `index` feeds the
/// rename rule.
pub fn process_file_to_dir(
    input: &Path,
    output_dir: &Path,
    index: usize,
    settings: &ProcessingSettings,
) -> Result<PathBuf> {
    let limits = DecodeLimits::default();
    let processed = process_image(decode_image(input, &limits)?, settings);
    let mut image = processed.image;
    if settings.merge.enable_merge {
        let template_path = settings
            .merge
            .template_path
            .as_deref()
            .ok_or(Error::MissingArgument {
                arg: "merge.template_path".to_string(),
            })?;
        let template = decode_image(template_path, &limits)?.into_rgba();
        image = merge_with_template(&image, &template, &settings.merge);
    }
    let name = output_file_name(
        input,
        index,
        &settings.output.rename_rule,
        settings.output.format,
    );
    save_output(&image, output_dir, &name, &settings.output)
}

/// Run every input through the pipeline in parallel and save each result into
/// `output_dir`. Item failures are reported in the result, never returned.
pub fn process_batch_to_dir<F: WorkerFactory>(
    executor: &BatchExecutor<F>,
    inputs: Vec<PathBuf>,
    output_dir: &Path,
    settings: &ProcessingSettings,
    workers: Option<usize>,
) -> BatchResult {
    let mut job = BatchJob::new(inputs, settings.clone(), BatchMode::Individual)
        .with_output_dir(output_dir);
    job.workers = workers;
    executor.run(&job)
}

/// Collage built from a batch, together with the per-item outcome.
#[derive(Debug, Clone)]
pub struct CollageOutcome {
    /// `None` when no item succeeded.
    pub image: Option<RgbaImage>,
    pub batch: BatchResult,
}

/// Process `inputs` in parallel and lay the successful results out as a grid,
/// in input order.
pub fn build_collage<F: WorkerFactory>(
    executor: &BatchExecutor<F>,
    inputs: Vec<PathBuf>,
    settings: &ProcessingSettings,
    workers: Option<usize>,
) -> CollageOutcome {
    let mut job = BatchJob::new(inputs, settings.clone(), BatchMode::Collage);
    job.workers = workers;
    let batch = executor.run(&job);

    let mut tiles = Vec::with_capacity(batch.len());
    for (input, item) in batch.inputs.iter().zip(&batch.items) {
        let Some(TaskOutput::Bytes(bytes)) = item.output() else {
            continue;
        };
        match image::load_from_memory_with_format(bytes, ImageFormat::Png) {
            Ok(img) => tiles.push(img.into_rgba8()),
            Err(e) => warn!("Dropping collage tile for {:?}: {}", input, e),
        }
    }
    info!("Assembling collage from {} of {} items", tiles.len(), batch.len());
    CollageOutcome {
        image: assemble_collage(&tiles, &settings.collage),
        batch,
    }
}

/// Encode a collage to `path` with the given output settings.
pub fn save_collage(image: &RgbaImage, path: &Path, output: &OutputSettings) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidArgument {
            arg: "collage",
            value: path.display().to_string(),
        })?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    save_output(image, dir, &file_name, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::InProcessWorkerFactory;
    use crate::types::OutputFormat;
    use image::{Rgb, RgbImage};

    fn write_shot(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_fn(w, h, |x, y| {
            if x > 0 && y > 0 && x < w - 1 && y < h - 1 {
                Rgb([20, 40, 60])
            } else {
                Rgb([255, 255, 255])
            }
        })
        .save(&path)
        .unwrap();
        path
    }

    fn cropping() -> ProcessingSettings {
        let mut settings = ProcessingSettings::default();
        settings.background_crop.enabled = true;
        settings
    }

    #[test]
    fn process_file_crops_white_border() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_shot(dir.path(), "a.png", 10, 6);
        let processed = process_file(&input, &cropping()).unwrap();
        assert_eq!(processed.image.dimensions(), (8, 4));
        assert_eq!(processed.metadata.source_size, (10, 6));
    }

    #[test]
    fn process_file_to_dir_uses_rename_rule() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_shot(dir.path(), "a.png", 10, 6);
        let mut settings = cropping();
        settings.output.format = OutputFormat::Png;
        settings.output.rename_rule = crate::types::RenameRule::Article {
            name: "SKU".into(),
        };
        let out = process_file_to_dir(&input, &dir.path().join("out"), 2, &settings).unwrap();
        assert_eq!(out.file_name().unwrap(), "SKU_2.png");
        assert!(out.exists());
    }

    #[test]
    fn collage_skips_failed_items() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = vec![
            write_shot(dir.path(), "a.png", 6, 6),
            dir.path().join("missing.png"),
            write_shot(dir.path(), "c.png", 6, 6),
        ];
        let executor = BatchExecutor::new(InProcessWorkerFactory::default());
        let outcome = build_collage(&executor, inputs, &cropping(), Some(2));
        assert_eq!(outcome.batch.succeeded(), 2);
        assert!(!outcome.batch.items[1].is_success());
        // two 4x4 tiles side by side, no spacing
        let img = outcome.image.unwrap();
        assert_eq!(img.dimensions(), (8, 4));
    }

    #[test]
    fn oversized_padding_does_not_fail_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = vec![
            write_shot(dir.path(), "a.png", 6, 6),
            write_shot(dir.path(), "b.png", 8, 6),
        ];
        let mut settings = ProcessingSettings::default();
        settings.padding.mode = crate::types::PaddingMode::Always;
        settings.padding.percent = 1e12;
        settings.padding.allow_expansion = true;
        settings.output.format = OutputFormat::Png;
        let executor = BatchExecutor::new(InProcessWorkerFactory::default());
        let out = dir.path().join("out");
        let result = process_batch_to_dir(&executor, inputs, &out, &settings, Some(2));
        assert_eq!(result.succeeded(), 2);
        let a = image::open(out.join("a.png")).unwrap();
        assert_eq!((a.width(), a.height()), (6, 6));
    }

    #[test]
    fn save_collage_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 255]));
        let path = dir.path().join("grid.jpg");
        let saved = save_collage(&img, &path, &OutputSettings::default()).unwrap();
        assert_eq!(saved, path);
        assert!(path.exists());
    }
}
