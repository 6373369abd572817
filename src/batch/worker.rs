//! Worker side of the batch: per-process bootstrap and task handling.
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use image::RgbaImage;
use tracing::{debug, error, info};

use crate::batch::protocol::{ItemResult, TaskOutput, TaskReply, TaskRequest, read_message, write_message};
use crate::batch::snapshot::BatchSnapshot;
use crate::core::processing::merge::merge_with_template;
use crate::core::processing::pipeline::process_image;
use crate::error::{Error, Result};
use crate::io::decode::{DecodeLimits, decode_image};
use crate::io::writers::png::encode_rgba_png;
use crate::io::writers::{output_file_name, save_output};
use crate::types::BatchMode;

/// State owned by one worker for its whole lifetime.
#[derive(Debug)]
pub struct WorkerContext {
    limits: DecodeLimits,
    template: Option<(PathBuf, RgbaImage)>,
}

impl WorkerContext {
    /// Establish this process's decode configuration. Called once, before the
    /// first task; nothing is inherited from the parent.
    pub fn init() -> Self {
        Self::with_limits(DecodeLimits {
            allow_truncated: true,
            ..DecodeLimits::default()
        })
    }

    pub fn with_limits(limits: DecodeLimits) -> Self {
        let mut sys = sysinfo::System::new();
        sys.refresh_memory();
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        info!(
            "Worker {} ready: {} cores, memory {:.0}/{:.0} MB, max {} pixels, truncated input {}",
            std::process::id(),
            cores,
            sys.used_memory() as f64 / 1024.0 / 1024.0,
            sys.total_memory() as f64 / 1024.0 / 1024.0,
            limits.max_pixels,
            if limits.allow_truncated { "tolerated" } else { "rejected" }
        );
        Self {
            limits,
            template: None,
        }
    }

    fn template(&mut self, path: &Path) -> Result<&RgbaImage> {
        let cached = matches!(&self.template, Some((p, _)) if p == path);
        if !cached {
            debug!("Loading merge template {:?}", path);
            let img = decode_image(path, &self.limits)?.into_rgba();
            self.template = Some((path.to_path_buf(), img));
        }
        match &self.template {
            Some((_, img)) => Ok(img),
            None => Err(Error::Processing("template cache empty".into())),
        }
    }

    fn run_task(&mut self, request: &TaskRequest) -> Result<TaskOutput> {
        let snapshot = BatchSnapshot::load(&request.snapshot)?;
        let settings = &snapshot.settings;
        let raster = decode_image(&request.input, &self.limits)?;
        let processed = process_image(raster, settings);

        match snapshot.mode {
            BatchMode::Collage => Ok(TaskOutput::Bytes(encode_rgba_png(&processed.image)?)),
            BatchMode::Individual => {
                let dir = snapshot.output_dir.as_deref().ok_or(Error::MissingArgument {
                    arg: "output_dir".to_string(),
                })?;
                let mut image = processed.image;
                if settings.merge.enable_merge {
                    let template_path = settings.merge.template_path.as_deref().ok_or(
                        Error::MissingArgument {
                            arg: "merge.template_path".to_string(),
                        },
                    )?;
                    let template = self.template(template_path)?;
                    image = merge_with_template(&image, template, &settings.merge);
                }
                let name = output_file_name(
                    &request.input,
                    request.index,
                    &settings.output.rename_rule,
                    settings.output.format,
                );
                Ok(TaskOutput::Path(save_output(&image, dir, &name, &settings.output)?))
            }
        }
    }

    /// Run one task to completion. Failures become a failure reply.
    pub fn handle(&mut self, request: &TaskRequest) -> TaskReply {
        debug!("Task {} started: {:?}", request.index, request.input);
        let result: ItemResult = self.run_task(request).into();
        if let ItemResult::Failure { error } = &result {
            error!("Task {} ({:?}) failed: {}", request.index, request.input, error);
        } else {
            info!("Task {} done: {:?}", request.index, request.input);
        }
        TaskReply {
            index: request.index,
            result,
        }
    }
}

/// Worker main loop: initialize once, then answer requests until EOF.
pub fn run_worker<R: BufRead, W: Write>(mut input: R, mut output: W) -> Result<()> {
    let mut ctx = WorkerContext::init();
    while let Some(request) = read_message::<_, TaskRequest>(&mut input)? {
        let reply = ctx.handle(&request);
        write_message(&mut output, &reply)?;
    }
    debug!("Worker {} input closed, exiting", std::process::id());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::snapshot::SettingsSnapshot;
    use crate::core::params::ProcessingSettings;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn snapshot(mode: BatchMode, out: Option<PathBuf>) -> SettingsSnapshot {
        let mut settings = ProcessingSettings::default();
        settings.background_crop.enabled = true;
        SettingsSnapshot::create(&BatchSnapshot {
            settings,
            mode,
            output_dir: out,
        })
        .unwrap()
    }

    fn sample_input(dir: &Path) -> PathBuf {
        let path = dir.join("shot.png");
        RgbImage::from_fn(8, 8, |x, y| {
            if (2..5).contains(&x) && (3..6).contains(&y) {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        })
        .save(&path)
        .unwrap();
        path
    }

    #[test]
    fn collage_mode_returns_png_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let input = sample_input(dir.path());
        let snap = snapshot(BatchMode::Collage, None);
        let mut ctx = WorkerContext::init();
        let reply = ctx.handle(&TaskRequest {
            index: 4,
            input,
            snapshot: snap.path().to_path_buf(),
        });
        assert_eq!(reply.index, 4);
        match reply.result {
            ItemResult::Success(TaskOutput::Bytes(bytes)) => {
                let img = image::load_from_memory(&bytes).unwrap();
                assert_eq!((img.width(), img.height()), (3, 3));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn individual_mode_saves_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = sample_input(dir.path());
        let out = dir.path().join("out");
        let snap = snapshot(BatchMode::Individual, Some(out.clone()));
        let reply = WorkerContext::init().handle(&TaskRequest {
            index: 0,
            input,
            snapshot: snap.path().to_path_buf(),
        });
        assert_eq!(reply.result, ItemResult::Success(TaskOutput::Path(out.join("shot.jpg"))));
        assert!(out.join("shot.jpg").exists());
    }

    #[test]
    fn missing_input_is_a_failure_reply() {
        let dir = tempfile::tempdir().unwrap();
        let snap = snapshot(BatchMode::Collage, None);
        let reply = WorkerContext::init().handle(&TaskRequest {
            index: 1,
            input: dir.path().join("nope.png"),
            snapshot: snap.path().to_path_buf(),
        });
        assert!(!reply.result.is_success());
    }

    #[test]
    fn loop_answers_every_request() {
        let dir = tempfile::tempdir().unwrap();
        let input = sample_input(dir.path());
        let snap = snapshot(BatchMode::Collage, None);
        let mut requests = Vec::new();
        for index in 0..3 {
            let req = TaskRequest {
                index,
                input: input.clone(),
                snapshot: snap.path().to_path_buf(),
            };
            write_message(&mut requests, &req).unwrap();
        }
        let mut replies = Vec::new();
        run_worker(Cursor::new(requests), &mut replies).unwrap();
        let mut reader = Cursor::new(replies);
        let mut seen = Vec::new();
        while let Some(reply) = read_message::<_, TaskReply>(&mut reader).unwrap() {
            assert!(reply.result.is_success());
            seen.push(reply.index);
        }
        assert_eq!(seen, vec![0, 1, 2]);
    }
}
