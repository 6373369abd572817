use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use prodshot::api::{build_collage, discover_inputs, process_batch_to_dir, save_collage};
use prodshot::batch::{BatchExecutor, BatchResult, ProcessWorkerFactory, Progress, run_worker};
use prodshot::ProcessingSettings;

use super::args::CliArgs;
use super::errors::AppError;

/// Logs always go to stderr: a worker's stdout carries the task protocol.
fn init_logging(log: bool) {
    if log {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(io::stderr)
            .init();
    } else if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(io::stderr)
            .init();
    }
}

fn report_progress(p: &Progress) {
    info!(
        "[{}/{}] item {} {}",
        p.completed,
        p.total,
        p.index,
        if p.success { "done" } else { "failed" }
    );
}

fn write_report(path: &Path, result: &BatchResult) -> Result<(), AppError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &result.summary()).map_err(prodshot::Error::from)?;
    info!("Batch report written to {:?}", path);
    Ok(())
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(args.log);

    if args.worker {
        let stdin = io::stdin();
        let stdout = io::stdout();
        run_worker(stdin.lock(), stdout.lock())?;
        return Ok(());
    }

    if args.print_default_settings {
        println!("{}", serde_json::to_string_pretty(&ProcessingSettings::default())?);
        return Ok(());
    }

    let settings = match &args.settings {
        Some(path) => {
            info!("Loading settings from {:?}", path);
            ProcessingSettings::load(path).map_err(AppError::from)?
        }
        None => ProcessingSettings::default(),
    };

    if let Some(0) = args.workers {
        return Err(AppError::ZeroWorkers { workers: 0 }.into());
    }

    let mut inputs = args.input.clone();
    if let Some(dir) = &args.input_dir {
        info!("Collecting inputs from directory: {:?}", dir);
        inputs.extend(discover_inputs(dir).map_err(AppError::from)?);
    }
    if inputs.is_empty() {
        return Err(AppError::NoInputs.into());
    }

    let factory = ProcessWorkerFactory::current_exe(args.log).map_err(AppError::from)?;
    let executor = BatchExecutor::new(factory).with_progress(report_progress);

    let result = if let Some(collage_path) = &args.collage {
        info!("Building collage of {} inputs into {:?}", inputs.len(), collage_path);
        let outcome = build_collage(&executor, inputs, &settings, args.workers);
        match &outcome.image {
            Some(image) => {
                save_collage(image, collage_path, &settings.output).map_err(AppError::from)?;
            }
            None => warn!("{}", AppError::EmptyCollage),
        }
        outcome.batch
    } else {
        let output_dir = args.output_dir.as_ref().ok_or(AppError::MissingArgument {
            arg: "--output-dir".to_string(),
        })?;
        info!("Output directory: {:?}", output_dir);
        process_batch_to_dir(&executor, inputs, output_dir, &settings, args.workers)
    };

    for failure in result.summary().failures {
        warn!("Error processing {:?}: {}", failure.input, failure.error);
    }
    println!(
        "processed={} failed={} elapsed={:.2}s",
        result.succeeded(),
        result.failed(),
        result.elapsed.as_secs_f64()
    );

    if let Some(report) = &args.report {
        write_report(report, &result)?;
    }

    Ok(())
}
