#![doc = r#"
prodshot: a parallel product-photo batch processor.

This crate turns raw product photographs into catalogue-ready images: it
normalizes the color model, optionally whitens the backdrop, removes a white
background, crops to content, pads, adjusts brightness/contrast and saves
JPEG or PNG output, or lays a whole batch out as a collage. Batches run on a
pool of worker processes. It powers the `prodshot` CLI and can be embedded in
your own Rust applications.

Stability
---------
The public library API is experimental in initial releases and may evolve.
Breaking changes can occur.

Add dependency
--------------
```toml
[dependencies]
prodshot = "0.1"
```

Quick start: process one photo in memory
----------------------------------------
```rust,no_run
use std::path::Path;
use prodshot::{process_file, ProcessingSettings, RemovalMode};

fn main() -> prodshot::Result<()> {
    let mut settings = ProcessingSettings::default();
    settings.background_crop.enabled = true;
    settings.background_crop.mode = RemovalMode::Edges;
    settings.padding.percent = 5.0;

    let processed = process_file(Path::new("/shots/IMG_0001.jpg"), &settings)?;
    println!(
        "{:?} -> {:?}, background removed: {}",
        processed.metadata.source_size,
        processed.metadata.final_size,
        processed.metadata.background_crop.removed
    );
    Ok(())
}
```

Run the pipeline on a raster you already have
---------------------------------------------
```rust
use image::{Rgb, RgbImage};
use prodshot::{process_image, ProcessingSettings, RasterImage};

let shot = RgbImage::from_fn(10, 10, |x, y| {
    if (3..7).contains(&x) && (2..8).contains(&y) { Rgb([40, 40, 40]) } else { Rgb([255, 255, 255]) }
});
let mut settings = ProcessingSettings::default();
settings.background_crop.enabled = true;

let out = process_image(RasterImage::from(shot), &settings);
assert_eq!(out.image.dimensions(), (4, 6));
```

Batch helpers
-------------
Batches are dispatched through a [`BatchExecutor`]. The CLI uses
[`ProcessWorkerFactory`] (one OS process per worker); embedders may use
[`InProcessWorkerFactory`] instead.

```rust,no_run
use std::path::Path;
use prodshot::{
    discover_inputs, process_batch_to_dir, BatchExecutor, InProcessWorkerFactory,
    ProcessingSettings,
};

fn main() -> prodshot::Result<()> {
    let inputs = discover_inputs(Path::new("/shots"))?;
    let executor = BatchExecutor::new(InProcessWorkerFactory::default())
        .with_progress(|p| println!("{}/{}", p.completed, p.total));

    let result = process_batch_to_dir(
        &executor,
        inputs,
        Path::new("/out"),
        &ProcessingSettings::default(),
        Some(4),
    );
    println!("succeeded={} failed={}", result.succeeded(), result.failed());
    Ok(())
}
```

Error handling
--------------
Per-image stages never fail; they leave the image unchanged and log why.
Decoding, encoding and worker problems surface as `prodshot::Error`, and the
batch executor turns them into per-item failure entries.

```rust,no_run
use std::path::Path;
use prodshot::{process_file, Error, ProcessingSettings};

fn main() {
    match process_file(Path::new("/shots/huge.tif"), &ProcessingSettings::default()) {
        Ok(_) => {}
        Err(Error::ImageTooLarge { width, height, .. }) => eprintln!("too large: {width}x{height}"),
        Err(Error::Decode { path, source }) => eprintln!("cannot read {path:?}: {source}"),
        Err(other) => eprintln!("Other error: {other}"),
    }
}
```

Useful modules
--------------
- [`api`]: high-level, ergonomic entry points.
- [`core`]: settings, raster model and the processing stages.
- [`batch`]: executor, worker protocol and worker processes.
- [`io`]: decoding under limits, output naming and writers.
- [`types`]: shared enums (e.g. `RemovalMode`, `PaddingMode`, `OutputFormat`).
- [`error`]: crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod batch;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
// Types
pub use crate::core::params::{
    BackgroundCropSettings, BrightnessContrastSettings, CollageSettings, MergeSettings,
    OutputSettings, PaddingSettings, PreprocessingSettings, ProcessingSettings, WhiteningSettings,
};
pub use crate::core::raster::{ColorModel, RasterImage, Staged};
pub use error::{Error, Result};
pub use types::{
    BatchMode, MergePosition, OutputFormat, OverlayOrder, PaddingMode, PerimeterMode,
    RemovalMode, RenameRule,
};

// Pipeline
pub use crate::core::processing::perimeter::check_perimeter_is_white;
pub use crate::core::processing::pipeline::{PipelineMetadata, ProcessedImage, process_image};

// Batch
pub use batch::{
    BatchExecutor, BatchJob, BatchResult, BatchSummary, InProcessWorkerFactory, ItemResult,
    ProcessWorkerFactory, Progress, WorkerFactory,
};

// Readers
pub use io::decode::{DecodeLimits, decode_image};

// High-level API re-exports
pub use api::{
    CollageOutcome, build_collage, discover_inputs, process_batch_to_dir, process_file,
    process_file_to_dir, save_collage,
};
