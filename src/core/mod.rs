//! Core building blocks: settings, the owned raster type and the processing
//! stages. These are internal primitives consumed by the `batch` worker and
//! the high-level `api` module.
pub mod params;
pub mod processing;
pub mod raster;
