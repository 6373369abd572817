//! Command Line Interface (CLI) layer for prodshot.
//!
//! `args` defines argument parsing, `errors` the CLI error type and `runner`
//! the orchestration of individual, collage and worker runs on top of
//! `prodshot::api`.
//!
//! If you are embedding prodshot into another application, prefer the
//! high-level `prodshot::api` module instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
