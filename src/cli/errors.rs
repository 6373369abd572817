use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Workers must be greater than 0, got: {workers}")]
    ZeroWorkers { workers: usize },

    #[error("No input images found (use --input or --input-dir)")]
    NoInputs,

    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("Collage could not be built: no item succeeded")]
    EmptyCollage,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Library(#[from] prodshot::Error),
}
