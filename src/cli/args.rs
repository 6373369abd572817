use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "prodshot", version, about = "prodshot product photo batch processor")]
pub struct CliArgs {
    /// Input image (repeatable)
    #[arg(short, long)]
    pub input: Vec<PathBuf>,

    /// Directory of input images; supported files are picked up in natural order
    #[arg(long)]
    pub input_dir: Option<PathBuf>,

    /// Output directory for individually saved results
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Build a single collage at this path instead of saving images individually
    #[arg(long)]
    pub collage: Option<PathBuf>,

    /// JSON settings file; missing fields take their defaults
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    /// Number of worker processes (defaults to the logical core count)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Write a JSON batch summary to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Enable logging
    #[arg(long, default_value_t = false)]
    pub log: bool,

    /// Print the default settings as JSON and exit
    #[arg(long, default_value_t = false)]
    pub print_default_settings: bool,

    /// Run as a batch worker over stdin/stdout
    #[arg(long, hide = true, default_value_t = false)]
    pub worker: bool,
}
