use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the configured pipeline from scans to features or annotated pseudo-spectra.
    Run(RunArgs),
    /// Group features into pseudo-spectra and annotate isotopes and adducts.
    Annotate(AnnotateArgs),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SerializationFormat {
    Json,
    #[default]
    PrettyJson,
}

#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// The path to the TOML pipeline configuration.
    #[arg(short, long)]
    pub config: PathBuf,

    /// JSON scan containers of the samples; samples are processed in parallel.
    #[arg(short, long, num_args = 1.., required = true)]
    pub scans: Vec<PathBuf>,

    /// JSON scan container of the blank run used for background subtraction.
    #[arg(short, long)]
    pub background: Option<PathBuf>,

    /// Directory receiving one `<sample>.json` per input.
    #[arg(short, long)]
    pub output_dir: PathBuf,

    /// The format to use for the output
    #[arg(short, long, default_value_t, value_enum)]
    pub format: SerializationFormat,
}

#[derive(Parser, Debug, Clone)]
pub struct AnnotateArgs {
    /// The path to the TOML pipeline configuration.
    #[arg(short, long)]
    pub config: PathBuf,

    /// JSON feature container to annotate.
    #[arg(long)]
    pub features: PathBuf,

    /// The path to the output file.
    #[arg(short, long)]
    pub output: PathBuf,

    /// The format to use for the output
    #[arg(short, long, default_value_t, value_enum)]
    pub format: SerializationFormat,
}
