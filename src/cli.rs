use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "kira-volcano",
    version,
    about = "Volcano-plot data engine for differential-expression proteomics"
)]
pub struct Cli {
    #[arg(long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Ingest(IngestArgs),
    Search(SearchArgs),
    Nearby(NearbyArgs),
    Variants(VariantsArgs),
}

#[derive(Debug, Args)]
pub struct DatasetArgs {
    #[arg(long, help = "Processed (differential analysis) TSV, optionally .gz")]
    pub processed: PathBuf,

    #[arg(long, help = "Raw intensity TSV, optionally .gz")]
    pub raw: Option<PathBuf>,

    #[arg(long, help = "Engine config JSON")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Dataset id used as the store cache key")]
    pub dataset_id: Option<String>,

    #[arg(long, help = "Store cache directory (overrides config)")]
    pub cache_dir: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub force_rebuild: bool,

    #[arg(long)]
    pub p_cutoff: Option<f64>,

    #[arg(long)]
    pub fc_cutoff: Option<f64>,

    #[arg(long, help = "Number of threads (0 = auto)")]
    pub threads: Option<usize>,
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FieldArg {
    Gene,
    PrimaryId,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[arg(long, help = "Search terms separated by ';' or newlines")]
    pub terms: Option<String>,

    #[arg(long, help = "File with one search term per line")]
    pub terms_file: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = FieldArg::Gene)]
    pub field: FieldArg,

    #[arg(long, default_value_t = false)]
    pub regex: bool,

    #[arg(long, default_value_t = false)]
    pub exact: bool,

    #[arg(long, default_value_t = false)]
    pub significant_only: bool,

    #[arg(long, default_value = "")]
    pub min_p: String,

    #[arg(long, default_value = "")]
    pub max_p: String,

    #[arg(long, default_value = "")]
    pub min_fc_left: String,

    #[arg(long, default_value = "")]
    pub max_fc_left: String,

    #[arg(long, default_value = "")]
    pub min_fc_right: String,

    #[arg(long, default_value = "")]
    pub max_fc_right: String,

    #[arg(long, default_value_t = false)]
    pub left: bool,

    #[arg(long, default_value_t = false)]
    pub right: bool,

    #[arg(long, default_value_t = false, help = "Print the union of matched ids only")]
    pub ids_only: bool,
}

#[derive(Debug, Args)]
pub struct NearbyArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    #[arg(long)]
    pub protein: String,

    #[arg(long)]
    pub comparison: Option<String>,

    #[arg(long, help = "Neighbor radius in pixels")]
    pub radius: Option<f64>,

    #[arg(long)]
    pub width: Option<f64>,

    #[arg(long)]
    pub height: Option<f64>,
}

#[derive(Debug, Args)]
pub struct VariantsArgs {
    #[arg(long, help = "Variant store JSON file")]
    pub store: PathBuf,

    #[command(subcommand)]
    pub command: VariantsCommand,
}

#[derive(Debug, Subcommand)]
pub enum VariantsCommand {
    List,
    Save(VariantSaveArgs),
    Delete(VariantDeleteArgs),
}

#[derive(Debug, Args)]
pub struct VariantSaveArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long, default_value = "")]
    pub description: String,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub p_cutoff: Option<f64>,

    #[arg(long)]
    pub fc_cutoff: Option<f64>,
}

#[derive(Debug, Args)]
pub struct VariantDeleteArgs {
    #[arg(long)]
    pub name: String,
}
