use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tracing::info;

use kira_volcano::cli::{
    Cli, Commands, DatasetArgs, FieldArg, NearbyArgs, SearchArgs, VariantsArgs, VariantsCommand,
};
use kira_volcano::config::EngineConfig;
use kira_volcano::input::cache::{CacheOutcome, StoreCache};
use kira_volcano::input::read_source;
use kira_volcano::logging::init_logging;
use kira_volcano::runtime::WorkerPool;
use kira_volcano::search::{IdentifierField, RawAdvancedFilter, SearchQuery, flatten_unique_ids};
use kira_volcano::selection::SelectionState;
use kira_volcano::session::DatasetSession;
use kira_volcano::store::{IngestReport, TabularStore};
use kira_volcano::variants::{SettingsVariant, VariantStore};

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::Ingest(args) => {
            let loaded = load_dataset(&args.dataset)?;
            print_json(&IngestSummary {
                dataset_id: &loaded.dataset_id,
                cache: match loaded.outcome {
                    Some(CacheOutcome::Hit) => "hit",
                    Some(CacheOutcome::Built) => "built",
                    None => "disabled",
                },
                report: loaded.store.report(),
                proteins: loaded.store.distinct_protein_count(),
                gene_names: loaded.store.all_gene_names().len(),
                comparisons: loaded.store.comparisons(),
            })
        }
        Commands::Search(args) => run_search(&args),
        Commands::Nearby(args) => run_nearby(&args),
        Commands::Variants(args) => run_variants(&args),
    }
}

#[derive(Serialize)]
struct IngestSummary<'a> {
    dataset_id: &'a str,
    cache: &'static str,
    report: &'a IngestReport,
    proteins: usize,
    gene_names: usize,
    comparisons: &'a [String],
}

struct LoadedDataset {
    dataset_id: String,
    config: EngineConfig,
    store: TabularStore,
    outcome: Option<CacheOutcome>,
}

fn load_dataset(args: &DatasetArgs) -> Result<LoadedDataset, String> {
    let mut config = EngineConfig::load(args.config.as_deref()).map_err(|e| e.to_string())?;
    if let Some(p) = args.p_cutoff {
        config.settings.cutoffs.p_cutoff = p;
    }
    if let Some(fc) = args.fc_cutoff {
        config.settings.cutoffs.log2_fc_cutoff = fc;
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }

    let processed = read_source(&args.processed).map_err(|e| e.to_string())?;
    let raw = match &args.raw {
        Some(path) => read_source(path).map_err(|e| e.to_string())?,
        None => String::new(),
    };
    let dataset_id = args
        .dataset_id
        .clone()
        .unwrap_or_else(|| default_dataset_id(&args.processed));

    let cache_dir = args.cache_dir.clone().or_else(|| config.cache_dir.clone());
    let (store, outcome) = match cache_dir {
        Some(dir) => {
            let cache = StoreCache::new(dir);
            if args.force_rebuild {
                let store = cache
                    .rebuild(&dataset_id, &raw, &processed, &config.columns)
                    .map_err(|e| e.to_string())?;
                (store, Some(CacheOutcome::Built))
            } else {
                let (store, outcome) = cache
                    .load_or_build(&dataset_id, &raw, &processed, &config.columns)
                    .map_err(|e| e.to_string())?;
                (store, Some(outcome))
            }
        }
        None => (
            TabularStore::build(&raw, &processed, &config.columns).map_err(|e| e.to_string())?,
            None,
        ),
    };

    Ok(LoadedDataset {
        dataset_id,
        config,
        store,
        outcome,
    })
}

fn default_dataset_id(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "dataset".to_string())
}

fn open_session(loaded: LoadedDataset) -> Result<DatasetSession, String> {
    let pool = WorkerPool::new(loaded.config.threads).map_err(|e| e.to_string())?;
    info!(threads = pool.threads(), "worker pool ready");
    DatasetSession::new(
        &loaded.dataset_id,
        Arc::new(loaded.store),
        loaded.config.settings,
        VariantStore::in_memory(),
        pool,
    )
    .map_err(|e| e.to_string())
}

fn run_search(args: &SearchArgs) -> Result<(), String> {
    let mut text = args.terms.clone().unwrap_or_default();
    if let Some(path) = &args.terms_file {
        let file_terms = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        text.push('\n');
        text.push_str(&file_terms);
    }
    let field = match args.field {
        FieldArg::Gene => IdentifierField::GeneName,
        FieldArg::PrimaryId => IdentifierField::PrimaryId,
    };
    let raw_filter = RawAdvancedFilter {
        min_p: args.min_p.clone(),
        max_p: args.max_p.clone(),
        min_fc_left: args.min_fc_left.clone(),
        max_fc_left: args.max_fc_left.clone(),
        min_fc_right: args.min_fc_right.clone(),
        max_fc_right: args.max_fc_right.clone(),
        search_left: args.left,
        search_right: args.right,
    };
    let advanced = (raw_filter != RawAdvancedFilter::default()).then(|| raw_filter.to_filter());
    let query = SearchQuery::from_text(&text, field)
        .with_regex(args.regex)
        .with_exact(args.exact)
        .with_significant_only(args.significant_only)
        .with_advanced(advanced);

    let session = open_session(load_dataset(&args.dataset)?)?;
    let groups = session
        .search_async(query)
        .wait()
        .ok_or_else(|| "search worker terminated unexpectedly".to_string())?;
    if args.ids_only {
        print_json(&flatten_unique_ids(&groups))
    } else {
        print_json(&groups)
    }
}

fn run_nearby(args: &NearbyArgs) -> Result<(), String> {
    let session = open_session(load_dataset(&args.dataset)?)?;
    session.update_settings(|current| {
        let mut next = current.clone();
        if let Some(radius) = args.radius {
            next.pixel_radius = radius;
        }
        if let Some(width) = args.width {
            next.width_px = width;
        }
        if let Some(height) = args.height {
            next.height_px = height;
        }
        next
    });
    let result = session
        .click(&args.protein, args.comparison.as_deref())
        .ok_or_else(|| format!("protein not found: {}", args.protein))?;
    print_json(&result)
}

fn run_variants(args: &VariantsArgs) -> Result<(), String> {
    let mut store = VariantStore::open(&args.store).map_err(|e| e.to_string())?;
    match &args.command {
        VariantsCommand::List => print_json(&store.list()),
        VariantsCommand::Save(save) => {
            let mut config = EngineConfig::load(save.config.as_deref()).map_err(|e| e.to_string())?;
            if let Some(p) = save.p_cutoff {
                config.settings.cutoffs.p_cutoff = p;
            }
            if let Some(fc) = save.fc_cutoff {
                config.settings.cutoffs.log2_fc_cutoff = fc;
            }
            let variant = SettingsVariant::capture(
                &save.name,
                &save.description,
                &config.settings,
                &SelectionState::default(),
            );
            let saved = store.save(variant).map_err(|e| e.to_string())?;
            print_json(&saved)
        }
        VariantsCommand::Delete(delete) => {
            let deleted = store.delete(&delete.name).map_err(|e| e.to_string())?;
            print_json(&serde_json::json!({ "name": delete.name, "deleted": deleted }))
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{text}");
    Ok(())
}
