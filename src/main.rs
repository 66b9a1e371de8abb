use std::path::PathBuf;
use anyhow::Result;
use clap::Parser;
use pile_cluster::cluster::CandidateClusterer;
use pile_cluster::cluster::SizedLabelPropagation;
use pile_cluster::config::Config;
use pile_cluster::{data, storage};

#[derive(Parser, Debug)]
#[clap(
    name = "pile-cluster",
    about = "Size-bounded divide-and-conquer clustering of very large weighted graphs"
)]
struct Cli {
    /// Path to input Parquet edge list (`source`, `target`, optional `weight`)
    #[clap(long)]
    input: PathBuf,

    /// Path to Parquet entity sizes (`entity`, `size`)
    #[clap(long)]
    sizes: Option<PathBuf>,

    /// Path to Parquet entity groups (`entity`, `group`); -1 is the common pool, -2 excludes
    #[clap(long)]
    groups: Option<PathBuf>,

    /// JSON configuration file
    #[clap(long)]
    config: Option<PathBuf>,

    /// Target total size of each community
    #[clap(long)]
    target_size: Option<u64>,

    /// Target number of entities in each pile
    #[clap(long)]
    target_pile_size: Option<usize>,

    /// Maximum outlier recursion depth
    #[clap(long)]
    max_outlier_levels: Option<usize>,

    /// Assign every entity to some community
    #[clap(long)]
    must_complete_cover: bool,

    /// Random seed (0 = non-reproducible)
    #[clap(long)]
    seed: Option<u64>,

    /// Output directory for results
    #[clap(long, default_value = "cluster_results")]
    output_dir: PathBuf,

    /// Number of worker threads (0 = use all available cores)
    #[clap(long, default_value = "0")]
    threads: usize,

    /// Verbose logging
    #[clap(long, short)]
    verbose: bool,
}

impl Cli {
    fn build_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)?,
            None => Config::default(),
        };

        if let Some(target_size) = self.target_size {
            config.communities.target_size = target_size;
        }
        if let Some(target_pile_size) = self.target_pile_size {
            config.piles.target_pile_size = target_pile_size;
        }
        if self.max_outlier_levels.is_some() {
            config.max_outlier_levels = self.max_outlier_levels;
        }
        if self.must_complete_cover {
            config.must_complete_cover = true;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Cli::parse();

    // Configure logging
    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    // Set number of threads
    let num_threads = if args.threads > 0 {
        args.threads
    } else {
        num_cpus::get()
    };

    log::info!("Using {} worker threads", num_threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;

    let config = args.build_config()?;
    log::info!("Input: {}", args.input.display());
    log::info!("Output: {}", args.output_dir.display());
    log::debug!("Configuration: {:?}", config);

    // 1. Load data
    let loaded = data::load_problem(&args.input, args.sizes.as_deref(), "input")?;

    // 2. Cluster
    let clusterer = CandidateClusterer::new(
        SizedLabelPropagation::default(),
        config.dissolve_min_robust_size_factor,
    );
    let result = match &args.groups {
        Some(path) => {
            let groups = data::load_groups(path, &loaded)?;
            pile_cluster::cluster_grouped(&loaded.problem, &groups, &clusterer, &config)?
        }
        None => pile_cluster::cluster(&loaded.problem, &clusterer, &config)?,
    };

    // 3. Save results
    storage::save_results(&result, &loaded.problem, &loaded.entity_ids, &config, &args.output_dir)?;

    log::info!("Clustering complete. Results saved to {}", args.output_dir.display());

    Ok(())
}
