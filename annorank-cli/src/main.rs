mod config;
mod input;
mod output;

use annorank_core::constants::{
    DEFAULT_INITIAL_RATING, DEFAULT_K_FACTOR, DEFAULT_MAX_ITERATIONS, DEFAULT_REGULARIZATION,
    DEFAULT_TOLERANCE,
};
use annorank_core::{
    merge_rank_tables, rank_annotators, EloOptions, FitOptions, RankError, RankMethod,
};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::AnnorankConfig;

pub fn bail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

#[derive(Parser)]
#[command(
    name = "annorank",
    version,
    about = "Rank images per annotator from pairwise comparison exports"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Rank items with iterative Luce spectral ranking (Bradley-Terry MLE)
    Rank(RankArgs),
    /// Rank items by replaying comparisons through Elo updates
    Elo(EloArgs),
    /// Create a default config file at ~/.config/annorank/config.toml
    Init,
}

#[derive(clap::Args)]
struct InputArgs {
    /// Annotator comparison export as NAME=PATH (repeatable). CSV with
    /// image0, image1, winner columns.
    #[arg(long = "annotator", value_name = "NAME=PATH", required = true, value_parser = input::parse_annotator_spec)]
    annotators: Vec<(String, PathBuf)>,

    /// Skip the pooled "Combined" annotator
    #[arg(long)]
    no_combined: bool,

    /// Image key CSV (app_image_id, image_name) used to label rows
    #[arg(long)]
    images: Option<PathBuf>,

    /// Write the merged rank table to this CSV file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Output JSON instead of table
    #[arg(long)]
    json: bool,

    /// Seed for the shuffle before fitting / Elo replay order
    #[arg(long)]
    seed: Option<u64>,

    /// Show progress during execution
    #[arg(short, long)]
    verbose: bool,

    /// Path to config file (default: ~/.config/annorank/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(clap::Args)]
struct RankArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Additive regularization. Default: 0.01. 0 fails on disconnected comparison graphs.
    #[arg(long)]
    regularization: Option<f64>,

    /// Iteration cap for the fit. Default: 100.
    #[arg(long)]
    max_iterations: Option<usize>,

    /// L1 convergence tolerance. Default: 1e-8.
    #[arg(long)]
    tolerance: Option<f64>,
}

#[derive(clap::Args)]
struct EloArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Elo step size. Default: 30.
    #[arg(long)]
    k_factor: Option<f64>,

    /// Starting rating for every item. Default: 1000.
    #[arg(long)]
    initial_rating: Option<f64>,

    /// Replay comparisons in random order instead of file order
    #[arg(long)]
    shuffle: bool,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "annorank=info,annorank_core=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Rank(args) => {
            init_logging(args.input.verbose);
            let cfg = load_config(&args.input);
            let options = fit_options(&args, &cfg);
            run(&args.input, &cfg, RankMethod::Spectral(options));
        }
        Commands::Elo(args) => {
            init_logging(args.input.verbose);
            let cfg = load_config(&args.input);
            let options = elo_options(&args, &cfg);
            run(&args.input, &cfg, RankMethod::Elo(options));
        }
        Commands::Init => {
            let path = config::create_default_config();
            println!("Created config at {}", path.display());
            println!("Edit it to set your default regularization, seed, etc.");
        }
    }
}

fn load_config(inputs: &InputArgs) -> AnnorankConfig {
    let config_path = inputs.config.clone().unwrap_or_else(config::config_path);
    config::load_config(&config_path)
}

/// CLI args > config file > built-in defaults.
fn fit_options(args: &RankArgs, cfg: &AnnorankConfig) -> FitOptions {
    let options = FitOptions {
        regularization: args.regularization.or(cfg.regularization).unwrap_or(DEFAULT_REGULARIZATION),
        max_iterations: args.max_iterations.or(cfg.max_iterations).unwrap_or(DEFAULT_MAX_ITERATIONS),
        tolerance: args.tolerance.or(cfg.tolerance).unwrap_or(DEFAULT_TOLERANCE),
    };
    options.validate().unwrap_or_else(|e| bail(e));
    options
}

fn elo_options(args: &EloArgs, cfg: &AnnorankConfig) -> EloOptions {
    let options = EloOptions {
        k_factor: args.k_factor.or(cfg.k_factor).unwrap_or(DEFAULT_K_FACTOR),
        initial_rating: args.initial_rating.or(cfg.initial_rating).unwrap_or(DEFAULT_INITIAL_RATING),
        shuffle: args.shuffle,
    };
    options.validate().unwrap_or_else(|e| bail(e));
    options
}

fn run(inputs: &InputArgs, cfg: &AnnorankConfig, method: RankMethod) {
    let annotators = input::load_annotators(&inputs.annotators);
    let include_combined = !inputs.no_combined && cfg.combined.unwrap_or(true);

    let mut rng = match inputs.seed.or(cfg.seed) {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let method_name = match method {
        RankMethod::Spectral(_) => "spectral",
        RankMethod::Elo(_) => "elo",
    };
    info!(
        annotators = annotators.len(),
        combined = include_combined,
        method = method_name,
        "ranking"
    );

    let tables = rank_annotators(&annotators, include_combined, &method, &mut rng)
        .unwrap_or_else(|e| {
            if matches!(e.root(), RankError::NonConvergence { .. }) {
                eprintln!("Hint: retry with a larger --regularization (current fit did not converge).");
            }
            bail(e)
        });
    let wide = merge_rank_tables(&tables);

    let names: HashMap<i64, String> = inputs
        .images
        .as_deref()
        .map(input::load_image_names)
        .unwrap_or_default();

    if let Some(ref path) = inputs.output {
        let file = std::fs::File::create(path)
            .unwrap_or_else(|e| bail(format!("Failed to create {}: {e}", path.display())));
        output::write_csv(file, &wide, &names)
            .unwrap_or_else(|e| bail(format!("Failed to write {}: {e}", path.display())));
        info!(path = %path.display(), rows = wide.rows.len(), "wrote rank table");
    }

    if inputs.json {
        output::print_json(method_name, &wide, &tables, &names);
    } else {
        output::print_table(&wide, &names);
    }
}
