use clap::{Parser, Subcommand};
use salon_site::graph::{self, BuildOptions};
use salon_site::site::{self, SiteOptions};
use salon_site::{config, output, source};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "salon-site")]
#[command(about = "Static site builder for a nail salon directory")]
#[command(long_about = "\
Static site builder for a nail salon directory

Reads the directory export (one CSV file per table, zipped or in a folder),
links salons to their cities, states and categories, and writes a static
site: one page per salon, city, state and category, index pages, XML and
HTML sitemaps, and robots.txt.

Expected tables:

  beauty_salon.csv               id, title, slug?, address?, telephone?, ...
  state.csv / city.csv           id, state | city, slug?, (city) state_id
  category.csv                   id, category, slug?
  amenity.csv / payment.csv      id, amenity | payment
  beauty_salon_detail.csv        beauty_salon_id, key, value
  image.csv                      beauty_salon_id, path
  review.csv                     beauty_salon_id, review, author?, time?, rating_stars?
  city_x_beauty_salon.csv        beauty_salon_id, city_id
  beauty_salon_x_category.csv    beauty_salon_id, category_id
  amenity_x_beauty_salon.csv     beauty_salon_id, amenity_id
  payment_x_beauty_salon.csv     beauty_salon_id, payment_id

Salons without a usable city are listed under Unknown / Unknown.

Run 'salon-site gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Directory containing config.toml
    #[arg(long, default_value = ".", global = true)]
    config: PathBuf,

    /// Data source: zip archive or directory of CSV files (overrides [data] source)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Log per-item detail
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Clone)]
struct BuildArgs {
    /// Output directory
    #[arg(long, default_value = "public")]
    output: PathBuf,

    /// Keep existing files in the output directory
    #[arg(long)]
    no_clean: bool,

    /// Also write the linked graph as manifest.json in the output directory
    #[arg(long)]
    manifest: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline: load → graph → pages, sitemaps, robots.txt
    Build(BuildArgs),
    /// Load the data and build the graph without writing anything
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build(ref args) => {
            let site_config = config::load_config(&cli.config)?;
            init_thread_pool(&site_config.processing);
            let data = resolve_data_source(&cli, &site_config);

            println!("==> Stage 1: Loading {}", data.display());
            let tables = load(&data)?;

            println!("==> Stage 2: Linking entities");
            let (graph, stats) = graph::build(tables, &build_options(&site_config));
            output::print_build_stats(&stats);

            println!("==> Stage 3: Writing site → {}", args.output.display());
            let options = SiteOptions {
                clean: !args.no_clean,
                build_date: chrono::Utc::now().date_naive(),
                protected: vec![cli.config.clone(), data.clone()],
            };
            let report = site::build_site(&graph, &site_config, &args.output, &options)?;
            if args.manifest {
                let json = serde_json::to_string_pretty(&graph)?;
                std::fs::write(args.output.join("manifest.json"), json)?;
            }
            output::print_site_report(&report, &args.output);

            println!("==> Build complete: {}", args.output.display());
        }
        Command::Check => {
            let site_config = config::load_config(&cli.config)?;
            let data = resolve_data_source(&cli, &site_config);
            println!("==> Checking {}", data.display());
            let tables = load(&data)?;
            let (_, stats) = graph::build(tables, &build_options(&site_config));
            output::print_build_stats(&stats);
            println!("==> Data is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr without timestamps. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// `--data` wins; otherwise `[data] source`, relative to the config directory.
fn resolve_data_source(cli: &Cli, site_config: &config::SiteConfig) -> PathBuf {
    match &cli.data {
        Some(path) => path.clone(),
        None => cli.config.join(&site_config.data.source),
    }
}

fn build_options(site_config: &config::SiteConfig) -> BuildOptions {
    BuildOptions {
        city_tie_break: site_config.graph.city_tie_break,
    }
}

fn load(data: &Path) -> Result<source::RawTables, source::SourceError> {
    let table_source = source::open_source(data)?;
    let tables = source::load_tables(table_source.as_ref())?;
    output::print_load_summary(&tables, &table_source.describe());
    Ok(tables)
}
