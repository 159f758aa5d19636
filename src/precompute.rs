use std::path::PathBuf;
use anyhow::{ Context, bail };
use clap::Parser;
use tracing::{ info, warn };
use tracing_subscriber::{ fmt, prelude::*, EnvFilter };
use diatom_gates::{
    mkdir,
    archive::{ archive_path, load_field_data, write_archive },
    config::Config,
    pipeline::precompute,
    transitions::TransitionGraph,
};

#[derive(Parser)]
#[command(name = "precompute")]
#[command(about = "Precompute gate times and optimal gate sequences over a field sweep")]
struct Cli {
    /// Path to the TOML run configuration
    #[arg(short, long, env = "DIATOM_CONFIG", default_value = "config/Rb87Cs133NMax3.toml")]
    config: PathBuf,

    /// Output directory; overrides the configured one
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter
        = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(output) = cli.output {
        config.output = output;
    }
    if config.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build_global()
            .context("building thread pool")?;
    }

    let labels = config.label_space();
    let graph = TransitionGraph::new(&labels);
    info!(
        settings = %config.settings(),
        states = labels.num_states(),
        transitions = graph.num_edges(),
        "built label space"
    );
    let initial = config.initial_indices(&labels)?;

    let data = load_field_data(&config.input, &labels)
        .with_context(|| format!("reading {}", config.input.display()))?;
    if let Some(expected) = config.field_grid()? {
        if !expected.matches(data.grid(), 1e-9) {
            bail!(
                "field grid in {} ({} samples) does not match the configured \
                one ({} samples)",
                config.input.display(),
                data.num_fields(),
                expected.len(),
            );
        }
    }

    let pre = precompute(&graph, &data, &initial, config.hbar);
    if !pre.failures.is_empty() {
        warn!(
            failed = pre.failures.len(),
            total = data.num_fields(),
            "some field samples failed"
        );
    }

    mkdir!(&config.output)?;
    let path = archive_path(&config.output, &config.settings());
    write_archive(&path, &labels, &graph, &data, &pre)
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), "done");
    Ok(())
}
