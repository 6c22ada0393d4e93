mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    blog::BlogSubcommand, config::ConfigSubcommand, estimate::EstimateArgs,
    wizard::WizardSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "estimator",
    about = "Project cost estimator: scope questionnaire, live quote, exportable report",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .estimator/)
    #[arg(long, global = true, env = "ESTIMATOR_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .estimator/ with a default config
    Init,

    /// Price a set of answers in one shot
    Estimate(EstimateArgs),

    /// Step through the questionnaire; progress is saved between runs
    Wizard {
        #[command(subcommand)]
        subcommand: WizardSubcommand,
    },

    /// Show or validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Browse the blog
    Blog {
        #[command(subcommand)]
        subcommand: BlogSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Estimate(args) => cmd::estimate::run(&root, &args, cli.json),
        Commands::Wizard { subcommand } => cmd::wizard::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Blog { subcommand } => cmd::blog::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
