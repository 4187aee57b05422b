use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use papercoder::config::DEFAULT_MODEL;
use papercoder::errors::find_config_error;

mod cmd;

#[derive(Parser)]
#[command(name = "papercoder")]
#[command(version, about = "Turn a research paper into a code repository")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file. Defaults to ./papercoder.toml when present.
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments shared by every stage command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Human-readable paper name, recorded in the audit log
    #[arg(long)]
    pub paper_name: String,

    /// Completion model
    #[arg(long, alias = "gpt-version", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Paper representation: JSON or LaTeX
    #[arg(long, default_value = "JSON")]
    pub paper_format: String,

    /// Paper parsed to JSON
    #[arg(long)]
    pub pdf_json_path: Option<PathBuf>,

    /// Paper as LaTeX source
    #[arg(long)]
    pub pdf_latex_path: Option<PathBuf>,

    /// Directory for stage artifacts
    #[arg(long)]
    pub output_dir: PathBuf,

    /// Directory for the generated repository
    #[arg(long)]
    pub output_repo_dir: PathBuf,

    /// Skip work whose artifacts already exist
    #[arg(long)]
    pub resume: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the four-turn planning conversation
    Plan(RunArgs),
    /// Extract config.yaml from the planning conversation
    ExtractConfig(RunArgs),
    /// Produce a logic analysis for every planned file
    Analyze(RunArgs),
    /// Generate every planned file in order
    Code(RunArgs),
    /// Generate the run script for the finished repository
    Reproduce(RunArgs),
    /// Run every stage in order
    Run(RunArgs),
    /// Show progress and spend for an output directory
    Status {
        #[arg(long)]
        output_dir: PathBuf,
        #[arg(long)]
        output_repo_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Plan(args) => cmd::cmd_plan(&cli, args).await,
        Commands::ExtractConfig(args) => cmd::cmd_extract_config(&cli, args),
        Commands::Analyze(args) => cmd::cmd_analyze(&cli, args).await,
        Commands::Code(args) => cmd::cmd_code(&cli, args).await,
        Commands::Reproduce(args) => cmd::cmd_reproduce(&cli, args).await,
        Commands::Run(args) => cmd::cmd_run(&cli, args).await,
        Commands::Status {
            output_dir,
            output_repo_dir,
        } => cmd::cmd_status(&cli, output_dir, output_repo_dir),
    };

    // Configuration problems are reported, not raised.
    if let Err(err) = &result
        && let Some(diag) = find_config_error(err)
    {
        println!("[ERROR] {diag}");
        return Ok(());
    }
    result
}
