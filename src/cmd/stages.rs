//! Stage commands. Each one validates its inputs before the completion
//! gateway is built, so configuration problems surface without credentials.

use anyhow::Result;
use console::style;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;

use papercoder::config::Config;
use papercoder::cost::{COST_FILE, CostRecord, load_total};
use papercoder::gateway::OpenAiGateway;
use papercoder::logging;
use papercoder::pipeline::{Pipeline, completed_repository, ledger_delta};
use papercoder::planning::{self, PlanInputs};
use papercoder::settings::Settings;
use papercoder::stage::StageOutcome;
use papercoder::ui::icons::{CHECK, FILE_NEW, MONEY};

use super::super::{Cli, RunArgs};

/// Build the run configuration and start logging into its log directory.
fn prepare(cli: &Cli, args: &RunArgs) -> Result<(Config, Option<WorkerGuard>)> {
    let settings = Settings::load_or_default(cli.settings.as_deref())?;
    let config = Config::new(
        &args.paper_name,
        &args.model,
        &args.paper_format,
        args.pdf_json_path.clone(),
        args.pdf_latex_path.clone(),
        args.output_dir.clone(),
        args.output_repo_dir.clone(),
        settings,
    )?
    .with_resume(args.resume)
    .with_verbose(cli.verbose);
    config.ensure_directories()?;
    let guard = logging::init(cli.verbose, Some(&config.log_dir))?;
    tracing::debug!(
        paper = %config.paper_name,
        model = %config.model,
        format = %config.paper_format,
        "Configuration loaded"
    );
    Ok((config, guard))
}

fn print_summary(config: &Config, headline: &str, cost: &CostRecord, audit: &Path) {
    println!();
    println!("{} {}", CHECK, style(headline).bold());
    println!(
        "{} This run: {} call(s), ${:.4}",
        MONEY, cost.calls, cost.monetary_cost
    );
    if let Ok(total) = load_total(&config.output_dir.join(COST_FILE)) {
        println!(
            "   Accumulated: {} call(s), ${:.4}",
            total.calls, total.monetary_cost
        );
    }
    println!("   Audit: {}", style(audit.display()).dim());
}

fn print_files(outcome: &StageOutcome, root: &Path) {
    for file in &outcome.completed {
        println!("   {}{}", FILE_NEW, root.join(file).display());
    }
}

/// Close the audit run whatever the stage result, then surface the stage
/// error first.
fn settle<T>(result: Result<T>, audit: Result<PathBuf>) -> Result<(T, PathBuf)> {
    let value = result?;
    Ok((value, audit?))
}

pub async fn cmd_plan(cli: &Cli, args: &RunArgs) -> Result<()> {
    let (config, _guard) = prepare(cli, args)?;
    let paper = config.load_paper()?;
    let gateway = OpenAiGateway::from_settings(&config.settings)?;

    let mut pipeline = Pipeline::from_config(&gateway, &config)?;
    let before = load_total(&config.output_dir.join(COST_FILE))?;
    let result = pipeline.plan(&paper).await;
    let (record, audit) = settle(result, pipeline.finish())?;
    let after = load_total(&config.output_dir.join(COST_FILE))?;

    let turns = if record.config.is_some() { 4 } else { 3 };
    print_summary(
        &config,
        &format!("Planning complete ({turns} turns)"),
        &ledger_delta(&before, &after),
        &audit,
    );
    Ok(())
}

pub fn cmd_extract_config(cli: &Cli, args: &RunArgs) -> Result<()> {
    let (config, _guard) = prepare(cli, args)?;
    let path = planning::extract_config(&config.store())?;
    println!();
    println!("{} {}", CHECK, style("config.yaml extracted").bold());
    println!("   {}{}", FILE_NEW, path.display());
    println!(
        "   {}{}",
        FILE_NEW,
        config.output_repo_dir.join("config.yaml").display()
    );
    Ok(())
}

pub async fn cmd_analyze(cli: &Cli, args: &RunArgs) -> Result<()> {
    let (config, _guard) = prepare(cli, args)?;
    let paper = config.load_paper()?;
    PlanInputs::load(&config.store())?;
    let gateway = OpenAiGateway::from_settings(&config.settings)?;

    let mut pipeline = Pipeline::from_config(&gateway, &config)?;
    let result = pipeline.analyze(&paper, config.resume).await;
    let (outcome, audit) = settle(result, pipeline.finish())?;

    print_summary(
        &config,
        &format!("Analysis complete: {} file(s)", outcome.completed.len()),
        &outcome.cost,
        &audit,
    );
    Ok(())
}

pub async fn cmd_code(cli: &Cli, args: &RunArgs) -> Result<()> {
    let (config, _guard) = prepare(cli, args)?;
    PlanInputs::load(&config.store())?;
    let gateway = OpenAiGateway::from_settings(&config.settings)?;

    let mut pipeline = Pipeline::from_config(&gateway, &config)?;
    let result = pipeline.code(config.resume).await;
    let (outcome, audit) = settle(result, pipeline.finish())?;

    print_summary(
        &config,
        &format!("Coding complete: {} file(s)", outcome.completed.len()),
        &outcome.cost,
        &audit,
    );
    print_files(&outcome, &config.output_repo_dir);
    Ok(())
}

pub async fn cmd_reproduce(cli: &Cli, args: &RunArgs) -> Result<()> {
    let (config, _guard) = prepare(cli, args)?;
    let store = config.store();
    let inputs = PlanInputs::load(&store)?;
    completed_repository(&store, &inputs.tasks.files)?;
    let gateway = OpenAiGateway::from_settings(&config.settings)?;

    let mut pipeline = Pipeline::from_config(&gateway, &config)?;
    let result = pipeline.reproduce().await;
    let (outcome, audit) = settle(result, pipeline.finish())?;

    print_summary(&config, "Run script written", &outcome.cost, &audit);
    print_files(&outcome, &config.output_repo_dir);
    Ok(())
}

pub async fn cmd_run(cli: &Cli, args: &RunArgs) -> Result<()> {
    let (config, _guard) = prepare(cli, args)?;
    let paper = config.load_paper()?;
    let gateway = OpenAiGateway::from_settings(&config.settings)?;

    let mut pipeline = Pipeline::from_config(&gateway, &config)?;
    let result = pipeline.run_all(&paper, config.resume).await;
    let (cost, audit) = settle(result, pipeline.finish())?;

    print_summary(
        &config,
        &format!(
            "Repository generated in {}",
            config.output_repo_dir.display()
        ),
        &cost,
        &audit,
    );
    Ok(())
}
