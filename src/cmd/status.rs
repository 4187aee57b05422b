//! `papercoder status`: progress and spend for an output directory.

use anyhow::Result;
use console::style;
use std::path::Path;

use papercoder::audit::StageOutcome;
use papercoder::logging;
use papercoder::status::PipelineStatus;
use papercoder::store::ArtifactStore;
use papercoder::ui::icons::{CHECK, CROSS, MONEY};

use super::super::Cli;

fn mark(done: bool) -> String {
    if done {
        CHECK.to_string()
    } else {
        CROSS.to_string()
    }
}

pub fn cmd_status(cli: &Cli, output_dir: &Path, output_repo_dir: &Path) -> Result<()> {
    let _guard = logging::init(cli.verbose, None)?;
    let store = ArtifactStore::new(output_dir, output_repo_dir);
    let status = PipelineStatus::collect(&store)?;

    println!();
    println!("{}", style("Papercoder Status").bold());
    println!("=================");
    println!();
    println!("Output:     {}", output_dir.display());
    println!("Repository: {}", output_repo_dir.display());
    println!();

    println!(
        "{}Planning: {}/4 turns",
        mark(status.planning_turns >= 3),
        status.planning_turns
    );
    println!(
        "{}Config:   {}",
        mark(status.config_extracted),
        if status.config_extracted { "extracted" } else { "missing" }
    );

    if let Some(error) = &status.task_list_error {
        println!("{}Task list: {}", CROSS, style(error).red());
    } else if !status.files.is_empty() {
        println!(
            "   Files:    {} planned, {} analyzed, {} coded",
            status.files.len(),
            status.analyzed(),
            status.coded()
        );
        println!();
        println!("{:<40} {:<10} {:<10}", "File", "Analysis", "Code");
        println!("{:<40} {:<10} {:<10}", "----", "--------", "----");
        for file in &status.files {
            println!(
                "{:<40} {:<10} {:<10}",
                file.file,
                if file.analyzed { "done" } else { "pending" },
                if file.coded { "done" } else { "pending" }
            );
        }
        println!();
    }
    println!(
        "{}Run script: {}",
        mark(status.script_written),
        if status.script_written { "written" } else { "missing" }
    );

    println!();
    println!(
        "{}Spend: {} call(s), {} prompt / {} completion units, ${:.4}",
        MONEY,
        status.cost.calls,
        status.cost.prompt_units,
        status.cost.completion_units,
        status.cost.monetary_cost
    );

    if let Some(run) = &status.last_run {
        println!();
        println!(
            "Last run: {} ({}, {} call(s))",
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.config.model,
            run.total_calls()
        );
        for stage in &run.stages {
            let outcome = match &stage.outcome {
                StageOutcome::InProgress => style("in progress".to_string()).yellow(),
                StageOutcome::Completed { files } => {
                    style(format!("completed ({files} file(s))")).green()
                }
                StageOutcome::Failed { file, message } => style(match file {
                    Some(file) => format!("failed on {file}: {message}"),
                    None => format!("failed: {message}"),
                })
                .red(),
            };
            println!("  {:<10} {}", stage.stage, outcome);
        }
    }
    println!();
    Ok(())
}
