//! CLI subcommand handlers.

use crate::{Commands, ConfigAction};
use sleuth_core::config::{default_history_dir, load_config};
use sleuth_core::{
    OutputFormat, ReportGenerator, ResearchEngine, ResearchObserver, ResearchPhase,
    ResearchRequest, SearchResult, SearchStatus, SleuthConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Settings shared by every subcommand.
pub struct Context {
    pub workspace: PathBuf,
    pub config_file: Option<PathBuf>,
    pub quiet: bool,
}

impl Context {
    fn load_config(&self) -> anyhow::Result<SleuthConfig> {
        let mut config = load_config(Some(&self.workspace), self.config_file.as_deref(), None)
            .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
        if config.history.dir.is_none() {
            config.history.dir = Some(default_history_dir());
        }
        Ok(config)
    }
}

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, ctx: &Context) -> anyhow::Result<()> {
    match command {
        Commands::Run {
            query,
            depth,
            json,
            simulate,
            brief,
        } => handle_run(ctx, &query, depth.as_deref(), json, simulate, brief).await,
        Commands::Status { json } => handle_status(ctx, json),
        Commands::History { limit } => handle_history(ctx, limit),
        Commands::Show { id, json, brief } => handle_show(ctx, &id, json, brief),
        Commands::Config { action } => handle_config(action, ctx),
    }
}

/// Prints pipeline progress to stderr.
struct ProgressObserver;

impl ResearchObserver for ProgressObserver {
    fn on_phase_change(&self, _run_id: Uuid, phase: ResearchPhase) {
        if !phase.is_terminal() {
            eprintln!("  [{:>3.0}%] {}...", phase.progress() * 100.0, phase);
        }
    }

    fn on_search_settled(&self, result: &SearchResult) {
        let marker = match result.status {
            SearchStatus::Ok => "ok",
            SearchStatus::Failed => "failed",
            SearchStatus::TimedOut => "timed out",
        };
        eprintln!(
            "         {} ({} sources, {}ms): {}",
            marker,
            result.sources.len(),
            result.elapsed_ms,
            result.search_query
        );
    }
}

fn output_format(brief: bool) -> OutputFormat {
    if brief {
        OutputFormat::Summary
    } else {
        OutputFormat::DetailedReport
    }
}

async fn handle_run(
    ctx: &Context,
    query: &str,
    depth: Option<&str>,
    json: bool,
    simulate: bool,
    brief: bool,
) -> anyhow::Result<()> {
    let request = ResearchRequest::parse(query, depth)?;
    let mut config = ctx.load_config()?;
    if simulate {
        config.research.force_simulated = true;
    }
    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    let mut engine = ResearchEngine::open(config)?;
    if !json && !ctx.quiet {
        engine = engine.with_observer(Arc::new(ProgressObserver));
        eprintln!("\n  Researching: {}\n", request.query.trim());
    }

    let run = engine.run_research(request).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(run.as_ref())?);
    } else {
        if !ctx.quiet {
            for notice in &run.notices {
                eprintln!("  note: {}", notice);
            }
            eprintln!();
        }
        println!("{}", ReportGenerator::render(&run, output_format(brief)));
    }
    Ok(())
}

fn handle_status(ctx: &Context, json: bool) -> anyhow::Result<()> {
    let engine = ResearchEngine::open(ctx.load_config()?)?;
    let status = engine.status();
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }
    println!("Status: {}", status.status);
    println!(
        "Mode: {}",
        if status.simulated { "simulated" } else { "live" }
    );
    println!("  language model: {}", status.capabilities.language_model);
    println!("  web search:     {}", status.capabilities.search);
    println!("Runs in history: {}", status.runs_in_history);
    Ok(())
}

fn handle_history(ctx: &Context, limit: usize) -> anyhow::Result<()> {
    let engine = ResearchEngine::open(ctx.load_config()?)?;
    let runs = engine.history(limit);
    if runs.is_empty() {
        println!("No research runs yet. Try: sleuth run \"your question\"");
        return Ok(());
    }
    println!("Recent runs ({}):", runs.len());
    for run in runs {
        let score = run
            .report
            .as_ref()
            .map(|r| format!("{:.2}", r.confidence_summary.overall_score))
            .unwrap_or_else(|| "-".to_string());
        let id = run.id.to_string();
        println!(
            "  {}  {}  {:<8}  {:<9}  {:>4}  {}",
            &id[..8],
            run.started_at.format("%Y-%m-%d %H:%M"),
            run.depth.to_string(),
            run.mode.to_string(),
            score,
            run.query
        );
    }
    Ok(())
}

fn handle_show(ctx: &Context, id: &str, json: bool, brief: bool) -> anyhow::Result<()> {
    let engine = ResearchEngine::open(ctx.load_config()?)?;
    let Some(run) = engine.find_run(id) else {
        anyhow::bail!("No research run matches '{}' (ids can be abbreviated to a unique prefix)", id);
    };
    if json {
        println!("{}", serde_json::to_string_pretty(run.as_ref())?);
    } else {
        println!("{}", ReportGenerator::render(&run, output_format(brief)));
    }
    Ok(())
}

fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".sleuth").join("config.toml")
}

fn handle_config(action: ConfigAction, ctx: &Context) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(&ctx.workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let toml_str = toml::to_string_pretty(&SleuthConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = ctx.load_config()?;
            println!("{}", toml::to_string_pretty(&config)?);
            for warning in config.validate() {
                println!("# warning: {}", warning);
            }
            Ok(())
        }
    }
}
