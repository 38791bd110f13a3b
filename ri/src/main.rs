//! rxinspect - Reactive Pipeline Lifecycle Inspector
//!
//! CLI entry point for rendering recorded event logs.

use std::fs;
use std::path::Path;

use clap::{CommandFactory, FromArgMatches};
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use rxinspect::cli::{Cli, Command, generate_after_help, get_log_path};
use rxinspect::config::Config;
use rxinspect::consistency::check_consistency;
use rxinspect::demo::record_demo;
use rxinspect::events::{Event, LoadedEvents, RunId, load_events};
use rxinspect::filter::EventFilter;
use rxinspect::graph::build_graph;
use rxinspect::render::{
    TimelineOptions, render_flowchart, render_log, render_marble, render_run_summary, render_timeline_mermaid,
    render_timeline_with, render_tree,
};
use rxinspect::runs::{RunGroups, RunKey, group_by_run};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let file = cli.command.file().cloned().unwrap_or_else(|| config.log_file.clone());
    let filter = cli.filter();

    debug!(command = ?cli.command, ?file, "main: dispatching command");
    match cli.command {
        Command::Demo { .. } => cmd_demo(&config, &file).await,
        Command::Print { .. } => {
            let groups = load_groups(&file, cli.run, &filter)?;
            print_lines(&render_log(&groups));
            Ok(())
        }
        Command::Summarize { .. } => {
            let groups = load_groups(&file, cli.run, &filter)?;
            print_lines(&render_run_summary(&groups));
            Ok(())
        }
        Command::Tree { .. } => with_selected_run(&file, cli.run, &filter, |_, events| {
            let forest = build_graph(events);
            print_lines(&render_tree(&forest, &config.render));
        }),
        Command::Marble { stage, scale, .. } => with_selected_run(&file, cli.run, &filter, |_, events| {
            let scale = scale.unwrap_or(config.render.marble_scale);
            let marble = render_marble(events, stage, scale);
            if marble.is_empty() {
                eprintln!("{} no events for stage {}", "⚠".yellow(), stage);
            } else {
                println!("{}", marble);
            }
        }),
        Command::Timeline {
            tick_ms,
            max_ticks,
            mermaid,
            ref title,
            ..
        } => with_selected_run(&file, cli.run, &filter, |key, events| {
            let mut options = TimelineOptions::from(&config.render);
            options.tick_width_ms = tick_ms.unwrap_or(options.tick_width_ms);
            options.max_ticks = max_ticks.unwrap_or(options.max_ticks);
            if mermaid {
                let title = title.clone().unwrap_or_else(|| format!("rxinspect timeline - {}", key.label()));
                println!("{}", render_timeline_mermaid(events, &options, &title));
            } else {
                print_lines(&render_timeline_with(events, &options));
            }
        }),
        Command::Mermaid { .. } => with_selected_run(&file, cli.run, &filter, |key, events| {
            println!("{}", render_flowchart(events, &key.label()));
        }),
        Command::Check { .. } => cmd_check(&file, cli.run, &filter),
    }
}

/// Load a log and report dropped records on stderr
fn load(file: &Path) -> Result<LoadedEvents> {
    debug!(?file, "load: called");
    let loaded = load_events(file).context(format!("Failed to load events from {}", file.display()))?;
    if loaded.skipped > 0 {
        eprintln!(
            "{} skipped {} malformed record(s) in {}",
            "⚠".yellow(),
            loaded.skipped,
            file.display()
        );
    }
    info!(entries = loaded.len(), skipped = loaded.skipped, "load: loaded event log");
    Ok(loaded)
}

/// All runs (or just `run`), each narrowed by `filter`
fn load_groups(file: &Path, run: Option<RunId>, filter: &EventFilter) -> Result<RunGroups> {
    let loaded = load(file)?;
    let mut groups = group_by_run(&loaded.entries);

    if let Some(run_id) = run {
        let events = groups.runs.remove(&run_id).unwrap_or_default();
        if events.is_empty() {
            eprintln!("{} no events for run {}", "⚠".yellow(), run_id);
        }
        groups = RunGroups::default();
        groups.runs.insert(run_id, events);
    }

    if !filter.is_empty() {
        groups.legacy = filter.apply(&groups.legacy);
        for events in groups.runs.values_mut() {
            *events = filter.apply(events);
        }
    }
    Ok(groups)
}

/// Select one run (explicit or latest), filter it and hand it to `view`
fn with_selected_run<F>(file: &Path, run: Option<RunId>, filter: &EventFilter, view: F) -> Result<()>
where
    F: FnOnce(RunKey, &[Event]),
{
    let loaded = load(file)?;
    let groups = group_by_run(&loaded.entries);
    let Some((key, events)) = groups.select(run) else {
        println!("No events found.");
        return Ok(());
    };

    if let Some(requested) = run
        && key != RunKey::Run(requested)
    {
        eprintln!(
            "{} run {} not found, showing {}",
            "⚠".yellow(),
            requested,
            key.label()
        );
    }
    eprintln!("{}", format!("=== {} ===", key.label()).dimmed());

    let events = filter.apply(events);
    view(key, &events);
    Ok(())
}

async fn cmd_demo(config: &Config, file: &Path) -> Result<()> {
    debug!(?file, "cmd_demo: called");
    let outcome = record_demo(file, &config.instrumentation).await?;
    let run = outcome
        .run_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "legacy".to_string());
    println!(
        "{} Recorded demo run {} to {}",
        "✓".green(),
        run.cyan(),
        file.display()
    );
    println!("  results: {:?}", outcome.results);
    Ok(())
}

fn cmd_check(file: &Path, run: Option<RunId>, filter: &EventFilter) -> Result<()> {
    debug!(?file, ?run, "cmd_check: called");
    let groups = load_groups(file, run, filter)?;
    if groups.is_empty() {
        println!("No events found.");
        return Ok(());
    }

    for (key, events) in groups.iter() {
        println!("{}", format!("=== {} ===", key.label()).bold());
        let issues = check_consistency(events);
        if issues.is_empty() {
            println!("  {} no consistency issues", "✓".green());
        }
        for issue in issues {
            println!("  {} {}", "⚠".yellow(), issue);
        }
    }
    Ok(())
}

/// Print rendered lines, highlighting run headers and warnings
fn print_lines(lines: &[String]) {
    for line in lines {
        if line.starts_with("===") {
            println!("{}", line.bold());
        } else if line.trim_start().starts_with("- ⚠") {
            println!("{}", line.yellow());
        } else {
            println!("{}", line);
        }
    }
}
