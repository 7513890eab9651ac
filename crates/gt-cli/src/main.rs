//! GoodTube CLI
//!
//! Compiles filter lists into blocking rules, keeps the rules file up to date
//! and exposes the settings and sponsor-segment lookups.

mod applier;
mod config;
mod daemon;
mod fetcher;
mod pipeline;
mod scheduler;
mod sponsor;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use env_logger::Env;

use gt_compiler::{compile_rules, extract_patterns};
use gt_core::schedule::{hours_since, UpdateTrigger};
use gt_core::segments::video_id;
use gt_core::settings::{SettingKey, UserSettings};
use gt_core::storage::JsonFileStore;
use gt_core::types::{
    validate_rule_set, BlockingRule, ResourceTypes, RuleAction, MAX_RULES, RULE_PRIORITY,
};

use crate::applier::{load_rules, write_rules, JsonFileApplier};
use crate::config::Config;
use crate::fetcher::{ListFetcher, ReqwestTransport, RetryPolicy};
use crate::pipeline::{UpdateOutcome, UpdatePipeline, UpdateReport};
use crate::scheduler::{now_ms, Scheduler};
use crate::sponsor::SponsorClient;

#[derive(Parser)]
#[command(name = "gt-cli")]
#[command(about = "GoodTube filter list compiler and rule updater")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log progress at info level and print per-list statistics
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile local filter lists into a rules file
    Compile {
        /// Input filter list files
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Output rules file
        #[arg(short, long, default_value = "rules.json")]
        output: String,
    },

    /// Fetch the configured lists and apply the rules if they are stale
    Update {
        /// Update even if the rules are fresh
        #[arg(long)]
        force: bool,
    },

    /// Keep the rules up to date until interrupted
    Daemon,

    /// Validate a rules file
    Validate {
        /// Rules file to validate
        #[arg(short, long)]
        input: String,
    },

    /// Dump rules file info
    Info {
        /// Rules file to inspect
        #[arg(short, long)]
        input: String,
    },

    /// Look up sponsor segments for a video
    Segments {
        /// Video id or watch URL
        #[arg(long)]
        video: String,
    },

    /// Show or toggle user settings
    Settings {
        /// Setting to flip (hide-ads, skip-intro)
        #[arg(long)]
        toggle: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "info" } else { "warn" };
    env_logger::init_from_env(Env::default().filter_or("RUST_LOG", level));

    let result = Config::load(cli.config.as_deref())
        .map_err(|e| e.to_string())
        .and_then(|config| match cli.command {
            Commands::Compile { input, output } => {
                cmd_compile(&config, &input, &output, cli.verbose)
            }
            Commands::Update { force } => cmd_update(&config, force),
            Commands::Daemon => cmd_daemon(&config),
            Commands::Validate { input } => cmd_validate(&input),
            Commands::Info { input } => cmd_info(&input),
            Commands::Segments { video } => cmd_segments(&config, &video),
            Commands::Settings { toggle } => cmd_settings(&config, toggle.as_deref()),
        });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Runtime::new().map_err(|e| format!("Failed to start tokio runtime: {}", e))
}

fn build_pipeline(
    config: &Config,
) -> Result<UpdatePipeline<ReqwestTransport, JsonFileApplier>, String> {
    let transport = ReqwestTransport::new(&config.fetch.user_agent)
        .map_err(|e| format!("Failed to create HTTP client: {}", e))?;
    let store = Arc::new(JsonFileStore::new(&config.storage_path));

    Ok(UpdatePipeline::new(
        ListFetcher::new(transport, RetryPolicy::from(&config.fetch)),
        JsonFileApplier::new(&config.rules_path, MAX_RULES),
        Scheduler::new(store, config.update_interval_ms()),
        config.sources.clone(),
        config.max_rules,
    ))
}

fn cmd_compile(
    config: &Config,
    inputs: &[String],
    output: &str,
    verbose: bool,
) -> Result<(), String> {
    if inputs.is_empty() {
        return Err("No input files specified".to_string());
    }

    let start = Instant::now();
    let mut sets = Vec::with_capacity(inputs.len());
    let mut total_lines = 0usize;

    for (list_id, path) in inputs.iter().enumerate() {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{}': {}", path, e))?;

        let line_count = content.lines().count();
        total_lines += line_count;

        let patterns = extract_patterns(&content);

        if verbose {
            println!(
                "  [{}] {} - {} lines, {} patterns",
                list_id,
                Path::new(path).file_name().unwrap_or_default().to_string_lossy(),
                line_count,
                patterns.len()
            );
        }

        sets.push(patterns);
    }

    let output_rules = compile_rules(sets, config.max_rules);
    let stats = &output_rules.stats;

    validate_rule_set(&output_rules.rules, config.max_rules)
        .map_err(|e| format!("Generated rules failed validation: {}", e))?;

    write_rules(Path::new(output), &output_rules.rules).map_err(|e| e.to_string())?;

    println!("Compiled {} filter lists to '{}'", inputs.len(), output);
    println!("  Lines:    {}", total_lines);
    println!("  Patterns: {} -> {} (dedupe removed {})", stats.before, stats.after, stats.deduped);
    if stats.truncated > 0 {
        println!(
            "  Capped:   {} patterns over the {} rule limit",
            stats.truncated, config.max_rules
        );
    }
    println!("  Rules:    {}", output_rules.rules.len());
    println!("  Time:     {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);

    Ok(())
}

fn print_report(report: &UpdateReport) {
    for source in &report.sources {
        println!("  {:<12} {} lines, {} patterns", source.name, source.lines, source.patterns);
    }
    println!(
        "  Patterns: {} -> {} (dedupe removed {})",
        report.patterns_before,
        report.patterns_before - report.deduped - report.truncated,
        report.deduped
    );
    if report.truncated > 0 {
        println!("  Capped:   {} patterns dropped", report.truncated);
    }
    println!("  Rules:    {} applied, {} active", report.rules, report.active);
}

fn cmd_update(config: &Config, force: bool) -> Result<(), String> {
    let pipeline = build_pipeline(config)?;
    let trigger = if force {
        UpdateTrigger::Manual
    } else {
        UpdateTrigger::Startup
    };

    let now = now_ms();
    let outcome = runtime()?.block_on(pipeline.trigger(trigger, now));

    match outcome {
        UpdateOutcome::Applied(report) => {
            println!("Updated rules in '{}'", config.rules_path.display());
            print_report(&report);
            Ok(())
        }
        UpdateOutcome::Skipped => {
            match hours_since(pipeline.scheduler().last_update(), now) {
                Some(hours) => println!("Rules are up to date (updated {:.1} h ago)", hours),
                None => println!("Rules are up to date"),
            }
            Ok(())
        }
        UpdateOutcome::Busy => Err("An update is already in progress".to_string()),
        UpdateOutcome::Failed(e) => Err(format!("Failed to apply rules: {}", e)),
    }
}

fn cmd_daemon(config: &Config) -> Result<(), String> {
    let pipeline = Arc::new(build_pipeline(config)?);
    runtime()?.block_on(daemon::run(pipeline, config.check_interval()));
    Ok(())
}

/// Fixed-metadata problems of one rule, if any.
fn metadata_problem(rule: &BlockingRule) -> Option<String> {
    if rule.priority != RULE_PRIORITY {
        return Some(format!("rule {} has priority {}", rule.id, rule.priority));
    }
    if rule.action != RuleAction::Block {
        return Some(format!("rule {} is not a block rule", rule.id));
    }
    if rule.condition.resource_types != ResourceTypes::BLOCKED {
        return Some(format!("rule {} has unexpected resource types", rule.id));
    }
    None
}

fn read_rules(input: &str) -> Result<Vec<BlockingRule>, String> {
    let path = Path::new(input);
    if !path.exists() {
        return Err(format!("Failed to read '{}': file not found", input));
    }
    load_rules(path).map_err(|e| e.to_string())
}

fn cmd_validate(input: &str) -> Result<(), String> {
    let rules = read_rules(input)?;

    validate_rule_set(&rules, MAX_RULES).map_err(|e| format!("Invalid rules: {}", e))?;
    if let Some(problem) = rules.iter().find_map(metadata_problem) {
        return Err(format!("Invalid rules: {}", problem));
    }

    println!("Rules file '{}' is valid", input);
    println!("  Rules:       {} of {}", rules.len(), MAX_RULES);

    Ok(())
}

fn cmd_info(input: &str) -> Result<(), String> {
    let rules = read_rules(input)?;
    let size = fs::metadata(input).map(|m| m.len()).unwrap_or(0);

    let path_patterns = rules
        .iter()
        .filter(|rule| rule.condition.url_filter.starts_with("*/"))
        .count();

    println!("Rules: {}", input);
    println!("  Total size:  {} bytes ({:.1} KB)", size, size as f64 / 1024.0);
    println!("  Count:       {} (limit {})", rules.len(), MAX_RULES);
    println!("  Domains:     {}", rules.len() - path_patterns);
    println!("  Paths:       {}", path_patterns);
    match validate_rule_set(&rules, MAX_RULES) {
        Ok(()) => println!("  Valid:       yes"),
        Err(e) => println!("  Valid:       no ({})", e),
    }
    println!();

    println!("First rules:");
    for rule in rules.iter().take(5) {
        println!("  {:>5}  {}", rule.id, rule.condition.url_filter);
    }

    Ok(())
}

fn cmd_segments(config: &Config, video: &str) -> Result<(), String> {
    let id = video_id(video).ok_or_else(|| format!("Not a video id or watch URL: '{}'", video))?;

    let transport = ReqwestTransport::new(&config.fetch.user_agent)
        .map_err(|e| format!("Failed to create HTTP client: {}", e))?;
    let client = SponsorClient::new(transport, config.sponsor_api_url.clone());
    let segments = runtime()?.block_on(client.fetch_segments(id));

    if segments.is_empty() {
        println!("No segments for {}", id);
        return Ok(());
    }

    println!("Segments for {}:", id);
    for segment in &segments {
        println!(
            "  {:>8.1}s - {:>8.1}s  {}",
            segment.start(),
            segment.end(),
            segment.category.as_deref().unwrap_or("-")
        );
    }

    Ok(())
}

fn cmd_settings(config: &Config, toggle: Option<&str>) -> Result<(), String> {
    let store = JsonFileStore::new(&config.storage_path);
    let mut settings = UserSettings::load(&store);

    if let Some(name) = toggle {
        let key = SettingKey::parse(name).ok_or_else(|| {
            format!("Unknown setting '{}' (expected hide-ads or skip-intro)", name)
        })?;
        let message = settings.toggle(key);
        if let Err(e) = settings.save(&store) {
            log::warn!("Failed to save settings: {}", e);
        }
        match message.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => log::warn!("Failed to encode page message: {}", e),
        }
    }

    for key in SettingKey::ALL {
        let state = if settings.get(key) { "on" } else { "off" };
        println!("  {:<12} {}", key.label(), state);
    }

    Ok(())
}
