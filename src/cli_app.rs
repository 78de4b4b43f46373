//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use mai_data::core::config::Config;
use mai_data::core::paths::find_repo_root;
use mai_data::guard::report::{ScanReport, SizeGuard, format_bytes};
use mai_data::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};
use mai_data::split::atomic::{DiffSource, RawPrRecord, SkipReason, SplitOutcome, Splitter};
use mai_data::split::cache::{CacheOnlySource, DiffCache};
use mai_data::split::ndjson::{NdjsonReader, NdjsonWriter};

/// mai-data — PR corpus data utilities.
#[derive(Debug, Parser)]
#[command(
    name = "mai-data",
    author,
    version,
    about = "PR corpus data utilities - repository size guard and atomic diff splitting",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Verify no repository file exceeds the size limit (CI gate).
    Check(CheckArgs),
    /// Split raw PR records into atomic diffs.
    Split(SplitArgs),
    /// Inspect and maintain the diff cache.
    Cache(CacheArgs),
    /// View and validate configuration state.
    Config(ConfigArgs),
    /// Show version and optional build metadata.
    Version(VersionArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct CheckArgs {
    /// Root directory to scan (defaults to the enclosing repository root).
    #[arg(value_name = "ROOT")]
    root: Option<PathBuf>,
    /// Per-file byte ceiling (overrides configuration).
    #[arg(long, value_name = "BYTES")]
    max_bytes: Option<u64>,
}

#[derive(Debug, Clone, Args)]
struct SplitArgs {
    /// Input NDJSON file with raw PR records.
    #[arg(long, value_name = "PATH")]
    input: PathBuf,
    /// Output NDJSON file for atomic diffs.
    #[arg(long, value_name = "PATH")]
    output: PathBuf,
    /// Diff cache directory (overrides configuration).
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,
    /// Never touch the network; records without a cached diff are skipped.
    #[arg(long)]
    offline: bool,
}

#[derive(Debug, Clone, Args)]
struct CacheArgs {
    /// Diff cache directory (overrides configuration).
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,
    /// Cache operation to run.
    #[command(subcommand)]
    command: CacheCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum CacheCommand {
    /// Show entry count and total size.
    Status,
    /// Remove every cached diff.
    Clear,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args, Default)]
struct VersionArgs {
    /// Include additional build metadata fields.
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// The size gate failed: at least one file exceeds the limit.
    #[error("{0}")]
    Gate(String),
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    ///
    /// `check` exits 1 on an oversized file so the command works directly as
    /// a CI gate step.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Gate(_) | Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Internal(_) | Self::Json(_) => 3,
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Check(args) => run_check(cli, args),
        Command::Split(args) => run_split(cli, args),
        Command::Cache(args) => run_cache(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Version(args) => emit_version(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    Config::load(cli.config.as_deref()).map_err(|e| CliError::User(e.to_string()))
}

// ──────────────────── check ────────────────────

fn run_check(cli: &Cli, args: &CheckArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let root = args
        .root
        .clone()
        .unwrap_or_else(|| find_repo_root(Path::new(".")));

    let mut guard =
        SizeGuard::new(&root, &config.guard).map_err(|e| CliError::User(e.to_string()))?;
    if let Some(max_bytes) = args.max_bytes {
        guard = guard.with_max_bytes(max_bytes);
    }

    let report = guard.scan();
    log_check(&config, guard.root(), &report);

    match output_mode(cli) {
        OutputMode::Human => {
            if !cli.quiet {
                for skip in &report.skipped {
                    eprintln!(
                        "{} skipping {}: {}",
                        "[MAI-GUARD]".yellow(),
                        skip.path.display(),
                        skip.reason
                    );
                }
            }

            if report.within_limits() {
                if !cli.quiet {
                    println!(
                        "{} {} files within {} ({} scanned in {:.1}s)",
                        "PASS".green().bold(),
                        report.files_scanned,
                        format_bytes(report.max_bytes),
                        format_bytes(report.bytes_scanned),
                        report.elapsed.as_secs_f64(),
                    );
                }
            } else {
                println!("Found files exceeding size limit:");
                for file in &report.oversized {
                    println!(
                        "  {}: {}",
                        file.rel_path.display(),
                        format_bytes(file.size_bytes).red(),
                    );
                }
                println!(
                    "{} {} of {} files exceed {}",
                    "FAIL".red().bold(),
                    report.oversized.len(),
                    report.files_scanned,
                    format_bytes(report.max_bytes),
                );
            }
        }
        OutputMode::Json => {
            let oversized: Vec<Value> = report
                .oversized
                .iter()
                .map(|f| json!({"path": f.rel_path.to_string_lossy(), "size_bytes": f.size_bytes}))
                .collect();
            let skipped: Vec<Value> = report
                .skipped
                .iter()
                .map(|s| json!({"path": s.path.to_string_lossy(), "reason": s.reason}))
                .collect();
            let payload = json!({
                "command": "check",
                "ok": report.within_limits(),
                "root": guard.root().to_string_lossy(),
                "max_bytes": report.max_bytes,
                "files_scanned": report.files_scanned,
                "bytes_scanned": report.bytes_scanned,
                "oversized": oversized,
                "skipped": skipped,
                "elapsed_ms": u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            });
            write_json_line(&payload)?;
        }
    }

    if report.within_limits() {
        Ok(())
    } else {
        Err(CliError::Gate(format!(
            "{} file(s) exceed the {} limit",
            report.oversized.len(),
            format_bytes(report.max_bytes),
        )))
    }
}

fn log_check(config: &Config, root: &Path, report: &ScanReport) {
    let mut log = JsonlWriter::open(JsonlConfig::for_path(&config.paths.jsonl_log));

    for skip in &report.skipped {
        let mut entry = LogEntry::new(EventType::EntrySkipped, Severity::Warning);
        entry.path = Some(skip.path.to_string_lossy().into_owned());
        entry.details = Some(skip.reason.clone());
        log.write_entry(&entry);
    }

    for file in &report.oversized {
        let mut entry = LogEntry::new(EventType::OversizedFile, Severity::Warning);
        entry.path = Some(file.rel_path.to_string_lossy().into_owned());
        entry.size = Some(file.size_bytes);
        entry.max_bytes = Some(report.max_bytes);
        log.write_entry(&entry);
    }

    let ok = report.within_limits();
    let mut entry = LogEntry::new(
        EventType::ScanComplete,
        if ok { Severity::Info } else { Severity::Warning },
    );
    entry.path = Some(root.to_string_lossy().into_owned());
    entry.max_bytes = Some(report.max_bytes);
    entry.files_scanned = Some(report.files_scanned as u64);
    entry.duration_ms = Some(u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX));
    entry.ok = Some(ok);
    if let Ok(hash) = config.stable_hash() {
        entry.details = Some(format!("config_hash={hash}"));
    }
    log.write_entry(&entry);
}

// ──────────────────── split ────────────────────

#[derive(Debug, Default)]
struct SplitCounters {
    processed: u64,
    split: u64,
    malformed: u64,
    missing_url: u64,
    vanished: u64,
    fetch_failed: u64,
    too_few: u64,
}

impl SplitCounters {
    const fn skipped(&self) -> u64 {
        self.malformed + self.missing_url + self.vanished + self.fetch_failed + self.too_few
    }

    fn count(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::MissingDiffUrl => self.missing_url += 1,
            SkipReason::Vanished => self.vanished += 1,
            SkipReason::FetchFailed(_) => self.fetch_failed += 1,
            SkipReason::TooFewDiffs { .. } => self.too_few += 1,
        }
    }
}

fn make_diff_source(cache: DiffCache, offline: bool, config: &Config) -> Box<dyn DiffSource> {
    #[cfg(feature = "fetch")]
    {
        if offline {
            Box::new(CacheOnlySource::new(cache))
        } else {
            let fetcher = mai_data::split::fetch::DiffFetcher::new(config.fetch.clone());
            Box::new(mai_data::split::fetch::FetchingSource::new(cache, fetcher))
        }
    }
    #[cfg(not(feature = "fetch"))]
    {
        let _ = config;
        if !offline {
            eprintln!("[MAI-SPLIT] built without fetch support, running offline");
        }
        Box::new(CacheOnlySource::new(cache))
    }
}

#[allow(clippy::too_many_lines)]
fn run_split(cli: &Cli, args: &SplitArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let cache_dir = args
        .cache_dir
        .clone()
        .unwrap_or_else(|| config.paths.cache_dir.clone());
    let cache = DiffCache::new(cache_dir);

    let reader = NdjsonReader::<RawPrRecord>::open(&args.input)
        .map_err(|e| CliError::User(e.to_string()))?;
    let mut writer =
        NdjsonWriter::create(&args.output).map_err(|e| CliError::Runtime(e.to_string()))?;

    let source = make_diff_source(cache, args.offline, &config);
    let mut splitter = Splitter::new(config.split.clone(), source);

    let mut log = JsonlWriter::open(JsonlConfig::for_path(&config.paths.jsonl_log));
    let mut counters = SplitCounters::default();
    let start = std::time::Instant::now();

    for record in reader {
        counters.processed += 1;
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                counters.malformed += 1;
                if !cli.quiet {
                    eprintln!("{} {}", "[MAI-SPLIT]".yellow(), err);
                }
                let mut entry = LogEntry::new(EventType::RecordSkipped, Severity::Warning);
                entry.error_code = Some(err.code().to_string());
                entry.error_message = Some(err.to_string());
                log.write_entry(&entry);
                continue;
            }
        };

        match splitter.split_record(&record) {
            SplitOutcome::Split(split) => {
                writer
                    .write(&split)
                    .map_err(|e| CliError::Runtime(e.to_string()))?;
                counters.split += 1;

                if cli.verbose {
                    eprintln!(
                        "[MAI-SPLIT] PR {}: {} atomic diffs",
                        record.id_label(),
                        split.atomic_diffs.len()
                    );
                }
                let mut entry = LogEntry::new(EventType::RecordSplit, Severity::Info);
                entry.pr_id = Some(record.id_label());
                entry.repo = record.repo.as_ref().map(ToString::to_string);
                entry.diff_count = Some(split.atomic_diffs.len() as u64);
                log.write_entry(&entry);
            }
            SplitOutcome::Skipped(reason) => {
                counters.count(&reason);
                if cli.verbose {
                    eprintln!(
                        "[MAI-SPLIT] PR {} skipped: {}",
                        record.id_label(),
                        reason
                    );
                }
                let mut entry = LogEntry::new(EventType::RecordSkipped, Severity::Warning);
                entry.pr_id = Some(record.id_label());
                entry.details = Some(reason.to_string());
                log.write_entry(&entry);
            }
        }
    }

    writer.finish().map_err(|e| CliError::Runtime(e.to_string()))?;
    let elapsed = start.elapsed();

    let mut entry = LogEntry::new(EventType::SplitComplete, Severity::Info);
    entry.files_scanned = Some(counters.processed);
    entry.diff_count = Some(counters.split);
    entry.duration_ms = Some(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
    entry.ok = Some(true);
    log.write_entry(&entry);

    match output_mode(cli) {
        OutputMode::Human => {
            if !cli.quiet {
                println!(
                    "Processed {} records in {:.1}s: {} split, {} skipped",
                    counters.processed,
                    elapsed.as_secs_f64(),
                    counters.split,
                    counters.skipped(),
                );
                if counters.skipped() > 0 {
                    println!(
                        "  Skips: {} malformed, {} without diff_url, {} vanished, {} fetch failures, {} below min diffs",
                        counters.malformed,
                        counters.missing_url,
                        counters.vanished,
                        counters.fetch_failed,
                        counters.too_few,
                    );
                }
                println!("  Output: {}", args.output.display());
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "split",
                "input": args.input.to_string_lossy(),
                "output": args.output.to_string_lossy(),
                "processed": counters.processed,
                "split": counters.split,
                "skipped": {
                    "malformed": counters.malformed,
                    "missing_diff_url": counters.missing_url,
                    "vanished": counters.vanished,
                    "fetch_failed": counters.fetch_failed,
                    "too_few_diffs": counters.too_few,
                },
                "elapsed_ms": u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            });
            write_json_line(&payload)?;
        }
    }

    Ok(())
}

// ──────────────────── cache ────────────────────

fn run_cache(cli: &Cli, args: &CacheArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let cache_dir = args
        .cache_dir
        .clone()
        .unwrap_or_else(|| config.paths.cache_dir.clone());
    let cache = DiffCache::new(cache_dir);

    match args.command {
        CacheCommand::Status => {
            let status = cache.status().map_err(|e| CliError::Runtime(e.to_string()))?;
            match output_mode(cli) {
                OutputMode::Human => {
                    println!("Diff cache: {}", cache.dir().display());
                    println!("  Entries: {}", status.entries);
                    println!("  Size:    {}", format_bytes(status.total_bytes));
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "cache status",
                        "dir": cache.dir().to_string_lossy(),
                        "entries": status.entries,
                        "total_bytes": status.total_bytes,
                    });
                    write_json_line(&payload)?;
                }
            }
        }
        CacheCommand::Clear => {
            let removed = cache.clear().map_err(|e| CliError::Runtime(e.to_string()))?;
            match output_mode(cli) {
                OutputMode::Human => {
                    println!("Removed {removed} cached diffs from {}", cache.dir().display());
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "cache clear",
                        "dir": cache.dir().to_string_lossy(),
                        "removed": removed,
                    });
                    write_json_line(&payload)?;
                }
            }
        }
    }

    Ok(())
}

// ──────────────────── config ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match args.command.as_ref().unwrap_or(&ConfigCommand::Show) {
        ConfigCommand::Path => {
            let path = cli
                .config
                .clone()
                .unwrap_or_else(Config::default_path);
            match output_mode(cli) {
                OutputMode::Human => println!("{}", path.display()),
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": path.exists(),
                    });
                    write_json_line(&payload)?;
                }
            }
        }
        ConfigCommand::Show => {
            let config = load_config(cli)?;
            match output_mode(cli) {
                OutputMode::Human => {
                    let rendered = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Internal(e.to_string()))?;
                    print!("{rendered}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
        }
        ConfigCommand::Validate => {
            let config = load_config(cli)?;
            match output_mode(cli) {
                OutputMode::Human => {
                    println!(
                        "{} configuration valid ({})",
                        "OK".green().bold(),
                        config.paths.config_file.display(),
                    );
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config validate",
                        "ok": true,
                        "path": config.paths.config_file.to_string_lossy(),
                    });
                    write_json_line(&payload)?;
                }
            }
        }
    }

    Ok(())
}

// ──────────────────── version / output helpers ────────────────────

fn emit_version(cli: &Cli, args: &VersionArgs) -> Result<(), CliError> {
    let version = env!("CARGO_PKG_VERSION");
    let package = env!("CARGO_PKG_NAME");
    let target = option_env!("TARGET").unwrap_or("unknown");
    let profile = option_env!("PROFILE").unwrap_or("unknown");

    match output_mode(cli) {
        OutputMode::Human => {
            println!("mai-data {version}");
            if args.verbose {
                println!("package: {package}");
                println!("target: {target}");
                println!("profile: {profile}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "binary": "mai-data",
                "version": version,
                "package": package,
                "build": {
                    "target": target,
                    "profile": profile,
                }
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("MAI_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        Some("auto") | None => fallback,
        Some(_) => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn output_mode_resolution_honors_precedence() {
        // --json beats everything.
        assert_eq!(
            resolve_output_mode(true, Some("human"), true),
            OutputMode::Json
        );
        // Env var beats tty detection.
        assert_eq!(
            resolve_output_mode(false, Some("json"), true),
            OutputMode::Json
        );
        assert_eq!(
            resolve_output_mode(false, Some("human"), false),
            OutputMode::Human
        );
        // Tty fallback.
        assert_eq!(resolve_output_mode(false, None, true), OutputMode::Human);
        assert_eq!(resolve_output_mode(false, None, false), OutputMode::Json);
        // Unknown env values fall back.
        assert_eq!(
            resolve_output_mode(false, Some("bogus"), true),
            OutputMode::Human
        );
    }

    #[test]
    fn exit_codes_follow_the_gate_contract() {
        assert_eq!(CliError::Gate(String::new()).exit_code(), 1);
        assert_eq!(CliError::User(String::new()).exit_code(), 1);
        assert_eq!(CliError::Runtime(String::new()).exit_code(), 2);
        assert_eq!(CliError::Internal(String::new()).exit_code(), 3);
    }

    #[test]
    fn check_accepts_root_and_max_bytes() {
        let cli = Cli::try_parse_from([
            "mai-data",
            "check",
            "/tmp/repo",
            "--max-bytes",
            "1048576",
        ])
        .unwrap();
        match cli.command {
            Command::Check(args) => {
                assert_eq!(args.root, Some(PathBuf::from("/tmp/repo")));
                assert_eq!(args.max_bytes, Some(1_048_576));
            }
            other => panic!("expected check, got {other:?}"),
        }
    }

    #[test]
    fn split_requires_input_and_output() {
        assert!(Cli::try_parse_from(["mai-data", "split"]).is_err());
        let cli = Cli::try_parse_from([
            "mai-data", "split", "--input", "in.ndjson", "--output", "out.ndjson", "--offline",
        ])
        .unwrap();
        match cli.command {
            Command::Split(args) => {
                assert!(args.offline);
                assert_eq!(args.input, PathBuf::from("in.ndjson"));
            }
            other => panic!("expected split, got {other:?}"),
        }
    }
}
