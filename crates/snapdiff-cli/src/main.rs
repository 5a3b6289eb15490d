//! snapdiff CLI - visual-regression checks for web pages
//!
//! Usage:
//!   snapdiff [flags] <glob>
//!
//! Drives a browser through every test script matching the glob, captures
//! screenshots at the points the scripts mark, and compares each capture
//! against its golden image. With `-u` the captures overwrite the goldens
//! instead. Exits zero only if every test case passed.

use anyhow::{bail, Context, Result};
use clap::Parser;
use regex::Regex;
use snapdiff_browser::{BrowserConfig, CdpSessionFactory, SessionFactory, SessionPool};
use snapdiff_core::{default_concurrency, RunConfig, TestCase, TestOutcome};
use snapdiff_runner::{exit_code, render_summary, write_json_report, Runner};
use snapdiff_script::parse_script;
use snapdiff_store::FsStore;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "snapdiff")]
#[command(author, version, about = "Visual-regression testing for web pages")]
struct Cli {
    /// Glob matching test script files
    scripts: String,

    /// Directory holding golden (expected) screenshots
    #[arg(short = 'w', long = "want", default_value = "goldens")]
    want: PathBuf,

    /// Update golden screenshots instead of comparing against them
    #[arg(short, long)]
    update: bool,

    /// Template variables as comma-separated KEY:VALUE pairs
    #[arg(short, long)]
    vars: Option<String>,

    /// Number of test cases to run concurrently
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Attach to a running browser at this debugger URL
    #[arg(short, long)]
    debugger: Option<String>,

    /// Run only test cases whose identifier matches this regexp
    #[arg(long)]
    run: Option<String>,

    /// Directory for failure artifacts and the JSON report
    #[arg(short, long, default_value = "snapdiff-out")]
    output: PathBuf,

    /// Extra HTTP headers as comma-separated name:value pairs
    #[arg(long)]
    headers: Option<String>,

    /// Fraction of differing pixels tolerated (overridable per test)
    #[arg(long, default_value_t = 0.0)]
    tolerance: f64,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let config = build_config(&cli)?;
    config.validate()?;

    let (cases, parse_failures) = load_scripts(&cli.scripts, &config)?;
    if cases.is_empty() && parse_failures.is_empty() {
        bail!("no test cases found in scripts matching '{}'", cli.scripts);
    }

    let browser_config = BrowserConfig {
        headless: true,
        headers: config.headers.clone(),
        action_timeout: config.action_timeout,
    };
    let factory: Arc<dyn SessionFactory> = match &config.debugger_url {
        Some(url) => Arc::new(CdpSessionFactory::connect(url, browser_config)?),
        None => Arc::new(CdpSessionFactory::launch(browser_config)?),
    };

    let pool = Arc::new(SessionPool::new(config.max_concurrency, factory));
    let store = Arc::new(FsStore::new(&config.golden_root));
    let output_root = config.output_root.clone();
    let runner = Runner::new(pool, store, config);

    // ctrl-c flips the cancel flag; in-flight cases finish and release
    // their sessions, queued cases are skipped
    let cancel = runner.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing in-flight test cases");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let mut outcome = runner.run(cases).await;

    // malformed script files show up in the report like any other error,
    // without having blocked the runnable ones
    outcome.outcomes.extend(parse_failures);
    outcome.outcomes.sort_by(|a, b| a.test_id.cmp(&b.test_id));

    println!("{}", render_summary(&outcome));

    let report_path = output_root.join("report.json");
    if let Err(e) = write_json_report(&outcome, &report_path) {
        warn!("failed to write JSON report: {}", e);
    }

    std::process::exit(exit_code(&outcome));
}

/// Assemble the run configuration from argv; everything that can be
/// rejected up front is rejected here, before any scheduling.
fn build_config(cli: &Cli) -> Result<RunConfig> {
    let vars = match &cli.vars {
        Some(raw) => parse_pairs(raw, "variable")?.into_iter().collect(),
        None => HashMap::new(),
    };
    let headers = match &cli.headers {
        Some(raw) => parse_pairs(raw, "header")?,
        None => Vec::new(),
    };
    let filter = cli
        .run
        .as_deref()
        .map(Regex::new)
        .transpose()
        .with_context(|| format!("invalid filter regexp '{}'", cli.run.as_deref().unwrap_or("")))?;

    Ok(RunConfig {
        golden_root: cli.want.clone(),
        output_root: cli.output.clone(),
        update: cli.update,
        vars,
        max_concurrency: cli.concurrency.unwrap_or_else(default_concurrency),
        debugger_url: cli.debugger.clone(),
        filter,
        headers,
        tolerance: cli.tolerance,
        ..RunConfig::default()
    })
}

/// Parse `name:value,name:value` lists as used by `-v` and `--headers`
fn parse_pairs(raw: &str, what: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for piece in raw.split(',') {
        let Some((name, value)) = piece.split_once(':') else {
            bail!("invalid {} pair '{}', expected NAME:VALUE", what, piece);
        };
        pairs.push((name.trim().to_string(), value.trim().to_string()));
    }
    Ok(pairs)
}

/// Read and parse every script matching the glob. A malformed or
/// unreadable file becomes an errored outcome for that file; the other
/// files still run.
fn load_scripts(pattern: &str, config: &RunConfig) -> Result<(Vec<TestCase>, Vec<TestOutcome>)> {
    let mut cases = Vec::new();
    let mut failures = Vec::new();
    let mut matched = 0usize;

    for entry in glob::glob(pattern).with_context(|| format!("invalid glob '{}'", pattern))? {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                warn!("skipping unreadable glob entry: {}", e);
                continue;
            }
        };
        if path.is_dir() {
            continue;
        }
        matched += 1;

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let source = match std::fs::read_to_string(&path) {
            Ok(source) => source,
            Err(e) => {
                failures.push(TestOutcome::errored(
                    name,
                    format!("failed to read {}: {}", path.display(), e),
                ));
                continue;
            }
        };

        match parse_script(&name, &source, &config.vars) {
            Ok(parsed) => {
                info!("loaded {} test case(s) from {}", parsed.len(), path.display());
                cases.extend(parsed);
            }
            Err(e) => {
                failures.push(TestOutcome::errored(
                    name,
                    format!("{}: {}", path.display(), e),
                ));
            }
        }
    }

    if matched == 0 {
        bail!("no script files matched '{}'", pattern);
    }
    Ok((cases, failures))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let pairs = parse_pairs("ORIGIN:http://localhost:3000, TOKEN:abc", "variable").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("ORIGIN".to_string(), "http://localhost:3000".to_string()),
                ("TOKEN".to_string(), "abc".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_pairs_rejects_missing_value() {
        assert!(parse_pairs("JUSTAKEY", "variable").is_err());
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::parse_from([
            "snapdiff",
            "testdata/*.txt",
            "-u",
            "-c",
            "4",
            "--run",
            "^pages/",
            "-v",
            "ORIGIN:http://localhost:8080",
        ]);
        assert_eq!(cli.scripts, "testdata/*.txt");
        assert!(cli.update);
        assert_eq!(cli.concurrency, Some(4));
        assert_eq!(cli.run.as_deref(), Some("^pages/"));
    }
}
