//! Test scheduling and execution
//!
//! A fixed-size worker pool drains a shared queue of test cases. Each
//! worker binds one browser session at a time, executes a case's actions
//! strictly in script order, and resolves every capture against the golden
//! store. All per-case failures are converted into an outcome value at the
//! case boundary; nothing a test case does can abort its siblings.

use chrono::Utc;
use snapdiff_browser::{ActiveSession, SessionPool};
use snapdiff_core::{
    Action, CaptureOutcome, CapturedImage, DiffResult, Result, RunConfig, RunOutcome, TestCase,
    TestOutcome, Viewport,
};
use snapdiff_diff::{compare, DiffOptions};
use snapdiff_store::{GoldenKey, GoldenStore};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct Runner {
    pool: Arc<SessionPool>,
    store: Arc<dyn GoldenStore>,
    config: Arc<RunConfig>,
    cancelled: Arc<AtomicBool>,
}

/// Everything a worker needs, shared across the pool
struct WorkerContext {
    pool: Arc<SessionPool>,
    store: Arc<dyn GoldenStore>,
    config: Arc<RunConfig>,
    cancelled: Arc<AtomicBool>,
    queue: Mutex<VecDeque<TestCase>>,
    results: Mutex<Vec<TestOutcome>>,
}

impl Runner {
    pub fn new(pool: Arc<SessionPool>, store: Arc<dyn GoldenStore>, config: RunConfig) -> Self {
        Self {
            pool,
            store,
            config: Arc::new(config),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked between test cases. A cancelled run lets in-flight
    /// cases finish (releasing their sessions), skips the rest of the
    /// queue, and reports what completed.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Execute all test cases matching the configured name filter and
    /// aggregate their outcomes.
    pub async fn run(&self, cases: Vec<TestCase>) -> RunOutcome {
        let started_at = Utc::now();

        let scheduled: VecDeque<TestCase> = cases
            .into_iter()
            .filter(|case| {
                let matched = self.config.matches_filter(&case.id);
                if !matched {
                    debug!("skipping {} (does not match filter)", case.id);
                }
                matched
            })
            .collect();

        let total = scheduled.len();
        let workers = self.config.max_concurrency.min(total.max(1));
        info!(
            "running {} test case(s) across {} worker(s), {} mode",
            total,
            workers,
            if self.config.update { "update" } else { "compare" }
        );

        let ctx = Arc::new(WorkerContext {
            pool: Arc::clone(&self.pool),
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            cancelled: Arc::clone(&self.cancelled),
            queue: Mutex::new(scheduled),
            results: Mutex::new(Vec::with_capacity(total)),
        });

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let ctx = Arc::clone(&ctx);
            handles.push(tokio::spawn(worker_loop(ctx, worker_id)));
        }
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("worker task aborted: {}", e);
            }
        }

        let mut outcomes = std::mem::take(&mut *ctx.results.lock().await);
        outcomes.sort_by(|a, b| a.test_id.cmp(&b.test_id));

        RunOutcome {
            started_at,
            finished_at: Utc::now(),
            cancelled: self.cancelled.load(Ordering::SeqCst),
            outcomes,
        }
    }
}

async fn worker_loop(ctx: Arc<WorkerContext>, worker_id: usize) {
    loop {
        if ctx.cancelled.load(Ordering::SeqCst) {
            debug!("worker {} stopping: run cancelled", worker_id);
            break;
        }
        let Some(case) = ctx.queue.lock().await.pop_front() else {
            break;
        };
        debug!("worker {} picked up {}", worker_id, case.id);
        let outcome = run_case(&ctx, case).await;
        ctx.results.lock().await.push(outcome);
    }
}

/// Run one case under the whole-case time budget
async fn run_case(ctx: &WorkerContext, case: TestCase) -> TestOutcome {
    let case_id = case.id.clone();
    let budget = ctx.config.test_timeout;
    match tokio::time::timeout(budget, run_case_inner(ctx, case)).await {
        Ok(outcome) => outcome,
        Err(_) => TestOutcome::errored(
            case_id,
            format!("test case exceeded its {}ms budget", budget.as_millis()),
        ),
    }
}

async fn run_case_inner(ctx: &WorkerContext, case: TestCase) -> TestOutcome {
    let mut active = match ctx.pool.acquire().await {
        Ok(active) => active,
        Err(e) => return TestOutcome::errored(case.id, format!("no session available: {}", e)),
    };

    let executed = execute_actions(&mut active, &case).await;
    // the session goes back on every exit path, or the pool would drain
    ctx.pool.release(active).await;

    match executed {
        Ok(captures) => resolve_captures(ctx, &case, captures).await,
        Err(e) => TestOutcome::errored(case.id, e.to_string()),
    }
}

/// Execute the action sequence strictly in script order. The first failing
/// action short-circuits the rest of the case.
async fn execute_actions(
    active: &mut ActiveSession,
    case: &TestCase,
) -> Result<Vec<CapturedImage>> {
    let session = active.session.as_mut();
    session.set_viewport(case.viewport).await?;

    let mut captures = Vec::new();
    for action in &case.actions {
        match action {
            Action::Navigate { url } => session.navigate(url).await?,
            Action::SetViewport { width, height } => {
                session
                    .set_viewport(Viewport {
                        width: *width,
                        height: *height,
                    })
                    .await?
            }
            Action::Wait { condition } => session.wait(condition).await?,
            Action::Click { selector } => session.click(selector).await?,
            Action::Capture { label } => {
                let png = session.capture().await?;
                captures.push(CapturedImage::from_png(&case.id, label, &png)?);
            }
        }
    }
    Ok(captures)
}

/// Resolve each capture against the golden store: update mode overwrites
/// unconditionally, compare mode diffs and a missing golden is an error,
/// never a silent pass.
async fn resolve_captures(
    ctx: &WorkerContext,
    case: &TestCase,
    captures: Vec<CapturedImage>,
) -> TestOutcome {
    let mut outcomes: Vec<CaptureOutcome> = Vec::with_capacity(captures.len());
    let mut failures: Vec<String> = Vec::new();
    let mut errors: Vec<String> = Vec::new();

    for candidate in captures {
        let key = GoldenKey::new(&candidate.test_id, &candidate.label);

        if ctx.config.update {
            match ctx.store.put(&key, &candidate).await {
                Ok(()) => {
                    info!("updated golden image {}", key);
                    outcomes.push(CaptureOutcome {
                        label: candidate.label,
                        passed: true,
                        score: 0.0,
                        updated: true,
                        diff_artifact: None,
                        candidate_artifact: None,
                    });
                }
                Err(e) => errors.push(format!("{}: failed to update golden: {}", key, e)),
            }
            continue;
        }

        let golden = match ctx.store.get(&key).await {
            Ok(Some(golden)) => golden,
            Ok(None) => {
                errors.push(format!(
                    "{}: no golden image; run with update mode first",
                    key
                ));
                continue;
            }
            Err(e) => {
                errors.push(format!("{}: failed to read golden: {}", key, e));
                continue;
            }
        };

        let options = DiffOptions {
            tolerance: case.tolerance.unwrap_or(ctx.config.tolerance),
            ..DiffOptions::default()
        };
        let result = compare(&golden, &candidate, &options);

        if result.passed {
            outcomes.push(CaptureOutcome {
                label: candidate.label,
                passed: true,
                score: result.score,
                updated: false,
                diff_artifact: None,
                candidate_artifact: None,
            });
        } else {
            failures.push(describe_failure(&result, &golden, &candidate, &options));
            let (candidate_artifact, diff_artifact) =
                write_failure_artifacts(ctx, &candidate, &result);
            outcomes.push(CaptureOutcome {
                label: candidate.label,
                passed: false,
                score: result.score,
                updated: false,
                diff_artifact,
                candidate_artifact,
            });
        }
    }

    if !errors.is_empty() {
        let mut outcome = TestOutcome::errored(case.id.clone(), errors.join("; "));
        outcome.captures = outcomes;
        outcome
    } else if !failures.is_empty() {
        TestOutcome::failed(case.id.clone(), failures.join("; "), outcomes)
    } else {
        TestOutcome::passed(case.id.clone(), outcomes)
    }
}

fn describe_failure(
    result: &DiffResult,
    golden: &CapturedImage,
    candidate: &CapturedImage,
    options: &DiffOptions,
) -> String {
    if result.dimension_mismatch {
        format!(
            "{}: dimensions changed from {}x{} to {}x{}",
            result.label,
            golden.width(),
            golden.height(),
            candidate.width(),
            candidate.height()
        )
    } else {
        format!(
            "{}: {:.3}% of pixels differ (tolerance {:.3}%)",
            result.label,
            result.score * 100.0,
            options.tolerance * 100.0
        )
    }
}

/// Persist the candidate capture and the diff visualization for human
/// inspection. Artifact write failures are logged, not fatal: the verdict
/// already stands.
fn write_failure_artifacts(
    ctx: &WorkerContext,
    candidate: &CapturedImage,
    result: &DiffResult,
) -> (Option<PathBuf>, Option<PathBuf>) {
    let dir = ctx.config.output_root.join(&candidate.test_id);
    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!("failed to create artifact dir {}: {}", dir.display(), e);
        return (None, None);
    }

    let candidate_path = dir.join(format!("{}.png", candidate.label));
    let candidate_artifact = match candidate.image.save(&candidate_path) {
        Ok(()) => Some(candidate_path),
        Err(e) => {
            warn!("failed to write {}: {}", candidate_path.display(), e);
            None
        }
    };

    let diff_artifact = result.diff_image.as_ref().and_then(|diff| {
        let diff_path = dir.join(format!("{}.diff.png", candidate.label));
        match diff.save(&diff_path) {
            Ok(()) => Some(diff_path),
            Err(e) => {
                warn!("failed to write {}: {}", diff_path.display(), e);
                None
            }
        }
    });

    (candidate_artifact, diff_artifact)
}
