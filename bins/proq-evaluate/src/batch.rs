//! Batch Driver - Evaluating Many Problem Files
//!
//! Each problem gets a fresh working directory that lives exactly as long as
//! its evaluation. Every per-problem failure is caught here so that one broken
//! problem never stops the rest of the batch.

use crate::engine::ExecutionEngine;
use crate::error::EvaluationError;
use crate::executor;
use crate::report::Reporter;
use crate::workspace::Workspace;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use proq_common::problem;
use proq_common::types::{EvaluationVerdict, Problem};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use uuid::Uuid;

/// One evaluated problem
#[derive(Debug)]
pub struct ProblemOutcome {
    pub path: PathBuf,
    pub title: String,
    /// `Err` carries the rendered error chain of a failed evaluation
    pub result: Result<EvaluationVerdict, String>,
    pub evaluated_at: DateTime<Utc>,
}

/// A path that produced no problems
#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<ProblemOutcome>,
    pub skipped: Vec<SkippedFile>,
}

/// Machine-readable line for `--json` output
#[derive(Debug, Serialize)]
pub struct OutcomeRecord<'a> {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution_ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_ok: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluated_at: Option<DateTime<Utc>>,
}

impl BatchSummary {
    /// True when nothing was skipped, nothing errored and every verdict is publishable
    pub fn all_publishable(&self) -> bool {
        self.skipped.is_empty()
            && self
                .outcomes
                .iter()
                .all(|o| matches!(&o.result, Ok(v) if v.is_publishable()))
    }

    pub fn records(&self) -> Vec<OutcomeRecord<'_>> {
        let evaluated = self.outcomes.iter().map(|o| {
            let verdict = o.result.as_ref().ok();
            OutcomeRecord {
                path: o.path.display().to_string(),
                title: Some(o.title.as_str()),
                solution_ok: verdict.map(|v| v.solution_ok),
                template_ok: verdict.map(|v| v.template_ok),
                error: o.result.as_ref().err().map(String::as_str),
                evaluated_at: Some(o.evaluated_at),
            }
        });
        let skipped = self.skipped.iter().map(|s| OutcomeRecord {
            path: s.path.display().to_string(),
            title: None,
            solution_ok: None,
            template_ok: None,
            error: Some(s.reason.as_str()),
            evaluated_at: None,
        });

        evaluated.chain(skipped).collect()
    }
}

/// Evaluate one problem in its own scoped working directory
async fn evaluate_isolated<E, R>(problem: &Problem, engine: &E, reporter: &R) -> Result<EvaluationVerdict>
where
    E: ExecutionEngine + ?Sized,
    R: Reporter + ?Sized,
{
    let workspace = Workspace::allocate().context("failed to allocate working directory")?;
    let evaluation_id = Uuid::new_v4();
    info!(
        evaluation_id = %evaluation_id,
        title = %problem.title,
        working_dir = %workspace.path().display(),
        test_cases = problem.total_testcases(),
        "Starting evaluation"
    );

    let dir = workspace.path().to_path_buf();
    let result = executor::evaluate_problem(problem, engine, &dir, reporter).await;
    settle(result, workspace.close(), &dir)
}

/// Fold the removal of a problem's working directory into its evaluation result
///
/// A removal failure fails an otherwise good evaluation. When the evaluation has
/// already failed, its error wins and the removal failure is logged.
fn settle(
    result: Result<EvaluationVerdict, EvaluationError>,
    released: io::Result<()>,
    dir: &Path,
) -> Result<EvaluationVerdict> {
    match (result, released) {
        (Ok(verdict), Ok(())) => Ok(verdict),
        (Ok(_), Err(e)) => Err(e).context("failed to release working directory"),
        (Err(e), released) => {
            if let Err(cleanup) = released {
                warn!(
                    working_dir = %dir.display(),
                    error = %cleanup,
                    "Failed to release working directory"
                );
            }
            Err(e.into())
        }
    }
}

/// Evaluate every problem in every file, in order
///
/// Paths that are not files (or cannot be parsed) are reported and skipped. A
/// single problem that fails validation is recorded as errored and the rest of
/// its file is still evaluated.
pub async fn evaluate_all<E, R>(paths: &[PathBuf], engine: &E, reporter: &R) -> BatchSummary
where
    E: ExecutionEngine + ?Sized,
    R: Reporter + ?Sized,
{
    let mut summary = BatchSummary::default();

    for path in paths {
        let problems = match problem::load_problems(path) {
            Ok(problems) => {
                reporter.file_started(path);
                problems
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping problem file");
                reporter.file_skipped(path, &e.to_string());
                summary.skipped.push(SkippedFile {
                    path: path.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        for (index, entry) in problems.iter().enumerate() {
            let problem = match entry {
                Ok(problem) => problem,
                Err(e) => {
                    let title = e
                        .title()
                        .map_or_else(|| format!("#{}", index + 1), str::to_string);
                    error!(path = %path.display(), title = %title, error = %e, "Invalid problem");
                    reporter.problem_failed(&title, &e.to_string());
                    summary.outcomes.push(ProblemOutcome {
                        path: path.clone(),
                        title,
                        result: Err(e.to_string()),
                        evaluated_at: Utc::now(),
                    });
                    continue;
                }
            };

            let result = evaluate_isolated(problem, engine, reporter).await;
            if let Err(e) = &result {
                error!(title = %problem.title, error = %format!("{e:#}"), "Evaluation failed");
                reporter.problem_failed(&problem.title, &format!("{e:#}"));
            }

            summary.outcomes.push(ProblemOutcome {
                path: path.clone(),
                title: problem.title.clone(),
                result: result.map_err(|e| format!("{e:#}")),
                evaluated_at: Utc::now(),
            });
        }
    }

    info!(
        evaluated = summary.outcomes.len(),
        skipped = summary.skipped.len(),
        "Batch complete"
    );
    summary
}
