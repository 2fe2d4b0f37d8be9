//! Problem Evaluator - Dual-Run Verification
//!
//! **Responsibility:**
//! Prove a problem is well-formed before it is published:
//! 1. The reference solution builds and passes every public and private case
//! 2. The unmodified template cannot pass any case (or does not even build)
//!
//! **State machine (strictly linear, early exit only on failure):**
//! MaterializeSolution → BuildSolution → TestSolution →
//! MaterializeTemplate → BuildTemplate → TestTemplate
//!
//! | Outcome                                  | solution_ok | template_ok |
//! |------------------------------------------|-------------|-------------|
//! | solution build fails                     | false       | false       |
//! | solution fails any case                  | false       | false       |
//! | template build fails                     | true        | true        |
//! | template passes no case                  | true        | true        |
//! | template passes at least one case        | true        | false       |
//!
//! This module is the glue layer - it knows nothing about:
//! - How commands execute (engine's job)
//! - How outputs are compared (evaluator's job)

use crate::engine::{CapturePolicy, ExecutionEngine};
use crate::error::{EvaluationError, InvokeError};
use crate::report::Reporter;
use crate::runner::{self, BatteryRunner};
use crate::workspace::materialize;
use proq_common::types::{Battery, EvaluationVerdict, ExecutionConfig, Problem, Variant};
use std::path::Path;
use std::time::Instant;
use tracing::{info, instrument, warn};

enum BuildOutcome {
    Skipped,
    Succeeded,
    Failed(String),
}

/// Run the configured build command, if any, in `working_dir`
///
/// A build that exits nonzero or times out is a failed build, not an error.
async fn build<E: ExecutionEngine + ?Sized>(
    engine: &E,
    working_dir: &Path,
    config: &ExecutionConfig,
    variant: Variant,
) -> Result<BuildOutcome, InvokeError> {
    let Some(command) = &config.build else {
        return Ok(BuildOutcome::Skipped);
    };

    let start = Instant::now();
    let outcome = match engine
        .invoke(working_dir, command, "", CapturePolicy::Separate)
        .await
    {
        Ok(result) if result.success => BuildOutcome::Succeeded,
        Ok(result) => BuildOutcome::Failed(result.output),
        Err(e) if e.is_timeout() => BuildOutcome::Failed(format!("[Build timed out: {e}]")),
        Err(e) => return Err(e),
    };

    let build_ms = start.elapsed().as_millis() as u64;
    match &outcome {
        BuildOutcome::Failed(output) => warn!(
            variant = %variant,
            build_ms,
            error_preview = output.lines().next().unwrap_or(""),
            "Build failed"
        ),
        _ => info!(variant = %variant, build_ms, "Build succeeded"),
    }

    Ok(outcome)
}

/// Run the public battery then the private battery for one variant
///
/// Returns the number of passed cases per battery, plus whether every case passed.
async fn test_variant<E, R>(
    engine: &E,
    working_dir: &Path,
    problem: &Problem,
    variant: Variant,
    reporter: &R,
) -> Result<(usize, usize, bool), InvokeError>
where
    E: ExecutionEngine + ?Sized,
    R: Reporter + ?Sized,
{
    let battery_runner = BatteryRunner::new(engine, working_dir);
    let mut passed = [0usize; 2];
    let mut all = true;

    for (slot, battery) in Battery::ALL.into_iter().enumerate() {
        reporter.battery_started(variant, battery);
        let cases = problem.testcases(battery);
        let outcomes = battery_runner
            .run(&problem.config.run, cases, CapturePolicy::Merged)
            .await?;

        for (case, outcome) in cases.iter().zip(&outcomes) {
            reporter.case_result(variant, battery, case, outcome);
        }

        passed[slot] = runner::passed_count(&outcomes);
        all &= runner::all_passed(&outcomes);
    }

    Ok((passed[0], passed[1], all))
}

/// Evaluate a single problem inside `working_dir`
///
/// Build failures and failing cases fold into the verdict. Only an invocation
/// failure or an unwritable source file is returned as an error.
#[instrument(skip_all, fields(title = %problem.title))]
pub async fn evaluate_problem<E, R>(
    problem: &Problem,
    engine: &E,
    working_dir: &Path,
    reporter: &R,
) -> Result<EvaluationVerdict, EvaluationError>
where
    E: ExecutionEngine + ?Sized,
    R: Reporter + ?Sized,
{
    reporter.problem_started(&problem.title);
    if problem.total_testcases() == 0 {
        warn!("Problem has no test cases; the template check cannot detect leaks");
    }

    let source_path = working_dir.join(&problem.config.source_file);

    // Solution: must build and pass everything
    materialize(problem.source_for(Variant::Solution), &source_path).await?;
    if let BuildOutcome::Failed(output) =
        build(engine, working_dir, &problem.config, Variant::Solution).await?
    {
        reporter.build_failed(Variant::Solution, &output);
        return Ok(conclude(problem, reporter, EvaluationVerdict::UNUSABLE));
    }

    let (_, _, solution_passed) =
        test_variant(engine, working_dir, problem, Variant::Solution, reporter).await?;
    if !solution_passed {
        return Ok(conclude(problem, reporter, EvaluationVerdict::UNUSABLE));
    }

    // Template: must not build, or must pass nothing
    materialize(problem.source_for(Variant::Template), &source_path).await?;
    if let BuildOutcome::Failed(output) =
        build(engine, working_dir, &problem.config, Variant::Template).await?
    {
        reporter.build_failed(Variant::Template, &output);
        return Ok(conclude(problem, reporter, EvaluationVerdict::PUBLISHABLE));
    }

    let (public_passed, private_passed, _) =
        test_variant(engine, working_dir, problem, Variant::Template, reporter).await?;
    reporter.template_summary(public_passed, private_passed);

    let template_passed_any = public_passed + private_passed > 0;
    let verdict = EvaluationVerdict {
        solution_ok: true,
        template_ok: !template_passed_any,
    };

    Ok(conclude(problem, reporter, verdict))
}

fn conclude<R: Reporter + ?Sized>(
    problem: &Problem,
    reporter: &R,
    verdict: EvaluationVerdict,
) -> EvaluationVerdict {
    info!(
        solution_ok = verdict.solution_ok,
        template_ok = verdict.template_ok,
        "Evaluation complete"
    );
    reporter.verdict(&problem.title, &verdict);
    verdict
}
