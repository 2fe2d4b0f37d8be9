// Test battery orchestration: one run invocation per test case, compared in order

use crate::engine::{CapturePolicy, ExecutionEngine};
use crate::error::InvokeError;
use crate::evaluator;
use proq_common::types::{CommandLine, TestCase};
use std::path::Path;
use tracing::debug;

const TIMED_OUT_OUTPUT: &str = "[Execution timed out]";

/// Result of one test case within a battery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseOutcome {
    /// 1-based position in the battery
    pub number: usize,
    pub passed: bool,
    /// Normalized actual output, as it was compared
    pub actual: String,
}

pub struct BatteryRunner<'a, E: ?Sized> {
    engine: &'a E,
    working_dir: &'a Path,
}

impl<'a, E: ExecutionEngine + ?Sized> BatteryRunner<'a, E> {
    pub fn new(engine: &'a E, working_dir: &'a Path) -> Self {
        Self {
            engine,
            working_dir,
        }
    }

    /// Run every case and return one outcome per case, in input order
    ///
    /// A failing or timed-out case never stops the battery. An invocation
    /// failure (missing interpreter, spawn error) does, since no later case
    /// could run either.
    pub async fn run(
        &self,
        command: &CommandLine,
        testcases: &[TestCase],
        policy: CapturePolicy,
    ) -> Result<Vec<CaseOutcome>, InvokeError> {
        let mut outcomes = Vec::with_capacity(testcases.len());

        for (idx, case) in testcases.iter().enumerate() {
            let (passed, actual) = match self
                .engine
                .invoke(self.working_dir, command, &case.input, policy)
                .await
            {
                Ok(result) => (
                    evaluator::matches(&result.output, &case.expected_output),
                    evaluator::normalize_actual(&result.output),
                ),
                Err(e) if e.is_timeout() => (false, TIMED_OUT_OUTPUT.to_string()),
                Err(e) => return Err(e),
            };

            debug!(test_num = idx + 1, passed, "Test case compared");

            outcomes.push(CaseOutcome {
                number: idx + 1,
                passed,
                actual,
            });
        }

        Ok(outcomes)
    }
}

pub fn all_passed(outcomes: &[CaseOutcome]) -> bool {
    outcomes.iter().all(|o| o.passed)
}

pub fn passed_count(outcomes: &[CaseOutcome]) -> usize {
    outcomes.iter().filter(|o| o.passed).count()
}
