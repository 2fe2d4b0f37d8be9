// Human-facing progress reporting for evaluation runs

use crate::runner::CaseOutcome;
use proq_common::types::{Battery, EvaluationVerdict, TestCase, Variant};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

/// Sink for evaluation progress; every hook defaults to doing nothing
pub trait Reporter: Send + Sync {
    fn file_started(&self, _path: &Path) {}

    fn file_skipped(&self, _path: &Path, _reason: &str) {}

    fn problem_started(&self, _title: &str) {}

    fn build_failed(&self, _variant: Variant, _output: &str) {}

    fn battery_started(&self, _variant: Variant, _battery: Battery) {}

    fn case_result(
        &self,
        _variant: Variant,
        _battery: Battery,
        _case: &TestCase,
        _outcome: &CaseOutcome,
    ) {
    }

    fn template_summary(&self, _public_passed: usize, _private_passed: usize) {}

    fn verdict(&self, _title: &str, _verdict: &EvaluationVerdict) {}

    fn problem_failed(&self, _title: &str, _error: &str) {}
}

pub struct SilentReporter;

impl Reporter for SilentReporter {}

/// Plain-text reporter
///
/// Quiet mode keeps file headers, verdicts and errors. Verbose mode adds
/// titles, build output and per-case detail for the solution batteries; the
/// template batteries are only ever summarized.
pub struct ConsoleReporter<W> {
    out: Mutex<W>,
    verbose: bool,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout(verbose: bool) -> Self {
        Self::new(io::stdout(), verbose)
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W, verbose: bool) -> Self {
        Self {
            out: Mutex::new(out),
            verbose,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn emit(&self, text: &str) {
        if let Ok(mut out) = self.out.lock() {
            // a closed stdout must not abort the batch
            let _ = writeln!(out, "{text}");
        }
    }
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "✓ Passed"
    } else {
        "✗ Failed"
    }
}

impl<W: Write + Send> Reporter for ConsoleReporter<W> {
    fn file_started(&self, path: &Path) {
        self.emit(&format!("→ Evaluating file {}", path.display()));
    }

    fn file_skipped(&self, _path: &Path, reason: &str) {
        self.emit(&format!("✗ {reason}"));
    }

    fn problem_started(&self, title: &str) {
        if self.verbose {
            self.emit(&format!("Title: {title}"));
        }
    }

    fn build_failed(&self, variant: Variant, output: &str) {
        if !self.verbose {
            return;
        }
        match variant {
            Variant::Solution => {
                self.emit("  ✗ Build Failed");
                self.emit(output.trim_end());
            }
            Variant::Template => self.emit("  Template: ✓ Build Failed"),
        }
    }

    fn battery_started(&self, variant: Variant, battery: Battery) {
        if self.verbose && variant == Variant::Solution {
            match battery {
                Battery::Public => self.emit("  Public Testcases"),
                Battery::Private => self.emit("  Private Testcases"),
            }
        }
    }

    fn case_result(
        &self,
        variant: Variant,
        _battery: Battery,
        case: &TestCase,
        outcome: &CaseOutcome,
    ) {
        if !self.verbose || variant != Variant::Solution {
            return;
        }
        if outcome.passed {
            self.emit(&format!("    Test case {}: Passed", outcome.number));
        } else {
            self.emit(&format!("    Test case {}: Failed", outcome.number));
            self.emit(&format!(
                "Input:\n{}\nExpected output:\n{}\nActual output:\n{}",
                case.input, case.expected_output, outcome.actual
            ));
        }
    }

    fn template_summary(&self, public_passed: usize, private_passed: usize) {
        if !self.verbose {
            return;
        }
        let safe = public_passed + private_passed == 0;
        self.emit(&format!("  Template Check: {}", mark(safe)));
        if !safe {
            self.emit(&format!("    Public Testcases: {public_passed} Passed"));
            self.emit(&format!("    Private Testcases: {private_passed} Passed"));
        }
    }

    fn verdict(&self, title: &str, verdict: &EvaluationVerdict) {
        self.emit(&format!(
            "  {title}: solution {} | template {}",
            mark(verdict.solution_ok),
            mark(verdict.template_ok)
        ));
    }

    fn problem_failed(&self, title: &str, error: &str) {
        self.emit(&format!("  ✗ {title}: evaluation error: {error}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(number: usize, passed: bool, actual: &str) -> CaseOutcome {
        CaseOutcome {
            number,
            passed,
            actual: actual.to_string(),
        }
    }

    fn render(verbose: bool, f: impl FnOnce(&ConsoleReporter<Vec<u8>>)) -> String {
        let reporter = ConsoleReporter::new(Vec::new(), verbose);
        f(&reporter);
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn test_verbose_failure_shows_diagnostics() {
        let case = TestCase::new("2 3", "5");
        let text = render(true, |r| {
            r.battery_started(Variant::Solution, Battery::Public);
            r.case_result(Variant::Solution, Battery::Public, &case, &outcome(1, false, "6"));
        });

        assert!(text.contains("Public Testcases"));
        assert!(text.contains("Test case 1: Failed"));
        assert!(text.contains("Input:\n2 3\nExpected output:\n5\nActual output:\n6"));
    }

    #[test]
    fn test_template_cases_are_not_itemized() {
        let case = TestCase::new("1", "1");
        let text = render(true, |r| {
            r.battery_started(Variant::Template, Battery::Public);
            r.case_result(Variant::Template, Battery::Public, &case, &outcome(1, true, "1"));
            r.template_summary(1, 0);
        });

        assert!(!text.contains("Test case"));
        assert!(text.contains("Template Check: ✗ Failed"));
        assert!(text.contains("Public Testcases: 1 Passed"));
        assert!(text.contains("Private Testcases: 0 Passed"));
    }

    #[test]
    fn test_quiet_mode_keeps_verdicts_and_errors() {
        let text = render(false, |r| {
            r.problem_started("Sum");
            r.build_failed(Variant::Solution, "main.c:1: error");
            r.verdict("Sum", &EvaluationVerdict::UNUSABLE);
            r.problem_failed("Other", "executable not found: gcc");
        });

        assert!(!text.contains("Title:"));
        assert!(!text.contains("main.c:1"));
        assert!(text.contains("Sum: solution ✗ Failed | template ✗ Failed"));
        assert!(text.contains("executable not found: gcc"));
    }

    #[test]
    fn test_build_output_reported_for_solution() {
        let text = render(true, |r| r.build_failed(Variant::Solution, "error: expected ';'\n"));
        assert!(text.contains("Build Failed"));
        assert!(text.contains("error: expected ';'"));
    }
}
