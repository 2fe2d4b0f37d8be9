// Evaluator configuration shared by the CLI and the batch driver

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatorConfig {
    /// Per-invocation deadline; `None` waits for the child indefinitely
    pub timeout_seconds: Option<u64>,
    pub verbose: bool,
    /// Fail the process if any problem is not publishable
    pub strict: bool,
    /// Emit one JSON record per evaluated problem
    pub json: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: None,
            verbose: true,
            strict: false,
            json: false,
        }
    }
}

impl EvaluatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout_seconds(mut self, seconds: Option<u64>) -> Self {
        // a zero deadline would fail every invocation; treat it as unset
        self.timeout_seconds = seconds.filter(|s| *s > 0);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}
