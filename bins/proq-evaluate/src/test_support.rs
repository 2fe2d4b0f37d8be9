// In-memory engine for exercising the evaluation pipeline without real toolchains
//
// Commands are `<program> <source-file>`. The program decides what happens:
// - `check`: build step; fails when the source contains `syntax-error`
// - `interp`: run step; behaviour picked by the trimmed source text
// - anything else: the executable is "not found"
//
// `interp` sources:
// - `echo`          print stdin back
// - `silent`        print nothing
// - `const:<text>`  print <text>
// - `echo-when:<v>` print stdin only when it equals <v>
// - `crash`         print a traceback and exit nonzero
// - `hang`          never finish (reported as a timeout)

use crate::engine::{CapturePolicy, ExecutionEngine};
use crate::error::InvokeError;
use async_trait::async_trait;
use proq_common::types::{CommandLine, ExecutionConfig, ExecutionResult, Problem, TestCase};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Call {
    pub working_dir: PathBuf,
    pub program: String,
    pub stdin: String,
    pub policy: CapturePolicy,
}

#[derive(Default)]
pub struct ScriptedEngine {
    calls: Mutex<Vec<Call>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, program: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.program == program)
            .collect()
    }
}

#[async_trait]
impl ExecutionEngine for ScriptedEngine {
    async fn invoke(
        &self,
        working_dir: &Path,
        command: &CommandLine,
        stdin: &str,
        policy: CapturePolicy,
    ) -> Result<ExecutionResult, InvokeError> {
        self.calls.lock().unwrap().push(Call {
            working_dir: working_dir.to_path_buf(),
            program: command.program().to_string(),
            stdin: stdin.to_string(),
            policy,
        });

        let source = || {
            let file = command.args().first().cloned().unwrap_or_default();
            fs::read_to_string(working_dir.join(file))
                .unwrap_or_default()
                .trim()
                .to_string()
        };

        match command.program() {
            "check" => {
                let ok = !source().contains("syntax-error");
                Ok(ExecutionResult {
                    success: ok,
                    output: if ok { String::new() } else { "error: syntax-error\n".to_string() },
                })
            }
            "interp" => {
                let source = source();
                let output = if source == "echo" {
                    stdin.to_string()
                } else if source == "silent" {
                    String::new()
                } else if let Some(text) = source.strip_prefix("const:") {
                    format!("{text}\n")
                } else if let Some(v) = source.strip_prefix("echo-when:") {
                    if stdin == v { stdin.to_string() } else { String::new() }
                } else if source == "crash" {
                    return Ok(ExecutionResult {
                        success: false,
                        output: "Traceback (most recent call last):\nRuntimeError\n".to_string(),
                    });
                } else if source == "hang" {
                    return Err(InvokeError::TimedOut {
                        program: "interp".to_string(),
                        after: Duration::from_secs(1),
                    });
                } else {
                    String::new()
                };
                Ok(ExecutionResult {
                    success: true,
                    output,
                })
            }
            other => Err(InvokeError::NotFound {
                program: other.to_string(),
            }),
        }
    }
}

pub fn case(input: &str, output: &str) -> TestCase {
    TestCase::new(input, output)
}

/// A problem run through `check`/`interp` with the given sources and cases
pub fn scripted_problem(
    solution: &str,
    template: &str,
    with_build: bool,
    public: Vec<TestCase>,
    private: Vec<TestCase>,
) -> Problem {
    let build = with_build.then(|| CommandLine::parse("check main.src").unwrap());
    Problem {
        title: "Scripted".to_string(),
        config: ExecutionConfig::new(
            "main.src",
            build,
            CommandLine::parse("interp main.src").unwrap(),
        )
        .unwrap(),
        solution_code: solution.to_string(),
        template_code: template.to_string(),
        public_testcases: public,
        private_testcases: private,
    }
}
