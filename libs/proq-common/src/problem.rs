//! Problem-file loading
//!
//! Problem files are the JSON export of an authored ProQ: either a single problem
//! object or a unit wrapping several. Raw file shapes stay private to this module;
//! callers only ever see validated `Problem` values.
//!
//! A file that cannot be read or is not JSON fails as a whole. Past that point each
//! problem is validated on its own, so one broken entry does not hide its neighbours.

use crate::types::{CommandLine, ConfigError, ExecutionConfig, Problem, TestCase};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ProblemError {
    #[error("{} is not a valid file", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse problem file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("problem #{index}: {source}")]
    Malformed {
        index: usize,
        title: Option<String>,
        #[source]
        source: serde_json::Error,
    },

    #[error("problem {title:?}: {source}")]
    Invalid {
        title: String,
        #[source]
        source: ConfigError,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProblemFile {
    Unit {
        #[allow(dead_code)]
        unit_name: String,
        problems: Vec<serde_json::Value>,
    },
    Single(serde_json::Value),
}

/// Outcome of loading one problem out of a file
pub type ProblemEntry = Result<Problem, ProblemError>;

impl ProblemError {
    /// Title of the offending problem, when the entry got far enough to have one
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Invalid { title, .. } => Some(title),
            Self::Malformed { title, .. } => title.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawProblem {
    title: String,
    code: RawCode,
    #[serde(default)]
    testcases: RawTestcases,
    local_evaluate: RawLocalEvaluate,
}

#[derive(Debug, Deserialize)]
struct RawCode {
    #[serde(default)]
    prefix: String,
    template: String,
    solution: String,
    #[serde(default)]
    suffix: String,
    #[serde(default)]
    suffix_invisible: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawTestcases {
    #[serde(default)]
    public_testcases: Vec<TestCase>,
    #[serde(default)]
    private_testcases: Vec<TestCase>,
}

#[derive(Debug, Deserialize)]
struct RawLocalEvaluate {
    source_file: String,
    #[serde(default)]
    build: Option<String>,
    run: String,
}

impl RawCode {
    fn assemble(&self, body: &str) -> String {
        [
            self.prefix.as_str(),
            body,
            self.suffix.as_str(),
            self.suffix_invisible.as_str(),
        ]
        .concat()
    }
}

/// Expected outputs are compared against trimmed, CR-free actual output
fn normalize_expected(case: TestCase) -> TestCase {
    TestCase {
        input: case.input,
        expected_output: case.expected_output.trim().replace('\r', ""),
    }
}

impl TryFrom<RawProblem> for Problem {
    type Error = ProblemError;

    fn try_from(raw: RawProblem) -> Result<Self, Self::Error> {
        let invalid = |source| ProblemError::Invalid {
            title: raw.title.clone(),
            source,
        };

        let build = match raw.local_evaluate.build.as_deref() {
            Some(cmd) if !cmd.trim().is_empty() => {
                Some(CommandLine::parse(cmd).map_err(invalid)?)
            }
            _ => None,
        };
        let run = CommandLine::parse(&raw.local_evaluate.run).map_err(invalid)?;
        let config = ExecutionConfig::new(raw.local_evaluate.source_file.clone(), build, run)
            .map_err(invalid)?;

        Ok(Problem {
            solution_code: raw.code.assemble(&raw.code.solution),
            template_code: raw.code.assemble(&raw.code.template),
            public_testcases: raw
                .testcases
                .public_testcases
                .into_iter()
                .map(normalize_expected)
                .collect(),
            private_testcases: raw
                .testcases
                .private_testcases
                .into_iter()
                .map(normalize_expected)
                .collect(),
            title: raw.title,
            config,
        })
    }
}

fn parse_entry(index: usize, value: serde_json::Value) -> ProblemEntry {
    let title = value
        .get("title")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);
    let raw = serde_json::from_value::<RawProblem>(value).map_err(|source| {
        ProblemError::Malformed {
            index,
            title,
            source,
        }
    })?;
    Problem::try_from(raw)
}

/// Parse every problem held in a problem-file's JSON text, one entry per problem
pub fn parse_problems(content: &str) -> Result<Vec<ProblemEntry>, ProblemError> {
    let values = match serde_json::from_str::<ProblemFile>(content)? {
        ProblemFile::Unit { problems, .. } => problems,
        ProblemFile::Single(problem) => vec![problem],
    };

    Ok(values
        .into_iter()
        .enumerate()
        .map(|(i, value)| parse_entry(i + 1, value))
        .collect())
}

/// Load all problems from a file on disk
pub fn load_problems(path: &Path) -> Result<Vec<ProblemEntry>, ProblemError> {
    if !path.is_file() {
        return Err(ProblemError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let content = fs::read_to_string(path).map_err(|source| ProblemError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    parse_problems(&content)
}
