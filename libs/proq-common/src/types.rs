use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

/// Rejections raised while turning authored strings into an `ExecutionConfig`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("command is empty")]
    EmptyCommand,

    #[error("argument {token:?} contains whitespace; commands are split on whitespace without a shell")]
    EmbeddedWhitespace { token: String },

    #[error("argument {token:?} opens a quote that spans whitespace; quoting is not supported by the command tokenizer")]
    QuotedArgument { token: String },

    #[error("source file {path:?} must be a relative path inside the working directory")]
    InvalidSourceFile { path: String },
}

/// A command as an explicit argument vector
///
/// Commands are whitespace-tokenized exactly once, here. There is no shell and no
/// quoting: quote characters inside a token are passed through literally, but a
/// quote left open across whitespace is rejected instead of being split apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommandLine {
    tokens: Vec<String>,
}

impl CommandLine {
    /// Split a raw command string on whitespace
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        if let Some(token) = quote_spanning_whitespace(raw) {
            return Err(ConfigError::QuotedArgument { token });
        }
        Self::from_tokens(raw.split_whitespace())
    }

    /// Build from pre-split tokens; a token with embedded whitespace cannot be
    /// represented faithfully and is refused
    pub fn from_tokens<I, S>(tokens: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        if tokens.is_empty() {
            return Err(ConfigError::EmptyCommand);
        }

        for token in &tokens {
            if token.is_empty() || token.chars().any(char::is_whitespace) {
                return Err(ConfigError::EmbeddedWhitespace {
                    token: token.clone(),
                });
            }
        }

        Ok(Self { tokens })
    }

    pub fn program(&self) -> &str {
        &self.tokens[0]
    }

    pub fn args(&self) -> &[String] {
        &self.tokens[1..]
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

/// The token in which a quote opens and is still open at the next whitespace
fn quote_spanning_whitespace(raw: &str) -> Option<String> {
    let mut open: Option<(char, usize)> = None;
    let mut token_start = 0;

    for (i, c) in raw.char_indices() {
        match open {
            Some((_, start)) if c.is_whitespace() => {
                return Some(raw[start..i].to_string());
            }
            Some((quote, _)) if c == quote => open = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => open = Some((c, token_start)),
            None if c.is_whitespace() => token_start = i + c.len_utf8(),
            None => {}
        }
    }
    None
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.join(" "))
    }
}

impl FromStr for CommandLine {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CommandLine {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CommandLine> for String {
    fn from(value: CommandLine) -> Self {
        value.to_string()
    }
}

/// How a problem's source is built and run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub source_file: String,
    /// `None` means there is no build step (interpreted languages)
    pub build: Option<CommandLine>,
    pub run: CommandLine,
}

impl ExecutionConfig {
    pub fn new(
        source_file: impl Into<String>,
        build: Option<CommandLine>,
        run: CommandLine,
    ) -> Result<Self, ConfigError> {
        let source_file = source_file.into();
        if !is_contained_relative(Path::new(&source_file)) {
            return Err(ConfigError::InvalidSourceFile { path: source_file });
        }

        Ok(Self {
            source_file,
            build,
            run,
        })
    }
}

/// True for a non-empty relative path with no `..`, root or prefix components
fn is_contained_relative(path: &Path) -> bool {
    let mut saw_normal = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => saw_normal = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    saw_normal
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    #[serde(rename = "output")]
    pub expected_output: String,
}

impl TestCase {
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
        }
    }
}

/// A single programming exercise, ready for evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub title: String,
    pub config: ExecutionConfig,
    pub solution_code: String,
    pub template_code: String,
    pub public_testcases: Vec<TestCase>,
    pub private_testcases: Vec<TestCase>,
}

impl Problem {
    pub fn source_for(&self, variant: Variant) -> &str {
        match variant {
            Variant::Solution => &self.solution_code,
            Variant::Template => &self.template_code,
        }
    }

    pub fn testcases(&self, battery: Battery) -> &[TestCase] {
        match battery {
            Battery::Public => &self.public_testcases,
            Battery::Private => &self.private_testcases,
        }
    }

    pub fn total_testcases(&self) -> usize {
        self.public_testcases.len() + self.private_testcases.len()
    }
}

/// Which source variant of a problem is being exercised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Solution,
    Template,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Solution => write!(f, "solution"),
            Variant::Template => write!(f, "template"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Battery {
    Public,
    Private,
}

impl Battery {
    pub const ALL: [Battery; 2] = [Battery::Public, Battery::Private];
}

impl fmt::Display for Battery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Battery::Public => write!(f, "public"),
            Battery::Private => write!(f, "private"),
        }
    }
}

/// Outcome of one process invocation
///
/// The composition of `output` depends on the capture policy the caller chose;
/// see the engine's `CapturePolicy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
}

/// The two publish-gating flags produced once per problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationVerdict {
    /// Reference solution builds and passes every test case
    pub solution_ok: bool,
    /// Unmodified template either fails to build or passes no test case
    pub template_ok: bool,
}

impl EvaluationVerdict {
    /// The reference solution is broken; nothing else about the problem matters
    pub const UNUSABLE: Self = Self {
        solution_ok: false,
        template_ok: false,
    };

    /// Solution verified and the template cannot leak a working answer
    pub const PUBLISHABLE: Self = Self {
        solution_ok: true,
        template_ok: true,
    };

    /// Solution verified but the template already passes at least one case
    pub const TEMPLATE_LEAKS: Self = Self {
        solution_ok: true,
        template_ok: false,
    };

    pub fn is_publishable(&self) -> bool {
        self.solution_ok && self.template_ok
    }
}
