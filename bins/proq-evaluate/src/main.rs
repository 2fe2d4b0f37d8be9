mod batch;
mod engine;
mod error;
mod evaluator;
mod executor;
mod report;
mod runner;
mod workspace;

#[cfg(test)]
mod test_support;

use clap::builder::FalseyValueParser;
use clap::Parser;
use engine::{ProcessEngine, TimeoutEngine};
use proq_common::config::EvaluatorConfig;
use report::ConsoleReporter;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "proq-evaluate")]
#[command(about = "Verify ProQ problems before publishing: the solution must pass every test case and the template none", long_about = None)]
struct Cli {
    /// Problem files to evaluate
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,

    /// Kill any build or run step that takes longer than this many seconds
    #[arg(long, env = "PROQ_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Only print file headers, verdicts and errors
    #[arg(short, long, env = "PROQ_QUIET", value_parser = FalseyValueParser::new())]
    quiet: bool,

    /// Exit nonzero unless every problem is publishable
    #[arg(long, env = "PROQ_STRICT", value_parser = FalseyValueParser::new())]
    strict: bool,

    /// Print one JSON record per problem instead of the console report
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the report
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_line_number(true)
        .init();

    let cli = Cli::parse();
    let config = EvaluatorConfig::new()
        .with_timeout_seconds(cli.timeout_secs)
        .with_verbose(!cli.quiet)
        .with_strict(cli.strict)
        .with_json(cli.json);

    info!(
        files = cli.files.len(),
        timeout_seconds = ?config.timeout_seconds,
        strict = config.strict,
        "proq-evaluate starting"
    );

    let engine = TimeoutEngine::new(ProcessEngine::new(), config.timeout());
    let summary = if config.json {
        batch::evaluate_all(&cli.files, &engine, &report::SilentReporter).await
    } else {
        let reporter = ConsoleReporter::stdout(config.verbose);
        batch::evaluate_all(&cli.files, &engine, &reporter).await
    };

    if config.json {
        for record in summary.records() {
            println!("{}", serde_json::to_string(&record)?);
        }
    }

    if config.strict && !summary.all_publishable() {
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_env_vars_accept_numeric_values() {
        std::env::set_var("PROQ_QUIET", "1");
        std::env::set_var("PROQ_STRICT", "0");
        let cli = Cli::try_parse_from(["proq-evaluate", "unit.json"]);
        std::env::remove_var("PROQ_QUIET");
        std::env::remove_var("PROQ_STRICT");

        let cli = cli.unwrap();
        assert!(cli.quiet);
        assert!(!cli.strict);
        assert_eq!(cli.files, [PathBuf::from("unit.json")]);
    }

    #[test]
    fn test_files_are_required() {
        assert!(Cli::try_parse_from(["proq-evaluate"]).is_err());
    }
}
