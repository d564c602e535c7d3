//! Purpose: `cardcheck` CLI entry point and batch driver.
//! Role: Binary crate root; parses args, checks each file, derives the exit code.
//! Invariants: Spike diagnostics and the batch success line go to stdout.
//! Invariants: Usage, I/O, and per-file failure diagnostics go to stderr.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`,
//! with `ACCEPTANCE_FAILED_EXIT_CODE` reserved for failed verdicts.
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, ValueHint, error::ErrorKind as ClapErrorKind};
use clap_complete::aot::Shell;
use serde_json::json;
use tracing_subscriber::EnvFilter;

mod report_json;

use cardcheck::api::{
    ACCEPTANCE_FAILED_EXIT_CODE, AcceptancePolicy, Error, ErrorKind, FileReport, check_file,
    to_exit_code,
};
use report_json::report_json;

const USAGE_HINT: &str = "Usage: cardcheck [OPTIONS] <FILE>...";

#[derive(Parser)]
#[command(
    name = "cardcheck",
    version,
    about = "Check cardinality estimator results against an error acceptance envelope",
    long_about = None,
    after_help = r#"EXAMPLES
  $ cardcheck results.csv
  $ cardcheck --mean-error 0.02 run1.csv run2.csv
  $ cardcheck --json results.csv | jq .passed

Each file is CSV with a header line followed by rows of
`id,estimated_count,true_count`. A file passes when the mean relative
estimation error across its rows stays within the acceptance threshold."#
)]
struct Cli {
    #[arg(
        help = "Result files to check, in order",
        value_hint = ValueHint::FilePath,
        required_unless_present = "completion"
    )]
    files: Vec<PathBuf>,

    #[arg(
        long,
        default_value_t = 0.015,
        help = "Acceptable mean relative error per file"
    )]
    mean_error: f64,

    #[arg(
        long,
        default_value_t = 0.05,
        help = "Per-row relative error above which a spike diagnostic is emitted"
    )]
    spike: f64,

    #[arg(
        long,
        default_value_t = 50,
        help = "Minimum true count (exclusive) for spike diagnostics"
    )]
    spike_min_true: u64,

    #[arg(long, help = "Emit one JSON verdict object per file on stdout")]
    json: bool,

    #[arg(long, value_enum, help = "Generate shell completions and exit")]
    completion: Option<Shell>,
}

fn main() {
    let exit_code = match run() {
        Ok(code) => code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<i32, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                return Ok(0);
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint(USAGE_HINT));
            }
        },
    };

    init_tracing();

    if let Some(shell) = cli.completion {
        let mut command = Cli::command();
        clap_complete::aot::generate(shell, &mut command, "cardcheck", &mut io::stdout());
        return Ok(0);
    }

    let policy = AcceptancePolicy {
        acceptable_mean_error: cli.mean_error,
        acceptable_spike: cli.spike,
        spike_min_true_count: cli.spike_min_true,
    };

    let mut any_failed = false;
    let mut any_io_error = false;

    for path in &cli.files {
        match check_file(path, &policy) {
            Ok(report) => {
                if cli.json {
                    println!("{}", report_json(path, &report));
                } else {
                    emit_spikes(path, &report, &policy);
                }
                if !report.passed {
                    any_failed = true;
                    emit_failure(path, &report, &policy);
                }
            }
            Err(err) => {
                // Keep scanning the remaining files; the exit code still
                // reports the read failure.
                any_io_error = true;
                emit_error(&err);
            }
        }
    }

    if any_io_error {
        return Ok(to_exit_code(ErrorKind::Io));
    }
    if any_failed {
        return Ok(ACCEPTANCE_FAILED_EXIT_CODE);
    }
    if !cli.json {
        println!(
            "estimation error within acceptance bounds for {} file(s)",
            cli.files.len()
        );
    }
    Ok(0)
}

fn emit_spikes(path: &Path, report: &FileReport, policy: &AcceptancePolicy) {
    for spike in &report.spikes {
        println!(
            "{}: id {}: relative error {:.6} exceeds spike threshold {:.6} (true {} vs estimated {})",
            path.display(),
            spike.id,
            spike.relative_error,
            policy.acceptable_spike,
            spike.true_count,
            spike.estimated_count
        );
    }
}

fn emit_failure(path: &Path, report: &FileReport, policy: &AcceptancePolicy) {
    match report.mean_error {
        Some(mean_error) => eprintln!(
            "{}: mean error {:.6} exceeds acceptance threshold {:.6}",
            path.display(),
            mean_error,
            policy.acceptable_mean_error
        ),
        None => eprintln!(
            "{}: no parseable rows ({} malformed, {} with zero true count); mean error is undefined",
            path.display(),
            report.malformed_rows,
            report.zero_true_rows
        ),
    }
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        let mut text = err.to_string();
        if let Some(hint) = err.hint() {
            text.push_str(&format!("\n  hint: {hint}"));
        }
        eprintln!("{text}");
        return;
    }

    let value = json!({
        "error": {
            "kind": format!("{:?}", err.kind()),
            "message": err.message(),
            "path": err.path().map(|path| path.display().to_string()),
            "hint": err.hint(),
        }
    });
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn clap_error_summary(err: &clap::Error) -> String {
    if matches!(err.kind(), ClapErrorKind::MissingRequiredArgument) {
        return "list of result files is missing".to_string();
    }
    err.to_string()
        .lines()
        .next()
        .unwrap_or("invalid arguments")
        .trim_start_matches("error: ")
        .to_string()
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}
