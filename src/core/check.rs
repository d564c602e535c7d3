//! Purpose: Acceptance checking for one estimator result file.
//! Exports: `AcceptancePolicy`, `Spike`, `FileReport`, `check_file`, `check_reader`.
//! Role: The core algorithm; the CLI only formats what this module reports.
//! Invariants: Rows are scanned once, in file order; spikes keep that order.
//! Invariants: Mean error over zero rows is `None`, never zero, and fails the file.
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::core::error::{Error, ErrorKind};
use crate::core::row::{RowOutcome, parse_record};

/// Thresholds for the two-tier acceptance envelope. Overridable so the
/// policy can be exercised against multiple regimes without code changes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AcceptancePolicy {
    /// A file fails when its mean relative error exceeds this (strictly).
    pub acceptable_mean_error: f64,
    /// A row is flagged when its relative error exceeds this (strictly).
    pub acceptable_spike: f64,
    /// Spikes are only flagged for rows whose true count exceeds this
    /// (strictly); relative error on tiny counts is noise, not signal.
    pub spike_min_true_count: u64,
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self {
            acceptable_mean_error: 0.015,
            acceptable_spike: 0.05,
            spike_min_true_count: 50,
        }
    }
}

/// One flagged row. Informational only; a spike never fails a file by itself.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Spike {
    pub id: i64,
    pub relative_error: f64,
    pub estimated_count: u64,
    pub true_count: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FileReport {
    /// `None` when no row parsed; the mean is undefined there and the
    /// file fails rather than pretending the error was zero.
    pub mean_error: Option<f64>,
    pub passed: bool,
    pub spikes: Vec<Spike>,
    pub parsed_rows: usize,
    pub malformed_rows: usize,
    pub zero_true_rows: usize,
}

pub fn check_file(path: &Path, policy: &AcceptancePolicy) -> Result<FileReport, Error> {
    let file = File::open(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("cannot open result file")
            .with_path(path)
            .with_source(err)
    })?;
    // Errors from the scan carry no path; attach it here where it is known.
    check_reader(file, policy).map_err(|err| err.with_path(path))
}

/// Scan one result stream and apply the acceptance policy.
///
/// The first line is always discarded as the header, whatever it contains.
/// Each data record must hold exactly three integers (id, estimated count,
/// true count); anything else is skipped and tallied, never fatal.
pub fn check_reader<R: Read>(reader: R, policy: &AcceptancePolicy) -> Result<FileReport, Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut errors = Vec::new();
    let mut spikes = Vec::new();
    let mut malformed_rows = 0usize;
    let mut zero_true_rows = 0usize;

    for result in csv_reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(err) if err.is_io_error() => {
                return Err(Error::new(ErrorKind::Io)
                    .with_message("read failed while scanning rows")
                    .with_source(err));
            }
            Err(err) => {
                debug!(error = %err, "unreadable record skipped");
                malformed_rows += 1;
                continue;
            }
        };

        match parse_record(&record) {
            RowOutcome::Parsed(row) => {
                let relative_error = row.relative_error();
                if relative_error > policy.acceptable_spike
                    && row.true_count > policy.spike_min_true_count
                {
                    spikes.push(Spike {
                        id: row.id,
                        relative_error,
                        estimated_count: row.estimated_count,
                        true_count: row.true_count,
                    });
                }
                errors.push(relative_error);
            }
            RowOutcome::Malformed => {
                debug!(record = ?record, "malformed row skipped");
                malformed_rows += 1;
            }
            RowOutcome::ZeroTrueCount { id } => {
                debug!(id, "zero true count row skipped");
                zero_true_rows += 1;
            }
        }
    }

    let mean_error = mean(&errors);
    let passed = match mean_error {
        Some(mean_error) => mean_error <= policy.acceptable_mean_error,
        None => false,
    };
    debug!(
        parsed = errors.len(),
        malformed = malformed_rows,
        zero_true = zero_true_rows,
        spikes = spikes.len(),
        mean_error,
        passed,
        "file scan complete"
    );

    Ok(FileReport {
        mean_error,
        passed,
        spikes,
        parsed_rows: errors.len(),
        malformed_rows,
        zero_true_rows,
    })
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::{AcceptancePolicy, check_reader};

    fn check(input: &str) -> super::FileReport {
        check_reader(input.as_bytes(), &AcceptancePolicy::default()).expect("scan")
    }

    #[test]
    fn mean_at_threshold_passes() {
        // 15 / 1000 is exactly the default acceptance threshold.
        let report = check("id,estimated,true\n1,1015,1000\n");
        assert_eq!(report.mean_error, Some(0.015));
        assert!(report.passed);
    }

    #[test]
    fn mean_above_threshold_fails() {
        let report = check("id,estimated,true\n1,1016,1000\n");
        assert_eq!(report.mean_error, Some(0.016));
        assert!(!report.passed);
    }

    #[test]
    fn spike_gate_requires_true_count_strictly_above_minimum() {
        // 20% error on a true count of exactly 50: below the gate, no spike.
        let at_gate = check("id,estimated,true\n1,60,50\n");
        assert!(at_gate.spikes.is_empty());

        // Same error shape one count above the gate: flagged.
        let above_gate = check("id,estimated,true\n1,61,51\n");
        assert_eq!(above_gate.spikes.len(), 1);
        assert_eq!(above_gate.spikes[0].id, 1);
        assert_eq!(above_gate.spikes[0].true_count, 51);
    }

    #[test]
    fn spike_does_not_fail_the_file_by_itself() {
        // One spiking row among many exact rows keeps the mean acceptable.
        let mut input = String::from("id,estimated,true\n1,80,60\n");
        for id in 2..=100 {
            input.push_str(&format!("{id},1000,1000\n"));
        }
        let report = check(&input);
        assert_eq!(report.spikes.len(), 1);
        assert!(report.passed);
    }

    #[test]
    fn malformed_rows_contribute_nothing() {
        let report = check("id,estimated,true\n1,100,100\nnot,a,number\n2,200\n");
        assert_eq!(report.parsed_rows, 1);
        assert_eq!(report.malformed_rows, 2);
        assert_eq!(report.mean_error, Some(0.0));
        assert!(report.passed);
    }

    #[test]
    fn first_line_is_always_discarded() {
        // A data-shaped first line with a wild error is still the header.
        let report = check("1,9999,10\n2,100,100\n");
        assert_eq!(report.parsed_rows, 1);
        assert_eq!(report.mean_error, Some(0.0));
        assert!(report.passed);
    }

    #[test]
    fn zero_true_count_row_is_skipped_not_fatal() {
        let report = check("id,estimated,true\n1,5,0\n2,100,100\n");
        assert_eq!(report.zero_true_rows, 1);
        assert_eq!(report.parsed_rows, 1);
        assert_eq!(report.mean_error, Some(0.0));
        assert!(report.passed);
    }

    #[test]
    fn file_with_no_parseable_rows_fails_with_undefined_mean() {
        let header_only = check("id,estimated,true\n");
        assert_eq!(header_only.mean_error, None);
        assert!(!header_only.passed);

        let all_skipped = check("id,estimated,true\nbad,row,here\n1,5,0\n");
        assert_eq!(all_skipped.mean_error, None);
        assert!(!all_skipped.passed);
    }

    #[test]
    fn empty_input_fails_with_undefined_mean() {
        let report = check("");
        assert_eq!(report.mean_error, None);
        assert!(!report.passed);
    }

    #[test]
    fn mean_averages_across_rows() {
        // Errors 0.01 and 0.03 average to 0.02, above the default threshold.
        let report = check("id,estimated,true\n1,101,100\n2,103,100\n");
        assert_eq!(report.mean_error, Some(0.02));
        assert!(!report.passed);
    }

    #[test]
    fn policy_overrides_change_the_verdict() {
        let input = "id,estimated,true\n1,103,100\n";
        let strict = check_reader(input.as_bytes(), &AcceptancePolicy::default()).expect("scan");
        assert!(!strict.passed);

        let relaxed = AcceptancePolicy {
            acceptable_mean_error: 0.05,
            ..AcceptancePolicy::default()
        };
        let report = check_reader(input.as_bytes(), &relaxed).expect("scan");
        assert!(report.passed);
    }

    #[test]
    fn lowered_spike_gate_flags_small_counts() {
        let policy = AcceptancePolicy {
            spike_min_true_count: 5,
            ..AcceptancePolicy::default()
        };
        let report = check_reader("id,estimated,true\n1,8,6\n".as_bytes(), &policy).expect("scan");
        assert_eq!(report.spikes.len(), 1);
    }

    #[test]
    fn spikes_keep_file_order() {
        let input = "id,estimated,true\n5,80,60\n3,90,60\n8,70,60\n";
        let report = check(input);
        let ids: Vec<i64> = report.spikes.iter().map(|spike| spike.id).collect();
        assert_eq!(ids, vec![5, 3, 8]);
    }
}
