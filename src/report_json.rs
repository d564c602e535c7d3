use std::path::Path;

use cardcheck::api::FileReport;
use serde_json::{Value, json};

pub fn report_json(path: &Path, report: &FileReport) -> Value {
    json!({
        "file": path.display().to_string(),
        "mean_error": report.mean_error,
        "passed": report.passed,
        "parsed_rows": report.parsed_rows,
        "malformed_rows": report.malformed_rows,
        "zero_true_rows": report.zero_true_rows,
        "spikes": report.spikes,
    })
}
