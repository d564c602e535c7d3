// Row-level parsing for estimator result files.
// A data line is exactly three integer fields: id, estimated count, true count.
// Parse failures are explicit outcomes, never panics or swallowed exceptions.
use csv::StringRecord;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ResultRow {
    pub id: i64,
    pub estimated_count: u64,
    pub true_count: u64,
}

impl ResultRow {
    /// Relative estimation error, `|estimated - true| / true`.
    /// Only defined for rows with a nonzero true count; parsing routes
    /// zero-true-count rows to `RowOutcome::ZeroTrueCount` before this runs.
    pub fn relative_error(&self) -> f64 {
        let diff = self.estimated_count.abs_diff(self.true_count);
        diff as f64 / self.true_count as f64
    }
}

/// Outcome of parsing one data line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RowOutcome {
    Parsed(ResultRow),
    /// Wrong field count or a field that is not an integer. Skipped.
    Malformed,
    /// Well-formed row whose true count is zero; relative error is
    /// undefined for it, so it is skipped with its own tally.
    ZeroTrueCount { id: i64 },
}

pub fn parse_record(record: &StringRecord) -> RowOutcome {
    if record.len() != 3 {
        return RowOutcome::Malformed;
    }
    let id = match record[0].trim().parse::<i64>() {
        Ok(id) => id,
        Err(_) => return RowOutcome::Malformed,
    };
    let estimated_count = match record[1].trim().parse::<u64>() {
        Ok(count) => count,
        Err(_) => return RowOutcome::Malformed,
    };
    let true_count = match record[2].trim().parse::<u64>() {
        Ok(count) => count,
        Err(_) => return RowOutcome::Malformed,
    };
    if true_count == 0 {
        return RowOutcome::ZeroTrueCount { id };
    }
    RowOutcome::Parsed(ResultRow {
        id,
        estimated_count,
        true_count,
    })
}
