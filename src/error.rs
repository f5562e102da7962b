use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("no case records for district {district}")]
    MissingDistrict { district: String },

    #[error("malformed case record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("rolling window must be at least one day, got {0}")]
    InvalidWindow(usize),

    #[error("day-over-day change for {district} on {date} does not fit a 64-bit count")]
    CountOverflow { district: String, date: NaiveDate },

    #[error("unknown branch: {0}")]
    UnknownBranch(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
