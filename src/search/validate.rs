//! Input validation for search queries
//!
//! All validation happens before any store or embedding access (fail
//! fast, no partial I/O). Errors identify the offending field and are
//! never retried.

use chrono::NaiveDate;
use thiserror::Error;

use crate::store::DateRange;

/// Minimum query/concept phrase length in characters
pub const MIN_QUERY_CHARS: usize = 2;
/// Conjunctive search bounds on the number of concept phrases
pub const MIN_CONCEPTS: usize = 2;
pub const MAX_CONCEPTS: usize = 5;

/// Validation failures, detected before any I/O
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("query must be at least {MIN_QUERY_CHARS} characters")]
    QueryTooShort,

    #[error("invalid `{field}` date {value:?}: expected a valid YYYY-MM-DD date")]
    InvalidDate { field: &'static str, value: String },

    #[error("concept search requires {MIN_CONCEPTS} to {MAX_CONCEPTS} concepts, got {0}")]
    ConceptCount(usize),
}

/// Validate a single query or concept phrase
pub fn validate_query(query: &str) -> Result<(), SearchError> {
    if query.chars().count() < MIN_QUERY_CHARS {
        return Err(SearchError::QueryTooShort);
    }
    Ok(())
}

/// Validate a concept list: count in [2, 5], each phrase long enough
pub fn validate_concepts(concepts: &[String]) -> Result<(), SearchError> {
    if !(MIN_CONCEPTS..=MAX_CONCEPTS).contains(&concepts.len()) {
        return Err(SearchError::ConceptCount(concepts.len()));
    }
    for concept in concepts {
        validate_query(concept)?;
    }
    Ok(())
}

/// Validate optional date bounds and build the store-level range
pub fn validate_range(
    after: Option<&str>,
    before: Option<&str>,
) -> Result<DateRange, SearchError> {
    if let Some(value) = after {
        validate_date("after", value)?;
    }
    if let Some(value) = before {
        validate_date("before", value)?;
    }

    Ok(DateRange {
        after: after.map(String::from),
        before: before.map(String::from),
    })
}

/// A date must match `YYYY-MM-DD` exactly and be a real calendar date
fn validate_date(field: &'static str, value: &str) -> Result<(), SearchError> {
    let shaped = value.len() == 10
        && value
            .bytes()
            .enumerate()
            .all(|(i, b)| if i == 4 || i == 7 { b == b'-' } else { b.is_ascii_digit() });

    if !shaped || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
        return Err(SearchError::InvalidDate {
            field,
            value: value.to_string(),
        });
    }

    Ok(())
}
