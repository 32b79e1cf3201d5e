//! Record Validator - turns an untyped submission into an `ExperimentRecord`
//!
//! Validation is purely local: no side effects, no availability lookups.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use super::ExperimentRecord;

/// Fields owned by the lifecycle. They are ignored on submission.
const LIFECYCLE_FIELDS: [&str; 5] = [
    "state",
    "authorised_name",
    "authorised_time",
    "agents",
    "topics",
];

/// ISO 8601 layouts accepted in addition to strict RFC 3339.
const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Submitted data failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The payload is not a key/value object
    #[error("Experiment data must be an object")]
    NotAnObject,

    /// A required field is absent or null
    #[error("Field `{0}` is required")]
    MissingField(&'static str),

    /// A field holds a value of the wrong type
    #[error("Field `{field}` must be {expected}")]
    WrongType {
        /// Offending field
        field: &'static str,
        /// Human-readable expected type
        expected: &'static str,
    },

    /// A field that must carry content is empty
    #[error("Field `{0}` must not be empty")]
    EmptyField(&'static str),

    /// A list field names the same item twice
    #[error("Field `{field}` lists `{value}` more than once")]
    DuplicateEntry {
        /// Offending field
        field: &'static str,
        /// Repeated item
        value: String,
    },

    /// A timestamp string is not ISO 8601
    #[error("Field `{field}`: invalid datetime format `{value}`. Use ISO 8601")]
    MalformedTimestamp {
        /// Offending field
        field: &'static str,
        /// Rejected input
        value: String,
    },

    /// A timestamp has no UTC offset
    #[error("Field `{field}`: datetime `{value}` must include timezone information")]
    NaiveTimestamp {
        /// Offending field
        field: &'static str,
        /// Rejected input
        value: String,
    },

    /// `stop_time` is not strictly after `start_time`
    #[error("Start time must be before stop time (start {start_time}, stop {stop_time})")]
    TimeOrder {
        /// Submitted start
        start_time: DateTime<FixedOffset>,
        /// Submitted stop
        stop_time: DateTime<FixedOffset>,
    },
}

/// Validate an untyped submission payload.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found, naming the offending field.
pub fn validate_submission(payload: &Value) -> Result<ExperimentRecord, ValidationError> {
    let fields = payload.as_object().ok_or(ValidationError::NotAnObject)?;

    let experiment_id = required_str(fields, "experiment_id")?;
    let experimenter = required_str(fields, "experimenter")?;
    let description = required_str(fields, "description")?;
    let start_time = required_timestamp(fields, "start_time")?;
    let stop_time = required_timestamp(fields, "stop_time")?;
    let plants = required_plants(fields)?;
    let external_control = optional_bool(fields, "external_control", false)?;
    let simulation_flag = optional_bool(fields, "simulation_flag", true)?;

    for field in LIFECYCLE_FIELDS {
        if fields.get(field).is_some_and(|v| !v.is_null()) {
            debug!(experiment_id, field, "Ignoring lifecycle field on submission");
        }
    }

    ExperimentRecord::builder(experiment_id, start_time, stop_time)
        .experimenter(experimenter)
        .description(description)
        .plants(plants)
        .external_control(external_control)
        .simulation_flag(simulation_flag)
        .build()
}

/// Parse an ISO 8601 timestamp that carries an explicit UTC offset.
///
/// # Errors
///
/// [`ValidationError::NaiveTimestamp`] for well-formed timestamps without an
/// offset, [`ValidationError::MalformedTimestamp`] for anything else.
pub fn parse_timestamp(
    field: &'static str,
    raw: &str,
) -> Result<DateTime<FixedOffset>, ValidationError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt);
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(raw, fmt).ok())
    {
        return Ok(dt);
    }

    let naive = NAIVE_FORMATS
        .iter()
        .any(|fmt| NaiveDateTime::parse_from_str(raw, fmt).is_ok())
        || NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok();
    let value = raw.to_string();
    if naive {
        Err(ValidationError::NaiveTimestamp { field, value })
    } else {
        Err(ValidationError::MalformedTimestamp { field, value })
    }
}

fn required<'a>(
    fields: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, ValidationError> {
    match fields.get(field) {
        None | Some(Value::Null) => Err(ValidationError::MissingField(field)),
        Some(value) => Ok(value),
    }
}

fn required_str<'a>(
    fields: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    required(fields, field)?
        .as_str()
        .ok_or(ValidationError::WrongType {
            field,
            expected: "a string",
        })
}

fn required_timestamp(
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<DateTime<FixedOffset>, ValidationError> {
    match required(fields, field)? {
        Value::String(raw) => parse_timestamp(field, raw),
        _ => Err(ValidationError::WrongType {
            field,
            expected: "a datetime or ISO 8601 string",
        }),
    }
}

fn required_plants(fields: &Map<String, Value>) -> Result<Vec<&str>, ValidationError> {
    const WRONG: ValidationError = ValidationError::WrongType {
        field: "plants",
        expected: "a list of strings",
    };

    let plants = required(fields, "plants")?.as_array().ok_or(WRONG)?;
    if plants.is_empty() {
        return Err(ValidationError::EmptyField("plants"));
    }
    let mut names: Vec<&str> = Vec::with_capacity(plants.len());
    for plant in plants {
        match plant.as_str() {
            Some(name) if name.trim().is_empty() => {
                return Err(ValidationError::EmptyField("plants"));
            }
            Some(name) if names.contains(&name) => {
                return Err(ValidationError::DuplicateEntry {
                    field: "plants",
                    value: name.to_string(),
                });
            }
            Some(name) => names.push(name),
            None => return Err(WRONG),
        }
    }
    Ok(names)
}

fn optional_bool(
    fields: &Map<String, Value>,
    field: &'static str,
    default: bool,
) -> Result<bool, ValidationError> {
    match fields.get(field) {
        None => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(ValidationError::WrongType {
            field,
            expected: "a boolean",
        }),
    }
}
