//! Tests for error types

use std::path::PathBuf;
use std::time::Duration;

use plant_orchestrator::collaborators::CallError;
use plant_orchestrator::experiment::{ExperimentState, TransitionError, Trigger, ValidationError};
use plant_orchestrator::{ApiError, Error, ErrorKind};

#[test]
fn test_validation_error() {
    let error: Error = ValidationError::MissingField("plants").into();
    let error_str = format!("{error}");
    assert!(error_str.contains("Validation failed"));
    assert!(error_str.contains("plants"));
    assert_eq!(error.kind(), ErrorKind::Validation);
}

#[test]
fn test_resource_conflict_error() {
    let error = Error::ResourceConflict {
        experiment_id: "exp-2".to_string(),
        conflicting_id: "exp-1".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("exp-2"));
    assert!(error_str.contains("exp-1"));
    assert_eq!(error.kind(), ErrorKind::ResourceConflict);
}

#[test]
fn test_invalid_transition_error() {
    let error: Error = TransitionError {
        trigger: Trigger::Finish,
        from: ExperimentState::Authorised,
    }
    .into();
    let error_str = format!("{error}");
    assert!(error_str.contains("finish"));
    assert!(error_str.contains("authorised"));
    assert_eq!(error.kind(), ErrorKind::InvalidTransition);
}

#[test]
fn test_invalid_state_error() {
    let error = Error::InvalidState {
        experiment_id: "exp-1".to_string(),
        operation: "remove",
        state: ExperimentState::Running,
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("remove"));
    assert!(error_str.contains("running"));
}

#[test]
fn test_external_call_failed_keeps_source() {
    let error = Error::ExternalCallFailed {
        experiment_id: "exp-1".to_string(),
        source: CallError::Timeout {
            call: "submit_experiment_schedule",
            after: Duration::from_secs(2),
        },
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("submit_experiment_schedule"));
    assert!(std::error::Error::source(&error).is_some());
    assert_eq!(error.kind(), ErrorKind::ExternalCallFailed);
}

#[test]
fn test_corrupt_data_error() {
    let error = Error::CorruptData {
        path: PathBuf::from("/tmp/experimentsdata.json"),
        quarantined_to: None,
        reason: "EOF while parsing".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("experimentsdata.json"));
    assert!(error_str.contains("EOF while parsing"));
    assert_eq!(error.kind(), ErrorKind::Internal);
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let error: Error = io_error.into();
    let error_str = format!("{error}");
    assert!(error_str.contains("IO error"));
    assert_eq!(error.kind(), ErrorKind::Internal);
}

#[test]
fn test_kind_labels() {
    let labels = [
        (ErrorKind::Validation, "validation"),
        (ErrorKind::AlreadyExists, "already_exists"),
        (ErrorKind::NotFound, "not_found"),
        (ErrorKind::ResourceConflict, "resource_conflict"),
        (ErrorKind::InvalidTransition, "invalid_transition"),
        (ErrorKind::InvalidState, "invalid_state"),
        (ErrorKind::NotInstalled, "not_installed"),
        (ErrorKind::ExternalCallFailed, "external_call_failed"),
        (ErrorKind::Internal, "internal"),
    ];
    for (kind, label) in labels {
        assert_eq!(kind.to_string(), label);
        assert_eq!(serde_json::to_value(kind).unwrap(), label);
    }
}

#[test]
fn test_api_error_display() {
    let error: ApiError = Error::NotFound("exp-7".to_string()).into();
    assert_eq!(format!("{error}"), "not_found: Experiment not found: exp-7");
}

#[test]
fn test_error_debug() {
    let error = Error::AlreadyExists("exp-1".to_string());
    let debug_str = format!("{error:?}");
    assert!(debug_str.contains("AlreadyExists"));
}
