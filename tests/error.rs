use std::path::PathBuf;

use serde_json::Value;
use selfcontrol::error::{exit_codes, EntityKind, Error, JsonError};

#[test]
fn exit_code_user_error() {
    let errors = [
        Error::task_not_found(3),
        Error::DuplicateName("foo".to_string()),
        Error::DuplicateTimer { task_id: 1 },
        Error::InvalidNumericArgument("x".to_string()),
        Error::InvalidArgument("bad input".to_string()),
        Error::InvalidConfig("bad".to_string()),
    ];
    for err in errors {
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR, "{err}");
    }
}

#[test]
fn exit_code_operation_failed() {
    let err = Error::OperationFailed("boom".to_string());
    assert_eq!(err.exit_code(), exit_codes::OPERATION_FAILED);

    let err = Error::LockFailed(PathBuf::from("tasks.json.lock"));
    assert_eq!(err.exit_code(), exit_codes::OPERATION_FAILED);
}

#[test]
fn not_found_messages_name_the_entity() {
    assert_eq!(Error::task_not_found(7).to_string(), "No such task: 7");
    let err = Error::timer_not_found(7);
    assert!(matches!(err, Error::NotFound { kind: EntityKind::Timer, .. }));
    assert!(err.to_string().starts_with("No such timer"));
}

#[test]
fn details_include_duplicate_timer_task() {
    let err = Error::DuplicateTimer { task_id: 12 };
    let details = err.details().expect("details");
    assert_eq!(details["task_id"], Value::from(12));
}

#[test]
fn json_error_includes_details() {
    let err = Error::InvalidConfig("bad config".to_string());
    let json = JsonError::from(&err);
    assert_eq!(json.code, exit_codes::USER_ERROR);
    assert_eq!(json.kind, "user_error");
    let details = json.details.expect("details");
    assert_eq!(details["message"], Value::String("bad config".to_string()));
}

#[test]
fn io_errors_have_no_details() {
    let err = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
    let json = JsonError::from(&err);
    assert_eq!(json.code, exit_codes::OPERATION_FAILED);
    assert!(json.details.is_none());
    assert_eq!(json.kind, "operation_failed");
    assert!(json.message.contains("disk"));
}
