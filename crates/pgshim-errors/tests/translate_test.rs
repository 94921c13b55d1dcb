use pgshim_errors::{
    ErrorKind, ForeignKeyConstraint, RawBackendError, StructuredError, translate,
};
use serde_json::{Value, json};

fn translate_json(value: Value) -> StructuredError {
    translate(value).unwrap()
}

#[test]
fn test_unique_violation_with_key_detail() {
    let error = translate_json(json!({
        "code": "23505",
        "message": "duplicate key",
        "severity": "ERROR",
        "detail": "Key (email)=(a@x.com) already exists."
    }));

    assert_eq!(
        error,
        StructuredError::UniqueConstraintViolation {
            fields: vec!["email".to_string()]
        }
    );
}

#[test]
fn test_unique_violation_without_detail() {
    let error = translate_json(json!({
        "code": "23505",
        "message": "duplicate key",
        "severity": "ERROR"
    }));

    assert_eq!(
        error,
        StructuredError::UniqueConstraintViolation { fields: vec![] }
    );
}

#[test]
fn test_table_does_not_exist() {
    let error = translate_json(json!({
        "code": "42P01",
        "message": "relation \"users\" does not exist",
        "severity": "ERROR"
    }));

    assert_eq!(
        error,
        StructuredError::TableDoesNotExist {
            table: Some("users".to_string())
        }
    );
}

#[test]
fn test_unknown_code_falls_back_to_generic() {
    let error = translate_json(json!({
        "code": "99999",
        "message": "weird",
        "severity": "ERROR",
        "detail": "d",
        "column": "c",
        "hint": "h"
    }));

    assert_eq!(
        serde_json::to_value(&error).unwrap(),
        json!({
            "kind": "Postgres",
            "code": "99999",
            "severity": "ERROR",
            "message": "weird",
            "detail": "d",
            "column": "c",
            "hint": "h"
        })
    );
}

#[test]
fn test_foreign_key_violation_prefers_column() {
    let error = translate_json(json!({
        "code": "23503",
        "message": "fk violation",
        "severity": "ERROR",
        "column": "user_id"
    }));

    assert_eq!(
        error,
        StructuredError::ForeignKeyConstraintViolation {
            constraint: Some(ForeignKeyConstraint::Fields {
                fields: vec!["user_id".to_string()]
            })
        }
    );
}

#[test]
fn test_foreign_key_violation_with_constraint_or_nothing() {
    let error = translate_json(json!({
        "code": "23503",
        "message": "fk violation",
        "severity": "ERROR",
        "constraint": "posts_author_id_fkey"
    }));
    assert_eq!(
        error,
        StructuredError::ForeignKeyConstraintViolation {
            constraint: Some(ForeignKeyConstraint::Index {
                index: "posts_author_id_fkey".to_string()
            })
        }
    );

    let error = translate_json(json!({
        "code": "23503",
        "message": "fk violation",
        "severity": "ERROR"
    }));
    assert_eq!(
        error,
        StructuredError::ForeignKeyConstraintViolation { constraint: None }
    );
}

#[test]
fn test_network_fault_is_returned_unchanged() {
    let fault = json!({
        "name": "TimeoutError",
        "errno": -110,
        "syscall": "connect"
    });
    let original = fault.clone();

    let returned = translate(fault).unwrap_err();
    assert_eq!(returned, original);
}

#[test]
fn test_pass_through_keeps_the_same_object() {
    let fault = json!({"message": "socket hang up"});
    let returned = translate(&fault).unwrap_err();
    assert!(std::ptr::eq(returned, &fault));
}

#[test]
fn test_wrongly_typed_fields_are_not_translated() {
    let inputs = [
        json!({"code": "23505", "message": "dup", "severity": 3}),
        json!({"code": "23505", "message": "dup", "severity": "ERROR", "detail": {"k": 1}}),
        json!(["23505", "dup", "ERROR"]),
        json!("23505"),
    ];

    for input in inputs {
        let expected = input.clone();
        assert_eq!(translate(input).unwrap_err(), expected);
    }
}

#[test]
fn test_every_code_maps_to_its_kind() {
    let cases = [
        ("22001", ErrorKind::LengthMismatch),
        ("23505", ErrorKind::UniqueConstraintViolation),
        ("23502", ErrorKind::NullConstraintViolation),
        ("23503", ErrorKind::ForeignKeyConstraintViolation),
        ("3D000", ErrorKind::DatabaseDoesNotExist),
        ("28000", ErrorKind::DatabaseAccessDenied),
        ("28P01", ErrorKind::AuthenticationFailed),
        ("40001", ErrorKind::TransactionWriteConflict),
        ("42P01", ErrorKind::TableDoesNotExist),
        ("42703", ErrorKind::ColumnNotFound),
        ("42P04", ErrorKind::DatabaseAlreadyExists),
        ("53300", ErrorKind::TooManyConnections),
        ("08006", ErrorKind::Postgres),
        ("", ErrorKind::Postgres),
    ];

    for (code, kind) in cases {
        let error = translate(RawBackendError::new(code, "message", "ERROR")).unwrap();
        assert_eq!(error.kind(), kind, "code {code}");
    }
}

#[test]
fn test_message_token_extraction_per_code() {
    let raw = RawBackendError::new("3D000", r#"database "shop" does not exist"#, "FATAL");
    assert_eq!(
        translate(raw).unwrap(),
        StructuredError::DatabaseDoesNotExist {
            db: Some("shop".to_string())
        }
    );

    let raw = RawBackendError::new(
        "28000",
        r#"no pg_hba.conf entry for database "shop""#,
        "FATAL",
    );
    assert_eq!(
        translate(raw).unwrap(),
        StructuredError::DatabaseAccessDenied {
            db: Some("shop".to_string())
        }
    );

    let raw = RawBackendError::new(
        "28P01",
        r#"password authentication failed for user "postgres""#,
        "FATAL",
    );
    assert_eq!(
        translate(raw).unwrap(),
        StructuredError::AuthenticationFailed {
            user: Some("postgres".to_string())
        }
    );

    let raw = RawBackendError::new(
        "42703",
        r#"column "emial" does not exist"#,
        "ERROR",
    );
    assert_eq!(
        translate(raw).unwrap(),
        StructuredError::ColumnNotFound {
            column: Some("emial".to_string())
        }
    );

    let raw = RawBackendError::new("42P04", r#"database "shop" already exists"#, "ERROR");
    assert_eq!(
        translate(raw).unwrap(),
        StructuredError::DatabaseAlreadyExists {
            db: Some("shop".to_string())
        }
    );
}

#[test]
fn test_extraction_misses_degrade_to_absent() {
    let raw = RawBackendError::new("42P01", "relation does not exist", "ERROR");
    assert_eq!(
        translate(raw).unwrap(),
        StructuredError::TableDoesNotExist { table: None }
    );

    let raw = RawBackendError::new("28000", "denied", "FATAL");
    assert_eq!(
        translate(raw).unwrap(),
        StructuredError::DatabaseAccessDenied { db: None }
    );
}

#[test]
fn test_null_violation_and_length_mismatch() {
    let raw = RawBackendError::new("23502", "null value", "ERROR")
        .with_detail("Key (name, tenant)=(null, 1)");
    assert_eq!(
        translate(raw).unwrap(),
        StructuredError::NullConstraintViolation {
            fields: vec!["name".to_string(), "tenant".to_string()]
        }
    );

    let raw = RawBackendError::new("22001", "value too long for type character varying(3)", "ERROR")
        .with_column("code");
    assert_eq!(
        translate(raw).unwrap(),
        StructuredError::LengthMismatch {
            column: Some("code".to_string())
        }
    );
}

#[test]
fn test_too_many_connections_keeps_message() {
    let raw = RawBackendError::new("53300", "sorry, too many clients already", "FATAL");
    assert_eq!(
        translate(raw).unwrap(),
        StructuredError::TooManyConnections {
            cause: "sorry, too many clients already".to_string()
        }
    );
}

#[test]
fn test_translation_is_deterministic() {
    let input = json!({
        "code": "23505",
        "message": "duplicate key",
        "severity": "ERROR",
        "detail": "Key (a, b)=(1, 2) already exists."
    });

    let first = translate(input.clone()).unwrap();
    let second = translate(input).unwrap();
    assert_eq!(first, second);
}
