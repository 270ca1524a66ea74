mod common;

use common::TestWorkspace;
use csv_schemagen::{
    error::SchemaError,
    schema::{DatatypeDocument, SchemaDocument},
    validate::{DocumentKind, RawDocument, Violation, validate_document, validate_raw},
};
use serde_json::json;

fn schema_violations(document: serde_json::Value) -> Vec<Violation> {
    validate_document(&document, DocumentKind::Schema)
}

#[test]
fn well_formed_schema_has_no_violations() {
    let document = json!({
        "schema": {
            "ID": {"dtype": "str", "kind": "id"},
            "Age": {"dtype": "uint8", "kind": "numeric", "min": 14, "max": 87},
            "Date": {"dtype": "date", "kind": "date", "min": "2012-01-01 00:00:00", "max": "2020-12-31 00:00:00"},
            "State": {"dtype": "str", "kind": "categorical", "values": ["CA", "CT", null]}
        }
    });
    assert!(schema_violations(document).is_empty());
}

#[test]
fn categorical_without_values_reports_one_violation() {
    let violations = schema_violations(json!({
        "schema": {"State": {"dtype": "str", "kind": "categorical"}}
    }));
    assert_eq!(violations.len(), 1, "{violations:?}");
    assert_eq!(violations[0].column.as_deref(), Some("State"));
    assert_eq!(violations[0].field, "values");
    assert_eq!(violations[0].observed, "missing");
}

#[test]
fn numeric_with_inverted_bounds_reports_min() {
    let violations = schema_violations(json!({
        "schema": {"Age": {"dtype": "uint8", "kind": "numeric", "min": 90, "max": 10}}
    }));
    assert_eq!(violations.len(), 1, "{violations:?}");
    assert_eq!(violations[0].column.as_deref(), Some("Age"));
    assert_eq!(violations[0].field, "min");
}

#[test]
fn date_bounds_must_parse_and_be_ordered() {
    let violations = schema_violations(json!({
        "schema": {
            "a": {"dtype": "date", "kind": "date", "min": "someday", "max": "2020-01-01 00:00:00"},
            "b": {"dtype": "date", "kind": "date", "min": "2021-01-01 00:00:00", "max": "2020-01-01 00:00:00"}
        }
    }));
    let located: Vec<(Option<&str>, &str)> = violations
        .iter()
        .map(|v| (v.column.as_deref(), v.field.as_str()))
        .collect();
    assert_eq!(located, vec![(Some("a"), "min"), (Some("b"), "min")]);
}

#[test]
fn unknown_fields_are_reported_per_location() {
    let violations = schema_violations(json!({
        "schema": {"ID": {"dtype": "str", "kind": "id", "note": "x"}},
        "version": 2
    }));
    let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
    assert_eq!(fields, vec!["version", "note"]);
    assert!(violations[0].column.is_none());
    assert_eq!(violations[1].column.as_deref(), Some("ID"));
}

#[test]
fn bins_are_not_an_accepted_field() {
    let violations = schema_violations(json!({
        "schema": {"Age": {"dtype": "uint8", "kind": "numeric", "min": 1, "max": 2, "bins": 4}}
    }));
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].field, "bins");
}

#[test]
fn kind_specific_fields_cannot_be_mixed() {
    let violations = schema_violations(json!({
        "schema": {"ID": {"dtype": "str", "kind": "id", "values": ["a"]}}
    }));
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].field, "values");
    assert_eq!(violations[0].observed, "present");
}

#[test]
fn unknown_dtype_and_kind_tokens_are_rejected() {
    let violations = schema_violations(json!({
        "schema": {"x": {"dtype": "int128", "kind": "ordinal"}}
    }));
    let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
    assert_eq!(fields, vec!["dtype", "kind"]);
    assert_eq!(violations[0].observed, "'int128'");
}

#[test]
fn root_must_hold_the_expected_key() {
    let violations = validate_document(&json!([1, 2]), DocumentKind::Schema);
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].field, "<document>");

    let violations = validate_document(&json!({"dtype": {}}), DocumentKind::Schema);
    let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
    assert_eq!(fields, vec!["dtype", "schema"]);
}

#[test]
fn datatype_documents_check_each_token() {
    let valid = json!({"dtype": {"ID": "str", "Age": "uint8"}});
    assert!(validate_document(&valid, DocumentKind::Datatype).is_empty());

    let invalid = json!({"dtype": {"ID": "string", "Age": 8}});
    let violations = validate_document(&invalid, DocumentKind::Datatype);
    let columns: Vec<Option<&str>> = violations.iter().map(|v| v.column.as_deref()).collect();
    assert_eq!(columns, vec![Some("ID"), Some("Age")]);
    assert!(violations[0].to_string().contains("column 'ID' field 'dtype'"));
}

#[test]
fn loading_an_invalid_document_surfaces_every_violation() {
    let workspace = TestWorkspace::new();
    let path = workspace.write(
        "parameters.json",
        r#"{"schema": {"State": {"dtype": "str", "kind": "categorical"}, "Age": {"dtype": "uint8", "kind": "numeric", "min": 5, "max": 1}}}"#,
    );
    let err = SchemaDocument::load(&path).expect_err("invalid document");
    let schema_error = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<SchemaError>())
        .expect("schema error in chain");
    match schema_error {
        SchemaError::InvalidDocument { kind, violations } => {
            assert_eq!(*kind, DocumentKind::Schema);
            assert_eq!(violations.len(), 2);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn loading_a_valid_datatype_document() {
    let workspace = TestWorkspace::new();
    let path = workspace.write(
        "column_datatypes.json",
        r#"{"dtype": {"b": "float", "a": "int16"}}"#,
    );
    let document = DatatypeDocument::load(&path).expect("load datatypes");
    assert_eq!(document.dtype.keys().collect::<Vec<_>>(), ["b", "a"]);
}

#[test]
fn loading_a_missing_file_is_an_io_error() {
    let workspace = TestWorkspace::new();
    let err = SchemaDocument::load(&workspace.path().join("absent.json")).unwrap_err();
    assert!(format!("{err:#}").contains("absent.json"));
}

#[test]
fn inverted_sixty_four_bit_bounds_are_compared_exactly() {
    let unsigned = schema_violations(json!({
        "schema": {"big": {
            "dtype": "uint64",
            "kind": "numeric",
            "min": 18446744073709551615u64,
            "max": 18446744073709551614u64
        }}
    }));
    assert_eq!(unsigned.len(), 1, "{unsigned:?}");
    assert_eq!(unsigned[0].column.as_deref(), Some("big"));
    assert_eq!(unsigned[0].field, "min");
    assert_eq!(unsigned[0].observed, "18446744073709551615");

    let signed = schema_violations(json!({
        "schema": {"wide": {
            "dtype": "int64",
            "kind": "numeric",
            "min": 9007199254740993i64,
            "max": 9007199254740992i64
        }}
    }));
    assert_eq!(signed.len(), 1, "{signed:?}");
    assert_eq!(signed[0].field, "min");

    let ordered = schema_violations(json!({
        "schema": {"wide": {
            "dtype": "int64",
            "kind": "numeric",
            "min": i64::MIN,
            "max": i64::MAX
        }}
    }));
    assert!(ordered.is_empty(), "{ordered:?}");
}

#[test]
fn mixed_integer_and_float_bounds_are_ordered() {
    let inverted = schema_violations(json!({
        "schema": {"x": {"dtype": "float", "kind": "numeric", "min": 3, "max": 2.5}}
    }));
    assert_eq!(inverted.len(), 1);
    assert_eq!(inverted[0].field, "min");

    let ordered = schema_violations(json!({
        "schema": {"x": {"dtype": "float", "kind": "numeric", "min": 2.5, "max": 3}}
    }));
    assert!(ordered.is_empty());
}

#[test]
fn repeated_column_names_are_reported() {
    let raw = RawDocument::parse(
        r#"{"schema": {
            "Age": {"dtype": "uint8", "kind": "numeric", "min": 1, "max": 2},
            "Age": {"dtype": "str", "kind": "id"}
        }}"#,
    )
    .expect("parse document");
    assert_eq!(raw.duplicates.len(), 1);
    assert_eq!(raw.value["schema"]["Age"]["kind"], json!("numeric"));

    let violations = validate_raw(&raw, DocumentKind::Schema);
    assert_eq!(violations.len(), 1, "{violations:?}");
    assert_eq!(violations[0].column.as_deref(), Some("Age"));
    assert_eq!(violations[0].observed, "duplicate column");
}

#[test]
fn repeated_fields_inside_an_entry_are_reported() {
    let raw = RawDocument::parse(
        r#"{"dtype": {"a": "str"}, "dtype": {"a": "str"}}"#,
    )
    .expect("parse document");
    let violations = validate_raw(&raw, DocumentKind::Datatype);
    assert_eq!(violations.len(), 1, "{violations:?}");
    assert!(violations[0].column.is_none());
    assert_eq!(violations[0].field, "dtype");

    let raw = RawDocument::parse(
        r#"{"schema": {"ID": {"dtype": "str", "dtype": "int8", "kind": "id"}}}"#,
    )
    .expect("parse document");
    let violations = validate_raw(&raw, DocumentKind::Schema);
    assert_eq!(violations.len(), 1, "{violations:?}");
    assert_eq!(violations[0].column.as_deref(), Some("ID"));
    assert_eq!(violations[0].field, "dtype");
    assert_eq!(violations[0].observed, "duplicate field");
}

#[test]
fn loading_a_document_with_a_repeated_column_fails() {
    let workspace = TestWorkspace::new();
    let path = workspace.write(
        "parameters.json",
        r#"{"schema":{"Age":{"dtype":"uint8","kind":"numeric","min":1,"max":9},"Age":{"dtype":"str","kind":"id"}}}"#,
    );
    let err = SchemaDocument::load(&path).expect_err("repeated column");
    match err.chain().find_map(|cause| cause.downcast_ref::<SchemaError>()) {
        Some(SchemaError::InvalidDocument { violations, .. }) => {
            assert_eq!(violations.len(), 1);
            assert_eq!(violations[0].column.as_deref(), Some("Age"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn json_schema_catches_values_the_field_rules_allow() {
    let violations = schema_violations(json!({
        "schema": {"flag": {"dtype": "str", "kind": "categorical", "values": ["yes", true]}}
    }));
    assert!(!violations.is_empty());
    assert!(
        violations
            .iter()
            .all(|violation| violation.column.as_deref() == Some("flag")),
        "{violations:?}"
    );
}
