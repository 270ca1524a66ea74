//! Structural validation of schema and datatype documents.
//!
//! Documents are checked as raw [`serde_json::Value`]s so that hand-edited or
//! foreign files can be diagnosed completely: every problem is recorded as a
//! [`Violation`] and checking always continues to the end of the document.
//! Documents that pass the field-level rules are also run through the JSON
//! Schemas shipped in `schemas/`.
//!
//! A `serde_json::Value` keeps only the last of two equal object keys, so
//! files are parsed through [`RawDocument`], which records every repeated key
//! while building the value.

use std::{fmt, sync::OnceLock};

use chrono::NaiveDateTime;
use jsonschema::Validator;
use log::warn;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{self, DeserializeSeed, MapAccess, SeqAccess, Visitor},
};
use serde_json::{Map, Number, Value as JsonValue};

use crate::{
    data::parse_naive_datetime,
    schema::{ColumnKind, Dtype},
};

const SCHEMA_ROOT_KEY: &str = "schema";
const DATATYPE_ROOT_KEY: &str = "dtype";
const COLUMN_FIELDS: &[&str] = &["dtype", "kind", "values", "min", "max"];
const PARAMETERS_JSON_SCHEMA: &str = include_str!("../schemas/parameters.json.schema");
const DATATYPES_JSON_SCHEMA: &str = include_str!("../schemas/column_datatypes.json.schema");

static PARAMETERS_VALIDATOR: OnceLock<Option<Validator>> = OnceLock::new();
static DATATYPES_VALIDATOR: OnceLock<Option<Validator>> = OnceLock::new();

/// 2^127: floats at or beyond this magnitude lie outside the `i128` range.
const I128_LIMIT: f64 = i128::MAX as f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// `parameters.json`: full per-column schema.
    Schema,
    /// `column_datatypes.json`: dtype per column.
    Datatype,
}

impl DocumentKind {
    fn root_key(&self) -> &'static str {
        match self {
            DocumentKind::Schema => SCHEMA_ROOT_KEY,
            DocumentKind::Datatype => DATATYPE_ROOT_KEY,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Schema => f.write_str("schema"),
            DocumentKind::Datatype => f.write_str("datatype"),
        }
    }
}

/// One broken rule: where it was found, what was expected, what was there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Column the violation belongs to; `None` for document-level problems.
    pub column: Option<String>,
    pub field: String,
    pub expected: String,
    pub observed: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(column) => write!(
                f,
                "column '{column}' field '{}': expected {}, found {}",
                self.field, self.expected, self.observed
            ),
            None => write!(
                f,
                "field '{}': expected {}, found {}",
                self.field, self.expected, self.observed
            ),
        }
    }
}

struct Violations {
    items: Vec<Violation>,
}

impl Violations {
    fn push(
        &mut self,
        column: Option<&str>,
        field: &str,
        expected: impl Into<String>,
        observed: impl Into<String>,
    ) {
        self.items.push(Violation {
            column: column.map(str::to_string),
            field: field.to_string(),
            expected: expected.into(),
            observed: observed.into(),
        });
    }
}

/// Checks `document` against the rules for `kind` and returns every violation
/// in document order. An empty result means the document is valid.
pub fn validate_document(document: &JsonValue, kind: DocumentKind) -> Vec<Violation> {
    let mut violations = Violations { items: Vec::new() };
    if let Some(columns) = check_root(document, kind, &mut violations) {
        for (name, entry) in columns {
            match kind {
                DocumentKind::Schema => check_column_entry(name, entry, &mut violations),
                DocumentKind::Datatype => check_dtype(name, Some(entry), &mut violations),
            }
        }
    }
    // Only reached by documents the field rules accept.
    if violations.items.is_empty() {
        check_json_schema(document, kind, &mut violations);
    }
    violations.items
}

/// Validates a parsed file: repeated keys first, then the document rules.
pub fn validate_raw(raw: &RawDocument, kind: DocumentKind) -> Vec<Violation> {
    let mut violations = Violations { items: Vec::new() };
    for duplicate in &raw.duplicates {
        check_duplicate(duplicate, kind, &mut violations);
    }
    violations
        .items
        .extend(validate_document(&raw.value, kind));
    violations.items
}

/// An object key that appeared more than once in the same object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKey {
    /// Keys (or array indices) leading to the object holding the repeat.
    pub path: Vec<String>,
    pub key: String,
}

/// A JSON document as read from disk. The value keeps the first occurrence of
/// a repeated key; every later occurrence is listed in `duplicates`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub value: JsonValue,
    pub duplicates: Vec<DuplicateKey>,
}

impl RawDocument {
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        let mut duplicates = Vec::new();
        let mut deserializer = serde_json::Deserializer::from_str(text);
        let value = RawValueSeed {
            path: Vec::new(),
            duplicates: &mut duplicates,
        }
        .deserialize(&mut deserializer)?;
        deserializer.end()?;
        Ok(Self { value, duplicates })
    }
}

struct RawValueSeed<'a> {
    path: Vec<String>,
    duplicates: &'a mut Vec<DuplicateKey>,
}

impl<'de> DeserializeSeed<'de> for RawValueSeed<'_> {
    type Value = JsonValue;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for RawValueSeed<'_> {
    type Value = JsonValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<JsonValue, E> {
        Ok(JsonValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<JsonValue, E> {
        Ok(JsonValue::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<JsonValue, E> {
        Ok(JsonValue::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<JsonValue, E> {
        Ok(Number::from_f64(v).map_or(JsonValue::Null, JsonValue::Number))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<JsonValue, E> {
        Ok(JsonValue::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<JsonValue, E> {
        Ok(JsonValue::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<JsonValue, E> {
        Ok(JsonValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<JsonValue, E> {
        Ok(JsonValue::Null)
    }

    fn visit_seq<A>(self, mut access: A) -> Result<JsonValue, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let RawValueSeed { path, duplicates } = self;
        let mut items = Vec::new();
        loop {
            let mut item_path = path.clone();
            item_path.push(items.len().to_string());
            let seed = RawValueSeed {
                path: item_path,
                duplicates: &mut *duplicates,
            };
            match access.next_element_seed(seed)? {
                Some(item) => items.push(item),
                None => break,
            }
        }
        Ok(JsonValue::Array(items))
    }

    fn visit_map<A>(self, mut access: A) -> Result<JsonValue, A::Error>
    where
        A: MapAccess<'de>,
    {
        let RawValueSeed { path, duplicates } = self;
        let mut object = Map::new();
        while let Some(key) = access.next_key::<String>()? {
            let mut value_path = path.clone();
            value_path.push(key.clone());
            let value = access.next_value_seed(RawValueSeed {
                path: value_path,
                duplicates: &mut *duplicates,
            })?;
            if object.contains_key(&key) {
                duplicates.push(DuplicateKey {
                    path: path.clone(),
                    key,
                });
            } else {
                object.insert(key, value);
            }
        }
        Ok(JsonValue::Object(object))
    }
}

fn check_duplicate(duplicate: &DuplicateKey, kind: DocumentKind, violations: &mut Violations) {
    let DuplicateKey { path, key } = duplicate;
    match path.as_slice() {
        [root] if root == kind.root_key() => violations.push(
            Some(key.as_str()),
            "<entry>",
            "a unique column name",
            "duplicate column",
        ),
        [root, column, rest @ ..] if root == kind.root_key() => {
            let field = rest
                .iter()
                .chain(std::iter::once(key))
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(".");
            violations.push(
                Some(column.as_str()),
                &field,
                format!("a single '{key}' field"),
                "duplicate field",
            );
        }
        _ => {
            let field = path
                .iter()
                .chain(std::iter::once(key))
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(".");
            violations.push(None, &field, format!("a single '{key}' field"), "duplicate field");
        }
    }
}

fn json_schema_validator(kind: DocumentKind) -> Option<&'static Validator> {
    let (cell, source) = match kind {
        DocumentKind::Schema => (&PARAMETERS_VALIDATOR, PARAMETERS_JSON_SCHEMA),
        DocumentKind::Datatype => (&DATATYPES_VALIDATOR, DATATYPES_JSON_SCHEMA),
    };
    cell.get_or_init(|| compile_json_schema(source, kind))
        .as_ref()
}

fn compile_json_schema(source: &str, kind: DocumentKind) -> Option<Validator> {
    let schema: JsonValue = match serde_json::from_str(source) {
        Ok(schema) => schema,
        Err(err) => {
            warn!("Bundled {kind} JSON Schema is not valid JSON: {err}");
            return None;
        }
    };
    match jsonschema::validator_for(&schema) {
        Ok(validator) => Some(validator),
        Err(err) => {
            warn!("Bundled {kind} JSON Schema failed to compile: {err}");
            None
        }
    }
}

fn check_json_schema(document: &JsonValue, kind: DocumentKind, violations: &mut Violations) {
    let Some(validator) = json_schema_validator(kind) else {
        return;
    };
    let root_key = kind.root_key();
    for error in validator.iter_errors(document) {
        let pointer = error.instance_path().to_string();
        let segments: Vec<String> = pointer
            .split('/')
            .skip(1)
            .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
            .collect();
        let expected = format!("a value allowed by the {kind} JSON Schema");
        match segments.as_slice() {
            [root, column, rest @ ..] if root == root_key => {
                let field = if rest.is_empty() {
                    "<entry>".to_string()
                } else {
                    rest.join(".")
                };
                violations.push(Some(column.as_str()), &field, expected, error.to_string());
            }
            [] => violations.push(None, "<document>", expected, error.to_string()),
            _ => violations.push(None, &segments.join("."), expected, error.to_string()),
        }
    }
}

fn check_root<'a>(
    document: &'a JsonValue,
    kind: DocumentKind,
    violations: &mut Violations,
) -> Option<&'a Map<String, JsonValue>> {
    let root_key = kind.root_key();
    let Some(root) = document.as_object() else {
        violations.push(
            None,
            "<document>",
            format!("an object with a '{root_key}' key"),
            describe(document),
        );
        return None;
    };
    for key in root.keys().filter(|key| key.as_str() != root_key) {
        violations.push(None, key, "no additional top-level fields", "unknown field");
    }
    match root.get(root_key) {
        None => {
            violations.push(None, root_key, "a mapping of column name to entry", "missing");
            None
        }
        Some(JsonValue::Object(columns)) => Some(columns),
        Some(other) => {
            violations.push(
                None,
                root_key,
                "a mapping of column name to entry",
                describe(other),
            );
            None
        }
    }
}

fn check_column_entry(name: &str, entry: &JsonValue, violations: &mut Violations) {
    let Some(fields) = entry.as_object() else {
        violations.push(Some(name), "<entry>", "an object", describe(entry));
        return;
    };

    for key in fields.keys().filter(|key| !COLUMN_FIELDS.contains(&key.as_str())) {
        violations.push(Some(name), key, "no additional fields", "unknown field");
    }

    check_dtype(name, fields.get("dtype"), violations);

    let kind = match fields.get("kind") {
        None => {
            violations.push(Some(name), "kind", one_of(ColumnKind::variants()), "missing");
            return;
        }
        Some(JsonValue::String(kind)) if ColumnKind::variants().contains(&kind.as_str()) => {
            kind.as_str()
        }
        Some(other) => {
            violations.push(
                Some(name),
                "kind",
                one_of(ColumnKind::variants()),
                describe(other),
            );
            return;
        }
    };

    let allowed: &[&str] = match kind {
        "categorical" => &["values"],
        "numeric" | "date" => &["min", "max"],
        _ => &[],
    };
    for field in ["values", "min", "max"] {
        if fields.contains_key(field) && !allowed.contains(&field) {
            violations.push(
                Some(name),
                field,
                format!("no '{field}' on a {kind} column"),
                "present",
            );
        }
    }

    match kind {
        "categorical" => check_values(name, fields.get("values"), violations),
        "numeric" => check_numeric_bounds(name, fields, violations),
        "date" => check_date_bounds(name, fields, violations),
        _ => {}
    }
}

fn check_dtype(name: &str, value: Option<&JsonValue>, violations: &mut Violations) {
    match value {
        None => violations.push(Some(name), "dtype", one_of(Dtype::variants()), "missing"),
        Some(JsonValue::String(token)) if Dtype::variants().contains(&token.as_str()) => {}
        Some(other) => {
            violations.push(Some(name), "dtype", one_of(Dtype::variants()), describe(other))
        }
    }
}

fn check_values(name: &str, values: Option<&JsonValue>, violations: &mut Violations) {
    match values {
        None => violations.push(Some(name), "values", "a list of observed values", "missing"),
        Some(JsonValue::Array(items)) => {
            for (idx, item) in items.iter().enumerate() {
                if item.is_array() || item.is_object() {
                    violations.push(
                        Some(name),
                        &format!("values[{idx}]"),
                        "a string, number, or null",
                        describe(item),
                    );
                }
            }
        }
        Some(other) => violations.push(
            Some(name),
            "values",
            "a list of observed values",
            describe(other),
        ),
    }
}

fn check_numeric_bounds(
    name: &str,
    fields: &Map<String, JsonValue>,
    violations: &mut Violations,
) {
    let min = numeric_bound(name, fields, "min", violations);
    let max = numeric_bound(name, fields, "max", violations);
    if let (Some(min), Some(max)) = (min, max)
        && min.exceeds(&max)
    {
        violations.push(
            Some(name),
            "min",
            format!("a value no greater than max ({max})"),
            min.to_string(),
        );
    }
}

/// A numeric bound as written; integers are compared without going through `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
enum NumericBound {
    Integer(i128),
    Float(f64),
}

impl NumericBound {
    fn from_number(number: &Number) -> Option<Self> {
        if let Some(value) = number.as_i64() {
            Some(NumericBound::Integer(i128::from(value)))
        } else if let Some(value) = number.as_u64() {
            Some(NumericBound::Integer(i128::from(value)))
        } else {
            number.as_f64().map(NumericBound::Float)
        }
    }

    fn exceeds(&self, other: &Self) -> bool {
        match (*self, *other) {
            (NumericBound::Integer(a), NumericBound::Integer(b)) => a > b,
            (NumericBound::Float(a), NumericBound::Float(b)) => a > b,
            (NumericBound::Integer(a), NumericBound::Float(b)) => {
                if b >= I128_LIMIT {
                    false
                } else if b < -I128_LIMIT {
                    true
                } else {
                    a > b.floor() as i128
                }
            }
            (NumericBound::Float(a), NumericBound::Integer(b)) => {
                if a >= I128_LIMIT {
                    true
                } else if a < -I128_LIMIT {
                    false
                } else {
                    a.ceil() as i128 > b
                }
            }
        }
    }
}

impl fmt::Display for NumericBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericBound::Integer(value) => write!(f, "{value}"),
            NumericBound::Float(value) => write!(f, "{value}"),
        }
    }
}

fn numeric_bound(
    name: &str,
    fields: &Map<String, JsonValue>,
    field: &str,
    violations: &mut Violations,
) -> Option<NumericBound> {
    match fields.get(field) {
        None => {
            violations.push(Some(name), field, "a number", "missing");
            None
        }
        Some(JsonValue::Number(number)) => NumericBound::from_number(number),
        Some(other) => {
            violations.push(Some(name), field, "a number", describe(other));
            None
        }
    }
}

fn check_date_bounds(name: &str, fields: &Map<String, JsonValue>, violations: &mut Violations) {
    let min = date_bound(name, fields, "min", violations);
    let max = date_bound(name, fields, "max", violations);
    if let (Some((min_raw, min)), Some((max_raw, max))) = (min, max)
        && min > max
    {
        violations.push(
            Some(name),
            "min",
            format!("a date no later than max ('{max_raw}')"),
            format!("'{min_raw}'"),
        );
    }
}

fn date_bound<'a>(
    name: &str,
    fields: &'a Map<String, JsonValue>,
    field: &str,
    violations: &mut Violations,
) -> Option<(&'a str, NaiveDateTime)> {
    match fields.get(field) {
        None => {
            violations.push(Some(name), field, "a date string", "missing");
            None
        }
        Some(JsonValue::String(raw)) => match parse_naive_datetime(raw) {
            Ok(parsed) => Some((raw.as_str(), parsed)),
            Err(_) => {
                violations.push(Some(name), field, "a date string", format!("'{raw}'"));
                None
            }
        },
        Some(other) => {
            violations.push(Some(name), field, "a date string", describe(other));
            None
        }
    }
}

fn one_of(variants: &[&str]) -> String {
    format!("one of [{}]", variants.join(", "))
}

fn describe(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "null".to_string(),
        JsonValue::Bool(b) => format!("boolean {b}"),
        JsonValue::Number(n) => format!("number {n}"),
        JsonValue::String(s) => format!("'{s}'"),
        JsonValue::Array(_) => "an array".to_string(),
        JsonValue::Object(_) => "an object".to_string(),
    }
}
