//! Schema model and JSON persistence.
//!
//! This module owns the two documents produced by inference:
//!
//! - [`SchemaDocument`] (`parameters.json`): per column, the [`Dtype`], the
//!   [`ColumnKind`], and either the categorical value list or min/max bounds.
//! - [`DatatypeDocument`] (`column_datatypes.json`): the dtype of each column
//!   only, in header order.
//!
//! Both documents keep columns in header order through [`IndexMap`]. Loading
//! a document from disk always runs the validator first, so a hand-edited file
//! is reported with every violation (duplicate column names included) rather
//! than the first serde error.

use std::{
    fmt, fs,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    str::FromStr,
};

use anyhow::{Context, Result, anyhow};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    data::Value,
    error::SchemaError,
    validate::{DocumentKind, RawDocument, validate_raw},
};

pub const PARAMETERS_FILE_NAME: &str = "parameters.json";
pub const DATATYPES_FILE_NAME: &str = "column_datatypes.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float,
    Str,
    Date,
}

const UNSIGNED_WIDTHS: &[Dtype] = &[Dtype::UInt8, Dtype::UInt16, Dtype::UInt32, Dtype::UInt64];
const SIGNED_WIDTHS: &[Dtype] = &[Dtype::Int8, Dtype::Int16, Dtype::Int32, Dtype::Int64];

impl Dtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dtype::Int8 => "int8",
            Dtype::Int16 => "int16",
            Dtype::Int32 => "int32",
            Dtype::Int64 => "int64",
            Dtype::UInt8 => "uint8",
            Dtype::UInt16 => "uint16",
            Dtype::UInt32 => "uint32",
            Dtype::UInt64 => "uint64",
            Dtype::Float => "float",
            Dtype::Str => "str",
            Dtype::Date => "date",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &[
            "int8", "int16", "int32", "int64", "uint8", "uint16", "uint32", "uint64", "float",
            "str", "date",
        ]
    }

    pub fn is_integer(&self) -> bool {
        self.integer_range().is_some()
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, Dtype::Float)
    }

    /// Inclusive range representable by an integer dtype.
    pub fn integer_range(&self) -> Option<(i128, i128)> {
        let range = match self {
            Dtype::Int8 => (i8::MIN.into(), i8::MAX.into()),
            Dtype::Int16 => (i16::MIN.into(), i16::MAX.into()),
            Dtype::Int32 => (i32::MIN.into(), i32::MAX.into()),
            Dtype::Int64 => (i64::MIN.into(), i64::MAX.into()),
            Dtype::UInt8 => (0, u8::MAX.into()),
            Dtype::UInt16 => (0, u16::MAX.into()),
            Dtype::UInt32 => (0, u32::MAX.into()),
            Dtype::UInt64 => (0, u64::MAX.into()),
            _ => return None,
        };
        Some(range)
    }

    /// Narrowest integer dtype covering `[min, max]`: unsigned when nothing is
    /// negative, signed otherwise. `None` when no 64-bit type is wide enough.
    pub fn smallest_integer(min: i128, max: i128) -> Option<Dtype> {
        let candidates = if min >= 0 {
            UNSIGNED_WIDTHS
        } else {
            SIGNED_WIDTHS
        };
        candidates.iter().copied().find(|dtype| {
            dtype
                .integer_range()
                .is_some_and(|(low, high)| low <= min && max <= high)
        })
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dtype {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "int8" => Ok(Dtype::Int8),
            "int16" => Ok(Dtype::Int16),
            "int32" => Ok(Dtype::Int32),
            "int64" => Ok(Dtype::Int64),
            "uint8" => Ok(Dtype::UInt8),
            "uint16" => Ok(Dtype::UInt16),
            "uint32" => Ok(Dtype::UInt32),
            "uint64" => Ok(Dtype::UInt64),
            "float" => Ok(Dtype::Float),
            "str" => Ok(Dtype::Str),
            "date" => Ok(Dtype::Date),
            other => Err(anyhow!(
                "Unknown dtype '{other}'. Supported dtypes: {}",
                Dtype::variants().join(", ")
            )),
        }
    }
}

/// Semantic role of a column together with the data that role records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ColumnKind {
    Id,
    Categorical { values: Vec<Value> },
    Numeric { min: Value, max: Value },
    Date { min: String, max: String },
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Id => "id",
            ColumnKind::Categorical { .. } => "categorical",
            ColumnKind::Numeric { .. } => "numeric",
            ColumnKind::Date { .. } => "date",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["id", "categorical", "numeric", "date"]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub dtype: Dtype,
    #[serde(flatten)]
    pub kind: ColumnKind,
}

impl ColumnSchema {
    pub fn values(&self) -> Option<&[Value]> {
        match &self.kind {
            ColumnKind::Categorical { values } => Some(values),
            _ => None,
        }
    }
}

/// Full per-column schema, persisted as `parameters.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    pub schema: IndexMap<String, ColumnSchema>,
}

impl SchemaDocument {
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.schema.get(name)
    }

    /// Projects the dtype of every column, preserving column order.
    pub fn datatypes(&self) -> DatatypeDocument {
        DatatypeDocument {
            dtype: self
                .schema
                .iter()
                .map(|(name, column)| (name.clone(), column.dtype))
                .collect(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        read_document(path, DocumentKind::Schema)
    }
}

/// Dtype-only projection, persisted as `column_datatypes.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatatypeDocument {
    pub dtype: IndexMap<String, Dtype>,
}

impl DatatypeDocument {
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }

    pub fn load(path: &Path) -> Result<Self> {
        read_document(path, DocumentKind::Datatype)
    }
}

fn write_json<T: Serialize>(path: &Path, document: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Creating output file {path:?}"))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, document).context("Writing JSON document")?;
    writer.write_all(b"\n")?;
    writer.flush().context("Flushing JSON document")
}

/// Reads a document without interpreting it, keeping track of repeated keys.
pub fn read_raw(path: &Path, kind: DocumentKind) -> Result<RawDocument> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Opening {kind} file {path:?}"))?;
    RawDocument::parse(&text).with_context(|| format!("Parsing JSON from {path:?}"))
}

/// Parses a JSON file, validates it, then deserializes the typed document.
pub fn read_document<T>(path: &Path, kind: DocumentKind) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let raw = read_raw(path, kind)?;
    let violations = validate_raw(&raw, kind);
    if !violations.is_empty() {
        return Err(SchemaError::InvalidDocument { kind, violations })
            .with_context(|| format!("Validating {path:?}"));
    }
    serde_json::from_value(raw.value)
        .with_context(|| format!("Decoding {kind} document {path:?}"))
}
