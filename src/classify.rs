//! Per-column datatype detection and kind classification.
//!
//! Detection runs an ordered cascade of parse strategies (integer, float,
//! date) over the non-missing cells of one column. A strategy either accepts
//! every cell or reports the first cell it could not parse, in which case the
//! next, broader strategy is tried. `str` accepts anything and ends the
//! cascade. Classification then applies the cardinality threshold from
//! [`InferenceOptions`] to pick the column's [`ColumnKind`].

use chrono::NaiveDateTime;
use itertools::{Itertools, MinMaxResult};
use log::debug;
use thiserror::Error;

use crate::{
    builder::InferenceOptions,
    data::{Value, is_missing_marker, parse_naive_datetime},
    schema::{ColumnKind, ColumnSchema, Dtype},
};

#[derive(Debug, Error)]
#[error("'{value}' cannot be represented as {level}")]
struct UnparseableValue {
    level: &'static str,
    value: String,
}

impl UnparseableValue {
    fn new(level: &'static str, value: impl Into<String>) -> Self {
        Self {
            level,
            value: value.into(),
        }
    }
}

/// Non-missing cells of a column after a successful parse level.
#[derive(Debug, Clone, PartialEq)]
enum TypedColumn {
    Integer { dtype: Dtype, values: Vec<i128> },
    Float(Vec<f64>),
    Date(Vec<NaiveDateTime>),
    Text(Vec<String>),
}

impl TypedColumn {
    fn dtype(&self) -> Dtype {
        match self {
            TypedColumn::Integer { dtype, .. } => *dtype,
            TypedColumn::Float(_) => Dtype::Float,
            TypedColumn::Date(_) => Dtype::Date,
            TypedColumn::Text(_) => Dtype::Str,
        }
    }

    /// Distinct values in the natural order of the parsed type.
    fn into_distinct(self) -> Vec<Value> {
        match self {
            TypedColumn::Integer { values, .. } => values
                .into_iter()
                .sorted_unstable()
                .dedup()
                .map(Value::Integer)
                .collect(),
            // -0.0 and 0.0 are one value; keep the unsigned spelling.
            TypedColumn::Float(values) => values
                .into_iter()
                .map(|value| if value == 0.0 { 0.0 } else { value })
                .sorted_unstable_by(f64::total_cmp)
                .dedup()
                .map(Value::Float)
                .collect(),
            TypedColumn::Date(values) => values
                .into_iter()
                .sorted_unstable()
                .dedup()
                .map(Value::Date)
                .collect(),
            TypedColumn::Text(values) => values
                .into_iter()
                .sorted_unstable()
                .dedup()
                .map(Value::String)
                .collect(),
        }
    }
}

type ParseStrategy = fn(&[&str]) -> Result<TypedColumn, UnparseableValue>;

const CASCADE: &[(&str, ParseStrategy)] = &[
    ("integer", parse_integers),
    ("float", parse_floats),
    ("date", parse_dates),
];

fn parse_integers(cells: &[&str]) -> Result<TypedColumn, UnparseableValue> {
    let values = cells
        .iter()
        .map(|cell| {
            cell.parse::<i128>()
                .map_err(|_| UnparseableValue::new("integer", *cell))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let (min, max) = match values.iter().copied().minmax() {
        MinMaxResult::NoElements => return Err(UnparseableValue::new("integer", "")),
        MinMaxResult::OneElement(value) => (value, value),
        MinMaxResult::MinMax(min, max) => (min, max),
    };
    let dtype = Dtype::smallest_integer(min, max).ok_or_else(|| {
        UnparseableValue::new("a 64-bit integer", format!("range {min}..={max}"))
    })?;
    Ok(TypedColumn::Integer { dtype, values })
}

fn parse_floats(cells: &[&str]) -> Result<TypedColumn, UnparseableValue> {
    cells
        .iter()
        .map(|cell| match cell.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(UnparseableValue::new("float", *cell)),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(TypedColumn::Float)
}

fn parse_dates(cells: &[&str]) -> Result<TypedColumn, UnparseableValue> {
    cells
        .iter()
        .map(|cell| parse_naive_datetime(cell).map_err(|_| UnparseableValue::new("date", *cell)))
        .collect::<Result<Vec<_>, _>>()
        .map(TypedColumn::Date)
}

fn detect(present: &[&str]) -> TypedColumn {
    if present.is_empty() {
        return TypedColumn::Text(Vec::new());
    }
    for (level, strategy) in CASCADE {
        match strategy(present) {
            Ok(typed) => return typed,
            Err(err) => debug!("Rejected {level} level: {err}"),
        }
    }
    TypedColumn::Text(present.iter().map(|cell| cell.to_string()).collect())
}

/// What one pass over a column observed, before the kind policy applies.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProfile {
    pub dtype: Dtype,
    /// Distinct non-missing values, sorted.
    pub distinct: Vec<Value>,
    pub present: usize,
    pub missing: usize,
}

impl ColumnProfile {
    pub fn cardinality(&self) -> usize {
        self.distinct.len()
    }
}

/// Detects the narrowest dtype of a column and gathers its distinct values.
pub fn profile_column<'a, I>(cells: I) -> ColumnProfile
where
    I: IntoIterator<Item = &'a str>,
{
    let mut missing = 0usize;
    let present: Vec<&str> = cells
        .into_iter()
        .filter_map(|cell| {
            if is_missing_marker(cell) {
                missing += 1;
                None
            } else {
                Some(cell.trim())
            }
        })
        .collect();
    let typed = detect(&present);
    ColumnProfile {
        dtype: typed.dtype(),
        distinct: typed.into_distinct(),
        present: present.len(),
        missing,
    }
}

/// Applies the kind policy to a profiled column.
pub fn classify_profile(profile: ColumnProfile, options: &InferenceOptions) -> ColumnSchema {
    let ColumnProfile {
        dtype,
        distinct,
        missing,
        ..
    } = profile;
    let bounds = distinct.first().cloned().zip(distinct.last().cloned());
    let kind = match bounds {
        Some((min, max)) if dtype == Dtype::Date => ColumnKind::Date {
            min: min.as_display(),
            max: max.as_display(),
        },
        Some((min, max)) if dtype.is_numeric() && distinct.len() > options.max_categorical => {
            ColumnKind::Numeric { min, max }
        }
        _ if distinct.len() <= options.max_categorical => {
            let mut values = distinct;
            if options.include_na && missing > 0 {
                values.push(Value::Missing);
            }
            ColumnKind::Categorical { values }
        }
        _ => ColumnKind::Id,
    };
    ColumnSchema { dtype, kind }
}

/// Classifies one column from its raw cells.
pub fn classify_column<'a, I>(cells: I, options: &InferenceOptions) -> ColumnSchema
where
    I: IntoIterator<Item = &'a str>,
{
    classify_profile(profile_column(cells), options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(max_categorical: usize) -> InferenceOptions {
        InferenceOptions {
            max_categorical,
            ..InferenceOptions::default()
        }
    }

    #[test]
    fn cascade_stops_at_first_accepting_level() {
        assert_eq!(detect(&["1", "2", "-3"]).dtype(), Dtype::Int8);
        assert_eq!(detect(&["1", "2.5"]).dtype(), Dtype::Float);
        assert_eq!(detect(&["2021-01-05", "06/22/2021"]).dtype(), Dtype::Date);
        assert_eq!(detect(&["2021-01-05", "soon"]).dtype(), Dtype::Str);
        assert_eq!(detect(&[]).dtype(), Dtype::Str);
    }

    #[test]
    fn integers_outside_64_bits_fall_back_to_float() {
        let typed = detect(&["-1", "18446744073709551615"]);
        assert_eq!(typed.dtype(), Dtype::Float);
        let typed = detect(&["0", "18446744073709551615"]);
        assert_eq!(typed.dtype(), Dtype::UInt64);
    }

    #[test]
    fn non_finite_floats_are_text() {
        assert_eq!(detect(&["1.5", "inf"]).dtype(), Dtype::Str);
    }

    #[test]
    fn distinct_values_are_compared_after_parsing() {
        let profile = profile_column(["1", "01", " 1 ", "2"]);
        assert_eq!(profile.dtype, Dtype::UInt8);
        assert_eq!(
            profile.distinct,
            vec![Value::Integer(1), Value::Integer(2)]
        );
    }

    #[test]
    fn signed_zero_is_one_distinct_float() {
        let profile = profile_column(["-0.0", "0", "0.0", "1.5"]);
        assert_eq!(profile.dtype, Dtype::Float);
        assert_eq!(
            profile.distinct,
            vec![Value::Float(0.0), Value::Float(1.5)]
        );
        let rendered = serde_json::to_string(&profile.distinct).unwrap();
        assert_eq!(rendered, "[0.0,1.5]");
    }

    #[test]
    fn profile_counts_missing_cells() {
        let profile = profile_column(["a", "", "NA", "b", "  "]);
        assert_eq!(profile.present, 2);
        assert_eq!(profile.missing, 3);
        assert_eq!(profile.cardinality(), 2);
    }

    #[test]
    fn date_columns_carry_canonical_bounds() {
        let column = classify_column(["2021-02-25", "2021-01-05", "2021-06-22"], &options(25));
        assert_eq!(column.dtype, Dtype::Date);
        assert_eq!(
            column.kind,
            ColumnKind::Date {
                min: "2021-01-05 00:00:00".to_string(),
                max: "2021-06-22 00:00:00".to_string(),
            }
        );
    }

    #[test]
    fn float_columns_become_numeric_above_threshold() {
        let column = classify_column(["0.1", "0.15", "0.2", "0.214", "0.25"], &options(3));
        assert_eq!(column.dtype, Dtype::Float);
        assert_eq!(
            column.kind,
            ColumnKind::Numeric {
                min: Value::Float(0.1),
                max: Value::Float(0.25),
            }
        );
    }

    #[test]
    fn text_columns_above_threshold_are_ids() {
        let column = classify_column(["a", "b", "c", "d"], &options(3));
        assert_eq!(column.dtype, Dtype::Str);
        assert_eq!(column.kind, ColumnKind::Id);
    }
}
