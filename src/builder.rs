use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::{
    classify::{classify_profile, profile_column},
    dataset::Dataset,
    error::SchemaError,
    schema::{ColumnKind, DatatypeDocument, SchemaDocument},
};

pub const DEFAULT_MAX_CATEGORICAL: usize = 25;
pub const DEFAULT_INCLUDE_NA: bool = false;

/// Knobs for schema inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceOptions {
    /// Columns with at most this many distinct values are categorical
    /// (date columns excepted).
    pub max_categorical: usize,
    /// Append a `null` sentinel to categorical values when cells are missing.
    pub include_na: bool,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            max_categorical: DEFAULT_MAX_CATEGORICAL,
            include_na: DEFAULT_INCLUDE_NA,
        }
    }
}

/// Infers the schema of every column in header order.
///
/// The dataset shape is checked before any column is classified, so a ragged
/// row fails the whole build and no partial documents are returned.
pub fn build_schema(
    dataset: &Dataset,
    options: &InferenceOptions,
) -> Result<(SchemaDocument, DatatypeDocument), SchemaError> {
    if options.max_categorical == 0 {
        return Err(SchemaError::InvalidThreshold);
    }
    dataset.check_shape()?;

    if options.include_na {
        info!("Building schema for {} column(s)", dataset.column_count());
    } else {
        info!(
            "Building schema for {} column(s) without missing-value categories",
            dataset.column_count()
        );
    }

    let mut columns = IndexMap::with_capacity(dataset.column_count());
    for (idx, name) in dataset.headers.iter().enumerate() {
        let profile = profile_column(dataset.column(idx));
        debug!(
            "Column '{}': dtype {} with {} distinct of {} present value(s), {} missing",
            name,
            profile.dtype,
            profile.cardinality(),
            profile.present,
            profile.missing
        );
        let column = classify_profile(profile, options);
        if column.kind == ColumnKind::Id {
            warn!(
                "Not recording values for column '{}': it is non-numeric with more than {} distinct values, so it is treated as an id",
                name, options.max_categorical
            );
        }
        columns.insert(name.clone(), column);
    }

    let schema = SchemaDocument { schema: columns };
    let datatypes = schema.datatypes();
    info!("Schema building successful");
    Ok((schema, datatypes))
}
