use std::collections::HashSet;

use log::warn;

use crate::error::SchemaError;

/// Tabular input: a header and rows of raw cells aligned to it by position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Dataset {
    /// Builds a dataset, renaming repeated header names to `name.1`,
    /// `name.2`, ... so every column stays addressable by name.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            headers: disambiguate_headers(headers),
            rows,
        }
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Fails on the first row whose width differs from the header.
    pub fn check_shape(&self) -> Result<(), SchemaError> {
        let expected = self.headers.len();
        match self
            .rows
            .iter()
            .position(|row| row.len() != expected)
        {
            Some(idx) => Err(SchemaError::MalformedInput {
                row: idx + 1,
                expected,
                found: self.rows[idx].len(),
            }),
            None => Ok(()),
        }
    }

    /// Cells of column `index` across all rows; rows too short yield nothing.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .filter_map(move |row| row.get(index).map(String::as_str))
    }
}

fn disambiguate_headers(headers: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(headers.len());
    let mut result = Vec::with_capacity(headers.len());
    for header in headers {
        if taken.insert(header.clone()) {
            result.push(header);
            continue;
        }
        let mut suffix = 1usize;
        let renamed = loop {
            let candidate = format!("{header}.{suffix}");
            if !taken.contains(&candidate) {
                break candidate;
            }
            suffix += 1;
        };
        warn!("Duplicate column '{header}' renamed to '{renamed}'");
        taken.insert(renamed.clone());
        result.push(renamed);
    }
    result
}
