//! Tabular normalization of place and route records.
//!
//! Backends never see domain objects: they receive a [`Table`] of places and a
//! [`Table`] of routes and hand back rows that are turned into records again.
//! The table shape (`fields` + `values`) is the same one the remote
//! optimization service uses for its datasets, so a table serializes directly
//! into a job payload.

pub mod checksum;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{Place, Record};

pub use checksum::row_fingerprint;

/// Errors raised while building a table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// A record's key set differs from the first record's.
    #[error("record {row} does not match the table schema (missing: [{}], extra: [{}])", .missing.join(", "), .extra.join(", "))]
    SchemaMismatch {
        row: usize,
        missing: Vec<String>,
        extra: Vec<String>,
    },

    /// A row has a different number of cells than there are fields.
    #[error("row {row} has {found} cells, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// An ordered, rectangular table with named columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    fields: Vec<String>,
    values: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table from a field list and rows, checking that every row is as
    /// wide as the field list.
    pub fn from_parts(fields: Vec<String>, values: Vec<Vec<Value>>) -> Result<Self, TableError> {
        if let Some((row, cells)) = values
            .iter()
            .enumerate()
            .find(|(_, cells)| cells.len() != fields.len())
        {
            return Err(TableError::RowWidth {
                row,
                expected: fields.len(),
                found: cells.len(),
            });
        }

        Ok(Self { fields, values })
    }

    /// Build a table from records.
    ///
    /// Columns follow the key order of the first record. Every later record
    /// must carry exactly the same keys, in any order.
    pub fn from_records(records: &[Record]) -> Result<Self, TableError> {
        let Some(first) = records.first() else {
            return Ok(Self::default());
        };

        let fields: Vec<String> = first.keys().cloned().collect();
        let mut values = Vec::with_capacity(records.len());

        for (row, record) in records.iter().enumerate() {
            let missing: Vec<String> = fields
                .iter()
                .filter(|f| !record.contains_key(f.as_str()))
                .cloned()
                .collect();
            let extra: Vec<String> = record
                .keys()
                .filter(|k| !first.contains_key(k.as_str()))
                .cloned()
                .collect();

            if !missing.is_empty() || !extra.is_empty() {
                return Err(TableError::SchemaMismatch {
                    row,
                    missing,
                    extra,
                });
            }

            values.push(fields.iter().map(|f| record[f.as_str()].clone()).collect());
        }

        Ok(Self { fields, values })
    }

    /// Build a table from places through their dict serialization.
    pub fn from_places(places: &[Place]) -> Result<Self, TableError> {
        let records: Vec<Record> = places.iter().map(Place::to_dict).collect();
        Self::from_records(&records)
    }

    /// Remove rows that are equal to a later row.
    ///
    /// The surviving copy of a duplicated row is its last occurrence, and the
    /// relative order of surviving rows is unchanged.
    pub fn dedup_keep_last(&mut self) {
        let mut seen = HashSet::with_capacity(self.values.len());
        let mut keep = vec![false; self.values.len()];

        for (idx, row) in self.values.iter().enumerate().rev() {
            keep[idx] = seen.insert(row_fingerprint(row));
        }

        let mut flags = keep.into_iter();
        self.values.retain(|_| flags.next().unwrap_or(false));
    }

    /// Rebuild records by zipping the fields with each row.
    pub fn to_records(&self) -> Vec<Record> {
        self.values
            .iter()
            .map(|row| {
                self.fields
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect::<Record>()
            })
            .collect()
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.values
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of `field` in row `row`.
    pub fn cell(&self, row: usize, field: &str) -> Option<&Value> {
        let col = self.fields.iter().position(|f| f == field)?;
        self.values.get(row)?.get(col)
    }
}

/// Normalize the facade inputs into the two tables handed to a backend.
///
/// The routes table is deduplicated, keeping the last occurrence of repeated
/// rows.
pub fn normalize_inputs(places: &[Place], routes: &[Record]) -> Result<(Table, Table), TableError> {
    let places_table = Table::from_places(places)?;
    let mut routes_table = Table::from_records(routes)?;
    routes_table.dedup_keep_last();
    Ok((places_table, routes_table))
}
