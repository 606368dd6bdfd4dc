//! Per-agent snapshot records as emitted by the engine.
//!
//! The engine records snapshots as a structured array indexed by subtype, then snapshot
//! timepoint, then agent. [`SnapshotArray`] keeps that shape together with the record field
//! names so a single-subtype, single-timepoint slice can be taken with [`SnapshotArray::select`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnapshotError {
    #[error("snapshot record must have at least one field")]
    NoFields,

    #[error("snapshot has {actual} values but shape {shape:?} with {n_fields} fields needs {expected}")]
    DataLength {
        shape: Vec<usize>,
        n_fields: usize,
        expected: usize,
        actual: usize,
    },

    #[error("index {index} is out of bounds for axis 0 of shape {shape:?}")]
    AxisIndex { index: usize, shape: Vec<usize> },

    #[error("column '{field}' has {actual} values, expected {expected}")]
    ColumnLength {
        field: String,
        expected: usize,
        actual: usize,
    },
}

/// Field layout of the agent-state records the engine writes at each snapshot.
///
/// Unlike the state randomization schema this has no `split_biomass`; the split threshold is
/// not recorded.
pub const AGENT_STATE_RECORD_FIELDS: [&str; 5] = ["biomass", "rela_count", "glycogen", "pha", "polyp"];

pub(crate) const BIOMASS_INDEX: usize = 0;
pub(crate) const RELA_COUNT_INDEX: usize = 1;

/// One agent's state at a snapshot timepoint. Contents are absolute amounts, not per biomass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStateRecord {
    pub biomass: f64,
    pub rela_count: f64,
    pub glycogen: f64,
    pub pha: f64,
    pub polyp: f64,
}

impl AgentStateRecord {
    /// Values in [`AGENT_STATE_RECORD_FIELDS`] order.
    pub fn values(&self) -> [f64; 5] {
        [self.biomass, self.rela_count, self.glycogen, self.pha, self.polyp]
    }
}

#[derive(Deserialize)]
struct RawSnapshot {
    shape: Vec<usize>,
    fields: Vec<String>,
    values: Vec<f64>,
}

impl TryFrom<RawSnapshot> for SnapshotArray {
    type Error = SnapshotError;

    fn try_from(raw: RawSnapshot) -> Result<Self, Self::Error> {
        Self::new(raw.shape, raw.fields, raw.values)
    }
}

/// Row-major array of fixed-schema records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSnapshot")]
pub struct SnapshotArray {
    shape: Vec<usize>,
    fields: Vec<String>,
    values: Vec<f64>,
}

impl SnapshotArray {
    pub fn new(shape: Vec<usize>, fields: Vec<String>, values: Vec<f64>) -> Result<Self, SnapshotError> {
        if fields.is_empty() {
            return Err(SnapshotError::NoFields);
        }
        let expected = shape.iter().product::<usize>() * fields.len();
        if values.len() != expected {
            return Err(SnapshotError::DataLength {
                n_fields: fields.len(),
                shape,
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            shape,
            fields,
            values,
        })
    }

    /// One-dimensional snapshot in the [`AGENT_STATE_RECORD_FIELDS`] layout.
    pub fn from_records(records: &[AgentStateRecord]) -> Self {
        Self {
            shape: vec![records.len()],
            fields: AGENT_STATE_RECORD_FIELDS.iter().map(|name| name.to_string()).collect(),
            values: records.iter().flat_map(|record| record.values()).collect(),
        }
    }

    /// One-dimensional snapshot from equal-length columns, fields in the given order.
    pub fn from_columns(columns: &[(&str, &[f64])]) -> Result<Self, SnapshotError> {
        let Some((_, first)) = columns.first() else {
            return Err(SnapshotError::NoFields);
        };
        let n = first.len();
        if let Some((field, column)) = columns.iter().find(|(_, column)| column.len() != n) {
            return Err(SnapshotError::ColumnLength {
                field: field.to_string(),
                expected: n,
                actual: column.len(),
            });
        }
        let values = (0..n)
            .flat_map(|i| columns.iter().map(move |(_, column)| column[i]))
            .collect();
        Ok(Self {
            shape: vec![n],
            fields: columns.iter().map(|(field, _)| field.to_string()).collect(),
            values,
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field == name)
    }

    /// Total number of records across all axes.
    pub fn len(&self) -> usize {
        self.values.len() / self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Records in row-major order.
    pub fn records(&self) -> impl ExactSizeIterator<Item = &[f64]> {
        self.values.chunks_exact(self.fields.len())
    }

    /// Values of one field across all records, or `None` if the field is not in the schema.
    pub fn field_values(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.field_index(name)?;
        Some(self.records().map(|record| record[index]).collect())
    }

    /// Index the leading axis, dropping one dimension.
    pub fn select(&self, index: usize) -> Result<Self, SnapshotError> {
        let out_of_bounds = || SnapshotError::AxisIndex {
            index,
            shape: self.shape.clone(),
        };
        let (&leading, rest) = self.shape.split_first().ok_or_else(out_of_bounds)?;
        if index >= leading {
            return Err(out_of_bounds());
        }
        let block = rest.iter().product::<usize>() * self.fields.len();
        Ok(Self {
            shape: rest.to_vec(),
            fields: self.fields.clone(),
            values: self.values[index * block..(index + 1) * block].to_vec(),
        })
    }
}
