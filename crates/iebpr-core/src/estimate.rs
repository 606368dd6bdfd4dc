//! Population distribution of a per-biomass content across one snapshot.

use crate::snapshot::{SnapshotArray, AGENT_STATE_RECORD_FIELDS, BIOMASS_INDEX, RELA_COUNT_INDEX};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimateError {
    #[error("snapshot must be a 1-d array, got shape {shape:?}")]
    ShapeMismatch { shape: Vec<usize> },

    #[error("snapshot records must have fields {expected:?}, found {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("field '{field}' is not in the snapshot record; choose from: {available}")]
    UnknownField { field: String, available: String },

    #[error("snapshot has no records")]
    EmptySnapshot,

    #[error("record {index} has zero biomass")]
    DivisionByZero { index: usize },

    #[error("relative counts sum to zero")]
    ZeroTotalRelativeCount,
}

/// Paired sequences sorted by `normalized_content` descending.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributionCurve {
    pub population_cumulative_fraction: Vec<f64>,
    pub normalized_content: Vec<f64>,
}

impl DistributionCurve {
    pub fn len(&self) -> usize {
        self.normalized_content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized_content.is_empty()
    }

    /// `(cumulative_fraction, normalized_content)` pairs.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.population_cumulative_fraction
            .iter()
            .copied()
            .zip(self.normalized_content.iter().copied())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionEstimator {
    /// Weight each record by its `rela_count` instead of counting records equally.
    pub use_relative_count: bool,
}

impl Default for DistributionEstimator {
    fn default() -> Self {
        Self {
            use_relative_count: true,
        }
    }
}

impl DistributionEstimator {
    pub fn estimate(
        &self,
        snapshot: &SnapshotArray,
        field: &str,
    ) -> Result<DistributionCurve, EstimateError> {
        if snapshot.ndim() != 1 {
            return Err(EstimateError::ShapeMismatch {
                shape: snapshot.shape().to_vec(),
            });
        }
        if !snapshot
            .fields()
            .iter()
            .map(String::as_str)
            .eq(AGENT_STATE_RECORD_FIELDS)
        {
            return Err(EstimateError::SchemaMismatch {
                expected: AGENT_STATE_RECORD_FIELDS.iter().map(|name| name.to_string()).collect(),
                found: snapshot.fields().to_vec(),
            });
        }
        let content = snapshot
            .field_index(field)
            .ok_or_else(|| EstimateError::UnknownField {
                field: field.to_string(),
                available: AGENT_STATE_RECORD_FIELDS.join(", "),
            })?;
        if snapshot.is_empty() {
            return Err(EstimateError::EmptySnapshot);
        }

        let records: Vec<&[f64]> = snapshot.records().collect();

        let normalized = records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                if record[BIOMASS_INDEX] == 0.0 {
                    Err(EstimateError::DivisionByZero { index })
                } else {
                    Ok(record[content] / record[BIOMASS_INDEX])
                }
            })
            .collect::<Result<Vec<f64>, _>>()?;

        // stable, so ties keep snapshot order
        let mut order: Vec<usize> = (0..records.len()).collect();
        order.sort_by(|&a, &b| normalized[b].total_cmp(&normalized[a]));

        let n = order.len();
        let population_cumulative_fraction = if self.use_relative_count {
            let mut running = 0.0;
            let cumulative: Vec<f64> = order
                .iter()
                .map(|&i| {
                    running += records[i][RELA_COUNT_INDEX];
                    running
                })
                .collect();
            if running == 0.0 {
                return Err(EstimateError::ZeroTotalRelativeCount);
            }
            cumulative.into_iter().map(|c| c / running).collect()
        } else {
            (1..=n).map(|k| k as f64 / n as f64).collect()
        };
        let normalized_content = order.iter().map(|&i| normalized[i]).collect();

        debug!(
            records = n,
            field,
            use_relative_count = self.use_relative_count,
            "estimated population distribution"
        );
        Ok(DistributionCurve {
            population_cumulative_fraction,
            normalized_content,
        })
    }
}

/// Sorted per-biomass `field` content against the cumulative population fraction.
pub fn estimate(
    snapshot: &SnapshotArray,
    field: &str,
    use_relative_count: bool,
) -> Result<DistributionCurve, EstimateError> {
    DistributionEstimator { use_relative_count }.estimate(snapshot, field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::AgentStateRecord;
    use proptest::prelude::*;

    fn polyp_records(biomass: &[f64], polyp: &[f64], rela_count: &[f64]) -> SnapshotArray {
        let records: Vec<_> = biomass
            .iter()
            .zip(polyp)
            .zip(rela_count)
            .map(|((&biomass, &polyp), &rela_count)| AgentStateRecord {
                biomass,
                rela_count,
                polyp,
                ..AgentStateRecord::default()
            })
            .collect();
        SnapshotArray::from_records(&records)
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-3, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn equal_counts_give_even_fractions() {
        let snapshot = polyp_records(&[10.0; 4], &[4.0, 3.0, 2.0, 1.0], &[1.0; 4]);
        let weighted = estimate(&snapshot, "polyp", true).unwrap();
        assert_close(&weighted.normalized_content, &[0.4, 0.3, 0.2, 0.1]);
        assert_eq!(weighted.population_cumulative_fraction, vec![0.25, 0.5, 0.75, 1.0]);

        let unweighted = estimate(&snapshot, "polyp", false).unwrap();
        assert_eq!(unweighted, weighted);
    }

    #[test]
    fn relative_counts_weight_the_fraction() {
        let snapshot = polyp_records(&[10.0; 4], &[4.0, 3.0, 2.0, 1.0], &[3.0, 1.0, 1.0, 1.0]);
        let curve = DistributionEstimator::default().estimate(&snapshot, "polyp").unwrap();
        assert_close(&curve.population_cumulative_fraction, &[0.5, 0.667, 0.833, 1.0]);
        assert_eq!(curve.population_cumulative_fraction[3], 1.0);
    }

    #[test]
    fn sorts_descending_by_normalized_content() {
        let snapshot = polyp_records(&[1.0, 2.0, 4.0], &[0.1, 1.0, 0.4], &[1.0; 3]);
        let curve = estimate(&snapshot, "polyp", true).unwrap();
        assert_close(&curve.normalized_content, &[0.5, 0.1, 0.1]);
        assert_eq!(curve.points().count(), 3);
    }

    #[test]
    fn zero_biomass_names_the_record() {
        let snapshot = polyp_records(&[1.0, 0.0], &[1.0, 1.0], &[1.0, 1.0]);
        let err = estimate(&snapshot, "polyp", true).unwrap_err();
        assert_eq!(err, EstimateError::DivisionByZero { index: 1 });
    }

    #[test]
    fn multidimensional_snapshot_is_rejected() {
        let fields = AGENT_STATE_RECORD_FIELDS.iter().map(|name| name.to_string()).collect();
        let snapshot = SnapshotArray::new(vec![2, 3], fields, vec![1.0; 30]).unwrap();
        let err = estimate(&snapshot, "pha", true).unwrap_err();
        assert_eq!(err, EstimateError::ShapeMismatch { shape: vec![2, 3] });

        let slice = snapshot.select(0).unwrap();
        assert!(estimate(&slice, "pha", true).is_ok());
    }

    #[test]
    fn accepts_recorded_engine_layout() {
        let snapshot = SnapshotArray::from_columns(&[
            ("biomass", &[10.0; 4]),
            ("rela_count", &[1.0; 4]),
            ("glycogen", &[0.0; 4]),
            ("pha", &[0.0; 4]),
            ("polyp", &[4.0, 3.0, 2.0, 1.0]),
        ])
        .unwrap();
        let curve = estimate(&snapshot, "polyp", true).unwrap();
        assert_close(&curve.normalized_content, &[0.4, 0.3, 0.2, 0.1]);
        assert_eq!(curve.population_cumulative_fraction, vec![0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn randomization_state_layout_is_not_a_snapshot() {
        let ones = [1.0];
        let columns: Vec<(&str, &[f64])> = crate::schema::StateField::NAMES
            .iter()
            .map(|&name| (name, &ones[..]))
            .collect();
        let snapshot = SnapshotArray::from_columns(&columns).unwrap();
        let err = estimate(&snapshot, "polyp", true).unwrap_err();
        assert!(matches!(
            err,
            EstimateError::SchemaMismatch { ref expected, ref found }
                if expected == &["biomass", "rela_count", "glycogen", "pha", "polyp"]
                    && found.iter().any(|field| field == "split_biomass")
        ));
    }

    #[test]
    fn foreign_schema_is_rejected() {
        let snapshot = SnapshotArray::from_columns(&[
            ("biomass", &[1.0, 2.0]),
            ("rela_count", &[1.0, 1.0]),
            ("polyp", &[0.5, 0.5]),
        ])
        .unwrap();
        let err = estimate(&snapshot, "polyp", true).unwrap_err();
        assert!(matches!(err, EstimateError::SchemaMismatch { ref found, .. } if found.len() == 3));
    }

    #[test]
    fn unknown_field_and_empty_snapshot() {
        let snapshot = polyp_records(&[1.0], &[1.0], &[1.0]);
        let err = estimate(&snapshot, "nitrate", true).unwrap_err();
        assert!(matches!(err, EstimateError::UnknownField { ref field, .. } if field == "nitrate"));

        let empty = SnapshotArray::from_records(&[]);
        assert_eq!(estimate(&empty, "polyp", true), Err(EstimateError::EmptySnapshot));
    }

    #[test]
    fn zero_relative_counts_are_rejected_only_when_weighting() {
        let snapshot = polyp_records(&[1.0, 1.0], &[1.0, 2.0], &[0.0, 0.0]);
        assert_eq!(
            estimate(&snapshot, "polyp", true),
            Err(EstimateError::ZeroTotalRelativeCount)
        );
        let curve = estimate(&snapshot, "polyp", false).unwrap();
        assert_eq!(curve.population_cumulative_fraction, vec![0.5, 1.0]);
    }

    proptest! {
        #[test]
        fn proptest_curve_is_monotone_and_ends_at_one(
            rows in proptest::collection::vec((0.1f64..100.0, 0.0f64..50.0, 0.01f64..10.0), 1..64),
            use_relative_count in any::<bool>(),
        ) {
            let biomass: Vec<f64> = rows.iter().map(|r| r.0).collect();
            let content: Vec<f64> = rows.iter().map(|r| r.1).collect();
            let counts: Vec<f64> = rows.iter().map(|r| r.2).collect();
            let snapshot = polyp_records(&biomass, &content, &counts);
            let curve = estimate(&snapshot, "polyp", use_relative_count).unwrap();

            prop_assert_eq!(curve.len(), rows.len());
            prop_assert_eq!(curve.population_cumulative_fraction.last().copied(), Some(1.0));
            for pair in curve.population_cumulative_fraction.windows(2) {
                prop_assert!(pair[0] <= pair[1]);
            }
            for pair in curve.normalized_content.windows(2) {
                prop_assert!(pair[0] >= pair[1]);
            }
        }
    }
}
