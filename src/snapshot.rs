//! Frame snapshots: the per-frame set of tracked points.
//!
//! A [`FrameSnapshot`] owns its points, the declared field schema, and the
//! counter used to mint identities for newly appeared points. Folding the next
//! frame's observations into a running snapshot is [`FrameSnapshot::update`].

use nalgebra::DVector;
use tracing::{debug, warn};

use crate::distances::distance_matrix;
use crate::matching::{match_points, MatchOutcome};
use crate::table::Table;
use crate::{Error, Result};

/// Declared feature and auxiliary fields, plus per-feature match weights.
///
/// The field set and weight vector are fixed for the lifetime of a tracking
/// segment; snapshots with different schemas cannot be compared or merged.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    /// Ordered fields used in distance computation (e.g. "x", "y").
    pub feature_fields: Vec<String>,
    /// Ordered fields carried along but never matched on (e.g. diameter).
    pub aux_fields: Vec<String>,
    /// One non-negative weight per feature field.
    pub weights: DVector<f64>,
}

impl Schema {
    /// Create a schema with unit weights.
    pub fn new(feature_fields: &[&str], aux_fields: &[&str]) -> Self {
        Self {
            weights: DVector::from_element(feature_fields.len(), 1.0),
            feature_fields: feature_fields.iter().map(|f| f.to_string()).collect(),
            aux_fields: aux_fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Replace the unit weights, one per feature field.
    pub fn with_weights(mut self, weights: &[f64]) -> Result<Self> {
        if weights.len() != self.feature_fields.len() {
            return Err(Error::Configuration(format!(
                "expected {} weights, got {}",
                self.feature_fields.len(),
                weights.len()
            )));
        }
        if weights.iter().any(|&w| !w.is_finite() || w < 0.0) {
            return Err(Error::Configuration(
                "weights must be finite and non-negative".to_string(),
            ));
        }
        self.weights = DVector::from_row_slice(weights);
        Ok(self)
    }
}

/// Lifecycle state of a tracked point within the running snapshot.
///
/// A point that finds no successor in one update is carried forward as
/// `PendingLoss` and may still be matched in the following update. A second
/// consecutive miss drops it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointState {
    Active,
    PendingLoss,
}

/// One detected blob in one frame.
#[derive(Debug, Clone)]
pub struct TrackedPoint {
    /// Persistent identity, assigned once and carried across frames.
    pub name: i64,
    /// Frame key (time or image index) this observation belongs to.
    pub frame: f64,
    /// Feature vector used for matching, in schema order.
    pub features: DVector<f64>,
    /// Auxiliary values carried along, in schema order.
    pub aux: Vec<f64>,
    /// Back-reference into the caller's table, used to write results back.
    pub origin_index: usize,
    /// Loss grace-period state.
    pub state: PointState,
}

/// All points observed at one frame key, plus matching state.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    schema: Schema,
    points: Vec<TrackedPoint>,
    next_name: i64,
}

impl FrameSnapshot {
    /// Build a snapshot from the given table rows, which must share one frame
    /// key. Identities `first_name, first_name + 1, ...` are assigned in row
    /// order.
    ///
    /// Fails if `first_name` is negative or any declared field is absent from
    /// the table.
    pub fn from_table(
        table: &Table,
        rows: &[usize],
        schema: Schema,
        frame_field: &str,
        first_name: i64,
    ) -> Result<Self> {
        if first_name < 0 {
            return Err(Error::Configuration(format!(
                "starting identity must be non-negative, got {first_name}"
            )));
        }

        let frame_col = table
            .column_index(frame_field)
            .ok_or_else(|| Error::MissingField {
                field: frame_field.to_string(),
            })?;
        let feature_cols = column_indices(table, &schema.feature_fields)?;
        let aux_cols = column_indices(table, &schema.aux_fields)?;

        let points = rows
            .iter()
            .enumerate()
            .map(|(i, &row)| {
                let values = table.row(row);
                TrackedPoint {
                    name: first_name + i as i64,
                    frame: values[frame_col],
                    features: DVector::from_iterator(
                        feature_cols.len(),
                        feature_cols.iter().map(|&c| values[c]),
                    ),
                    aux: aux_cols.iter().map(|&c| values[c]).collect(),
                    origin_index: row,
                    state: PointState::Active,
                }
            })
            .collect::<Vec<_>>();

        let next_name = first_name + points.len() as i64;
        Ok(Self {
            schema,
            points,
            next_name,
        })
    }

    /// The points in this snapshot.
    pub fn points(&self) -> &[TrackedPoint] {
        &self.points
    }

    /// The declared field schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The identity the next newly discovered point will receive.
    pub fn next_name(&self) -> i64 {
        self.next_name
    }

    /// Number of points currently tracked.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether this snapshot tracks no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Fold a newly observed snapshot into this running snapshot.
    ///
    /// Matched points inherit the old identity and take every other field
    /// from the new observation. Unmatched new points are minted fresh
    /// identities. Unmatched old points are carried forward once as
    /// [`PointState::PendingLoss`]; a second consecutive miss drops them.
    ///
    /// Fails if the two snapshots declare different field sets.
    pub fn update(&mut self, incoming: FrameSnapshot) -> Result<MatchOutcome> {
        if self.schema != incoming.schema {
            return Err(Error::FieldMismatch {
                expected: self.schema.feature_fields.clone(),
                got: incoming.schema.feature_fields.clone(),
            });
        }

        let distances = distance_matrix(self, &incoming)?;
        let outcome = match_points(&distances);

        let old_points = std::mem::take(&mut self.points);
        let mut incoming_points: Vec<Option<TrackedPoint>> =
            incoming.points.into_iter().map(Some).collect();

        let mut row_to_col = vec![None; old_points.len()];
        for &(row, col) in &outcome.matched {
            row_to_col[row] = Some(col);
        }

        // Matched old rows are replaced in place by their new observation;
        // the merged set is a fresh collection either way.
        let mut merged = Vec::with_capacity(old_points.len() + outcome.new_points.len());
        for (row, old) in old_points.into_iter().enumerate() {
            match row_to_col[row] {
                Some(col) => {
                    let mut point = incoming_points[col]
                        .take()
                        .expect("matcher claims each column at most once");
                    point.name = old.name;
                    point.state = PointState::Active;
                    merged.push(point);
                }
                None => match old.state {
                    PointState::Active => {
                        let mut stale = old;
                        stale.state = PointState::PendingLoss;
                        merged.push(stale);
                    }
                    PointState::PendingLoss => {
                        warn!(
                            name = old.name,
                            frame = old.frame,
                            "point missed twice in a row, dropping track"
                        );
                    }
                },
            }
        }

        // New points get fresh names in ascending column order, so identities
        // stay strictly increasing by first appearance.
        for &col in &outcome.new_points {
            let mut point = incoming_points[col]
                .take()
                .expect("new columns are disjoint from matched columns");
            point.name = self.next_name;
            self.next_name += 1;
            point.state = PointState::Active;
            merged.push(point);
        }

        debug!(
            matched = outcome.matched.len(),
            new = outcome.new_points.len(),
            lost = outcome.lost_points.len(),
            conflicts = outcome.conflicts.len(),
            "snapshot updated"
        );

        self.points = merged;
        Ok(outcome)
    }
}

fn column_indices(table: &Table, fields: &[String]) -> Result<Vec<usize>> {
    fields
        .iter()
        .map(|f| {
            table.column_index(f).ok_or_else(|| Error::MissingField {
                field: f.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn table_two_frames() -> Table {
        let mut t = Table::new(&["time", "x", "y", "d"]);
        // frame 0
        t.push_row(vec![0.0, 1.0, 1.0, 5.0]).unwrap();
        t.push_row(vec![0.0, 4.0, 4.0, 6.0]).unwrap();
        // frame 1, same positions, one extra
        t.push_row(vec![1.0, 1.0, 1.0, 5.5]).unwrap();
        t.push_row(vec![1.0, 4.0, 4.0, 6.5]).unwrap();
        t.push_row(vec![1.0, 9.0, 9.0, 7.0]).unwrap();
        t
    }

    fn schema() -> Schema {
        Schema::new(&["x", "y"], &["d"])
    }

    #[test]
    fn test_from_table_assigns_names_in_row_order() {
        let t = table_two_frames();
        let snap = FrameSnapshot::from_table(&t, &[0, 1], schema(), "time", 10).unwrap();

        assert_eq!(snap.len(), 2);
        assert_eq!(snap.points()[0].name, 10);
        assert_eq!(snap.points()[1].name, 11);
        assert_eq!(snap.next_name(), 12);
        assert_eq!(snap.points()[0].origin_index, 0);
        assert_relative_eq!(snap.points()[1].features[0], 4.0);
        assert_relative_eq!(snap.points()[1].aux[0], 6.0);
    }

    #[test]
    fn test_from_table_missing_field() {
        let t = table_two_frames();
        let bad = Schema::new(&["x", "z"], &[]);
        let err = FrameSnapshot::from_table(&t, &[0, 1], bad, "time", 0);
        assert!(matches!(err, Err(Error::MissingField { .. })));
    }

    #[test]
    fn test_from_table_negative_start() {
        let t = table_two_frames();
        let err = FrameSnapshot::from_table(&t, &[0, 1], schema(), "time", -1);
        assert!(matches!(err, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_schema_weights_arity() {
        assert!(Schema::new(&["x", "y"], &[]).with_weights(&[1.0]).is_err());
        assert!(Schema::new(&["x", "y"], &[]).with_weights(&[-1.0, 1.0]).is_err());
        let s = Schema::new(&["x", "y"], &[]).with_weights(&[2.0, 0.5]).unwrap();
        assert_relative_eq!(s.weights[0], 2.0);
    }

    #[test]
    fn test_update_identical_positions_keep_names() {
        let t = table_two_frames();
        let mut running =
            FrameSnapshot::from_table(&t, &[0, 1], schema(), "time", 0).unwrap();
        let incoming =
            FrameSnapshot::from_table(&t, &[2, 3], schema(), "time", running.next_name())
                .unwrap();

        let outcome = running.update(incoming).unwrap();

        assert_eq!(outcome.matched.len(), 2);
        assert!(outcome.new_points.is_empty());
        assert!(outcome.lost_points.is_empty());

        // Names preserved, data refreshed from the new frame
        assert_eq!(running.points()[0].name, 0);
        assert_eq!(running.points()[1].name, 1);
        assert_relative_eq!(running.points()[0].frame, 1.0);
        assert_relative_eq!(running.points()[0].aux[0], 5.5);
        assert_eq!(running.points()[0].origin_index, 2);
    }

    #[test]
    fn test_update_new_point_gets_fresh_name() {
        let t = table_two_frames();
        let mut running =
            FrameSnapshot::from_table(&t, &[0, 1], schema(), "time", 0).unwrap();
        let incoming =
            FrameSnapshot::from_table(&t, &[2, 3, 4], schema(), "time", running.next_name())
                .unwrap();

        let outcome = running.update(incoming).unwrap();

        assert_eq!(outcome.matched.len(), 2);
        assert_eq!(outcome.new_points, vec![2]);
        assert_eq!(running.len(), 3);
        assert_eq!(running.points()[2].name, 2);
        assert_eq!(running.next_name(), 3);
    }

    #[test]
    fn test_update_lost_point_carried_then_dropped() {
        let t = table_two_frames();
        let mut running =
            FrameSnapshot::from_table(&t, &[0, 1], schema(), "time", 0).unwrap();

        // Only the first position reappears: the second becomes PendingLoss
        let incoming =
            FrameSnapshot::from_table(&t, &[2], schema(), "time", running.next_name()).unwrap();
        let outcome = running.update(incoming).unwrap();

        assert_eq!(outcome.lost_points, vec![1]);
        assert_eq!(running.len(), 2);
        assert_eq!(running.points()[1].state, PointState::PendingLoss);
        // Stale data carried verbatim
        assert_relative_eq!(running.points()[1].frame, 0.0);

        // Missed a second time: dropped
        let incoming =
            FrameSnapshot::from_table(&t, &[2], schema(), "time", running.next_name()).unwrap();
        running.update(incoming).unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running.points()[0].name, 0);
    }

    #[test]
    fn test_update_pending_loss_rematch() {
        let t = table_two_frames();
        let mut running =
            FrameSnapshot::from_table(&t, &[0, 1], schema(), "time", 0).unwrap();

        let incoming =
            FrameSnapshot::from_table(&t, &[2], schema(), "time", running.next_name()).unwrap();
        running.update(incoming).unwrap();
        assert_eq!(running.points()[1].state, PointState::PendingLoss);

        // Both positions reappear: point 1 is claimed again
        let incoming =
            FrameSnapshot::from_table(&t, &[2, 3], schema(), "time", running.next_name())
                .unwrap();
        running.update(incoming).unwrap();

        assert_eq!(running.len(), 2);
        let names: Vec<i64> = running.points().iter().map(|p| p.name).collect();
        assert!(names.contains(&0) && names.contains(&1));
        assert!(running.points().iter().all(|p| p.state == PointState::Active));
    }

    #[test]
    fn test_update_schema_mismatch() {
        let t = table_two_frames();
        let mut running =
            FrameSnapshot::from_table(&t, &[0, 1], schema(), "time", 0).unwrap();
        let other = Schema::new(&["y", "x"], &["d"]);
        let incoming = FrameSnapshot::from_table(&t, &[2, 3], other, "time", 0).unwrap();

        assert!(matches!(
            running.update(incoming),
            Err(Error::FieldMismatch { .. })
        ));
    }
}
