//! Sequence linker: drives snapshot updates across a whole observation table.
//!
//! The table is partitioned into segments (points are never matched across a
//! segment boundary); within a segment, frames are folded into a running
//! snapshot in ascending frame-key order and the resulting identities are
//! written back through each point's origin index. A single identity counter
//! is threaded through all segments so identity ranges never overlap.

use tracing::{debug, warn};

use crate::snapshot::{FrameSnapshot, Schema};
use crate::table::Table;
use crate::{Error, Result};

/// Sentinel identity for rows that could not be assigned.
pub const UNASSIGNED: i64 = -1;

/// Configuration for [`link_across_sequence`].
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Ordered fields used in distance computation.
    pub feature_fields: Vec<String>,
    /// Ordered fields carried along but never matched on.
    pub aux_fields: Vec<String>,
    /// Field holding the frame key (time or image index).
    pub frame_field: String,
    /// Field holding the segment key; tracking never crosses segments.
    pub segment_field: String,
    /// Per-feature match weights; `None` means all ones.
    pub weights: Option<Vec<f64>>,
    /// Identity assigned to the first point of the first segment.
    pub first_name: i64,
    /// Name of the identity column appended to the output table.
    pub id_field: String,
}

impl LinkConfig {
    /// Create a configuration with default weights, starting identity 0, and
    /// output column `"blob_id"`.
    pub fn new(feature_fields: &[&str], frame_field: &str, segment_field: &str) -> Self {
        Self {
            feature_fields: feature_fields.iter().map(|f| f.to_string()).collect(),
            aux_fields: Vec::new(),
            frame_field: frame_field.to_string(),
            segment_field: segment_field.to_string(),
            weights: None,
            first_name: 0,
            id_field: "blob_id".to_string(),
        }
    }

    fn schema(&self) -> Result<Schema> {
        let features: Vec<&str> = self.feature_fields.iter().map(String::as_str).collect();
        let aux: Vec<&str> = self.aux_fields.iter().map(String::as_str).collect();
        let schema = Schema::new(&features, &aux);
        match &self.weights {
            Some(w) => schema.with_weights(w),
            None => Ok(schema),
        }
    }

    fn validate(&self, table: &Table) -> Result<()> {
        if self.first_name < 0 {
            return Err(Error::Configuration(format!(
                "starting identity must be non-negative, got {}",
                self.first_name
            )));
        }
        for field in self
            .feature_fields
            .iter()
            .chain(&self.aux_fields)
            .chain([&self.frame_field, &self.segment_field])
        {
            if table.column_index(field).is_none() {
                return Err(Error::MissingField {
                    field: field.clone(),
                });
            }
        }
        if table.column_index(&self.id_field).is_some() {
            return Err(Error::Configuration(format!(
                "identity column '{}' already present in input table",
                self.id_field
            )));
        }
        Ok(())
    }
}

/// Link blobs across the whole table, returning the input table with one
/// appended identity column.
///
/// Every row receives either a persistent identity or the [`UNASSIGNED`]
/// sentinel (which is logged, never silent). Identity ranges of distinct
/// segments are disjoint: after each segment the counter advances past the
/// segment's maximum used identity.
pub fn link_across_sequence(table: &Table, config: &LinkConfig) -> Result<Table> {
    config.validate(table)?;
    let schema = config.schema()?;

    let frame_col = table
        .column_index(&config.frame_field)
        .ok_or_else(|| Error::MissingField {
            field: config.frame_field.clone(),
        })?;

    let mut ids = vec![UNASSIGNED; table.num_rows()];
    let mut next_name = config.first_name;

    // Segments in sorted key order, never hash-iteration order.
    for segment in table.distinct_sorted(&config.segment_field)? {
        let segment_rows = table.rows_where(&config.segment_field, segment)?;

        let mut frames: Vec<f64> = segment_rows
            .iter()
            .map(|&r| table.row(r)[frame_col])
            .collect();
        frames.sort_by(f64::total_cmp);
        frames.dedup_by(|a, b| a.total_cmp(b).is_eq());

        let rows_at = |frame: f64| -> Vec<usize> {
            segment_rows
                .iter()
                .copied()
                .filter(|&r| table.row(r)[frame_col] == frame)
                .collect()
        };

        // The segment's first frame seeds the running snapshot.
        let first_rows = rows_at(frames[0]);
        let mut running = FrameSnapshot::from_table(
            table,
            &first_rows,
            schema.clone(),
            &config.frame_field,
            next_name,
        )?;
        write_back(&running, &first_rows, &mut ids, segment, frames[0])?;

        for &frame in &frames[1..] {
            let rows = rows_at(frame);
            let incoming = FrameSnapshot::from_table(
                table,
                &rows,
                schema.clone(),
                &config.frame_field,
                running.next_name(),
            )?;
            let outcome = running.update(incoming)?;

            if outcome.matched.len() + outcome.new_points.len() != rows.len() {
                return Err(Error::MatchIntegrity {
                    segment,
                    frame,
                    message: format!(
                        "partition covers {} of {} observed points",
                        outcome.matched.len() + outcome.new_points.len(),
                        rows.len()
                    ),
                });
            }

            write_back(&running, &rows, &mut ids, segment, frame)?;
        }

        debug!(
            segment,
            frames = frames.len(),
            names_used = running.next_name() - next_name,
            "segment linked"
        );
        next_name = running.next_name();
    }

    let id_values: Vec<f64> = ids.iter().map(|&id| id as f64).collect();
    table.with_column(&config.id_field, &id_values)
}

/// Copy identities from the running snapshot to the rows of one frame,
/// matching on origin index.
fn write_back(
    running: &FrameSnapshot,
    rows: &[usize],
    ids: &mut [i64],
    segment: f64,
    frame: f64,
) -> Result<()> {
    let mut frame_names = Vec::with_capacity(rows.len());
    for &row in rows {
        match running
            .points()
            .iter()
            .find(|p| p.origin_index == row)
        {
            Some(point) => {
                ids[row] = point.name;
                frame_names.push(point.name);
            }
            None => {
                // Guarded: should not occur given the merge semantics.
                warn!(segment, frame, row, "row not traceable after merge, left unassigned");
            }
        }
    }

    frame_names.sort_unstable();
    if frame_names.windows(2).any(|w| w[0] == w[1]) {
        return Err(Error::MatchIntegrity {
            segment,
            frame,
            message: "duplicate identity within one frame".to_string(),
        });
    }
    Ok(())
}
