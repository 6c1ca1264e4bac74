//! # Bloblink - Positional Blob Linking
//!
//! Links detected objects ("blobs") across a sequence of image frames into
//! persistent identities, using only each blob's position and a few auxiliary
//! measurements. No appearance model, no motion model.
//!
//! The matcher is a greedy nearest-pair-first heuristic with local conflict
//! repair, not an optimal assignment solver. A sequencing layer partitions an
//! experiment's observation table into independently-tracked segments and
//! guarantees globally unique identities across them.
//!
//! ## Example
//!
//! ```rust,ignore
//! use bloblink::{Table, LinkConfig, link_across_sequence};
//!
//! let mut table = Table::new(&["seq", "time", "x", "y", "diameter"]);
//! table.push_row(vec![0.0, 0.0, 1.0, 2.0, 5.0]).unwrap();
//! table.push_row(vec![0.0, 1.0, 1.1, 2.1, 5.0]).unwrap();
//!
//! let config = LinkConfig::new(&["x", "y"], "time", "seq");
//! let linked = link_across_sequence(&table, &config).unwrap();
//! ```

pub mod table;
pub mod snapshot;
pub mod distances;
pub mod matching;
pub mod linker;

// Re-exports for convenience
pub use table::Table;
pub use snapshot::{FrameSnapshot, PointState, Schema, TrackedPoint};
pub use distances::distance_matrix;
pub use matching::{match_points, MatchOutcome};
pub use linker::{link_across_sequence, LinkConfig, UNASSIGNED};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur while linking blobs.
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("invalid configuration: {0}")]
        Configuration(String),

        #[error("field '{field}' not present in input table")]
        MissingField { field: String },

        #[error("feature field mismatch: {expected:?} vs {got:?}")]
        FieldMismatch {
            expected: Vec<String>,
            got: Vec<String>,
        },

        #[error("row length {got} does not match table width {expected}")]
        RowShape { expected: usize, got: usize },

        #[error("match integrity violated (segment {segment}, frame {frame}): {message}")]
        MatchIntegrity {
            segment: f64,
            frame: f64,
            message: String,
        },
    }

    /// Result type for bloblink operations.
    pub type Result<T> = std::result::Result<T, Error>;
}
