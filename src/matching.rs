//! Greedy point matching with local conflict repair.
//!
//! Turns a pairwise distance matrix into a correspondence between an old
//! point set (rows) and a new point set (columns). This is a heuristic
//! approximation to minimum-weight bipartite matching: pairs are claimed in
//! ascending distance order, and when several new points compete for the same
//! old point, each contested cell is tried as an alternative starting seed
//! and the assignment with the lower summed distance wins. It favors speed
//! and simplicity over optimality and can miss the global optimum when
//! multiple conflicts interact.

use nalgebra::DMatrix;
use tracing::warn;

/// Partition of two point sets produced by [`match_points`].
///
/// Row indices refer to old points, column indices to new points.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    /// Accepted (old, new) pairs, in acceptance order.
    pub matched: Vec<(usize, usize)>,
    /// Columns with no accepted row: points that just appeared.
    pub new_points: Vec<usize>,
    /// Rows with no accepted column: points that disappeared.
    pub lost_points: Vec<usize>,
    /// Columns that lost a tie for an already-claimed row.
    pub conflicts: Vec<usize>,
    /// Sum of distances over the accepted pairs.
    pub total_distance: f64,
}

/// Match rows to columns of a distance matrix.
///
/// All cells are ranked by ascending distance and walked greedily from the
/// globally closest pair; if any column loses a tie during the walk, the walk
/// is repeated with each contested cell as the seed and the cheapest
/// resulting assignment is kept. Empty matrices yield an all-new / all-lost
/// partition.
pub fn match_points(distances: &DMatrix<f64>) -> MatchOutcome {
    let (m, n) = distances.shape();

    if m == 0 || n == 0 {
        return MatchOutcome {
            matched: Vec::new(),
            new_points: (0..n).collect(),
            lost_points: (0..m).collect(),
            conflicts: Vec::new(),
            total_distance: 0.0,
        };
    }

    // Rank all m*n cells by ascending distance. The sort is stable, so ties
    // keep row-major encounter order; which of two exactly equal cells is
    // claimed first is otherwise arbitrary.
    let mut ranked: Vec<usize> = (0..m * n).collect();
    ranked.sort_by(|&a, &b| {
        distances[(a / n, a % n)].total_cmp(&distances[(b / n, b % n)])
    });

    if ranked
        .windows(2)
        .any(|w| distances[(w[0] / n, w[0] % n)] == distances[(w[1] / n, w[1] % n)])
    {
        warn!("tied distances in ranking, match order between equals is arbitrary");
    }

    // Seed at the globally closest pair.
    let (mut cells, conflict_cells) = walk(ranked[0], &ranked, m, n);
    let mut total = cell_sum(&cells, distances, n);

    // Local repair: reseed from each contested cell and keep the cheapest
    // assignment. This does not search globally.
    for &seed in &conflict_cells {
        let (alt_cells, _) = walk(seed, &ranked, m, n);
        let alt_total = cell_sum(&alt_cells, distances, n);
        if alt_total < total {
            cells = alt_cells;
            total = alt_total;
        }
    }

    let mut used_rows = vec![false; m];
    let mut used_cols = vec![false; n];
    let matched: Vec<(usize, usize)> = cells
        .iter()
        .map(|&q| {
            let (r, c) = (q / n, q % n);
            used_rows[r] = true;
            used_cols[c] = true;
            (r, c)
        })
        .collect();

    let mut conflicts: Vec<usize> = conflict_cells.iter().map(|&q| q % n).collect();
    conflicts.sort_unstable();
    conflicts.dedup();

    MatchOutcome {
        matched,
        new_points: (0..n).filter(|&c| !used_cols[c]).collect(),
        lost_points: (0..m).filter(|&r| !used_rows[r]).collect(),
        conflicts,
        total_distance: total,
    }
}

/// One greedy pass over the ranked cells, starting from `seed`.
///
/// A column may be claimed once; a cell whose row is already claimed is
/// recorded as a conflict instead of accepted. The walk halts once no further
/// pair can be accepted.
fn walk(seed: usize, ranked: &[usize], m: usize, n: usize) -> (Vec<usize>, Vec<usize>) {
    let mut used_rows = vec![false; m];
    let mut used_cols = vec![false; n];
    used_rows[seed / n] = true;
    used_cols[seed % n] = true;

    let mut cells = vec![seed];
    let mut conflicts = Vec::new();
    let max_matches = m.min(n);

    for &q in ranked {
        if cells.len() == max_matches {
            break;
        }
        let (r, c) = (q / n, q % n);
        if used_cols[c] {
            continue;
        }
        if used_rows[r] {
            conflicts.push(q);
            continue;
        }
        used_rows[r] = true;
        used_cols[c] = true;
        cells.push(q);
    }

    (cells, conflicts)
}

fn cell_sum(cells: &[usize], distances: &DMatrix<f64>, n: usize) -> f64 {
    cells.iter().map(|&q| distances[(q / n, q % n)]).sum()
}
