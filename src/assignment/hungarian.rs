use nalgebra::DMatrix;

use crate::error::{MatchError, Result, check_real_counts};

/// Row → column pairs of a one-to-one assignment over the real block.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub pairs: Vec<(usize, usize)>,
    pub total_score: f64,
}

/// Maximum-weight one-to-one assignment as a 0/1 permutation matrix.
///
/// Only the real `n1 × n2` block is considered; exactly `min(n1, n2)` entries are
/// set and everything outside the block is zero.
pub fn match_permutation(s: &DMatrix<f64>, n1: usize, n2: usize) -> Result<DMatrix<f64>> {
    let assignment = solve_assignment(s, n1, n2)?;
    let mut permutation = DMatrix::zeros(s.nrows(), s.ncols());
    for (i, a) in assignment.pairs {
        permutation[(i, a)] = 1.0;
    }
    Ok(permutation)
}

/// Hungarian algorithm (shortest augmenting paths with potentials) on the real
/// block, `O(min(n1,n2)² · max(n1,n2))`. Ties go to the lowest column index
/// reached first, so identical input always yields the same assignment.
pub fn solve_assignment(s: &DMatrix<f64>, n1: usize, n2: usize) -> Result<Assignment> {
    check_real_counts("assignment", s.nrows(), s.ncols(), n1, n2)?;
    for i in 0..n1 {
        for a in 0..n2 {
            let value = s[(i, a)];
            if !value.is_finite() {
                return Err(MatchError::NonFiniteScore {
                    row: i,
                    col: a,
                    value,
                });
            }
        }
    }

    // Work on the orientation with no more rows than columns.
    let transposed = n1 > n2;
    let (rows, cols) = if transposed { (n2, n1) } else { (n1, n2) };
    let cost = |r: usize, c: usize| {
        if transposed { -s[(c, r)] } else { -s[(r, c)] }
    };

    let column_owner = shortest_augmenting_paths(rows, cols, cost);

    let mut pairs: Vec<(usize, usize)> = column_owner
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, owner)| **owner != 0)
        .map(|(c, owner)| {
            let (r, c) = (owner - 1, c - 1);
            if transposed { (c, r) } else { (r, c) }
        })
        .collect();
    pairs.sort_unstable();
    let total_score = pairs.iter().map(|&(i, a)| s[(i, a)]).sum();
    Ok(Assignment { pairs, total_score })
}

/// Returns `owner[c]` = 1-based row assigned to 1-based column `c` (0 if free).
fn shortest_augmenting_paths(
    rows: usize,
    cols: usize,
    cost: impl Fn(usize, usize) -> f64,
) -> Vec<usize> {
    let mut u = vec![0.0f64; rows + 1];
    let mut v = vec![0.0f64; cols + 1];
    let mut owner = vec![0usize; cols + 1];
    let mut way = vec![0usize; cols + 1];

    for row in 1..=rows {
        owner[0] = row;
        let mut j0 = 0usize;
        let mut min_slack = vec![f64::INFINITY; cols + 1];
        let mut used = vec![false; cols + 1];

        loop {
            used[j0] = true;
            let i0 = owner[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;
            for j in 1..=cols {
                if used[j] {
                    continue;
                }
                let reduced = cost(i0 - 1, j - 1) - u[i0] - v[j];
                if reduced < min_slack[j] {
                    min_slack[j] = reduced;
                    way[j] = j0;
                }
                if min_slack[j] < delta {
                    delta = min_slack[j];
                    j1 = j;
                }
            }
            for j in 0..=cols {
                if used[j] {
                    u[owner[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_slack[j] -= delta;
                }
            }
            j0 = j1;
            if owner[j0] == 0 {
                break;
            }
        }

        loop {
            let j1 = way[j0];
            owner[j0] = owner[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }
    owner
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force_best(s: &DMatrix<f64>, n: usize) -> f64 {
        fn permute(items: &mut Vec<usize>, k: usize, s: &DMatrix<f64>, best: &mut f64) {
            if k == items.len() {
                let total = items.iter().enumerate().map(|(i, &a)| s[(i, a)]).sum();
                if total > *best {
                    *best = total;
                }
                return;
            }
            for idx in k..items.len() {
                items.swap(k, idx);
                permute(items, k + 1, s, best);
                items.swap(k, idx);
            }
        }
        let mut items: Vec<usize> = (0..n).collect();
        let mut best = f64::NEG_INFINITY;
        permute(&mut items, 0, s, &mut best);
        best
    }

    #[test]
    fn identity_scores_give_identity_permutation() {
        let s = DMatrix::<f64>::identity(3, 3);
        let p = match_permutation(&s, 3, 3).expect("match");
        assert_eq!(p, DMatrix::identity(3, 3));
    }

    #[test]
    fn matches_brute_force_optimum() {
        let s = DMatrix::from_row_slice(4, 4, &[
            0.1, 0.9, 0.3, 0.2,
            0.8, 0.7, 0.1, 0.4,
            0.2, 0.6, 0.5, 0.9,
            0.3, 0.2, 0.8, 0.6,
        ]);
        let assignment = solve_assignment(&s, 4, 4).expect("assign");
        assert!((assignment.total_score - brute_force_best(&s, 4)).abs() < 1e-12);
        assert_eq!(assignment.pairs, vec![(0, 1), (1, 0), (2, 3), (3, 2)]);
    }

    #[test]
    fn rectangular_blocks_match_smaller_side() {
        let s = DMatrix::from_row_slice(3, 4, &[
            0.1, 0.2, 0.9, 0.0,
            0.9, 0.1, 0.2, 0.0,
            0.0, 0.0, 0.0, 0.0,
        ]);
        let p = match_permutation(&s, 2, 3).expect("match");
        assert_eq!(p.sum(), 2.0);
        assert_eq!(p[(0, 2)], 1.0);
        assert_eq!(p[(1, 0)], 1.0);

        let tall = match_permutation(&s.transpose(), 3, 2).expect("match");
        assert_eq!(tall.sum(), 2.0);
        assert_eq!(tall[(2, 0)], 1.0);
        assert_eq!(tall[(0, 1)], 1.0);
        for i in 0..4 {
            assert!(tall.row(i).sum() <= 1.0);
        }
        assert_eq!(tall.row(3).sum(), 0.0);
    }

    #[test]
    fn at_most_one_per_row_and_column() {
        let s = DMatrix::from_fn(6, 6, |i, a| ((i * 7 + a * 3) % 5) as f64);
        let p = match_permutation(&s, 5, 4).expect("match");
        for i in 0..6 {
            assert!(p.row(i).sum() <= 1.0);
        }
        for a in 0..6 {
            assert!(p.column(a).sum() <= 1.0);
        }
        assert_eq!(p.sum(), 4.0);
        assert_eq!(p.row(5).sum(), 0.0);
        assert_eq!(p.column(4).sum() + p.column(5).sum(), 0.0);
    }

    #[test]
    fn ties_are_resolved_deterministically() {
        let s = DMatrix::from_element(3, 3, 1.0);
        let first = match_permutation(&s, 3, 3).expect("match");
        for _ in 0..5 {
            assert_eq!(match_permutation(&s, 3, 3).expect("match"), first);
        }
    }

    #[test]
    fn zero_target_nodes_are_rejected() {
        let err = match_permutation(&DMatrix::zeros(3, 3), 3, 0).unwrap_err();
        assert!(matches!(err, MatchError::InvalidShape { .. }));
        let err = match_permutation(&DMatrix::zeros(3, 3), 4, 3).unwrap_err();
        assert!(matches!(err, MatchError::InvalidShape { .. }));
    }

    #[test]
    fn non_finite_scores_are_rejected() {
        let mut s = DMatrix::zeros(2, 2);
        s[(1, 0)] = f64::NAN;
        let err = match_permutation(&s, 2, 2).unwrap_err();
        assert!(matches!(err, MatchError::NonFiniteScore { row: 1, col: 0, .. }));
    }
}
