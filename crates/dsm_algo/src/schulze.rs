//! The Social-Choice Aggregator: Schulze method over a participant × candidate
//! rank matrix, with configurable tie-breaking.
//!
//! Builds the `D`/`P` win-strength and widest-path matrices over the full
//! candidate set (rather than stopping at a single Condorcet winner) and
//! uses `dsm_core::rng::EngineRng` for the TBRC/RANDOM tie-break draws.

use dsm_core::EngineRng;

use crate::arrow::{is_fully_mock, is_partially_mock, normalize, MOCK};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiePolicy {
    TiesAllowed,
    Random,
    Tbrc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialRanking {
    pub tied_ranks: Vec<i32>,
    pub untied_ranks: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchulzeError {
    #[error("row {0} has length {1}, expected {2}")]
    RowLengthMismatch(usize, usize, usize),
    #[error("row {0} is partially MOCK: rows must be all-MOCK or no-MOCK")]
    PartialMockRow(usize),
    #[error("row {0} is not a valid dense ranking (must start at 0 with no gaps)")]
    InvalidRowShape(usize),
}

/// Aggregate `rows` (one per participant, `rows[c][k]` = rank participant `c`
/// gave candidate `k`) into a [`SocialRanking`] over `k` candidates.
pub fn aggregate(
    rows: &[Vec<i32>],
    k: usize,
    policy: TiePolicy,
    rng: &mut EngineRng,
) -> Result<SocialRanking, SchulzeError> {
    let mut valid_rows: Vec<&Vec<i32>> = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        if row.len() != k {
            return Err(SchulzeError::RowLengthMismatch(i, row.len(), k));
        }
        if is_fully_mock(row) {
            continue;
        }
        if is_partially_mock(row) {
            return Err(SchulzeError::PartialMockRow(i));
        }
        validate_dense_row(row, i)?;
        valid_rows.push(row);
    }

    if valid_rows.is_empty() {
        let tied = vec![MOCK; k];
        let untied = permutation_to_ranks(&rng.permutation(k));
        return Ok(SocialRanking {
            tied_ranks: tied,
            untied_ranks: untied,
        });
    }

    let d = build_strength_matrix(&valid_rows, k);
    let p = widest_paths(&d, k);
    let tied = dominance_ranks(&p, k);

    let untied = match policy {
        TiePolicy::TiesAllowed => tied.clone(),
        TiePolicy::Random => {
            if is_strict_permutation(&tied) {
                tied.clone()
            } else {
                let perm = rng.permutation(k);
                normalize(&refine(&tied, &permutation_to_ranks(&perm), k))
            }
        }
        TiePolicy::Tbrc => {
            if is_strict_permutation(&tied) {
                tied.clone()
            } else {
                let mut current = tied.clone();
                let order = rng.permutation(valid_rows.len());
                for idx in order {
                    current = refine(&current, valid_rows[idx], k);
                    if is_strict_permutation(&current) {
                        break;
                    }
                }
                if !is_strict_permutation(&current) {
                    let perm = rng.permutation(k);
                    current = normalize(&refine(&current, &permutation_to_ranks(&perm), k));
                }
                current
            }
        }
    };

    Ok(SocialRanking {
        tied_ranks: tied,
        untied_ranks: untied,
    })
}

fn validate_dense_row(row: &[i32], idx: usize) -> Result<(), SchulzeError> {
    let mut sorted: Vec<i32> = row.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.first().copied() != Some(0) {
        return Err(SchulzeError::InvalidRowShape(idx));
    }
    for w in sorted.windows(2) {
        if w[1] - w[0] > 1 {
            return Err(SchulzeError::InvalidRowShape(idx));
        }
    }
    Ok(())
}

/// `D[x][y] = |{ c : R[c][x] < R[c][y] }|`
fn build_strength_matrix(rows: &[&Vec<i32>], k: usize) -> Vec<Vec<u64>> {
    let mut d = vec![vec![0u64; k]; k];
    for row in rows {
        for x in 0..k {
            for y in 0..k {
                if x != y && row[x] < row[y] {
                    d[x][y] += 1;
                }
            }
        }
    }
    d
}

/// Floyd–Warshall widest-path relaxation over the win-strength matrix.
fn widest_paths(d: &[Vec<u64>], k: usize) -> Vec<Vec<u64>> {
    let mut p = vec![vec![0u64; k]; k];
    for x in 0..k {
        for y in 0..k {
            if x != y && d[x][y] > d[y][x] {
                p[x][y] = d[x][y];
            }
        }
    }
    for i in 0..k {
        for y in 0..k {
            if y == i {
                continue;
            }
            for z in 0..k {
                if z == i || z == y {
                    continue;
                }
                let via = p[y][i].min(p[i][z]);
                if p[y][z] < via {
                    p[y][z] = via;
                }
            }
        }
    }
    p
}

/// Rank candidates by descending count of candidates they weakly dominate
/// (`P[x][y] >= P[y][x]`); equal counts become ties; result is consecutive
/// integers starting at 0.
fn dominance_ranks(p: &[Vec<u64>], k: usize) -> Vec<i32> {
    let mut neg_counts = vec![0i32; k];
    for x in 0..k {
        let mut count = 0i32;
        for y in 0..k {
            if x != y && p[x][y] >= p[y][x] {
                count += 1;
            }
        }
        neg_counts[x] = -count;
    }
    normalize(&neg_counts)
}

/// Refine `current` (a tied-ranks vector) by one ballot row: each candidate's
/// new position is `current_rank * k + normalize(ballot)`, renormalized.
fn refine(current: &[i32], ballot: &[i32], k: usize) -> Vec<i32> {
    let normalized_ballot = normalize(ballot);
    let combined: Vec<i32> = current
        .iter()
        .zip(normalized_ballot.iter())
        .map(|(&c, &b)| c * (k as i32) + b)
        .collect();
    normalize(&combined)
}

fn is_strict_permutation(ranks: &[i32]) -> bool {
    let mut sorted: Vec<i32> = ranks.to_vec();
    sorted.sort_unstable();
    sorted.iter().enumerate().all(|(i, &v)| v == i as i32)
}

fn permutation_to_ranks(perm: &[usize]) -> Vec<i32> {
    let mut ranks = vec![0i32; perm.len()];
    for (position, &candidate) in perm.iter().enumerate() {
        ranks[candidate] = position as i32;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng(seed: u64) -> EngineRng {
        EngineRng::from_seed_u64(seed)
    }

    // Canonical 30-voter, 4-candidate Schulze worked example: candidates
    // A,B,C,D at indices 0..3, ballots grouped by multiplicity as documented.
    // Expected tied_ranks == [1, 3, 2, 0].
    #[test]
    fn schulze_worked_example_thirty_voters() {
        // Candidates indexed [A, B, C, D]. Ballot groups (preference order,
        // multiplicity): DACB:16, ACDB:8, CDAB:6. B is ranked last by every
        // group, so B loses every pairwise contest 30-0. Among {A, C, D} the
        // majorities are transitive (D beats A 22-8, A beats C 24-6, D beats
        // C 16 direct but widest-path raises it to 22 via D->A->C), giving
        // the strict order D > A > C > B with no ties to break.
        let groups: &[(&[i32], u64)] = &[
            (&[1, 3, 2, 0], 16), // D A C B
            (&[0, 3, 1, 2], 8),  // A C D B
            (&[2, 3, 0, 1], 6),  // C D A B
        ];
        let mut rows = Vec::new();
        for (ranking, count) in groups {
            for _ in 0..*count {
                rows.push(ranking.to_vec());
            }
        }
        assert_eq!(rows.len(), 30);

        let mut r = rng(1);
        let result = aggregate(&rows, 4, TiePolicy::Tbrc, &mut r).unwrap();
        assert_eq!(result.tied_ranks, vec![1, 3, 2, 0]);
        assert_eq!(result.untied_ranks, vec![1, 3, 2, 0]);
    }

    #[test]
    fn majority_property() {
        // 3 of 4 rows rank candidate 0 strictly above everyone else.
        let rows = vec![
            vec![0, 1, 2],
            vec![0, 2, 1],
            vec![0, 1, 2],
            vec![1, 0, 2],
        ];
        let mut r = rng(7);
        let result = aggregate(&rows, 3, TiePolicy::TiesAllowed, &mut r).unwrap();
        assert_eq!(result.tied_ranks[0], 0);
    }

    #[test]
    fn condorcet_property() {
        let rows = vec![
            vec![0, 1, 2],
            vec![0, 2, 1],
            vec![1, 0, 2],
        ];
        let mut r = rng(11);
        let result = aggregate(&rows, 3, TiePolicy::TiesAllowed, &mut r).unwrap();
        // candidate 0 beats 1 (2-1) and beats 2 (3-0) pairwise.
        assert_eq!(result.tied_ranks[0], 0);
    }

    #[test]
    fn anonymity_property() {
        let rows = vec![
            vec![0, 1, 2],
            vec![1, 0, 2],
            vec![2, 1, 0],
            vec![0, 2, 1],
        ];
        let mut shuffled = rows.clone();
        shuffled.reverse();
        let mut r1 = rng(3);
        let mut r2 = rng(3);
        let a = aggregate(&rows, 3, TiePolicy::TiesAllowed, &mut r1).unwrap();
        let b = aggregate(&shuffled, 3, TiePolicy::TiesAllowed, &mut r2).unwrap();
        assert_eq!(a.tied_ranks, b.tied_ranks);
    }

    #[test]
    fn reproducibility_property() {
        let rows = vec![
            vec![0, 1, 2, 2],
            vec![1, 0, 2, 2],
            vec![2, 2, 0, 1],
        ];
        let mut r1 = EngineRng::from_seed_u64(99);
        let mut r2 = EngineRng::from_seed_u64(99);
        let a = aggregate(&rows, 4, TiePolicy::Tbrc, &mut r1).unwrap();
        let b = aggregate(&rows, 4, TiePolicy::Tbrc, &mut r2).unwrap();
        assert_eq!(a.untied_ranks, b.untied_ranks);
    }

    #[test]
    fn tbrc_unties_when_at_least_one_strict_row_exists() {
        // All-tied rows except one strict row.
        let rows = vec![
            vec![0, 0, 0],
            vec![0, 0, 0],
            vec![0, 1, 2],
        ];
        let mut r = rng(5);
        let result = aggregate(&rows, 3, TiePolicy::Tbrc, &mut r).unwrap();
        assert!(is_strict_permutation(&result.untied_ranks));
    }

    #[test]
    fn fully_mock_input_yields_mock_tied_and_strict_untied() {
        let rows = vec![vec![MOCK, MOCK, MOCK]; 4];
        let mut r = rng(13);
        let result = aggregate(&rows, 3, TiePolicy::Tbrc, &mut r).unwrap();
        assert_eq!(result.tied_ranks, vec![MOCK, MOCK, MOCK]);
        assert!(is_strict_permutation(&result.untied_ranks));
    }

    #[test]
    fn partial_mock_row_is_rejected() {
        let rows = vec![vec![MOCK, 0, 1], vec![0, 1, 2]];
        let mut r = rng(2);
        assert!(matches!(
            aggregate(&rows, 3, TiePolicy::TiesAllowed, &mut r),
            Err(SchulzeError::PartialMockRow(0))
        ));
    }

    #[test]
    fn ties_allowed_mode_preserves_ties() {
        let rows = vec![vec![0, 0, 1], vec![0, 0, 1]];
        let mut r = rng(21);
        let result = aggregate(&rows, 3, TiePolicy::TiesAllowed, &mut r).unwrap();
        assert_eq!(result.tied_ranks, result.untied_ranks);
        assert_eq!(result.tied_ranks[0], result.tied_ranks[1]);
    }
}
