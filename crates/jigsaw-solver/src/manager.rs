//! Correspondence between a measured board and the calibrated solution.

use jigsaw_core::{Board, Piece, PieceId, PieceKind};
use jigsaw_matcher::{Feature, MatchError, MatchStrategy, Matcher};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::error::{BoardSide, ManagerError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStrategy {
    /// Accept gated pairs cheapest first; ties go to the lower measured index,
    /// then the lower solution index.
    #[default]
    Greedy,
    /// Maximum-cardinality, minimum-total-cost matching (Hungarian method).
    Optimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ManagerParams {
    pub strategy: AssignmentStrategy,
}

/// One accepted match.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    pub measured: PieceId,
    pub solution: PieceId,
    /// Rotation (degrees) of the measured piece relative to its solution
    /// piece, when the matcher estimates one.
    pub rotation: Option<f32>,
    /// Gated matcher cost; lower is better.
    pub score: f32,
}

/// Injective mapping from measured to solution pieces, in measured-board order.
///
/// Deserialized pairs go through [`Assignment::new`], so duplicates are dropped
/// there too.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Correspondence>", into = "Vec<Correspondence>")]
pub struct Assignment {
    pairs: Vec<Correspondence>,
}

impl From<Vec<Correspondence>> for Assignment {
    fn from(pairs: Vec<Correspondence>) -> Self {
        Assignment::new(pairs)
    }
}

impl From<Assignment> for Vec<Correspondence> {
    fn from(assignment: Assignment) -> Self {
        assignment.pairs
    }
}

impl Assignment {
    /// Build from pairs, dropping any that reuse a measured or solution id.
    pub fn new(pairs: Vec<Correspondence>) -> Self {
        let mut kept: Vec<Correspondence> = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let clash = kept
                .iter()
                .any(|k| k.measured == pair.measured || k.solution == pair.solution);
            if clash {
                log::warn!(
                    "dropping duplicate correspondence {} -> {}",
                    pair.measured,
                    pair.solution
                );
                continue;
            }
            kept.push(pair);
        }
        Self { pairs: kept }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn pairs(&self) -> &[Correspondence] {
        &self.pairs
    }

    pub fn iter(&self) -> impl Iterator<Item = &Correspondence> {
        self.pairs.iter()
    }

    pub fn solution_for(&self, measured: PieceId) -> Option<&Correspondence> {
        self.pairs.iter().find(|c| c.measured == measured)
    }

    pub fn measured_for(&self, solution: PieceId) -> Option<&Correspondence> {
        self.pairs.iter().find(|c| c.solution == solution)
    }

    /// `(measured, solution)` id pairs.
    pub fn id_pairs(&self) -> Vec<(PieceId, PieceId)> {
        self.pairs.iter().map(|c| (c.measured, c.solution)).collect()
    }

    /// The matched measured pieces, in assignment order, as a new board.
    ///
    /// Poses are copied (see [`Board::select`]); actions applied to the
    /// subset do not move pieces on `measured`.
    pub fn measured_subset(&self, measured: &Board) -> Result<Board, jigsaw_core::BoardError> {
        let ids: Vec<PieceId> = self.pairs.iter().map(|c| c.measured).collect();
        measured.select(&ids)
    }
}

struct Candidate {
    cost: f32,
    rotation: Option<f32>,
}

/// Computes assignments against a fixed solution board with one matcher.
#[derive(Clone, Debug)]
pub struct Manager {
    solution: Board,
    matcher: Matcher,
    params: ManagerParams,
    solution_features: Vec<(PieceId, PieceKind, Feature)>,
}

impl Manager {
    /// Extracts solution features once; they depend only on the fixed solution board.
    pub fn new(
        solution: Board,
        matcher: Matcher,
        params: ManagerParams,
    ) -> Result<Self, ManagerError> {
        let solution_features = solution
            .iter()
            .map(|p| {
                let feature = extract(&matcher, p, BoardSide::Solution)?;
                Ok((p.id(), p.kind(), feature))
            })
            .collect::<Result<Vec<_>, ManagerError>>()?;
        Ok(Self {
            solution,
            matcher,
            params,
            solution_features,
        })
    }

    pub fn solution(&self) -> &Board {
        &self.solution
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn params(&self) -> &ManagerParams {
        &self.params
    }

    /// Match every measured piece against the solution. Measured pieces without
    /// an acceptable match are left out; an empty result is not an error.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip_all,
            fields(measured = measured.len(), solution = self.solution.len())
        )
    )]
    pub fn process(&self, measured: &Board) -> Result<Assignment, ManagerError> {
        let measured_ids = measured.ids();
        let costs = self.cost_matrix(measured)?;

        let picks = match self.params.strategy {
            AssignmentStrategy::Greedy => greedy(&costs),
            AssignmentStrategy::Optimal => optimal(&costs),
        };

        let mut pairs: Vec<Correspondence> = picks
            .into_iter()
            .filter_map(|(mi, si)| {
                let c = costs[mi][si].as_ref()?;
                Some(Correspondence {
                    measured: measured_ids[mi],
                    solution: self.solution_features[si].0,
                    rotation: c.rotation,
                    score: c.cost,
                })
            })
            .collect();
        let order = |id: PieceId| measured_ids.iter().position(|&m| m == id);
        pairs.sort_by_key(|c| order(c.measured));

        let unmatched = measured.len() - pairs.len();
        if unmatched > 0 {
            log::debug!("{unmatched} measured pieces left unmatched");
        }
        log::info!(
            "matched {} of {} measured pieces ({:?})",
            pairs.len(),
            measured.len(),
            self.params.strategy
        );
        Ok(Assignment::new(pairs))
    }

    fn cost_matrix(&self, measured: &Board) -> Result<Vec<Vec<Option<Candidate>>>, ManagerError> {
        let mut rows = Vec::with_capacity(measured.len());
        for piece in measured.iter() {
            let feature = match extract(&self.matcher, piece, BoardSide::Measured) {
                Ok(f) => f,
                Err(ManagerError::Match {
                    source: MatchError::DegenerateShape,
                    ..
                }) => {
                    log::warn!("measured piece {} is degenerate; skipping", piece.id());
                    rows.push(self.solution_features.iter().map(|_| None).collect());
                    continue;
                }
                Err(e) => return Err(e),
            };

            let mut row = Vec::with_capacity(self.solution_features.len());
            for (sid, kind, sfeature) in &self.solution_features {
                if *kind != piece.kind() {
                    return Err(ManagerError::Match {
                        side: BoardSide::Measured,
                        piece: piece.id(),
                        source: MatchError::TypeMismatch {
                            expected: kind_name(*kind),
                            found: kind_name(piece.kind()),
                        },
                    });
                }
                let wrap = |source| ManagerError::Match {
                    side: BoardSide::Measured,
                    piece: piece.id(),
                    source,
                };
                let score = self.matcher.score(&feature, sfeature).map_err(wrap)?;
                let cost = self.matcher.cost(&score).map_err(wrap)?;
                log::debug!("measured {} vs solution {sid}: {score:?} -> {cost:?}", piece.id());
                row.push(cost.filter(|c| c.is_finite()).map(|cost| Candidate {
                    cost,
                    rotation: score.rotation(),
                }));
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

fn kind_name(kind: PieceKind) -> &'static str {
    match kind {
        PieceKind::Template => "template",
        PieceKind::Regular => "regular",
    }
}

fn extract(matcher: &Matcher, piece: &Piece, side: BoardSide) -> Result<Feature, ManagerError> {
    matcher.process(piece).map_err(|source| ManagerError::Match {
        side,
        piece: piece.id(),
        source,
    })
}

/// Cheapest gated pair first, skipping rows and columns already used.
fn greedy(costs: &[Vec<Option<Candidate>>]) -> Vec<(usize, usize)> {
    let mut edges: Vec<(f32, usize, usize)> = Vec::new();
    for (mi, row) in costs.iter().enumerate() {
        for (si, c) in row.iter().enumerate() {
            if let Some(c) = c {
                edges.push((c.cost, mi, si));
            }
        }
    }
    edges.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let cols = costs.first().map_or(0, Vec::len);
    let mut row_used = vec![false; costs.len()];
    let mut col_used = vec![false; cols];
    let mut picks = Vec::new();
    for (_, mi, si) in edges {
        if row_used[mi] || col_used[si] {
            continue;
        }
        row_used[mi] = true;
        col_used[si] = true;
        picks.push((mi, si));
    }
    picks
}

/// Hungarian assignment on the gated matrix, padded to square. Gated-out and
/// padding cells cost more than every finite cost combined, so the result
/// maximises the number of real matches before minimising their total cost.
fn optimal(costs: &[Vec<Option<Candidate>>]) -> Vec<(usize, usize)> {
    let rows = costs.len();
    let cols = costs.first().map_or(0, Vec::len);
    let n = rows.max(cols);
    if n == 0 {
        return Vec::new();
    }
    let finite_sum: f64 = costs
        .iter()
        .flatten()
        .flatten()
        .map(|c| c.cost as f64)
        .sum();
    let big = finite_sum + 1.0;

    let mut square = vec![vec![big; n]; n];
    for (i, row) in costs.iter().enumerate() {
        for (j, c) in row.iter().enumerate() {
            if let Some(c) = c {
                square[i][j] = c.cost as f64;
            }
        }
    }

    hungarian(&square)
        .into_iter()
        .enumerate()
        .filter(|&(i, j)| i < rows && j < cols && costs[i][j].is_some())
        .collect()
}

/// Minimum-cost perfect matching of a square matrix; returns the column of each row.
fn hungarian(cost: &[Vec<f64>]) -> Vec<usize> {
    let n = cost.len();
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; n + 1];
    let mut p = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];
        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;
            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let cur = cost[i0 - 1][j - 1] - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }
            for j in 0..=n {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut assignment = vec![0usize; n];
    for j in 1..=n {
        if p[j] != 0 {
            assignment[p[j] - 1] = j - 1;
        }
    }
    assignment
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[&[Option<f32>]]) -> Vec<Vec<Option<Candidate>>> {
        rows.iter()
            .map(|r| {
                r.iter()
                    .map(|c| c.map(|cost| Candidate { cost, rotation: None }))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn greedy_takes_cheapest_first() {
        let costs = matrix(&[&[Some(1.0), Some(2.0)], &[Some(0.5), Some(10.0)]]);
        assert_eq!(greedy(&costs), vec![(1, 0), (0, 1)]);
    }

    #[test]
    fn greedy_ties_prefer_lower_indices() {
        let costs = matrix(&[&[Some(1.0), Some(1.0)], &[Some(1.0), Some(1.0)]]);
        assert_eq!(greedy(&costs), vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn optimal_beats_greedy_total() {
        // Greedy takes (0,0)=1 then (1,1)=10; optimal takes 2 + 2.
        let costs = matrix(&[&[Some(1.0), Some(2.0)], &[Some(2.0), Some(10.0)]]);
        assert_eq!(greedy(&costs), vec![(0, 0), (1, 1)]);
        let mut picks = optimal(&costs);
        picks.sort();
        assert_eq!(picks, vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn optimal_skips_gated_cells_and_pads_rectangles() {
        let costs = matrix(&[
            &[None, Some(3.0)],
            &[None, Some(1.0)],
            &[Some(4.0), None],
        ]);
        let mut picks = optimal(&costs);
        picks.sort();
        assert_eq!(picks, vec![(1, 1), (2, 0)]);
    }

    #[test]
    fn hungarian_solves_textbook_case() {
        let cost = vec![
            vec![4.0, 1.0, 3.0],
            vec![2.0, 0.0, 5.0],
            vec![3.0, 2.0, 2.0],
        ];
        assert_eq!(hungarian(&cost), vec![1, 0, 2]);
    }

    #[test]
    fn assignment_drops_reused_ids() {
        let c = |m, s| Correspondence {
            measured: m,
            solution: s,
            rotation: None,
            score: 0.0,
        };
        let a = Assignment::new(vec![c(0, 5), c(1, 5), c(0, 6), c(2, 7)]);
        assert_eq!(a.id_pairs(), vec![(0, 5), (2, 7)]);
        assert_eq!(a.measured_for(7).map(|c| c.measured), Some(2));
    }

    #[test]
    fn deserialized_assignment_stays_injective() {
        let json = r#"[
            {"measured": 0, "solution": 4, "rotation": null, "score": 0.5},
            {"measured": 1, "solution": 4, "rotation": 12.0, "score": 0.7}
        ]"#;
        let a: Assignment = serde_json::from_str(json).unwrap();
        assert_eq!(a.id_pairs(), vec![(0, 4)]);
        let back: Assignment = serde_json::from_str(&serde_json::to_string(&a).unwrap()).unwrap();
        assert_eq!(back, a);
    }
}
