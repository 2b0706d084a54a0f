//! Markov-chain importance ranking.
//!
//! Models a reader's attention as a Markov chain over text units: edge
//! weights are cosine similarities, rows are normalized into transition
//! probabilities, and the chain's stationary distribution scores each unit
//! by how central it is to the document's semantic structure, independent
//! of where the unit sits in the document. The routines here are pure
//! numeric code over an explicit row-major matrix, so they can be tested
//! with synthetic matrices.

use crate::vectors::cosine_similarity;

/// Dense row-major square matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SquareMatrix {
    order: usize,
    data: Vec<f64>,
}

impl SquareMatrix {
    pub fn zeros(order: usize) -> Self {
        Self {
            order,
            data: vec![0.0; order * order],
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.order + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.order + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.order..(row + 1) * self.order]
    }

    /// Row-normalizes into a stochastic transition matrix. Negative entries
    /// are floored to zero first; an all-zero row becomes the uniform
    /// distribution so the chain stays well-formed.
    pub fn into_stochastic(mut self) -> SquareMatrix {
        let n = self.order;
        if n == 0 {
            return self;
        }
        for row in 0..n {
            let cells = &mut self.data[row * n..(row + 1) * n];
            for cell in cells.iter_mut() {
                if *cell < 0.0 {
                    *cell = 0.0;
                }
            }
            let sum: f64 = cells.iter().sum();
            if sum > 0.0 {
                for cell in cells.iter_mut() {
                    *cell /= sum;
                }
            } else {
                let uniform = 1.0 / n as f64;
                cells.fill(uniform);
            }
        }
        self
    }
}

/// Pairwise cosine similarity with zeroed self-loops. Negative similarities
/// are floored to zero so they cannot act as transition weights.
pub fn similarity_matrix(embeddings: &[&[f32]]) -> SquareMatrix {
    let n = embeddings.len();
    let mut matrix = SquareMatrix::zeros(n);
    for i in 0..n {
        for j in (i + 1)..n {
            let similarity = cosine_similarity(embeddings[i], embeddings[j]).max(0.0);
            matrix.set(i, j, similarity);
            matrix.set(j, i, similarity);
        }
    }
    matrix
}

/// Outcome of the power iteration.
#[derive(Debug, Clone)]
pub struct StationaryResult {
    /// One importance score per unit; sums to 1.
    pub scores: Vec<f64>,
    pub iterations: usize,
    /// Final L1 change between successive distributions.
    pub delta: f64,
    /// False when the iteration budget ran out; the best available
    /// approximation is still returned.
    pub converged: bool,
}

/// Computes the stationary distribution of a row-stochastic `transition`
/// matrix by power iteration, starting from the uniform distribution.
///
/// Stops when the L1 delta drops to `tolerance` or after `max_iterations`
/// passes, whichever comes first. Non-convergence is signaled through
/// [`StationaryResult::converged`], never as an error.
pub fn stationary_distribution(
    transition: &SquareMatrix,
    tolerance: f64,
    max_iterations: usize,
) -> StationaryResult {
    let n = transition.order();
    if n == 0 {
        return StationaryResult {
            scores: Vec::new(),
            iterations: 0,
            delta: 0.0,
            converged: true,
        };
    }

    let mut scores = vec![1.0 / n as f64; n];
    let mut next = vec![0.0f64; n];
    let mut iterations = 0usize;
    let mut delta = f64::MAX;

    while iterations < max_iterations && delta > tolerance {
        iterations += 1;
        next.fill(0.0);
        for (i, &mass) in scores.iter().enumerate() {
            for (j, &probability) in transition.row(i).iter().enumerate() {
                next[j] += mass * probability;
            }
        }
        delta = scores
            .iter()
            .zip(next.iter())
            .map(|(old, new)| (old - new).abs())
            .sum();
        std::mem::swap(&mut scores, &mut next);
    }

    // Guard against drift accumulating over many multiplications.
    let sum: f64 = scores.iter().sum();
    if sum > 0.0 {
        for score in &mut scores {
            *score /= sum;
        }
    }

    StationaryResult {
        scores,
        iterations,
        delta,
        converged: delta <= tolerance,
    }
}

/// Top-k indices from `(index, score)` candidates: descending score, ties
/// broken by ascending index. `k` larger than the candidate count returns
/// everything in that order.
pub fn select_top_k(candidates: impl IntoIterator<Item = (usize, f64)>, k: usize) -> Vec<usize> {
    let mut ranked: Vec<(usize, f64)> = candidates.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(k);
    ranked.into_iter().map(|(index, _)| index).collect()
}

/// Top-k over a full score slice, scored by position.
pub fn top_k(scores: &[f64], k: usize) -> Vec<usize> {
    select_top_k(scores.iter().copied().enumerate(), k)
}
