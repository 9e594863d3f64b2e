//! Iterative Luce Spectral Ranking (I-LSR) for pairwise comparisons.
//!
//! Each iteration builds a continuous-time Markov chain where every loss moves
//! rate from the loser to the winner, weighted by `1 / (w_winner + w_loser)`
//! under the current strengths. Its stationary distribution gives the next
//! strengths. The fixed point is the Bradley-Terry maximum-likelihood estimate.
//!
//! An additive `regularization` rate between every ordered pair of items keeps
//! the chain irreducible. Without it, a disconnected comparison graph (or an
//! item that never wins) has no unique positive stationary distribution, and
//! the fit reports `NonConvergence` instead of returning made-up scores.
//!
//! Internal module: operates on dense `usize` ids, not caller item ids.

use nalgebra::{DMatrix, DVector};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, trace};

use crate::error::{RankError, Result};
use crate::types::{DenseId, DirectedPair, FitOptions};

pub struct LuceSpectral {
    num_items: usize,
    pairs: Vec<DirectedPair>,
    regularization: f64,
    /// Current log-strengths, centered to mean zero.
    params: Vec<f64>,
}

impl LuceSpectral {
    /// Validates every pair against `num_items`: out-of-range ids and
    /// self-pairs are caller bugs and are never clamped or skipped.
    /// `regularization` must be finite and non-negative.
    pub fn new(num_items: usize, pairs: &[DirectedPair], regularization: f64) -> Result<Self> {
        if !regularization.is_finite() || regularization < 0.0 {
            return Err(RankError::InvalidOption(format!(
                "regularization must be finite and >= 0, got {regularization}"
            )));
        }

        for pair in pairs {
            for index in [pair.winner, pair.loser] {
                if index >= num_items {
                    return Err(RankError::DenseIdOutOfRange { index, num_items });
                }
            }
            if pair.winner == pair.loser {
                return Err(RankError::SelfPair { index: pair.winner });
            }
        }

        Ok(LuceSpectral {
            num_items,
            pairs: pairs.to_vec(),
            regularization,
            params: vec![0.0; num_items],
        })
    }

    /// Strengths on the probability scale, rescaled to sum to `num_items`.
    fn weights(&self) -> Vec<f64> {
        let mean = self.params.iter().sum::<f64>() / self.num_items as f64;
        let raw: Vec<f64> = self.params.iter().map(|p| (p - mean).exp()).collect();
        let scale = self.num_items as f64 / raw.iter().sum::<f64>();
        raw.into_iter().map(|w| w * scale).collect()
    }

    /// Generator matrix of the comparison chain under `weights`.
    fn generator(&self, weights: &[f64]) -> DMatrix<f64> {
        let n = self.num_items;
        let mut chain = DMatrix::from_element(n, n, self.regularization);

        for pair in &self.pairs {
            chain[(pair.loser, pair.winner)] += 1.0 / (weights[pair.winner] + weights[pair.loser]);
        }

        // Rows of a generator sum to zero.
        for i in 0..n {
            let row_sum = chain.row(i).sum();
            chain[(i, i)] -= row_sum;
        }

        chain
    }

    fn run_iteration(&self) -> Result<Vec<f64>> {
        let weights = self.weights();
        let dist = stationary_distribution(self.generator(&weights))?;

        let logs: Vec<f64> = dist.iter().map(|p| p.ln()).collect();
        let mean = logs.iter().sum::<f64>() / logs.len() as f64;
        Ok(logs.into_iter().map(|l| l - mean).collect())
    }

    /// Iterate until the L1 change in centered parameters drops to `tolerance`.
    ///
    /// Returns the number of iterations used. The first iteration is never
    /// accepted on its own; convergence needs two consecutive estimates.
    /// A model with no items has nothing to fit and returns `Ok(0)`.
    pub fn calculate_params(&mut self, max_iterations: usize, tolerance: f64) -> Result<usize> {
        if self.num_items == 0 {
            return Ok(0);
        }

        for iteration in 1..=max_iterations {
            let next = self.run_iteration()?;
            let change: f64 = next.iter().zip(&self.params).map(|(a, b)| (a - b).abs()).sum();
            self.params = next;

            trace!(iteration, change, "lsr iteration");

            if iteration > 1 && change <= tolerance {
                return Ok(iteration);
            }
        }

        Err(RankError::NonConvergence {
            reason: format!("no convergence after {max_iterations} iterations (tolerance {tolerance:e})"),
        })
    }

    /// Log-strength per dense id, centered to mean zero.
    pub fn params(&self) -> &[f64] {
        &self.params
    }

    pub fn num_items(&self) -> usize {
        self.num_items
    }
}

/// Stationary distribution of a continuous-time chain, scaled to sum to `n`.
///
/// Solves `pi^T Q = 0` with the last balance equation replaced by the
/// normalization. A reducible chain makes that system singular, and a chain
/// with transient states leaves some entries at zero. Both are reported as
/// non-convergence.
fn stationary_distribution(generator: DMatrix<f64>) -> Result<DVector<f64>> {
    let n = generator.nrows();

    let mut system = generator.transpose();
    system.row_mut(n - 1).fill(1.0);
    let mut rhs = DVector::<f64>::zeros(n);
    rhs[n - 1] = n as f64;

    let lu = system.lu();

    let pivots = lu.u().diagonal();
    let max_pivot = pivots.iter().fold(0.0_f64, |m, p| m.max(p.abs()));
    let min_pivot = pivots.iter().fold(f64::INFINITY, |m, p| m.min(p.abs()));
    if !(min_pivot > max_pivot * n as f64 * f64::EPSILON) {
        return Err(RankError::NonConvergence {
            reason: "stationary distribution is not unique; the comparison graph is \
                     disconnected (increase regularization)"
                .into(),
        });
    }

    let dist = lu.solve(&rhs).ok_or_else(|| RankError::NonConvergence {
        reason: "stationary distribution could not be solved".into(),
    })?;

    if dist.iter().any(|p| !p.is_finite() || *p <= 0.0) {
        return Err(RankError::NonConvergence {
            reason: "some items have no stationary mass; they never won a comparison \
                     (increase regularization)"
                .into(),
        });
    }

    Ok(dist)
}

/// Fit one log-strength per dense id from directed win/loss evidence.
///
/// The evidence is shuffled with `rng` before fitting. The estimate itself does
/// not depend on pair order; the shuffle only keeps callers from relying on
/// it. `num_items = 0` yields an empty result.
pub fn fit_strengths<R: Rng + ?Sized>(
    num_items: usize,
    pairs: &[DirectedPair],
    options: &FitOptions,
    rng: &mut R,
) -> Result<Vec<f64>> {
    options.validate()?;

    let mut shuffled = pairs.to_vec();
    shuffled.shuffle(rng);

    let mut lsr = LuceSpectral::new(num_items, &shuffled, options.regularization)?;
    if lsr.num_items() == 0 {
        return Ok(Vec::new());
    }

    let iterations = lsr.calculate_params(options.max_iterations, options.tolerance)?;
    debug!(
        items = num_items,
        pairs = pairs.len(),
        iterations,
        regularization = options.regularization,
        "lsr fit converged"
    );

    Ok(lsr.params().to_vec())
}

/// Ordinal ranks from scores: ascending, so rank 1 is the weakest item and
/// rank N the strongest. Equal scores fall back to dense id order.
///
/// Returns `(dense_id, rank)` sorted by rank.
pub fn ordinal_ranks(scores: &[f64]) -> Vec<(DenseId, usize)> {
    let mut order: Vec<DenseId> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]).then(a.cmp(&b)));
    order.into_iter().enumerate().map(|(pos, dense)| (dense, pos + 1)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn pair(winner: usize, loser: usize) -> DirectedPair {
        DirectedPair { winner, loser }
    }

    fn options(regularization: f64) -> FitOptions {
        FitOptions { regularization, ..FitOptions::default() }
    }

    #[test]
    fn test_basic_ranking() {
        // 0 beats everyone, 1 beats 2
        let pairs = vec![pair(0, 1), pair(0, 2), pair(1, 2), pair(0, 1), pair(1, 0)];
        let mut rng = SmallRng::seed_from_u64(1);
        let params = fit_strengths(3, &pairs, &options(0.01), &mut rng).unwrap();

        assert!(params[0] > params[1]);
        assert!(params[1] > params[2]);
        let mean: f64 = params.iter().sum::<f64>() / 3.0;
        assert!(mean.abs() < 1e-9, "params should be centered, mean = {mean}");
    }

    #[test]
    fn test_matches_bradley_terry_mle() {
        // 2 wins vs 1 loss: MLE odds 2:1, so log-strength gap ln 2.
        let pairs = vec![pair(0, 1), pair(0, 1), pair(1, 0)];
        let mut rng = SmallRng::seed_from_u64(2);
        let params = fit_strengths(2, &pairs, &options(0.0), &mut rng).unwrap();
        assert!(
            (params[0] - params[1] - 2.0_f64.ln()).abs() < 1e-6,
            "gap = {}",
            params[0] - params[1]
        );
    }

    #[test]
    fn test_cycle_gives_equal_strengths() {
        let pairs = vec![pair(0, 1), pair(1, 2), pair(2, 0)];
        let mut rng = SmallRng::seed_from_u64(3);
        let params = fit_strengths(3, &pairs, &options(0.0), &mut rng).unwrap();
        for p in &params {
            assert!(p.abs() < 1e-6, "expected all zero, got {params:?}");
        }
    }

    #[test]
    fn test_tie_pairs_cancel() {
        // 0 and 1 only ever tie (both directions), each beats 2 once.
        let pairs = vec![pair(0, 1), pair(1, 0), pair(0, 2), pair(1, 2)];
        let mut rng = SmallRng::seed_from_u64(4);
        let params = fit_strengths(3, &pairs, &options(0.01), &mut rng).unwrap();
        assert!((params[0] - params[1]).abs() < 1e-6);
        assert!(params[2] < params[0]);
    }

    #[test]
    fn test_invariant_under_input_order() {
        let mut pairs = Vec::new();
        // Clear ladder 0 < 1 < 2 < 3 < 4 < 5 with some upsets
        for winner in 0..6 {
            for loser in 0..winner {
                pairs.push(pair(winner, loser));
                pairs.push(pair(winner, loser));
            }
        }
        pairs.push(pair(0, 5));
        pairs.push(pair(2, 3));

        let mut reference_rng = SmallRng::seed_from_u64(10);
        let reference = fit_strengths(6, &pairs, &options(0.01), &mut reference_rng).unwrap();
        let reference_ranks = ordinal_ranks(&reference);

        for seed in 0..8 {
            let mut permuted = pairs.clone();
            permuted.reverse();
            let mut rng = SmallRng::seed_from_u64(100 + seed);
            permuted.shuffle(&mut rng);

            let params = fit_strengths(6, &permuted, &options(0.01), &mut rng).unwrap();
            assert_eq!(ordinal_ranks(&params), reference_ranks);
            for (a, b) in params.iter().zip(&reference) {
                assert!((a - b).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_disconnected_graph_needs_regularization() {
        // {0, 1} and {2, 3} never meet
        let pairs = vec![pair(0, 1), pair(2, 3)];

        let mut rng = SmallRng::seed_from_u64(5);
        let err = fit_strengths(4, &pairs, &options(0.0), &mut rng).unwrap_err();
        assert!(matches!(err, RankError::NonConvergence { .. }), "got {err:?}");

        let params = fit_strengths(4, &pairs, &options(0.01), &mut rng).unwrap();
        assert_eq!(params.len(), 4);
        assert!(params.iter().all(|p| p.is_finite()));
        assert!(params[0] > params[1]);
        assert!(params[2] > params[3]);
    }

    #[test]
    fn test_item_that_never_wins_needs_regularization() {
        let pairs = vec![pair(0, 1)];
        let mut rng = SmallRng::seed_from_u64(6);
        assert!(matches!(
            fit_strengths(2, &pairs, &options(0.0), &mut rng),
            Err(RankError::NonConvergence { .. })
        ));
        let params = fit_strengths(2, &pairs, &options(0.01), &mut rng).unwrap();
        assert!(params[0] > params[1]);
    }

    #[test]
    fn test_iteration_cap_reports_non_convergence() {
        let pairs = vec![pair(0, 1), pair(0, 1), pair(1, 0), pair(1, 2)];
        let mut rng = SmallRng::seed_from_u64(7);
        let opts = FitOptions { regularization: 0.01, max_iterations: 1, tolerance: 1e-8 };
        assert!(matches!(
            fit_strengths(3, &pairs, &opts, &mut rng),
            Err(RankError::NonConvergence { .. })
        ));
    }

    #[test]
    fn test_rejects_out_of_range_ids() {
        let mut rng = SmallRng::seed_from_u64(8);
        let err = fit_strengths(2, &[pair(0, 2)], &options(0.01), &mut rng).unwrap_err();
        assert_eq!(err, RankError::DenseIdOutOfRange { index: 2, num_items: 2 });
    }

    #[test]
    fn test_rejects_self_pair() {
        let mut rng = SmallRng::seed_from_u64(9);
        let err = fit_strengths(2, &[pair(1, 1)], &options(0.01), &mut rng).unwrap_err();
        assert_eq!(err, RankError::SelfPair { index: 1 });
    }

    #[test]
    fn test_empty_and_single_item() {
        let mut rng = SmallRng::seed_from_u64(0);
        assert!(fit_strengths(0, &[], &options(0.01), &mut rng).unwrap().is_empty());
        assert_eq!(fit_strengths(1, &[], &options(0.01), &mut rng).unwrap(), vec![0.0]);
    }

    #[test]
    fn test_empty_model_has_nothing_to_fit() {
        let mut lsr = LuceSpectral::new(0, &[], 0.01).unwrap();
        assert_eq!(lsr.calculate_params(10, 1e-8).unwrap(), 0);
        assert!(lsr.params().is_empty());
    }

    #[test]
    fn test_new_rejects_bad_regularization() {
        for regularization in [-0.01, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                LuceSpectral::new(2, &[pair(0, 1)], regularization),
                Err(RankError::InvalidOption(_))
            ));
        }
    }

    #[test]
    fn test_ordinal_ranks_ascending() {
        let ranks = ordinal_ranks(&[0.3, -1.2, 2.0, 0.0]);
        assert_eq!(ranks, vec![(1, 1), (3, 2), (0, 3), (2, 4)]);
    }

    #[test]
    fn test_ordinal_ranks_tied_scores_use_dense_order() {
        let ranks = ordinal_ranks(&[1.0, 1.0, 0.5]);
        assert_eq!(ranks, vec![(2, 1), (0, 2), (1, 3)]);
    }
}
