//! Elo ratings for pairwise comparisons.
//!
//! `expected_score` and `update_ratings` are pure. `replay_elo` folds a whole
//! record set through them, one update per record, starting every item at the
//! same rating.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::constants::ELO_SCALE;
use crate::error::{RankError, Result};
use crate::lsr::ordinal_ranks;
use crate::types::{ComparisonRecord, DenseIdMap, EloOptions, Outcome, RatedItem};

/// Probability that an item rated `rating_self` beats one rated `rating_opponent`.
///
/// `expected_score(x, y) + expected_score(y, x) == 1` for all finite x, y.
pub fn expected_score(rating_self: f64, rating_opponent: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((rating_opponent - rating_self) / ELO_SCALE))
}

/// Apply one comparison to a pair of ratings and return the new pair.
///
/// Both tie codes move each rating toward a 0.5 score. The two deltas are only
/// equal and opposite because the expected scores sum to one.
pub fn update_ratings(rating_a: f64, rating_b: f64, k_factor: f64, outcome: Outcome) -> (f64, f64) {
    let p_a = expected_score(rating_a, rating_b);
    let p_b = expected_score(rating_b, rating_a);

    let (score_a, score_b) = match outcome {
        Outcome::FirstWins => (1.0, 0.0),
        Outcome::SecondWins => (0.0, 1.0),
        Outcome::TieTreatable | Outcome::TieNotTreatable => (0.5, 0.5),
    };

    (
        rating_a + k_factor * (score_a - p_a),
        rating_b + k_factor * (score_b - p_b),
    )
}

/// Replay every record of one annotator through Elo updates.
///
/// Records are validated up front, so a bad outcome code or a self-comparison
/// fails the whole replay before any rating moves. With `options.shuffle` the
/// replay order is drawn from `rng`; otherwise records are applied in order.
///
/// Returns one entry per distinct item, sorted by rank (1 = lowest rating).
pub fn replay_elo<R: Rng + ?Sized>(
    records: &[ComparisonRecord],
    options: &EloOptions,
    rng: &mut R,
) -> Result<Vec<RatedItem>> {
    options.validate()?;

    let id_map = DenseIdMap::from_records(records);
    if id_map.is_empty() {
        return Ok(Vec::new());
    }

    let mut games = Vec::with_capacity(records.len());
    for record in records {
        let outcome = record.outcome()?;
        if record.image0 == record.image1 {
            return Err(RankError::SelfComparison { item: record.image0 });
        }
        let a = id_map.densify(record.image0)?;
        let b = id_map.densify(record.image1)?;
        games.push((a, b, outcome));
    }

    if options.shuffle {
        games.shuffle(rng);
    }

    let num_items = id_map.len();
    let mut ratings = vec![options.initial_rating; num_items];
    let mut games_played = vec![0usize; num_items];

    for &(a, b, outcome) in &games {
        let (new_a, new_b) = update_ratings(ratings[a], ratings[b], options.k_factor, outcome);
        ratings[a] = new_a;
        ratings[b] = new_b;
        games_played[a] += 1;
        games_played[b] += 1;
    }

    debug!(items = num_items, games = games.len(), shuffled = options.shuffle, "elo replay finished");

    ordinal_ranks(&ratings)
        .into_iter()
        .map(|(dense, rank)| {
            let item = id_map.to_item(dense).ok_or(RankError::UnmappedDenseId { index: dense })?;
            Ok(RatedItem { item, rating: ratings[dense], games: games_played[dense], rank })
        })
        .collect()
}
