use std::collections::HashMap;

use crate::constants::{
    DEFAULT_INITIAL_RATING, DEFAULT_K_FACTOR, DEFAULT_MAX_ITERATIONS, DEFAULT_REGULARIZATION,
    DEFAULT_TOLERANCE,
};
use crate::error::{RankError, Result};

/// Caller-provided item identifier (e.g. an image id). May be sparse and need
/// not start at zero.
pub type ItemId = i64;

/// Zero-based contiguous index assigned to an item within one annotator's run.
pub type DenseId = usize;

/// Verdict of a single annotation.
///
/// The two tie variants are kept apart so they survive a round trip through
/// the raw code, but every ranking method in this crate treats them the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Outcome {
    /// `image0` won (code `1`).
    FirstWins,
    /// `image1` won (code `0`).
    SecondWins,
    /// Both equally treatable (code `-1`).
    TieTreatable,
    /// Both equally not treatable (code `-2`).
    TieNotTreatable,
}

impl Outcome {
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            1 => Ok(Outcome::FirstWins),
            0 => Ok(Outcome::SecondWins),
            -1 => Ok(Outcome::TieTreatable),
            -2 => Ok(Outcome::TieNotTreatable),
            other => Err(RankError::InvalidOutcomeCode { code: other }),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Outcome::FirstWins => 1,
            Outcome::SecondWins => 0,
            Outcome::TieTreatable => -1,
            Outcome::TieNotTreatable => -2,
        }
    }

    pub fn is_tie(self) -> bool {
        matches!(self, Outcome::TieTreatable | Outcome::TieNotTreatable)
    }
}

impl TryFrom<i64> for Outcome {
    type Error = RankError;

    fn try_from(code: i64) -> Result<Self> {
        Outcome::from_code(code)
    }
}

/// One raw annotation: two items and the annotator's verdict code.
///
/// Field names follow the annotation export (`image0`, `image1`, `winner`).
/// The code is kept raw so an unrecognized value is reported where the record
/// is consumed instead of being lost at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComparisonRecord {
    pub image0: ItemId,
    pub image1: ItemId,
    /// 1 = image0 won, 0 = image1 won, -1 / -2 = tie.
    pub winner: i64,
}

impl ComparisonRecord {
    pub fn new(image0: ItemId, image1: ItemId, outcome: Outcome) -> Self {
        ComparisonRecord { image0, image1, winner: outcome.code() }
    }

    pub fn outcome(&self) -> Result<Outcome> {
        Outcome::from_code(self.winner)
    }
}

/// One unit of evidence for the fitter: `winner` beat `loser`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirectedPair {
    pub winner: DenseId,
    pub loser: DenseId,
}

impl DirectedPair {
    pub fn new(winner: DenseId, loser: DenseId) -> Self {
        DirectedPair { winner, loser }
    }

    pub fn reversed(self) -> Self {
        DirectedPair { winner: self.loser, loser: self.winner }
    }
}

/// A tie between two dense ids, in record order. Direction carries no meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TieMarker {
    pub first: DenseId,
    pub second: DenseId,
}

/// What the extractor makes of a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extracted {
    Pair(DirectedPair),
    Tie(TieMarker),
}

/// Bijection between caller item ids and dense `0..N` indices.
///
/// Dense ids follow ascending item id order, so building the map twice from
/// the same id set always yields the same assignment. One map belongs to one
/// annotator's run; different annotators may reference different item subsets.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseIdMap {
    ids: Vec<ItemId>,
    id_to_dense: HashMap<ItemId, DenseId>,
}

impl DenseIdMap {
    /// Build the map from any collection of ids. Duplicates collapse.
    pub fn from_items<I>(items: I) -> Self
    where
        I: IntoIterator<Item = ItemId>,
    {
        let mut ids: Vec<ItemId> = items.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();

        let id_to_dense = ids.iter().enumerate().map(|(dense, &id)| (id, dense)).collect();
        DenseIdMap { ids, id_to_dense }
    }

    /// Map of every item referenced on either side of `records`.
    pub fn from_records(records: &[ComparisonRecord]) -> Self {
        Self::from_items(records.iter().flat_map(|r| [r.image0, r.image1]))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn to_dense(&self, id: ItemId) -> Option<DenseId> {
        self.id_to_dense.get(&id).copied()
    }

    pub fn to_item(&self, dense: DenseId) -> Option<ItemId> {
        self.ids.get(dense).copied()
    }

    pub(crate) fn densify(&self, id: ItemId) -> Result<DenseId> {
        self.to_dense(id).ok_or(RankError::UnknownItem { item: id })
    }

    /// Item ids in dense order (ascending).
    pub fn items(&self) -> &[ItemId] {
        &self.ids
    }
}

/// One row of an annotator's rank table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankRow {
    pub annotator: String,
    pub item: ItemId,
    /// 1 = weakest, N = strongest.
    pub rank: usize,
    /// Fitted log-strength (ILSR) or final rating (Elo) behind the rank.
    pub score: f64,
    /// Records this annotator has that mention the item.
    pub comparisons: usize,
}

/// Ranks for every item one annotator compared, sorted by rank ascending.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankTable {
    pub annotator: String,
    pub rows: Vec<RankRow>,
}

impl RankTable {
    pub fn empty(annotator: &str) -> Self {
        RankTable { annotator: annotator.to_string(), rows: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rank_of(&self, item: ItemId) -> Option<usize> {
        self.rows.iter().find(|r| r.item == item).map(|r| r.rank)
    }
}

/// Row of the merged table: one item, one optional rank per annotator column.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WideRankRow {
    pub item: ItemId,
    /// Same order as `WideRankTable::annotators`. `None` where that annotator
    /// never compared the item.
    pub ranks: Vec<Option<usize>>,
    /// Records mentioning the item across all annotators. The pooled
    /// `Combined` table is not counted again.
    pub comparisons: usize,
}

/// All annotators' ranks keyed by item id, ascending.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WideRankTable {
    pub annotators: Vec<String>,
    pub rows: Vec<WideRankRow>,
}

/// Options for the Luce spectral fitter.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FitOptions {
    /// Additive pseudo-rate between every pair of items (e.g. 0.01).
    pub regularization: f64,
    /// Iteration cap before reporting non-convergence.
    pub max_iterations: usize,
    /// L1 tolerance on successive centered parameter vectors.
    pub tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            regularization: DEFAULT_REGULARIZATION,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl FitOptions {
    pub fn validate(&self) -> Result<()> {
        if !self.regularization.is_finite() || self.regularization < 0.0 {
            return Err(RankError::InvalidOption(format!(
                "regularization must be finite and >= 0, got {}",
                self.regularization
            )));
        }
        if self.max_iterations == 0 {
            return Err(RankError::InvalidOption("max_iterations must be at least 1".into()));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(RankError::InvalidOption(format!(
                "tolerance must be finite and > 0, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Options for replaying comparisons through Elo updates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EloOptions {
    pub k_factor: f64,
    pub initial_rating: f64,
    /// Replay records in random order instead of record order.
    pub shuffle: bool,
}

impl Default for EloOptions {
    fn default() -> Self {
        EloOptions {
            k_factor: DEFAULT_K_FACTOR,
            initial_rating: DEFAULT_INITIAL_RATING,
            shuffle: false,
        }
    }
}

impl EloOptions {
    pub fn validate(&self) -> Result<()> {
        if !self.k_factor.is_finite() || self.k_factor <= 0.0 {
            return Err(RankError::InvalidOption(format!(
                "k_factor must be finite and > 0, got {}",
                self.k_factor
            )));
        }
        if !self.initial_rating.is_finite() {
            return Err(RankError::InvalidOption("initial_rating must be finite".into()));
        }
        Ok(())
    }
}

/// Final Elo state of one item after a replay.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RatedItem {
    pub item: ItemId,
    pub rating: f64,
    /// Number of replayed comparisons the item took part in.
    pub games: usize,
    /// 1 = lowest rating.
    pub rank: usize,
}
