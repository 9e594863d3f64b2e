//! Turning annotation records into directed evidence for the fitter.
//!
//! Decisive records become one `winner beat loser` pair. Ties become two pairs,
//! one in each direction: they cancel in the fitted strengths but still link
//! the two items in the comparison graph.

use crate::error::{RankError, Result};
use crate::types::{ComparisonRecord, DenseIdMap, DirectedPair, Extracted, Outcome, TieMarker};

/// Classify one record against `id_map`.
///
/// Fails on an unrecognized outcome code, on a record comparing an item with
/// itself, and on ids missing from the map.
pub fn extract_pair(record: &ComparisonRecord, id_map: &DenseIdMap) -> Result<Extracted> {
    let outcome = record.outcome()?;
    if record.image0 == record.image1 {
        return Err(RankError::SelfComparison { item: record.image0 });
    }

    let first = id_map.densify(record.image0)?;
    let second = id_map.densify(record.image1)?;

    if outcome.is_tie() {
        return Ok(Extracted::Tie(TieMarker { first, second }));
    }

    let pair = if outcome == Outcome::FirstWins {
        DirectedPair::new(first, second)
    } else {
        DirectedPair::new(second, first)
    };
    Ok(Extracted::Pair(pair))
}

/// Split a tie into both directions: `second` over `first`, then `first` over `second`.
pub fn expand_tie(tie: TieMarker) -> (DirectedPair, DirectedPair) {
    let toward_second = DirectedPair::new(tie.second, tie.first);
    (toward_second, toward_second.reversed())
}

/// Full evidence list for one annotator, before shuffling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evidence {
    /// Expanded tie pairs first, then decisive pairs, each in record order.
    pub pairs: Vec<DirectedPair>,
    pub tie_records: usize,
    pub decisive_records: usize,
}

/// Extract every record and expand its ties.
///
/// Stops at the first bad record. Dropping it instead would change the
/// ranking depending on how many bad records there are.
pub fn collect_evidence(records: &[ComparisonRecord], id_map: &DenseIdMap) -> Result<Evidence> {
    let mut tie_pairs = Vec::new();
    let mut decisive = Vec::new();

    for record in records {
        match extract_pair(record, id_map)? {
            Extracted::Pair(pair) => decisive.push(pair),
            Extracted::Tie(tie) => {
                let (a, b) = expand_tie(tie);
                tie_pairs.push(a);
                tie_pairs.push(b);
            }
        }
    }

    let tie_records = tie_pairs.len() / 2;
    let decisive_records = decisive.len();
    tie_pairs.extend(decisive);

    Ok(Evidence { pairs: tie_pairs, tie_records, decisive_records })
}
