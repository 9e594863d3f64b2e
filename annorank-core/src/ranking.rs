//! Per-annotator ranking pipeline.
//!
//! records → dense id map → directed evidence (ties expanded) → fitted
//! strengths → ordinal ranks → rows keyed by the caller's item ids.
//!
//! Every run builds its own dense map and returns its own table. Nothing is
//! shared between annotators, so the caller decides how to merge results.

use std::collections::BTreeMap;

use rand::Rng;
use tracing::debug;

use crate::constants::COMBINED_ANNOTATOR;
use crate::elo::replay_elo;
use crate::error::{RankError, Result};
use crate::extract::collect_evidence;
use crate::lsr::{fit_strengths, ordinal_ranks};
use crate::types::{
    ComparisonRecord, DenseId, DenseIdMap, EloOptions, FitOptions, RankRow, RankTable,
    WideRankRow, WideRankTable,
};

/// One annotator's name and raw records.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnnotatorRecords {
    pub name: String,
    pub records: Vec<ComparisonRecord>,
}

impl AnnotatorRecords {
    pub fn new(name: impl Into<String>, records: Vec<ComparisonRecord>) -> Self {
        AnnotatorRecords { name: name.into(), records }
    }
}

/// Which ranking method turns records into ranks.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RankMethod {
    /// Batch maximum likelihood via iterative Luce spectral ranking.
    Spectral(FitOptions),
    /// Sequential Elo replay.
    Elo(EloOptions),
}

/// Map dense ranks back to the caller's item ids.
///
/// `scores[dense]` and `comparisons[dense]` are recorded next to each rank. A
/// dense id without an item id cannot happen with a map built from the same
/// records; it is still an error rather than a panic.
pub fn remap_ranks(
    dense_ranks: &[(DenseId, usize)],
    scores: &[f64],
    comparisons: &[usize],
    id_map: &DenseIdMap,
    annotator: &str,
) -> Result<Vec<RankRow>> {
    let out_of_range = |index: DenseId, num_items: usize| RankError::DenseIdOutOfRange { index, num_items };

    dense_ranks
        .iter()
        .map(|&(dense, rank)| {
            let item = id_map.to_item(dense).ok_or(RankError::UnmappedDenseId { index: dense })?;
            let score = *scores.get(dense).ok_or_else(|| out_of_range(dense, scores.len()))?;
            let comparisons =
                *comparisons.get(dense).ok_or_else(|| out_of_range(dense, comparisons.len()))?;
            Ok(RankRow { annotator: annotator.to_string(), item, rank, score, comparisons })
        })
        .collect()
}

/// Number of records mentioning each dense id.
fn comparison_counts(records: &[ComparisonRecord], id_map: &DenseIdMap) -> Result<Vec<usize>> {
    let mut counts = vec![0usize; id_map.len()];
    for record in records {
        counts[id_map.densify(record.image0)?] += 1;
        counts[id_map.densify(record.image1)?] += 1;
    }
    Ok(counts)
}

/// Rank one annotator's items with the spectral fitter.
///
/// An annotator with no records gets an empty table.
pub fn rank_annotator<R: Rng + ?Sized>(
    name: &str,
    records: &[ComparisonRecord],
    options: &FitOptions,
    rng: &mut R,
) -> Result<RankTable> {
    let id_map = DenseIdMap::from_records(records);
    if id_map.is_empty() {
        debug!(annotator = name, "no comparisons, empty rank table");
        return Ok(RankTable::empty(name));
    }

    let evidence = collect_evidence(records, &id_map)?;
    debug!(
        annotator = name,
        items = id_map.len(),
        records = records.len(),
        ties = evidence.tie_records,
        pairs = evidence.pairs.len(),
        "fitting annotator"
    );

    let params = fit_strengths(id_map.len(), &evidence.pairs, options, rng)?;
    let comparisons = comparison_counts(records, &id_map)?;
    let rows = remap_ranks(&ordinal_ranks(&params), &params, &comparisons, &id_map, name)?;

    Ok(RankTable { annotator: name.to_string(), rows })
}

/// Rank one annotator's items by replaying their records through Elo.
pub fn rank_annotator_elo<R: Rng + ?Sized>(
    name: &str,
    records: &[ComparisonRecord],
    options: &EloOptions,
    rng: &mut R,
) -> Result<RankTable> {
    let rows = replay_elo(records, options, rng)?
        .into_iter()
        .map(|rated| RankRow {
            annotator: name.to_string(),
            item: rated.item,
            rank: rated.rank,
            score: rated.rating,
            comparisons: rated.games,
        })
        .collect();

    Ok(RankTable { annotator: name.to_string(), rows })
}

/// Every annotator's records concatenated in order.
pub fn combined_records(annotators: &[AnnotatorRecords]) -> Vec<ComparisonRecord> {
    annotators.iter().flat_map(|a| a.records.iter().copied()).collect()
}

/// Rank each annotator in order, then the pooled `Combined` annotator if
/// `include_combined` is set.
///
/// Errors carry the name of the annotator that failed.
pub fn rank_annotators<R: Rng + ?Sized>(
    annotators: &[AnnotatorRecords],
    include_combined: bool,
    method: &RankMethod,
    rng: &mut R,
) -> Result<Vec<RankTable>> {
    let run = |name: &str, records: &[ComparisonRecord], rng: &mut R| {
        let table = match method {
            RankMethod::Spectral(options) => rank_annotator(name, records, options, rng),
            RankMethod::Elo(options) => rank_annotator_elo(name, records, options, rng),
        };
        table.map_err(|e| e.for_annotator(name))
    };

    let mut tables = Vec::with_capacity(annotators.len() + usize::from(include_combined));
    for annotator in annotators {
        tables.push(run(&annotator.name, &annotator.records, &mut *rng)?);
    }

    if include_combined {
        let pooled = combined_records(annotators);
        tables.push(run(COMBINED_ANNOTATOR, &pooled, &mut *rng)?);
    }

    Ok(tables)
}

/// Pivot rank tables into one row per item (ascending id), one column per table.
///
/// Comparison counts are summed over every table except the `Combined` pool,
/// which would count each record twice.
pub fn merge_rank_tables(tables: &[RankTable]) -> WideRankTable {
    let annotators: Vec<String> = tables.iter().map(|t| t.annotator.clone()).collect();
    let mut by_item: BTreeMap<i64, WideRankRow> = BTreeMap::new();

    for (column, table) in tables.iter().enumerate() {
        let pooled = table.annotator == COMBINED_ANNOTATOR;
        for row in &table.rows {
            let wide = by_item.entry(row.item).or_insert_with(|| WideRankRow {
                item: row.item,
                ranks: vec![None; tables.len()],
                comparisons: 0,
            });
            wide.ranks[column] = Some(row.rank);
            if !pooled {
                wide.comparisons += row.comparisons;
            }
        }
    }

    WideRankTable { annotators, rows: by_item.into_values().collect() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Outcome;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn record(image0: i64, image1: i64, winner: i64) -> ComparisonRecord {
        ComparisonRecord { image0, image1, winner }
    }

    fn assert_is_permutation(table: &RankTable) {
        let mut ranks: Vec<usize> = table.rows.iter().map(|r| r.rank).collect();
        ranks.sort_unstable();
        assert_eq!(ranks, (1..=table.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_win_win_tie_scenario() {
        // A beats B, C beats B, A ties C
        let (a, b, c) = (1, 2, 3);
        let records = vec![record(a, b, 1), record(b, c, 0), record(a, c, -1)];

        let mut rng = SmallRng::seed_from_u64(42);
        let table = rank_annotator("Lazcano", &records, &FitOptions::default(), &mut rng).unwrap();

        assert_eq!(table.len(), 3);
        assert_is_permutation(&table);
        assert_eq!(table.rank_of(b), Some(1));
        let mut top = [table.rank_of(a).unwrap(), table.rank_of(c).unwrap()];
        top.sort_unstable();
        assert_eq!(top, [2, 3]);

        let score_a = table.rows.iter().find(|r| r.item == a).unwrap().score;
        let score_c = table.rows.iter().find(|r| r.item == c).unwrap().score;
        assert!((score_a - score_c).abs() < 1e-6);
        assert!(table.rows.iter().all(|r| r.annotator == "Lazcano"));
    }

    #[test]
    fn test_single_comparison() {
        let records = vec![record(500, 17, 1)];
        let mut rng = SmallRng::seed_from_u64(1);
        let table = rank_annotator("Malik", &records, &FitOptions::default(), &mut rng).unwrap();

        assert_eq!(table.rank_of(17), Some(1));
        assert_eq!(table.rank_of(500), Some(2));
        // Rows come back worst first
        assert_eq!(table.rows[0].item, 17);
    }

    #[test]
    fn test_sparse_ids_map_back() {
        // Ids from a stacked image set: start at 65, with gaps
        let records = vec![
            record(65, 158, 0),
            record(158, 100, 1),
            record(100, 65, 1),
            record(158, 65, 1),
        ];
        let mut rng = SmallRng::seed_from_u64(2);
        let table = rank_annotator("Seibold", &records, &FitOptions::default(), &mut rng).unwrap();

        assert_is_permutation(&table);
        assert_eq!(table.rank_of(158), Some(3));
        assert_eq!(table.rank_of(100), Some(2));
        assert_eq!(table.rank_of(65), Some(1));
    }

    #[test]
    fn test_both_tie_codes_rank_identically() {
        let base = vec![
            record(1, 2, 1),
            record(1, 2, 1),
            record(2, 3, 1),
            record(2, 3, 1),
            record(3, 4, 1),
            record(3, 4, 1),
            record(1, 3, 1),
            record(2, 4, 1),
        ];
        let mut treatable = base.clone();
        treatable.push(record(2, 3, -1));
        let mut not_treatable = base;
        not_treatable.push(record(2, 3, -2));

        let t1 = rank_annotator("x", &treatable, &FitOptions::default(), &mut SmallRng::seed_from_u64(5)).unwrap();
        let t2 = rank_annotator("x", &not_treatable, &FitOptions::default(), &mut SmallRng::seed_from_u64(9)).unwrap();
        for item in 1..=4 {
            assert_eq!(t1.rank_of(item), t2.rank_of(item));
            assert_eq!(t1.rank_of(item), Some(5 - item as usize));
        }
    }

    #[test]
    fn test_empty_annotator() {
        let mut rng = SmallRng::seed_from_u64(0);
        let table = rank_annotator("Ittoop", &[], &FitOptions::default(), &mut rng).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.annotator, "Ittoop");
    }

    #[test]
    fn test_invalid_code_is_reported() {
        let records = vec![record(1, 2, 1), record(2, 3, 3)];
        let mut rng = SmallRng::seed_from_u64(0);
        let err = rank_annotator("x", &records, &FitOptions::default(), &mut rng).unwrap_err();
        assert_eq!(err, RankError::InvalidOutcomeCode { code: 3 });
    }

    #[test]
    fn test_disconnected_pipeline() {
        let records = vec![record(1, 2, 1), record(3, 4, 1)];
        let no_reg = FitOptions { regularization: 0.0, ..FitOptions::default() };

        let mut rng = SmallRng::seed_from_u64(0);
        let err = rank_annotator("x", &records, &no_reg, &mut rng).unwrap_err();
        assert!(matches!(err, RankError::NonConvergence { .. }));

        let table = rank_annotator("x", &records, &FitOptions::default(), &mut rng).unwrap();
        assert_eq!(table.len(), 4);
        assert_is_permutation(&table);
    }

    #[test]
    fn test_ranks_are_permutation_on_random_data() {
        let mut data_rng = SmallRng::seed_from_u64(77);
        let records: Vec<ComparisonRecord> = (0..300)
            .filter_map(|_| {
                let a = data_rng.random_range(0..40) * 3 + 11;
                let b = data_rng.random_range(0..40) * 3 + 11;
                let code = [1, 0, -1, -2][data_rng.random_range(0..4)];
                (a != b).then(|| record(a, b, code))
            })
            .collect();

        let mut rng = SmallRng::seed_from_u64(78);
        let table = rank_annotator("x", &records, &FitOptions::default(), &mut rng).unwrap();
        let map = DenseIdMap::from_records(&records);
        assert_eq!(table.len(), map.len());
        assert_is_permutation(&table);
    }

    #[test]
    fn test_remap_rejects_unknown_dense_id() {
        let map = DenseIdMap::from_items([5, 6]);
        let err =
            remap_ranks(&[(0, 1), (2, 2)], &[0.0, 0.0, 0.0], &[1, 1, 1], &map, "x").unwrap_err();
        assert_eq!(err, RankError::UnmappedDenseId { index: 2 });
    }

    #[test]
    fn test_spectral_rows_count_comparisons() {
        let records = vec![record(4, 9, 1), record(9, 12, -1), record(4, 12, 0), record(4, 9, 0)];
        let mut rng = SmallRng::seed_from_u64(3);
        let table = rank_annotator("Ittoop", &records, &FitOptions::default(), &mut rng).unwrap();

        let count = |item| table.rows.iter().find(|r| r.item == item).unwrap().comparisons;
        assert_eq!(count(4), 3);
        assert_eq!(count(9), 3);
        // A tie counts once, not once per expanded pair
        assert_eq!(count(12), 2);
    }

    #[test]
    fn test_elo_method_table() {
        let records = vec![
            ComparisonRecord::new(7, 8, Outcome::FirstWins),
            ComparisonRecord::new(8, 9, Outcome::FirstWins),
        ];
        let mut rng = SmallRng::seed_from_u64(0);
        let table = rank_annotator_elo("x", &records, &EloOptions::default(), &mut rng).unwrap();
        assert_eq!(table.rank_of(9), Some(1));
        assert_eq!(table.rank_of(7), Some(3));
        assert!(table.rows[2].score > 1000.0);

        let count = |item| table.rows.iter().find(|r| r.item == item).unwrap().comparisons;
        assert_eq!((count(7), count(8), count(9)), (1, 2, 1));
    }

    #[test]
    fn test_rank_annotators_with_combined() {
        let annotators = vec![
            AnnotatorRecords::new("Alryalat", vec![record(1, 2, 1), record(2, 3, 1)]),
            AnnotatorRecords::new("Malik", vec![record(3, 4, 0), record(1, 4, -2)]),
        ];
        let mut rng = SmallRng::seed_from_u64(11);
        let tables =
            rank_annotators(&annotators, true, &RankMethod::Spectral(FitOptions::default()), &mut rng)
                .unwrap();

        let names: Vec<&str> = tables.iter().map(|t| t.annotator.as_str()).collect();
        assert_eq!(names, vec!["Alryalat", "Malik", COMBINED_ANNOTATOR]);
        assert_eq!(tables[0].len(), 3);
        assert_eq!(tables[1].len(), 3);
        assert_eq!(tables[2].len(), 4);
        for table in &tables {
            assert_is_permutation(table);
        }
    }

    #[test]
    fn test_rank_annotators_tags_failures() {
        let annotators = vec![
            AnnotatorRecords::new("ok", vec![record(1, 2, 1)]),
            AnnotatorRecords::new("broken", vec![record(1, 2, 4)]),
        ];
        let mut rng = SmallRng::seed_from_u64(0);
        let err = rank_annotators(&annotators, false, &RankMethod::Elo(EloOptions::default()), &mut rng)
            .unwrap_err();

        match &err {
            RankError::Annotator { name, .. } => assert_eq!(name, "broken"),
            other => panic!("expected annotator error, got {other:?}"),
        }
        assert_eq!(err.root(), &RankError::InvalidOutcomeCode { code: 4 });
        assert!(err.to_string().starts_with("annotator broken:"));
    }

    #[test]
    fn test_merge_rank_tables() {
        let row = |annotator: &str, item, rank, comparisons| RankRow {
            annotator: annotator.to_string(),
            item,
            rank,
            score: 0.0,
            comparisons,
        };
        let tables = vec![
            RankTable { annotator: "a".into(), rows: vec![row("a", 20, 1, 1), row("a", 10, 2, 1)] },
            RankTable { annotator: "b".into(), rows: vec![row("b", 30, 1, 2), row("b", 10, 2, 2)] },
            RankTable {
                annotator: COMBINED_ANNOTATOR.into(),
                rows: vec![
                    row(COMBINED_ANNOTATOR, 20, 1, 1),
                    row(COMBINED_ANNOTATOR, 30, 2, 2),
                    row(COMBINED_ANNOTATOR, 10, 3, 3),
                ],
            },
        ];

        let wide = merge_rank_tables(&tables);
        assert_eq!(wide.annotators, vec!["a", "b", COMBINED_ANNOTATOR]);
        assert_eq!(
            wide.rows,
            vec![
                WideRankRow { item: 10, ranks: vec![Some(2), Some(2), Some(3)], comparisons: 3 },
                WideRankRow { item: 20, ranks: vec![Some(1), None, Some(1)], comparisons: 1 },
                WideRankRow { item: 30, ranks: vec![None, Some(1), Some(2)], comparisons: 2 },
            ]
        );
    }
}
