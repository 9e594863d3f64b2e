//! annorank-core: Pure-computation ranking from multi-annotator pairwise comparisons.
//!
//! Annotation records → per-annotator item ranks, via Elo replay or iterative
//! Luce spectral ranking (Bradley-Terry maximum likelihood). No IO, no
//! filesystem, no global state; randomness comes from a caller-supplied RNG.
//!
//! Items are identified by caller-provided `i64` IDs, which may be sparse. Each
//! annotator run maps them to dense indices internally and maps results back,
//! so callers never see indices.
//!
//! # Quick start
//!
//! ```rust
//! use annorank_core::{rank_annotator, ComparisonRecord, FitOptions};
//! use rand::SeedableRng;
//!
//! // winner: 1 = image0 won, 0 = image1 won, -1 / -2 = tie
//! let records = vec![
//!     ComparisonRecord { image0: 65, image1: 70, winner: 1 },
//!     ComparisonRecord { image0: 70, image1: 81, winner: 0 },
//!     ComparisonRecord { image0: 65, image1: 81, winner: -1 },
//! ];
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(0);
//! let table = rank_annotator("Alryalat", &records, &FitOptions::default(), &mut rng).unwrap();
//!
//! // Rank 1 is the weakest item.
//! assert_eq!(table.rank_of(70), Some(1));
//! for row in &table.rows {
//!     println!("{} {}: rank {} ({:.4})", row.annotator, row.item, row.rank, row.score);
//! }
//! ```

pub mod constants;
pub mod elo;
pub mod error;
pub mod extract;
pub mod lsr;
pub mod ranking;
pub mod types;

// Re-export primary public API at crate root.
pub use elo::{expected_score, replay_elo, update_ratings};
pub use error::{RankError, Result};
pub use extract::{collect_evidence, expand_tie, extract_pair, Evidence};
pub use lsr::{fit_strengths, ordinal_ranks};
pub use ranking::{
    combined_records, merge_rank_tables, rank_annotator, rank_annotator_elo, rank_annotators,
    remap_ranks, AnnotatorRecords, RankMethod,
};
pub use types::{
    ComparisonRecord, DenseId, DenseIdMap, DirectedPair, EloOptions, Extracted, FitOptions,
    ItemId, Outcome, RankRow, RankTable, RatedItem, TieMarker, WideRankRow, WideRankTable,
};
