use thiserror::Error;

use crate::types::{DenseId, ItemId};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RankError {
    /// Winner code outside {1, 0, -1, -2}.
    #[error("unrecognized outcome code {code} (expected 1, 0, -1 or -2)")]
    InvalidOutcomeCode { code: i64 },

    #[error("item {item} is compared against itself")]
    SelfComparison { item: ItemId },

    #[error("item {item} is not part of this annotator's item set")]
    UnknownItem { item: ItemId },

    /// The fitter could not produce finite strengths. Usually a disconnected or
    /// one-sided comparison graph with too little regularization; retrying
    /// with a larger regularization is the caller's call.
    #[error("ranking model did not converge: {reason}")]
    NonConvergence { reason: String },

    #[error("dense id {index} out of range (num_items = {num_items})")]
    DenseIdOutOfRange { index: DenseId, num_items: usize },

    #[error("directed pair has dense id {index} on both sides")]
    SelfPair { index: DenseId },

    #[error("dense id {index} has no original item id")]
    UnmappedDenseId { index: DenseId },

    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// Any of the above, tagged with the annotator whose run failed.
    #[error("annotator {name}: {source}")]
    Annotator {
        name: String,
        #[source]
        source: Box<RankError>,
    },
}

impl RankError {
    pub(crate) fn for_annotator(self, name: &str) -> Self {
        RankError::Annotator { name: name.to_string(), source: Box::new(self) }
    }

    /// The underlying error, with any annotator tag stripped.
    pub fn root(&self) -> &RankError {
        match self {
            RankError::Annotator { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, RankError>;
