//! gplink Extractor - Score decoding and evaluation
//!
//! Turns encoder score arrays into discrete extraction results:
//! - Span decoding from global-pointer grids
//! - Relation triple decoding from GPLinker span/head/tail grids
//! - Entity decoding from BIO tag sequences
//! - Label ranking from classification logits
//!
//! and accumulates F1 metrics over the decoded structures.
//!
//! Decoders are pure and hold only immutable configuration, so one instance
//! can be shared across threads. With the `parallel` feature, batch decoding
//! spreads examples over the rayon thread pool.

pub mod bio;
pub mod classify;
pub mod metrics;
pub mod span;
pub mod triple;

pub use bio::{bio_entities, SequenceTagDecoder};
pub use classify::ClassificationDecoder;
pub use metrics::{ChunkF1, F1Counts, MacroF1, Metric, MetricsReport, SetF1, SpanF1, TripleF1};
pub use span::SpanDecoder;
pub use triple::TripleDecoder;

pub use gplink_core::{
    GplinkError, LabelScore, LabelVocab, Result, ScoreGrid, Span, SubjectEnd, TaggedEntity, Triple,
};

use ndarray::{ArrayView2, ArrayView4, Axis};

/// Split a `[B, C, L, L]` batch into per-example grids, attaching row `b`
/// of the `[B, L]` mask to example `b`.
pub(crate) fn batch_grids<'a>(
    scores: ArrayView4<'a, f32>,
    mask: Option<ArrayView2<'_, bool>>,
) -> Result<Vec<ScoreGrid<'a>>> {
    let batch = scores.len_of(Axis(0));

    if let Some(mask) = &mask {
        if mask.len_of(Axis(0)) != batch {
            return Err(GplinkError::ShapeMismatch {
                expected: format!("mask with {} rows", batch),
                actual: format!("{:?}", mask.shape()),
            });
        }
    }

    (0..batch)
        .map(|b| {
            let grid = ScoreGrid::new(scores.index_axis_move(Axis(0), b))?;
            match &mask {
                Some(mask) => grid.with_mask(&mask.row(b).to_vec()),
                None => Ok(grid),
            }
        })
        .collect()
}

/// Run `decode` for every example index, in parallel when enabled.
/// Output order always follows input order.
pub(crate) fn map_examples<T, F>(count: usize, decode: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> Result<T> + Send + Sync,
{
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        (0..count).into_par_iter().map(decode).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        (0..count).map(decode).collect()
    }
}
