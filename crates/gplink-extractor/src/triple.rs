//! Relation triple decoding for GPLinker heads
//!
//! Three grids are combined per sequence:
//! - span grid `[2, L, L]`: channel 0 scores subject spans, channel 1 object spans
//! - head grid `[P, L, L]`: per predicate, subject start aligned to object start
//! - tail grid `[P, L, L]`: per predicate, subject end aligned to object end
//!
//! Every subject candidate is paired with every object candidate. A predicate
//! links the pair when both its head alignment and its tail alignment clear
//! the threshold.

use std::collections::{BTreeSet, HashSet};

use ndarray::{ArrayView2, ArrayView4, Axis};

use gplink_core::{
    DecodeConfig, GplinkError, LabelVocab, Result, ScoreGrid, SubjectEnd, Triple,
};

use crate::{batch_grids, map_examples};

const SUBJECT_CHANNEL: usize = 0;
const OBJECT_CHANNEL: usize = 1;

/// Decoder for GPLinker span/head/tail grids
#[derive(Debug, Clone)]
pub struct TripleDecoder {
    predicates: LabelVocab,
    threshold: f32,
    subject_end: SubjectEnd,
}

impl TripleDecoder {
    /// Create a decoder for the given predicates (one per head/tail channel)
    pub fn new(predicates: LabelVocab, threshold: f32) -> Self {
        Self {
            predicates,
            threshold,
            subject_end: SubjectEnd::default(),
        }
    }

    pub fn from_config(predicates: LabelVocab, config: &DecodeConfig) -> Self {
        Self::new(predicates, config.threshold).with_subject_end(config.subject_end)
    }

    /// Choose what fills the subject-end field of emitted triples
    pub fn with_subject_end(mut self, subject_end: SubjectEnd) -> Self {
        self.subject_end = subject_end;
        self
    }

    pub fn predicates(&self) -> &LabelVocab {
        &self.predicates
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn subject_end(&self) -> SubjectEnd {
        self.subject_end
    }

    /// Decode one sequence.
    ///
    /// Candidate spans are read from the upper triangle of `spans` and
    /// respect its mask. `heads` and `tails` are read at candidate
    /// boundaries only, so their masks are not consulted.
    pub fn decode(
        &self,
        spans: &ScoreGrid<'_>,
        heads: &ScoreGrid<'_>,
        tails: &ScoreGrid<'_>,
    ) -> Result<HashSet<Triple>> {
        self.check_shapes(spans, heads, tails)?;

        let subjects: Vec<(usize, usize)> =
            spans.positions_above(SUBJECT_CHANNEL, self.threshold).collect();
        let objects: Vec<(usize, usize)> =
            spans.positions_above(OBJECT_CHANNEL, self.threshold).collect();

        tracing::debug!(
            "Triple candidates: {} subjects, {} objects",
            subjects.len(),
            objects.len()
        );

        let mut triples = HashSet::new();
        for &(sh, st) in &subjects {
            for &(oh, ot) in &objects {
                let head_matches: BTreeSet<usize> =
                    heads.channels_above(sh, oh, self.threshold).collect();
                if head_matches.is_empty() {
                    continue;
                }

                for predicate in tails
                    .channels_above(st, ot, self.threshold)
                    .filter(|p| head_matches.contains(p))
                {
                    let subject_end = match self.subject_end {
                        SubjectEnd::Head => sh,
                        SubjectEnd::Tail => st,
                    };
                    let name = self.predicates.name(predicate)?;

                    tracing::trace!(
                        "Linked ({}, {}) -[{}]-> ({}, {})",
                        sh,
                        st,
                        name,
                        oh,
                        ot
                    );
                    triples.insert(Triple::new((sh, subject_end), name, (oh, ot)));
                }
            }
        }

        tracing::debug!("Decoded {} triples", triples.len());
        Ok(triples)
    }

    /// Decode a batch: `[B, 2, L, L]` spans, `[B, P, L, L]` heads and tails,
    /// optional `[B, L]` mask. The result is aligned with the batch axis.
    pub fn decode_batch(
        &self,
        spans: ArrayView4<'_, f32>,
        heads: ArrayView4<'_, f32>,
        tails: ArrayView4<'_, f32>,
        mask: Option<ArrayView2<'_, bool>>,
    ) -> Result<Vec<HashSet<Triple>>> {
        let batch = spans.len_of(Axis(0));
        if heads.len_of(Axis(0)) != batch || tails.len_of(Axis(0)) != batch {
            return Err(GplinkError::ShapeMismatch {
                expected: format!("batch size {} for span, head and tail grids", batch),
                actual: format!(
                    "spans {:?}, heads {:?}, tails {:?}",
                    spans.shape(),
                    heads.shape(),
                    tails.shape()
                ),
            });
        }

        let span_grids = batch_grids(spans, mask)?;
        let head_grids = batch_grids(heads, None)?;
        let tail_grids = batch_grids(tails, None)?;

        map_examples(batch, |b| {
            self.decode(&span_grids[b], &head_grids[b], &tail_grids[b])
        })
    }

    fn check_shapes(
        &self,
        spans: &ScoreGrid<'_>,
        heads: &ScoreGrid<'_>,
        tails: &ScoreGrid<'_>,
    ) -> Result<()> {
        if spans.channels() != 2 {
            return Err(GplinkError::ShapeMismatch {
                expected: format!("span grid [2, {len}, {len}]", len = spans.seq_len()),
                actual: format!("{:?}", spans.scores().shape()),
            });
        }

        let len = spans.seq_len();
        if heads.scores().shape() != tails.scores().shape() || heads.seq_len() != len {
            return Err(GplinkError::ShapeMismatch {
                expected: format!("head and tail grids [P, {len}, {len}]"),
                actual: format!(
                    "heads {:?}, tails {:?}",
                    heads.scores().shape(),
                    tails.scores().shape()
                ),
            });
        }

        self.predicates.check_channels(heads.channels())
    }
}
