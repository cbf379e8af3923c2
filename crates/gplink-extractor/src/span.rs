//! Span decoding for global-pointer heads
//!
//! A global-pointer head scores every `(start, end)` token pair per entity
//! label. Decoding is elementwise: every upper-triangle cell above the
//! threshold becomes a span. Overlapping and nested spans are all kept,
//! whether they share a label or not; conflict resolution belongs to the
//! caller.

use ndarray::{ArrayView2, ArrayView4};

use gplink_core::{DecodeConfig, LabelVocab, Result, ScoreGrid, Span};

use crate::{batch_grids, map_examples};

/// Decoder for `[C, L, L]` span grids
#[derive(Debug, Clone)]
pub struct SpanDecoder {
    labels: LabelVocab,
    threshold: f32,
}

impl SpanDecoder {
    /// Create a decoder for the given entity labels (one per channel)
    pub fn new(labels: LabelVocab, threshold: f32) -> Self {
        Self { labels, threshold }
    }

    pub fn from_config(labels: LabelVocab, config: &DecodeConfig) -> Self {
        Self::new(labels, config.threshold)
    }

    pub fn labels(&self) -> &LabelVocab {
        &self.labels
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Decode one sequence.
    ///
    /// Spans come out ordered by channel, then start, then end.
    pub fn decode(&self, grid: &ScoreGrid<'_>) -> Result<Vec<Span>> {
        self.labels.check_channels(grid.channels())?;

        if grid.valid_len() == 0 && grid.seq_len() > 0 {
            tracing::warn!("Span grid has no valid positions; mask excludes every token");
        }

        let mut spans = Vec::new();
        for channel in 0..grid.channels() {
            let label = self.labels.name(channel)?;
            spans.extend(
                grid.positions_above(channel, self.threshold)
                    .map(|(start, end)| Span::new(start, end, label)),
            );
        }

        tracing::debug!(
            "Decoded {} spans from {} channels over {} positions",
            spans.len(),
            grid.channels(),
            grid.seq_len()
        );
        Ok(spans)
    }

    /// Decode a `[B, C, L, L]` batch with an optional `[B, L]` validity mask.
    /// The result is aligned with the batch axis.
    pub fn decode_batch(
        &self,
        scores: ArrayView4<'_, f32>,
        mask: Option<ArrayView2<'_, bool>>,
    ) -> Result<Vec<Vec<Span>>> {
        let grids = batch_grids(scores, mask)?;
        map_examples(grids.len(), |b| self.decode(&grids[b]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gplink_core::GplinkError;
    use ndarray::{array, Array2, Array3, Array4};

    fn decoder(labels: &[&str], threshold: f32) -> SpanDecoder {
        SpanDecoder::new(LabelVocab::new(labels.iter().copied()).unwrap(), threshold)
    }

    #[test]
    fn test_single_span() {
        let scores = array![[[0.0f32, 0.9], [0.0, 0.0]]];
        let grid = ScoreGrid::new(scores.view()).unwrap();

        let spans = decoder(&["label0"], 0.5).decode(&grid).unwrap();
        assert_eq!(spans, vec![Span::new(0, 1, "label0")]);
    }

    #[test]
    fn test_threshold_is_strict() {
        let scores = array![[[0.5f32, 0.5], [0.0, 0.5]]];
        let grid = ScoreGrid::new(scores.view()).unwrap();

        assert!(decoder(&["A"], 0.5).decode(&grid).unwrap().is_empty());
    }

    #[test]
    fn test_lower_triangle_ignored() {
        let scores = array![[[0.0f32, 0.0], [0.9, 0.0]]];
        let grid = ScoreGrid::new(scores.view()).unwrap();

        assert!(decoder(&["A"], 0.5).decode(&grid).unwrap().is_empty());
    }

    #[test]
    fn test_overlapping_and_nested_kept() {
        let mut scores = Array3::<f32>::zeros((2, 4, 4));
        scores[[0, 0, 3]] = 1.0; // outer PER
        scores[[0, 1, 2]] = 1.0; // nested PER
        scores[[0, 2, 3]] = 1.0; // overlapping PER
        scores[[1, 1, 2]] = 1.0; // same cells, different label

        let grid = ScoreGrid::new(scores.view()).unwrap();
        let spans = decoder(&["PER", "ORG"], 0.0).decode(&grid).unwrap();

        assert_eq!(
            spans,
            vec![
                Span::new(0, 3, "PER"),
                Span::new(1, 2, "PER"),
                Span::new(2, 3, "PER"),
                Span::new(1, 2, "ORG"),
            ]
        );
    }

    #[test]
    fn test_mask_excludes_padding() {
        let mut scores = Array3::<f32>::zeros((1, 4, 4));
        scores[[0, 0, 1]] = 1.0;
        scores[[0, 1, 3]] = 1.0; // ends on padding
        scores[[0, 3, 3]] = 1.0; // fully padding

        let grid = ScoreGrid::new(scores.view())
            .unwrap()
            .with_attention_mask(&[1u8, 1, 1, 0])
            .unwrap();
        let spans = decoder(&["A"], 0.0).decode(&grid).unwrap();

        assert_eq!(spans, vec![Span::new(0, 1, "A")]);
    }

    #[test]
    fn test_channel_without_label_is_fatal() {
        let scores = Array3::<f32>::zeros((3, 2, 2));
        let grid = ScoreGrid::new(scores.view()).unwrap();

        let err = decoder(&["A", "B"], 0.0).decode(&grid).unwrap_err();
        assert!(matches!(
            err,
            GplinkError::VocabularyMismatch {
                channels: 3,
                labels: 2
            }
        ));
    }

    #[test]
    fn test_empty_grid() {
        let scores = Array3::<f32>::zeros((1, 0, 0));
        let grid = ScoreGrid::new(scores.view()).unwrap();

        assert!(decoder(&["A"], 0.0).decode(&grid).unwrap().is_empty());
    }

    #[test]
    fn test_decode_is_idempotent() {
        let mut scores = Array3::<f32>::zeros((2, 3, 3));
        scores[[0, 0, 2]] = 2.0;
        scores[[1, 1, 1]] = 2.0;
        let grid = ScoreGrid::new(scores.view()).unwrap();
        let decoder = decoder(&["A", "B"], 0.0);

        assert_eq!(decoder.decode(&grid).unwrap(), decoder.decode(&grid).unwrap());
    }

    #[test]
    fn test_decode_batch_keeps_order() {
        let mut scores = Array4::<f32>::zeros((3, 1, 3, 3));
        scores[[0, 0, 0, 0]] = 1.0;
        scores[[2, 0, 1, 2]] = 1.0;
        scores[[2, 0, 2, 2]] = 1.0;

        let mut mask = Array2::from_elem((3, 3), true);
        mask[[2, 2]] = false;

        let batch = decoder(&["A"], 0.0)
            .decode_batch(scores.view(), Some(mask.view()))
            .unwrap();

        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0], vec![Span::new(0, 0, "A")]);
        assert!(batch[1].is_empty());
        assert!(batch[2].is_empty());
    }

    #[test]
    fn test_decode_batch_mask_rows_checked() {
        let scores = Array4::<f32>::zeros((2, 1, 3, 3));
        let mask = Array2::from_elem((1, 3), true);

        let err = decoder(&["A"], 0.0)
            .decode_batch(scores.view(), Some(mask.view()))
            .unwrap_err();
        assert!(matches!(err, GplinkError::ShapeMismatch { .. }));
    }
}
