//! Text classification decoding
//!
//! Ranks the labels of a classification head by softmax probability.

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

use gplink_core::{GplinkError, LabelScore, LabelVocab, Result};

use crate::map_examples;

/// Decoder for `[K]` logit rows
#[derive(Debug, Clone)]
pub struct ClassificationDecoder {
    labels: LabelVocab,
}

impl ClassificationDecoder {
    pub fn new(labels: LabelVocab) -> Self {
        Self { labels }
    }

    pub fn labels(&self) -> &LabelVocab {
        &self.labels
    }

    /// All labels with their probability, most likely first.
    /// Equal probabilities keep label id order.
    pub fn decode(&self, logits: ArrayView1<'_, f32>) -> Result<Vec<LabelScore>> {
        let probs = self.probabilities(logits)?;

        let mut ranked = probs
            .iter()
            .enumerate()
            .map(|(id, &score)| {
                Ok(LabelScore {
                    label: self.labels.name(id)?.to_string(),
                    score,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

        Ok(ranked)
    }

    /// Id of the highest logit; the first one wins ties
    pub fn argmax(&self, logits: ArrayView1<'_, f32>) -> Result<usize> {
        self.check_logits(logits)?;

        let mut best = 0;
        for (id, &logit) in logits.iter().enumerate() {
            if logit > logits[best] {
                best = id;
            }
        }
        Ok(best)
    }

    /// Numerically stable softmax over one logit row
    pub fn probabilities(&self, logits: ArrayView1<'_, f32>) -> Result<Array1<f32>> {
        self.check_logits(logits)?;

        let max = logits.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
        let exp = logits.mapv(|v| (v - max).exp());
        let sum = exp.sum();
        Ok(exp / sum)
    }

    /// Rank every row of a `[B, K]` batch
    pub fn decode_batch(&self, logits: ArrayView2<'_, f32>) -> Result<Vec<Vec<LabelScore>>> {
        map_examples(logits.len_of(Axis(0)), |b| self.decode(logits.row(b)))
    }

    /// Top label id for every row of a `[B, K]` batch
    pub fn predict_batch(&self, logits: ArrayView2<'_, f32>) -> Result<Vec<usize>> {
        logits.rows().into_iter().map(|row| self.argmax(row)).collect()
    }

    fn check_logits(&self, logits: ArrayView1<'_, f32>) -> Result<()> {
        if logits.is_empty() {
            return Err(GplinkError::InvalidInput("empty logit row".to_string()));
        }
        self.labels.check_channels(logits.len())?;

        if logits.iter().any(|v| !v.is_finite()) {
            return Err(GplinkError::InvalidInput(
                "logits must be finite".to_string(),
            ));
        }
        Ok(())
    }
}
