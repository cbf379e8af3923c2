//! Quality Metrics module
//!
//! F1-style accumulators over decoded structures: exact-match span and
//! triple sets, BIO chunks and per-class classification ids.

use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use gplink_core::{GplinkError, Result, Span, Triple};

use crate::bio::bio_entities;

// ============================================================================
// Counts
// ============================================================================

/// Confusion counts for one evaluated structure type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct F1Counts {
    /// Predicted items also present in the gold standard
    pub true_positives: usize,
    /// Predicted items absent from the gold standard
    pub false_positives: usize,
    /// Gold items that were not predicted
    pub false_negatives: usize,
}

impl F1Counts {
    /// Counts for one example, comparing two item sets
    pub fn from_sets<T: Hash + Eq>(predicted: &HashSet<T>, gold: &HashSet<T>) -> Self {
        let true_positives = predicted.intersection(gold).count();
        Self {
            true_positives,
            false_positives: predicted.len() - true_positives,
            false_negatives: gold.len() - true_positives,
        }
    }

    /// Calculate precision (TP / (TP + FP))
    pub fn precision(&self) -> f32 {
        if self.true_positives + self.false_positives == 0 {
            0.0
        } else {
            self.true_positives as f32 / (self.true_positives + self.false_positives) as f32
        }
    }

    /// Calculate recall (TP / (TP + FN))
    pub fn recall(&self) -> f32 {
        if self.true_positives + self.false_negatives == 0 {
            0.0
        } else {
            self.true_positives as f32 / (self.true_positives + self.false_negatives) as f32
        }
    }

    /// Calculate F1 score (2 * P * R / (P + R))
    pub fn f1_score(&self) -> f32 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    /// Total predicted items
    pub fn predicted_total(&self) -> usize {
        self.true_positives + self.false_positives
    }

    /// Total gold items
    pub fn gold_total(&self) -> usize {
        self.true_positives + self.false_negatives
    }

    pub fn add(&mut self, other: &F1Counts) {
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
        self.false_negatives += other.false_negatives;
    }
}

// ============================================================================
// Metric trait
// ============================================================================

/// An accumulator fed one example at a time
pub trait Metric {
    /// What one example of predictions (or gold) looks like
    type Sample: ?Sized;

    /// Add one example's predictions and gold standard
    fn accumulate(&mut self, predicted: &Self::Sample, truth: &Self::Sample) -> Result<()>;

    /// Current score in `[0, 1]`
    fn compute(&self) -> f32;

    /// Confusion counts summed over every accumulated example
    fn counts(&self) -> F1Counts;

    /// Forget everything accumulated so far
    fn reset(&mut self);
}

// ============================================================================
// Exact-match set F1
// ============================================================================

/// Micro F1 over exact-match item sets; duplicates within one example
/// count once.
#[derive(Debug, Clone)]
pub struct SetF1<T> {
    counts: F1Counts,
    examples: usize,
    _item: std::marker::PhantomData<fn(T)>,
}

/// Span F1 (label and both boundaries must match)
pub type SpanF1 = SetF1<Span>;

/// Triple F1 (both spans and the predicate must match)
pub type TripleF1 = SetF1<Triple>;

impl<T> Default for SetF1<T> {
    fn default() -> Self {
        Self {
            counts: F1Counts::default(),
            examples: 0,
            _item: std::marker::PhantomData,
        }
    }
}

impl<T: Hash + Eq> SetF1<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one example from any pair of item collections
    pub fn accumulate_iter<P, G>(&mut self, predicted: P, truth: G)
    where
        P: IntoIterator<Item = T>,
        G: IntoIterator<Item = T>,
    {
        let predicted: HashSet<T> = predicted.into_iter().collect();
        let truth: HashSet<T> = truth.into_iter().collect();

        self.counts.add(&F1Counts::from_sets(&predicted, &truth));
        self.examples += 1;
    }

    /// Number of accumulated examples
    pub fn examples(&self) -> usize {
        self.examples
    }
}

impl<T: Hash + Eq + Clone> Metric for SetF1<T> {
    type Sample = [T];

    fn accumulate(&mut self, predicted: &[T], truth: &[T]) -> Result<()> {
        self.accumulate_iter(predicted.iter().cloned(), truth.iter().cloned());
        Ok(())
    }

    fn compute(&self) -> f32 {
        self.counts.f1_score()
    }

    fn counts(&self) -> F1Counts {
        self.counts
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// Chunk F1
// ============================================================================

/// Entity-level micro F1 over BIO tag sequences.
///
/// Both sequences are decoded into entities and compared as sets, so an
/// entity only counts when its label and both boundaries match.
#[derive(Debug, Clone, Default)]
pub struct ChunkF1 {
    counts: F1Counts,
    examples: usize,
}

impl ChunkF1 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one tagged sequence pair. Sequences must have equal length.
    pub fn accumulate_tags<S: AsRef<str>>(&mut self, predicted: &[S], truth: &[S]) -> Result<()> {
        if predicted.len() != truth.len() {
            return Err(GplinkError::InvalidInput(format!(
                "predicted sequence has {} tags, gold has {}",
                predicted.len(),
                truth.len()
            )));
        }

        let predicted: HashSet<_> = bio_entities(predicted)?.into_iter().collect();
        let truth: HashSet<_> = bio_entities(truth)?.into_iter().collect();

        self.counts.add(&F1Counts::from_sets(&predicted, &truth));
        self.examples += 1;
        Ok(())
    }

    pub fn examples(&self) -> usize {
        self.examples
    }
}

impl Metric for ChunkF1 {
    type Sample = [String];

    fn accumulate(&mut self, predicted: &[String], truth: &[String]) -> Result<()> {
        self.accumulate_tags(predicted, truth)
    }

    fn compute(&self) -> f32 {
        self.counts.f1_score()
    }

    fn counts(&self) -> F1Counts {
        self.counts
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// Macro F1
// ============================================================================

/// Unweighted mean of per-class F1 for class-id predictions.
///
/// Only classes seen in predictions or gold take part in the mean.
#[derive(Debug, Clone, Default)]
pub struct MacroF1 {
    per_class: BTreeMap<usize, F1Counts>,
}

impl MacroF1 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts for one class id, if it was ever seen
    pub fn class_counts(&self, class: usize) -> Option<F1Counts> {
        self.per_class.get(&class).copied()
    }

    /// Per-class F1 in class id order
    pub fn per_class_f1(&self) -> Vec<(usize, f32)> {
        self.per_class
            .iter()
            .map(|(&class, counts)| (class, counts.f1_score()))
            .collect()
    }
}

impl Metric for MacroF1 {
    type Sample = [usize];

    fn accumulate(&mut self, predicted: &[usize], truth: &[usize]) -> Result<()> {
        if predicted.len() != truth.len() {
            return Err(GplinkError::InvalidInput(format!(
                "{} predictions for {} gold labels",
                predicted.len(),
                truth.len()
            )));
        }

        for (&pred, &gold) in predicted.iter().zip(truth) {
            if pred == gold {
                self.per_class.entry(pred).or_default().true_positives += 1;
            } else {
                self.per_class.entry(pred).or_default().false_positives += 1;
                self.per_class.entry(gold).or_default().false_negatives += 1;
            }
        }
        Ok(())
    }

    fn compute(&self) -> f32 {
        if self.per_class.is_empty() {
            return 0.0;
        }
        let total: f32 = self.per_class.values().map(F1Counts::f1_score).sum();
        total / self.per_class.len() as f32
    }

    fn counts(&self) -> F1Counts {
        let mut counts = F1Counts::default();
        for class in self.per_class.values() {
            counts.add(class);
        }
        counts
    }

    fn reset(&mut self) {
        self.per_class.clear();
    }
}

// ============================================================================
// Report
// ============================================================================

/// Named counts for a human-readable evaluation summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsReport {
    pub sections: Vec<(String, F1Counts)>,
    pub num_examples: usize,
}

impl MetricsReport {
    pub fn new(num_examples: usize) -> Self {
        Self {
            sections: Vec::new(),
            num_examples,
        }
    }

    /// Add a named section
    pub fn add(&mut self, name: impl Into<String>, counts: F1Counts) -> &mut Self {
        self.sections.push((name.into(), counts));
        self
    }

    /// Render the summary report
    pub fn report(&self) -> String {
        let mut out = format!(
            "=== Extraction Quality Report ===\n\nExamples evaluated: {}\n",
            self.num_examples
        );

        for (name, counts) in &self.sections {
            out.push_str(&format!(
                "\n{}:\n  \
                 Precision: {:.1}%\n  \
                 Recall:    {:.1}%\n  \
                 F1 Score:  {:.1}%\n  \
                 Gold: {} | Predicted: {} | TP: {} | FP: {} | FN: {}\n",
                name,
                counts.precision() * 100.0,
                counts.recall() * 100.0,
                counts.f1_score() * 100.0,
                counts.gold_total(),
                counts.predicted_total(),
                counts.true_positives,
                counts.false_positives,
                counts.false_negatives,
            ));
        }
        out
    }

    /// Whether every section reaches `min_f1`
    pub fn meets(&self, min_f1: f32) -> bool {
        self.sections
            .iter()
            .all(|(_, counts)| counts.f1_score() >= min_f1)
    }
}

// ============================================================================
// Tests
// ============================================================================
