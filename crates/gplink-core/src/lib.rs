//! gplink Core - Shared types, errors and configuration
//!
//! This crate defines the abstractions used by the gplink decoders:
//! - Output records (spans, relation triples, tagged entities)
//! - Label vocabulary
//! - Score grid views over encoder output
//! - Common error types
//! - Configuration management

pub mod config;
pub mod grid;
pub mod vocab;

pub use config::{AppConfig, ConfigError, DecodeConfig, LoggingConfig, SubjectEnd};
pub use grid::ScoreGrid;
pub use vocab::LabelVocab;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for gplink operations
#[derive(Error, Debug)]
pub enum GplinkError {
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Mask length {actual} does not match sequence length {expected}")]
    MaskLength { expected: usize, actual: usize },

    #[error("Label id {0} has no vocabulary entry")]
    UnknownLabel(usize),

    #[error("Score array has {channels} channels but vocabulary has {labels} labels")]
    VocabularyMismatch { channels: usize, labels: usize },

    #[error("Duplicate label in vocabulary: {0}")]
    DuplicateLabel(String),

    #[error("Invalid tag {tag:?} at position {index}")]
    InvalidTag { index: usize, tag: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, GplinkError>;

// ============================================================================
// Decoded Records
// ============================================================================

/// A labeled token range, inclusive on both ends, in grid coordinates
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub label: String,
}

impl Span {
    /// Create a new span
    pub fn new(start: usize, end: usize, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
        }
    }

    /// Shift the span past `prefix` leading special tokens.
    ///
    /// Returns `None` if the span starts inside the prefix.
    pub fn without_prefix(&self, prefix: usize) -> Option<Self> {
        if self.start < prefix {
            return None;
        }

        Some(Self {
            start: self.start - prefix,
            end: self.end - prefix,
            label: self.label.clone(),
        })
    }
}

/// A relation instance `(subject span, predicate, object span)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub subject_start: usize,
    pub subject_end: usize,
    pub predicate: String,
    pub object_start: usize,
    pub object_end: usize,
}

impl Triple {
    /// Create a new triple
    pub fn new(
        subject: (usize, usize),
        predicate: impl Into<String>,
        object: (usize, usize),
    ) -> Self {
        Self {
            subject_start: subject.0,
            subject_end: subject.1,
            predicate: predicate.into(),
            object_start: object.0,
            object_end: object.1,
        }
    }

    /// Shift both spans past `prefix` leading special tokens
    pub fn without_prefix(&self, prefix: usize) -> Option<Self> {
        if self.subject_start < prefix || self.object_start < prefix {
            return None;
        }

        Some(Self {
            subject_start: self.subject_start - prefix,
            subject_end: self.subject_end - prefix,
            predicate: self.predicate.clone(),
            object_start: self.object_start - prefix,
            object_end: self.object_end - prefix,
        })
    }
}

impl std::fmt::Display for Triple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}) --[{}]--> ({}, {})",
            self.subject_start, self.subject_end, self.predicate, self.object_start, self.object_end
        )
    }
}

/// An entity decoded from a BIO tag sequence, inclusive token indices
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaggedEntity {
    pub label: String,
    pub start: usize,
    pub end: usize,
}

impl TaggedEntity {
    pub fn new(label: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            label: label.into(),
            start,
            end,
        }
    }
}

impl From<TaggedEntity> for Span {
    fn from(entity: TaggedEntity) -> Self {
        Span::new(entity.start, entity.end, entity.label)
    }
}

/// A label with its classification probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

// ============================================================================
// Tests
// ============================================================================
