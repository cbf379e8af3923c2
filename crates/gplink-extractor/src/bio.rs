//! BIO sequence decoding
//!
//! Converts the best-path label sequence of a CRF tagging head into entity
//! spans. Structural tokens (`[CLS]`, `[SEP]`) must be removed by the caller
//! before decoding; indices in the result refer to the sequence as given.
//!
//! ```
//! use gplink_extractor::{bio_entities, TaggedEntity};
//!
//! let entities = bio_entities(["O", "B-ORG", "I-ORG", "O"]).unwrap();
//! assert_eq!(entities, vec![TaggedEntity::new("ORG", 1, 2)]);
//! ```

use gplink_core::{GplinkError, LabelVocab, Result, TaggedEntity};

/// A parsed BIO tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag<'a> {
    Begin(&'a str),
    Inside(&'a str),
    Outside,
}

impl<'a> Tag<'a> {
    fn parse(index: usize, tag: &'a str) -> Result<Self> {
        let parsed = if tag == "O" {
            Some(Self::Outside)
        } else if let Some(label) = tag.strip_prefix("B-") {
            (!label.is_empty()).then_some(Self::Begin(label))
        } else if let Some(label) = tag.strip_prefix("I-") {
            (!label.is_empty()).then_some(Self::Inside(label))
        } else {
            None
        };

        parsed.ok_or_else(|| GplinkError::InvalidTag {
            index,
            tag: tag.to_string(),
        })
    }
}

/// Scanner state
#[derive(Debug)]
enum ScanState {
    NoOpenEntity,
    OpenEntity {
        label: String,
        start: usize,
        end: usize,
    },
}

impl ScanState {
    /// Close the open entity, if any, into `entities`
    fn flush(&mut self, entities: &mut Vec<TaggedEntity>) {
        if let ScanState::OpenEntity { label, start, end } =
            std::mem::replace(self, ScanState::NoOpenEntity)
        {
            entities.push(TaggedEntity::new(label, start, end));
        }
    }
}

/// Decode a BIO tag sequence into entities, left to right.
///
/// - `B-X` closes any open entity and opens `X` at the current index
/// - `I-X` extends an open `X`; otherwise it closes what is open and opens nothing
/// - `O` closes any open entity
///
/// An entity still open at the end of the sequence is emitted.
pub fn bio_entities<I, S>(tags: I) -> Result<Vec<TaggedEntity>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut entities = Vec::new();
    let mut state = ScanState::NoOpenEntity;

    for (index, tag) in tags.into_iter().enumerate() {
        match Tag::parse(index, tag.as_ref())? {
            Tag::Begin(label) => {
                state.flush(&mut entities);
                state = ScanState::OpenEntity {
                    label: label.to_string(),
                    start: index,
                    end: index,
                };
            }
            Tag::Inside(label) => match &mut state {
                ScanState::OpenEntity {
                    label: open, end, ..
                } if *open == label => *end = index,
                _ => state.flush(&mut entities),
            },
            Tag::Outside => state.flush(&mut entities),
        }
    }

    state.flush(&mut entities);
    Ok(entities)
}

/// Decoder for CRF best paths given as label ids
#[derive(Debug, Clone)]
pub struct SequenceTagDecoder {
    labels: LabelVocab,
}

impl SequenceTagDecoder {
    /// Create a decoder over a BIO tag vocabulary (`O`, `B-X`, `I-X`, ...)
    pub fn new(labels: LabelVocab) -> Self {
        Self { labels }
    }

    pub fn labels(&self) -> &LabelVocab {
        &self.labels
    }

    /// Decode tag names
    pub fn decode<I, S>(&self, tags: I) -> Result<Vec<TaggedEntity>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        bio_entities(tags)
    }

    /// Decode tag ids. An id without a vocabulary entry is an error.
    pub fn decode_ids(&self, ids: &[usize]) -> Result<Vec<TaggedEntity>> {
        let tags = self.tag_names(ids)?;
        let entities = bio_entities(tags)?;

        tracing::debug!(
            "Decoded {} entities from {} tags",
            entities.len(),
            ids.len()
        );
        Ok(entities)
    }

    /// Map tag ids to names
    pub fn tag_names(&self, ids: &[usize]) -> Result<Vec<&str>> {
        ids.iter().map(|&id| self.labels.name(id)).collect()
    }
}
