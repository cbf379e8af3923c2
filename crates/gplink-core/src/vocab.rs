//! Label vocabulary
//!
//! Bidirectional `id <-> name` mapping fixed for the lifetime of a model.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{GplinkError, Result};

/// Immutable mapping between label ids (score channels) and label names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelVocab {
    names: Vec<String>,
    ids: HashMap<String, usize>,
}

impl LabelVocab {
    /// Build from names ordered by id
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut ids = HashMap::with_capacity(names.len());

        for (id, name) in names.iter().enumerate() {
            if ids.insert(name.clone(), id).is_some() {
                return Err(GplinkError::DuplicateLabel(name.clone()));
            }
        }

        Ok(Self { names, ids })
    }

    /// Build from a `label2id` map. Ids must cover `0..len` exactly.
    pub fn from_label2id(label2id: &HashMap<String, usize>) -> Result<Self> {
        let mut names: Vec<Option<String>> = vec![None; label2id.len()];

        for (name, &id) in label2id {
            let slot = names.get_mut(id).ok_or(GplinkError::UnknownLabel(id))?;
            if slot.is_some() {
                return Err(GplinkError::InvalidInput(format!(
                    "label id {} assigned twice",
                    id
                )));
            }
            *slot = Some(name.clone());
        }

        // Every slot is filled: ids are unique and bounded by len
        Self::new(names.into_iter().flatten())
    }

    /// Name for a label id
    pub fn name(&self, id: usize) -> Result<&str> {
        self.names
            .get(id)
            .map(String::as_str)
            .ok_or(GplinkError::UnknownLabel(id))
    }

    /// Id for a label name
    pub fn id(&self, name: &str) -> Option<usize> {
        self.ids.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in id order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Fail when a score array carries channels the vocabulary cannot name
    pub fn check_channels(&self, channels: usize) -> Result<()> {
        if channels > self.names.len() {
            return Err(GplinkError::VocabularyMismatch {
                channels,
                labels: self.names.len(),
            });
        }
        Ok(())
    }
}

impl TryFrom<Vec<String>> for LabelVocab {
    type Error = GplinkError;

    fn try_from(names: Vec<String>) -> Result<Self> {
        Self::new(names)
    }
}

impl From<LabelVocab> for Vec<String> {
    fn from(vocab: LabelVocab) -> Self {
        vocab.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocab_roundtrip_lookup() {
        let vocab = LabelVocab::new(["PER", "ORG", "LOC"]).unwrap();

        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.name(1).unwrap(), "ORG");
        assert_eq!(vocab.id("LOC"), Some(2));
        assert_eq!(vocab.id("MISC"), None);
    }

    #[test]
    fn test_vocab_unknown_id() {
        let vocab = LabelVocab::new(["PER"]).unwrap();
        assert!(matches!(vocab.name(3), Err(GplinkError::UnknownLabel(3))));
    }

    #[test]
    fn test_vocab_rejects_duplicates() {
        let err = LabelVocab::new(["PER", "PER"]).unwrap_err();
        assert!(matches!(err, GplinkError::DuplicateLabel(name) if name == "PER"));
    }

    #[test]
    fn test_from_label2id() {
        let label2id: HashMap<String, usize> =
            [("B-PER".to_string(), 1), ("O".to_string(), 0)].into();

        let vocab = LabelVocab::from_label2id(&label2id).unwrap();
        assert_eq!(vocab.names().collect::<Vec<_>>(), vec!["O", "B-PER"]);
    }

    #[test]
    fn test_from_label2id_gap() {
        let label2id: HashMap<String, usize> =
            [("O".to_string(), 0), ("B-PER".to_string(), 2)].into();

        assert!(LabelVocab::from_label2id(&label2id).is_err());
    }

    #[test]
    fn test_check_channels() {
        let vocab = LabelVocab::new(["a", "b"]).unwrap();
        assert!(vocab.check_channels(2).is_ok());
        assert!(vocab.check_channels(1).is_ok());
        assert!(matches!(
            vocab.check_channels(3),
            Err(GplinkError::VocabularyMismatch {
                channels: 3,
                labels: 2
            })
        ));
    }

    #[test]
    fn test_vocab_serde_as_list() {
        let vocab: LabelVocab = serde_json::from_str(r#"["PER","ORG"]"#).unwrap();
        assert_eq!(vocab.id("ORG"), Some(1));
        assert_eq!(serde_json::to_string(&vocab).unwrap(), r#"["PER","ORG"]"#);

        assert!(serde_json::from_str::<LabelVocab>(r#"["PER","PER"]"#).is_err());
    }
}
