use serde::Deserialize;
use std::{collections::HashMap, path::Path};
use thiserror::Error;

pub const START_WORD: &str = "startseq";
pub const END_WORD: &str = "endseq";

/// Id reserved for sequence padding, never mapped to a word.
pub const PADDING_ID: u32 = 0;

#[derive(Error, Debug)]
pub enum VocabularyError {
    #[error("invalid vocabulary file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("id {id} is assigned to both {first:?} and {second:?}")]
    DuplicateId {
        id: u32,
        first: String,
        second: String,
    },

    #[error("word {0:?} uses the reserved padding id")]
    PaddingId(String),

    #[error("vocabulary has no {0:?} marker")]
    MissingMarker(&'static str),
}

#[derive(Deserialize)]
struct KerasTokenizerConfig {
    // keras stores the index as a json encoded string
    word_index: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VocabularyFile {
    Keras { config: KerasTokenizerConfig },
    WordIndex(HashMap<String, u32>),
}

/// Bidirectional word/id mapping used by the caption decoder.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    word_to_id: HashMap<String, u32>,
    id_to_word: HashMap<u32, String>,
    start: u32,
    end: u32,
}

impl Vocabulary {
    pub fn from_word_index(word_index: HashMap<String, u32>) -> Result<Self, VocabularyError> {
        let mut id_to_word = HashMap::with_capacity(word_index.len());

        for (word, &id) in word_index.iter() {
            if id == PADDING_ID {
                return Err(VocabularyError::PaddingId(word.clone()));
            }
            if let Some(first) = id_to_word.insert(id, word.clone()) {
                return Err(VocabularyError::DuplicateId {
                    id,
                    first,
                    second: word.clone(),
                });
            }
        }

        let start = *word_index
            .get(START_WORD)
            .ok_or(VocabularyError::MissingMarker(START_WORD))?;
        let end = *word_index
            .get(END_WORD)
            .ok_or(VocabularyError::MissingMarker(END_WORD))?;

        Ok(Self {
            word_to_id: word_index,
            id_to_word,
            start,
            end,
        })
    }

    /// Accepts either a flat `{"word": id}` object or a keras tokenizer export.
    pub fn from_json_str(json: &str) -> Result<Self, VocabularyError> {
        let word_index = match serde_json::from_str::<VocabularyFile>(json)? {
            VocabularyFile::Keras { config } => serde_json::from_str(&config.word_index)?,
            VocabularyFile::WordIndex(word_index) => word_index,
        };

        Self::from_word_index(word_index)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read vocabulary {}: {}", path.display(), e))?;
        Ok(Self::from_json_str(&json)?)
    }

    pub fn lookup_id(&self, word: &str) -> Option<u32> {
        self.word_to_id.get(word).copied()
    }

    pub fn lookup_word(&self, id: u32) -> Option<&str> {
        self.id_to_word.get(&id).map(String::as_str)
    }

    pub fn start_token(&self) -> u32 {
        self.start
    }

    pub fn end_token(&self) -> u32 {
        self.end
    }

    pub fn len(&self) -> usize {
        self.word_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.word_to_id.is_empty()
    }
}
