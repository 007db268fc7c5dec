use super::vocabulary::{Vocabulary, PADDING_ID};
use crate::{FeatureVector, TokenPredictor};
use anyhow::anyhow;

/// Upper bound on the decoded sequence length, start marker included.
pub const MAX_LENGTH: usize = 27;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndToken,
    UnknownToken,
    MaxLength,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSequence {
    pub token_ids: Vec<u32>,
    pub words: Vec<String>,
    pub stop_reason: StopReason,
}

impl DecodedSequence {
    /// Words joined by single spaces, markers included.
    pub fn text(&self) -> String {
        self.words.join(" ")
    }
}

/// Left-pad with the padding id, keeping the most recent `max_length` ids.
pub fn pad_sequence(token_ids: &[u32], max_length: usize) -> Vec<u32> {
    let tail = &token_ids[token_ids.len().saturating_sub(max_length)..];
    let mut padded = vec![PADDING_ID; max_length - tail.len()];
    padded.extend_from_slice(tail);
    padded
}

/// Index of the highest score. Ties go to the lowest id and NaN never wins.
fn argmax(scores: &[f32]) -> Option<u32> {
    scores
        .iter()
        .enumerate()
        .filter(|(_, score)| !score.is_nan())
        .fold(None, |best: Option<(usize, f32)>, (idx, &score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((idx, score)),
        })
        .map(|(idx, _)| idx as u32)
}

/// Greedy autoregressive decoding: one forward pass per step, always taking
/// the single best next token.
pub struct GreedyDecoder<'a> {
    vocabulary: &'a Vocabulary,
    predictor: &'a dyn TokenPredictor,
    max_length: usize,
}

impl<'a> GreedyDecoder<'a> {
    pub fn new(vocabulary: &'a Vocabulary, predictor: &'a dyn TokenPredictor) -> Self {
        Self {
            vocabulary,
            predictor,
            max_length: MAX_LENGTH,
        }
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length.max(1);
        self
    }

    pub fn decode(&self, features: &FeatureVector) -> anyhow::Result<DecodedSequence> {
        let start = self.vocabulary.start_token();
        let end = self.vocabulary.end_token();

        let mut token_ids = vec![start];
        let mut words = vec![self
            .vocabulary
            .lookup_word(start)
            .ok_or(anyhow!("start token has no word"))?
            .to_string()];

        let finish = |token_ids, words, stop_reason| DecodedSequence {
            token_ids,
            words,
            stop_reason,
        };

        for _ in 0..self.max_length {
            if token_ids.len() >= self.max_length {
                break;
            }

            let input = pad_sequence(&token_ids, self.max_length);
            let scores = self.predictor.predict(features, &input)?;
            let next = argmax(&scores).ok_or(anyhow!("decoder returned no scores"))?;

            let Some(word) = self.vocabulary.lookup_word(next) else {
                return Ok(finish(token_ids, words, StopReason::UnknownToken));
            };

            token_ids.push(next);
            words.push(word.to_string());

            if next == end {
                return Ok(finish(token_ids, words, StopReason::EndToken));
            }
        }

        Ok(finish(token_ids, words, StopReason::MaxLength))
    }
}
