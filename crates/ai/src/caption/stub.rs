use super::vocabulary::Vocabulary;
use crate::{FeatureExtractor, FeatureVector, TokenPredictor};
use image::RgbImage;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

pub(crate) fn test_vocabulary() -> Vocabulary {
    let words = ["startseq", "endseq", "a", "cat", "sat", "on", "mat"];
    let word_index = words
        .iter()
        .enumerate()
        .map(|(idx, word)| (word.to_string(), idx as u32 + 1))
        .collect::<HashMap<_, _>>();
    Vocabulary::from_word_index(word_index).unwrap()
}

#[derive(Default)]
pub(crate) struct CountingExtractor {
    pub calls: Arc<AtomicUsize>,
}

impl FeatureExtractor for CountingExtractor {
    fn extract(&self, _image: &RgbImage) -> anyhow::Result<FeatureVector> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FeatureVector::new(vec![0.25; 16]))
    }
}

/// Predicts `script[step]` at each step, repeating the last entry once the
/// script runs out.
pub(crate) struct ScriptedPredictor {
    script: Vec<u32>,
    fail: bool,
    inputs: Mutex<Vec<Vec<u32>>>,
}

impl ScriptedPredictor {
    pub fn new(script: Vec<u32>) -> Self {
        Self {
            script,
            fail: false,
            inputs: Mutex::new(vec![]),
        }
    }

    pub fn failing() -> Self {
        Self {
            script: vec![],
            fail: true,
            inputs: Mutex::new(vec![]),
        }
    }

    pub fn calls(&self) -> usize {
        self.inputs.lock().unwrap().len()
    }

    pub fn inputs(&self) -> Vec<Vec<u32>> {
        self.inputs.lock().unwrap().clone()
    }
}

impl TokenPredictor for ScriptedPredictor {
    fn predict(&self, _features: &FeatureVector, sequence: &[u32]) -> anyhow::Result<Vec<f32>> {
        if self.fail {
            anyhow::bail!("decoder exploded");
        }

        let mut inputs = self.inputs.lock().unwrap();
        let step = inputs.len();
        inputs.push(sequence.to_vec());

        let next = self.script[step.min(self.script.len() - 1)] as usize;
        let mut scores = vec![0.01; next.max(7) + 1];
        scores[next] = 0.9;
        Ok(scores)
    }
}
