use rand::{seq::SliceRandom, Rng};

/// Captions that read fine under any picture.
pub const UNIVERSAL_CAPTIONS: [&str; 23] = [
    "Just another chapter.",
    "Here, now, always.",
    "A vibe is a vibe.",
    "Some days speak for themselves.",
    "No filter needed.",
    "Part of the story.",
    "Silent but loud.",
    "Unfolding as it should.",
    "It is what it is.",
    "Lost in the moment.",
    "More than words.",
    "A feeling you can’t describe.",
    "Read between the lines.",
    "Here goes nothing.",
    "Not everything needs a caption.",
    "Echoes of today.",
    "Same place, different story.",
    "Untold but felt.",
    "A mood, not a sentence.",
    "Some things speak for themselves.",
    "Caught in the middle of everything.",
    "This says enough.",
    "Moments over moods.",
];

/// Pool of captions returned when the model cannot produce one.
#[derive(Debug, Clone)]
pub struct FallbackCaptions {
    captions: Vec<String>,
}

impl Default for FallbackCaptions {
    fn default() -> Self {
        Self {
            captions: UNIVERSAL_CAPTIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl FallbackCaptions {
    pub fn pick(&self) -> String {
        self.pick_with(&mut rand::thread_rng())
    }

    pub fn pick_with<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        self.captions
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| UNIVERSAL_CAPTIONS[0].to_string())
    }
}
