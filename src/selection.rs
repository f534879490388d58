use rand::Rng;
use tracing::debug;

/// Amount a word's priority drops each time it is drawn
pub const DECAY_STEP: u32 = 5;

/// Weight band a priority falls into.
///
/// Priorities normally move in steps of 5 (15, 10, 5, 0). Values between the
/// boundaries fall to the band below: 6..=9 count as `Mid`, 1..=4 as `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityTier {
    High,
    Mid,
    Low,
}

impl PriorityTier {
    pub fn of(priority: u32) -> Self {
        match priority {
            p if p >= 10 => PriorityTier::High,
            p if p >= 5 => PriorityTier::Mid,
            _ => PriorityTier::Low,
        }
    }

    pub fn weight(self) -> f64 {
        match self {
            PriorityTier::High => 0.749,
            PriorityTier::Mid => 0.25,
            PriorityTier::Low => 0.001,
        }
    }

    /// Whether a word in this band is still worth re-testing
    pub fn needs_practice(self) -> bool {
        !matches!(self, PriorityTier::Low)
    }
}

pub fn decay(priority: u32) -> u32 {
    priority.saturating_sub(DECAY_STEP)
}

/// The `(word, priority)` candidates considered by one selection round
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionRound {
    candidates: Vec<(String, u32)>,
}

impl SelectionRound {
    pub fn new(candidates: Vec<(String, u32)>) -> Self {
        Self { candidates }
    }

    pub fn candidates(&self) -> &[(String, u32)] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// True once no candidate is in the `High` or `Mid` band
    pub fn should_stop(&self) -> bool {
        !self
            .candidates
            .iter()
            .any(|(_, p)| PriorityTier::of(*p).needs_practice())
    }

    /// Selection probability of each candidate for a single draw, in candidate order
    pub fn normalized_weights(&self) -> Vec<f64> {
        let weights: Vec<f64> = self
            .candidates
            .iter()
            .map(|(_, p)| PriorityTier::of(*p).weight())
            .collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return weights;
        }
        weights.into_iter().map(|w| w / total).collect()
    }
}

/// One drawn word with its priority before and after decay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pick {
    pub word: String,
    pub previous_priority: u32,
    pub priority: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundOutcome {
    /// Drawn words in draw order, never repeated
    pub picks: Vec<Pick>,
    /// No word left that needs practice; the batch should end after this round
    pub stop: bool,
}

impl RoundOutcome {
    pub fn words(&self) -> Vec<String> {
        self.picks.iter().map(|p| p.word.clone()).collect()
    }

    pub fn priority_updates(&self) -> Vec<(String, u32)> {
        self.picks
            .iter()
            .map(|p| (p.word.clone(), p.priority))
            .collect()
    }
}

/// Priority-weighted sampling of distinct words
#[derive(Debug, Clone, Copy)]
pub struct SelectionEngine {
    words_per_test: usize,
}

impl Default for SelectionEngine {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_WORDS_PER_TEST)
    }
}

impl SelectionEngine {
    pub fn new(words_per_test: usize) -> Self {
        Self { words_per_test }
    }

    pub fn words_per_test(&self) -> usize {
        self.words_per_test
    }

    /// Draw `min(words_per_test, len)` distinct words and decay their priorities.
    ///
    /// Draws are sequential without replacement: every draw picks from the
    /// words not yet drawn, with probability proportional to their band weight
    /// relative to the remaining total.
    pub fn select<R: Rng>(&self, round: SelectionRound, rng: &mut R) -> RoundOutcome {
        let stop = round.should_stop();
        let mut pool: Vec<(String, u32, f64)> = round
            .candidates
            .into_iter()
            .map(|(word, p)| {
                let w = PriorityTier::of(p).weight();
                (word, p, w)
            })
            .collect();

        let count = self.words_per_test.min(pool.len());
        let mut picks = Vec::with_capacity(count);

        for _ in 0..count {
            let total: f64 = pool.iter().map(|(_, _, w)| w).sum();
            let mut target = rng.gen::<f64>() * total;

            // float rounding can leave `target` just past the last bucket
            let mut chosen = pool.len() - 1;
            for (i, (_, _, w)) in pool.iter().enumerate() {
                if target < *w {
                    chosen = i;
                    break;
                }
                target -= w;
            }

            let (word, previous_priority, _) = pool.remove(chosen);
            picks.push(Pick {
                word,
                previous_priority,
                priority: decay(previous_priority),
            });
        }

        debug!(drawn = picks.len(), remaining = pool.len(), stop, "selection round");
        RoundOutcome { picks, stop }
    }
}
