//! Body transition sound selection.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use super::constants::sound::{DEVIATION, MAX_RESAMPLE_TRIES};

/// One sound to play for a crouch, stand or mantle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BodySound {
    pub clip_index: usize,
    pub volume: f32,
    pub pitch: f32,
}

/// Picks clips from a pack while avoiding back-to-back repeats.
#[derive(Debug, Clone)]
pub struct FootstepSelector {
    clip_count: usize,
    prev_index: usize,
    base_volume: f32,
    base_pitch: f32,
    rng: StdRng,
}

impl FootstepSelector {
    pub fn new(clip_count: usize, base_volume: f32, base_pitch: f32) -> Self {
        Self::with_rng(clip_count, base_volume, base_pitch, StdRng::from_entropy())
    }

    /// Deterministic selector for tests and replays.
    pub fn seeded(clip_count: usize, base_volume: f32, base_pitch: f32, seed: u64) -> Self {
        Self::with_rng(clip_count, base_volume, base_pitch, StdRng::seed_from_u64(seed))
    }

    fn with_rng(clip_count: usize, base_volume: f32, base_pitch: f32, rng: StdRng) -> Self {
        Self {
            clip_count,
            prev_index: 0,
            base_volume,
            base_pitch,
            rng,
        }
    }

    /// Resamples up to four times to dodge the previous clip, then accepts a repeat.
    /// `None` when the pack is empty.
    pub fn next_clip(&mut self) -> Option<usize> {
        if self.clip_count == 0 {
            return None;
        }
        let mut tries = 0;
        let mut index;
        loop {
            index = self.rng.gen_range(0..self.clip_count);
            tries += 1;
            if tries >= MAX_RESAMPLE_TRIES || index != self.prev_index {
                break;
            }
        }
        self.prev_index = index;
        Some(index)
    }

    /// Uniform value in `[center - deviation, center + deviation]`.
    pub fn deviate(&mut self, center: f32, deviation: f32) -> f32 {
        if deviation <= 0.0 {
            return center;
        }
        self.rng.gen_range((center - deviation)..=(center + deviation))
    }

    pub fn next_sound(&mut self) -> Option<BodySound> {
        let clip_index = self.next_clip()?;
        Some(BodySound {
            clip_index,
            volume: self.deviate(self.base_volume, DEVIATION),
            pitch: self.deviate(self.base_pitch, DEVIATION),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pack_yields_nothing() {
        let mut selector = FootstepSelector::seeded(0, 1.0, 1.0, 7);
        assert!(selector.next_sound().is_none());
    }

    #[test]
    fn test_single_clip_repeats() {
        let mut selector = FootstepSelector::seeded(1, 1.0, 1.0, 7);
        for _ in 0..5 {
            assert_eq!(selector.next_clip(), Some(0));
        }
    }

    #[test]
    fn test_repeats_are_rare_with_many_clips() {
        let mut selector = FootstepSelector::seeded(4, 1.0, 1.0, 42);
        let mut prev = selector.next_clip().unwrap();
        let mut repeats = 0;
        for _ in 0..1000 {
            let next = selector.next_clip().unwrap();
            if next == prev {
                repeats += 1;
            }
            prev = next;
        }
        // A repeat needs four straight hits on the previous clip: (1/4)^4 per pick.
        assert!(repeats < 20, "too many repeats: {}", repeats);
    }

    #[test]
    fn test_volume_and_pitch_stay_within_deviation() {
        let mut selector = FootstepSelector::seeded(3, 0.8, 1.0, 3);
        for _ in 0..100 {
            let sound = selector.next_sound().unwrap();
            assert!(sound.volume >= 0.8 - DEVIATION - 1e-6 && sound.volume <= 0.8 + DEVIATION + 1e-6);
            assert!(sound.pitch >= 1.0 - DEVIATION - 1e-6 && sound.pitch <= 1.0 + DEVIATION + 1e-6);
        }
    }
}
