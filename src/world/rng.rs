//! The game's single random stream.
//!
//! Every random decision in a game (terrain, starting spots, AI tie-breaks
//! and combat ties) is drawn from one `GameRng` owned by the world,
//! through [`GameRng::next_uniform`]. Replaying the seed and the same host
//! inputs therefore replays the same draws in the same order.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "GameRngState", into = "GameRngState")]
pub struct GameRng {
    inner: ChaCha8Rng,
    seed: u64,
    draws: u64,
}

impl GameRng {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
            seed,
            draws: 0,
        }
    }

    /// Draw a fresh seed from OS entropy. Only used once, when a game is
    /// configured without one.
    pub fn entropy_seed() -> u64 {
        rand::thread_rng().r#gen()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of primitive draws taken so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Uniform integer in `[0, bound)`.
    ///
    /// A zero bound returns 0 without advancing the stream.
    pub fn next_uniform(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        self.draws += 1;
        self.inner.gen_range(0..bound)
    }

    /// Symmetric jitter in `[-amplitude, amplitude]`. Draws nothing for 0.
    pub fn jitter(&mut self, amplitude: u32) -> i64 {
        if amplitude == 0 {
            return 0;
        }
        let span = amplitude.saturating_mul(2).saturating_add(1);
        i64::from(self.next_uniform(span)) - i64::from(amplitude)
    }

    /// Pick an index into a slice of `len` items. `None` for an empty slice.
    /// A single candidate is returned without drawing.
    pub fn pick_index(&mut self, len: usize) -> Option<usize> {
        match len {
            0 => None,
            1 => Some(0),
            n => Some(self.next_uniform(n as u32) as usize),
        }
    }

    pub fn state(&self) -> GameRngState {
        GameRngState {
            seed: self.seed,
            word_pos: self.inner.get_word_pos(),
            draws: self.draws,
        }
    }

    pub fn from_state(state: &GameRngState) -> Self {
        let mut inner = ChaCha8Rng::seed_from_u64(state.seed);
        inner.set_word_pos(state.word_pos);
        Self {
            inner,
            seed: state.seed,
            draws: state.draws,
        }
    }
}

impl PartialEq for GameRng {
    fn eq(&self, other: &Self) -> bool {
        self.state() == other.state()
    }
}

impl Eq for GameRng {}

/// Serializable position of a [`GameRng`]. The ChaCha word position makes
/// capture and restore constant-size however long the game has run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRngState {
    pub seed: u64,
    pub word_pos: u128,
    pub draws: u64,
}

impl From<GameRngState> for GameRng {
    fn from(state: GameRngState) -> Self {
        GameRng::from_state(&state)
    }
}

impl From<GameRng> for GameRngState {
    fn from(rng: GameRng) -> Self {
        rng.state()
    }
}
