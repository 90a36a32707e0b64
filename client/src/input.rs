//! Scripted input standing in for a keyboard.
//!
//! The player wanders: it picks one of eight headings (or a pause), holds it
//! for a random number of frames, then picks again. Firing and block requests
//! run on fixed frame cadences.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::Vector2;

const MIN_HOLD_FRAMES: u32 = 20;
const MAX_HOLD_FRAMES: u32 = 120;

/// What the player does during one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputFrame {
    /// Zero when standing still
    pub move_direction: Vector2,
    pub fire: bool,
    pub place_block: bool,
}

pub struct ScriptedInput {
    rng: StdRng,
    wander: bool,
    fire_every: u32,
    block_every: u32,
    frame: u64,
    heading: Vector2,
    hold_frames: u32,
}

impl ScriptedInput {
    pub fn new(wander: bool, fire_every: u32, block_every: u32) -> Self {
        Self::with_rng(StdRng::from_entropy(), wander, fire_every, block_every)
    }

    pub fn with_rng(rng: StdRng, wander: bool, fire_every: u32, block_every: u32) -> Self {
        Self {
            rng,
            wander,
            fire_every,
            block_every,
            frame: 0,
            heading: Vector2::ZERO,
            hold_frames: 0,
        }
    }

    /// Random point within `radius` of the origin on both axes.
    pub fn spawn_point(&mut self, radius: f64) -> Vector2 {
        Vector2::new(
            self.rng.gen_range(-radius..=radius),
            self.rng.gen_range(-radius..=radius),
        )
    }

    pub fn next_frame(&mut self) -> InputFrame {
        self.frame += 1;

        if self.wander {
            if self.hold_frames == 0 {
                self.heading = self.pick_heading();
                self.hold_frames = self.rng.gen_range(MIN_HOLD_FRAMES..=MAX_HOLD_FRAMES);
            }
            self.hold_frames -= 1;
        }

        InputFrame {
            move_direction: self.heading,
            fire: on_cadence(self.frame, self.fire_every),
            place_block: on_cadence(self.frame, self.block_every),
        }
    }

    fn pick_heading(&mut self) -> Vector2 {
        let x = self.rng.gen_range(-1..=1);
        let y = self.rng.gen_range(-1..=1);
        Vector2::new(x as f64, y as f64).normalize()
    }
}

fn on_cadence(frame: u64, every: u32) -> bool {
    every > 0 && frame % every as u64 == 0
}
