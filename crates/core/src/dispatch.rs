use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::TimingTable;
use crate::error::PlatformError;
use crate::keys::Key;
use crate::layout::AgentBoxLayout;
use crate::platform::InputSink;
use crate::sleep::{self, Pause};
use crate::types::{Point, Region, Strength};

/// How long to wait before each synthetic input step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimingProfile {
    /// Every step waits the same configured delay.
    Fast { delay: Duration },
    /// Every step draws independently from `[min/divisor, max/divisor]` seconds.
    Safe { min_secs: f64, max_secs: f64, divisor: f64 },
}

impl TimingProfile {
    pub fn from_table(table: &TimingTable, safe_mode: Option<Strength>) -> Self {
        match safe_mode.and_then(|s| table.safe.get(&s)) {
            Some(&(min_secs, max_secs)) => TimingProfile::Safe {
                min_secs,
                max_secs,
                divisor: table.safe_delay_divisor,
            },
            None => TimingProfile::Fast { delay: table.fast_delay },
        }
    }

    pub fn step_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match *self {
            TimingProfile::Fast { delay } => delay,
            TimingProfile::Safe { min_secs, max_secs, divisor } => {
                sleep::uniform_secs(rng, min_secs / divisor..=max_secs / divisor)
            }
        }
    }
}

/// One agent-lock request.
#[derive(Debug, Clone, Copy)]
pub struct LockRequest<'a> {
    pub layout: &'a AgentBoxLayout,
    pub index: usize,
    pub confirm: &'a Region,
    pub confirm_jitter: i32,
    pub profile: TimingProfile,
    /// Select the agent but leave the confirm button alone.
    pub hover: bool,
}

/// Executes synthetic input sequences with human-like pacing.
pub struct Dispatcher {
    input: Box<dyn InputSink>,
    pause: Box<dyn Pause>,
    rng: StdRng,
}

impl Dispatcher {
    pub fn new(input: Box<dyn InputSink>, pause: Box<dyn Pause>) -> Self {
        Self::with_rng(input, pause, StdRng::from_entropy())
    }

    pub fn with_rng(input: Box<dyn InputSink>, pause: Box<dyn Pause>, rng: StdRng) -> Self {
        Self { input, pause, rng }
    }

    fn wait(&mut self, profile: &TimingProfile) {
        let d = profile.step_delay(&mut self.rng);
        self.pause.pause(d);
    }

    /// Click the agent box, then the confirm button unless hovering.
    /// Returns the wall-clock duration of the whole sequence.
    pub fn lock_agent(&mut self, req: LockRequest<'_>) -> Result<Duration, PlatformError> {
        let started = Instant::now();
        let profile = req.profile;

        // settle, then one delay before each of the moves and clicks
        self.wait(&profile);

        let target = req.layout.click_point(req.index, &mut self.rng);
        self.wait(&profile);
        self.input.move_to(target)?;
        self.wait(&profile);
        self.input.click()?;

        if !req.hover {
            let j = req.confirm_jitter.max(0);
            let center = req.confirm.center();
            let confirm = Point::new(
                center.x + self.rng.gen_range(-j..=j),
                center.y + self.rng.gen_range(-j..=j),
            );
            self.wait(&profile);
            self.input.move_to(confirm)?;
            self.wait(&profile);
            self.input.click()?;
        }

        Ok(started.elapsed())
    }

    /// Press `key`, hold it for `hold`, release it.
    pub fn hold_key(&mut self, key: Key, hold: Duration) -> Result<(), PlatformError> {
        self.input.key_down(key)?;
        self.pause.pause(hold);
        self.input.key_up(key)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum InputAction {
        Move(Point),
        Click,
        KeyDown(Key),
        KeyUp(Key),
    }

    /// Records every injected action.
    #[derive(Clone, Default)]
    pub struct RecordingInput(pub Arc<Mutex<Vec<InputAction>>>);

    impl RecordingInput {
        pub fn actions(&self) -> Vec<InputAction> {
            self.0.lock().unwrap().clone()
        }

        pub fn clicks(&self) -> usize {
            self.actions().iter().filter(|a| **a == InputAction::Click).count()
        }

        pub fn pressed_keys(&self) -> Vec<Key> {
            self.actions()
                .iter()
                .filter_map(|a| match a {
                    InputAction::KeyDown(k) => Some(*k),
                    _ => None,
                })
                .collect()
        }
    }

    impl InputSink for RecordingInput {
        fn move_to(&mut self, p: Point) -> Result<(), PlatformError> {
            self.0.lock().unwrap().push(InputAction::Move(p));
            Ok(())
        }

        fn click(&mut self) -> Result<(), PlatformError> {
            self.0.lock().unwrap().push(InputAction::Click);
            Ok(())
        }

        fn key_down(&mut self, key: Key) -> Result<(), PlatformError> {
            self.0.lock().unwrap().push(InputAction::KeyDown(key));
            Ok(())
        }

        fn key_up(&mut self, key: Key) -> Result<(), PlatformError> {
            self.0.lock().unwrap().push(InputAction::KeyUp(key));
            Ok(())
        }
    }
}
