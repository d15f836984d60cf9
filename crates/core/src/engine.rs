use std::sync::mpsc::Receiver;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::confirm::ConfirmationCounter;
use crate::dispatch::{Dispatcher, LockRequest, TimingProfile};
use crate::layout::agent_index;
use crate::logger;
use crate::roster::RandomPool;
use crate::sampler::RegionSampler;
use crate::shared::EngineContext;
use crate::stats::{timing_key, LockTimingSample};
use crate::supervisor::PollLoop;
use crate::types::{EngineCommand, EngineState, LockOptions};

const TAG: &str = "lock";

/// Outcome of one poll of the selection-screen detector.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Detection {
    Absent,
    Seen,
    /// Confirmed; carries the detected map in map-specific mode.
    Confirmed(Option<String>),
}

/// The primary loop: waits for the agent-select screen, locks the chosen
/// agent once per round, then waits for the round to end.
pub struct LockEngine {
    ctx: EngineContext,
    sampler: RegionSampler,
    dispatcher: Dispatcher,
    commands: Receiver<EngineCommand>,
    options: LockOptions,
    pool: RandomPool,
    rng: StdRng,
    state: EngineState,
    agent_select: ConfirmationCounter,
    /// One per configured map, same order as `config.regions.maps`.
    maps: Vec<ConfirmationCounter>,
    round_end: Vec<ConfirmationCounter>,
    /// Agent chosen on the confirming poll, clicked on the next one.
    target: Option<String>,
}

impl LockEngine {
    pub fn new(
        ctx: EngineContext,
        sampler: RegionSampler,
        dispatcher: Dispatcher,
        commands: Receiver<EngineCommand>,
        options: LockOptions,
    ) -> Self {
        let th = ctx.config.thresholds;
        let maps = ctx.config.regions.maps.iter().map(|_| ConfirmationCounter::new(th.map)).collect();
        let round_end = ctx
            .config
            .regions
            .round_end
            .iter()
            .map(|_| ConfirmationCounter::new(th.round_end))
            .collect();
        ctx.status.set_engine_state(EngineState::Disabled);
        Self {
            ctx,
            sampler,
            dispatcher,
            commands,
            options,
            pool: RandomPool::default(),
            rng: StdRng::from_entropy(),
            state: EngineState::Disabled,
            agent_select: ConfirmationCounter::new(th.agent_select),
            maps,
            round_end,
            target: None,
        }
    }

    /// Replace the selection rng, for reproducible random picks.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn options(&self) -> LockOptions {
        self.options
    }

    fn transition(&mut self, next: EngineState) {
        if next == self.state {
            return;
        }
        if !self.state.can_move_to(next) {
            logger::error_p(TAG, &format!("illegal transition {} -> {}", self.state, next));
            return;
        }
        logger::debug_p(TAG, &format!("{} -> {}", self.state, next));
        self.state = next;
        self.ctx.status.set_engine_state(next);
    }

    fn reset_detection(&mut self) {
        self.agent_select.reset();
        self.maps.iter_mut().for_each(ConfirmationCounter::reset);
        self.round_end.iter_mut().for_each(ConfirmationCounter::reset);
        self.target = None;
    }

    /// Turn the engine off and tell the UI why.
    fn disable(&mut self, reason: Option<String>) {
        match &reason {
            Some(r) => logger::warn_p(TAG, &format!("disabled: {}", r)),
            None => logger::info_p(TAG, "disabled"),
        }
        self.reset_detection();
        self.ctx.status.set_disabled_reason(reason);
        self.transition(EngineState::Disabled);
    }

    /// Drain pending UI commands.
    pub fn process_commands(&mut self) {
        while let Ok(cmd) = self.commands.try_recv() {
            match cmd {
                EngineCommand::Enable => {
                    if self.state == EngineState::Disabled {
                        logger::info_p(TAG, "enabled");
                        self.reset_detection();
                        self.ctx.status.set_disabled_reason(None);
                        self.transition(EngineState::Waiting);
                    }
                }
                EngineCommand::Disable => {
                    if self.state != EngineState::Disabled {
                        self.disable(None);
                    }
                }
                EngineCommand::SetOptions(options) => {
                    if options.map_specific != self.options.map_specific {
                        self.agent_select.reset();
                        self.maps.iter_mut().for_each(ConfirmationCounter::reset);
                    }
                    if !options.exclusive_random || !options.random_select {
                        self.pool.clear();
                    }
                    self.options = options;
                }
            }
        }
    }

    /// Sample the detector for the current mode once.
    fn detect(&mut self) -> Detection {
        let config = self.ctx.config.clone();
        if self.options.map_specific && !config.regions.maps.is_empty() {
            let mut seen = false;
            let mut confirmed = None;
            for ((name, region), counter) in config.regions.maps.iter().zip(self.maps.iter_mut()) {
                let hit = self.sampler.check(region);
                seen |= hit;
                if counter.record(hit) && confirmed.is_none() {
                    confirmed = Some(name.clone());
                }
            }
            match (confirmed, seen) {
                (Some(map), _) => Detection::Confirmed(Some(map)),
                (None, true) => Detection::Seen,
                (None, false) => Detection::Absent,
            }
        } else {
            let hit = self.sampler.check(&config.regions.agent_select);
            if self.agent_select.record(hit) {
                Detection::Confirmed(None)
            } else if hit {
                Detection::Seen
            } else {
                Detection::Absent
            }
        }
    }

    /// Pick the agent to lock. `Err` carries the reason the engine must stop.
    fn resolve_target(&mut self, map: Option<&str>) -> Result<String, String> {
        let roster = self.ctx.roster.lock().map_err(|_| "roster unavailable".to_string())?;
        let name = match map {
            Some(map) if self.options.map_specific => roster.target_for_map(map).to_string(),
            _ if self.options.random_select => {
                let eligible = roster.eligible_random();
                self.pool
                    .draw(&eligible, self.options.exclusive_random, &mut self.rng)
                    .ok_or_else(|| "no eligible agent for random select".to_string())?
            }
            _ => roster.selected.clone(),
        };
        if name.is_empty() {
            return Err("no agent selected".into());
        }
        match agent_index(&roster.unlocked, &name) {
            Some(_) => Ok(name),
            None => Err(format!("agent '{}' is not unlocked", name)),
        }
    }

    /// Grid index of `name` in the roster as it is right now.
    fn current_index(&self, name: &str) -> Result<usize, String> {
        let roster = self.ctx.roster.lock().map_err(|_| "roster unavailable".to_string())?;
        agent_index(&roster.unlocked, name).ok_or_else(|| format!("agent '{}' is not unlocked", name))
    }

    fn on_confirmed(&mut self, map: Option<String>) {
        if let Some(m) = &map {
            logger::info_p(TAG, &format!("agent select on {}", m));
        } else {
            logger::info_p(TAG, "agent select confirmed");
        }
        match self.resolve_target(map.as_deref()) {
            Ok(name) => {
                self.target = Some(name);
                self.transition(EngineState::Locking);
            }
            Err(reason) => self.disable(Some(reason)),
        }
    }

    fn lock(&mut self) {
        let Some(name) = self.target.take() else {
            self.transition(EngineState::DetectingRoundEnd);
            return;
        };
        // the roster may have changed since the target was picked
        let index = match self.current_index(&name) {
            Ok(index) => index,
            Err(reason) => return self.disable(Some(reason)),
        };
        let config = self.ctx.config.clone();
        let profile = TimingProfile::from_table(&config.timing, self.options.safe_mode);
        let request = LockRequest {
            layout: &config.layout,
            index,
            confirm: &config.regions.confirm_button,
            confirm_jitter: config.timing.confirm_jitter,
            profile,
            hover: self.options.hover,
        };
        match self.dispatcher.lock_agent(request) {
            Ok(elapsed) => {
                let key = timing_key(self.options.safe_mode);
                logger::info_p(TAG, &format!("locked {} in {}ms ({})", name, elapsed.as_millis(), key));
                self.ctx.stats.append(key, LockTimingSample::now(elapsed));
            }
            Err(e) => logger::error_p(TAG, &format!("lock failed: {}", e)),
        }
        self.round_end.iter_mut().for_each(ConfirmationCounter::reset);
        self.transition(EngineState::DetectingRoundEnd);
    }

    fn round_over(&mut self) -> bool {
        let config = self.ctx.config.clone();
        let mut over = false;
        for (region, counter) in config.regions.round_end.iter().zip(self.round_end.iter_mut()) {
            over |= counter.record(self.sampler.check(region));
        }
        over
    }

    /// Run one poll of the state machine. Returns the wait before the next.
    pub fn step(&mut self) -> Duration {
        self.process_commands();
        let timing = &self.ctx.config.timing;
        let (poll, idle) = (timing.poll, timing.disabled_poll);

        match self.state {
            EngineState::Disabled => return idle,
            EngineState::Waiting => match self.detect() {
                Detection::Absent => {}
                Detection::Seen => self.transition(EngineState::DetectingAgentSelect),
                Detection::Confirmed(map) => {
                    self.transition(EngineState::DetectingAgentSelect);
                    self.on_confirmed(map);
                }
            },
            EngineState::DetectingAgentSelect => match self.detect() {
                Detection::Absent => {
                    self.reset_detection();
                    self.transition(EngineState::Waiting);
                }
                Detection::Seen => {}
                Detection::Confirmed(map) => self.on_confirmed(map),
            },
            EngineState::Locking => self.lock(),
            EngineState::DetectingRoundEnd => {
                if self.round_over() {
                    logger::info_p(TAG, "round over");
                    self.reset_detection();
                    self.transition(EngineState::Waiting);
                }
            }
        }

        if self.state == EngineState::Locking {
            Duration::ZERO
        } else {
            poll
        }
    }
}

impl PollLoop for LockEngine {
    fn name(&self) -> &'static str {
        TAG
    }

    fn tick(&mut self) -> Duration {
        self.step()
    }
}
