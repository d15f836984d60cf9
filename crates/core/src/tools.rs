use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::{DropRegions, Keybinds};
use crate::confirm::ConfirmationCounter;
use crate::dispatch::Dispatcher;
use crate::keys::Key;
use crate::logger;
use crate::sampler::RegionSampler;
use crate::shared::EngineContext;
use crate::sleep;
use crate::supervisor::PollLoop;
use crate::types::{EngineState, IdleMode, ToolsCommand};

const TAG: &str = "tools";

/// Which maintenance tools are switched on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolsState {
    pub idle: bool,
    pub drop: bool,
    pub idle_mode: IdleMode,
}

impl ToolsState {
    pub fn any_enabled(&self) -> bool {
        self.idle || self.drop
    }
}

fn opposite(key: Key, binds: &Keybinds) -> Key {
    if key == binds.forward {
        binds.back
    } else if key == binds.back {
        binds.forward
    } else if key == binds.left {
        binds.right
    } else {
        binds.left
    }
}

/// Keys pressed, in order, for one idle-prevention move.
pub fn idle_sequence<R: rand::Rng + ?Sized>(mode: IdleMode, binds: &Keybinds, rng: &mut R) -> Vec<Key> {
    let all = [binds.forward, binds.right, binds.back, binds.left];
    match mode {
        IdleMode::ForwardBack => vec![binds.forward, binds.back],
        IdleMode::Strafe => vec![binds.right, binds.left],
        IdleMode::Circle => all.to_vec(),
        IdleMode::RandomDirection => all.choose(rng).copied().into_iter().collect(),
        IdleMode::RandomReturn => match all.choose(rng) {
            Some(&k) => vec![k, opposite(k, binds)],
            None => Vec::new(),
        },
    }
}

/// The secondary loop: idle prevention and the timed drop.
pub struct ToolsLoop {
    ctx: EngineContext,
    sampler: RegionSampler,
    dispatcher: Dispatcher,
    commands: Receiver<ToolsCommand>,
    user_keys: Receiver<Key>,
    state: ToolsState,
    drop: ConfirmationCounter,
    spectator: ConfirmationCounter,
    skip_until: Option<Instant>,
    last_idle: Option<Instant>,
    rng: StdRng,
}

impl ToolsLoop {
    pub fn new(
        ctx: EngineContext,
        sampler: RegionSampler,
        dispatcher: Dispatcher,
        commands: Receiver<ToolsCommand>,
        user_keys: Receiver<Key>,
        state: ToolsState,
    ) -> Self {
        let th = ctx.config.thresholds;
        ctx.status.set_tools(state.idle, state.drop);
        Self {
            ctx,
            sampler,
            dispatcher,
            commands,
            user_keys,
            state,
            drop: ConfirmationCounter::new(th.drop),
            spectator: ConfirmationCounter::new(th.spectator),
            skip_until: None,
            last_idle: None,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn state(&self) -> ToolsState {
        self.state
    }

    fn publish(&self) {
        self.ctx.status.set_tools(self.state.idle, self.state.drop);
    }

    fn process_commands(&mut self) {
        while let Ok(cmd) = self.commands.try_recv() {
            match cmd {
                ToolsCommand::SetIdle(on) => {
                    if on && !self.state.idle {
                        self.last_idle = None;
                    }
                    if on {
                        // movement from before the switch says nothing about now
                        let stale = self.user_keys.try_iter().count();
                        if stale > 0 {
                            logger::debug_p(TAG, &format!("discarded {} queued movement keys", stale));
                        }
                    }
                    self.state.idle = on;
                    logger::info_p(TAG, &format!("idle prevention {}", if on { "on" } else { "off" }));
                }
                ToolsCommand::SetDrop(on) => {
                    self.state.drop = on;
                    self.drop.reset();
                    logger::info_p(TAG, &format!("timed drop {}", if on { "on" } else { "off" }));
                }
                ToolsCommand::SetIdleMode(mode) => {
                    self.state.idle_mode = mode;
                    logger::debug_p(TAG, &format!("idle mode {}", mode.label()));
                }
            }
        }
        self.publish();
    }

    /// A movement key typed by the user means they are back at the keyboard.
    fn drain_user_keys(&mut self) {
        let mut moved = false;
        while let Ok(key) = self.user_keys.try_recv() {
            moved |= self.ctx.config.keybinds.is_movement(key);
        }
        if moved && self.state.idle {
            logger::info_p(TAG, "movement key pressed, idle prevention off");
            self.state.idle = false;
            self.publish();
        }
    }

    fn hold(&mut self) -> Duration {
        let tools = &self.ctx.config.tools;
        match tools.fixed_hold {
            Some(d) => d,
            None => sleep::uniform_secs(&mut self.rng, tools.hold.0..=tools.hold.1),
        }
    }

    fn press(&mut self, key: Key) {
        let hold = self.hold();
        if let Err(e) = self.dispatcher.hold_key(key, hold) {
            logger::error_p(TAG, &format!("key {} failed: {}", key, e));
        }
    }

    fn drop_ready(&mut self, regions: &DropRegions) -> bool {
        self.sampler.check(&regions.has_item)
            && !self.sampler.check(&regions.can_deploy)
            && !self.sampler.check(&regions.is_deploying)
    }

    fn run_drop(&mut self) {
        let Some(regions) = self.ctx.config.regions.drop else { return };
        let ready = self.drop_ready(&regions);
        if self.drop.record(ready) {
            logger::info_p(TAG, "dropping");
            self.press(self.ctx.config.keybinds.drop);
        }
    }

    fn run_idle(&mut self, now: Instant) {
        let interval = self.ctx.config.tools.idle_interval;
        match self.last_idle {
            None => self.last_idle = Some(now),
            Some(last) if now.duration_since(last) >= interval => {
                self.last_idle = Some(now);
                let keys = idle_sequence(self.state.idle_mode, &self.ctx.config.keybinds, &mut self.rng);
                logger::debug_p(TAG, &format!("idle move ({})", self.state.idle_mode.label()));
                for key in keys {
                    self.press(key);
                }
            }
            Some(_) => {}
        }
    }

    /// True while a confirmed spectator view suppresses every other check.
    fn spectating(&mut self, now: Instant) -> bool {
        if let Some(until) = self.skip_until {
            if now < until {
                return true;
            }
            self.skip_until = None;
        }
        let Some(region) = self.ctx.config.regions.spectating else { return false };
        if self.spectator.record(self.sampler.check(&region)) {
            logger::debug_p(TAG, "spectating, pausing checks");
            self.spectator.reset();
            self.drop.reset();
            self.skip_until = Some(now + self.ctx.config.tools.spectator_skip);
            return true;
        }
        false
    }

    /// One cycle at wall time `now`.
    pub fn step_at(&mut self, now: Instant) -> Duration {
        self.process_commands();
        self.drain_user_keys();

        let timing = self.ctx.config.tools;
        if !self.state.any_enabled() {
            self.drop.reset();
            self.spectator.reset();
            return timing.idle_poll;
        }
        let status = &self.ctx.status;
        if status.engine_state() == EngineState::Locking || status.chat_open() {
            return timing.active_poll;
        }
        if self.spectating(now) {
            return timing.active_poll;
        }
        if self.state.drop {
            self.run_drop();
        }
        if self.state.idle {
            self.run_idle(now);
        }
        timing.active_poll
    }
}

impl PollLoop for ToolsLoop {
    fn name(&self) -> &'static str {
        TAG
    }

    fn tick(&mut self) -> Duration {
        self.step_at(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::testing::valid_config;
    use crate::config::EngineConfig;
    use crate::dispatch::testing::RecordingInput;
    use crate::roster::Roster;
    use crate::sampler::testing::ScriptedScreen;
    use crate::shared::SharedStatus;
    use crate::sleep::testing::RecordingPause;
    use crate::stats::StatsStore;
    use std::sync::mpsc::{self, Sender};
    use std::sync::{Arc, Mutex};

    struct Rig {
        tools: ToolsLoop,
        screen: ScriptedScreen,
        input: RecordingInput,
        pause: RecordingPause,
        status: Arc<SharedStatus>,
        cmd: Sender<ToolsCommand>,
        keys: Sender<Key>,
    }

    fn rig(state: ToolsState) -> Rig {
        rig_with(state, valid_config())
    }

    fn rig_with(state: ToolsState, config: EngineConfig) -> Rig {
        let screen = ScriptedScreen::default();
        let input = RecordingInput::default();
        let pause = RecordingPause::default();
        let status = Arc::new(SharedStatus::new());
        let ctx = EngineContext {
            config: Arc::new(config),
            roster: Arc::new(Mutex::new(Roster::default())),
            stats: StatsStore::in_memory(),
            status: status.clone(),
        };
        let dispatcher =
            Dispatcher::with_rng(Box::new(input.clone()), Box::new(pause.clone()), StdRng::seed_from_u64(1));
        let (cmd, cmd_rx) = mpsc::channel();
        let (keys, keys_rx) = mpsc::channel();
        let tools = ToolsLoop::new(ctx, RegionSampler::new(Box::new(screen.clone()), TAG), dispatcher, cmd_rx, keys_rx, state)
            .with_rng(StdRng::seed_from_u64(2));
        Rig { tools, screen, input, pause, status, cmd, keys }
    }

    fn drop_rig() -> Rig {
        rig(ToolsState { drop: true, ..Default::default() })
    }

    fn has_item(r: &Rig) -> crate::types::Region {
        r.tools.ctx.config.regions.drop.unwrap().has_item
    }

    #[test]
    fn drop_fires_once_for_two_ready_frames() {
        let mut r = drop_rig();
        let region = has_item(&r);
        r.screen.push_hits(&region, &[true, true, true, true]);
        let now = Instant::now();
        for _ in 0..4 {
            r.tools.step_at(now);
        }
        assert_eq!(r.input.pressed_keys(), vec![Key::Char('g')]);
    }

    #[test]
    fn a_false_frame_resets_the_drop_run() {
        let mut r = drop_rig();
        let region = has_item(&r);
        r.screen.push_hits(&region, &[true, false, true]);
        let now = Instant::now();
        for _ in 0..3 {
            r.tools.step_at(now);
        }
        assert!(r.input.pressed_keys().is_empty());
        r.screen.push_hits(&region, &[true]);
        r.tools.step_at(now);
        assert_eq!(r.input.pressed_keys().len(), 1);
    }

    #[test]
    fn deploy_in_progress_blocks_the_drop() {
        let mut r = drop_rig();
        let regions = r.tools.ctx.config.regions.drop.unwrap();
        r.screen.push_hits(&regions.has_item, &[true, true]);
        r.screen.push_hits(&regions.can_deploy, &[false, false]);
        r.screen.push_hits(&regions.is_deploying, &[false, true]);
        let now = Instant::now();
        r.tools.step_at(now);
        r.tools.step_at(now);
        assert!(r.input.pressed_keys().is_empty());
    }

    #[test]
    fn strafe_presses_right_then_left_with_human_holds() {
        let mut r = rig(ToolsState { idle: true, idle_mode: IdleMode::Strafe, ..Default::default() });
        let t0 = Instant::now();
        r.tools.step_at(t0);
        assert!(r.input.pressed_keys().is_empty());
        r.tools.step_at(t0 + Duration::from_millis(7_500));

        assert_eq!(r.input.pressed_keys(), vec![Key::Char('d'), Key::Char('a')]);
        let holds = r.pause.taken();
        assert_eq!(holds.len(), 2);
        for h in holds {
            let s = h.as_secs_f64();
            assert!((0.1..=0.3).contains(&s), "{s}");
        }
    }

    #[test]
    fn idle_waits_a_full_interval_between_moves() {
        let mut r = rig(ToolsState { idle: true, ..Default::default() });
        let t0 = Instant::now();
        r.tools.step_at(t0);
        r.tools.step_at(t0 + Duration::from_secs(7));
        assert!(r.input.pressed_keys().is_empty());
        r.tools.step_at(t0 + Duration::from_secs(8));
        assert_eq!(r.input.pressed_keys(), vec![Key::Char('w'), Key::Char('s')]);
        r.tools.step_at(t0 + Duration::from_secs(9));
        assert_eq!(r.input.pressed_keys().len(), 2);
    }

    #[test]
    fn random_return_goes_back_where_it_came_from() {
        let binds = valid_config().keybinds;
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..20 {
            let seq = idle_sequence(IdleMode::RandomReturn, &binds, &mut rng);
            assert_eq!(seq.len(), 2);
            assert_eq!(seq[1], opposite(seq[0], &binds));
            assert_ne!(seq[0], seq[1]);
        }
    }

    #[test]
    fn circle_walks_all_four_directions_in_order() {
        let binds = valid_config().keybinds;
        let mut rng = StdRng::seed_from_u64(4);
        assert_eq!(
            idle_sequence(IdleMode::Circle, &binds, &mut rng),
            vec![binds.forward, binds.right, binds.back, binds.left]
        );
    }

    #[test]
    fn random_direction_presses_one_movement_key() {
        let binds = valid_config().keybinds;
        let mut rng = StdRng::seed_from_u64(4);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..40 {
            let seq = idle_sequence(IdleMode::RandomDirection, &binds, &mut rng);
            assert_eq!(seq.len(), 1);
            assert!(binds.is_movement(seq[0]));
            seen.insert(seq[0]);
        }
        assert!(seen.len() > 1);
    }

    #[test]
    fn fixed_hold_overrides_the_random_range() {
        let mut config = valid_config();
        config.tools.fixed_hold = Some(Duration::from_millis(250));
        let mut r = rig_with(ToolsState { idle: true, idle_mode: IdleMode::Circle, ..Default::default() }, config);
        let t0 = Instant::now();
        r.tools.step_at(t0);
        r.tools.step_at(t0 + Duration::from_secs(8));

        assert_eq!(r.input.pressed_keys().len(), 4);
        let holds = r.pause.taken();
        assert_eq!(holds.len(), 4);
        assert!(holds.iter().all(|h| *h == Duration::from_millis(250)));
    }

    #[test]
    fn movement_queued_before_idle_is_switched_on_is_ignored() {
        let mut r = rig(ToolsState::default());
        r.keys.send(Key::Char('d')).unwrap();
        r.keys.send(Key::Char('w')).unwrap();
        r.cmd.send(ToolsCommand::SetIdle(true)).unwrap();
        r.tools.step_at(Instant::now());
        assert!(r.tools.state().idle);
        assert!(r.status.idle_enabled());

        r.keys.send(Key::Char('a')).unwrap();
        r.tools.step_at(Instant::now());
        assert!(!r.tools.state().idle);
    }

    #[test]
    fn drop_toggle_leaves_idle_alone() {
        let mut r = rig(ToolsState { idle: true, ..Default::default() });
        r.cmd.send(ToolsCommand::SetDrop(true)).unwrap();
        r.tools.step_at(Instant::now());
        let state = r.tools.state();
        assert!(state.idle && state.drop);
    }

    #[test]
    fn user_movement_disables_idle() {
        let mut r = rig(ToolsState { idle: true, ..Default::default() });
        r.tools.step_at(Instant::now());
        assert!(r.status.idle_enabled());
        r.keys.send(Key::Char('w')).unwrap();
        r.tools.step_at(Instant::now());
        assert!(!r.tools.state().idle);
        assert!(!r.status.idle_enabled());
    }

    #[test]
    fn nothing_runs_while_locking_or_chatting() {
        let mut r = drop_rig();
        let region = has_item(&r);
        r.screen.push_hits(&region, &[true, true]);
        let now = Instant::now();

        r.status.set_engine_state(EngineState::Locking);
        r.tools.step_at(now);
        r.status.set_engine_state(EngineState::Waiting);
        r.status.set_chat_open(true);
        r.tools.step_at(now);
        assert!(r.input.pressed_keys().is_empty());

        // the scripted frames were never consumed
        r.status.set_chat_open(false);
        r.tools.step_at(now);
        r.tools.step_at(now);
        assert_eq!(r.input.pressed_keys().len(), 1);
    }

    #[test]
    fn spectating_skips_checks_for_the_configured_time() {
        let mut r = drop_rig();
        let spectating = r.tools.ctx.config.regions.spectating.unwrap();
        r.screen.push_hits(&spectating, &[true, true]);
        let t0 = Instant::now();
        r.tools.step_at(t0);
        r.tools.step_at(t0);

        let region = has_item(&r);
        r.screen.push_hits(&region, &[true, true]);
        r.tools.step_at(t0 + Duration::from_secs(1));
        r.tools.step_at(t0 + Duration::from_secs(4));
        assert!(r.input.pressed_keys().is_empty());

        r.tools.step_at(t0 + Duration::from_secs(6));
        r.tools.step_at(t0 + Duration::from_secs(6));
        assert_eq!(r.input.pressed_keys(), vec![Key::Char('g')]);
    }

    #[test]
    fn commands_toggle_tools_and_cadence() {
        let mut r = rig(ToolsState::default());
        let timing = r.tools.ctx.config.tools;
        assert_eq!(r.tools.step_at(Instant::now()), timing.idle_poll);
        r.cmd.send(ToolsCommand::SetDrop(true)).unwrap();
        r.cmd.send(ToolsCommand::SetIdleMode(IdleMode::Circle)).unwrap();
        assert_eq!(r.tools.step_at(Instant::now()), timing.active_poll);
        assert!(r.status.drop_enabled());
        assert_eq!(r.tools.state().idle_mode, IdleMode::Circle);
    }
}
