use std::path::PathBuf;
use std::sync::{mpsc, Arc, Mutex};

use instalock_core::logger;
use instalock_core::roster::Roster;
use instalock_core::settings::Settings;
use instalock_core::shared::SharedStatus;
use instalock_core::stats::StatsStore;
use instalock_core::types::{EngineCommand, EngineState, Strength, ToolsCommand};

/// Channels into the running loops. Absent when the configuration did not
/// validate and the loops were never started.
pub struct LoopHandles {
    pub engine_tx: mpsc::Sender<EngineCommand>,
    pub tools_tx: mpsc::Sender<ToolsCommand>,
}

pub struct App {
    pub status: Arc<SharedStatus>,
    pub roster: Arc<Mutex<Roster>>,
    pub stats: StatsStore,
    pub settings: Settings,
    pub settings_path: PathBuf,
    pub loops: Option<LoopHandles>,
    /// Why the loops are not running, shown in the banner.
    pub config_error: Option<String>,
    pub selected: usize,
    pub log_visible: bool,
    pub log_messages: Vec<String>,
    pub log_scroll: usize, // offset from bottom (0 = latest)
    pub log_rx: mpsc::Receiver<String>,
    pub should_quit: bool,
}

fn next_strength(s: Option<Strength>) -> Option<Strength> {
    match s {
        None => Some(Strength::Low),
        Some(Strength::Low) => Some(Strength::Medium),
        Some(Strength::Medium) => Some(Strength::High),
        Some(Strength::High) => None,
    }
}

impl App {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        status: Arc<SharedStatus>,
        roster: Arc<Mutex<Roster>>,
        stats: StatsStore,
        settings: Settings,
        settings_path: PathBuf,
        loops: Option<LoopHandles>,
        config_error: Option<String>,
        log_rx: mpsc::Receiver<String>,
    ) -> Self {
        Self {
            status,
            roster,
            stats,
            settings,
            settings_path,
            loops,
            config_error,
            selected: 0,
            log_visible: true,
            log_messages: Vec::new(),
            log_scroll: 0,
            log_rx,
            should_quit: false,
        }
    }

    pub fn drain_logs(&mut self) {
        while let Ok(msg) = self.log_rx.try_recv() {
            self.log_messages.push(msg);
        }
    }

    pub fn scroll_log_up(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_add(n);
    }

    pub fn scroll_log_down(&mut self, n: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(n);
    }

    pub fn toggle_log(&mut self) {
        self.log_visible = !self.log_visible;
    }

    /// Write the current roster and toggles to disk.
    pub fn persist(&mut self) {
        if let Ok(r) = self.roster.lock() {
            self.settings.roster = r.clone();
        }
        if let Err(e) = self.settings.save(&self.settings_path) {
            logger::error(&format!("failed to save settings: {:#}", e));
        }
    }

    /// Pick up changes the loops made on their own.
    pub fn sync_status(&mut self) {
        if self.loops.is_none() {
            return;
        }
        let mut changed = false;
        if self.settings.locking_enabled
            && self.status.engine_state() == EngineState::Disabled
            && self.status.disabled_reason().is_some()
        {
            self.settings.locking_enabled = false;
            changed = true;
        }
        if self.settings.tools.idle_enabled && !self.status.idle_enabled() {
            self.settings.tools.idle_enabled = false;
            changed = true;
        }
        if changed {
            self.persist();
        }
    }

    fn roster_len(&self) -> usize {
        self.roster.lock().map(|r| r.unlocked.len()).unwrap_or(0)
    }

    fn current_agent(&self) -> Option<String> {
        self.roster.lock().ok()?.unlocked.get(self.selected).cloned()
    }

    pub fn move_up(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.roster_len() {
            self.selected += 1;
        }
    }

    pub fn select_current(&mut self) {
        let Some(agent) = self.current_agent() else { return };
        if let Ok(mut r) = self.roster.lock() {
            r.selected = agent.clone();
        }
        logger::info(&format!("selected {}", agent));
        self.persist();
    }

    pub fn toggle_random_eligible(&mut self) {
        let Some(agent) = self.current_agent() else { return };
        if let Ok(mut r) = self.roster.lock() {
            r.toggle_random_eligible(&agent);
        }
        self.persist();
    }

    pub fn toggle_engine(&mut self) {
        let Some(loops) = &self.loops else {
            logger::warn("locking unavailable until settings.json is fixed");
            return;
        };
        let enable = self.status.engine_state() == EngineState::Disabled;
        let cmd = if enable { EngineCommand::Enable } else { EngineCommand::Disable };
        loops.engine_tx.send(cmd).ok();
        self.settings.locking_enabled = enable;
        self.persist();
    }

    fn send_options(&mut self) {
        if let Some(loops) = &self.loops {
            loops.engine_tx.send(EngineCommand::SetOptions(self.settings.options)).ok();
        }
        self.persist();
    }

    pub fn toggle_hover(&mut self) {
        self.settings.options.hover = !self.settings.options.hover;
        self.send_options();
    }

    pub fn cycle_safe_mode(&mut self) {
        self.settings.options.safe_mode = next_strength(self.settings.options.safe_mode);
        self.send_options();
    }

    pub fn toggle_random(&mut self) {
        self.settings.options.random_select = !self.settings.options.random_select;
        self.send_options();
    }

    pub fn toggle_exclusive(&mut self) {
        self.settings.options.exclusive_random = !self.settings.options.exclusive_random;
        self.send_options();
    }

    pub fn toggle_map_specific(&mut self) {
        self.settings.options.map_specific = !self.settings.options.map_specific;
        self.send_options();
    }

    fn send_tools(&mut self, cmd: ToolsCommand) {
        if let Some(loops) = &self.loops {
            loops.tools_tx.send(cmd).ok();
        }
        self.persist();
    }

    pub fn toggle_idle(&mut self) {
        let on = !self.settings.tools.idle_enabled;
        self.settings.tools.idle_enabled = on;
        self.send_tools(ToolsCommand::SetIdle(on));
    }

    pub fn cycle_idle_mode(&mut self) {
        let mode = self.settings.tools.idle_mode.next();
        self.settings.tools.idle_mode = mode;
        self.send_tools(ToolsCommand::SetIdleMode(mode));
    }

    pub fn toggle_drop(&mut self) {
        let on = !self.settings.tools.drop_enabled;
        self.settings.tools.drop_enabled = on;
        self.send_tools(ToolsCommand::SetDrop(on));
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}
