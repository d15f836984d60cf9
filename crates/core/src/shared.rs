use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::EngineConfig;
use crate::roster::Roster;
use crate::stats::StatsStore;
use crate::types::EngineState;

/// Handles every polling loop is built from.
#[derive(Clone)]
pub struct EngineContext {
    pub config: Arc<EngineConfig>,
    pub roster: Arc<Mutex<Roster>>,
    pub stats: StatsStore,
    pub status: Arc<SharedStatus>,
}

/// Flags that cross thread boundaries. Each field has exactly one writer:
/// the engine owns `engine_state`/`disabled_reason`, the tools loop owns the
/// tool flags, the chat detector owns `chat_open`.
#[derive(Debug, Default)]
pub struct SharedStatus {
    engine_state: AtomicU8,
    disabled_reason: Mutex<Option<String>>,
    idle_enabled: AtomicBool,
    drop_enabled: AtomicBool,
    chat_open: AtomicBool,
}

impl SharedStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engine_state(&self) -> EngineState {
        EngineState::from_u8(self.engine_state.load(Ordering::Acquire))
    }

    pub(crate) fn set_engine_state(&self, state: EngineState) {
        self.engine_state.store(state.as_u8(), Ordering::Release);
    }

    /// Why the engine last turned itself off, if it did.
    pub fn disabled_reason(&self) -> Option<String> {
        self.disabled_reason.lock().ok().and_then(|r| r.clone())
    }

    pub(crate) fn set_disabled_reason(&self, reason: Option<String>) {
        if let Ok(mut r) = self.disabled_reason.lock() {
            *r = reason;
        }
    }

    pub fn idle_enabled(&self) -> bool {
        self.idle_enabled.load(Ordering::Acquire)
    }

    pub fn drop_enabled(&self) -> bool {
        self.drop_enabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_tools(&self, idle: bool, drop: bool) {
        self.idle_enabled.store(idle, Ordering::Release);
        self.drop_enabled.store(drop, Ordering::Release);
    }

    pub fn chat_open(&self) -> bool {
        self.chat_open.load(Ordering::Acquire)
    }

    pub(crate) fn set_chat_open(&self, open: bool) {
        self.chat_open.store(open, Ordering::Release);
    }
}
