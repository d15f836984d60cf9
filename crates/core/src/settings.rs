use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::logger;
use crate::roster::Roster;
use crate::types::{IdleMode, LockOptions, Strength};

/// Raw region as written in settings.json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSettings {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// `#RRGGBB`
    pub color: String,
}

/// Every named region for one screen resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionSet {
    pub agent_select: Option<RegionSettings>,
    pub confirm_button: Option<RegionSettings>,
    pub round_end: Vec<RegionSettings>,
    pub maps: BTreeMap<String, RegionSettings>,
    pub spectating: Option<RegionSettings>,
    pub has_item: Option<RegionSettings>,
    pub can_deploy: Option<RegionSettings>,
    pub is_deploying: Option<RegionSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSettings {
    pub top_left: [i32; 2],
    pub box_size: i32,
    pub columns: u32,
    pub x_gap: i32,
    pub y_gap: i32,
    #[serde(default = "default_inset")]
    pub inset: i32,
}

fn default_inset() -> i32 {
    8
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub poll_ms: u64,
    pub disabled_poll_ms: u64,
    pub fast_delay_ms: u64,
    /// strength -> [min_secs, max_secs]
    pub safe: HashMap<Strength, [f64; 2]>,
    pub safe_delay_divisor: f64,
    pub confirm_jitter_px: i32,
    pub idle_interval_secs: f64,
    pub hold_min_secs: f64,
    pub hold_max_secs: f64,
    pub fixed_hold_secs: Option<f64>,
    pub tools_active_ms: u64,
    pub tools_idle_ms: u64,
    pub spectator_skip_secs: f64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            poll_ms: 100,
            disabled_poll_ms: 250,
            fast_delay_ms: 20,
            safe: HashMap::from([
                (Strength::Low, [0.2, 0.5]),
                (Strength::Medium, [0.5, 1.0]),
                (Strength::High, [1.0, 2.0]),
            ]),
            safe_delay_divisor: 1.0,
            confirm_jitter_px: 4,
            idle_interval_secs: 7.5,
            hold_min_secs: 0.1,
            hold_max_secs: 0.3,
            fixed_hold_secs: None,
            tools_active_ms: 100,
            tools_idle_ms: 2000,
            spectator_skip_secs: 5.0,
        }
    }
}

/// Consecutive matching polls each check needs before it is trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdSettings {
    pub agent_select: u32,
    pub map: u32,
    pub round_end: u32,
    pub drop: u32,
    pub spectator: u32,
}

impl Default for ThresholdSettings {
    fn default() -> Self {
        Self { agent_select: 3, map: 3, round_end: 3, drop: 2, spectator: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeybindSettings {
    pub forward: String,
    pub back: String,
    pub left: String,
    pub right: String,
    pub drop: String,
    pub chat_open: Vec<String>,
    pub chat_confirm: Vec<String>,
    pub chat_cancel: Vec<String>,
}

impl Default for KeybindSettings {
    fn default() -> Self {
        Self {
            forward: "w".into(),
            back: "s".into(),
            left: "a".into(),
            right: "d".into(),
            drop: "g".into(),
            chat_open: vec!["enter".into()],
            chat_confirm: vec!["enter".into()],
            chat_cancel: vec!["escape".into()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsSettings {
    pub idle_enabled: bool,
    pub drop_enabled: bool,
    pub idle_mode: IdleMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Active resolution key, e.g. `1920x1080`.
    pub resolution: String,
    pub regions: HashMap<String, RegionSet>,
    pub layouts: HashMap<String, LayoutSettings>,
    pub timing: TimingSettings,
    pub thresholds: ThresholdSettings,
    pub keybinds: KeybindSettings,
    pub roster: Roster,
    pub options: LockOptions,
    pub tools: ToolsSettings,
    pub locking_enabled: bool,
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            resolution: "1920x1080".into(),
            regions: HashMap::new(),
            layouts: HashMap::new(),
            timing: TimingSettings::default(),
            thresholds: ThresholdSettings::default(),
            keybinds: KeybindSettings::default(),
            roster: Roster::default(),
            options: LockOptions::default(),
            tools: ToolsSettings::default(),
            locking_enabled: false,
            debug: false,
        }
    }
}

impl Settings {
    /// Missing or unreadable files fall back to defaults.
    pub fn load(path: &Path) -> Self {
        let Ok(text) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&text) {
            Ok(s) => s,
            Err(e) => {
                logger::warn(&format!("ignoring malformed {}: {}", path.display(), e));
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(&dir.path().join("nope.json"));
        assert_eq!(s, Settings::default());
        assert_eq!(s.thresholds.drop, 2);
        assert_eq!(s.thresholds.agent_select, 3);
    }

    #[test]
    fn malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn save_then_load_keeps_user_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut s = Settings::default();
        s.options.hover = true;
        s.options.safe_mode = Some(Strength::High);
        s.tools.idle_mode = IdleMode::Circle;
        s.roster.selected = "sage".into();
        s.save(&path).unwrap();
        assert_eq!(Settings::load(&path), s);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "timing": { "poll_ms": 50 }, "debug": true }"#).unwrap();
        let s = Settings::load(&path);
        assert_eq!(s.timing.poll_ms, 50);
        assert_eq!(s.timing.fast_delay_ms, 20);
        assert!(s.debug);
    }
}
