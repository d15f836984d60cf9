use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::error::ConfigError;
use crate::keys::Key;
use crate::layout::AgentBoxLayout;
use crate::settings::{KeybindSettings, RegionSettings, Settings};
use crate::types::{Point, Region, Rgb, Strength};

/// Validated, immutable configuration handed to both loops.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub screen: (i32, i32),
    pub regions: ScreenRegions,
    pub layout: AgentBoxLayout,
    pub timing: TimingTable,
    pub thresholds: Thresholds,
    pub tools: ToolsTiming,
    pub keybinds: Keybinds,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenRegions {
    pub agent_select: Region,
    pub confirm_button: Region,
    pub round_end: Vec<Region>,
    /// (map name, region) in name order
    pub maps: Vec<(String, Region)>,
    pub spectating: Option<Region>,
    pub drop: Option<DropRegions>,
}

impl ScreenRegions {
    /// Every configured region with a stable display name.
    pub fn named(&self) -> Vec<(String, Region)> {
        let mut out = vec![
            ("agent_select".to_string(), self.agent_select),
            ("confirm_button".to_string(), self.confirm_button),
        ];
        out.extend(self.round_end.iter().enumerate().map(|(i, r)| (format!("round_end_{}", i), *r)));
        out.extend(self.maps.iter().map(|(name, r)| (format!("map_{}", name), *r)));
        if let Some(r) = self.spectating {
            out.push(("spectating".into(), r));
        }
        if let Some(d) = self.drop {
            out.push(("has_item".into(), d.has_item));
            out.push(("can_deploy".into(), d.can_deploy));
            out.push(("is_deploying".into(), d.is_deploying));
        }
        out
    }
}

/// The three checks that together say "holding the item and free to drop it".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropRegions {
    pub has_item: Region,
    pub can_deploy: Region,
    pub is_deploying: Region,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimingTable {
    pub poll: Duration,
    pub disabled_poll: Duration,
    pub fast_delay: Duration,
    /// strength -> (min_secs, max_secs)
    pub safe: HashMap<Strength, (f64, f64)>,
    /// Safe-mode ranges are divided by this before drawing.
    pub safe_delay_divisor: f64,
    pub confirm_jitter: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub agent_select: u32,
    pub map: u32,
    pub round_end: u32,
    pub drop: u32,
    pub spectator: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolsTiming {
    pub idle_interval: Duration,
    pub hold: (f64, f64),
    pub fixed_hold: Option<Duration>,
    pub active_poll: Duration,
    pub idle_poll: Duration,
    pub spectator_skip: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keybinds {
    pub forward: Key,
    pub back: Key,
    pub left: Key,
    pub right: Key,
    pub drop: Key,
    pub chat_open: Vec<Key>,
    pub chat_confirm: Vec<Key>,
    pub chat_cancel: Vec<Key>,
}

impl Keybinds {
    pub fn is_movement(&self, key: Key) -> bool {
        key == self.forward || key == self.back || key == self.left || key == self.right
    }
}

fn resolution_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(\d{3,5})\s*[xX]\s*(\d{3,5})\s*$").expect("static regex"))
}

fn color_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#?([0-9a-fA-F]{2})([0-9a-fA-F]{2})([0-9a-fA-F]{2})$").expect("static regex"))
}

pub fn parse_resolution(s: &str) -> Result<(i32, i32), ConfigError> {
    let caps = resolution_re()
        .captures(s)
        .ok_or_else(|| ConfigError::Resolution(s.to_string()))?;
    let w = caps[1].parse().map_err(|_| ConfigError::Resolution(s.to_string()))?;
    let h = caps[2].parse().map_err(|_| ConfigError::Resolution(s.to_string()))?;
    Ok((w, h))
}

pub fn parse_color(s: &str) -> Option<Rgb> {
    let caps = color_re().captures(s.trim())?;
    let channel = |i: usize| u8::from_str_radix(&caps[i], 16).ok();
    Some(Rgb::new(channel(1)?, channel(2)?, channel(3)?))
}

fn region(name: &str, raw: &RegionSettings, screen: (i32, i32)) -> Result<Region, ConfigError> {
    if raw.width <= 0 || raw.height <= 0 {
        return Err(ConfigError::EmptyRegion { name: name.into(), width: raw.width, height: raw.height });
    }
    let right = raw.x.checked_add(raw.width);
    let bottom = raw.y.checked_add(raw.height);
    let fits = matches!((right, bottom), (Some(r), Some(b)) if r <= screen.0 && b <= screen.1);
    if raw.x < 0 || raw.y < 0 || !fits {
        return Err(ConfigError::OffScreen {
            name: name.into(),
            x: raw.x,
            y: raw.y,
            width: raw.width,
            height: raw.height,
            screen_w: screen.0,
            screen_h: screen.1,
        });
    }
    let color = parse_color(&raw.color)
        .ok_or_else(|| ConfigError::Color { name: name.into(), color: raw.color.clone() })?;
    Ok(Region { x: raw.x, y: raw.y, width: raw.width, height: raw.height, color })
}

fn required_region(name: &str, raw: Option<&RegionSettings>, screen: (i32, i32)) -> Result<Region, ConfigError> {
    let raw = raw.ok_or_else(|| ConfigError::MissingRegion { name: name.into() })?;
    region(name, raw, screen)
}

fn optional_region(name: &str, raw: Option<&RegionSettings>, screen: (i32, i32)) -> Result<Option<Region>, ConfigError> {
    raw.map(|r| region(name, r, screen)).transpose()
}

fn key(name: &str, raw: &str) -> Result<Key, ConfigError> {
    raw.parse().map_err(|source| ConfigError::Keybind { name: name.into(), source })
}

fn keys(name: &str, raw: &[String]) -> Result<Vec<Key>, ConfigError> {
    raw.iter().map(|k| key(name, k)).collect()
}

fn keybinds(raw: &KeybindSettings) -> Result<Keybinds, ConfigError> {
    Ok(Keybinds {
        forward: key("forward", &raw.forward)?,
        back: key("back", &raw.back)?,
        left: key("left", &raw.left)?,
        right: key("right", &raw.right)?,
        drop: key("drop", &raw.drop)?,
        chat_open: keys("chat_open", &raw.chat_open)?,
        chat_confirm: keys("chat_confirm", &raw.chat_confirm)?,
        chat_cancel: keys("chat_cancel", &raw.chat_cancel)?,
    })
}

fn secs_range(name: &str, min: f64, max: f64) -> Result<(f64, f64), ConfigError> {
    if !(min.is_finite() && max.is_finite()) || min < 0.0 || max < min {
        return Err(ConfigError::Timing { name: name.into(), reason: format!("bad range [{}, {}]", min, max) });
    }
    Ok((min, max))
}

impl EngineConfig {
    /// Validate loosely typed settings for the active resolution.
    pub fn from_settings(s: &Settings) -> Result<Self, ConfigError> {
        let screen = parse_resolution(&s.resolution)?;
        let res_key = format!("{}x{}", screen.0, screen.1);

        let set = s
            .regions
            .get(&res_key)
            .ok_or_else(|| ConfigError::MissingRegionSet(res_key.clone()))?;

        let round_end = set
            .round_end
            .iter()
            .enumerate()
            .map(|(i, r)| region(&format!("round_end[{}]", i), r, screen))
            .collect::<Result<Vec<_>, _>>()?;
        if round_end.is_empty() {
            return Err(ConfigError::MissingRegion { name: "round_end".into() });
        }

        let maps = set
            .maps
            .iter()
            .map(|(name, r)| Ok((name.clone(), region(&format!("maps.{}", name), r, screen)?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let drop = match (&set.has_item, &set.can_deploy, &set.is_deploying) {
            (None, None, None) => None,
            (has_item, can_deploy, is_deploying) => Some(DropRegions {
                has_item: required_region("has_item", has_item.as_ref(), screen)?,
                can_deploy: required_region("can_deploy", can_deploy.as_ref(), screen)?,
                is_deploying: required_region("is_deploying", is_deploying.as_ref(), screen)?,
            }),
        };

        let regions = ScreenRegions {
            agent_select: required_region("agent_select", set.agent_select.as_ref(), screen)?,
            confirm_button: required_region("confirm_button", set.confirm_button.as_ref(), screen)?,
            round_end,
            maps,
            spectating: optional_region("spectating", set.spectating.as_ref(), screen)?,
            drop,
        };

        let raw_layout = s
            .layouts
            .get(&res_key)
            .ok_or_else(|| ConfigError::MissingLayout(res_key.clone()))?;
        if raw_layout.columns == 0 {
            return Err(ConfigError::Layout("columns must be at least 1".into()));
        }
        if raw_layout.box_size <= 0 || raw_layout.inset < 0 || raw_layout.inset * 2 >= raw_layout.box_size {
            return Err(ConfigError::Layout(format!(
                "inset {} does not fit box size {}",
                raw_layout.inset, raw_layout.box_size
            )));
        }
        let layout = AgentBoxLayout {
            top_left: Point::new(raw_layout.top_left[0], raw_layout.top_left[1]),
            box_size: raw_layout.box_size,
            columns: raw_layout.columns,
            x_gap: raw_layout.x_gap,
            y_gap: raw_layout.y_gap,
            inset: raw_layout.inset,
        };

        let t = &s.timing;
        let mut safe = HashMap::new();
        for strength in Strength::ALL {
            let [min, max] = t.safe.get(&strength).copied().ok_or_else(|| ConfigError::Timing {
                name: format!("safe.{}", strength.key()),
                reason: "missing".into(),
            })?;
            safe.insert(strength, secs_range(&format!("safe.{}", strength.key()), min, max)?);
        }
        if !(t.safe_delay_divisor.is_finite() && t.safe_delay_divisor > 0.0) {
            return Err(ConfigError::Timing { name: "safe_delay_divisor".into(), reason: "must be positive".into() });
        }
        if t.poll_ms == 0 || t.tools_active_ms == 0 {
            return Err(ConfigError::Timing { name: "poll_ms".into(), reason: "must be positive".into() });
        }
        if !(t.idle_interval_secs.is_finite() && t.idle_interval_secs > 0.0) {
            return Err(ConfigError::Timing { name: "idle_interval_secs".into(), reason: "must be positive".into() });
        }
        let hold = secs_range("hold", t.hold_min_secs, t.hold_max_secs)?;
        let fixed_hold = match t.fixed_hold_secs {
            Some(v) if v.is_finite() && v >= 0.0 => Some(Duration::from_secs_f64(v)),
            Some(v) => {
                return Err(ConfigError::Timing { name: "fixed_hold_secs".into(), reason: format!("bad value {}", v) })
            }
            None => None,
        };
        if !(t.spectator_skip_secs.is_finite() && t.spectator_skip_secs >= 0.0) {
            return Err(ConfigError::Timing { name: "spectator_skip_secs".into(), reason: "must not be negative".into() });
        }

        let th = &s.thresholds;
        for (name, v) in [
            ("agent_select", th.agent_select),
            ("map", th.map),
            ("round_end", th.round_end),
            ("drop", th.drop),
            ("spectator", th.spectator),
        ] {
            if v == 0 {
                return Err(ConfigError::Threshold(name));
            }
        }

        Ok(Self {
            screen,
            regions,
            layout,
            timing: TimingTable {
                poll: Duration::from_millis(t.poll_ms),
                disabled_poll: Duration::from_millis(t.disabled_poll_ms.max(1)),
                fast_delay: Duration::from_millis(t.fast_delay_ms),
                safe,
                safe_delay_divisor: t.safe_delay_divisor,
                confirm_jitter: t.confirm_jitter_px.max(0),
            },
            thresholds: Thresholds {
                agent_select: th.agent_select,
                map: th.map,
                round_end: th.round_end,
                drop: th.drop,
                spectator: th.spectator,
            },
            tools: ToolsTiming {
                idle_interval: Duration::from_secs_f64(t.idle_interval_secs),
                hold,
                fixed_hold,
                active_poll: Duration::from_millis(t.tools_active_ms),
                idle_poll: Duration::from_millis(t.tools_idle_ms.max(t.tools_active_ms)),
                spectator_skip: Duration::from_secs_f64(t.spectator_skip_secs),
            },
            keybinds: keybinds(&s.keybinds)?,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn parses_resolution_and_colour() {
        assert_eq!(parse_resolution("2560x1440").unwrap(), (2560, 1440));
        assert!(parse_resolution("wide").is_err());
        assert_eq!(parse_color("#0a0B0c"), Some(Rgb::new(10, 11, 12)));
        assert_eq!(parse_color("FFFFFF"), Some(Rgb::new(255, 255, 255)));
        assert_eq!(parse_color("#FFF"), None);
    }

    #[test]
    fn valid_settings_validate() {
        let c = valid_config();
        assert_eq!(c.screen, (1920, 1080));
        assert_eq!(c.regions.round_end.len(), 2);
        assert_eq!(c.regions.maps[0].0, "ascent");
        assert!(c.regions.drop.is_some());
        assert_eq!(c.thresholds.drop, 2);
        assert_eq!(c.thresholds.agent_select, 3);
        assert_eq!(c.keybinds.right, Key::Char('d'));
        assert_eq!(c.timing.safe[&Strength::Low], (0.2, 0.5));
    }

    #[test]
    fn named_lists_every_region_once() {
        let names: Vec<String> = valid_config().regions.named().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names.len(), 10);
        assert!(names.contains(&"round_end_1".to_string()));
        assert!(names.contains(&"map_bind".to_string()));
    }

    #[test]
    fn shipped_example_validates() {
        let s: Settings = serde_json::from_str(include_str!("../../../settings.example.json")).unwrap();
        let c = EngineConfig::from_settings(&s).unwrap();
        assert_eq!(c.regions.maps.len(), 3);
        assert_eq!(c.layout.columns, 11);
    }

    #[test]
    fn default_settings_have_no_geometry() {
        assert!(matches!(
            EngineConfig::from_settings(&Settings::default()),
            Err(ConfigError::MissingRegionSet(_))
        ));
    }

    #[test]
    fn bad_colour_is_reported_by_name() {
        let mut s = valid_settings();
        s.regions.get_mut("1920x1080").unwrap().agent_select = Some(raw(1, 1, "red"));
        match EngineConfig::from_settings(&s) {
            Err(ConfigError::Color { name, .. }) => assert_eq!(name, "agent_select"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn off_screen_region_is_rejected() {
        let mut s = valid_settings();
        s.regions.get_mut("1920x1080").unwrap().round_end.push(raw(1919, 10, "#000000"));
        match EngineConfig::from_settings(&s) {
            Err(ConfigError::OffScreen { name, screen_w, .. }) => {
                assert_eq!(name, "round_end[2]");
                assert_eq!(screen_w, 1920);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn huge_region_does_not_overflow() {
        let mut s = valid_settings();
        s.regions.get_mut("1920x1080").unwrap().spectating =
            Some(RegionSettings { x: i32::MAX - 1, y: 10, width: i32::MAX, height: 4, color: "#000000".into() });
        assert!(matches!(EngineConfig::from_settings(&s), Err(ConfigError::OffScreen { .. })));
    }

    #[test]
    fn partial_drop_regions_are_rejected() {
        let mut s = valid_settings();
        s.regions.get_mut("1920x1080").unwrap().can_deploy = None;
        assert!(matches!(
            EngineConfig::from_settings(&s),
            Err(ConfigError::MissingRegion { .. })
        ));
    }

    #[test]
    fn zero_threshold_and_bad_divisor_are_rejected() {
        let mut s = valid_settings();
        s.thresholds.round_end = 0;
        assert!(matches!(EngineConfig::from_settings(&s), Err(ConfigError::Threshold("round_end"))));

        let mut s = valid_settings();
        s.timing.safe_delay_divisor = 0.0;
        assert!(EngineConfig::from_settings(&s).is_err());
    }

    #[test]
    fn layout_inset_must_fit() {
        let mut s = valid_settings();
        s.layouts.get_mut("1920x1080").unwrap().inset = 32;
        assert!(matches!(EngineConfig::from_settings(&s), Err(ConfigError::Layout(_))));
    }

    #[test]
    fn unknown_keybind_is_rejected() {
        let mut s = valid_settings();
        s.keybinds.drop = "mouse4".into();
        assert!(matches!(EngineConfig::from_settings(&s), Err(ConfigError::Keybind { .. })));
    }
}
