use std::fmt;

use serde::{Deserialize, Serialize};

/// Screen coordinate in physical pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// 24-bit colour as it appears on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Absolute screen rectangle to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRect {
    pub l: i32,
    pub t: i32,
    pub w: i32,
    pub h: i32,
}

/// A screen rectangle that is one uniform colour while some condition holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub color: Rgb,
}

impl Region {
    pub fn rect(&self) -> CaptureRect {
        CaptureRect { l: self.x, t: self.y, w: self.width, h: self.height }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// Raw screenshot pixel data (BGRA)
#[derive(Debug, Clone)]
pub struct Capture {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub bytes_per_row: u32,
}

impl Capture {
    /// Build a capture filled with a single colour. Mostly useful for fakes.
    pub fn solid(width: u32, height: u32, color: Rgb) -> Self {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&[color.b, color.g, color.r, 255]);
        }
        Self { data, width, height, bytes_per_row: width * 4 }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        let idx = (y * self.bytes_per_row + x * 4) as usize;
        let px = self.data.get(idx..idx + 3)?;
        Some(Rgb::new(px[2], px[1], px[0]))
    }
}

/// Locking state machine states. Exactly one is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    Disabled,
    Waiting,
    DetectingAgentSelect,
    Locking,
    DetectingRoundEnd,
}

impl EngineState {
    pub fn as_u8(self) -> u8 {
        match self {
            EngineState::Disabled => 0,
            EngineState::Waiting => 1,
            EngineState::DetectingAgentSelect => 2,
            EngineState::Locking => 3,
            EngineState::DetectingRoundEnd => 4,
        }
    }

    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => EngineState::Waiting,
            2 => EngineState::DetectingAgentSelect,
            3 => EngineState::Locking,
            4 => EngineState::DetectingRoundEnd,
            _ => EngineState::Disabled,
        }
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_move_to(self, next: EngineState) -> bool {
        use EngineState::*;
        matches!(
            (self, next),
            (_, Disabled)
                | (Disabled, Waiting)
                | (Waiting, DetectingAgentSelect)
                | (DetectingAgentSelect, Waiting)
                | (DetectingAgentSelect, Locking)
                | (Locking, DetectingRoundEnd)
                | (DetectingRoundEnd, Waiting)
        )
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineState::Disabled => "disabled",
            EngineState::Waiting => "waiting",
            EngineState::DetectingAgentSelect => "detecting agent select",
            EngineState::Locking => "locking",
            EngineState::DetectingRoundEnd => "detecting round end",
        };
        f.write_str(s)
    }
}

/// Safe-mode strength, each mapped to a delay range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Low,
    Medium,
    High,
}

impl Strength {
    pub const ALL: [Strength; 3] = [Strength::Low, Strength::Medium, Strength::High];

    pub fn key(self) -> &'static str {
        match self {
            Strength::Low => "low",
            Strength::Medium => "medium",
            Strength::High => "high",
        }
    }
}

/// Movement pattern used by idle prevention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleMode {
    #[default]
    ForwardBack,
    Strafe,
    Circle,
    RandomDirection,
    RandomReturn,
}

impl IdleMode {
    pub const ALL: [IdleMode; 5] = [
        IdleMode::ForwardBack,
        IdleMode::Strafe,
        IdleMode::Circle,
        IdleMode::RandomDirection,
        IdleMode::RandomReturn,
    ];

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    pub fn label(self) -> &'static str {
        match self {
            IdleMode::ForwardBack => "forward/back",
            IdleMode::Strafe => "strafe",
            IdleMode::Circle => "circle",
            IdleMode::RandomDirection => "random",
            IdleMode::RandomReturn => "random return",
        }
    }
}

/// Options that shape how the engine picks and locks an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockOptions {
    /// `None` means fast timing.
    pub safe_mode: Option<Strength>,
    pub hover: bool,
    pub map_specific: bool,
    pub random_select: bool,
    pub exclusive_random: bool,
}

/// Command from the UI to the locking engine
#[derive(Debug, Clone)]
pub enum EngineCommand {
    Enable,
    Disable,
    SetOptions(LockOptions),
}

/// Command from the UI to the tools loop
#[derive(Debug, Clone)]
pub enum ToolsCommand {
    SetIdle(bool),
    SetDrop(bool),
    SetIdleMode(IdleMode),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_u8() {
        for s in [
            EngineState::Disabled,
            EngineState::Waiting,
            EngineState::DetectingAgentSelect,
            EngineState::Locking,
            EngineState::DetectingRoundEnd,
        ] {
            assert_eq!(EngineState::from_u8(s.as_u8()), s);
        }
    }

    #[test]
    fn states_cannot_skip() {
        assert!(!EngineState::Waiting.can_move_to(EngineState::Locking));
        assert!(!EngineState::Disabled.can_move_to(EngineState::DetectingRoundEnd));
        assert!(EngineState::Locking.can_move_to(EngineState::Disabled));
    }

    #[test]
    fn solid_capture_reads_back_colour() {
        let cap = Capture::solid(2, 2, Rgb::new(10, 20, 30));
        assert_eq!(cap.pixel(1, 1), Some(Rgb::new(10, 20, 30)));
        assert_eq!(cap.pixel(2, 2), None);
    }
}
