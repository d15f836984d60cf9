use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Keyboard key as the engine and the platform backends see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Lowercase ASCII letter or digit.
    Char(char),
    Enter,
    Escape,
    Space,
    Tab,
    Backspace,
    Shift,
    Ctrl,
    Alt,
    Up,
    Down,
    Left,
    Right,
    F(u8),
}

/// A raw key transition observed by the platform listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub pressed: bool,
    /// Generated by synthetic input (ours or another program's).
    pub injected: bool,
}

impl KeyEvent {
    pub fn press(key: Key) -> Self {
        Self { key, pressed: true, injected: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown key '{0}'")]
pub struct UnknownKey(pub String);

impl FromStr for Key {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim().to_ascii_lowercase();
        let key = match t.as_str() {
            "enter" | "return" => Key::Enter,
            "esc" | "escape" => Key::Escape,
            "space" => Key::Space,
            "tab" => Key::Tab,
            "backspace" => Key::Backspace,
            "shift" => Key::Shift,
            "ctrl" | "control" => Key::Ctrl,
            "alt" | "option" => Key::Alt,
            "up" => Key::Up,
            "down" => Key::Down,
            "left" => Key::Left,
            "right" => Key::Right,
            _ => {
                if let Some(n) = t.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
                    if (1..=12).contains(&n) {
                        return Ok(Key::F(n));
                    }
                }
                let mut chars = t.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_alphanumeric() => Key::Char(c),
                    _ => return Err(UnknownKey(s.to_string())),
                }
            }
        };
        Ok(key)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{}", c),
            Key::F(n) => write!(f, "f{}", n),
            Key::Enter => f.write_str("enter"),
            Key::Escape => f.write_str("escape"),
            Key::Space => f.write_str("space"),
            Key::Tab => f.write_str("tab"),
            Key::Backspace => f.write_str("backspace"),
            Key::Shift => f.write_str("shift"),
            Key::Ctrl => f.write_str("ctrl"),
            Key::Alt => f.write_str("alt"),
            Key::Up => f.write_str("up"),
            Key::Down => f.write_str("down"),
            Key::Left => f.write_str("left"),
            Key::Right => f.write_str("right"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_chars() {
        assert_eq!("W".parse::<Key>(), Ok(Key::Char('w')));
        assert_eq!("Return".parse::<Key>(), Ok(Key::Enter));
        assert_eq!("esc".parse::<Key>(), Ok(Key::Escape));
        assert_eq!("f4".parse::<Key>(), Ok(Key::F(4)));
        assert_eq!("f".parse::<Key>(), Ok(Key::Char('f')));
    }

    #[test]
    fn rejects_garbage() {
        assert!("ww".parse::<Key>().is_err());
        assert!("f13".parse::<Key>().is_err());
        assert!("".parse::<Key>().is_err());
    }

    #[test]
    fn display_parses_back() {
        for k in [Key::Char('g'), Key::Enter, Key::F(7), Key::Right] {
            assert_eq!(k.to_string().parse::<Key>(), Ok(k));
        }
    }
}
