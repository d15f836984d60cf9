use std::sync::mpsc;

use core_graphics::event::{CGEvent, CGEventTapLocation, CGEventType, CGKeyCode, CGMouseButton};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use core_graphics::geometry::{CGPoint, CGRect, CGSize};
use core_graphics::window::{
    create_image, kCGNullWindowID, kCGWindowImageDefault, kCGWindowImageNominalResolution,
    kCGWindowListOptionOnScreenOnly,
};

use crate::error::PlatformError;
use crate::keys::{Key, KeyEvent};
use crate::types::*;
use super::{keyhook, InputSink, Platform, ScreenSource};

// ANSI virtual key codes, letters and digits in `a..z`, `0..9` order
const LETTER_CODES: [CGKeyCode; 26] = [
    0, 11, 8, 2, 14, 3, 5, 4, 34, 38, 40, 37, 46, 45, 31, 35, 12, 15, 1, 17, 32, 9, 13, 7, 16, 6,
];
const DIGIT_CODES: [CGKeyCode; 10] = [29, 18, 19, 20, 21, 23, 22, 26, 28, 25];
const F_CODES: [CGKeyCode; 12] = [122, 120, 99, 118, 96, 97, 98, 100, 101, 109, 103, 111];

pub(crate) fn mac_keycode(key: Key) -> Option<CGKeyCode> {
    let code = match key {
        Key::Char(c) if c.is_ascii_lowercase() => LETTER_CODES[(c as u8 - b'a') as usize],
        Key::Char(c) if c.is_ascii_digit() => DIGIT_CODES[(c as u8 - b'0') as usize],
        Key::Char(_) => return None,
        Key::Enter => 36,
        Key::Tab => 48,
        Key::Space => 49,
        Key::Backspace => 51,
        Key::Escape => 53,
        Key::Shift => 56,
        Key::Alt => 58,
        Key::Ctrl => 59,
        Key::Left => 123,
        Key::Right => 124,
        Key::Down => 125,
        Key::Up => 126,
        Key::F(n) if (1..=12).contains(&n) => F_CODES[(n - 1) as usize],
        Key::F(_) => return None,
    };
    Some(code)
}

pub(crate) fn key_from_mac(code: CGKeyCode) -> Option<Key> {
    if let Some(i) = LETTER_CODES.iter().position(|c| *c == code) {
        return Some(Key::Char((b'a' + i as u8) as char));
    }
    if let Some(i) = DIGIT_CODES.iter().position(|c| *c == code) {
        return Some(Key::Char((b'0' + i as u8) as char));
    }
    if let Some(i) = F_CODES.iter().position(|c| *c == code) {
        return Some(Key::F(i as u8 + 1));
    }
    let key = match code {
        36 | 76 => Key::Enter,
        48 => Key::Tab,
        49 => Key::Space,
        51 => Key::Backspace,
        53 => Key::Escape,
        56 | 60 => Key::Shift,
        58 | 61 => Key::Alt,
        59 | 62 => Key::Ctrl,
        123 => Key::Left,
        124 => Key::Right,
        125 => Key::Down,
        126 => Key::Up,
        _ => return None,
    };
    Some(key)
}

pub struct DarwinPlatform;

impl Platform for DarwinPlatform {
    fn name(&self) -> &'static str {
        "darwin"
    }

    fn screen(&self) -> Box<dyn ScreenSource> {
        Box::new(DarwinScreen)
    }

    fn input(&self) -> Box<dyn InputSink> {
        Box::new(DarwinInput { cursor: None })
    }

    fn listen_keys(&self, tx: mpsc::Sender<KeyEvent>) -> Result<(), PlatformError> {
        keyhook::start_key_listener(tx)
    }
}

struct DarwinScreen;

impl ScreenSource for DarwinScreen {
    fn capture(&mut self, rect: CaptureRect) -> Result<Capture, PlatformError> {
        let cg_rect = CGRect::new(
            &CGPoint::new(rect.l as f64, rect.t as f64),
            &CGSize::new(rect.w as f64, rect.h as f64),
        );

        let image = create_image(
            cg_rect,
            kCGWindowListOptionOnScreenOnly,
            kCGNullWindowID,
            kCGWindowImageDefault | kCGWindowImageNominalResolution,
        )
        .ok_or_else(|| PlatformError::Capture("CGWindowListCreateImage returned null".into()))?;

        let bpr = image.bytes_per_row() as u32;
        let cf_data = image.data();
        let bytes = cf_data.bytes();

        Ok(Capture {
            data: bytes.to_vec(),
            width: image.width() as u32,
            height: image.height() as u32,
            bytes_per_row: bpr,
        })
    }
}

struct DarwinInput {
    cursor: Option<CGPoint>,
}

impl DarwinInput {
    fn source() -> Result<CGEventSource, PlatformError> {
        CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| PlatformError::Input("failed to create event source".into()))
    }

    fn current_location(&self) -> Result<CGPoint, PlatformError> {
        if let Some(p) = self.cursor {
            return Ok(p);
        }
        let event = CGEvent::new(Self::source()?)
            .map_err(|_| PlatformError::Input("failed to query cursor".into()))?;
        Ok(event.location())
    }

    fn post_mouse(&self, kind: CGEventType, point: CGPoint) -> Result<(), PlatformError> {
        let event = CGEvent::new_mouse_event(Self::source()?, kind, point, CGMouseButton::Left)
            .map_err(|_| PlatformError::Input(format!("failed to create mouse event {:?}", kind as u32)))?;
        event.post(CGEventTapLocation::HID);
        Ok(())
    }

    fn post_key(&self, key: Key, down: bool) -> Result<(), PlatformError> {
        let code = mac_keycode(key)
            .ok_or_else(|| PlatformError::Input(format!("no key code for {}", key)))?;
        let event = CGEvent::new_keyboard_event(Self::source()?, code, down)
            .map_err(|_| PlatformError::Input(format!("failed to create key event for {}", key)))?;
        event.post(CGEventTapLocation::HID);
        Ok(())
    }
}

impl InputSink for DarwinInput {
    fn move_to(&mut self, p: Point) -> Result<(), PlatformError> {
        let point = CGPoint::new(p.x as f64, p.y as f64);
        self.post_mouse(CGEventType::MouseMoved, point)?;
        self.cursor = Some(point);
        Ok(())
    }

    fn click(&mut self) -> Result<(), PlatformError> {
        let point = self.current_location()?;
        self.post_mouse(CGEventType::LeftMouseDown, point)?;
        std::thread::sleep(std::time::Duration::from_millis(15));
        self.post_mouse(CGEventType::LeftMouseUp, point)
    }

    fn key_down(&mut self, key: Key) -> Result<(), PlatformError> {
        self.post_key(key, true)
    }

    fn key_up(&mut self, key: Key) -> Result<(), PlatformError> {
        self.post_key(key, false)
    }
}
