use std::sync::mpsc;

use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HGDIOBJ,
    SRCCOPY,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_KEYUP, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEINPUT, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::SetCursorPos;

use crate::error::PlatformError;
use crate::keys::{Key, KeyEvent};
use crate::types::*;
use super::{keyhook, InputSink, Platform, ScreenSource};

pub(crate) fn virtual_key(key: Key) -> Option<u16> {
    let vk = match key {
        Key::Char(c) if c.is_ascii_alphabetic() => c.to_ascii_uppercase() as u16,
        Key::Char(c) if c.is_ascii_digit() => c as u16,
        Key::Char(_) => return None,
        Key::Backspace => 0x08,
        Key::Tab => 0x09,
        Key::Enter => 0x0D,
        Key::Shift => 0x10,
        Key::Ctrl => 0x11,
        Key::Alt => 0x12,
        Key::Escape => 0x1B,
        Key::Space => 0x20,
        Key::Left => 0x25,
        Key::Up => 0x26,
        Key::Right => 0x27,
        Key::Down => 0x28,
        Key::F(n) if (1..=12).contains(&n) => 0x6F + n as u16, // VK_F1=0x70
        Key::F(_) => return None,
    };
    Some(vk)
}

pub(crate) fn key_from_vk(vk: u32) -> Option<Key> {
    let key = match vk {
        0x41..=0x5A => Key::Char((vk as u8 as char).to_ascii_lowercase()),
        0x30..=0x39 => Key::Char(vk as u8 as char),
        0x08 => Key::Backspace,
        0x09 => Key::Tab,
        0x0D => Key::Enter,
        0x10 | 0xA0 | 0xA1 => Key::Shift,
        0x11 | 0xA2 | 0xA3 => Key::Ctrl,
        0x12 | 0xA4 | 0xA5 => Key::Alt,
        0x1B => Key::Escape,
        0x20 => Key::Space,
        0x25 => Key::Left,
        0x26 => Key::Up,
        0x27 => Key::Right,
        0x28 => Key::Down,
        0x70..=0x7B => Key::F((vk - 0x6F) as u8),
        _ => return None,
    };
    Some(key)
}

pub struct WindowsPlatform;

impl Platform for WindowsPlatform {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn screen(&self) -> Box<dyn ScreenSource> {
        Box::new(GdiScreen)
    }

    fn input(&self) -> Box<dyn InputSink> {
        Box::new(SendInputSink)
    }

    fn listen_keys(&self, tx: mpsc::Sender<KeyEvent>) -> Result<(), PlatformError> {
        keyhook::start_key_listener(tx)
    }
}

struct GdiScreen;

impl ScreenSource for GdiScreen {
    fn capture(&mut self, rect: CaptureRect) -> Result<Capture, PlatformError> {
        if rect.w <= 0 || rect.h <= 0 {
            return Err(PlatformError::Capture("capture bounds are empty".into()));
        }

        unsafe {
            let screen_dc = GetDC(HWND::default());
            if screen_dc.0.is_null() {
                return Err(PlatformError::Capture("GetDC failed".into()));
            }
            let mem_dc = CreateCompatibleDC(screen_dc);
            if mem_dc.0.is_null() {
                let _ = ReleaseDC(HWND::default(), screen_dc);
                return Err(PlatformError::Capture("CreateCompatibleDC failed".into()));
            }

            let bmp = CreateCompatibleBitmap(screen_dc, rect.w, rect.h);
            if bmp.0.is_null() {
                let _ = DeleteDC(mem_dc);
                let _ = ReleaseDC(HWND::default(), screen_dc);
                return Err(PlatformError::Capture("CreateCompatibleBitmap failed".into()));
            }

            let old_obj = SelectObject(mem_dc, HGDIOBJ(bmp.0));
            let blitted = BitBlt(mem_dc, 0, 0, rect.w, rect.h, screen_dc, rect.l, rect.t, SRCCOPY).is_ok();

            let mut bmi = BITMAPINFO::default();
            bmi.bmiHeader = BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: rect.w,
                biHeight: -rect.h,
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            };

            let mut bgra = vec![0u8; (rect.w as usize) * (rect.h as usize) * 4];
            let rows = if blitted {
                GetDIBits(
                    mem_dc,
                    bmp,
                    0,
                    rect.h as u32,
                    Some(bgra.as_mut_ptr() as *mut _),
                    &mut bmi,
                    DIB_RGB_COLORS,
                )
            } else {
                0
            };

            let _ = SelectObject(mem_dc, old_obj);
            let _ = DeleteObject(bmp);
            let _ = DeleteDC(mem_dc);
            let _ = ReleaseDC(HWND::default(), screen_dc);

            if !blitted {
                return Err(PlatformError::Capture("BitBlt failed".into()));
            }
            if rows == 0 {
                return Err(PlatformError::Capture("GetDIBits failed".into()));
            }

            Ok(Capture {
                data: bgra,
                width: rect.w as u32,
                height: rect.h as u32,
                bytes_per_row: rect.w as u32 * 4,
            })
        }
    }
}

struct SendInputSink;

impl SendInputSink {
    fn send(inputs: &[INPUT]) -> Result<(), PlatformError> {
        let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };
        if sent as usize != inputs.len() {
            return Err(PlatformError::Input(format!("SendInput sent {}/{}", sent, inputs.len())));
        }
        Ok(())
    }

    fn mouse(flags: windows::Win32::UI::Input::KeyboardAndMouse::MOUSE_EVENT_FLAGS) -> INPUT {
        INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT { dx: 0, dy: 0, mouseData: 0, dwFlags: flags, time: 0, dwExtraInfo: 0 },
            },
        }
    }

    fn key(key: Key, flags: KEYBD_EVENT_FLAGS) -> Result<(), PlatformError> {
        let vk = virtual_key(key)
            .ok_or_else(|| PlatformError::Input(format!("no virtual key for {}", key)))?;
        let input = INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT { wVk: VIRTUAL_KEY(vk), wScan: 0, dwFlags: flags, time: 0, dwExtraInfo: 0 },
            },
        };
        Self::send(&[input])
    }
}

impl InputSink for SendInputSink {
    fn move_to(&mut self, p: Point) -> Result<(), PlatformError> {
        unsafe { SetCursorPos(p.x, p.y) }.map_err(|e| PlatformError::Input(e.to_string()))
    }

    fn click(&mut self) -> Result<(), PlatformError> {
        Self::send(&[Self::mouse(MOUSEEVENTF_LEFTDOWN)])?;
        std::thread::sleep(std::time::Duration::from_millis(15));
        Self::send(&[Self::mouse(MOUSEEVENTF_LEFTUP)])
    }

    fn key_down(&mut self, key: Key) -> Result<(), PlatformError> {
        Self::key(key, KEYBD_EVENT_FLAGS(0))
    }

    fn key_up(&mut self, key: Key) -> Result<(), PlatformError> {
        Self::key(key, KEYEVENTF_KEYUP)
    }
}
