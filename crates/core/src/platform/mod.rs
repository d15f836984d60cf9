pub mod stub;
pub mod keyhook;

#[cfg(target_os = "macos")]
pub mod darwin;
#[cfg(target_os = "windows")]
pub mod win32;

use std::sync::mpsc;

use crate::error::PlatformError;
use crate::keys::{Key, KeyEvent};
use crate::types::*;
use crate::logger;

/// Reads raw pixels from the screen.
pub trait ScreenSource: Send {
    fn capture(&mut self, rect: CaptureRect) -> Result<Capture, PlatformError>;
}

/// Injects synthetic mouse and keyboard input.
pub trait InputSink: Send {
    fn move_to(&mut self, p: Point) -> Result<(), PlatformError>;
    fn click(&mut self) -> Result<(), PlatformError>;
    fn key_down(&mut self, key: Key) -> Result<(), PlatformError>;
    fn key_up(&mut self, key: Key) -> Result<(), PlatformError>;
}

/// Platform-level factory. Every polling loop asks for its own handles,
/// capture APIs are not safely shared between concurrent callers.
pub trait Platform: Send + Sync {
    fn name(&self) -> &'static str;
    fn screen(&self) -> Box<dyn ScreenSource>;
    fn input(&self) -> Box<dyn InputSink>;
    /// Start forwarding raw key events to `tx` from a background thread.
    fn listen_keys(&self, tx: mpsc::Sender<KeyEvent>) -> Result<(), PlatformError>;
}

/// Create the platform appropriate for the current OS.
pub fn create_platform(force_stub: bool) -> Box<dyn Platform> {
    if force_stub {
        logger::info_p("platform", "using stub platform");
        return Box::new(stub::StubPlatform);
    }
    #[cfg(target_os = "macos")]
    {
        logger::info_p("platform", "using darwin platform");
        return Box::new(darwin::DarwinPlatform);
    }
    #[cfg(target_os = "windows")]
    {
        logger::info_p("platform", "using windows platform");
        return Box::new(win32::WindowsPlatform);
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        logger::warn_p("platform", "no native backend for this OS, using stub platform");
        Box::new(stub::StubPlatform)
    }
}
