use std::sync::mpsc;

use crate::error::PlatformError;
use crate::keys::{Key, KeyEvent};
use crate::types::*;
use crate::logger;
use super::{InputSink, Platform, ScreenSource};

/// Logs every call; never sees anything on screen.
pub struct StubPlatform;

impl Platform for StubPlatform {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn screen(&self) -> Box<dyn ScreenSource> {
        Box::new(StubScreen)
    }

    fn input(&self) -> Box<dyn InputSink> {
        Box::new(StubInput)
    }

    fn listen_keys(&self, _tx: mpsc::Sender<KeyEvent>) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported("key listening"))
    }
}

struct StubScreen;

impl ScreenSource for StubScreen {
    fn capture(&mut self, _rect: CaptureRect) -> Result<Capture, PlatformError> {
        Err(PlatformError::Unsupported("screen capture"))
    }
}

struct StubInput;

impl InputSink for StubInput {
    fn move_to(&mut self, p: Point) -> Result<(), PlatformError> {
        logger::info_p("platform", &format!("stub move_to({}, {})", p.x, p.y));
        Ok(())
    }

    fn click(&mut self) -> Result<(), PlatformError> {
        logger::info_p("platform", "stub click()");
        Ok(())
    }

    fn key_down(&mut self, key: Key) -> Result<(), PlatformError> {
        logger::info_p("platform", &format!("stub key_down({})", key));
        Ok(())
    }

    fn key_up(&mut self, key: Key) -> Result<(), PlatformError> {
        logger::info_p("platform", &format!("stub key_up({})", key));
        Ok(())
    }
}
