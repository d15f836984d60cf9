use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::Keybinds;
use crate::keys::{Key, KeyEvent};
use crate::logger;
use crate::platform::Platform;
use crate::shared::SharedStatus;

const TAG: &str = "chat";

/// Tracks whether the in-game chat box is open from raw key events, and
/// forwards the user's own movement keys to the tools loop.
pub struct ChatDetector {
    binds: Keybinds,
    status: Arc<SharedStatus>,
    movement: Sender<Key>,
}

impl ChatDetector {
    pub fn new(binds: Keybinds, status: Arc<SharedStatus>, movement: Sender<Key>) -> Self {
        Self { binds, status, movement }
    }

    pub fn handle(&mut self, ev: KeyEvent) {
        // releases and our own synthetic strokes never change anything
        if !ev.pressed || ev.injected {
            return;
        }
        let open = self.status.chat_open();
        if !open && self.binds.chat_open.contains(&ev.key) {
            logger::debug_p(TAG, "chat opened");
            self.status.set_chat_open(true);
        } else if open && (self.binds.chat_confirm.contains(&ev.key) || self.binds.chat_cancel.contains(&ev.key)) {
            logger::debug_p(TAG, "chat closed");
            self.status.set_chat_open(false);
        } else if !open && self.binds.is_movement(ev.key) {
            // the tools loop may be gone; nothing to do then
            let _ = self.movement.send(ev.key);
        }
    }

    /// Consume events until every sender is dropped.
    pub fn spawn(mut self, events: Receiver<KeyEvent>) -> JoinHandle<()> {
        thread::spawn(move || {
            for ev in events {
                self.handle(ev);
            }
            logger::debug_p(TAG, "key stream closed");
        })
    }
}

/// Hook the platform key listener up to a detector thread. If the listener
/// cannot start, chat is assumed closed for the rest of the session.
pub fn start(platform: &dyn Platform, detector: ChatDetector) -> Option<JoinHandle<()>> {
    let (tx, rx) = mpsc::channel();
    match platform.listen_keys(tx) {
        Ok(()) => {
            logger::info_p(TAG, "key listener running");
            Some(detector.spawn(rx))
        }
        Err(e) => {
            logger::warn_p(TAG, &format!("key listener unavailable, chat assumed closed: {}", e));
            detector.status.set_chat_open(false);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::testing::valid_config;
    use crate::platform::stub::StubPlatform;

    fn detector() -> (ChatDetector, Arc<SharedStatus>, Receiver<Key>) {
        let status = Arc::new(SharedStatus::new());
        let (tx, rx) = mpsc::channel();
        (ChatDetector::new(valid_config().keybinds, status.clone(), tx), status, rx)
    }

    fn injected(key: Key) -> KeyEvent {
        KeyEvent { key, pressed: true, injected: true }
    }

    #[test]
    fn enter_toggles_and_escape_cancels() {
        let (mut d, status, _rx) = detector();
        d.handle(KeyEvent::press(Key::Enter));
        assert!(status.chat_open());
        d.handle(KeyEvent::press(Key::Enter));
        assert!(!status.chat_open());

        d.handle(KeyEvent::press(Key::Enter));
        d.handle(KeyEvent::press(Key::Escape));
        assert!(!status.chat_open());
        // escape while closed stays closed
        d.handle(KeyEvent::press(Key::Escape));
        assert!(!status.chat_open());
    }

    #[test]
    fn releases_are_ignored() {
        let (mut d, status, _rx) = detector();
        d.handle(KeyEvent { key: Key::Enter, pressed: false, injected: false });
        assert!(!status.chat_open());
    }

    #[test]
    fn only_real_movement_is_forwarded() {
        let (mut d, _status, rx) = detector();
        d.handle(KeyEvent::press(Key::Char('a')));
        d.handle(injected(Key::Char('d')));
        d.handle(KeyEvent::press(Key::Char('q')));
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![Key::Char('a')]);
    }

    #[test]
    fn typing_in_chat_is_not_movement() {
        let (mut d, status, rx) = detector();
        d.handle(KeyEvent::press(Key::Enter));
        d.handle(KeyEvent::press(Key::Char('w')));
        assert!(status.chat_open());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn listener_failure_leaves_chat_closed() {
        let (d, status, _rx) = detector();
        status.set_chat_open(true);
        assert!(start(&StubPlatform, d).is_none());
        assert!(!status.chat_open());
    }

    #[test]
    fn detector_thread_drains_the_channel() {
        let (d, status, _rx) = detector();
        let (tx, rx) = mpsc::channel();
        let handle = d.spawn(rx);
        tx.send(KeyEvent::press(Key::Enter)).unwrap();
        drop(tx);
        handle.join().unwrap();
        assert!(status.chat_open());
    }
}
