use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::logger;

/// Wait after a tick panicked, so a persistent fault does not spin.
const PANIC_BACKOFF: Duration = Duration::from_secs(1);

/// A loop the supervisor can drive on its own thread.
pub trait PollLoop: Send + 'static {
    fn name(&self) -> &'static str;
    /// Run one iteration and return how long to wait before the next.
    fn tick(&mut self) -> Duration;
}

/// Cooperative stop flag with an interruptible wait.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    cv: Condvar,
}

impl StopSignal {
    pub fn stop(&self) {
        if let Ok(mut s) = self.stopped.lock() {
            *s = true;
        }
        self.cv.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.lock().map(|s| *s).unwrap_or(true)
    }

    /// Block for up to `d`. Returns true as soon as a stop is requested.
    pub fn wait(&self, d: Duration) -> bool {
        let Ok(guard) = self.stopped.lock() else { return true };
        match self.cv.wait_timeout_while(guard, d, |stopped| !*stopped) {
            Ok((stopped, _)) => *stopped,
            Err(_) => true,
        }
    }
}

struct Running<L> {
    signal: Arc<StopSignal>,
    handle: JoinHandle<L>,
}

/// Owns one polling loop and the thread it runs on.
pub struct Supervisor<L: PollLoop> {
    name: &'static str,
    parked: Option<L>,
    running: Option<Running<L>>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

fn run<L: PollLoop>(lp: &mut L, signal: &StopSignal) {
    let name = lp.name();
    logger::info_p(name, "loop started");
    while !signal.is_stopped() {
        let wait = match panic::catch_unwind(AssertUnwindSafe(|| lp.tick())) {
            Ok(d) => d,
            Err(payload) => {
                logger::error_p(name, &format!("tick panicked: {}", panic_message(payload.as_ref())));
                PANIC_BACKOFF
            }
        };
        if signal.wait(wait) {
            break;
        }
    }
    logger::info_p(name, "loop stopped");
}

impl<L: PollLoop> Supervisor<L> {
    pub fn new(lp: L) -> Self {
        Self { name: lp.name(), parked: Some(lp), running: None }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Spawn the loop thread. A second start while running does nothing.
    pub fn start(&mut self) -> bool {
        if self.running.is_some() {
            logger::info_p(self.name, "already running");
            return false;
        }
        let Some(mut lp) = self.parked.take() else {
            logger::error_p(self.name, "loop was lost, cannot start");
            return false;
        };
        let signal = Arc::new(StopSignal::default());
        let thread_signal = signal.clone();
        let handle = thread::spawn(move || {
            run(&mut lp, &thread_signal);
            lp
        });
        self.running = Some(Running { signal, handle });
        true
    }

    /// Signal the loop, join its thread and keep the loop for a later
    /// `start`. Calling this from the loop's own thread would deadlock and
    /// is refused.
    pub fn stop(&mut self) -> bool {
        let Some(running) = self.running.as_ref() else {
            return false;
        };
        if running.handle.thread().id() == thread::current().id() {
            logger::error_p(self.name, "stop called from the loop thread, ignoring");
            return false;
        }
        let Some(running) = self.running.take() else { return false };
        running.signal.stop();
        match running.handle.join() {
            Ok(lp) => {
                self.parked = Some(lp);
                true
            }
            Err(_) => {
                logger::error_p(self.name, "loop thread panicked outside a tick");
                false
            }
        }
    }

    /// The loop, while it is not running.
    pub fn parked(&self) -> Option<&L> {
        self.parked.as_ref()
    }
}

impl<L: PollLoop> Drop for Supervisor<L> {
    fn drop(&mut self) {
        self.stop();
    }
}
