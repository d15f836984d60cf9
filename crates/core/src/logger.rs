use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Mutex, OnceLock};
use chrono::Local;

static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();
static DEBUG: AtomicBool = AtomicBool::new(false);

struct Logger {
    file: Option<File>,
    tui_tx: Option<mpsc::Sender<String>>,
    prefixes: HashMap<String, u8>, // prefix -> color index
}

// Color indices for TUI rendering (mapped in ui.rs)
pub const COLOR_GRAY: u8 = 1;
pub const COLOR_BLUE: u8 = 2;
pub const COLOR_GREEN: u8 = 3;
pub const COLOR_MAGENTA: u8 = 4;

/// Initialize the global logger. Clears the log file.
pub fn init(log_dir: &Path) {
    fs::create_dir_all(log_dir).ok();
    let log_path = log_dir.join("app.log");
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&log_path)
        .ok();

    LOGGER
        .set(Mutex::new(Logger { file, tui_tx: None, prefixes: HashMap::new() }))
        .ok();

    register_prefix("lock", COLOR_BLUE);
    register_prefix("tools", COLOR_GREEN);
    register_prefix("chat", COLOR_MAGENTA);
    register_prefix("platform", COLOR_GRAY);
}

/// Wire the TUI log channel.
pub fn set_tui_sender(tx: mpsc::Sender<String>) {
    if let Some(logger) = LOGGER.get() {
        if let Ok(mut l) = logger.lock() {
            l.tui_tx = Some(tx);
        }
    }
}

/// Enable or suppress `debug`/`debug_p` output.
pub fn set_debug(enabled: bool) {
    DEBUG.store(enabled, Ordering::Relaxed);
}

/// Register a prefix with a color. All subsequent log calls through
/// the `*_p` functions will use this prefix and color.
pub fn register_prefix(prefix: &str, color: u8) {
    if let Some(logger) = LOGGER.get() {
        if let Ok(mut l) = logger.lock() {
            l.prefixes.insert(prefix.to_string(), color);
        }
    }
}

/// Internal: format for TUI channel uses \x1f as field separator:
/// level\x1fprefix\x1fcolor\x1ftimestamp\x1fmessage
fn write_log(level: &str, prefix: &str, msg: &str) {
    let Some(logger) = LOGGER.get() else { return };
    let Ok(mut l) = logger.lock() else { return };

    let ts = Local::now().format("%H:%M:%S%.3f").to_string();
    let color = l.prefixes.get(prefix).copied().unwrap_or(0);

    // File always gets plain text
    let file_line = if prefix.is_empty() {
        format!("[{}] [{}] {}", ts, level, msg)
    } else {
        format!("[{}] [{}] [{}] {}", ts, level, prefix, msg)
    };

    // TUI gets structured data, without milliseconds
    let short_ts = &ts[..8];
    let tui_line = format!("{}\x1f{}\x1f{}\x1f{}\x1f{}", level, prefix, color, short_ts, msg);

    if let Some(file) = l.file.as_mut() {
        writeln!(file, "{}", file_line).ok();
    }
    if let Some(tx) = &l.tui_tx {
        tx.send(tui_line).ok();
    }
}

pub fn debug(msg: &str) {
    if DEBUG.load(Ordering::Relaxed) {
        write_log("DEBUG", "", msg);
    }
}

pub fn info(msg: &str) {
    write_log("INFO", "", msg);
}

pub fn warn(msg: &str) {
    write_log("WARN", "", msg);
}

pub fn error(msg: &str) {
    write_log("ERROR", "", msg);
}

/// Log with a registered prefix. Looks up the color from registration.
pub fn debug_p(prefix: &str, msg: &str) {
    if DEBUG.load(Ordering::Relaxed) {
        write_log("DEBUG", prefix, msg);
    }
}

pub fn info_p(prefix: &str, msg: &str) {
    write_log("INFO", prefix, msg);
}

pub fn warn_p(prefix: &str, msg: &str) {
    write_log("WARN", prefix, msg);
}

pub fn error_p(prefix: &str, msg: &str) {
    write_log("ERROR", prefix, msg);
}
