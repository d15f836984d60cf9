use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, MouseEventKind};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::App;
use crate::ui;

/// Apply one key press. The global key listener also sees these, so no
/// binding here may overlap the default movement keys (w a s d).
pub fn handle_key(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('q') | KeyCode::Char('Q') => app.quit(),
        KeyCode::Up | KeyCode::Char('k') => app.move_up(),
        KeyCode::Down | KeyCode::Char('j') => app.move_down(),
        KeyCode::Char(' ') => app.select_current(),
        KeyCode::Char('R') => app.toggle_random_eligible(),
        KeyCode::Char('e') | KeyCode::Char('E') => app.toggle_engine(),
        KeyCode::Char('h') => app.toggle_hover(),
        KeyCode::Char('m') => app.cycle_safe_mode(),
        KeyCode::Char('r') => app.toggle_random(),
        KeyCode::Char('x') => app.toggle_exclusive(),
        KeyCode::Char('p') => app.toggle_map_specific(),
        KeyCode::Char('i') => app.toggle_idle(),
        KeyCode::Char('I') => app.cycle_idle_mode(),
        KeyCode::Char('t') => app.toggle_drop(),
        KeyCode::Char('l') | KeyCode::Char('L') => app.toggle_log(),
        _ => {}
    }
}

/// Drive the UI until the user quits.
pub fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> anyhow::Result<()> {
    loop {
        if app.should_quit {
            return Ok(());
        }

        app.drain_logs();
        app.sync_status();

        terminal.draw(|f| ui::draw(f, app))?;

        // 100ms keeps the banner close to the engine state
        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        match event::read()? {
            Event::Key(key) => {
                if key.kind == KeyEventKind::Press {
                    handle_key(app, key.code);
                }
            }
            Event::Mouse(mouse) => match mouse.kind {
                MouseEventKind::ScrollUp => app.scroll_log_up(3),
                MouseEventKind::ScrollDown => app.scroll_log_down(3),
                _ => {}
            },
            _ => {}
        }
    }
}
