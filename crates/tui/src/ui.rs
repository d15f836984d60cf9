use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use instalock_core::stats::{timing_key, FAST_KEY};
use instalock_core::types::{EngineState, Strength};
use crate::App;

fn key_hint<'a>(key: &'a str, label: &'a str) -> Vec<Span<'a>> {
    vec![
        Span::styled(key, Style::default().fg(Color::Yellow)),
        Span::raw(" "),
        Span::raw(label),
        Span::raw("  "),
    ]
}

fn toggle<'a>(on: bool, label: &'a str) -> Span<'a> {
    let (mark, color) = if on { ("[x] ", Color::Green) } else { ("[ ] ", Color::DarkGray) };
    Span::styled(format!("{}{}", mark, label), Style::default().fg(color))
}

fn banner(app: &App) -> (String, Color) {
    if let Some(e) = &app.config_error {
        return (format!("CONFIG ERROR: {}", e), Color::Red);
    }
    match app.status.engine_state() {
        EngineState::Disabled => match app.status.disabled_reason() {
            Some(reason) => (format!("DISABLED: {} (Press E)", reason), Color::Red),
            None => ("DISABLED (Press E to enable)".to_string(), Color::Red),
        },
        EngineState::Locking => ("LOCKING".to_string(), Color::Magenta),
        state => (state.to_string().to_uppercase(), Color::Green),
    }
}

fn centered(label: &str, width: usize) -> String {
    let pad_total = width.saturating_sub(label.len());
    let pad_left = pad_total / 2;
    format!("{}{}{}", " ".repeat(pad_left), label, " ".repeat(pad_total - pad_left))
}

fn roster_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(
            [key_hint("j/k", "move"), key_hint("space", "select"), key_hint("R", "random pool")].concat(),
        ),
        Line::from(""),
    ];
    let Ok(roster) = app.roster.lock() else { return lines };
    if roster.unlocked.is_empty() {
        lines.push(Line::from(Span::styled(
            "  no unlocked agents in settings.json",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for (i, agent) in roster.unlocked.iter().enumerate() {
        let prefix = if i == app.selected { "> " } else { "  " };
        let chosen = agent.eq_ignore_ascii_case(&roster.selected);
        let random = roster.random_eligible.iter().any(|e| e.eq_ignore_ascii_case(agent));
        let maps: Vec<&str> = roster
            .map_assignments
            .iter()
            .filter(|(_, a)| a.eq_ignore_ascii_case(agent))
            .map(|(m, _)| m.as_str())
            .collect();

        let mut spans = vec![
            Span::raw(prefix),
            Span::styled(if chosen { "(●) " } else { "( ) " }, Style::default().fg(Color::Cyan)),
            Span::styled(
                agent.clone(),
                Style::default().fg(Color::White).add_modifier(if chosen { Modifier::BOLD } else { Modifier::empty() }),
            ),
        ];
        if random {
            spans.push(Span::styled("  rnd", Style::default().fg(Color::Magenta)));
        }
        if !maps.is_empty() {
            spans.push(Span::styled(format!("  {}", maps.join(",")), Style::default().fg(Color::DarkGray)));
        }
        lines.push(Line::from(spans));
    }
    lines
}

fn option_lines(app: &App) -> Vec<Line<'static>> {
    let o = &app.settings.options;
    let t = &app.settings.tools;
    let safe = match o.safe_mode {
        None => "off",
        Some(s) => s.key(),
    };
    vec![
        Line::from(vec![
            toggle(app.settings.locking_enabled, "e engine"),
            Span::raw("  "),
            toggle(o.hover, "h hover"),
            Span::raw("  "),
            Span::styled(format!("m safe: {}", safe), Style::default().fg(Color::Cyan)),
        ]),
        Line::from(vec![
            toggle(o.random_select, "r random"),
            Span::raw("  "),
            toggle(o.exclusive_random, "x exclusive"),
            Span::raw("  "),
            toggle(o.map_specific, "p per map"),
        ]),
        Line::from(vec![
            toggle(app.status.idle_enabled() || (t.idle_enabled && app.loops.is_none()), "i idle"),
            Span::raw("  "),
            Span::styled(format!("I mode: {}", t.idle_mode.label()), Style::default().fg(Color::Cyan)),
            Span::raw("  "),
            toggle(t.drop_enabled, "t drop"),
            Span::raw("  "),
            toggle(app.status.chat_open(), "chat"),
        ]),
    ]
}

fn stats_line(app: &App) -> Line<'static> {
    let stats = app.stats.snapshot();
    let active = timing_key(app.settings.options.safe_mode);
    let mut spans = vec![Span::styled("avg lock ", Style::default().fg(Color::DarkGray))];
    let keys = [FAST_KEY, Strength::Low.key(), Strength::Medium.key(), Strength::High.key()];
    for key in keys {
        let value = match stats.average_ms(key) {
            Some(ms) => format!("{} {}ms  ", key, ms),
            None => format!("{} -  ", key),
        };
        let style = if key == active {
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(value, style));
    }
    Line::from(spans)
}

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = if app.log_visible {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(f.area())
    } else {
        Layout::default()
            .constraints([Constraint::Percentage(100)])
            .split(f.area())
    };

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(5),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    let (label, bg) = banner(app);
    let banner = Paragraph::new(Line::from(Span::styled(
        centered(&label, left[0].width as usize),
        Style::default().fg(Color::Black).bg(bg).add_modifier(Modifier::BOLD),
    )));
    f.render_widget(banner, left[0]);

    let roster = Paragraph::new(roster_lines(app)).block(
        Block::default()
            .borders(Borders::LEFT | Borders::RIGHT | Borders::BOTTOM)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(roster, left[1]);

    let options = Paragraph::new(option_lines(app)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Options ")
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(options, left[2]);

    let stats = Paragraph::new(stats_line(app)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Stats (l log, q quit) ")
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(stats, left[3]);

    if app.log_visible && chunks.len() > 1 {
        draw_log(f, app, chunks[1]);
    }
}

fn draw_log(f: &mut Frame, app: &App, area: Rect) {
    let visible_height = area.height.saturating_sub(2) as usize;
    let total = app.log_messages.len();
    let scroll = app.log_scroll.min(total.saturating_sub(visible_height));
    let start = total.saturating_sub(visible_height + scroll);
    let end = total.saturating_sub(scroll);
    let log_lines: Vec<Line> = app.log_messages[start..end]
        .iter()
        .map(|m| parse_log_line(m))
        .collect();

    let log_panel = Paragraph::new(log_lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Logs ")
                .border_style(Style::default().fg(Color::Yellow)),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(log_panel, area);
}

/// Parse a structured log line (level\x1fprefix\x1fcolor\x1ftimestamp\x1fmessage)
/// into a colored Line.
fn parse_log_line(raw: &str) -> Line<'_> {
    let parts: Vec<&str> = raw.splitn(5, '\x1f').collect();
    if parts.len() < 5 {
        return Line::from(raw);
    }
    let (level, prefix, timestamp, message) = (parts[0], parts[1], parts[3], parts[4]);

    let color = match parts[2].parse::<u8>().unwrap_or(0) {
        1 => Color::DarkGray,
        2 => Color::LightBlue,
        3 => Color::LightGreen,
        4 => Color::LightMagenta,
        _ => Color::White,
    };

    let mut spans = vec![
        Span::styled(timestamp, Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
    ];
    match level {
        "ERROR" => spans.push(Span::styled("error ", Style::default().fg(Color::Red))),
        "WARN" => spans.push(Span::styled("warn ", Style::default().fg(Color::Yellow))),
        "DEBUG" => spans.push(Span::styled("debug ", Style::default().fg(Color::DarkGray))),
        _ => {}
    }
    if !prefix.is_empty() {
        spans.push(Span::styled(prefix, Style::default().fg(color).add_modifier(Modifier::BOLD)));
        spans.push(Span::raw(" "));
    }
    spans.push(Span::styled(message, Style::default().fg(color)));
    Line::from(spans)
}
