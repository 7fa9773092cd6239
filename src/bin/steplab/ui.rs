//! Rendering: a transport bar, the step grid for the selected instrument,
//! and a help line.

use std::sync::atomic::Ordering;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use steplab::voices::ROWS_PER_INSTRUMENT;

use crate::app::{App, NO_STEP};

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // transport
            Constraint::Min(ROWS_PER_INSTRUMENT as u16 + 2),
            Constraint::Length(1), // help
        ])
        .split(frame.area());

    render_transport(frame, chunks[0], app);
    render_grid(frame, chunks[1], app);
    render_help(frame, chunks[2]);
}

fn render_transport(frame: &mut Frame, area: Rect, app: &App) {
    let playing = app.is_playing();
    let state = if playing { "▶ playing" } else { "■ stopped" };
    let state_color = if playing { Color::Green } else { Color::DarkGray };

    let bars = app.grid.lock().unwrap().bars();
    let mut spans = vec![
        Span::styled(format!(" {state} "), Style::default().fg(state_color)),
        Span::raw(format!(
            "│ {:.0} bpm │ vol {:3} │ {bars} bars │ ",
            app.tempo, app.volume
        )),
        Span::styled(
            app.current_instrument().name(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
    ];
    if !app.audio_available() {
        spans.push(Span::styled(
            "  (audio unavailable)",
            Style::default().fg(Color::Red),
        ));
    }
    if !app.status.is_empty() {
        spans.push(Span::styled(
            format!("  {}", app.status),
            Style::default().fg(Color::DarkGray),
        ));
    }

    let transport = Paragraph::new(Line::from(spans))
        .block(Block::default().title(" steplab ").borders(Borders::ALL));
    frame.render_widget(transport, area);
}

fn render_grid(frame: &mut Frame, area: Rect, app: &App) {
    let grid = app.grid.lock().unwrap();
    let instrument = app.current_instrument();
    let steps = grid.steps();
    let playing_step = app.playing_step.load(Ordering::Relaxed);
    let enabled = grid.is_enabled(instrument);

    let mut lines = Vec::with_capacity(ROWS_PER_INSTRUMENT + 1);

    // beat ruler: a tick every four steps
    let mut ruler = vec![Span::raw("     ")];
    for step in 0..steps {
        let mark = if step % 4 == 0 {
            format!("{:<2}", step / 4 + 1)
        } else {
            "· ".into()
        };
        let style = if step == playing_step && playing_step != NO_STEP {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        ruler.push(Span::styled(mark, style));
    }
    lines.push(Line::from(ruler));

    for row in 0..ROWS_PER_INSTRUMENT {
        let mut spans = vec![Span::styled(
            format!("{:>3}  ", row + 1),
            Style::default().fg(Color::DarkGray),
        )];
        for step in 0..steps {
            let active = grid.get(instrument, row, step);
            let symbol = if active { "■ " } else { "· " };

            let mut style = if active {
                let color = if enabled { Color::Cyan } else { Color::DarkGray };
                Style::default().fg(color)
            } else {
                Style::default().fg(Color::Gray)
            };
            if step == playing_step && playing_step != NO_STEP {
                style = style.bg(Color::Rgb(60, 60, 60));
            }
            if row == app.cursor_row && step == app.cursor_step {
                style = style.add_modifier(Modifier::REVERSED);
            }
            spans.push(Span::styled(symbol, style));
        }
        lines.push(Line::from(spans));
    }

    let title = if enabled {
        format!(" {} ", instrument.name())
    } else {
        format!(" {} (muted) ", instrument.name())
    };
    let widget =
        Paragraph::new(lines).block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(widget, area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(
        " space play  ↑↓←→ move  enter toggle  tab instrument  e mute  +/- tempo  [/] volume  ,/. bars  c clear  s json  w wav  q quit",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, area);
}
