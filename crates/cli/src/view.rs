//! Rendering of the dashboard: a log pane filling the screen with a one-line
//! status footer underneath.

use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use burrow_core::logs::{LogLine, LogSource};

use crate::app::{App, Mode, Phase};
use crate::keymap::Keymap;

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub fn render(frame: &mut Frame, app: &App, keymap: &Keymap) {
    if app.phase == Phase::Loading {
        frame.render_widget(Paragraph::new("loading..."), frame.area());
        return;
    }
    let [log_area, footer_area] =
        Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(frame.area());
    render_logs(frame, log_area, app);
    render_footer(frame, footer_area, app, keymap);
}

/// Index range of the buffer that fits the pane, honoring the scroll offset.
///
/// `scroll` counts lines up from the bottom; zero pins the view to the newest
/// line.
fn visible_range(total: usize, height: usize, scroll: usize) -> (usize, usize) {
    let end = total.saturating_sub(scroll.min(total));
    let start = end.saturating_sub(height);
    (start, end)
}

fn line_style(source: LogSource) -> Style {
    match source {
        LogSource::Stdout => Style::default(),
        LogSource::Stderr => Style::default().fg(Color::Red),
        LogSource::Internal => Style::default().fg(Color::DarkGray),
    }
}

fn render_logs(frame: &mut Frame, area: Rect, app: &App) {
    let (start, end) = visible_range(app.logs.len(), area.height as usize, app.scroll);
    let lines: Vec<Line> = app
        .logs
        .iter()
        .skip(start)
        .take(end - start)
        .map(|line: &LogLine| Line::styled(line.text.clone(), line_style(line.source)))
        .collect();
    frame.render_widget(Paragraph::new(lines), area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App, keymap: &Keymap) {
    let logo = Span::styled(
        " burrow ",
        Style::default()
            .fg(Color::Black)
            .bg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    let status = match (&app.mode, &app.public_url) {
        (Mode::Editing, _) => Span::raw(format!(" > {}█", app.input)),
        (Mode::Viewing, None) => Span::raw(format!(
            " {} requesting tunnel",
            SPINNER_FRAMES[app.spinner_frame % SPINNER_FRAMES.len()]
        )),
        (Mode::Viewing, Some(public_url)) => Span::raw(format!(" \u{1f310} {public_url}")),
    };

    let mut spans = vec![logo, status];
    for binding in keymap.help_entries(app.mode == Mode::Editing) {
        spans.push(Span::styled(
            format!("  {} ", binding.label),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::styled(
            binding.help,
            Style::default().fg(Color::DarkGray),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
