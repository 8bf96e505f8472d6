use crate::state::{EventLevel, EventLogEntry};
use emberlog_core::{Incident, LiveState};
use ratatui::layout::{Alignment, Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap};
use ratatui::Frame;

impl EventLevel {
    pub fn to_color(self) -> Color {
        match self {
            EventLevel::Info => Color::Cyan,
            EventLevel::Warning => Color::Yellow,
            EventLevel::Error => Color::Red,
        }
    }
}

pub fn live_state_style(state: LiveState) -> (&'static str, Color) {
    match state {
        LiveState::Connecting => ("◌ CONNECTING", Color::Yellow),
        LiveState::Open => ("● LIVE", Color::Green),
        LiveState::Closed => ("○ CLOSED", Color::Red),
    }
}

pub fn render_incident_table(
    f: &mut Frame,
    area: Rect,
    rows: &[&Incident],
    selected_index: usize,
    expanded: Option<i64>,
    title: &str,
) {
    let table_rows: Vec<Row> = rows
        .iter()
        .enumerate()
        .map(|(idx, incident)| {
            let bg_color = if idx == selected_index {
                Color::Blue
            } else if expanded == Some(incident.id) {
                Color::DarkGray
            } else {
                Color::Reset
            };
            let style = Style::default().bg(bg_color);

            Row::new(vec![
                Cell::from(incident.display_time()).style(style.fg(Color::DarkGray)),
                Cell::from(incident.incident_type.clone())
                    .style(style.fg(type_color(&incident.incident_type)).add_modifier(Modifier::BOLD)),
                Cell::from(incident.address.clone()).style(style),
                Cell::from(incident.units_label()).style(style.fg(Color::Cyan)),
                Cell::from(incident.channel.clone()).style(style),
            ])
        })
        .collect();

    let table = Table::new(
        table_rows,
        [
            Constraint::Length(22),
            Constraint::Percentage(18),
            Constraint::Percentage(40),
            Constraint::Percentage(17),
            Constraint::Percentage(15),
        ],
    )
    .header(
        Row::new(vec![
            Cell::from("Dispatched"),
            Cell::from("Type"),
            Cell::from("Address"),
            Cell::from("Units"),
            Cell::from("Channel"),
        ])
        .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title(title.to_string()));

    f.render_widget(table, area);
}

fn type_color(incident_type: &str) -> Color {
    let upper = incident_type.to_uppercase();
    if upper.contains("FIRE") {
        Color::Red
    } else if upper.contains("MEDICAL") || upper.contains("EMS") {
        Color::Green
    } else if upper.contains("MVA") || upper.contains("ACCIDENT") {
        Color::Yellow
    } else {
        Color::White
    }
}

pub fn render_incident_detail(f: &mut Frame, area: Rect, incident: &Incident) {
    let label = Style::default().fg(Color::Yellow);
    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                format!("#{} {}", incident.id, incident.incident_type),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(" │ {}", incident.display_time())),
        ]),
        Line::from(vec![Span::styled("Address: ", label), Span::raw(incident.address.clone())]),
        Line::from(vec![Span::styled("Units: ", label), Span::raw(incident.units_label())]),
        Line::from(vec![Span::styled("Channel: ", label), Span::raw(incident.channel.clone())]),
        Line::from(vec![
            Span::styled("Map: ", label),
            Span::styled(incident.maps_link(), Style::default().fg(Color::Cyan)),
        ]),
    ];

    if let Some(audio) = &incident.source_audio {
        lines.push(Line::from(vec![
            Span::styled("Audio: ", label),
            Span::styled(audio.clone(), Style::default().fg(Color::Cyan)),
        ]));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Transcript:", label)));
    match incident.transcript.as_deref().filter(|t| !t.trim().is_empty()) {
        Some(text) => lines.push(Line::from(text.to_string())),
        None => lines.push(Line::from(Span::styled(
            "(no transcript)",
            Style::default().fg(Color::DarkGray),
        ))),
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Details"))
        .wrap(Wrap { trim: true });

    f.render_widget(paragraph, area);
}

pub fn render_event_log<'a>(
    f: &mut Frame,
    area: Rect,
    events: impl Iterator<Item = &'a EventLogEntry>,
) {
    let log_lines: Vec<Line> = events
        .take(30)
        .map(|entry| {
            let time_str = entry.timestamp.format("%H:%M:%S").to_string();
            Line::from(vec![
                Span::styled(format!("{} ", time_str), Style::default().fg(Color::DarkGray)),
                Span::styled(entry.text.clone(), Style::default().fg(entry.level.to_color())),
            ])
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Feed Events (most recent first)");

    f.render_widget(Paragraph::new(log_lines).block(block), area);
}

pub fn render_help_panel(f: &mut Frame, area: Rect) {
    let section = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
    let lines = vec![
        Line::from(vec![Span::styled(
            "Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )]),
        Line::from(""),
        Line::from(vec![Span::styled("Navigation:", section)]),
        Line::from("  ↑↓ / j k  Select incident"),
        Line::from("  Enter     Show or hide details"),
        Line::from("  ← → / p n Previous / next page"),
        Line::from(""),
        Line::from(vec![Span::styled("Filters:", section)]),
        Line::from("  /         Search address (Enter applies, Esc cancels)"),
        Line::from("  t / T     Next / previous incident type"),
        Line::from("  r         Refresh current page"),
        Line::from(""),
        Line::from("  ?/H       Toggle this help"),
        Line::from("  Q/Esc     Quit"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "New incidents appear on page 1 when they match the filters.",
            Style::default().fg(Color::DarkGray),
        )]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Help")
        .border_style(Style::default().fg(Color::Cyan))
        .style(Style::default().bg(Color::Black));

    let paragraph = Paragraph::new(lines).block(block).alignment(Alignment::Left);

    f.render_widget(paragraph, area);
}

pub fn render_notification(f: &mut Frame, area: Rect, message: &str, is_error: bool) {
    let color = if is_error { Color::Red } else { Color::Green };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .style(Style::default().bg(Color::Black));

    let paragraph = Paragraph::new(Line::from(Span::styled(message, Style::default().fg(color))))
        .block(block)
        .alignment(Alignment::Center);

    f.render_widget(paragraph, area);
}

pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
