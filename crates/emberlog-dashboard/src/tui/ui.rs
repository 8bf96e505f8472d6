use crate::state::{AppMessage, StreamForwarder};
use crate::tui::app::{AppCommand, InputMode, TuiApp};
use crate::tui::keys::{key_to_action, search_key};
use crate::tui::widgets;
use anyhow::Context;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use emberlog_client::{IncidentsApi, StreamClient, StreamEvent};
use emberlog_core::LiveState;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use std::io;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::interval;
use tracing::info;

const NOTIFICATION_TTL: Duration = Duration::from_secs(3);

pub async fn run_tui(mut app: TuiApp, api: IncidentsApi, stream: StreamClient) -> anyhow::Result<()> {
    if !atty::is(atty::Stream::Stdout) {
        return Err(anyhow::anyhow!("TUI requires an interactive terminal"));
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let stream_handle = stream.open(StreamForwarder(tx.clone()));
    spawn_fetch(&mut app, &api, &tx);

    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend).context("Failed to create terminal")?;

    let mut tick = interval(Duration::from_millis(150));
    let result = loop {
        while let Ok(message) = rx.try_recv() {
            let closed = matches!(message, AppMessage::Stream(StreamEvent::Status(LiveState::Closed)));
            app.state.apply(message);
            if closed {
                app.notify("✗ Live feed closed");
            }
        }
        app.clamp_selection();

        if let Some((_, at)) = &app.notification {
            if at.elapsed() >= NOTIFICATION_TTL {
                app.notification = None;
            }
        }

        if let Err(e) = terminal.draw(|f| render_ui(f, &app)) {
            break Err(anyhow::Error::from(e));
        }

        match poll_key(&mut app) {
            Ok(AppCommand::Quit) => break Ok(()),
            Ok(AppCommand::Fetch) => spawn_fetch(&mut app, &api, &tx),
            Ok(AppCommand::None) => {}
            Err(e) => break Err(e),
        }

        tick.tick().await;
    };

    stream_handle.stop();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    info!("Dashboard closed");
    result
}

fn poll_key(app: &mut TuiApp) -> anyhow::Result<AppCommand> {
    if !event::poll(Duration::from_millis(33))? {
        return Ok(AppCommand::None);
    }
    let Event::Key(key) = event::read()? else {
        return Ok(AppCommand::None);
    };
    if key.kind != KeyEventKind::Press {
        return Ok(AppCommand::None);
    }

    let command = match app.input {
        InputMode::Search(_) => search_key(key.code).map(|k| app.handle_search_key(k)),
        InputMode::Normal => key_to_action(key.code).map(|a| app.handle_action(a)),
    };
    Ok(command.unwrap_or(AppCommand::None))
}

fn spawn_fetch(app: &mut TuiApp, api: &IncidentsApi, tx: &UnboundedSender<AppMessage>) {
    let (ticket, query) = app.state.view.begin_fetch();
    let api = api.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = api.fetch_page(&query).await.map_err(|e| e.to_string());
        let _ = tx.send(AppMessage::Page { ticket, result });
    });
}

fn render_ui(f: &mut Frame, app: &TuiApp) {
    let size = f.size();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(size);

    render_header(f, chunks[0], app);
    render_main(f, chunks[1], app);
    render_footer(f, chunks[2], app);

    if app.show_help {
        widgets::render_help_panel(f, centered_rect(60, 60, size));
    }

    if let Some((message, at)) = &app.notification {
        if at.elapsed() < NOTIFICATION_TTL {
            let is_error = message.starts_with('✗');
            widgets::render_notification(f, centered_rect(50, 10, size), message, is_error);
        }
    }
}

fn render_main(f: &mut Frame, area: Rect, app: &TuiApp) {
    let view = &app.state.view;
    let rows = view.visible();

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(area);

    let expanded = app
        .expanded
        .and_then(|id| rows.iter().find(|i| i.id == id).copied());
    let (table_area, detail_area) = match expanded {
        Some(_) => {
            let split = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
                .split(columns[0]);
            (split[0], Some(split[1]))
        }
        None => (columns[0], None),
    };

    let title = match view.state().type_filter() {
        Some(t) => format!("Incidents [{t}]"),
        None => "Incidents".to_string(),
    };

    if rows.is_empty() {
        let message = if view.is_loading() {
            "Loading incidents..."
        } else {
            "No incidents match the current filters"
        };
        let paragraph = Paragraph::new(message)
            .block(Block::default().borders(Borders::ALL).title(title))
            .alignment(Alignment::Center);
        f.render_widget(paragraph, table_area);
    } else {
        widgets::render_incident_table(f, table_area, &rows, app.selected_index, app.expanded, &title);
    }

    if let (Some(incident), Some(area)) = (expanded, detail_area) {
        widgets::render_incident_detail(f, area, incident);
    }

    widgets::render_event_log(f, columns[1], app.state.events());
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn render_header(f: &mut Frame, area: Rect, app: &TuiApp) {
    let view = &app.state.view;
    let stats = &view.stats;
    let (status_text, status_color) = widgets::live_state_style(view.live_state());

    let idle = stats
        .idle_seconds()
        .map(|s| widgets::format_duration(s.max(0) as u64))
        .unwrap_or_else(|| "-".to_string());
    let total = view
        .total()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "?".to_string());

    let line = Line::from(vec![
        Span::styled("Emberlog", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" │ "),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw(" │ "),
        Span::raw(format!("Total: {} │ ", total)),
        Span::raw(format!("Received: {} │ ", stats.received)),
        Span::raw(format!("Dropped: {} │ ", stats.rejected)),
        Span::raw(format!("Dup: {} │ ", stats.duplicates)),
        Span::raw(format!("Last: {} ago", idle)),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .style(Style::default().bg(Color::Black));

    f.render_widget(Paragraph::new(vec![line]).block(block), area);
}

fn render_footer(f: &mut Frame, area: Rect, app: &TuiApp) {
    let view = &app.state.view;

    let line = match &app.input {
        InputMode::Search(draft) => Line::from(vec![
            Span::styled("Search address: ", Style::default().fg(Color::Yellow)),
            Span::raw(draft.clone()),
            Span::styled("█", Style::default().fg(Color::Yellow)),
            Span::styled("  [Enter] apply [Esc] cancel", Style::default().fg(Color::DarkGray)),
        ]),
        InputMode::Normal => {
            let pages = view
                .total_pages()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "?".to_string());
            let search = view.state().search();
            let mut spans = vec![
                Span::styled(
                    format!("Page {}/{}", view.state().page(), pages),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ),
                Span::raw(" │ "),
            ];
            if !search.is_empty() {
                spans.push(Span::styled(
                    format!("Search: \"{}\" │ ", search),
                    Style::default().fg(Color::Yellow),
                ));
            }
            if view.is_loading() {
                spans.push(Span::styled("Loading… │ ", Style::default().fg(Color::Yellow)));
            }
            if let Some(err) = view.error() {
                spans.push(Span::styled(format!("{} │ ", err), Style::default().fg(Color::Red)));
            }
            spans.push(Span::raw("[/]Search [t]Type [←→]Page [↑↓]Select [Enter]Details [r]Refresh [?]Help [q]Quit"));
            Line::from(spans)
        }
    };

    let paragraph = Paragraph::new(vec![line])
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Left);

    f.render_widget(paragraph, area);
}
