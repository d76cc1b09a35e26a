//! Terminal wizard: four mutually exclusive stage views with step indicators.
//!
//! The TUI runs on a dedicated thread so blocking terminal I/O never stalls
//! the Tokio runtime; the controller runs on the async side and the two talk
//! over unbounded channels.

mod state;

use crate::cli::{build_config, ocr_factory, Cli};
use crate::model::{step_mark, StepMark, WizardEvent, WizardStage};
use crate::orchestrator::{self, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, Paragraph},
    Terminal,
};
use state::UiState;
use std::{io, path::PathBuf, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    // Unbounded channels avoid backpressure between the wizard and the UI.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<WizardEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let initial_image = args.image.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(initial_image, event_rx, cmd_tx));

    let factory = ocr_factory(&cfg);
    let res = orchestrator::run_controller(cfg, factory, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    initial_image: Option<PathBuf>,
    mut event_rx: UnboundedReceiver<WizardEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut state = UiState::default();
    if let Some(path) = initial_image {
        state.path_input = path.display().to_string();
        let _ = cmd_tx.send(UiCommand::FileSelected(path));
    }

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep the UI responsive.
        let mut disconnected = false;
        loop {
            match event_rx.try_recv() {
                Ok(ev) => state.apply_event(ev),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }
        if disconnected {
            // Controller finished (portal opened or quit); show the final
            // frame briefly before tearing the terminal down.
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            if state.navigated_url.is_some() {
                std::thread::sleep(Duration::from_millis(600));
            }
            break Ok(());
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                // A pending alert swallows the next key press.
                if state.alert.is_some() {
                    state.alert = None;
                    continue;
                }
                if k.modifiers == KeyModifiers::CONTROL && k.code == KeyCode::Char('c') {
                    let _ = cmd_tx.send(UiCommand::Quit);
                    break Ok(());
                }
                match state.stage {
                    WizardStage::Upload => match k.code {
                        KeyCode::Enter => {
                            let path = state.path_input.trim();
                            if !path.is_empty() {
                                let _ = cmd_tx.send(UiCommand::FileSelected(PathBuf::from(path)));
                            }
                        }
                        KeyCode::Backspace => {
                            state.path_input.pop();
                        }
                        KeyCode::Esc => {
                            let _ = cmd_tx.send(UiCommand::Quit);
                            break Ok(());
                        }
                        KeyCode::Char(c) => state.path_input.push(c),
                        _ => {}
                    },
                    WizardStage::Scanning => match k.code {
                        KeyCode::Char('r') | KeyCode::Esc => {
                            let _ = cmd_tx.send(UiCommand::Reset);
                        }
                        KeyCode::Char('q') => {
                            let _ = cmd_tx.send(UiCommand::Quit);
                            break Ok(());
                        }
                        _ => {}
                    },
                    WizardStage::Confirmation => match k.code {
                        KeyCode::Enter => {
                            let _ = cmd_tx.send(UiCommand::Proceed);
                        }
                        KeyCode::Char('c') => {
                            let _ = cmd_tx.send(UiCommand::CopyId);
                        }
                        KeyCode::Char('r') | KeyCode::Esc => {
                            let _ = cmd_tx.send(UiCommand::Reset);
                        }
                        KeyCode::Char('q') => {
                            let _ = cmd_tx.send(UiCommand::Quit);
                            break Ok(());
                        }
                        KeyCode::Backspace => {
                            state.id_input.pop();
                            let _ = cmd_tx.send(UiCommand::IdEdited(state.id_input.clone()));
                        }
                        // Only digits make sense in the field; other characters
                        // are key commands above.
                        KeyCode::Char(c) if c.is_ascii_digit() => {
                            state.id_input.push(c);
                            let _ = cmd_tx.send(UiCommand::IdEdited(state.id_input.clone()));
                        }
                        _ => {}
                    },
                    // The countdown cannot be aborted once started.
                    WizardStage::Redirecting => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();
    res
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(7),
            Constraint::Length(1),
        ])
        .split(area);

    draw_indicators(chunks[0], f, state);
    match state.stage {
        WizardStage::Upload => draw_upload(chunks[1], f, state),
        WizardStage::Scanning => draw_scanning(chunks[1], f, state),
        WizardStage::Confirmation => draw_confirmation(chunks[1], f, state),
        WizardStage::Redirecting => draw_redirecting(chunks[1], f, state),
    }

    let footer = Paragraph::new(state.info.as_str()).style(Style::default().fg(Color::Gray));
    f.render_widget(footer, chunks[2]);

    if let Some(msg) = &state.alert {
        draw_alert(area, f, msg);
    }
}

fn draw_indicators(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let mut spans: Vec<Span> = Vec::new();
    for (i, s) in WizardStage::ALL.into_iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" ── ", Style::default().fg(Color::DarkGray)));
        }
        let (glyph, style) = match step_mark(s, state.stage) {
            StepMark::Completed => ("✔", Style::default().fg(Color::Green)),
            StepMark::Active => (
                "●",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            StepMark::Upcoming => ("○", Style::default().fg(Color::DarkGray)),
        };
        spans.push(Span::styled(
            format!("{glyph} {}.{}", s.ordinal(), s.title()),
            style,
        ));
    }
    let header = Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" BESCOM bill scan "),
        );
    f.render_widget(header, area);
}

fn draw_upload(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let lines = vec![
        Line::from("Scan a bill photo to find your 10-digit account ID."),
        Line::from(""),
        Line::from(vec![
            Span::styled("Image path: ", Style::default().fg(Color::Gray)),
            Span::raw(state.path_input.as_str()),
            Span::styled("▏", Style::default().fg(Color::Cyan)),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "Enter: scan · Esc: quit",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let view = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Step 1 · Upload "),
    );
    f.render_widget(view, area);
}

fn draw_scanning(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Step 2 · Scanning ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(inner);

    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(Color::Cyan))
        .percent(u16::from(state.progress_percent));
    f.render_widget(gauge, rows[0]);

    let phase = Paragraph::new(format!("{}…", state.phase.label()))
        .style(Style::default().fg(Color::Gray));
    f.render_widget(phase, rows[1]);

    let hint = Paragraph::new("r: rescan · q: quit").style(Style::default().fg(Color::DarkGray));
    f.render_widget(hint, rows[2]);
}

fn draw_confirmation(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let validity = if state.id_valid {
        Line::from(Span::styled(
            "✔ Account ID verified",
            Style::default().fg(Color::Green),
        ))
    } else {
        Line::from(Span::styled(
            "✘ Invalid ID (must be 10 digits)",
            Style::default().fg(Color::Red),
        ))
    };
    let copy_note = if state.copied_recently() {
        Span::styled("copied ✔", Style::default().fg(Color::Green))
    } else {
        Span::raw("")
    };

    let lines = vec![
        Line::from(vec![
            Span::styled("Account ID: ", Style::default().fg(Color::Gray)),
            Span::styled(
                state.id_input.as_str(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled("▏ ", Style::default().fg(Color::Cyan)),
            copy_note,
        ]),
        validity,
        Line::from(""),
        Line::from(Span::styled(
            "Enter: open portal · c: copy · r: rescan · q: quit",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let view = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Step 3 · Confirm "),
    );
    f.render_widget(view, area);
}

fn draw_redirecting(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let dots = ".".repeat(state.countdown_dots);
    let remaining = state
        .countdown_remaining
        .map(|d| format!(" ({:.0}s)", d.as_secs_f64().ceil()))
        .unwrap_or_default();
    let status = if state.navigated_url.is_some() {
        Line::from(Span::styled(
            "Browser opened. The account ID is on your clipboard.",
            Style::default().fg(Color::Green),
        ))
    } else {
        Line::from(format!("Taking you to the portal{dots}{remaining}"))
    };
    let lines = vec![
        status,
        Line::from(""),
        Line::from(Span::styled(
            "Paste the copied account ID into the quick-payment form.",
            Style::default().fg(Color::Gray),
        )),
    ];
    let view = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Step 4 · Redirect "),
    );
    f.render_widget(view, area);
}

/// Centered modal for blocking error notices; dismissed by any key.
fn draw_alert(area: Rect, f: &mut ratatui::Frame, msg: &str) {
    let width = (msg.len() as u16 + 6).min(area.width.saturating_sub(4)).max(20);
    let rect = Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height / 2).saturating_sub(2),
        width,
        height: 5.min(area.height),
    };
    f.render_widget(Clear, rect);
    let lines = vec![
        Line::from(msg.to_string()),
        Line::from(""),
        Line::from(Span::styled(
            "press any key",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let alert = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(ratatui::widgets::Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Red))
                .title(" Error "),
        );
    f.render_widget(alert, rect);
}
