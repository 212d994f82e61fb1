use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use fpl_terminal::fixture_label::{format_fixture, position_text};
use fpl_terminal::provider;
use fpl_terminal::state::{
    AppState, CaptainPick, DashboardData, DataStatus, Delta, ProviderCommand, Screen, apply_delta,
    screen_label,
};

struct App {
    state: AppState,
    should_quit: bool,
    cmd_tx: Option<mpsc::Sender<ProviderCommand>>,
}

impl App {
    fn new(cmd_tx: Option<mpsc::Sender<ProviderCommand>>) -> Self {
        Self {
            state: AppState::new(),
            should_quit: false,
            cmd_tx,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('1') => {
                self.state.set_screen(Screen::Dashboard);
                self.send(ProviderCommand::FetchModelStatus);
            }
            KeyCode::Char('2') => self.state.set_screen(Screen::Players),
            KeyCode::Char('3') => {
                self.state.set_screen(Screen::Jokers);
                if self.state.jokers.is_empty() {
                    let max_ownership = self.state.joker_max_ownership;
                    self.send(ProviderCommand::FetchJokers { max_ownership });
                }
            }
            KeyCode::Char('4') => {
                self.state.set_screen(Screen::PriceWatch);
                if self.state.risers.is_empty() {
                    self.send(ProviderCommand::FetchRisers);
                }
            }
            KeyCode::Char('5') => self.state.set_screen(Screen::History),
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            KeyCode::Char('p') if self.state.screen == Screen::Players => {
                self.state.cycle_position_filter();
                let position = self.state.position_filter.element_type();
                self.send(ProviderCommand::FetchPlayers { position });
            }
            KeyCode::Char('s') if self.state.screen == Screen::Players => {
                self.state.cycle_sort();
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                self.state.push_log("[INFO] Refresh requested");
                self.send(ProviderCommand::RefreshAll);
            }
            KeyCode::Enter if self.state.screen == Screen::History => {
                let gameweek = self.state.history_gameweeks.get(self.state.selected).copied();
                if let Some(gw) = gameweek {
                    self.send(ProviderCommand::LoadGameweek { gameweek: Some(gw) });
                }
            }
            KeyCode::Char('b') | KeyCode::Esc if self.state.screen == Screen::History => {
                self.send(ProviderCommand::LoadGameweek { gameweek: None });
            }
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            _ => {}
        }
    }

    fn send(&mut self, cmd: ProviderCommand) {
        let Some(tx) = &self.cmd_tx else {
            self.state.push_log("[WARN] Provider unavailable");
            return;
        };
        if tx.send(cmd).is_err() {
            self.state.push_log("[WARN] Provider request failed");
        }
    }
}

fn main() -> io::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    provider::spawn_provider(tx, cmd_rx);

    let mut app = App::new(Some(cmd_tx));
    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header =
        Paragraph::new(header_text(&app.state)).block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    if app.state.is_offline() && app.state.dashboard.is_none() {
        render_offline(frame, chunks[1], &app.state);
    } else {
        match app.state.screen {
            Screen::Dashboard => render_dashboard(frame, chunks[1], &app.state),
            Screen::Players => render_players(frame, chunks[1], &app.state),
            Screen::Jokers => render_jokers(frame, chunks[1], &app.state),
            Screen::PriceWatch => render_price_watch(frame, chunks[1], &app.state),
            Screen::History => render_history(frame, chunks[1], &app.state),
        }
    }

    let footer =
        Paragraph::new(footer_text(&app.state)).block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, chunks[2]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    let gameweek = state
        .dashboard
        .as_ref()
        .map(|d| format!("GW{}", d.gameweek))
        .unwrap_or_else(|| "GW ?".to_string());
    let status = match &state.status {
        DataStatus::Loading => "loading".to_string(),
        DataStatus::Online => "online".to_string(),
        DataStatus::Offline(_) => "OFFLINE".to_string(),
    };
    let title = format!(
        "FPL TERMINAL | {} | {} | Model: {} | Feed: {}",
        gameweek,
        screen_label(state.screen),
        state.model_status_label(),
        status
    );
    let line1 = format!("  _  {title}");
    let line2 = " (_)".to_string();
    let line3 = "  |".to_string();
    format!("{line1}\n{line2}\n{line3}")
}

fn footer_text(state: &AppState) -> String {
    match state.screen {
        Screen::Players => {
            format!(
                "1-5 Screens | j/k Move | p Position: {} | s Sort: {} | r Refresh | ? Help | q Quit",
                state.position_filter.label(),
                state.sort.label()
            )
        }
        Screen::History => {
            "1-5 Screens | j/k Move | Enter Open GW | b/Esc Live | r Refresh | ? Help | q Quit"
                .to_string()
        }
        _ => "1-5 Screens | j/k Move | r Refresh | ? Help | q Quit".to_string(),
    }
}

fn render_offline(frame: &mut Frame, area: Rect, state: &AppState) {
    let reason = match &state.status {
        DataStatus::Offline(reason) => reason.as_str(),
        _ => "unknown",
    };
    let text = format!(
        "Prediction engine unreachable.\n\n{reason}\n\nPress r to retry."
    );
    let block = Paragraph::new(text)
        .style(Style::default().fg(Color::Red))
        .block(Block::default().title("Offline").borders(Borders::ALL));
    frame.render_widget(block, centered_rect(60, 40, area));
}

fn render_dashboard(frame: &mut Frame, area: Rect, state: &AppState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(5)])
        .split(area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(34),
            Constraint::Min(36),
            Constraint::Length(30),
        ])
        .split(rows[0]);

    let dashboard = state.history_dashboard.as_ref().or(state.dashboard.as_ref());

    render_captains(frame, columns[0], dashboard);
    render_pitch(frame, columns[1], dashboard);
    render_summary(frame, columns[2], state, dashboard);

    let console = Paragraph::new(console_text(state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, rows[1]);
}

fn render_captains(frame: &mut Frame, area: Rect, dashboard: Option<&DashboardData>) {
    let block = Block::default().title("Captaincy").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(dashboard) = dashboard else {
        frame.render_widget(Paragraph::new("No dashboard yet"), inner);
        return;
    };

    let tiers = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(34),
            Constraint::Percentage(33),
            Constraint::Percentage(33),
        ])
        .split(inner);

    render_captain_card(
        frame,
        tiers[0],
        "The Obvious",
        dashboard.recommendations.obvious.as_ref(),
        Color::Green,
    );
    render_captain_card(
        frame,
        tiers[1],
        "The Joker",
        dashboard.recommendations.joker.as_ref(),
        Color::Magenta,
    );
    render_captain_card(
        frame,
        tiers[2],
        "The Fun One",
        dashboard.recommendations.fun_one.as_ref(),
        Color::Cyan,
    );
}

fn render_captain_card(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    pick: Option<&CaptainPick>,
    color: Color,
) {
    let text = match pick {
        Some(pick) => format!(
            "{} ({}) {}\n{} pts | {}% owned\n{}",
            pick.player.web_name,
            position_text(pick.player.position),
            format_fixture(non_empty(&pick.player.next_fixture)),
            pick.player.predicted_points,
            pick.player.ownership,
            pick.reason
        ),
        None => "No pick".to_string(),
    };
    let card = Paragraph::new(text)
        .wrap(ratatui::widgets::Wrap { trim: true })
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        );
    frame.render_widget(card, area);
}

fn render_pitch(frame: &mut Frame, area: Rect, dashboard: Option<&DashboardData>) {
    let block = Block::default().title("First Team").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(dashboard) = dashboard else {
        frame.render_widget(Paragraph::new("No squad yet"), inner);
        return;
    };

    let mut lines = Vec::new();
    for position in 1..=4u8 {
        let row: Vec<String> = dashboard
            .squad
            .iter()
            .filter(|p| p.position == position)
            .map(|p| format!("{} {:.1}", p.web_name, p.predicted_points))
            .collect();
        if !row.is_empty() {
            lines.push(format!("{:<3} {}", position_text(position), row.join(" | ")));
        }
    }
    lines.push(String::new());
    lines.push("Bench:".to_string());
    for p in &dashboard.bench {
        lines.push(format!(
            "  {} ({}) {:.1} {}",
            p.web_name,
            position_text(p.position),
            p.predicted_points,
            format_fixture(non_empty(&p.next_fixture))
        ));
    }
    frame.render_widget(Paragraph::new(lines.join("\n")), inner);
}

fn render_summary(
    frame: &mut Frame,
    area: Rect,
    state: &AppState,
    dashboard: Option<&DashboardData>,
) {
    let block = Block::default().title("Projection").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(dashboard) = dashboard else {
        frame.render_widget(Paragraph::new("No data yet"), inner);
        return;
    };

    let mut lines = vec![
        format!("Gameweek: {}", dashboard.gameweek),
        format!("Projected: {:.0} pts", dashboard.total_projected_points),
    ];
    if let Some(eff) = state.efficiency_for(dashboard.gameweek) {
        lines.push(format!("Efficiency: {eff:.1}%"));
    }
    if let Some(optimized) = &dashboard.optimized_squad {
        lines.push(String::new());
        lines.push(format!("Optimized: {}", optimized.formation));
        lines.push(format!("  Cost: {:.1}m", optimized.total_cost));
        lines.push(format!("  XI: {:.1} pts", optimized.total_predicted_points));
        lines.push(format!(
            "  Bench: {:.1} pts",
            optimized.bench_predicted_points
        ));
    }
    if let Some(model) = &state.model_status {
        lines.push(String::new());
        lines.push(format!("Model: {}", model.status));
        if let Some(last) = model.recent_results.last() {
            lines.push(format!(
                "  GW{} lift {:+.1} rmse {:.1}",
                last.gameweek, last.lift, last.rmse
            ));
        }
    }
    if let Some(updated) = &dashboard.last_updated {
        lines.push(String::new());
        lines.push(format!("Updated: {}", &updated[..updated.len().min(16)]));
    }
    frame.render_widget(Paragraph::new(lines.join("\n")), inner);
}

fn render_players(frame: &mut Frame, area: Rect, state: &AppState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(area);

    let header = format!(
        "{:<4}{:<18}{:<16}{:<5}{:>7}{:>7}{:>7}{:>7}{:>7}  {}",
        "#", "Player", "Team", "Pos", "Price", "Form", "Proj", "Value", "Own%", "Fixture"
    );
    frame.render_widget(
        Paragraph::new(header).style(Style::default().add_modifier(Modifier::BOLD)),
        sections[0],
    );

    let rows = state.filtered_players();
    if rows.is_empty() {
        let empty =
            Paragraph::new("No players loaded").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, sections[1]);
        return;
    }

    let list_area = sections[1];
    let visible = list_area.height as usize;
    let (start, end) = visible_range(state.selected, rows.len(), visible);

    for (i, idx) in (start..end).enumerate() {
        let p = rows[idx];
        let row_area = Rect {
            x: list_area.x,
            y: list_area.y + i as u16,
            width: list_area.width,
            height: 1,
        };
        let style = if idx == state.selected {
            Style::default().fg(Color::White).bg(Color::DarkGray)
        } else {
            Style::default()
        };
        let line = format!(
            "{:<4}{:<18}{:<16}{:<5}{:>7.1}{:>7.1}{:>7.2}{:>7.2}{:>7.1}  {}",
            idx + 1,
            truncate(&p.web_name, 17),
            truncate(&p.team, 15),
            position_text(p.position),
            p.price,
            p.form,
            p.predicted_points,
            p.value_score,
            p.ownership,
            format_fixture(non_empty(&p.next_fixture))
        );
        frame.render_widget(Paragraph::new(line).style(style), row_area);
    }
}

fn render_jokers(frame: &mut Frame, area: Rect, state: &AppState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(area);

    let header = format!(
        "{:<4}{:<18}{:<5}{:>7}{:>7}{:>8}{:>8}{:>7}  {:<8}{}",
        "#", "Player", "Pos", "Price", "Own%", "Explo", "Haul%", "Joker", "Trend", "Fixture"
    );
    frame.render_widget(
        Paragraph::new(header).style(Style::default().add_modifier(Modifier::BOLD)),
        sections[0],
    );

    if state.jokers.is_empty() {
        let empty = Paragraph::new("No differential picks yet")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, sections[1]);
        return;
    }

    let list_area = sections[1];
    let visible = list_area.height as usize;
    let (start, end) = visible_range(state.selected, state.jokers.len(), visible);

    for (i, idx) in (start..end).enumerate() {
        let p = &state.jokers[idx];
        let row_area = Rect {
            x: list_area.x,
            y: list_area.y + i as u16,
            width: list_area.width,
            height: 1,
        };
        let style = if idx == state.selected {
            Style::default().fg(Color::White).bg(Color::DarkGray)
        } else {
            Style::default()
        };
        let line = format!(
            "{:<4}{:<18}{:<5}{:>7.1}{:>7.1}{:>8.1}{:>8.1}{:>7.1}  {:<8}{}",
            idx + 1,
            truncate(&p.web_name, 17),
            position_text(p.position),
            p.price,
            p.ownership,
            p.explosivity_index,
            p.haul_probability,
            p.joker_score,
            p.form_trend,
            format_fixture(non_empty(&p.next_fixture))
        );
        frame.render_widget(Paragraph::new(line).style(style), row_area);
    }
}

fn render_price_watch(frame: &mut Frame, area: Rect, state: &AppState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(area);

    let header = format!(
        "{:<4}{:<18}{:<16}{:>7}{:>12}{:>8}  {:<8}",
        "#", "Player", "Team", "Price", "Net xfers", "Rise%", "Trend"
    );
    frame.render_widget(
        Paragraph::new(header).style(Style::default().add_modifier(Modifier::BOLD)),
        sections[0],
    );

    if state.risers.is_empty() {
        let empty =
            Paragraph::new("No price movement yet").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, sections[1]);
        return;
    }

    let list_area = sections[1];
    let visible = list_area.height as usize;
    let (start, end) = visible_range(state.selected, state.risers.len(), visible);

    for (i, idx) in (start..end).enumerate() {
        let p = &state.risers[idx];
        let row_area = Rect {
            x: list_area.x,
            y: list_area.y + i as u16,
            width: list_area.width,
            height: 1,
        };
        let style = if idx == state.selected {
            Style::default().fg(Color::White).bg(Color::DarkGray)
        } else {
            Style::default()
        };
        let line = format!(
            "{:<4}{:<18}{:<16}{:>7.1}{:>12}{:>8.0}  {:<8}",
            idx + 1,
            truncate(&p.web_name, 17),
            truncate(&p.team, 15),
            p.price,
            p.net_transfers,
            p.price_rise_probability,
            p.transfer_trend
        );
        frame.render_widget(Paragraph::new(line).style(style), row_area);
    }
}

fn render_history(frame: &mut Frame, area: Rect, state: &AppState) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(28), Constraint::Min(30)])
        .split(area);

    let block = Block::default().title("Gameweeks").borders(Borders::ALL);
    let inner = block.inner(columns[0]);
    frame.render_widget(block, columns[0]);

    if state.history_gameweeks.is_empty() {
        frame.render_widget(Paragraph::new("No snapshots yet"), inner);
    } else {
        let mut lines = Vec::new();
        for (idx, gw) in state.history_gameweeks.iter().enumerate() {
            let marker = if idx == state.selected { "> " } else { "  " };
            let eff = state
                .efficiency_for(*gw)
                .map(|e| format!("{e:.1}%"))
                .unwrap_or_else(|| "-".to_string());
            lines.push(format!("{marker}GW{gw:<4} eff {eff}"));
        }
        frame.render_widget(Paragraph::new(lines.join("\n")), inner);
    }

    let detail_block = Block::default().title("Snapshot").borders(Borders::ALL);
    let detail_inner = detail_block.inner(columns[1]);
    frame.render_widget(detail_block, columns[1]);

    match &state.history_dashboard {
        Some(dashboard) => {
            let mut lines = vec![
                format!("Gameweek {}", dashboard.gameweek),
                format!("Projected: {:.0} pts", dashboard.total_projected_points),
                String::new(),
            ];
            if let Some(obvious) = &dashboard.recommendations.obvious {
                lines.push(format!("Obvious: {}", obvious.player.web_name));
            }
            if let Some(joker) = &dashboard.recommendations.joker {
                lines.push(format!("Joker: {}", joker.player.web_name));
            }
            if let Some(fun) = &dashboard.recommendations.fun_one {
                lines.push(format!("Fun one: {}", fun.player.web_name));
            }
            lines.push(String::new());
            for p in dashboard.squad.iter().take(11) {
                lines.push(format!(
                    "{:<3} {} {:.1} {}",
                    position_text(p.position),
                    truncate(&p.web_name, 16),
                    p.predicted_points,
                    format_fixture(non_empty(&p.next_fixture))
                ));
            }
            frame.render_widget(Paragraph::new(lines.join("\n")), detail_inner);
        }
        None => {
            frame.render_widget(
                Paragraph::new("Enter opens the selected gameweek; b returns to live."),
                detail_inner,
            );
        }
    }
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No alerts yet".to_string();
    }
    state
        .logs
        .iter()
        .rev()
        .take(3)
        .cloned()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some(value) }
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        value.chars().take(max.saturating_sub(1)).collect::<String>() + "…"
    }
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total == 0 || visible == 0 {
        return (0, 0);
    }
    if total <= visible {
        return (0, total);
    }

    let mut start = selected.saturating_sub(visible / 2);
    if start + visible > total {
        start = total - visible;
    }
    (start, start + visible)
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "FPL Terminal - Help",
        "",
        "Global:",
        "  1            Dashboard",
        "  2            Players",
        "  3            Jokers",
        "  4            Price Watch",
        "  5            History",
        "  j/k or ↑/↓   Move",
        "  r            Refresh / retry",
        "  ?            Toggle help",
        "  q            Quit",
        "",
        "Players:",
        "  p            Cycle position filter",
        "  s            Cycle sort",
        "",
        "History:",
        "  Enter        Open selected gameweek",
        "  b / Esc      Back to live dashboard",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
